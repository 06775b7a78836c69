use arcade_types::{Token, WalletAddress, WithdrawalRecord, WithdrawalStatus};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct WithdrawalIndex {
    by_id: BTreeMap<u64, WithdrawalRecord>,
    next_id: u64,
}

/// Withdrawals awaiting manual review. Records are created pending and never completed here.
#[derive(Default)]
pub struct WithdrawalQueue {
    index: Mutex<WithdrawalIndex>,
}

impl WithdrawalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(
        &self,
        wallet: &WalletAddress,
        token: &Token,
        amount: Decimal,
        destination: &str,
        now: u64,
    ) -> WithdrawalRecord {
        let mut index = self.lock();
        index.next_id += 1;
        let record = WithdrawalRecord {
            id: index.next_id,
            wallet: wallet.clone(),
            token: token.clone(),
            amount,
            destination: destination.to_string(),
            status: WithdrawalStatus::Pending,
            created_at: now,
        };
        index.by_id.insert(record.id, record.clone());
        record
    }

    pub fn pending(&self) -> Vec<WithdrawalRecord> {
        self.lock()
            .by_id
            .values()
            .filter(|record| record.status == WithdrawalStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn restore(&self, records: impl IntoIterator<Item = WithdrawalRecord>) {
        let mut index = self.lock();
        for record in records {
            index.next_id = index.next_id.max(record.id);
            index.by_id.insert(record.id, record);
        }
    }

    fn lock(&self) -> MutexGuard<'_, WithdrawalIndex> {
        match self.index.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("withdrawal queue lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_is_pending() {
        let queue = WithdrawalQueue::new();
        let wallet = WalletAddress::parse("0xabc").unwrap();
        let token = Token::parse("USDC").unwrap();
        let first = queue.enqueue(&wallet, &token, Decimal::new(25, 0), "0xdest", 5);
        let second = queue.enqueue(&wallet, &token, Decimal::ONE, "0xdest", 6);
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, WithdrawalStatus::Pending);
        assert_eq!(queue.pending().len(), 2);
    }
}
