use arcade_types::{DepositRecord, DepositStatus, Token, WalletAddress};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct DepositIndex {
    by_tx_id: HashMap<String, DepositRecord>,
    next_id: u64,
}

/// Recorded deposits, unique by transaction id.
#[derive(Default)]
pub struct DepositBook {
    index: Mutex<DepositIndex>,
}

pub struct NewDeposit<'a> {
    pub wallet: &'a WalletAddress,
    pub tx_id: &'a str,
    pub token: &'a Token,
    pub amount: Decimal,
    pub chain: &'a str,
}

impl DepositBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a deposit row. Returns `None` when `tx_id` was already recorded.
    pub fn insert(&self, deposit: NewDeposit<'_>, now: u64) -> Option<DepositRecord> {
        let mut index = self.lock();
        if index.by_tx_id.contains_key(deposit.tx_id) {
            return None;
        }
        index.next_id += 1;
        let record = DepositRecord {
            id: index.next_id,
            wallet: deposit.wallet.clone(),
            tx_id: deposit.tx_id.to_string(),
            token: deposit.token.clone(),
            amount: deposit.amount,
            chain: deposit.chain.to_string(),
            status: DepositStatus::Confirmed,
            created_at: now,
        };
        index
            .by_tx_id
            .insert(record.tx_id.clone(), record.clone());
        Some(record)
    }

    /// Undo an insert whose credit could not be applied.
    pub fn remove(&self, tx_id: &str) -> Option<DepositRecord> {
        self.lock().by_tx_id.remove(tx_id)
    }

    pub fn len(&self) -> usize {
        self.lock().by_tx_id.len()
    }

    pub fn restore(&self, records: impl IntoIterator<Item = DepositRecord>) {
        let mut index = self.lock();
        for record in records {
            index.next_id = index.next_id.max(record.id);
            index.by_tx_id.insert(record.tx_id.clone(), record);
        }
    }

    fn lock(&self) -> MutexGuard<'_, DepositIndex> {
        match self.index.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("deposit index lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}
