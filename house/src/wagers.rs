use arcade_types::{WagerRecord, WalletAddress};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct WagerIndex {
    by_wallet: HashMap<WalletAddress, VecDeque<WagerRecord>>,
    next_id: u64,
    total: u64,
}

/// Append-only wager log. Every settled round lands here; the most recent records per wallet
/// are kept in memory for history queries.
pub struct WagerLog {
    index: Mutex<WagerIndex>,
    max_per_wallet: Option<usize>,
}

impl WagerLog {
    pub fn new(max_per_wallet: Option<usize>) -> Self {
        Self {
            index: Mutex::new(WagerIndex::default()),
            max_per_wallet,
        }
    }

    /// Assign the next id to `record` and append it.
    pub fn append(&self, mut record: WagerRecord) -> WagerRecord {
        let mut index = self.lock();
        index.next_id += 1;
        index.total += 1;
        record.id = index.next_id;
        let entries = index.by_wallet.entry(record.wallet.clone()).or_default();
        entries.push_back(record.clone());
        if let Some(limit) = self.max_per_wallet {
            while entries.len() > limit {
                entries.pop_front();
            }
        }
        record
    }

    /// Newest records for `wallet`, newest first.
    pub fn history(&self, wallet: &WalletAddress, limit: usize) -> Vec<WagerRecord> {
        self.lock()
            .by_wallet
            .get(wallet)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records appended since start (restored records included).
    pub fn total(&self) -> u64 {
        self.lock().total
    }

    /// Load persisted records, oldest first.
    pub fn restore(&self, records: impl IntoIterator<Item = WagerRecord>) {
        let mut index = self.lock();
        for record in records {
            index.next_id = index.next_id.max(record.id);
            index.total += 1;
            let entries = index.by_wallet.entry(record.wallet.clone()).or_default();
            entries.push_back(record);
            if let Some(limit) = self.max_per_wallet {
                while entries.len() > limit {
                    entries.pop_front();
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WagerIndex> {
        match self.index.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("wager log lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}
