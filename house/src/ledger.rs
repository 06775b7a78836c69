//! Wallet balances keyed by `(wallet, token)`.
//!
//! Each key has its own mutex, so a debit's check-and-subtract is a single critical section and
//! two debits on the same key serialize. Keys never block one another beyond the short map
//! lookup. Every mutation bumps the key's version so persistence can apply snapshots with
//! last-version-wins.

use arcade_types::{Token, TokenBalance, WalletAddress};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::now_ms;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be positive: {0}")]
    NonPositiveAmount(Decimal),
    #[error("balance overflow")]
    Overflow,
}

/// State of one key after a mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub wallet: WalletAddress,
    pub token: Token,
    pub amount: Decimal,
    pub version: u64,
    pub updated_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied(BalanceSnapshot),
    Insufficient { balance: Decimal },
}

#[derive(Default)]
struct Entry {
    amount: Decimal,
    version: u64,
    updated_at: u64,
}

type Accounts = HashMap<WalletAddress, BTreeMap<Token, Arc<Mutex<Entry>>>>;

#[derive(Default)]
pub struct Ledger {
    accounts: RwLock<Accounts>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `token` held by `wallet` (zero when the key was never written).
    pub fn balance(&self, wallet: &WalletAddress, token: &Token) -> Decimal {
        self.existing(wallet, token)
            .map(|entry| lock_entry(&entry).amount)
            .unwrap_or(Decimal::ZERO)
    }

    /// Every token row held by `wallet`, ordered by token.
    pub fn balances(&self, wallet: &WalletAddress) -> Vec<TokenBalance> {
        let entries: Vec<(Token, Arc<Mutex<Entry>>)> = self
            .read_accounts()
            .get(wallet)
            .map(|tokens| {
                tokens
                    .iter()
                    .map(|(token, entry)| (token.clone(), entry.clone()))
                    .collect()
            })
            .unwrap_or_default();
        entries
            .into_iter()
            .map(|(token, entry)| TokenBalance {
                token,
                amount: lock_entry(&entry).amount,
            })
            .collect()
    }

    pub fn credit(
        &self,
        wallet: &WalletAddress,
        token: &Token,
        amount: Decimal,
    ) -> Result<BalanceSnapshot, LedgerError> {
        ensure_positive(amount)?;
        let entry = self.entry(wallet, token);
        let mut entry = lock_entry(&entry);
        let next = entry
            .amount
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(apply(&mut entry, wallet, token, next))
    }

    /// Subtract `amount` if the balance covers it. Insufficiency is an outcome, not an error.
    pub fn debit(
        &self,
        wallet: &WalletAddress,
        token: &Token,
        amount: Decimal,
    ) -> Result<DebitOutcome, LedgerError> {
        ensure_positive(amount)?;
        // An absent key holds nothing, and a failed debit must not create one
        let Some(entry) = self.existing(wallet, token) else {
            return Ok(DebitOutcome::Insufficient {
                balance: Decimal::ZERO,
            });
        };
        let mut entry = lock_entry(&entry);
        if entry.amount < amount {
            return Ok(DebitOutcome::Insufficient {
                balance: entry.amount,
            });
        }
        let next = entry.amount - amount;
        Ok(DebitOutcome::Applied(apply(&mut entry, wallet, token, next)))
    }

    /// Load persisted rows. A row only replaces a key when its version is newer.
    pub fn restore(&self, snapshots: impl IntoIterator<Item = BalanceSnapshot>) {
        for snapshot in snapshots {
            let entry = self.entry(&snapshot.wallet, &snapshot.token);
            let mut entry = lock_entry(&entry);
            if snapshot.version >= entry.version {
                entry.amount = snapshot.amount;
                entry.version = snapshot.version;
                entry.updated_at = snapshot.updated_at;
            }
        }
    }

    pub fn wallet_count(&self) -> usize {
        self.read_accounts().len()
    }

    fn existing(&self, wallet: &WalletAddress, token: &Token) -> Option<Arc<Mutex<Entry>>> {
        self.read_accounts()
            .get(wallet)
            .and_then(|tokens| tokens.get(token))
            .cloned()
    }

    fn entry(&self, wallet: &WalletAddress, token: &Token) -> Arc<Mutex<Entry>> {
        if let Some(entry) = self.existing(wallet, token) {
            return entry;
        }
        self.write_accounts()
            .entry(wallet.clone())
            .or_default()
            .entry(token.clone())
            .or_default()
            .clone()
    }

    fn read_accounts(&self) -> RwLockReadGuard<'_, Accounts> {
        match self.accounts.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("ledger lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_accounts(&self) -> RwLockWriteGuard<'_, Accounts> {
        match self.accounts.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("ledger lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    Ok(())
}

fn lock_entry(entry: &Mutex<Entry>) -> MutexGuard<'_, Entry> {
    match entry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("ledger entry lock poisoned; recovering");
            poisoned.into_inner()
        }
    }
}

fn apply(
    entry: &mut Entry,
    wallet: &WalletAddress,
    token: &Token,
    amount: Decimal,
) -> BalanceSnapshot {
    entry.amount = amount;
    entry.version += 1;
    // Keep updated_at monotonic even if the clock steps back
    entry.updated_at = now_ms().max(entry.updated_at);
    BalanceSnapshot {
        wallet: wallet.clone(),
        token: token.clone(),
        amount,
        version: entry.version,
        updated_at: entry.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Barrier;

    fn wallet() -> WalletAddress {
        WalletAddress::parse("0xabc").unwrap()
    }

    fn token() -> Token {
        Token::parse("MIL").unwrap()
    }

    #[test]
    fn test_absent_balance_is_zero() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance(&wallet(), &token()), Decimal::ZERO);
        assert!(ledger.balances(&wallet()).is_empty());
    }

    #[test]
    fn test_debit_above_balance_fails() {
        let ledger = Ledger::new();
        ledger.credit(&wallet(), &token(), Decimal::new(10, 0)).unwrap();
        let outcome = ledger.debit(&wallet(), &token(), Decimal::new(15, 0)).unwrap();
        assert_eq!(
            outcome,
            DebitOutcome::Insufficient {
                balance: Decimal::new(10, 0)
            }
        );
        assert_eq!(ledger.balance(&wallet(), &token()), Decimal::new(10, 0));
    }

    #[test]
    fn test_failed_debit_on_absent_key_creates_no_row() {
        let ledger = Ledger::new();
        for i in 0..100 {
            let stranger = WalletAddress::parse(&format!("0x{i:x}f")).unwrap();
            assert_eq!(
                ledger.debit(&stranger, &token(), Decimal::ONE).unwrap(),
                DebitOutcome::Insufficient {
                    balance: Decimal::ZERO
                }
            );
        }
        assert_eq!(
            ledger.debit(&wallet(), &token(), Decimal::new(5, 0)).unwrap(),
            DebitOutcome::Insufficient {
                balance: Decimal::ZERO
            }
        );
        assert_eq!(ledger.wallet_count(), 0);
        assert!(ledger.balances(&wallet()).is_empty());
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let ledger = Ledger::new();
        assert_eq!(
            ledger.credit(&wallet(), &token(), Decimal::ZERO),
            Err(LedgerError::NonPositiveAmount(Decimal::ZERO))
        );
        assert_eq!(
            ledger.debit(&wallet(), &token(), Decimal::new(-1, 0)),
            Err(LedgerError::NonPositiveAmount(Decimal::new(-1, 0)))
        );
    }

    #[test]
    fn test_versions_increase() {
        let ledger = Ledger::new();
        let first = ledger.credit(&wallet(), &token(), Decimal::ONE).unwrap();
        let DebitOutcome::Applied(second) =
            ledger.debit(&wallet(), &token(), Decimal::ONE).unwrap()
        else {
            panic!("debit should apply");
        };
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.amount, Decimal::ZERO);
    }

    #[test]
    fn test_balances_lists_tokens() {
        let ledger = Ledger::new();
        let usdc = Token::parse("USDC").unwrap();
        ledger.credit(&wallet(), &usdc, Decimal::new(5, 0)).unwrap();
        ledger.credit(&wallet(), &token(), Decimal::new(7, 0)).unwrap();
        let balances = ledger.balances(&wallet());
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].token, token());
        assert_eq!(balances[0].amount, Decimal::new(7, 0));
        assert_eq!(balances[1].token, usdc);
    }

    #[test]
    fn test_restore_keeps_newest_version() {
        let ledger = Ledger::new();
        let snapshot = |amount: i64, version: u64| BalanceSnapshot {
            wallet: wallet(),
            token: token(),
            amount: Decimal::new(amount, 0),
            version,
            updated_at: 0,
        };
        ledger.restore([snapshot(30, 3), snapshot(10, 1)]);
        assert_eq!(ledger.balance(&wallet(), &token()), Decimal::new(30, 0));
        let next = ledger.credit(&wallet(), &token(), Decimal::ONE).unwrap();
        assert_eq!(next.version, 4);
    }

    #[test]
    fn test_concurrent_debits_single_winner() {
        let ledger = Arc::new(Ledger::new());
        ledger.credit(&wallet(), &token(), Decimal::new(100, 0)).unwrap();
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.debit(&wallet(), &token(), Decimal::new(60, 0)).unwrap()
                })
            })
            .collect();
        let applied = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|outcome| matches!(outcome, DebitOutcome::Applied(_)))
            .count();
        assert_eq!(applied, 1);
        assert_eq!(ledger.balance(&wallet(), &token()), Decimal::new(40, 0));
    }

    #[test]
    fn test_keys_are_independent() {
        let ledger = Ledger::new();
        let other = WalletAddress::parse("0xdef").unwrap();
        ledger.credit(&wallet(), &token(), Decimal::new(10, 0)).unwrap();
        assert!(matches!(
            ledger.debit(&other, &token(), Decimal::ONE).unwrap(),
            DebitOutcome::Insufficient { .. }
        ));
        assert_eq!(ledger.balance(&wallet(), &token()), Decimal::new(10, 0));
    }

    proptest! {
        /// Property: the balance equals credits minus the debits that applied.
        #[test]
        fn prop_balance_matches_applied_operations(
            ops in prop::collection::vec((any::<bool>(), 1i64..1_000), 1..64)
        ) {
            let ledger = Ledger::new();
            let mut expected = Decimal::ZERO;
            for (is_credit, cents) in ops {
                let amount = Decimal::new(cents, 2);
                if is_credit {
                    ledger.credit(&wallet(), &token(), amount).unwrap();
                    expected += amount;
                } else {
                    match ledger.debit(&wallet(), &token(), amount).unwrap() {
                        DebitOutcome::Applied(snapshot) => {
                            expected -= amount;
                            prop_assert_eq!(snapshot.amount, expected);
                        }
                        DebitOutcome::Insufficient { balance } => {
                            prop_assert!(balance < amount);
                            prop_assert_eq!(balance, expected);
                        }
                    }
                }
                prop_assert!(expected >= Decimal::ZERO);
            }
            prop_assert_eq!(ledger.balance(&wallet(), &token()), expected);
        }
    }
}
