//! Rounds that have been paid for but not yet settled, keyed by authorization.
//!
//! A round leaves the book exactly once: when its outcome is reported or when it expires.

use arcade_execution::{RoundEngine, COMMIT_REVEAL_LEN};
use arcade_types::{GameKind, GameParams, Token, Uuid, WalletAddress};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug)]
pub struct OpenRound {
    pub authorization: Uuid,
    pub wallet: WalletAddress,
    pub game: GameKind,
    pub token: Token,
    pub bet_amount: Decimal,
    pub params: GameParams,
    pub commitment: [u8; COMMIT_REVEAL_LEN],
    pub reveal: [u8; COMMIT_REVEAL_LEN],
    pub engine: RoundEngine,
    pub issued_at: u64,
}

/// Fields a report must repeat to claim a round.
pub struct RoundClaim<'a> {
    pub wallet: &'a WalletAddress,
    pub game: GameKind,
    pub token: &'a Token,
    pub bet_amount: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupError {
    /// No open round for this authorization and wallet.
    Unknown,
    /// The round exists but the claim names a different game, token or amount.
    Mismatch,
}

#[derive(Default)]
pub struct RoundBook {
    rounds: Mutex<HashMap<Uuid, OpenRound>>,
}

impl RoundBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, round: OpenRound) {
        self.lock().insert(round.authorization, round);
    }

    /// Run `f` against the open round owned by `wallet`.
    pub fn with_round<R>(
        &self,
        authorization: &Uuid,
        wallet: &WalletAddress,
        f: impl FnOnce(&mut OpenRound) -> R,
    ) -> Result<R, LookupError> {
        let mut rounds = self.lock();
        match rounds.get_mut(authorization) {
            Some(round) if &round.wallet == wallet => Ok(f(round)),
            _ => Err(LookupError::Unknown),
        }
    }

    /// Remove and return the round if `claim` matches it. A mismatched claim leaves it open.
    pub fn take_matching(
        &self,
        authorization: &Uuid,
        claim: RoundClaim<'_>,
    ) -> Result<OpenRound, LookupError> {
        let mut rounds = self.lock();
        let round = match rounds.get(authorization) {
            Some(round) if &round.wallet == claim.wallet => round,
            _ => return Err(LookupError::Unknown),
        };
        if round.game != claim.game
            || &round.token != claim.token
            || round.bet_amount != claim.bet_amount
        {
            return Err(LookupError::Mismatch);
        }
        rounds.remove(authorization).ok_or(LookupError::Unknown)
    }

    /// Remove every round issued at or before `cutoff`.
    pub fn take_expired(&self, cutoff: u64) -> Vec<OpenRound> {
        let mut rounds = self.lock();
        let expired: Vec<Uuid> = rounds
            .values()
            .filter(|round| round.issued_at <= cutoff)
            .map(|round| round.authorization)
            .collect();
        let mut taken: Vec<OpenRound> = expired
            .iter()
            .filter_map(|authorization| rounds.remove(authorization))
            .collect();
        taken.sort_by_key(|round| round.issued_at);
        taken
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, OpenRound>> {
        match self.rounds.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("round book lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_execution::{compute_commit, derive_reveal};

    fn round(wallet: &WalletAddress, issued_at: u64) -> OpenRound {
        let authorization = Uuid::new_v4();
        let reveal = derive_reveal(b"secret", authorization.as_bytes());
        OpenRound {
            authorization,
            wallet: wallet.clone(),
            game: GameKind::CardStreak,
            token: Token::parse("MIL").unwrap(),
            bet_amount: Decimal::new(5, 0),
            params: GameParams::default(),
            commitment: compute_commit(&reveal),
            reveal,
            engine: RoundEngine::open(GameKind::CardStreak, &GameParams::default(), &reveal)
                .unwrap(),
            issued_at,
        }
    }

    #[test]
    fn test_take_matching_consumes_once() {
        let book = RoundBook::new();
        let wallet = WalletAddress::parse("0xabc").unwrap();
        let token = Token::parse("MIL").unwrap();
        let open = round(&wallet, 1);
        let authorization = open.authorization;
        book.insert(open);

        let claim = || RoundClaim {
            wallet: &wallet,
            game: GameKind::CardStreak,
            token: &token,
            bet_amount: Decimal::new(5, 0),
        };
        assert!(book.take_matching(&authorization, claim()).is_ok());
        assert_eq!(
            book.take_matching(&authorization, claim()).unwrap_err(),
            LookupError::Unknown
        );
    }

    #[test]
    fn test_mismatch_keeps_round_open() {
        let book = RoundBook::new();
        let wallet = WalletAddress::parse("0xabc").unwrap();
        let token = Token::parse("MIL").unwrap();
        let open = round(&wallet, 1);
        let authorization = open.authorization;
        book.insert(open);

        let wrong_amount = RoundClaim {
            wallet: &wallet,
            game: GameKind::CardStreak,
            token: &token,
            bet_amount: Decimal::new(50, 0),
        };
        assert_eq!(
            book.take_matching(&authorization, wrong_amount).unwrap_err(),
            LookupError::Mismatch
        );
        let other = WalletAddress::parse("0xdef").unwrap();
        let wrong_wallet = RoundClaim {
            wallet: &other,
            game: GameKind::CardStreak,
            token: &token,
            bet_amount: Decimal::new(5, 0),
        };
        assert_eq!(
            book.take_matching(&authorization, wrong_wallet).unwrap_err(),
            LookupError::Unknown
        );
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_take_expired() {
        let book = RoundBook::new();
        let wallet = WalletAddress::parse("0xabc").unwrap();
        book.insert(round(&wallet, 20));
        book.insert(round(&wallet, 10));
        book.insert(round(&wallet, 100));
        let expired = book.take_expired(50);
        assert_eq!(
            expired.iter().map(|r| r.issued_at).collect::<Vec<_>>(),
            vec![10, 20]
        );
        assert_eq!(book.len(), 1);
        assert!(book.take_expired(50).is_empty());
    }
}
