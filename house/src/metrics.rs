use axum::http::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, Serialize)]
pub struct WagerMetricsSnapshot {
    pub bets_placed: u64,
    pub bets_rejected: u64,
    pub guesses: u64,
    pub outcomes_credited: u64,
    pub outcomes_deferred: u64,
    pub outcomes_no_payout: u64,
    pub outcomes_rejected: u64,
    pub outcomes_refunded: u64,
    pub outcomes_failed: u64,
    pub rounds_expired: u64,
    pub deposits_recorded: u64,
    pub deposits_duplicate: u64,
    pub withdrawals_requested: u64,
    pub withdrawals_rejected: u64,
    pub persistence_queue_full: u64,
}

#[derive(Default)]
pub struct WagerMetrics {
    bets_placed: AtomicU64,
    bets_rejected: AtomicU64,
    guesses: AtomicU64,
    outcomes_credited: AtomicU64,
    outcomes_deferred: AtomicU64,
    outcomes_no_payout: AtomicU64,
    outcomes_rejected: AtomicU64,
    outcomes_refunded: AtomicU64,
    outcomes_failed: AtomicU64,
    rounds_expired: AtomicU64,
    deposits_recorded: AtomicU64,
    deposits_duplicate: AtomicU64,
    withdrawals_requested: AtomicU64,
    withdrawals_rejected: AtomicU64,
    persistence_queue_full: AtomicU64,
}

impl WagerMetrics {
    pub fn inc_bet_placed(&self) {
        self.bets_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bet_rejected(&self) {
        self.bets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_guess(&self) {
        self.guesses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_outcome(&self, settlement: arcade_types::Settlement) {
        let counter = match settlement {
            arcade_types::Settlement::Credited => &self.outcomes_credited,
            arcade_types::Settlement::Deferred => &self.outcomes_deferred,
            arcade_types::Settlement::NoPayout => &self.outcomes_no_payout,
            arcade_types::Settlement::Refunded => &self.outcomes_refunded,
            arcade_types::Settlement::Failed => &self.outcomes_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_outcome_rejected(&self) {
        self.outcomes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_round_expired(&self) {
        self.rounds_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deposit_recorded(&self) {
        self.deposits_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deposit_duplicate(&self) {
        self.deposits_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_withdrawal_requested(&self) {
        self.withdrawals_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_withdrawal_rejected(&self) {
        self.withdrawals_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_persistence_queue_full(&self) {
        self.persistence_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WagerMetricsSnapshot {
        WagerMetricsSnapshot {
            bets_placed: self.bets_placed.load(Ordering::Relaxed),
            bets_rejected: self.bets_rejected.load(Ordering::Relaxed),
            guesses: self.guesses.load(Ordering::Relaxed),
            outcomes_credited: self.outcomes_credited.load(Ordering::Relaxed),
            outcomes_deferred: self.outcomes_deferred.load(Ordering::Relaxed),
            outcomes_no_payout: self.outcomes_no_payout.load(Ordering::Relaxed),
            outcomes_rejected: self.outcomes_rejected.load(Ordering::Relaxed),
            outcomes_refunded: self.outcomes_refunded.load(Ordering::Relaxed),
            outcomes_failed: self.outcomes_failed.load(Ordering::Relaxed),
            rounds_expired: self.rounds_expired.load(Ordering::Relaxed),
            deposits_recorded: self.deposits_recorded.load(Ordering::Relaxed),
            deposits_duplicate: self.deposits_duplicate.load(Ordering::Relaxed),
            withdrawals_requested: self.withdrawals_requested.load(Ordering::Relaxed),
            withdrawals_rejected: self.withdrawals_rejected.load(Ordering::Relaxed),
            persistence_queue_full: self.persistence_queue_full.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct HttpMetricsSnapshot {
    pub reject_origin: u64,
    pub reject_body_limit: u64,
    pub reject_rate_limit: u64,
}

#[derive(Default)]
pub struct HttpMetrics {
    reject_origin: AtomicU64,
    reject_body_limit: AtomicU64,
    reject_rate_limit: AtomicU64,
}

impl HttpMetrics {
    /// Count a response the HTTP layer rejected before it reached the house.
    pub fn observe(&self, status: StatusCode) {
        let counter = match status {
            StatusCode::FORBIDDEN => &self.reject_origin,
            StatusCode::PAYLOAD_TOO_LARGE => &self.reject_body_limit,
            StatusCode::TOO_MANY_REQUESTS => &self.reject_rate_limit,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            reject_origin: self.reject_origin.load(Ordering::Relaxed),
            reject_body_limit: self.reject_body_limit.load(Ordering::Relaxed),
            reject_rate_limit: self.reject_rate_limit.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct HouseMetricsSnapshot {
    pub wagers: WagerMetricsSnapshot,
    pub http: HttpMetricsSnapshot,
    pub open_rounds: usize,
    pub wallets: usize,
    pub deposits: usize,
}
