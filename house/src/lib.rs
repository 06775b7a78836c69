//! Ledger-backed wager server.
//!
//! The house owns the balance ledger and every open round. A bet debits the stake, opens a round
//! whose outcome is derived from a committed reveal, and hands the client an authorization. The
//! authorization is the only handle by which that round can be settled, and it is consumed once.

use arcade_execution::{compute_commit, derive_reveal, fairness, RoundEngine, Settled};
use arcade_types::{
    normalize_tx_id, BalancesResponse, DepositRequest, DepositResponse, GuessRequest, GuessResponse,
    PlaceBetRequest, PlaceBetResponse, ReportOutcomeRequest, ReportOutcomeResponse, Settlement,
    Token, Uuid, WagerHistoryQuery, WagerHistoryResponse, WagerRecord, WalletAddress,
    WithdrawalRequest, WithdrawalResponse, MAX_CHAIN_LENGTH, MAX_DESTINATION_LENGTH,
    MAX_TX_ID_LENGTH, MAX_WAGER_HISTORY_PAGE,
};
use rust_decimal::Decimal;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

mod api;
pub use api::Api;

mod config;
pub use config::{
    HouseConfig, HouseSecret, DEFAULT_HTTP_BODY_LIMIT_BYTES, DEFAULT_HTTP_RATE_LIMIT_BURST,
    DEFAULT_HTTP_RATE_LIMIT_PER_SECOND, DEFAULT_MAX_BET, DEFAULT_MIN_BET,
    DEFAULT_PERSISTENCE_BUFFER, DEFAULT_ROUND_TTL_SECS, DEFAULT_WAGER_HISTORY_LIMIT,
    HOUSE_SECRET_LEN,
};
mod deposits;
use deposits::{DepositBook, NewDeposit};
mod error;
pub use error::HouseError;
pub mod ledger;
use ledger::{DebitOutcome, Ledger};
mod metrics;
pub use metrics::{
    HouseMetricsSnapshot, HttpMetrics, HttpMetricsSnapshot, WagerMetrics, WagerMetricsSnapshot,
};
mod persistence;
pub use persistence::{HousePersistence, PersistRequest, PersistStatus, Restored};
mod rounds;
use rounds::{OpenRound, RoundBook, RoundClaim};
mod wagers;
use wagers::WagerLog;
mod withdrawals;
use withdrawals::WithdrawalQueue;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

pub struct House {
    pub config: HouseConfig,
    ledger: Ledger,
    deposits: DepositBook,
    withdrawals: WithdrawalQueue,
    wagers: WagerLog,
    rounds: RoundBook,
    persistence: Option<HousePersistence>,
    wager_metrics: WagerMetrics,
    http_metrics: HttpMetrics,
}

impl House {
    /// In-memory house.
    pub fn new(config: HouseConfig) -> Self {
        Self::new_with_persistence(config, None, Restored::default())
    }

    /// Open the house, loading persisted state when `persistence_path` is set.
    pub fn load(config: HouseConfig) -> anyhow::Result<Self> {
        let Some(path) = config.persistence_path.clone() else {
            return Ok(Self::new(config));
        };
        let (persistence, restored) = HousePersistence::load_and_start_sqlite(
            &path,
            config.persistence_buffer_capacity(),
            config.wager_history_limit,
        )?;
        info!(
            path = %path.display(),
            balances = restored.balances.len(),
            deposits = restored.deposits.len(),
            wagers = restored.wagers.len(),
            withdrawals = restored.withdrawals.len(),
            "House persistence enabled"
        );
        Ok(Self::new_with_persistence(
            config,
            Some(persistence),
            restored,
        ))
    }

    pub fn new_with_persistence(
        config: HouseConfig,
        persistence: Option<HousePersistence>,
        restored: Restored,
    ) -> Self {
        let house = Self {
            ledger: Ledger::new(),
            deposits: DepositBook::new(),
            withdrawals: WithdrawalQueue::new(),
            wagers: WagerLog::new(config.wager_history_limit),
            rounds: RoundBook::new(),
            persistence,
            wager_metrics: WagerMetrics::default(),
            http_metrics: HttpMetrics::default(),
            config,
        };
        house.ledger.restore(restored.balances);
        house.deposits.restore(restored.deposits);
        house.wagers.restore(restored.wagers);
        house.withdrawals.restore(restored.withdrawals);
        house
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn http_metrics(&self) -> &HttpMetrics {
        &self.http_metrics
    }

    pub fn metrics_snapshot(&self) -> HouseMetricsSnapshot {
        HouseMetricsSnapshot {
            wagers: self.wager_metrics.snapshot(),
            http: self.http_metrics.snapshot(),
            open_rounds: self.rounds.len(),
            wallets: self.ledger.wallet_count(),
            deposits: self.deposits.len(),
        }
    }

    pub fn open_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn pending_withdrawals(&self) -> usize {
        self.withdrawals.pending().len()
    }

    pub fn balances(&self, wallet: &WalletAddress) -> BalancesResponse {
        BalancesResponse {
            balances: self.ledger.balances(wallet),
        }
    }

    pub fn wager_history(&self, query: &WagerHistoryQuery) -> WagerHistoryResponse {
        let limit = query
            .limit
            .unwrap_or(MAX_WAGER_HISTORY_PAGE)
            .min(MAX_WAGER_HISTORY_PAGE);
        WagerHistoryResponse {
            wagers: self.wagers.history(&query.wallet, limit),
        }
    }

    /// Debit the stake and open a round.
    pub async fn place_bet(
        &self,
        request: PlaceBetRequest,
    ) -> Result<PlaceBetResponse, HouseError> {
        if let Err(err) = self.validate_bet(&request) {
            self.wager_metrics.inc_bet_rejected();
            return Err(err);
        }
        let PlaceBetRequest {
            wallet,
            game,
            bet_amount,
            token,
            params,
        } = request;

        let debited = match self.ledger.debit(&wallet, &token, bet_amount)? {
            DebitOutcome::Applied(snapshot) => snapshot,
            DebitOutcome::Insufficient { balance } => {
                self.wager_metrics.inc_bet_rejected();
                info!(
                    wallet = %wallet,
                    token = %token,
                    %balance,
                    %bet_amount,
                    "bet rejected: insufficient balance"
                );
                return Err(HouseError::InsufficientBalance);
            }
        };
        self.persist(PersistRequest::Balance(debited.clone())).await;

        let authorization = Uuid::new_v4();
        let reveal = derive_reveal(self.config.house_secret.as_bytes(), authorization.as_bytes());
        let commitment = compute_commit(&reveal);
        let engine = match RoundEngine::open(game, &params, &reveal) {
            Ok(engine) => engine,
            Err(err) => {
                warn!(wallet = %wallet, game = %game, ?err, "round open failed; refunding stake");
                let refund = self.ledger.credit(&wallet, &token, bet_amount)?;
                self.persist(PersistRequest::Balance(refund)).await;
                return Err(err.into());
            }
        };
        let round = engine.view();

        self.rounds.insert(OpenRound {
            authorization,
            wallet: wallet.clone(),
            game,
            token: token.clone(),
            bet_amount,
            params,
            commitment,
            reveal,
            engine,
            issued_at: now_ms(),
        });
        self.wager_metrics.inc_bet_placed();
        info!(
            wallet = %wallet,
            token = %token,
            game = %game,
            %bet_amount,
            %authorization,
            "bet placed"
        );

        Ok(PlaceBetResponse {
            balance: debited.amount,
            authorization,
            commitment: fairness::encode(&commitment),
            round,
        })
    }

    /// Draw the next card of an open card streak.
    pub async fn guess(&self, request: GuessRequest) -> Result<GuessResponse, HouseError> {
        let round = self
            .rounds
            .with_round(&request.authorization, &request.wallet, |round| {
                round.engine.guess(request.guess)
            })??;
        self.wager_metrics.inc_guess();
        Ok(GuessResponse { round })
    }

    /// Settle the round named by `authorization` with its canonical outcome.
    pub async fn report_outcome(
        &self,
        request: ReportOutcomeRequest,
    ) -> Result<ReportOutcomeResponse, HouseError> {
        let claim = RoundClaim {
            wallet: &request.wallet,
            game: request.game,
            token: &request.token,
            bet_amount: request.bet_amount,
        };
        let round = match self.rounds.take_matching(&request.authorization, claim) {
            Ok(round) => round,
            Err(err) => {
                self.wager_metrics.inc_outcome_rejected();
                warn!(
                    wallet = %request.wallet,
                    authorization = %request.authorization,
                    ?err,
                    "outcome report rejected"
                );
                return Err(err.into());
            }
        };
        if request.payout.is_sign_negative() {
            warn!(wallet = %request.wallet, payout = %request.payout, "negative reported payout");
        }
        Ok(self.settle(round, Some(request.payout)).await)
    }

    /// Settle every round older than the configured TTL. Returns how many were settled.
    pub async fn expire_rounds(&self) -> usize {
        self.expire_rounds_at(now_ms()).await
    }

    pub async fn expire_rounds_at(&self, now: u64) -> usize {
        let ttl_ms = self.config.round_ttl().as_millis() as u64;
        let count = self
            .settle_unreported(self.rounds.take_expired(now.saturating_sub(ttl_ms)))
            .await;
        if count > 0 {
            info!(count, "expired rounds settled");
        }
        count
    }

    /// Settle every open round regardless of age. Open rounds live only in memory, so this runs
    /// before shutdown to keep debited stakes from outliving their rounds.
    pub async fn settle_open_rounds(&self) -> usize {
        let count = self
            .settle_unreported(self.rounds.take_expired(u64::MAX))
            .await;
        if count > 0 {
            info!(count, "open rounds settled before shutdown");
        }
        count
    }

    async fn settle_unreported(&self, rounds: Vec<OpenRound>) -> usize {
        let count = rounds.len();
        for round in rounds {
            self.wager_metrics.inc_round_expired();
            self.settle(round, None).await;
        }
        count
    }

    pub async fn record_deposit(
        &self,
        request: DepositRequest,
    ) -> Result<DepositResponse, HouseError> {
        let tx_id = normalize_tx_id(&request.tx_id);
        let tx_id = tx_id.as_str();
        validate_text("tx_id", tx_id, MAX_TX_ID_LENGTH)?;
        let chain = request.chain.trim();
        validate_text("chain", chain, MAX_CHAIN_LENGTH)?;
        self.validate_amount(&request.token, request.amount)?;

        let new_deposit = NewDeposit {
            wallet: &request.wallet,
            tx_id,
            token: &request.token,
            amount: request.amount,
            chain,
        };
        let Some(deposit) = self.deposits.insert(new_deposit, now_ms()) else {
            self.wager_metrics.inc_deposit_duplicate();
            info!(tx_id, wallet = %request.wallet, "duplicate deposit ignored");
            return Err(HouseError::DuplicateDeposit);
        };
        let credited = match self.ledger.credit(&request.wallet, &request.token, request.amount) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.deposits.remove(tx_id);
                return Err(err.into());
            }
        };
        self.persist(PersistRequest::Deposit(deposit.clone())).await;
        self.persist(PersistRequest::Balance(credited.clone())).await;
        self.wager_metrics.inc_deposit_recorded();
        info!(
            wallet = %request.wallet,
            token = %request.token,
            amount = %request.amount,
            tx_id,
            chain,
            "deposit recorded"
        );

        Ok(DepositResponse {
            deposit,
            balance: credited.amount,
        })
    }

    pub async fn request_withdrawal(
        &self,
        request: WithdrawalRequest,
    ) -> Result<WithdrawalResponse, HouseError> {
        let destination = request.destination.trim();
        validate_text("destination", destination, MAX_DESTINATION_LENGTH)?;
        self.validate_amount(&request.token, request.amount)?;

        let debited = match self.ledger.debit(&request.wallet, &request.token, request.amount)? {
            DebitOutcome::Applied(snapshot) => snapshot,
            DebitOutcome::Insufficient { .. } => {
                self.wager_metrics.inc_withdrawal_rejected();
                return Err(HouseError::InsufficientBalance);
            }
        };
        let record = self.withdrawals.enqueue(
            &request.wallet,
            &request.token,
            request.amount,
            destination,
            now_ms(),
        );
        self.persist(PersistRequest::Balance(debited.clone())).await;
        self.persist(PersistRequest::Withdrawal(record.clone())).await;
        self.wager_metrics.inc_withdrawal_requested();
        info!(
            wallet = %request.wallet,
            token = %request.token,
            amount = %request.amount,
            id = record.id,
            "withdrawal pending review"
        );

        Ok(WithdrawalResponse {
            id: record.id,
            status: record.status,
            balance: debited.amount,
            amount: record.amount,
            token: record.token,
        })
    }

    /// Wait for queued writes to reach disk.
    pub async fn flush(&self) {
        if let Some(persistence) = &self.persistence {
            persistence.flush().await;
        }
    }

    /// Settle a round that has already left the book. Never fails: a payout that cannot be
    /// applied returns the stake instead, and every path leaves a wager record behind.
    async fn settle(
        &self,
        mut round: OpenRound,
        reported_payout: Option<Decimal>,
    ) -> ReportOutcomeResponse {
        let settled = round.engine.settle();
        let (payout, settlement, balance) = match self.pay(&round, settled).await {
            Ok(paid) => paid,
            Err(err) => {
                error!(
                    wallet = %round.wallet,
                    authorization = %round.authorization,
                    ?err,
                    "payout failed; refunding stake"
                );
                self.refund(&round).await
            }
        };

        let reveal = fairness::encode(&round.reveal);
        let record = self.wagers.append(WagerRecord {
            id: 0,
            wallet: round.wallet.clone(),
            game: round.game,
            bet_amount: round.bet_amount,
            token: round.token.clone(),
            payout,
            reported_payout,
            result: settled.result,
            settlement,
            authorization: round.authorization,
            commitment: fairness::encode(&round.commitment),
            reveal: reveal.clone(),
            created_at: now_ms(),
        });
        self.persist(PersistRequest::Wager(record)).await;
        self.wager_metrics.inc_outcome(settlement);
        if reported_payout.is_some_and(|reported| reported != payout) {
            info!(
                wallet = %round.wallet,
                authorization = %round.authorization,
                %payout,
                "reported payout differs from canonical payout"
            );
        }
        info!(
            wallet = %round.wallet,
            token = %round.token,
            game = %round.game,
            params = ?round.params,
            result = settled.result.as_str(),
            %payout,
            settlement = settlement.as_str(),
            "round settled"
        );

        ReportOutcomeResponse {
            balance,
            payout,
            settlement,
            reveal,
            round: round.engine.view(),
        }
    }

    /// Apply the settlement policy to a canonical outcome: `(payout, settlement, balance)`.
    async fn pay(
        &self,
        round: &OpenRound,
        settled: Settled,
    ) -> Result<(Decimal, Settlement, Decimal), HouseError> {
        let payout = settled.payout(round.bet_amount)?;
        if payout.is_zero() {
            let balance = self.ledger.balance(&round.wallet, &round.token);
            return Ok((payout, Settlement::NoPayout, balance));
        }
        if !self.config.payouts_enabled {
            let balance = self.ledger.balance(&round.wallet, &round.token);
            return Ok((payout, Settlement::Deferred, balance));
        }
        let credited = self.ledger.credit(&round.wallet, &round.token, payout)?;
        let balance = credited.amount;
        self.persist(PersistRequest::Balance(credited)).await;
        Ok((payout, Settlement::Credited, balance))
    }

    async fn refund(&self, round: &OpenRound) -> (Decimal, Settlement, Decimal) {
        match self.ledger.credit(&round.wallet, &round.token, round.bet_amount) {
            Ok(credited) => {
                let balance = credited.amount;
                self.persist(PersistRequest::Balance(credited)).await;
                (round.bet_amount, Settlement::Refunded, balance)
            }
            Err(err) => {
                error!(
                    wallet = %round.wallet,
                    authorization = %round.authorization,
                    bet_amount = %round.bet_amount,
                    ?err,
                    "stake refund failed; round needs manual review"
                );
                let balance = self.ledger.balance(&round.wallet, &round.token);
                (Decimal::ZERO, Settlement::Failed, balance)
            }
        }
    }

    fn validate_bet(&self, request: &PlaceBetRequest) -> Result<(), HouseError> {
        self.validate_amount(&request.token, request.bet_amount)?;
        if request.bet_amount < self.config.min_bet {
            return Err(HouseError::Validation(format!(
                "bet_amount below minimum {}",
                self.config.min_bet
            )));
        }
        if let Some(max_bet) = self.config.max_bet {
            if request.bet_amount > max_bet {
                return Err(HouseError::Validation(format!(
                    "bet_amount above maximum {max_bet}"
                )));
            }
        }
        RoundEngine::validate(request.game, &request.params)?;
        Ok(())
    }

    fn validate_amount(&self, token: &Token, amount: Decimal) -> Result<(), HouseError> {
        if amount <= Decimal::ZERO {
            return Err(HouseError::Validation("amount must be positive".to_string()));
        }
        if !self.config.accepts_token(token) {
            return Err(HouseError::TokenNotAccepted(token.clone()));
        }
        Ok(())
    }

    async fn persist(&self, request: PersistRequest) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        match persistence.persist(request).await {
            PersistStatus::Queued => {}
            PersistStatus::Waited => self.wager_metrics.inc_persistence_queue_full(),
            PersistStatus::Closed => error!("House persistence worker stopped; write lost"),
        }
    }
}

fn validate_text(field: &str, value: &str, max: usize) -> Result<(), HouseError> {
    if value.is_empty() {
        return Err(HouseError::Validation(format!("{field} is required")));
    }
    if value.len() > max {
        return Err(HouseError::Validation(format!(
            "{field} too long: {} (max {max})",
            value.len()
        )));
    }
    Ok(())
}
