//! Glue between open game instances and the wager protocol.
//!
//! The tick loop never waits on the network. Calls are spawned onto the runtime with a bounded
//! timeout, and their completions are applied to the owning instance on the next
//! [`WagerAdapter::poll`]. An in-flight call is never aborted by the adapter; a call that outlives
//! its timeout is treated as failed without assuming whether the house applied it.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use arcade_execution::{Arcade, GameInstance, InstanceEvent, Mode};
use arcade_types::{
    BalancesResponse, GameKind, Guess, GuessRequest, GuessResponse, PlaceBetResponse,
    ReportOutcomeResponse, RoundView, WalletAddress,
};
use rust_decimal::Decimal;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{Client, Error, Result};

/// Default bound on every protocol call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum wait between balance queries after one failed.
const BALANCE_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallKind {
    Bet,
    Guess,
    Report,
    Balance,
}

enum Completion {
    Bet(Result<PlaceBetResponse>),
    Guess(Result<GuessResponse>),
    Report(Result<ReportOutcomeResponse>),
    Balance(Result<BalancesResponse>),
}

impl CallKind {
    fn failed(self, error: Error) -> Completion {
        match self {
            CallKind::Bet => Completion::Bet(Err(error)),
            CallKind::Guess => Completion::Guess(Err(error)),
            CallKind::Report => Completion::Report(Err(error)),
            CallKind::Balance => Completion::Balance(Err(error)),
        }
    }
}

/// The instance a call was made for, as it was when the call was spawned.
#[derive(Clone, Copy, Debug)]
struct Caller {
    game: GameKind,
    session: u64,
    balance_epoch: u64,
}

impl Caller {
    fn of(instance: &GameInstance) -> Self {
        Self {
            game: instance.game(),
            session: instance.session(),
            balance_epoch: instance.balance_epoch(),
        }
    }
}

struct PendingCall {
    caller: Caller,
    kind: CallKind,
    receiver: oneshot::Receiver<Completion>,
}

/// What a completed call did to its game.
#[derive(Debug)]
pub enum AdapterEvent {
    /// The house debited the stake; the round may start.
    BetAuthorized { game: GameKind },
    /// The bet was not authorized and the instance is idle again.
    BetFailed { game: GameKind, error: Error },
    /// The house drew the next card. `event` is set when the streak ended.
    CardDrawn {
        game: GameKind,
        event: Option<InstanceEvent>,
    },
    GuessFailed { game: GameKind, error: Error },
    Settled {
        game: GameKind,
        response: ReportOutcomeResponse,
    },
    ReportFailed { game: GameKind, error: Error },
    BalanceRefreshed { game: GameKind, balance: Decimal },
    BalanceFailed { game: GameKind, error: Error },
    /// The call no longer applies: its instance was closed (and possibly reopened), or the balance
    /// it fetched was invalidated while in flight.
    Discarded { game: GameKind },
}

pub struct WagerAdapter {
    client: Client,
    wallet: WalletAddress,
    timeout: Duration,
    pending: Vec<PendingCall>,
    balance_retry_at: HashMap<u64, Instant>,
}

impl WagerAdapter {
    pub fn new(client: Client, wallet: WalletAddress) -> Self {
        Self {
            client,
            wallet,
            timeout: DEFAULT_CALL_TIMEOUT,
            pending: Vec::new(),
            balance_retry_at: HashMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn wallet(&self) -> &WalletAddress {
        &self.wallet
    }

    /// Calls spawned and not yet applied.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Ask the house to authorize a bet for `game`. The round stays idle until the
    /// [`AdapterEvent::BetAuthorized`] completion is applied.
    pub fn place_bet(&mut self, arcade: &mut Arcade, game: GameKind) -> Result<()> {
        let instance = open_instance(arcade, game)?;
        let caller = Caller::of(instance);
        let request = instance.request_bet()?.into_request(self.wallet.clone());
        debug!(%game, bet_amount = %request.bet_amount, "bet requested");
        let client = self.client.clone();
        self.spawn(
            caller,
            CallKind::Bet,
            async move { client.place_bet(&request).await },
            Completion::Bet,
        );
        Ok(())
    }

    /// Ask the house to draw the next card of a real card streak.
    pub fn guess(&mut self, arcade: &mut Arcade, game: GameKind, guess: Guess) -> Result<()> {
        let instance = open_instance(arcade, game)?;
        let caller = Caller::of(instance);
        let authorization = instance.request_guess(guess)?;
        let request = GuessRequest {
            wallet: self.wallet.clone(),
            authorization,
            guess,
        };
        let client = self.client.clone();
        self.spawn(
            caller,
            CallKind::Guess,
            async move { client.guess(&request).await },
            Completion::Guess,
        );
        Ok(())
    }

    /// Apply finished calls, then send the reports and balance queries open games are waiting on.
    pub fn poll(&mut self, arcade: &mut Arcade) -> Vec<AdapterEvent> {
        let mut events = Vec::new();
        for mut call in std::mem::take(&mut self.pending) {
            let completion = match call.receiver.try_recv() {
                Ok(completion) => completion,
                Err(oneshot::error::TryRecvError::Empty) => {
                    self.pending.push(call);
                    continue;
                }
                Err(oneshot::error::TryRecvError::Closed) => {
                    call.kind.failed(Error::UnexpectedResponse)
                }
            };
            events.push(self.apply(arcade, &call, completion));
        }

        for game in GameKind::ALL {
            if let Some(instance) = arcade.get_mut(game) {
                self.drive(game, instance);
            }
        }
        events
    }

    fn drive(&mut self, game: GameKind, instance: &mut GameInstance) {
        if instance.mode() != Mode::Real {
            return;
        }
        let caller = Caller::of(instance);
        let session = caller.session;
        if let Some(request) = instance.take_report(&self.wallet) {
            debug!(%game, result = request.result.as_str(), "reporting outcome");
            let client = self.client.clone();
            self.spawn(
                caller,
                CallKind::Report,
                async move { client.report_outcome(&request).await },
                Completion::Report,
            );
        }
        let waiting = self
            .balance_retry_at
            .get(&session)
            .is_some_and(|retry_at| Instant::now() < *retry_at);
        if instance.needs_balance_refresh()
            && !instance.is_report_in_flight()
            && !waiting
            && !self.has_pending(session, CallKind::Balance)
        {
            let client = self.client.clone();
            let wallet = self.wallet.clone();
            self.spawn(
                caller,
                CallKind::Balance,
                async move { client.balances(&wallet).await },
                Completion::Balance,
            );
        }
    }

    fn apply(
        &mut self,
        arcade: &mut Arcade,
        call: &PendingCall,
        completion: Completion,
    ) -> AdapterEvent {
        let Caller {
            game,
            session,
            balance_epoch,
        } = call.caller;
        let instance = match arcade.get_mut(game) {
            Some(instance) if instance.session() == session => instance,
            reopened => {
                if call.kind == CallKind::Balance {
                    self.balance_retry_at.remove(&session);
                }
                // A bet the house may have debited leaves any newer instance's balance stale
                let may_have_debited = match &completion {
                    Completion::Bet(Ok(_)) => true,
                    Completion::Bet(Err(error)) => !error.is_rejection(),
                    _ => false,
                };
                if let Some(instance) = reopened {
                    if may_have_debited {
                        instance.invalidate_balance();
                    }
                }
                warn!(%game, session, "completion for a closed game discarded");
                return AdapterEvent::Discarded { game };
            }
        };
        match completion {
            Completion::Bet(Ok(response)) => match instance.bet_authorized(response) {
                Ok(()) => AdapterEvent::BetAuthorized { game },
                Err(err) => {
                    // The house debited a stake this instance could not take on
                    instance.invalidate_balance();
                    warn!(%game, %err, "authorized bet could not be applied");
                    AdapterEvent::BetFailed {
                        game,
                        error: err.into(),
                    }
                }
            },
            Completion::Bet(Err(error)) => {
                // Only a definite answer from the house rules out a debit.
                instance.bet_failed(!error.is_rejection());
                warn!(%game, %error, "bet failed");
                AdapterEvent::BetFailed { game, error }
            }
            Completion::Guess(Ok(GuessResponse {
                round: RoundView::CardStreak(view),
            })) => match instance.apply_streak_view(view) {
                Ok(event) => AdapterEvent::CardDrawn { game, event },
                Err(err) => AdapterEvent::GuessFailed {
                    game,
                    error: err.into(),
                },
            },
            Completion::Guess(Ok(_)) => {
                instance.guess_failed();
                AdapterEvent::GuessFailed {
                    game,
                    error: Error::UnexpectedResponse,
                }
            }
            Completion::Guess(Err(error)) => {
                instance.guess_failed();
                AdapterEvent::GuessFailed { game, error }
            }
            Completion::Report(Ok(response)) => {
                instance.settlement_received(&response);
                AdapterEvent::Settled { game, response }
            }
            Completion::Report(Err(error)) => {
                instance.report_failed();
                warn!(%game, %error, "outcome report failed");
                AdapterEvent::ReportFailed { game, error }
            }
            Completion::Balance(Ok(_)) if instance.balance_epoch() != balance_epoch => {
                // Asked before the balance was invalidated; the next poll asks again
                debug!(%game, "stale balance discarded");
                AdapterEvent::Discarded { game }
            }
            Completion::Balance(Ok(balances)) => {
                instance.balance_refreshed(&balances);
                self.balance_retry_at.remove(&session);
                AdapterEvent::BalanceRefreshed {
                    game,
                    balance: instance.displayed_balance().unwrap_or_default(),
                }
            }
            Completion::Balance(Err(error)) => {
                self.balance_retry_at
                    .insert(session, Instant::now() + BALANCE_RETRY_DELAY);
                AdapterEvent::BalanceFailed { game, error }
            }
        }
    }

    fn has_pending(&self, session: u64, kind: CallKind) -> bool {
        self.pending
            .iter()
            .any(|call| call.caller.session == session && call.kind == kind)
    }

    fn spawn<T, F, W>(&mut self, caller: Caller, kind: CallKind, call: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Result<T>) -> Completion + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            };
            // The adapter may have been dropped
            let _ = sender.send(wrap(result));
        });
        self.pending.push(PendingCall {
            caller,
            kind,
            receiver,
        });
    }
}

fn open_instance(arcade: &mut Arcade, game: GameKind) -> Result<&mut GameInstance> {
    arcade.get_mut(game).ok_or(Error::NotOpen(game))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::TestServer;
    use arcade_execution::{GameError, Phase};
    use arcade_house::HouseConfig;
    use arcade_types::{
        DepositRequest, Settlement, StreakStatus, Token, TokenBalance, WagerHistoryQuery,
    };
    use tokio::time::sleep;

    const TICKS_PER_PUMP: usize = 10;

    fn wallet() -> WalletAddress {
        WalletAddress::parse("0xadapter").unwrap()
    }

    fn token() -> Token {
        Token::parse("MIL").unwrap()
    }

    async fn fund(server: &TestServer, amount: i64) {
        server
            .house
            .record_deposit(DepositRequest {
                wallet: wallet(),
                tx_id: "0xfunding".to_string(),
                token: token(),
                amount: Decimal::new(amount, 0),
                chain: "base".to_string(),
            })
            .await
            .unwrap();
    }

    async fn pump_until(
        adapter: &mut WagerAdapter,
        arcade: &mut Arcade,
        mut done: impl FnMut(&AdapterEvent) -> bool,
    ) -> AdapterEvent {
        for _ in 0..2_000 {
            for event in adapter.poll(arcade) {
                if done(&event) {
                    return event;
                }
            }
            for _ in 0..TICKS_PER_PUMP {
                arcade.tick_all();
            }
            sleep(Duration::from_millis(2)).await;
        }
        panic!("adapter did not produce the expected event");
    }

    async fn ready(
        server: &TestServer,
        game: GameKind,
    ) -> (WagerAdapter, Arcade) {
        let client = Client::new(&server.base_url).unwrap();
        let mut adapter = WagerAdapter::new(client, wallet());
        let mut arcade = Arcade::new(token());
        arcade.open(game, Mode::Real);
        pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::BalanceRefreshed { .. })
        })
        .await;
        (adapter, arcade)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejected_bet_returns_to_idle() {
        let server = TestServer::start(HouseConfig::default()).await;
        let (mut adapter, mut arcade) = ready(&server, GameKind::PegBoard).await;
        assert_eq!(
            arcade.get(GameKind::PegBoard).unwrap().displayed_balance(),
            Some(Decimal::ZERO)
        );

        adapter.place_bet(&mut arcade, GameKind::PegBoard).unwrap();
        let instance = arcade.get_mut(GameKind::PegBoard).unwrap();
        assert!(instance.is_bet_in_flight());
        // The round cannot start while the bet is in flight
        assert!(instance.start().is_err());
        assert!(matches!(
            adapter.place_bet(&mut arcade, GameKind::PegBoard),
            Err(Error::Game(GameError::RequestInFlight))
        ));

        let event = pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::BetFailed { .. })
        })
        .await;
        let AdapterEvent::BetFailed { error, .. } = event else {
            unreachable!();
        };
        assert!(error.is_insufficient_balance(), "unexpected error: {error}");

        let instance = arcade.get(GameKind::PegBoard).unwrap();
        assert_eq!(instance.phase(), Phase::Idle);
        assert!(!instance.is_bet_in_flight());
        assert!(!instance.needs_balance_refresh());
        assert_eq!(instance.displayed_balance(), Some(Decimal::ZERO));
        assert_eq!(server.house.open_rounds(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peg_round_is_reported_after_landing() {
        let server = TestServer::start(HouseConfig::default()).await;
        fund(&server, 10).await;
        let (mut adapter, mut arcade) = ready(&server, GameKind::PegBoard).await;
        assert_eq!(
            arcade.get(GameKind::PegBoard).unwrap().displayed_balance(),
            Some(Decimal::new(10, 0))
        );

        adapter.place_bet(&mut arcade, GameKind::PegBoard).unwrap();
        pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::BetAuthorized { .. })
        })
        .await;
        let instance = arcade.get_mut(GameKind::PegBoard).unwrap();
        assert_eq!(instance.phase(), Phase::Wagered);
        assert_eq!(instance.displayed_balance(), Some(Decimal::new(9, 0)));
        instance.start().unwrap();

        let event = pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::Settled { .. })
        })
        .await;
        let AdapterEvent::Settled { response, .. } = event else {
            unreachable!();
        };
        // Payouts are disabled, so the debit stands
        assert_ne!(response.settlement, Settlement::Credited);
        assert_eq!(response.balance, Decimal::new(9, 0));
        assert_eq!(
            arcade.get(GameKind::PegBoard).unwrap().displayed_balance(),
            Some(Decimal::new(9, 0))
        );
        let history = server.house.wager_history(&WagerHistoryQuery {
            wallet: wallet(),
            limit: None,
        });
        assert_eq!(history.wagers.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_card_streak_guess_then_cash_out() {
        let server = TestServer::start(HouseConfig {
            payouts_enabled: true,
            ..Default::default()
        })
        .await;
        fund(&server, 10).await;
        let (mut adapter, mut arcade) = ready(&server, GameKind::CardStreak).await;

        adapter.place_bet(&mut arcade, GameKind::CardStreak).unwrap();
        pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::BetAuthorized { .. })
        })
        .await;
        let instance = arcade.get_mut(GameKind::CardStreak).unwrap();
        instance.start().unwrap();
        let Some(RoundView::CardStreak(view)) = instance.round_view() else {
            panic!("expected card streak round");
        };
        let rank = arcade_execution::cards::rank(view.cards[0]);
        let guess = if rank <= 7 { Guess::Higher } else { Guess::Lower };
        adapter
            .guess(&mut arcade, GameKind::CardStreak, guess)
            .unwrap();
        assert!(arcade
            .get(GameKind::CardStreak)
            .unwrap()
            .is_guess_in_flight());

        let event = pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::CardDrawn { .. })
        })
        .await;
        let AdapterEvent::CardDrawn { event, .. } = event else {
            unreachable!();
        };
        if event.is_none() {
            let instance = arcade.get_mut(GameKind::CardStreak).unwrap();
            assert!(instance.cash_out().unwrap().is_some());
        }

        let event = pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::Settled { .. })
        })
        .await;
        let AdapterEvent::Settled { response, .. } = event else {
            unreachable!();
        };
        let RoundView::CardStreak(settled) = response.round else {
            panic!("expected card streak round");
        };
        assert_eq!(settled.cards.len(), 2);
        match settled.status {
            StreakStatus::Busted => assert_eq!(response.settlement, Settlement::NoPayout),
            _ => assert_eq!(response.settlement, Settlement::Credited),
        }
        assert_eq!(
            server.house.balances(&wallet()).amount_of(&token()),
            response.balance
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_requires_balance_refresh() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = Client::new(&format!("http://{addr}")).unwrap();
        let mut adapter =
            WagerAdapter::new(client, wallet()).with_timeout(Duration::from_millis(100));
        let mut arcade = Arcade::new(token());
        let instance = arcade.open(GameKind::MultiplierTarget, Mode::Real);
        instance.balance_refreshed(&BalancesResponse {
            balances: vec![TokenBalance {
                token: token(),
                amount: Decimal::new(10, 0),
            }],
        });

        adapter
            .place_bet(&mut arcade, GameKind::MultiplierTarget)
            .unwrap();
        let event = pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::BetFailed { .. })
        })
        .await;
        assert!(matches!(
            event,
            AdapterEvent::BetFailed {
                error: Error::Timeout,
                ..
            }
        ));

        let instance = arcade.get_mut(GameKind::MultiplierTarget).unwrap();
        assert_eq!(instance.phase(), Phase::Idle);
        assert!(instance.needs_balance_refresh());
        assert_eq!(
            instance.request_bet().unwrap_err(),
            GameError::BalanceRefreshRequired
        );
        drop(listener);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_closed_game_discards_completion() {
        let server = TestServer::start(HouseConfig::default()).await;
        fund(&server, 10).await;
        let (mut adapter, mut arcade) = ready(&server, GameKind::PegBoard).await;

        adapter.place_bet(&mut arcade, GameKind::PegBoard).unwrap();
        assert!(arcade.close(GameKind::PegBoard));
        let event = pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::Discarded { .. })
        })
        .await;
        assert!(matches!(
            event,
            AdapterEvent::Discarded {
                game: GameKind::PegBoard
            }
        ));
        assert_eq!(adapter.in_flight(), 0);
        // The house holds the round until it is reported or expires
        assert_eq!(server.house.open_rounds(), 1);
        assert!(matches!(
            adapter.place_bet(&mut arcade, GameKind::PegBoard),
            Err(Error::NotOpen(GameKind::PegBoard))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gateway_error_requires_balance_refresh() {
        // A proxy that gives up on the house and answers for it
        let router = axum::Router::new().route(
            "/bet",
            axum::routing::post(|| async {
                (axum::http::StatusCode::GATEWAY_TIMEOUT, "upstream timed out")
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let proxy = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let client = Client::new(&format!("http://{addr}")).unwrap();
        let mut adapter = WagerAdapter::new(client, wallet());
        let mut arcade = Arcade::new(token());
        let instance = arcade.open(GameKind::PegBoard, Mode::Real);
        instance.balance_refreshed(&BalancesResponse {
            balances: vec![TokenBalance {
                token: token(),
                amount: Decimal::new(10, 0),
            }],
        });

        adapter.place_bet(&mut arcade, GameKind::PegBoard).unwrap();
        let mut failure = None;
        for _ in 0..2_000 {
            if let Some(AdapterEvent::BetFailed { error, .. }) = adapter
                .poll(&mut arcade)
                .into_iter()
                .find(|event| matches!(event, AdapterEvent::BetFailed { .. }))
            {
                failure = Some(error);
                break;
            }
            sleep(Duration::from_millis(2)).await;
        }
        let error = failure.expect("bet should fail");
        assert!(
            matches!(
                error,
                Error::FailedWithBody {
                    status: reqwest::StatusCode::GATEWAY_TIMEOUT,
                    ..
                }
            ),
            "unexpected error: {error}"
        );

        // The house may have debited before the proxy gave up
        let instance = arcade.get_mut(GameKind::PegBoard).unwrap();
        assert_eq!(instance.phase(), Phase::Idle);
        assert!(instance.needs_balance_refresh());
        assert_eq!(
            instance.request_bet().unwrap_err(),
            GameError::BalanceRefreshRequired
        );
        proxy.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reopened_game_ignores_bet_of_previous_opening() {
        let server = TestServer::start(HouseConfig::default()).await;
        fund(&server, 10).await;
        let (mut adapter, mut arcade) = ready(&server, GameKind::PegBoard).await;

        adapter.place_bet(&mut arcade, GameKind::PegBoard).unwrap();
        assert!(arcade.close(GameKind::PegBoard));
        let instance = arcade.open(GameKind::PegBoard, Mode::Real);
        instance.set_bet_amount(Decimal::new(2, 0)).unwrap();

        // Wait for the old bet to land and for a balance taken after it
        let mut discarded = false;
        let mut authorized = false;
        for _ in 0..2_000 {
            for event in adapter.poll(&mut arcade) {
                match event {
                    AdapterEvent::Discarded { .. } => discarded = true,
                    AdapterEvent::BetAuthorized { .. } => authorized = true,
                    _ => {}
                }
            }
            let instance = arcade.get(GameKind::PegBoard).unwrap();
            if discarded && !instance.needs_balance_refresh() {
                break;
            }
            sleep(Duration::from_millis(2)).await;
        }
        assert!(discarded);
        assert!(!authorized, "the old bet must not start a round");
        let instance = arcade.get(GameKind::PegBoard).unwrap();
        assert_eq!(instance.phase(), Phase::Idle);
        assert_eq!(instance.displayed_balance(), Some(Decimal::new(9, 0)));

        adapter.place_bet(&mut arcade, GameKind::PegBoard).unwrap();
        pump_until(&mut adapter, &mut arcade, |event| {
            matches!(event, AdapterEvent::BetAuthorized { .. })
        })
        .await;
        let instance = arcade.get_mut(GameKind::PegBoard).unwrap();
        assert_eq!(instance.displayed_balance(), Some(Decimal::new(7, 0)));
        instance.start().unwrap();

        let event = pump_until(&mut adapter, &mut arcade, |event| {
            matches!(
                event,
                AdapterEvent::Settled { .. } | AdapterEvent::ReportFailed { .. }
            )
        })
        .await;
        let AdapterEvent::Settled { response, .. } = event else {
            panic!("report should be accepted: {event:?}");
        };
        assert_eq!(response.balance, Decimal::new(7, 0));
        // The first round stays open until it expires
        assert_eq!(server.house.open_rounds(), 1);
    }
}
