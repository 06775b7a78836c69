//! Client-side game sessions.
//!
//! Every open game overlay is a [`GameInstance`] owned by the [`Arcade`]. An instance runs the
//! round state machine
//!
//! ```text
//! Idle -> Wagered -> Resolving -> Resolved -> Idle
//! ```
//!
//! on a fixed tick, independent of the network. Network round trips only happen at transitions
//! and are driven from outside (see the client adapter): the instance hands out a [`BetTicket`],
//! a guess, or an outcome report, and is told what came back.
//!
//! In real mode the displayed balance only ever takes values echoed by the house. In demo mode
//! the instance plays with a local balance and never talks to the house.

use std::collections::HashMap;

use arcade_types::{
    BalancesResponse, GameKind, GameParams, Guess, PegDrop, PlaceBetRequest, PlaceBetResponse,
    ReportOutcomeRequest, ReportOutcomeResponse, RoundResult, RoundView, StreakStatus,
    StreakView, TargetDraw, Token, Uuid, WalletAddress,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::cards::{rank, ACE, KING};
use crate::peg_board::{self, PegBoard};
use crate::{multiplier_target, CardStreak, GameError, GameRng, RoundEngine};

/// Play money granted to a fresh demo session.
pub const DEFAULT_DEMO_BALANCE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Bet size of a fresh session.
pub const DEFAULT_BET: Decimal = Decimal::ONE;

pub const DEFAULT_ROWS: u8 = 8;

/// Default multiplier target, in hundredths.
pub const DEFAULT_TARGET_HUNDREDTHS: i64 = 200;

/// Ticks a peg ball may bounce before it is settled where it is.
pub const MAX_PEG_TICKS: u32 = 60 * 60;

/// Ticks spent revealing a multiplier draw.
pub const TARGET_REVEAL_TICKS: u32 = 45;

/// Ticks a resolved round stays on screen before the instance returns to idle.
pub const RESOLVED_HOLD_TICKS: u32 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Demo,
    Real,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Wagered,
    Resolving,
    Resolved,
}

/// Choices that survive closing and reopening a game within a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPrefs {
    pub bet_amount: Decimal,
    pub token: Token,
    pub demo_balance: Decimal,
    pub params: GameParams,
}

impl SessionPrefs {
    pub fn new(game: GameKind, token: Token) -> Self {
        let params = match game {
            GameKind::PegBoard => GameParams::rows(DEFAULT_ROWS),
            GameKind::MultiplierTarget => {
                GameParams::target(Decimal::new(DEFAULT_TARGET_HUNDREDTHS, 2))
            }
            GameKind::CardStreak => GameParams::default(),
        };
        Self {
            bet_amount: DEFAULT_BET,
            token,
            demo_balance: DEFAULT_DEMO_BALANCE,
            params,
        }
    }
}

/// Everything needed to ask the house for a bet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetTicket {
    pub game: GameKind,
    pub bet_amount: Decimal,
    pub token: Token,
    pub params: GameParams,
}

impl BetTicket {
    pub fn into_request(self, wallet: WalletAddress) -> PlaceBetRequest {
        PlaceBetRequest {
            wallet,
            game: self.game,
            bet_amount: self.bet_amount,
            token: self.token,
            params: self.params,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstanceEvent {
    /// The ball landed in a slot.
    Landed { slot: u8 },
    /// The round reached its outcome, as seen by this client.
    Resolved { result: RoundResult, payout: Decimal },
    /// The instance is ready for the next bet.
    Idle,
}

#[derive(Clone, Debug)]
enum Play {
    Peg(PegBoard),
    Target { draw: TargetDraw, ticks: u32 },
    Streak {
        view: StreakView,
        /// Present in demo mode, where the deck lives on the client.
        local: Option<CardStreak>,
    },
}

#[derive(Clone, Debug)]
struct Round {
    bet_amount: Decimal,
    authorization: Option<Uuid>,
    commitment: Option<String>,
    play: Play,
    outcome: Option<(RoundResult, Decimal)>,
    reported: bool,
}

/// One open game overlay.
#[derive(Debug)]
pub struct GameInstance {
    /// Distinguishes this opening of the game from earlier ones.
    session: u64,
    game: GameKind,
    mode: Mode,
    phase: Phase,
    prefs: SessionPrefs,
    round: Option<Round>,
    /// Stake of the bet request in flight.
    bet_in_flight: Option<Decimal>,
    guess_in_flight: bool,
    report_in_flight: bool,
    needs_balance_refresh: bool,
    /// Bumped whenever the balance is invalidated from outside.
    balance_epoch: u64,
    displayed_balance: Option<Decimal>,
    resolved_ticks: u32,
}

impl GameInstance {
    pub fn new(game: GameKind, mode: Mode, prefs: SessionPrefs) -> Self {
        Self {
            session: 0,
            game,
            mode,
            phase: Phase::Idle,
            prefs,
            round: None,
            bet_in_flight: None,
            guess_in_flight: false,
            report_in_flight: false,
            // Real mode starts without a server balance to show.
            needs_balance_refresh: mode == Mode::Real,
            balance_epoch: 0,
            displayed_balance: None,
            resolved_ticks: 0,
        }
    }

    pub fn game(&self) -> GameKind {
        self.game
    }

    /// Id assigned by [`Arcade::open`]. A reopened game gets a new one.
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn prefs(&self) -> &SessionPrefs {
        &self.prefs
    }

    pub fn into_prefs(self) -> SessionPrefs {
        self.prefs
    }

    pub fn is_bet_in_flight(&self) -> bool {
        self.bet_in_flight.is_some()
    }

    pub fn is_guess_in_flight(&self) -> bool {
        self.guess_in_flight
    }

    pub fn is_report_in_flight(&self) -> bool {
        self.report_in_flight
    }

    pub fn needs_balance_refresh(&self) -> bool {
        self.needs_balance_refresh
    }

    /// Mark the displayed balance as untrusted, e.g. after a debit this instance could not apply.
    /// Balance queries issued before this call must not clear the refresh.
    pub fn invalidate_balance(&mut self) {
        if self.mode == Mode::Real {
            self.needs_balance_refresh = true;
            self.balance_epoch += 1;
        }
    }

    pub fn balance_epoch(&self) -> u64 {
        self.balance_epoch
    }

    /// Balance to show: the demo balance, or the last balance the house echoed.
    pub fn displayed_balance(&self) -> Option<Decimal> {
        match self.mode {
            Mode::Demo => Some(self.prefs.demo_balance),
            Mode::Real => self.displayed_balance,
        }
    }

    pub fn authorization(&self) -> Option<Uuid> {
        self.round.as_ref().and_then(|round| round.authorization)
    }

    pub fn commitment(&self) -> Option<&str> {
        self.round
            .as_ref()
            .and_then(|round| round.commitment.as_deref())
    }

    /// Ball position while a peg round is on screen.
    pub fn ball_position(&self) -> Option<(f64, f64)> {
        match self.round.as_ref().map(|round| &round.play) {
            Some(Play::Peg(board)) => Some(board.position()),
            _ => None,
        }
    }

    pub fn round_view(&self) -> Option<RoundView> {
        let round = self.round.as_ref()?;
        Some(match &round.play {
            Play::Peg(board) => {
                let slot = board.landed()?;
                let rows = board.rows();
                RoundView::PegBoard(PegDrop {
                    rows,
                    path: Vec::new(),
                    slot,
                    multiplier: peg_board::multiplier_for_slot(rows, slot).ok()?,
                })
            }
            Play::Target { draw, .. } => RoundView::MultiplierTarget(draw.clone()),
            Play::Streak { view, .. } => RoundView::CardStreak(view.clone()),
        })
    }

    /// Client-side outcome of the current round once resolved.
    pub fn outcome(&self) -> Option<(RoundResult, Decimal)> {
        self.round.as_ref().and_then(|round| round.outcome)
    }

    fn require_phase(&self, expected: Phase) -> Result<(), GameError> {
        if self.phase != expected {
            return Err(GameError::InvalidPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn require_quiet(&self) -> Result<(), GameError> {
        if self.bet_in_flight.is_some() || self.guess_in_flight || self.report_in_flight {
            return Err(GameError::RequestInFlight);
        }
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), GameError> {
        self.require_phase(Phase::Idle)?;
        self.require_quiet()?;
        if self.mode != mode {
            self.mode = mode;
            self.needs_balance_refresh = mode == Mode::Real;
            self.displayed_balance = None;
        }
        Ok(())
    }

    pub fn set_bet_amount(&mut self, amount: Decimal) -> Result<(), GameError> {
        self.require_phase(Phase::Idle)?;
        if amount <= Decimal::ZERO {
            return Err(GameError::InvalidBet);
        }
        self.prefs.bet_amount = amount;
        Ok(())
    }

    pub fn set_params(&mut self, params: GameParams) -> Result<(), GameError> {
        self.require_phase(Phase::Idle)?;
        RoundEngine::validate(self.game, &params)?;
        self.prefs.params = params;
        Ok(())
    }

    fn check_bet(&self) -> Result<(), GameError> {
        self.require_quiet()?;
        self.require_phase(Phase::Idle)?;
        if self.prefs.bet_amount <= Decimal::ZERO {
            return Err(GameError::InvalidBet);
        }
        RoundEngine::validate(self.game, &self.prefs.params)
    }

    /// Ask for a real-mode bet. The round cannot start until [`Self::bet_authorized`].
    pub fn request_bet(&mut self) -> Result<BetTicket, GameError> {
        if self.mode != Mode::Real {
            return Err(GameError::WrongMode);
        }
        self.check_bet()?;
        if self.needs_balance_refresh {
            return Err(GameError::BalanceRefreshRequired);
        }
        self.bet_in_flight = Some(self.prefs.bet_amount);
        Ok(BetTicket {
            game: self.game,
            bet_amount: self.prefs.bet_amount,
            token: self.prefs.token.clone(),
            params: self.prefs.params.clone(),
        })
    }

    /// The house accepted the bet and opened a round.
    pub fn bet_authorized(&mut self, response: PlaceBetResponse) -> Result<(), GameError> {
        let Some(bet_amount) = self.bet_in_flight.take() else {
            return Err(GameError::InvalidPhase {
                expected: Phase::Idle,
                actual: self.phase,
            });
        };
        self.displayed_balance = Some(response.balance);

        // From here on the stake is debited; any failure must resync before the next bet.
        let play = match response.round {
            RoundView::PegBoard(drop) if self.game == GameKind::PegBoard => {
                match PegBoard::guided(&drop) {
                    Ok(board) => Play::Peg(board),
                    Err(err) => {
                        self.needs_balance_refresh = true;
                        return Err(err);
                    }
                }
            }
            RoundView::MultiplierTarget(draw) if self.game == GameKind::MultiplierTarget => {
                Play::Target { draw, ticks: 0 }
            }
            RoundView::CardStreak(view) if self.game == GameKind::CardStreak => Play::Streak {
                view,
                local: None,
            },
            _ => {
                self.needs_balance_refresh = true;
                return Err(GameError::MismatchedRound);
            }
        };
        self.round = Some(Round {
            bet_amount,
            authorization: Some(response.authorization),
            commitment: Some(response.commitment),
            play,
            outcome: None,
            reported: false,
        });
        self.phase = Phase::Wagered;
        debug!(game = %self.game, "bet authorized");
        Ok(())
    }

    /// The bet request failed. The instance stays idle with no balance change. When the fate of
    /// the debit is unknown (a timeout), the balance must be re-queried before the next bet.
    pub fn bet_failed(&mut self, requires_refresh: bool) {
        self.bet_in_flight = None;
        if requires_refresh {
            self.needs_balance_refresh = true;
        }
    }

    /// Start a demo round, paying the stake from the demo balance.
    pub fn begin_demo_round(&mut self, rng: &mut GameRng) -> Result<(), GameError> {
        if self.mode != Mode::Demo {
            return Err(GameError::WrongMode);
        }
        self.check_bet()?;
        let bet = self.prefs.bet_amount;
        if bet > self.prefs.demo_balance {
            return Err(GameError::InsufficientDemoBalance);
        }

        let play = match self.game {
            GameKind::PegBoard => {
                let rows = self
                    .prefs
                    .params
                    .rows
                    .ok_or(GameError::MissingParameter("rows"))?;
                Play::Peg(PegBoard::release(rows, rng)?)
            }
            GameKind::MultiplierTarget => {
                let target = self
                    .prefs
                    .params
                    .target
                    .ok_or(GameError::MissingParameter("target"))?;
                Play::Target {
                    draw: multiplier_target::draw(target, rng)?,
                    ticks: 0,
                }
            }
            GameKind::CardStreak => {
                let streak = CardStreak::deal(rng)?;
                Play::Streak {
                    view: streak.view(),
                    local: Some(streak),
                }
            }
        };
        self.prefs.demo_balance -= bet;
        self.round = Some(Round {
            bet_amount: bet,
            authorization: None,
            commitment: None,
            play,
            outcome: None,
            reported: false,
        });
        self.phase = Phase::Wagered;
        Ok(())
    }

    /// Launch the wagered round.
    pub fn start(&mut self) -> Result<(), GameError> {
        self.require_phase(Phase::Wagered)?;
        self.phase = Phase::Resolving;
        Ok(())
    }

    /// Advance one fixed tick.
    pub fn tick(&mut self) -> Option<InstanceEvent> {
        match self.phase {
            Phase::Resolving => {
                let round = self.round.as_mut()?;
                match &mut round.play {
                    Play::Peg(board) => {
                        if board.ticks() >= MAX_PEG_TICKS {
                            board.run_to_rest(MAX_PEG_TICKS);
                        } else {
                            board.step();
                        }
                        let slot = board.landed()?;
                        self.resolve();
                        Some(InstanceEvent::Landed { slot })
                    }
                    Play::Target { ticks, .. } => {
                        *ticks += 1;
                        if *ticks < TARGET_REVEAL_TICKS {
                            return None;
                        }
                        self.resolve()
                    }
                    Play::Streak { .. } => None,
                }
            }
            Phase::Resolved => {
                self.resolved_ticks += 1;
                if self.resolved_ticks < RESOLVED_HOLD_TICKS || self.report_pending() {
                    return None;
                }
                self.phase = Phase::Idle;
                self.round = None;
                Some(InstanceEvent::Idle)
            }
            Phase::Idle | Phase::Wagered => None,
        }
    }

    /// A resolved real round stays on screen until its report has been handed out.
    fn report_pending(&self) -> bool {
        self.mode == Mode::Real
            && self
                .round
                .as_ref()
                .is_some_and(|round| round.outcome.is_some() && !round.reported)
    }

    fn resolve(&mut self) -> Option<InstanceEvent> {
        let round = self.round.as_mut()?;
        let bet = round.bet_amount;
        let (result, multiplier) = match &round.play {
            Play::Peg(board) => {
                let multiplier =
                    peg_board::multiplier_for_slot(board.rows(), board.landed()?).ok()?;
                if multiplier > Decimal::ONE {
                    (RoundResult::Win, multiplier)
                } else {
                    (RoundResult::Loss, multiplier)
                }
            }
            Play::Target { draw, .. } if draw.won => (RoundResult::Win, draw.target),
            Play::Target { .. } => (RoundResult::Loss, Decimal::ZERO),
            Play::Streak { view, .. } => match view.status {
                StreakStatus::Busted => (RoundResult::Loss, Decimal::ZERO),
                _ => (RoundResult::Cashout, view.multiplier),
            },
        };
        let payout = bet.checked_mul(multiplier).unwrap_or(Decimal::ZERO);
        round.outcome = Some((result, payout));
        if self.mode == Mode::Demo {
            self.prefs.demo_balance += payout;
        }
        self.phase = Phase::Resolved;
        self.resolved_ticks = 0;
        Some(InstanceEvent::Resolved { result, payout })
    }

    fn streak_mut(&mut self) -> Result<(&mut StreakView, &mut Option<CardStreak>), GameError> {
        self.require_phase(Phase::Resolving)?;
        match self.round.as_mut().map(|round| &mut round.play) {
            Some(Play::Streak { view, local }) => Ok((view, local)),
            _ => Err(GameError::UnsupportedMove),
        }
    }

    /// Guess in a demo card streak.
    pub fn guess(&mut self, guess: Guess) -> Result<Option<InstanceEvent>, GameError> {
        if self.mode != Mode::Demo {
            return Err(GameError::WrongMode);
        }
        let (view, local) = self.streak_mut()?;
        let streak = local.as_mut().ok_or(GameError::WrongMode)?;
        streak.guess(guess)?;
        *view = streak.view();
        if streak.is_finished() {
            return Ok(self.resolve());
        }
        Ok(None)
    }

    /// Ask the house to draw the next card of a real card streak.
    pub fn request_guess(&mut self, guess: Guess) -> Result<Uuid, GameError> {
        if self.mode != Mode::Real {
            return Err(GameError::WrongMode);
        }
        self.require_quiet()?;
        let authorization = self.authorization().ok_or(GameError::WrongMode)?;
        let (view, _) = self.streak_mut()?;
        match (view.current().map(rank), guess) {
            (Some(KING), Guess::Higher) | (Some(ACE), Guess::Lower) => {
                return Err(GameError::InvalidMove)
            }
            _ => {}
        }
        self.guess_in_flight = true;
        Ok(authorization)
    }

    /// The house drew the next card.
    pub fn apply_streak_view(
        &mut self,
        next: StreakView,
    ) -> Result<Option<InstanceEvent>, GameError> {
        self.guess_in_flight = false;
        let (view, _) = self.streak_mut()?;
        *view = next;
        if view.status != StreakStatus::Playing {
            return Ok(self.resolve());
        }
        Ok(None)
    }

    pub fn guess_failed(&mut self) {
        self.guess_in_flight = false;
    }

    /// Stop a card streak at its current multiplier.
    pub fn cash_out(&mut self) -> Result<Option<InstanceEvent>, GameError> {
        self.require_quiet()?;
        let (view, local) = self.streak_mut()?;
        match local {
            Some(streak) => {
                streak.cash_out()?;
                *view = streak.view();
            }
            None => {
                if view.status != StreakStatus::Playing {
                    return Err(GameError::GameAlreadyComplete);
                }
                view.status = StreakStatus::CashedOut;
            }
        }
        Ok(self.resolve())
    }

    /// Outcome report for a resolved real round, handed out once.
    pub fn take_report(&mut self, wallet: &WalletAddress) -> Option<ReportOutcomeRequest> {
        if self.mode != Mode::Real || self.phase != Phase::Resolved {
            return None;
        }
        let round = self.round.as_mut()?;
        if round.reported {
            return None;
        }
        let (result, payout) = round.outcome?;
        let authorization = round.authorization?;
        round.reported = true;
        self.report_in_flight = true;
        Some(ReportOutcomeRequest {
            wallet: wallet.clone(),
            game: self.game,
            bet_amount: round.bet_amount,
            token: self.prefs.token.clone(),
            payout,
            result,
            authorization,
        })
    }

    /// The house settled the reported round.
    pub fn settlement_received(&mut self, response: &ReportOutcomeResponse) {
        self.report_in_flight = false;
        self.displayed_balance = Some(response.balance);
    }

    /// The report failed; the house may or may not have settled it.
    pub fn report_failed(&mut self) {
        self.report_in_flight = false;
        self.needs_balance_refresh = true;
    }

    pub fn balance_refreshed(&mut self, balances: &BalancesResponse) {
        self.displayed_balance = Some(balances.amount_of(&self.prefs.token));
        self.needs_balance_refresh = false;
    }
}

/// Registry of open game instances.
///
/// Opening a game creates its instance; closing drops it, keeping only the session preferences.
/// Only open instances are ticked.
#[derive(Debug)]
pub struct Arcade {
    token: Token,
    next_session: u64,
    prefs: HashMap<GameKind, SessionPrefs>,
    instances: HashMap<GameKind, GameInstance>,
}

impl Arcade {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            next_session: 1,
            prefs: HashMap::new(),
            instances: HashMap::new(),
        }
    }

    /// Open `game`, or return it if it is already open.
    pub fn open(&mut self, game: GameKind, mode: Mode) -> &mut GameInstance {
        let prefs = self
            .prefs
            .get(&game)
            .cloned()
            .unwrap_or_else(|| SessionPrefs::new(game, self.token.clone()));
        let next_session = &mut self.next_session;
        self.instances.entry(game).or_insert_with(|| {
            let mut instance = GameInstance::new(game, mode, prefs);
            instance.session = *next_session;
            *next_session += 1;
            instance
        })
    }

    /// Close `game`, dropping its instance. Returns false if it was not open.
    pub fn close(&mut self, game: GameKind) -> bool {
        match self.instances.remove(&game) {
            Some(instance) => {
                self.prefs.insert(game, instance.into_prefs());
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, game: GameKind) -> bool {
        self.instances.contains_key(&game)
    }

    pub fn get(&self, game: GameKind) -> Option<&GameInstance> {
        self.instances.get(&game)
    }

    pub fn get_mut(&mut self, game: GameKind) -> Option<&mut GameInstance> {
        self.instances.get_mut(&game)
    }

    /// Preferences `game` would open with.
    pub fn prefs(&self, game: GameKind) -> SessionPrefs {
        match self.instances.get(&game) {
            Some(instance) => instance.prefs().clone(),
            None => self
                .prefs
                .get(&game)
                .cloned()
                .unwrap_or_else(|| SessionPrefs::new(game, self.token.clone())),
        }
    }

    /// Tick every open instance.
    pub fn tick_all(&mut self) -> Vec<(GameKind, InstanceEvent)> {
        let mut events = Vec::new();
        for (game, instance) in self.instances.iter_mut() {
            if let Some(event) = instance.tick() {
                events.push((*game, event));
            }
        }
        events
    }
}
