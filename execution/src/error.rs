use rust_decimal::Decimal;
use thiserror::Error;

use crate::session::Phase;

/// Error during game execution or session handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("peg board rows must be one of 8, 12 or 16 (got {0})")]
    InvalidRows(u8),
    #[error("multiplier target must be 1.01 to 10000.00 with at most two decimals (got {0})")]
    InvalidTarget(Decimal),
    #[error("missing game parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid move for the current card")]
    InvalidMove,
    #[error("move not supported by this game")]
    UnsupportedMove,
    #[error("round already complete")]
    GameAlreadyComplete,
    #[error("deck exhausted")]
    DeckExhausted,
    #[error("amount overflow")]
    Overflow,
    #[error("bet amount must be positive")]
    InvalidBet,
    #[error("insufficient demo balance")]
    InsufficientDemoBalance,
    #[error("expected phase {expected:?}, instance is {actual:?}")]
    InvalidPhase { expected: Phase, actual: Phase },
    #[error("operation not available in this mode")]
    WrongMode,
    #[error("a request is already in flight")]
    RequestInFlight,
    #[error("balance must be refreshed before the next bet")]
    BalanceRefreshRequired,
    #[error("round view does not match the open game")]
    MismatchedRound,
}
