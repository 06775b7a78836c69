//! Arcade execution layer.
//!
//! This crate contains the deterministic game engines used by the house to compute canonical
//! round outcomes, and the client-side session state machines that render them.
//!
//! ## Determinism requirements
//! - Do not use wall-clock time inside the engines.
//! - Only derive randomness from the provided seed (the round's reveal on the house, a local
//!   seed in demo mode).
//! - Anyone holding a round's reveal must be able to reproduce its outcome with [`RoundEngine`].
//!
//! ## Round lifecycle (house side)
//! ```rust,ignore
//! use arcade_execution::{derive_reveal, compute_commit, RoundEngine};
//!
//! let reveal = derive_reveal(&house_secret, authorization.as_bytes());
//! let commitment = compute_commit(&reveal);
//! let mut engine = RoundEngine::open(game, &params, &reveal)?;
//! let view = engine.view(); // streamed to the client for rendering
//! let settled = engine.settle();
//! let payout = settled.payout(bet_amount)?;
//! ```

pub mod card_streak;
pub mod cards;
mod error;
pub mod fairness;
pub mod multiplier_target;
pub mod peg_board;
pub mod rng;
pub mod round;
pub mod session;

pub use card_streak::CardStreak;
pub use error::GameError;
pub use fairness::{
    compute_commit, derive_reveal, verify_commit_reveal, verify_commit_reveal_hex,
    CommitRevealError, COMMIT_REVEAL_LEN,
};
pub use peg_board::PegBoard;
pub use rng::GameRng;
pub use round::{RoundEngine, Settled};
pub use session::{
    Arcade, BetTicket, GameInstance, InstanceEvent, Mode, Phase, SessionPrefs,
};
