//! Common types used throughout the arcade.
//!
//! Everything here crosses the wire between the house and its clients, so every
//! type is `serde` friendly and validates itself on deserialization.

pub mod api;
pub mod constants;
pub mod game;
pub mod wallet;

pub use api::*;
pub use constants::*;
pub use game::*;
pub use wallet::{normalize_tx_id, ParseError, Token, WalletAddress};

pub use rust_decimal::Decimal;
pub use uuid::Uuid;
