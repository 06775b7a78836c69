//! Shared playing-card helpers.
//!
//! Cards are encoded as `0..=51`, where:
//! - suit = card / 13 (0..=3)
//! - rank = card % 13 (0..=12)
//!
//! The card streak compares Ace low (rank 1) through King (rank 13).

/// Total cards in a standard deck.
pub const CARDS_PER_DECK: u8 = 52;

/// Ranks per suit.
pub const RANKS_PER_SUIT: u8 = 13;

pub const ACE: u8 = 1;
pub const KING: u8 = 13;

pub fn is_valid_card(card: u8) -> bool {
    card < CARDS_PER_DECK
}

/// Returns the 1-based rank (1..=13), where 1 is Ace and 13 is King.
pub fn rank(card: u8) -> u8 {
    card % RANKS_PER_SUIT + 1
}

/// Returns the suit (0..=3).
pub fn suit(card: u8) -> u8 {
    card / RANKS_PER_SUIT
}

/// Short label such as `"QH"` or `"10S"`.
pub fn label(card: u8) -> String {
    let rank = match rank(card) {
        1 => "A".to_string(),
        11 => "J".to_string(),
        12 => "Q".to_string(),
        13 => "K".to_string(),
        n => n.to_string(),
    };
    let suit = match suit(card) {
        0 => 'S',
        1 => 'H',
        2 => 'D',
        _ => 'C',
    };
    format!("{rank}{suit}")
}
