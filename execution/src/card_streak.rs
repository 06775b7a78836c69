//! Card streak (higher or lower) implementation.
//!
//! One shuffled deck per round, drawn WITHOUT replacement. The player guesses whether the next
//! card ranks strictly higher or strictly lower than the current one:
//! - Ace (rank 1) is low, King (rank 13) is high
//! - Higher is invalid on a King, Lower is invalid on an Ace
//! - A tie is a miss
//!
//! Every correct guess advances the streak along [`STREAK_MULTIPLIERS`]. A miss ends the round
//! with the stake lost. The player may cash out at any time for the current multiplier; reaching
//! the end of the table cashes out automatically.

use arcade_types::{Guess, StreakStatus, StreakView};
use rust_decimal::Decimal;

use crate::cards::{rank, ACE, KING};
use crate::{GameError, GameRng};

/// Multiplier by streak length, in hundredths. Index 0 is the stake itself.
pub const STREAK_MULTIPLIERS: [u16; 12] = [
    100, 150, 200, 300, 450, 700, 1000, 1500, 2500, 4000, 6000, 10000,
];

/// Longest streak; reaching it cashes out.
pub const MAX_STREAK: u8 = (STREAK_MULTIPLIERS.len() - 1) as u8;

pub fn streak_multiplier(streak: u8) -> Decimal {
    let index = (streak as usize).min(STREAK_MULTIPLIERS.len() - 1);
    Decimal::new(STREAK_MULTIPLIERS[index] as i64, 2)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardStreak {
    deck: Vec<u8>,
    cards: Vec<u8>,
    streak: u8,
    status: StreakStatus,
}

impl CardStreak {
    /// Shuffle a fresh deck and deal the first card.
    pub fn deal(rng: &mut GameRng) -> Result<Self, GameError> {
        let mut deck = rng.create_deck();
        let first = deck.pop().ok_or(GameError::DeckExhausted)?;
        Ok(Self {
            deck,
            cards: vec![first],
            streak: 0,
            status: StreakStatus::Playing,
        })
    }

    pub fn current(&self) -> Option<u8> {
        self.cards.last().copied()
    }

    pub fn streak(&self) -> u8 {
        self.streak
    }

    pub fn status(&self) -> StreakStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status != StreakStatus::Playing
    }

    /// Current payout multiplier; zero once busted.
    pub fn multiplier(&self) -> Decimal {
        match self.status {
            StreakStatus::Busted => Decimal::ZERO,
            _ => streak_multiplier(self.streak),
        }
    }

    /// Whether `guess` can be made on the current card.
    pub fn can_guess(&self, guess: Guess) -> bool {
        match (self.current().map(rank), guess) {
            (Some(KING), Guess::Higher) | (Some(ACE), Guess::Lower) | (None, _) => false,
            _ => self.status == StreakStatus::Playing,
        }
    }

    pub fn guess(&mut self, guess: Guess) -> Result<StreakStatus, GameError> {
        if self.is_finished() {
            return Err(GameError::GameAlreadyComplete);
        }
        let current = self.current().ok_or(GameError::DeckExhausted)?;
        if !self.can_guess(guess) {
            return Err(GameError::InvalidMove);
        }
        let next = self.deck.pop().ok_or(GameError::DeckExhausted)?;
        self.cards.push(next);

        let correct = match guess {
            Guess::Higher => rank(next) > rank(current), // Strictly higher
            Guess::Lower => rank(next) < rank(current),  // Strictly lower
        };
        if !correct {
            self.status = StreakStatus::Busted;
        } else {
            self.streak += 1;
            if self.streak >= MAX_STREAK {
                self.status = StreakStatus::CashedOut;
            }
        }
        Ok(self.status)
    }

    /// Take the current multiplier. At streak 0 this returns the stake.
    pub fn cash_out(&mut self) -> Result<Decimal, GameError> {
        if self.is_finished() {
            return Err(GameError::GameAlreadyComplete);
        }
        self.status = StreakStatus::CashedOut;
        Ok(self.multiplier())
    }

    pub fn view(&self) -> StreakView {
        StreakView {
            cards: self.cards.clone(),
            streak: self.streak,
            multiplier: self.multiplier(),
            status: self.status,
        }
    }

    #[cfg(test)]
    fn with_cards(cards: Vec<u8>, deck: Vec<u8>) -> Self {
        Self {
            deck,
            cards,
            streak: 0,
            status: StreakStatus::Playing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cards: rank = card % 13 + 1, so 0 = Ace, 6 = Seven, 12 = King.
    const ACE_OF_SPADES: u8 = 0;
    const SEVEN_OF_SPADES: u8 = 6;
    const SEVEN_OF_HEARTS: u8 = 19;
    const NINE_OF_SPADES: u8 = 8;
    const KING_OF_SPADES: u8 = 12;

    #[test]
    fn test_deal() {
        let mut rng = GameRng::new(b"streak", 0);
        let game = CardStreak::deal(&mut rng).unwrap();
        assert_eq!(game.cards.len(), 1);
        assert_eq!(game.deck.len(), 51);
        assert!(!game.deck.contains(&game.current().unwrap()));
        assert_eq!(game.status(), StreakStatus::Playing);
        assert_eq!(game.multiplier(), Decimal::ONE);
    }

    #[test]
    fn test_cannot_guess_higher_than_king() {
        let mut game = CardStreak::with_cards(vec![KING_OF_SPADES], vec![ACE_OF_SPADES]);
        assert_eq!(game.guess(Guess::Higher), Err(GameError::InvalidMove));
        // Nothing was drawn
        assert_eq!(game.cards, vec![KING_OF_SPADES]);
    }

    #[test]
    fn test_cannot_guess_lower_than_ace() {
        let mut game = CardStreak::with_cards(vec![ACE_OF_SPADES], vec![KING_OF_SPADES]);
        assert_eq!(game.guess(Guess::Lower), Err(GameError::InvalidMove));
    }

    #[test]
    fn test_correct_guess_advances_streak() {
        let mut game = CardStreak::with_cards(vec![SEVEN_OF_SPADES], vec![NINE_OF_SPADES]);
        assert_eq!(game.guess(Guess::Higher), Ok(StreakStatus::Playing));
        assert_eq!(game.streak(), 1);
        assert_eq!(game.multiplier(), Decimal::new(150, 2));
        assert_eq!(game.current(), Some(NINE_OF_SPADES));
    }

    #[test]
    fn test_tie_is_a_miss() {
        let mut game = CardStreak::with_cards(vec![SEVEN_OF_SPADES], vec![SEVEN_OF_HEARTS]);
        assert_eq!(game.guess(Guess::Higher), Ok(StreakStatus::Busted));
        assert_eq!(game.multiplier(), Decimal::ZERO);
        assert_eq!(game.guess(Guess::Lower), Err(GameError::GameAlreadyComplete));
        assert_eq!(game.cash_out(), Err(GameError::GameAlreadyComplete));
    }

    #[test]
    fn test_cash_out_at_zero_returns_stake() {
        let mut rng = GameRng::new(b"cashout", 0);
        let mut game = CardStreak::deal(&mut rng).unwrap();
        assert_eq!(game.cash_out(), Ok(Decimal::ONE));
        assert_eq!(game.status(), StreakStatus::CashedOut);
    }

    #[test]
    fn test_max_streak_cashes_out() {
        // Alternate Ace and King so that every guess is correct.
        let mut deck = Vec::new();
        for i in 0..MAX_STREAK {
            deck.push(if i % 2 == 0 { KING_OF_SPADES + 13 } else { ACE_OF_SPADES + 13 });
        }
        deck.reverse();
        let mut game = CardStreak::with_cards(vec![ACE_OF_SPADES], deck);
        for i in 0..MAX_STREAK {
            let guess = if i % 2 == 0 { Guess::Higher } else { Guess::Lower };
            game.guess(guess).unwrap();
        }
        assert_eq!(game.status(), StreakStatus::CashedOut);
        assert_eq!(game.multiplier(), Decimal::new(10000, 2));
    }

    #[test]
    fn test_replay_from_seed() {
        let play = |seed: &[u8]| {
            let mut game = CardStreak::deal(&mut GameRng::new(seed, 0)).unwrap();
            while !game.is_finished() {
                let guess = if game.current().map(rank).unwrap_or(ACE) <= 7 {
                    Guess::Higher
                } else {
                    Guess::Lower
                };
                game.guess(guess).unwrap();
            }
            game.view()
        };
        assert_eq!(play(b"replay"), play(b"replay"));
    }
}
