//! Game identifiers, round parameters, and the round views the house streams to
//! clients for rendering.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    PegBoard,
    MultiplierTarget,
    CardStreak,
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [
        GameKind::PegBoard,
        GameKind::MultiplierTarget,
        GameKind::CardStreak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::PegBoard => "peg_board",
            GameKind::MultiplierTarget => "multiplier_target",
            GameKind::CardStreak => "card_streak",
        }
    }
}

impl FromStr for GameKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseError::UnknownGame(s.to_string()))
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-round choices made before the bet is placed.
///
/// `rows` applies to the peg board and `target` to the multiplier game; the card
/// streak takes its choices one guess at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Decimal>,
}

impl GameParams {
    pub fn rows(rows: u8) -> Self {
        Self {
            rows: Some(rows),
            target: None,
        }
    }

    pub fn target(target: Decimal) -> Self {
        Self {
            rows: None,
            target: Some(target),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guess {
    Higher,
    Lower,
}

impl FromStr for Guess {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "higher" | "hi" => Ok(Guess::Higher),
            "lower" | "lo" => Ok(Guess::Lower),
            _ => Err(ParseError::UnknownGuess(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bounce {
    Left,
    Right,
}

/// Canonical peg-board drop: one bounce per row, landing slot, and its multiplier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegDrop {
    pub rows: u8,
    pub path: Vec<Bounce>,
    pub slot: u8,
    pub multiplier: Decimal,
}

/// Multiplier-target draw against the player's chosen target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDraw {
    pub target: Decimal,
    pub result: Decimal,
    pub won: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakStatus {
    Playing,
    Busted,
    CashedOut,
}

/// Card-streak progress. `cards` lists every card revealed so far, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakView {
    pub cards: Vec<u8>,
    pub streak: u8,
    pub multiplier: Decimal,
    pub status: StreakStatus,
}

impl StreakView {
    pub fn current(&self) -> Option<u8> {
        self.cards.last().copied()
    }
}

/// What the house streams to a client for rendering a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum RoundView {
    PegBoard(PegDrop),
    MultiplierTarget(TargetDraw),
    CardStreak(StreakView),
}

impl RoundView {
    pub fn kind(&self) -> GameKind {
        match self {
            RoundView::PegBoard(_) => GameKind::PegBoard,
            RoundView::MultiplierTarget(_) => GameKind::MultiplierTarget,
            RoundView::CardStreak(_) => GameKind::CardStreak,
        }
    }
}

/// How a round ended, as reported by the client and as settled by the house.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundResult {
    Win,
    #[serde(alias = "lose")]
    Loss,
    Cashout,
}

impl RoundResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundResult::Win => "win",
            RoundResult::Loss => "loss",
            RoundResult::Cashout => "cashout",
        }
    }
}
