//! Canonical round engine.
//!
//! A round is opened from its reveal and settles to a result and multiplier. Everything the
//! engine does is a function of the game, its parameters, the reveal, and (for the card streak)
//! the player's guesses, so a settled round can be replayed by anyone holding the reveal.

use arcade_types::{GameKind, GameParams, Guess, PegDrop, RoundResult, RoundView, TargetDraw};
use rust_decimal::Decimal;

use crate::{multiplier_target, peg_board, CardStreak, GameError, GameRng};

/// RNG stream used for a round's outcome.
const OUTCOME_STREAM: u64 = 0;

#[derive(Clone, Debug)]
pub enum RoundEngine {
    PegBoard(PegDrop),
    MultiplierTarget(TargetDraw),
    CardStreak(CardStreak),
}

/// Final result and multiplier of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settled {
    pub result: RoundResult,
    pub multiplier: Decimal,
}

impl Settled {
    /// Total return for `bet` (stake included).
    pub fn payout(&self, bet: Decimal) -> Result<Decimal, GameError> {
        bet.checked_mul(self.multiplier).ok_or(GameError::Overflow)
    }
}

impl RoundEngine {
    /// Check that `params` carry what `game` needs.
    pub fn validate(game: GameKind, params: &GameParams) -> Result<(), GameError> {
        match game {
            GameKind::PegBoard => {
                peg_board::validate_rows(params.rows.ok_or(GameError::MissingParameter("rows"))?)
            }
            GameKind::MultiplierTarget => multiplier_target::validate_target(
                params.target.ok_or(GameError::MissingParameter("target"))?,
            ),
            GameKind::CardStreak => Ok(()),
        }
    }

    /// Open a round from its reveal.
    pub fn open(game: GameKind, params: &GameParams, reveal: &[u8]) -> Result<Self, GameError> {
        Self::validate(game, params)?;
        let mut rng = GameRng::new(reveal, OUTCOME_STREAM);
        match game {
            GameKind::PegBoard => {
                let rows = params.rows.ok_or(GameError::MissingParameter("rows"))?;
                Ok(Self::PegBoard(peg_board::canonical_drop(rows, &mut rng)?))
            }
            GameKind::MultiplierTarget => {
                let target = params.target.ok_or(GameError::MissingParameter("target"))?;
                Ok(Self::MultiplierTarget(multiplier_target::draw(target, &mut rng)?))
            }
            GameKind::CardStreak => Ok(Self::CardStreak(CardStreak::deal(&mut rng)?)),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            Self::PegBoard(_) => GameKind::PegBoard,
            Self::MultiplierTarget(_) => GameKind::MultiplierTarget,
            Self::CardStreak(_) => GameKind::CardStreak,
        }
    }

    pub fn view(&self) -> RoundView {
        match self {
            Self::PegBoard(drop) => RoundView::PegBoard(drop.clone()),
            Self::MultiplierTarget(draw) => RoundView::MultiplierTarget(draw.clone()),
            Self::CardStreak(streak) => RoundView::CardStreak(streak.view()),
        }
    }

    /// Peg and target rounds are decided when opened; a card streak once busted or cashed out.
    pub fn is_finished(&self) -> bool {
        match self {
            Self::CardStreak(streak) => streak.is_finished(),
            _ => true,
        }
    }

    pub fn guess(&mut self, guess: Guess) -> Result<RoundView, GameError> {
        match self {
            Self::CardStreak(streak) => {
                streak.guess(guess)?;
                Ok(RoundView::CardStreak(streak.view()))
            }
            _ => Err(GameError::UnsupportedMove),
        }
    }

    /// Settle the round. A card streak still in play cashes out at its current streak.
    pub fn settle(&mut self) -> Settled {
        match self {
            Self::PegBoard(drop) => Settled {
                result: if drop.multiplier > Decimal::ONE {
                    RoundResult::Win
                } else {
                    RoundResult::Loss
                },
                multiplier: drop.multiplier,
            },
            Self::MultiplierTarget(draw) if draw.won => Settled {
                result: RoundResult::Win,
                multiplier: draw.target,
            },
            Self::MultiplierTarget(_) => Settled {
                result: RoundResult::Loss,
                multiplier: Decimal::ZERO,
            },
            Self::CardStreak(streak) => {
                if !streak.is_finished() {
                    // Cannot fail on a round still in play
                    let _ = streak.cash_out();
                }
                if streak.multiplier().is_zero() {
                    Settled {
                        result: RoundResult::Loss,
                        multiplier: Decimal::ZERO,
                    }
                } else {
                    Settled {
                        result: RoundResult::Cashout,
                        multiplier: streak.multiplier(),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compute_commit, derive_reveal, verify_commit_reveal};
    use arcade_types::StreakStatus;

    fn reveal(label: &str) -> [u8; 32] {
        derive_reveal(b"house-secret", label.as_bytes())
    }

    #[test]
    fn test_validate_requires_params() {
        assert_eq!(
            RoundEngine::validate(GameKind::PegBoard, &GameParams::default()),
            Err(GameError::MissingParameter("rows"))
        );
        assert_eq!(
            RoundEngine::validate(GameKind::MultiplierTarget, &GameParams::default()),
            Err(GameError::MissingParameter("target"))
        );
        assert!(RoundEngine::validate(GameKind::CardStreak, &GameParams::default()).is_ok());
        assert_eq!(
            RoundEngine::validate(GameKind::PegBoard, &GameParams::rows(7)),
            Err(GameError::InvalidRows(7))
        );
    }

    #[test]
    fn test_replay_from_reveal() {
        let reveal = reveal("auth-1");
        let commit = compute_commit(&reveal);
        for (game, params) in [
            (GameKind::PegBoard, GameParams::rows(12)),
            (GameKind::MultiplierTarget, GameParams::target(Decimal::new(150, 2))),
            (GameKind::CardStreak, GameParams::default()),
        ] {
            let a = RoundEngine::open(game, &params, &reveal).unwrap();
            let b = RoundEngine::open(game, &params, &reveal).unwrap();
            assert_eq!(a.view(), b.view());
            assert_eq!(a.kind(), game);
            assert!(verify_commit_reveal(&commit, &reveal));
        }
    }

    #[test]
    fn test_peg_settlement_pays_slot_multiplier() {
        for i in 0..50 {
            let mut engine =
                RoundEngine::open(GameKind::PegBoard, &GameParams::rows(8), &reveal(&i.to_string()))
                    .unwrap();
            let RoundView::PegBoard(drop) = engine.view() else {
                panic!("expected peg board view");
            };
            let settled = engine.settle();
            assert_eq!(settled.multiplier, drop.multiplier);
            assert_eq!(settled.result == RoundResult::Win, drop.multiplier > Decimal::ONE);
            assert_eq!(
                settled.payout(Decimal::new(10, 0)).unwrap(),
                Decimal::new(10, 0) * drop.multiplier
            );
        }
    }

    #[test]
    fn test_target_settlement() {
        for i in 0..50 {
            let mut engine = RoundEngine::open(
                GameKind::MultiplierTarget,
                &GameParams::target(Decimal::new(200, 2)),
                &reveal(&i.to_string()),
            )
            .unwrap();
            let RoundView::MultiplierTarget(draw) = engine.view() else {
                panic!("expected target view");
            };
            let settled = engine.settle();
            if draw.won {
                assert_eq!(settled.result, RoundResult::Win);
                assert_eq!(settled.payout(Decimal::ONE).unwrap(), Decimal::new(200, 2));
            } else {
                assert_eq!(settled.result, RoundResult::Loss);
                assert!(settled.payout(Decimal::ONE).unwrap().is_zero());
            }
        }
    }

    #[test]
    fn test_streak_in_play_cashes_out_on_settle() {
        let mut engine =
            RoundEngine::open(GameKind::CardStreak, &GameParams::default(), &reveal("streak"))
                .unwrap();
        assert!(!engine.is_finished());
        let settled = engine.settle();
        assert_eq!(settled.result, RoundResult::Cashout);
        assert_eq!(settled.multiplier, Decimal::ONE);
        let RoundView::CardStreak(view) = engine.view() else {
            panic!("expected streak view");
        };
        assert_eq!(view.status, StreakStatus::CashedOut);
    }

    #[test]
    fn test_guess_only_for_streak() {
        let mut engine =
            RoundEngine::open(GameKind::PegBoard, &GameParams::rows(16), &reveal("peg")).unwrap();
        assert_eq!(engine.guess(Guess::Higher), Err(GameError::UnsupportedMove));
    }
}
