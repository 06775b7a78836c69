//! Multiplier target: the player picks a target, a result multiplier is drawn, and the round
//! wins when the result reaches the target. A win pays the target.
//!
//! The draw is `floor(0.97 / raw * 100) / 100` for `raw` uniform in (0, 1), which gives every
//! target `T` a win probability of `0.97 / T`.

use arcade_types::TargetDraw;
use rust_decimal::Decimal;

use crate::{GameError, GameRng};

/// Expected return of every target.
pub const HOUSE_EDGE_FACTOR: f64 = 0.97;

/// Smallest accepted target, in hundredths. Every draw is at least 1.00x, so a 1.00 target
/// would always win and pay back exactly the stake; targets start one step above it.
pub const MIN_TARGET_HUNDREDTHS: i64 = 101;

/// Largest target and largest result, in hundredths.
pub const MAX_MULTIPLIER_HUNDREDTHS: i64 = 1_000_000;

/// Keeps `raw` away from zero before dividing.
const MIN_RAW: f64 = 1e-9;

pub fn validate_target(target: Decimal) -> Result<(), GameError> {
    let min = Decimal::new(MIN_TARGET_HUNDREDTHS, 2);
    let max = Decimal::new(MAX_MULTIPLIER_HUNDREDTHS, 2);
    if target < min || target > max || target.normalize().scale() > 2 {
        return Err(GameError::InvalidTarget(target));
    }
    Ok(())
}

/// Result multiplier, in hundredths, for a uniform draw `raw`.
pub fn result_hundredths(raw: f64) -> i64 {
    let raw = raw.clamp(MIN_RAW, 1.0);
    let hundredths = (HOUSE_EDGE_FACTOR / raw * 100.0).floor();
    (hundredths as i64).clamp(100, MAX_MULTIPLIER_HUNDREDTHS)
}

pub fn result_multiplier(raw: f64) -> Decimal {
    Decimal::new(result_hundredths(raw), 2)
}

/// Draw the result for `target` from the round RNG.
pub fn draw(target: Decimal, rng: &mut GameRng) -> Result<TargetDraw, GameError> {
    validate_target(target)?;
    // Map [0, 1) onto (0, 1] so a zero draw cannot happen.
    let raw = 1.0 - rng.next_f64();
    let result = result_multiplier(raw);
    Ok(TargetDraw {
        target,
        result,
        won: result >= target,
    })
}
