//! Peg board (ball drop) engine.
//!
//! The board is a triangle of pegs: row `r` (0-based, top to bottom) holds `r + 3` pegs at
//! height `(r + 1) * PEG_SPACING`, centred on `x = 0`. Below the last row sit `rows + 1` slots,
//! each one peg spacing wide, paying the multiplier from the row count's table.
//!
//! Two ways to reach a slot:
//! - [`canonical_drop`] draws one bounce per row from the round RNG and lands in the slot
//!   counting the right bounces. This is the outcome the house settles.
//! - [`PegBoard`] simulates a ball at a fixed tick. In [`Motion::Free`] it falls under gravity
//!   and bounces off pegs, and the slot is a function of where it comes to rest (demo rounds).
//!   In [`Motion::Guided`] it follows the waypoints of a canonical drop so the animation lands
//!   where the house said it would.

use arcade_types::{Bounce, PegDrop};
use rust_decimal::Decimal;

use crate::{GameError, GameRng};

/// Supported row counts.
pub const ROW_OPTIONS: [u8; 3] = [8, 12, 16];

/// Slot multipliers in hundredths for 8 rows.
pub const MULTIPLIERS_8: [u16; 9] = [560, 210, 110, 100, 50, 100, 110, 210, 560];

/// Slot multipliers in hundredths for 12 rows.
pub const MULTIPLIERS_12: [u16; 13] = [
    1000, 300, 160, 140, 110, 100, 50, 100, 110, 140, 160, 300, 1000,
];

/// Slot multipliers in hundredths for 16 rows.
pub const MULTIPLIERS_16: [u16; 17] = [
    1600, 900, 200, 140, 140, 120, 110, 100, 50, 100, 110, 120, 140, 140, 200, 900, 1600,
];

/// Fixed simulation step in seconds.
pub const TICK_SECONDS: f64 = 1.0 / 60.0;

pub const PEG_SPACING: f64 = 1.0;
pub const PEG_RADIUS: f64 = 0.1;
pub const BALL_RADIUS: f64 = 0.2;
const GRAVITY: f64 = 20.0;
const AIR_FRICTION: f64 = 0.4;
const RESTITUTION: f64 = 0.5;
const WALL_RESTITUTION: f64 = 0.3;
/// Release jitter magnitude range, in peg spacings.
const JITTER_MIN: f64 = 0.01;
const JITTER_MAX: f64 = 0.08;
/// Ticks spent between two waypoints of a guided drop.
pub const GUIDED_TICKS_PER_ROW: u32 = 10;

pub fn validate_rows(rows: u8) -> Result<(), GameError> {
    if ROW_OPTIONS.contains(&rows) {
        Ok(())
    } else {
        Err(GameError::InvalidRows(rows))
    }
}

/// Multiplier table (hundredths) for a row count.
pub fn multipliers(rows: u8) -> Result<&'static [u16], GameError> {
    match rows {
        8 => Ok(&MULTIPLIERS_8),
        12 => Ok(&MULTIPLIERS_12),
        16 => Ok(&MULTIPLIERS_16),
        _ => Err(GameError::InvalidRows(rows)),
    }
}

pub fn multiplier_for_slot(rows: u8, slot: u8) -> Result<Decimal, GameError> {
    let table = multipliers(rows)?;
    let hundredths = table
        .get(slot as usize)
        .copied()
        .ok_or(GameError::InvalidRows(rows))?;
    Ok(Decimal::new(hundredths as i64, 2))
}

/// Draw the canonical drop: one bit per row, `1` bouncing right.
pub fn canonical_drop(rows: u8, rng: &mut GameRng) -> Result<PegDrop, GameError> {
    validate_rows(rows)?;
    let path: Vec<Bounce> = (0..rows)
        .map(|_| {
            if rng.next_bool() {
                Bounce::Right
            } else {
                Bounce::Left
            }
        })
        .collect();
    let slot = path.iter().filter(|b| **b == Bounce::Right).count() as u8;
    Ok(PegDrop {
        rows,
        path,
        slot,
        multiplier: multiplier_for_slot(rows, slot)?,
    })
}

/// Left edge of the slot row.
fn left_edge(rows: u8) -> f64 {
    -((rows as f64 + 1.0) / 2.0) * PEG_SPACING
}

/// Slot under horizontal position `x`; positions past the walls fall in the edge slots.
pub fn slot_for_position(rows: u8, x: f64) -> u8 {
    let offset = ((x - left_edge(rows)) / PEG_SPACING).floor();
    offset.clamp(0.0, rows as f64) as u8
}

/// Horizontal position of peg `index` in row `row`.
fn peg_x(row: u8, index: u8) -> f64 {
    (index as f64 - (row as f64 + 2.0) / 2.0) * PEG_SPACING
}

fn peg_y(row: u8) -> f64 {
    (row as f64 + 1.0) * PEG_SPACING
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

/// Waypoints of a canonical drop: the top of each peg the ball strikes, then the slot centre.
pub fn waypoints(drop: &PegDrop) -> Vec<Waypoint> {
    let mut points = Vec::with_capacity(drop.path.len() + 2);
    points.push(Waypoint { x: 0.0, y: 0.0 });
    let mut rights = 0i32;
    for (row, bounce) in drop.path.iter().enumerate() {
        let x = (2 * rights - row as i32) as f64 * PEG_SPACING / 2.0;
        points.push(Waypoint {
            x,
            y: peg_y(row as u8) - PEG_RADIUS - BALL_RADIUS,
        });
        if *bounce == Bounce::Right {
            rights += 1;
        }
    }
    let rows = drop.path.len() as i32;
    points.push(Waypoint {
        x: (2 * rights - rows) as f64 * PEG_SPACING / 2.0,
        y: floor_y(drop.rows),
    });
    points
}

fn floor_y(rows: u8) -> f64 {
    (rows as f64 + 1.0) * PEG_SPACING
}

#[derive(Clone, Debug)]
pub enum Motion {
    Free { vx: f64, vy: f64 },
    Guided { waypoints: Vec<Waypoint>, tick: u32 },
}

/// A ball in flight on the board.
#[derive(Clone, Debug)]
pub struct PegBoard {
    rows: u8,
    x: f64,
    y: f64,
    motion: Motion,
    ticks: u32,
    landed: Option<u8>,
}

impl PegBoard {
    /// Release a free-falling ball. The seed only decides the release jitter, so identical seeds
    /// replay identical trajectories.
    pub fn release(rows: u8, rng: &mut GameRng) -> Result<Self, GameError> {
        validate_rows(rows)?;
        let magnitude = JITTER_MIN + rng.next_f64() * (JITTER_MAX - JITTER_MIN);
        let jitter = if rng.next_bool() { magnitude } else { -magnitude };
        Ok(Self {
            rows,
            x: jitter * PEG_SPACING,
            y: 0.0,
            motion: Motion::Free { vx: 0.0, vy: 0.0 },
            ticks: 0,
            landed: None,
        })
    }

    /// Animate a canonical drop.
    pub fn guided(drop: &PegDrop) -> Result<Self, GameError> {
        validate_rows(drop.rows)?;
        Ok(Self {
            rows: drop.rows,
            x: 0.0,
            y: 0.0,
            motion: Motion::Guided {
                waypoints: waypoints(drop),
                tick: 0,
            },
            ticks: 0,
            landed: None,
        })
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn landed(&self) -> Option<u8> {
        self.landed
    }

    /// Advance one tick. Returns the slot once the ball has landed.
    pub fn step(&mut self) -> Option<u8> {
        if self.landed.is_some() {
            return self.landed;
        }
        self.ticks += 1;
        match &mut self.motion {
            Motion::Free { vx, vy } => {
                let (mut nvx, mut nvy) = (*vx, *vy);
                nvy += GRAVITY * TICK_SECONDS;
                let damping = 1.0 - AIR_FRICTION * TICK_SECONDS;
                nvx *= damping;
                nvy *= damping;
                self.x += nvx * TICK_SECONDS;
                self.y += nvy * TICK_SECONDS;
                (nvx, nvy) = collide(self.rows, &mut self.x, &mut self.y, nvx, nvy);
                *vx = nvx;
                *vy = nvy;
            }
            Motion::Guided { waypoints, tick } => {
                *tick += 1;
                let segment = (*tick / GUIDED_TICKS_PER_ROW) as usize;
                let within = (*tick % GUIDED_TICKS_PER_ROW) as f64 / GUIDED_TICKS_PER_ROW as f64;
                match (waypoints.get(segment), waypoints.get(segment + 1)) {
                    (Some(from), Some(to)) => {
                        // Ease in vertically so the ball appears to accelerate between pegs.
                        self.x = from.x + (to.x - from.x) * within;
                        self.y = from.y + (to.y - from.y) * within * within;
                    }
                    (Some(last), None) => {
                        self.x = last.x;
                        self.y = last.y;
                    }
                    _ => {}
                }
            }
        }
        if self.y >= floor_y(self.rows) {
            self.y = floor_y(self.rows);
            self.landed = Some(slot_for_position(self.rows, self.x));
        }
        self.landed
    }

    /// Run until the ball lands. A ball still bouncing after `max_ticks` is settled where it is.
    pub fn run_to_rest(&mut self, max_ticks: u32) -> u8 {
        while self.ticks < max_ticks {
            if let Some(slot) = self.step() {
                return slot;
            }
        }
        let slot = slot_for_position(self.rows, self.x);
        self.landed = Some(slot);
        slot
    }
}

/// Resolve peg and wall contacts, returning the new velocity.
fn collide(rows: u8, x: &mut f64, y: &mut f64, mut vx: f64, mut vy: f64) -> (f64, f64) {
    let reach = PEG_RADIUS + BALL_RADIUS;
    let nearest_row = (*y / PEG_SPACING).round() as i32 - 1;
    for row in (nearest_row - 1)..=(nearest_row + 1) {
        if row < 0 || row >= rows as i32 {
            continue;
        }
        let row = row as u8;
        for index in 0..(row + 3) {
            let dx = *x - peg_x(row, index);
            let dy = *y - peg_y(row);
            let distance = (dx * dx + dy * dy).sqrt();
            if distance >= reach {
                continue;
            }
            // A ball dead centre on a peg is nudged right; the jitter makes this unreachable in
            // practice.
            let (nx, ny) = if distance > f64::EPSILON {
                (dx / distance, dy / distance)
            } else {
                (1.0, 0.0)
            };
            *x += nx * (reach - distance);
            *y += ny * (reach - distance);
            let normal_speed = vx * nx + vy * ny;
            if normal_speed < 0.0 {
                vx -= (1.0 + RESTITUTION) * normal_speed * nx;
                vy -= (1.0 + RESTITUTION) * normal_speed * ny;
            }
        }
    }

    let left = left_edge(rows) + BALL_RADIUS;
    let right = -left_edge(rows) - BALL_RADIUS;
    if *x < left {
        *x = left;
        vx = vx.abs() * WALL_RESTITUTION;
    } else if *x > right {
        *x = right;
        vx = -vx.abs() * WALL_RESTITUTION;
    }
    (vx, vy)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_TICKS: u32 = 60 * 60;

    #[test]
    fn test_tables_are_symmetric() {
        for rows in ROW_OPTIONS {
            let table = multipliers(rows).unwrap();
            assert_eq!(table.len(), rows as usize + 1);
            let reversed: Vec<u16> = table.iter().rev().copied().collect();
            assert_eq!(table, reversed.as_slice());
            // Lowest in the centre, highest at the edges
            assert_eq!(table[rows as usize / 2], 50);
            assert_eq!(table[0], *table.iter().max().unwrap());
        }
    }

    #[test]
    fn test_invalid_rows() {
        assert_eq!(validate_rows(10), Err(GameError::InvalidRows(10)));
        let mut rng = GameRng::new(b"rows", 0);
        assert!(canonical_drop(9, &mut rng).is_err());
        assert!(PegBoard::release(0, &mut rng).is_err());
    }

    #[test]
    fn test_canonical_drop_counts_right_bounces() {
        let mut rng = GameRng::new(b"drop", 0);
        for rows in ROW_OPTIONS {
            let drop = canonical_drop(rows, &mut rng).unwrap();
            assert_eq!(drop.path.len(), rows as usize);
            let rights = drop.path.iter().filter(|b| **b == Bounce::Right).count();
            assert_eq!(drop.slot as usize, rights);
            assert_eq!(drop.multiplier, multiplier_for_slot(rows, drop.slot).unwrap());
        }
    }

    #[test]
    fn test_slot_for_position() {
        // 8 rows: slots span [-4.5, 4.5)
        assert_eq!(slot_for_position(8, 0.0), 4);
        assert_eq!(slot_for_position(8, -4.4), 0);
        assert_eq!(slot_for_position(8, 4.4), 8);
        assert_eq!(slot_for_position(8, -100.0), 0);
        assert_eq!(slot_for_position(8, 100.0), 8);
        assert_eq!(slot_for_position(8, 0.6), 5);
    }

    #[test]
    fn test_same_seed_same_slot() {
        for rows in ROW_OPTIONS {
            let mut a = PegBoard::release(rows, &mut GameRng::new(b"replay", 3)).unwrap();
            let mut b = PegBoard::release(rows, &mut GameRng::new(b"replay", 3)).unwrap();
            let slot_a = a.run_to_rest(MAX_TICKS);
            let slot_b = b.run_to_rest(MAX_TICKS);
            assert_eq!(slot_a, slot_b);
            assert_eq!(a.position(), b.position());
            assert!(slot_a <= rows);
        }
    }

    #[test]
    fn test_free_ball_slot_follows_final_position() {
        for stream in 0..20 {
            let mut board = PegBoard::release(12, &mut GameRng::new(b"free", stream)).unwrap();
            let slot = board.run_to_rest(MAX_TICKS);
            let (x, _) = board.position();
            assert_eq!(slot, slot_for_position(12, x));
            assert_eq!(board.landed(), Some(slot));
        }
    }

    #[test]
    fn test_guided_ball_lands_in_canonical_slot() {
        let mut rng = GameRng::new(b"guided", 0);
        for _ in 0..20 {
            let drop = canonical_drop(16, &mut rng).unwrap();
            let mut board = PegBoard::guided(&drop).unwrap();
            let slot = board.run_to_rest(MAX_TICKS);
            assert_eq!(slot, drop.slot);
        }
    }

    #[test]
    fn test_run_to_rest_always_returns_a_slot() {
        let mut board = PegBoard::release(8, &mut GameRng::new(b"short", 0)).unwrap();
        let slot = board.run_to_rest(1);
        assert!(slot <= 8);
        assert_eq!(board.step(), Some(slot));
    }
}
