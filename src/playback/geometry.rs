//! Pitch geometry primitives
//!
//! All coordinates are normalized pitch units, 0..100 on both axes. Home
//! defends the left goal (x = 0), away defends the right goal (x = 100).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Lowest coordinate an animated agent or the ball may take
pub const PITCH_MIN: f32 = 1.0;
/// Highest coordinate an animated agent or the ball may take
pub const PITCH_MAX: f32 = 99.0;

/// Centre spot
pub const PITCH_CENTRE: Point = Point { x: 50.0, y: 50.0 };

/// A position on the pitch
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into the animated range
    pub fn clamped(self) -> Self {
        Self {
            x: clamp(self.x, PITCH_MIN, PITCH_MAX),
            y: clamp(self.y, PITCH_MIN, PITCH_MAX),
        }
    }

    /// Unit vector from `self` towards `other`, or `None` if they coincide
    pub fn direction_to(self, other: Point) -> Option<(f32, f32)> {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len < 0.0001 {
            None
        } else {
            Some((dx / len, dy / len))
        }
    }
}

/// Clamp `v` into `[lo, hi]`. Total: NaN collapses to `lo`.
#[inline]
pub fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
    if v.is_nan() || v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// Euclidean distance in pitch units
#[inline]
pub fn distance(a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Move `current` towards `target` by `strength` (0 = stay, 1 = arrive).
/// Each axis of the result is clamped into the animated range.
pub fn lerp(current: Point, target: Point, strength: f32) -> Point {
    Point {
        x: clamp(current.x + (target.x - current.x) * strength, PITCH_MIN, PITCH_MAX),
        y: clamp(current.y + (target.y - current.y) * strength, PITCH_MIN, PITCH_MAX),
    }
}

/// Deterministic value in `[0, 1)` derived only from `seed`.
///
/// Identical seeds give identical output across calls and across runs, so
/// jitter replays the same way for the same tick stream.
pub fn pseudo_random(seed: i64) -> f32 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    rng.gen::<f32>()
}
