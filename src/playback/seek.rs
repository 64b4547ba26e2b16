//! Random seek policy
//!
//! Picks a start point so that playing for the requested duration from there
//! does not run past the natural end of the media.

use rand::Rng;
use std::time::Duration;

/// Outcome of the seek computation for one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekPlan {
    /// Upper bound (exclusive) the fraction was drawn below. Zero when the
    /// requested duration does not fit inside the media.
    pub max_fraction: f64,
    /// Fraction of total length to seek to
    pub fraction: f64,
}

impl SeekPlan {
    /// True when the media is too short for the budget and the seek was
    /// clamped to the start
    pub fn is_clamped(&self) -> bool {
        self.max_fraction <= 0.0
    }
}

/// Largest seek fraction that still leaves `play_for` of media after it.
///
/// `1 - D/L`, clamped to `[0, 1]`. A zero length counts as "too short".
pub fn max_seek_fraction(length: Duration, play_for: Duration) -> f64 {
    if length.is_zero() {
        return 0.0;
    }
    let ratio = play_for.as_secs_f64() / length.as_secs_f64();
    (1.0 - ratio).clamp(0.0, 1.0)
}

/// Draw a seek fraction uniformly from `[0, max_seek_fraction)`.
///
/// When the media is not longer than `play_for` the plan is clamped to
/// fraction `0.0` (play from the start).
pub fn choose_seek<R: Rng>(rng: &mut R, length: Duration, play_for: Duration) -> SeekPlan {
    let max_fraction = max_seek_fraction(length, play_for);
    if max_fraction <= 0.0 {
        return SeekPlan {
            max_fraction: 0.0,
            fraction: 0.0,
        };
    }

    // An f32 draw is at most 1 - 2^-24; widened to f64 the product stays
    // strictly below max_fraction.
    let unit = f64::from(rng.random::<f32>());
    SeekPlan {
        max_fraction,
        fraction: unit * max_fraction,
    }
}
