// Wobbler - bounded Gaussian randomizer for time and volume humanizing

use crate::sequencer::time::Time;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

/// Statistical randomizer for time and volume.
///
/// Draws from a Gaussian centered between `center + range_low` and
/// `center + range_high` with the bounds at three standard deviations.
/// With both ranges zero (the default) the input passes through
/// untouched and no sampling happens.
#[derive(Debug, Clone)]
pub struct Wobbler {
    range_low: f64,
    range_high: f64,
    rng: SmallRng,
}

impl Default for Wobbler {
    fn default() -> Self {
        Self::new()
    }
}

impl Wobbler {
    pub fn new() -> Self {
        Self {
            range_low: 0.0,
            range_high: 0.0,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_range(range_low: f64, range_high: f64) -> Self {
        Self {
            range_low,
            range_high,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn set_range(&mut self, range_low: f64, range_high: f64) {
        self.range_low = range_low;
        self.range_high = range_high;
    }

    /// True when the wobbler is configured to do nothing.
    pub fn is_flat(&self) -> bool {
        self.range_low == 0.0 && self.range_high == 0.0
    }

    /// Next value from the distribution, rounded to an integer value.
    /// Returns `center` unchanged when both ranges are zero.
    pub fn next(&mut self, center: f64) -> f64 {
        if self.is_flat() {
            return center;
        }
        // Inverted range is a misconfiguration, not a distribution:
        // Normal accepts a negative sigma and would sample mirrored.
        if self.range_high < self.range_low {
            return center;
        }

        let min = center + self.range_low;
        let max = center + self.range_high;
        let mean = min + (max - min) / 2.0;
        let sigma = (max - min) / 3.0;

        match Normal::new(mean, sigma) {
            Ok(dist) => self.rng.sample(dist).round(),
            Err(_) => center,
        }
    }

    /// Time-valued draw: wobbles the subtick count. Results below zero
    /// clamp to zero since Time cannot go negative.
    pub fn next_time(&mut self, center: Time) -> Time {
        let subticks = self.next(center.total_subticks() as f64).max(0.0);
        Time::from_subticks(subticks as u64)
    }
}
