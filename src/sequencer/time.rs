// Musical time - fixed-point tick/subtick representation
// One tick is a beat; SUBTICKS_PER_TICK subticks make one tick

use std::fmt;
use std::ops::Add;

/// Subdivisions of one tick. Fixed for the whole engine.
pub const SUBTICKS_PER_TICK: u32 = 8;

/// A position or duration in musical time.
///
/// Always normalized: `subtick < SUBTICKS_PER_TICK`. Addition carries
/// subtick overflow into the tick. Negative values are not representable;
/// durations and positions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time {
    pub tick: u32,
    pub subtick: u32,
}

impl Time {
    pub const ZERO: Time = Time { tick: 0, subtick: 0 };

    /// Creates a time from components, normalizing subtick overflow.
    pub fn new(tick: u32, subtick: u32) -> Self {
        Self {
            tick: tick + subtick / SUBTICKS_PER_TICK,
            subtick: subtick % SUBTICKS_PER_TICK,
        }
    }

    /// Creates a time from a raw subtick count.
    pub fn from_subticks(subticks: u64) -> Self {
        Self {
            tick: (subticks / SUBTICKS_PER_TICK as u64) as u32,
            subtick: (subticks % SUBTICKS_PER_TICK as u64) as u32,
        }
    }

    /// Creates a time from a decimal `tick.fraction` representation.
    /// The fractional part is scaled to subtick units, so with 8 subticks
    /// per tick `1.5` is tick 1, subtick 4.
    pub fn from_decimal(value: f64) -> Self {
        let value = value.max(0.0);
        let tick = value.trunc() as u32;
        let subtick = (value.fract() * SUBTICKS_PER_TICK as f64).round() as u32;
        Self::new(tick, subtick)
    }

    /// Total subticks from zero. The canonical linear ordering key.
    pub fn total_subticks(&self) -> u64 {
        self.tick as u64 * SUBTICKS_PER_TICK as u64 + self.subtick as u64
    }

    /// True if this is a zero-length time (used as the "no automatic
    /// note-off" marker on NoteOn steps).
    pub fn is_zero(&self) -> bool {
        self.tick == 0 && self.subtick == 0
    }

    /// Convert to wall-clock milliseconds at the given tempo.
    pub fn to_millis(&self, ticks_per_minute: u32) -> f64 {
        let ms_per_subtick = 60_000.0 / ticks_per_minute as f64 / SUBTICKS_PER_TICK as f64;
        ms_per_subtick * self.total_subticks() as f64
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        Time::from_subticks(self.total_subticks() + rhs.total_subticks())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}", self.tick, self.subtick)
    }
}

/// Mutable clock over a [`Time`] position.
///
/// The sequencer owns one of these and advances it one subtick per host
/// timer callback.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    time: Time,
}

impl Clock {
    pub fn new() -> Self {
        Self { time: Time::ZERO }
    }

    /// Current position.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Move to the next subtick. Returns true when a tick boundary was
    /// crossed.
    pub fn advance(&mut self) -> bool {
        self.time.subtick += 1;
        if self.time.subtick >= SUBTICKS_PER_TICK {
            self.time.tick += 1;
            self.time.subtick = 0;
            true
        } else {
            false
        }
    }

    /// Back to the beginning.
    pub fn reset(&mut self) {
        self.time = Time::ZERO;
    }
}
