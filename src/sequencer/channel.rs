// Channel - one output voice/instrument with gating state and wobble

use crate::sequencer::time::Time;
use crate::sequencer::wobbler::Wobbler;

/// Playback gating state. If any channel is Solo, only Solo channels
/// play; otherwise everything not muted plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ChannelState {
    #[default]
    Normal,
    Mute,
    Solo,
}

/// One output channel, usually an instrument.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    /// Protocol channel number, 1-based.
    pub number: u8,
    /// Channel volume, 0-127.
    pub volume: f64,
    pub state: ChannelState,
    pub time_wobbler: Wobbler,
    pub volume_wobbler: Wobbler,
}

impl Channel {
    pub fn new(name: impl Into<String>, number: u8) -> Self {
        Self {
            name: name.into(),
            number,
            volume: 90.0,
            state: ChannelState::Normal,
            time_wobbler: Wobbler::new(),
            volume_wobbler: Wobbler::new(),
        }
    }

    /// Humanized dispatch offset for the next step.
    pub fn next_time(&mut self) -> Time {
        self.time_wobbler.next_time(Time::ZERO)
    }

    /// Humanized volume around the given default.
    pub fn next_volume(&mut self, default: f64) -> f64 {
        self.volume_wobbler.next(default)
    }
}
