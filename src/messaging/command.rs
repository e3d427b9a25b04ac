// Command types - control surface and MIDI input into the sequencer

use crate::midi::step::Step;
use crate::sequencer::channel::ChannelState;

#[derive(Debug, Clone)]
pub enum Command {
    /// A step decoded from an inbound MIDI message.
    Incoming(Step),
    SetMasterVolume(f64),
    SetChannelVolume { channel: u8, volume: f64 },
    SetChannelState { channel: u8, state: ChannelState },
    Stop,
}
