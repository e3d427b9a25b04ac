// Sequencer module - musical time, channels, compositions and the playback loop

pub mod channel;
pub mod composition;
pub mod player;
pub mod time;
pub mod wobbler;

pub use channel::{Channel, ChannelState};
pub use composition::{Composition, CompositionError, ScheduledStep, Sequence};
pub use player::{Sequencer, SequencerState};
pub use time::{Clock, Time, SUBTICKS_PER_TICK};
pub use wobbler::Wobbler;
