// Stepline - Library exports for tests and benchmarks

pub mod messaging;
pub mod midi;
pub mod notes;
pub mod sequencer;
pub mod settings;

// Re-export commonly used types for convenience
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use messaging::command::Command;
pub use messaging::notification::Notification;
pub use midi::output::{DeviceCaps, NullTransport, OutputAdapter, Transport};
pub use midi::step::{ControllerKind, Step};
pub use midi::MidiError;
pub use notes::{NoteParser, NoteTable, ScriptDefs};
pub use sequencer::{
    Channel, ChannelState, Clock, Composition, ScheduledStep, Sequence, Sequencer, SequencerState,
    Time, Wobbler, SUBTICKS_PER_TICK,
};
pub use settings::Settings;
