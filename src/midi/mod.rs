// MIDI module - wire protocol, device plumbing and the output adapter

pub mod device;
pub mod input;
pub mod output;
pub mod step;
pub mod wire;

pub use output::{DeviceCaps, NullTransport, OutputAdapter, Transport};
pub use step::{ControllerKind, Step, ALL_NOTES_OFF, MAX_VOLUME};

/// MIDI layer error types.
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI init failed: {0}")]
    Init(String),

    #[error("MIDI device '{0}' not found")]
    DeviceNotFound(String),

    #[error("MIDI connect failed: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(String),

    #[error("{0} lock poisoned")]
    Lock(String),
}
