// MIDI input - inbound wire messages decoded to Steps
// The midir callback runs on its own thread; decoded steps marshal into
// the sequencer through the lock-free command channel

use crate::messaging::channels::CommandProducer;
use crate::messaging::command::Command;
use crate::midi::{device, wire, MidiError};
use midir::MidiInputConnection;
use ringbuf::traits::Producer;

/// Owns one MIDI input connection for the lifetime of the engine.
///
/// A missing input device is not an error: the engine runs without it
/// and logs why.
pub struct MidiInput {
    _connection: Option<MidiInputConnection<()>>,
}

impl MidiInput {
    pub fn open(
        device_name: Option<&str>,
        mut command_tx: CommandProducer,
        monitor: bool,
    ) -> Result<Self, MidiError> {
        let (midi_in, port) = match device::find_input_port(device_name) {
            Ok(found) => found,
            Err(MidiError::DeviceNotFound(which)) => {
                log::info!("no MIDI input ({which}), continuing without one");
                return Ok(Self { _connection: None });
            }
            Err(e) => return Err(e),
        };

        let name = midi_in
            .port_name(&port)
            .unwrap_or_else(|_| "unknown".to_string());
        log::info!("opening MIDI input '{name}'");

        let connection = midi_in
            .connect(
                &port,
                "stepline-in",
                move |_timestamp, bytes, _| {
                    // Unrecognized message kinds decode to None and drop.
                    let Some(step) = wire::decode(bytes) else {
                        return;
                    };

                    if monitor {
                        log::info!("recv: {step}");
                    }

                    // Non-blocking push; a full buffer drops the event.
                    if command_tx.try_push(Command::Incoming(step)).is_err() {
                        log::warn!("input buffer full, event dropped");
                    }
                },
                (),
            )
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        Ok(Self {
            _connection: Some(connection),
        })
    }

    /// True when an actual device is connected.
    pub fn is_connected(&self) -> bool {
        self._connection.is_some()
    }
}
