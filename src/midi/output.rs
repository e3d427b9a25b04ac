// Output adapter - serializes Steps to wire messages
// Owns the deferred note-off list so every timed NoteOn is guaranteed a
// matching NoteOff, and clamps all fields to the device capability bounds

use crate::midi::step::{ControllerKind, Step, ALL_NOTES_OFF};
use crate::midi::MidiError;
use crate::sequencer::time::Time;
use std::sync::Mutex;

/// Capability bounds of an output device. Steps are clamped to these
/// before they reach the wire.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCaps {
    pub channel_count: u8,
    pub min_note: i32,
    pub max_note: i32,
    pub min_volume: i32,
    pub max_volume: i32,
    pub max_controller_value: i32,
    pub max_pitch_value: i32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        // Standard MIDI 1.0 ranges.
        Self {
            channel_count: 16,
            min_note: 0,
            max_note: 127,
            min_volume: 0,
            max_volume: 127,
            max_controller_value: 127,
            max_pitch_value: 16383,
        }
    }
}

/// Where the wire bytes go. Seam between the adapter and the actual
/// device so tests can record instead of sending.
pub trait Transport: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError>;
}

impl Transport for midir::MidiOutputConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        midir::MidiOutputConnection::send(self, bytes)
            .map_err(|e| MidiError::Send(e.to_string()))
    }
}

impl Transport for Box<dyn Transport> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        (**self).send(bytes)
    }
}

/// Transport for running without an output device: bytes are dropped.
/// A missing device is a configuration problem, not a fatal one.
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        log::trace!("null transport dropped {bytes:02X?}");
        Ok(())
    }
}

/// A note-off scheduled for later, created by a timed NoteOn.
#[derive(Debug, Clone, Copy)]
struct PendingNoteOff {
    channel: u8,
    note: i32,
    /// Subticks left; one is consumed per housekeep sweep.
    remaining: i64,
}

/// Transport plus pending note-off list. One lock guards both since
/// outbound sends, inbound handling and housekeeping run on different
/// threads.
struct AdapterState<T: Transport> {
    transport: T,
    pending: Vec<PendingNoteOff>,
}

/// Translates Steps to wire messages for one output device and runs the
/// deferred note-off housekeeping.
pub struct OutputAdapter<T: Transport> {
    caps: DeviceCaps,
    monitor: bool,
    state: Mutex<AdapterState<T>>,
}

impl<T: Transport> OutputAdapter<T> {
    pub fn new(transport: T, caps: DeviceCaps) -> Self {
        Self {
            caps,
            monitor: false,
            state: Mutex::new(AdapterState {
                transport,
                pending: Vec::new(),
            }),
        }
    }

    /// Log every sent step at info level.
    pub fn set_monitor(&mut self, monitor: bool) {
        self.monitor = monitor;
    }

    pub fn caps(&self) -> DeviceCaps {
        self.caps
    }

    /// Send one step, clamped to the device bounds.
    ///
    /// A NoteOn with a nonzero duration replaces any pending note-off
    /// for the same channel/note with a fresh one (last NoteOn wins).
    /// Transport failures are returned, never retried; the caller
    /// decides whether to re-send.
    pub fn send(&self, step: &Step) -> Result<(), MidiError> {
        let mut state = self.lock()?;
        self.send_locked(&mut state, step)
    }

    /// Per-tick sweep: age every pending note-off and send the expired
    /// ones through the normal send path. Returns the number of
    /// note-offs emitted. A sweep over an empty list is a no-op.
    pub fn housekeep(&self) -> usize {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                log::error!("housekeep skipped: {e}");
                return 0;
            }
        };

        for stop in state.pending.iter_mut() {
            stop.remaining -= 1;
        }

        let expired: Vec<PendingNoteOff> = state
            .pending
            .iter()
            .copied()
            .filter(|s| s.remaining < 0)
            .collect();
        state.pending.retain(|s| s.remaining >= 0);

        for stop in &expired {
            let off = Step::NoteOff {
                channel: stop.channel,
                note: stop.note,
                velocity: 0.0,
            };
            if let Err(e) = self.send_locked(&mut state, &off) {
                log::warn!("deferred note-off failed: {e}");
            }
        }

        expired.len()
    }

    /// All-notes-off on one channel, or on every channel the device has.
    /// The pending list is left alone; a later housekeep sweep retires
    /// it and the duplicate note-offs are harmless.
    pub fn kill(&self, channel: Option<u8>) -> Result<(), MidiError> {
        let channels: Vec<u8> = match channel {
            Some(ch) => vec![ch],
            None => (1..=self.caps.channel_count).collect(),
        };

        let mut state = self.lock()?;
        let mut result = Ok(());
        for ch in channels {
            let step = Step::ControllerChange {
                channel: ch,
                controller: ControllerKind::Controller(ALL_NOTES_OFF),
                value: 0,
            };
            if let Err(e) = self.send_locked(&mut state, &step) {
                log::warn!("kill on channel {ch} failed: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Number of note-offs still waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.lock().map(|s| s.pending.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, AdapterState<T>>, MidiError> {
        self.state
            .lock()
            .map_err(|_| MidiError::Lock("output adapter".into()))
    }

    fn send_locked(
        &self,
        state: &mut AdapterState<T>,
        step: &Step,
    ) -> Result<(), MidiError> {
        let caps = &self.caps;
        let bytes: Vec<u8> = match step {
            Step::NoteOn {
                channel,
                note,
                velocity_to_play,
                duration,
                ..
            } => {
                let note = (*note).clamp(caps.min_note, caps.max_note);
                let vel = (velocity_to_play.round() as i32)
                    .clamp(caps.min_volume, caps.max_volume);

                if !duration.is_zero() {
                    // Replace any lingering note-off with a fresh one.
                    state
                        .pending
                        .retain(|s| !(s.channel == *channel && s.note == note));
                    state.pending.push(PendingNoteOff {
                        channel: *channel,
                        note,
                        remaining: duration.total_subticks() as i64,
                    });
                }

                vec![0x90 | channel_nibble(*channel), note as u8, vel as u8]
            }
            Step::NoteOff {
                channel,
                note,
                velocity,
            } => {
                let note = (*note).clamp(caps.min_note, caps.max_note);
                let vel =
                    (velocity.round() as i32).clamp(caps.min_volume, caps.max_volume);
                vec![0x80 | channel_nibble(*channel), note as u8, vel as u8]
            }
            Step::ControllerChange {
                channel,
                controller,
                value,
            } => match controller {
                // Virtual controller, nothing on the wire.
                ControllerKind::Note => return Ok(()),
                ControllerKind::Pitch => {
                    let value = (*value).clamp(0, caps.max_pitch_value);
                    vec![
                        0xE0 | channel_nibble(*channel),
                        (value & 0x7F) as u8,
                        ((value >> 7) & 0x7F) as u8,
                    ]
                }
                ControllerKind::Controller(id) => {
                    let value = (*value).clamp(0, caps.max_controller_value);
                    vec![0xB0 | channel_nibble(*channel), *id, value as u8]
                }
            },
            Step::PatchChange { channel, patch } => {
                vec![0xC0 | channel_nibble(*channel), *patch & 0x7F]
            }
        };

        state.transport.send(&bytes)?;

        if self.monitor {
            log::info!("send: {step}");
        }
        Ok(())
    }
}

/// Steps carry 1-based channel numbers; the wire wants a 0-based nibble.
fn channel_nibble(channel: u8) -> u8 {
    channel.saturating_sub(1) & 0x0F
}
