// Inbound wire decode - raw MIDI bytes to Steps
// Only the message kinds the engine cares about; everything else is
// dropped by returning None

use crate::midi::step::{ControllerKind, Step};
use crate::sequencer::time::Time;

/// Decode a raw wire message into a Step.
///
/// A NoteOn with velocity 0 is normalized to NoteOff. Unrecognized or
/// truncated messages decode to None and are dropped upstream.
pub fn decode(bytes: &[u8]) -> Option<Step> {
    if bytes.is_empty() {
        return None;
    }

    let status = bytes[0];
    let channel = (status & 0x0F) + 1;

    match status & 0xF0 {
        0x90 => {
            if bytes.len() < 3 {
                return None;
            }
            let note = bytes[1] as i32;
            let velocity = bytes[2] as f64;
            if bytes[2] == 0 {
                Some(Step::NoteOff {
                    channel,
                    note,
                    velocity: 0.0,
                })
            } else {
                Some(Step::NoteOn {
                    channel,
                    note,
                    velocity,
                    velocity_to_play: velocity,
                    duration: Time::ZERO,
                })
            }
        }
        0x80 => {
            if bytes.len() < 3 {
                return None;
            }
            Some(Step::NoteOff {
                channel,
                note: bytes[1] as i32,
                velocity: bytes[2] as f64,
            })
        }
        0xB0 => {
            if bytes.len() < 3 {
                return None;
            }
            Some(Step::ControllerChange {
                channel,
                controller: ControllerKind::Controller(bytes[1]),
                value: bytes[2] as i32,
            })
        }
        0xE0 => {
            if bytes.len() < 3 {
                return None;
            }
            let lsb = bytes[1] as i32;
            let msb = bytes[2] as i32;
            Some(Step::ControllerChange {
                channel,
                controller: ControllerKind::Pitch,
                value: (msb << 7) | lsb,
            })
        }
        0xC0 => {
            if bytes.len() < 2 {
                return None;
            }
            Some(Step::PatchChange {
                channel,
                patch: bytes[1],
            })
        }
        _ => None,
    }
}
