// Step model - protocol-neutral musical events
// One Step is one discrete event: note on/off, controller change, patch
// change. Steps are produced by the composition or decoded from inbound
// wire messages, and consumed exactly once by the output adapter.

use crate::sequencer::time::Time;
use std::fmt;

/// Nominal volume/velocity ceiling used for linear blending.
/// Values are clamped to the device capability bounds at send time.
pub const MAX_VOLUME: f64 = 127.0;

/// What a controller-change step addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// A numbered continuous controller.
    Controller(u8),
    /// The pitch wheel, which has its own wire message and value range.
    Pitch,
    /// Virtual "note" controller used for routing inbound notes to
    /// script controls. Never sent to a device.
    Note,
}

/// All-notes-off controller number, used by `kill`.
pub const ALL_NOTES_OFF: u8 = 123;

/// One protocol-level musical event.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    NoteOn {
        channel: u8,
        note: i32,
        /// Volume as authored.
        velocity: f64,
        /// Volume after master/channel blending and wobble.
        velocity_to_play: f64,
        /// Time until the automatic note-off. Zero means no note-off is
        /// scheduled and the caller must send one explicitly.
        duration: Time,
    },
    NoteOff {
        channel: u8,
        note: i32,
        velocity: f64,
    },
    ControllerChange {
        channel: u8,
        controller: ControllerKind,
        value: i32,
    },
    PatchChange {
        channel: u8,
        patch: u8,
    },
}

impl Step {
    /// The channel this step addresses.
    pub fn channel(&self) -> u8 {
        match self {
            Step::NoteOn { channel, .. }
            | Step::NoteOff { channel, .. }
            | Step::ControllerChange { channel, .. }
            | Step::PatchChange { channel, .. } => *channel,
        }
    }

    /// Blend the played velocity with the master and channel volumes.
    /// Linear in both; only meaningful for NoteOn.
    pub fn adjust_volume(&mut self, master_volume: f64, channel_volume: f64) {
        if let Step::NoteOn {
            velocity,
            velocity_to_play,
            ..
        } = self
        {
            *velocity_to_play =
                *velocity * (channel_volume / MAX_VOLUME) * (master_volume / MAX_VOLUME);
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::NoteOn {
                channel,
                note,
                velocity_to_play,
                duration,
                ..
            } => write!(
                f,
                "NoteOn ch:{channel} note:{note} vel:{velocity_to_play:.1} dur:{duration}"
            ),
            Step::NoteOff { channel, note, .. } => {
                write!(f, "NoteOff ch:{channel} note:{note}")
            }
            Step::ControllerChange {
                channel,
                controller,
                value,
            } => write!(f, "Controller ch:{channel} {controller:?} val:{value}"),
            Step::PatchChange { channel, patch } => {
                write!(f, "Patch ch:{channel} patch:{patch}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_accessor() {
        let step = Step::NoteOff {
            channel: 3,
            note: 60,
            velocity: 0.0,
        };
        assert_eq!(step.channel(), 3);

        let step = Step::PatchChange {
            channel: 10,
            patch: 42,
        };
        assert_eq!(step.channel(), 10);
    }

    #[test]
    fn test_adjust_volume_blend() {
        let mut step = Step::NoteOn {
            channel: 1,
            note: 60,
            velocity: 127.0,
            velocity_to_play: 127.0,
            duration: Time::ZERO,
        };

        // Half master, half channel: quarter velocity.
        step.adjust_volume(63.5, 63.5);
        if let Step::NoteOn {
            velocity_to_play, ..
        } = step
        {
            assert!((velocity_to_play - 31.75).abs() < 0.01);
        } else {
            panic!("expected NoteOn");
        }
    }

    #[test]
    fn test_adjust_volume_ignores_other_kinds() {
        let mut step = Step::NoteOff {
            channel: 1,
            note: 60,
            velocity: 64.0,
        };
        let before = step.clone();
        step.adjust_volume(10.0, 10.0);
        assert_eq!(step, before);
    }
}
