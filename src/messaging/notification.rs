// Notifications - the sequencer's outbound observer stream
// Observers (UI, monitors, tests) consume these instead of subscribing
// to callbacks

use crate::midi::step::Step;
use crate::sequencer::time::Time;

#[derive(Debug, Clone)]
pub enum Notification {
    /// A step cleared gating and went to the output adapter.
    StepDispatched { step: Step, at: Time },
    /// A step arrived from the input device.
    InputReceived(Step),
    /// The transport could not deliver a message. Non-fatal; playback
    /// continues.
    TransportError(String),
    /// A script callback failed. Playback stops.
    ScriptError(String),
    /// Playback stopped, either at the composition end or on request.
    Stopped { at: Time },
}
