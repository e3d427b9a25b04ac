// Sequencer - the tick-driven playback loop
// The host timer calls advance() once per subtick; everything that
// happens to a due step (gating, volume blend, wobble, dispatch) happens
// inside that call, run to completion

use crate::messaging::channels::{CommandConsumer, NotificationProducer};
use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use crate::midi::output::{OutputAdapter, Transport};
use crate::midi::step::{ControllerKind, Step, MAX_VOLUME};
use crate::sequencer::channel::ChannelState;
use crate::sequencer::composition::{Composition, ScheduledStep};
use crate::sequencer::time::{Clock, Time};
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    Stopped,
    Running,
}

/// Tick-driven sequencer over one composition and one output adapter.
pub struct Sequencer<T: Transport> {
    clock: Clock,
    state: SequencerState,
    /// Master volume, 0-127.
    master_volume: f64,
    composition: Composition,
    output: Arc<OutputAdapter<T>>,
    commands: Option<CommandConsumer>,
    notifications: NotificationProducer,
}

impl<T: Transport> Sequencer<T> {
    pub fn new(
        composition: Composition,
        output: Arc<OutputAdapter<T>>,
        notifications: NotificationProducer,
    ) -> Self {
        Self {
            clock: Clock::new(),
            state: SequencerState::Stopped,
            master_volume: 90.0,
            composition,
            output,
            commands: None,
            notifications,
        }
    }

    /// Wire up the inbound command channel (MIDI input, control surface).
    pub fn set_command_source(&mut self, commands: CommandConsumer) {
        self.commands = Some(commands);
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn time(&self) -> Time {
        self.clock.time()
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f64) {
        self.master_volume = volume.clamp(0.0, MAX_VOLUME);
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn composition_mut(&mut self) -> &mut Composition {
        &mut self.composition
    }

    pub fn output(&self) -> &Arc<OutputAdapter<T>> {
        &self.output
    }

    pub fn play(&mut self) {
        self.state = SequencerState::Running;
    }

    /// Immediate stop. The state flip alone would leave notes sounding,
    /// so everything gets an explicit all-notes-off.
    pub fn stop(&mut self) {
        if self.state == SequencerState::Stopped {
            return;
        }
        self.state = SequencerState::Stopped;
        if let Err(e) = self.output.kill(None) {
            log::warn!("kill on stop failed: {e}");
        }
        self.notify(Notification::Stopped {
            at: self.clock.time(),
        });
    }

    pub fn rewind(&mut self) {
        self.clock.reset();
    }

    /// One host timer callback: process due steps, move one subtick,
    /// sweep the deferred note-offs. Exactly one logical subtick per
    /// call; a delayed host timer does not trigger catch-up.
    ///
    /// Returns true when a tick boundary was crossed, for caller-side
    /// beat bookkeeping.
    pub fn advance(&mut self) -> bool {
        self.drain_commands();

        let mut new_tick = false;
        if self.state == SequencerState::Running {
            let now = self.clock.time();
            let any_solo = self.any_solo();

            for entry in self.composition.take_steps_at(now) {
                self.dispatch(entry, now, any_solo);
                if self.state == SequencerState::Stopped {
                    // A script error stopped playback mid-slot.
                    break;
                }
            }

            new_tick = self.clock.advance();

            if let Some(end) = self.composition.length()
                && self.clock.time() > end
            {
                log::info!("composition end at {end}");
                self.stop();
            }
        }

        // Unconditional: notes started before a stop must still end.
        self.output.housekeep();
        new_tick
    }

    /// Send a note right now, respecting solo/mute and volume blending.
    /// Volume 0 sends a NoteOff instead; duration 0 leaves turning the
    /// note off to the caller.
    pub fn send_note(&mut self, channel: u8, note: i32, volume: f64, duration: Time) {
        let step = if volume > 0.0 {
            Step::NoteOn {
                channel,
                note,
                velocity: volume,
                velocity_to_play: volume,
                duration,
            }
        } else {
            Step::NoteOff {
                channel,
                note,
                velocity: 0.0,
            }
        };
        let any_solo = self.any_solo();
        self.dispatch(ScheduledStep::Step(step), self.clock.time(), any_solo);
    }

    pub fn send_note_on(&mut self, channel: u8, note: i32, volume: f64) {
        self.send_note(channel, note, volume, Time::ZERO);
    }

    pub fn send_note_off(&mut self, channel: u8, note: i32) {
        self.send_note(channel, note, 0.0, Time::ZERO);
    }

    /// Controller and patch sends bypass gating; they are state, not
    /// notes.
    pub fn send_controller(&mut self, channel: u8, controller: ControllerKind, value: i32) {
        let step = Step::ControllerChange {
            channel,
            controller,
            value,
        };
        self.send_step(step, self.clock.time());
    }

    pub fn send_patch(&mut self, channel: u8, patch: u8) {
        let step = Step::PatchChange { channel, patch };
        self.send_step(step, self.clock.time());
    }

    fn any_solo(&self) -> bool {
        self.composition
            .channels()
            .iter()
            .any(|c| c.state == ChannelState::Solo)
    }

    fn drain_commands(&mut self) {
        let Some(commands) = self.commands.as_mut() else {
            return;
        };

        let mut drained = Vec::new();
        while let Some(command) = commands.try_pop() {
            drained.push(command);
        }

        for command in drained {
            match command {
                Command::Incoming(step) => {
                    self.notify(Notification::InputReceived(step.clone()));
                    // Input not bound to a control echoes to the output.
                    self.send_step(step, self.clock.time());
                }
                Command::SetMasterVolume(volume) => self.set_master_volume(volume),
                Command::SetChannelVolume { channel, volume } => {
                    match self.composition.channel_mut(channel) {
                        Some(ch) => ch.volume = volume.clamp(0.0, MAX_VOLUME),
                        None => log::warn!("volume for unknown channel {channel}"),
                    }
                }
                Command::SetChannelState { channel, state } => {
                    match self.composition.channel_mut(channel) {
                        Some(ch) => ch.state = state,
                        None => log::warn!("state for unknown channel {channel}"),
                    }
                }
                Command::Stop => self.stop(),
            }
        }
    }

    fn dispatch(&mut self, entry: ScheduledStep, now: Time, any_solo: bool) {
        let channel_number = match &entry {
            ScheduledStep::Step(step) | ScheduledStep::Prepared(step) => step.channel(),
            ScheduledStep::Callback { channel, .. } => *channel,
        };

        let Some(ch) = self.composition.channel_mut(channel_number) else {
            log::warn!("step for unknown channel {channel_number}, dropped");
            return;
        };

        let play =
            ch.state == ChannelState::Solo || (ch.state == ChannelState::Normal && !any_solo);
        if !play {
            return;
        }

        match entry {
            ScheduledStep::Callback { mut callback, .. } => {
                // User code: failures are reported, never unwound.
                if let Err(message) = callback() {
                    log::error!("script callback failed: {message}");
                    self.notify(Notification::ScriptError(message));
                    self.stop();
                }
            }
            ScheduledStep::Step(mut step) => {
                if matches!(step, Step::NoteOn { .. }) {
                    let master = self.master_volume;
                    step.adjust_volume(master, ch.volume);
                    if let Step::NoteOn {
                        velocity_to_play, ..
                    } = &mut step
                    {
                        *velocity_to_play = ch.next_volume(*velocity_to_play);
                    }

                    // Humanized timing pushes the step a little forward.
                    // Rescheduled as Prepared so the wobble rolls once.
                    let offset = ch.next_time();
                    if !offset.is_zero() {
                        self.composition
                            .schedule(now + offset, ScheduledStep::Prepared(step));
                        return;
                    }
                }
                self.send_step(step, now);
            }
            ScheduledStep::Prepared(step) => self.send_step(step, now),
        }
    }

    fn send_step(&mut self, step: Step, at: Time) {
        match self.output.send(&step) {
            Ok(()) => self.notify(Notification::StepDispatched { step, at }),
            Err(e) => {
                // Non-fatal: report and keep the loop going.
                log::warn!("send failed: {e}");
                self.notify(Notification::TransportError(e.to_string()));
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        if self.notifications.try_push(notification).is_err() {
            log::debug!("notification buffer full, observer lagging");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::channels::{
        create_command_channel, create_notification_channel, NotificationConsumer,
    };
    use crate::midi::output::DeviceCaps;
    use crate::midi::MidiError;
    use crate::sequencer::channel::Channel;
    use crate::sequencer::time::SUBTICKS_PER_TICK;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        messages: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<Vec<u8>> {
            self.messages.lock().unwrap().clone()
        }

        fn note_ons(&self) -> Vec<Vec<u8>> {
            self.sent()
                .into_iter()
                .filter(|m| m[0] & 0xF0 == 0x90)
                .collect()
        }
    }

    impl Transport for Recorder {
        fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
            self.messages.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    fn note_on(channel: u8, note: i32) -> Step {
        Step::NoteOn {
            channel,
            note,
            velocity: 100.0,
            velocity_to_play: 100.0,
            duration: Time::ZERO,
        }
    }

    fn sequencer_with(
        composition: Composition,
    ) -> (Sequencer<Recorder>, Recorder, NotificationConsumer) {
        let recorder = Recorder::default();
        let adapter = Arc::new(OutputAdapter::new(recorder.clone(), DeviceCaps::default()));
        let (tx, rx) = create_notification_channel(256);
        (Sequencer::new(composition, adapter, tx), recorder, rx)
    }

    #[test]
    fn test_stopped_sequencer_leaves_steps_alone() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));
        comp.schedule(Time::ZERO, ScheduledStep::Step(note_on(1, 60)));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.advance();

        assert!(recorder.sent().is_empty());
        assert_eq!(seq.composition().step_count(), 1);
    }

    #[test]
    fn test_running_dispatches_due_steps() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));
        comp.schedule(Time::ZERO, ScheduledStep::Step(note_on(1, 60)));
        comp.schedule(Time::new(0, 1), ScheduledStep::Step(note_on(1, 64)));

        let (mut seq, recorder, mut rx) = sequencer_with(comp);
        seq.play();
        seq.advance();
        assert_eq!(recorder.note_ons().len(), 1);
        seq.advance();
        assert_eq!(recorder.note_ons().len(), 2);

        let dispatched: Vec<Notification> = std::iter::from_fn(|| rx.try_pop()).collect();
        assert_eq!(
            dispatched
                .iter()
                .filter(|n| matches!(n, Notification::StepDispatched { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_solo_gates_normal_channels() {
        let mut comp = Composition::new();
        let mut solo = Channel::new("lead", 1);
        solo.state = ChannelState::Solo;
        comp.add_channel(solo);
        comp.add_channel(Channel::new("pad", 2));

        comp.schedule(Time::ZERO, ScheduledStep::Step(note_on(1, 60)));
        comp.schedule(Time::ZERO, ScheduledStep::Step(note_on(2, 64)));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.play();
        seq.advance();

        let ons = recorder.note_ons();
        assert_eq!(ons.len(), 1);
        assert_eq!(ons[0][0], 0x90); // channel 1 only
    }

    #[test]
    fn test_mute_drops_steps() {
        let mut comp = Composition::new();
        let mut muted = Channel::new("pad", 1);
        muted.state = ChannelState::Mute;
        comp.add_channel(muted);
        comp.schedule(Time::ZERO, ScheduledStep::Step(note_on(1, 60)));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.play();
        seq.advance();
        assert!(recorder.note_ons().is_empty());
    }

    #[test]
    fn test_volume_blend_applied() {
        let mut comp = Composition::new();
        let mut ch = Channel::new("keys", 1);
        ch.volume = 63.5;
        comp.add_channel(ch);
        comp.schedule(Time::ZERO, ScheduledStep::Step(note_on(1, 60)));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.set_master_volume(63.5);
        seq.play();
        seq.advance();

        let ons = recorder.note_ons();
        // 100 * 0.5 * 0.5 = 25.
        assert_eq!(ons[0][2], 25);
    }

    #[test]
    fn test_finite_composition_stops_and_kills() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));
        comp.set_length(Time::new(1, 0));

        let (mut seq, recorder, mut rx) = sequencer_with(comp);
        seq.play();
        // One full tick to reach the end, one more subtick to pass it.
        for _ in 0..=SUBTICKS_PER_TICK {
            seq.advance();
        }

        assert_eq!(seq.state(), SequencerState::Stopped);
        let kills: Vec<Vec<u8>> = recorder
            .sent()
            .into_iter()
            .filter(|m| m[0] & 0xF0 == 0xB0 && m[1] == crate::midi::step::ALL_NOTES_OFF)
            .collect();
        assert_eq!(kills.len(), 16);

        let stopped =
            std::iter::from_fn(|| rx.try_pop()).any(|n| matches!(n, Notification::Stopped { .. }));
        assert!(stopped);
    }

    #[test]
    fn test_free_running_without_length() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));

        let (mut seq, _recorder, _rx) = sequencer_with(comp);
        seq.play();
        for _ in 0..100 {
            seq.advance();
        }
        assert_eq!(seq.state(), SequencerState::Running);
    }

    #[test]
    fn test_script_error_stops_playback() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));
        comp.schedule(
            Time::ZERO,
            ScheduledStep::Callback {
                channel: 1,
                callback: Box::new(|| Err("divide by zero".to_string())),
            },
        );

        let (mut seq, _recorder, mut rx) = sequencer_with(comp);
        seq.play();
        seq.advance();

        assert_eq!(seq.state(), SequencerState::Stopped);
        let errored =
            std::iter::from_fn(|| rx.try_pop()).any(|n| matches!(n, Notification::ScriptError(_)));
        assert!(errored);
    }

    #[test]
    fn test_healthy_callback_runs() {
        let hits = Arc::new(Mutex::new(0));
        let hits_in = hits.clone();

        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));
        comp.schedule(
            Time::ZERO,
            ScheduledStep::Callback {
                channel: 1,
                callback: Box::new(move || {
                    *hits_in.lock().unwrap() += 1;
                    Ok(())
                }),
            },
        );

        let (mut seq, _recorder, _rx) = sequencer_with(comp);
        seq.play();
        seq.advance();

        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(seq.state(), SequencerState::Running);
    }

    #[test]
    fn test_housekeep_runs_even_when_stopped() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        // A timed note sent outside the loop, then the sequencer stays
        // stopped; housekeeping must still retire it.
        seq.output()
            .send(&Step::NoteOn {
                channel: 1,
                note: 60,
                velocity: 100.0,
                velocity_to_play: 100.0,
                duration: Time::from_subticks(2),
            })
            .unwrap();

        for _ in 0..4 {
            seq.advance();
        }

        let offs: Vec<Vec<u8>> = recorder
            .sent()
            .into_iter()
            .filter(|m| m[0] & 0xF0 == 0x80)
            .collect();
        assert_eq!(offs.len(), 1);
    }

    #[test]
    fn test_commands_processed_on_advance() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        let (mut tx, rx_cmd) = create_command_channel(16);
        seq.set_command_source(rx_cmd);

        tx.try_push(Command::SetMasterVolume(50.0)).unwrap();
        tx.try_push(Command::Incoming(note_on(1, 72))).unwrap();
        seq.advance();

        assert_eq!(seq.master_volume(), 50.0);
        // Incoming step echoed to the output.
        assert_eq!(recorder.note_ons().len(), 1);
    }

    #[test]
    fn test_immediate_send_note_respects_gating() {
        let mut comp = Composition::new();
        let mut muted = Channel::new("pad", 1);
        muted.state = ChannelState::Mute;
        comp.add_channel(muted);
        comp.add_channel(Channel::new("lead", 2));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.send_note(1, 60, 100.0, Time::ZERO);
        seq.send_note(2, 64, 100.0, Time::ZERO);

        let ons = recorder.note_ons();
        assert_eq!(ons.len(), 1);
        assert_eq!(ons[0][0], 0x91);
    }

    #[test]
    fn test_send_note_zero_volume_is_note_off() {
        let mut comp = Composition::new();
        comp.add_channel(Channel::new("keys", 1));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.send_note(1, 60, 0.0, Time::ZERO);

        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0], 0x80);
    }

    #[test]
    fn test_time_wobble_defers_dispatch() {
        let mut comp = Composition::new();
        let mut ch = Channel::new("keys", 1);
        // Force every draw well into the future.
        ch.time_wobbler.set_range(20.0, 24.0);
        comp.add_channel(ch);
        comp.schedule(Time::ZERO, ScheduledStep::Step(note_on(1, 60)));

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.play();
        seq.advance();
        // Deferred, not dropped.
        assert!(recorder.note_ons().is_empty());
        assert_eq!(seq.composition().step_count(), 1);

        for _ in 0..40 {
            seq.advance();
        }
        assert_eq!(recorder.note_ons().len(), 1);
    }

    #[test]
    fn test_time_wobble_rolls_once_per_step() {
        let mut comp = Composition::new();
        let mut ch = Channel::new("keys", 1);
        // Strictly positive range: if the wobble re-rolled on the
        // rescheduled pass the step would be pushed forward forever.
        ch.time_wobbler.set_range(2.0, 4.0);
        comp.add_channel(ch);
        for i in 0..8 {
            comp.schedule(Time::new(i, 0), ScheduledStep::Step(note_on(1, 60 + i as i32)));
        }

        let (mut seq, recorder, _rx) = sequencer_with(comp);
        seq.play();
        for _ in 0..10_000 {
            seq.advance();
        }

        let ons = recorder.note_ons();
        assert_eq!(ons.len(), 8);
        // Blend applies exactly once: 100 * (90/127)^2 rounds to 50.
        for on in &ons {
            assert_eq!(on[2], 50);
        }
        assert_eq!(seq.composition().step_count(), 0);
    }
}
