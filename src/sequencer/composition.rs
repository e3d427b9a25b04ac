// Composition - sequences materialized into a time-indexed step collection
// Sequences are authored in musical terms (note strings, drum patterns,
// callbacks); the composition resolves them into Steps keyed by subtick

use crate::midi::step::Step;
use crate::notes::parser::NoteParser;
use crate::sequencer::channel::Channel;
use crate::sequencer::time::{Time, SUBTICKS_PER_TICK};
use std::collections::BTreeMap;
use std::fmt;

/// Script-supplied action run when its slot comes due. Errors are
/// reported and stop playback; they never unwind into the tick loop.
pub type ScriptCallback = Box<dyn FnMut() -> Result<(), String> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("invalid pattern char '{ch}' at position {position}")]
    InvalidPatternChar { ch: char, position: usize },

    #[error("no channel numbered {0}")]
    UnknownChannel(u8),
}

/// One entry in the due-step collection.
pub enum ScheduledStep {
    Step(Step),
    /// A step whose volume blend and wobble already happened, pushed to
    /// a later slot by time wobble. Dispatched as-is when due; only
    /// gating applies again.
    Prepared(Step),
    Callback { channel: u8, callback: ScriptCallback },
}

impl fmt::Debug for ScheduledStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduledStep::Step(step) => write!(f, "ScheduledStep::Step({step})"),
            ScheduledStep::Prepared(step) => write!(f, "ScheduledStep::Prepared({step})"),
            ScheduledStep::Callback { channel, .. } => {
                write!(f, "ScheduledStep::Callback(ch:{channel})")
            }
        }
    }
}

enum SequenceWhat {
    NoteString(String),
    NoteNumber(i32),
    Callback(ScriptCallback),
}

struct SequenceElement {
    when: Time,
    volume: f64,
    duration: Time,
    what: SequenceWhat,
}

/// One authored sequence: a list of notes, drum hits or callbacks with
/// relative times. Added to a composition at an offset.
#[derive(Default)]
pub struct Sequence {
    elements: Vec<SequenceElement>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a note or chord by name, e.g. `seq.add(0.0, "G3", 90.0, 0.5)`.
    /// `when` and `duration` are decimal tick values.
    pub fn add(&mut self, when: f64, what: impl Into<String>, volume: f64, duration: f64) {
        self.elements.push(SequenceElement {
            when: Time::from_decimal(when),
            volume,
            duration: Time::from_decimal(duration),
            what: SequenceWhat::NoteString(what.into()),
        });
    }

    /// Add a raw note number, e.g. a drum constant.
    pub fn add_note(&mut self, when: f64, note: i32, volume: f64, duration: f64) {
        self.elements.push(SequenceElement {
            when: Time::from_decimal(when),
            volume,
            duration: Time::from_decimal(duration),
            what: SequenceWhat::NoteNumber(note),
        });
    }

    /// Add a script callback to run at the given time.
    pub fn add_callback(
        &mut self,
        when: f64,
        callback: impl FnMut() -> Result<(), String> + Send + 'static,
        volume: f64,
    ) {
        self.elements.push(SequenceElement {
            when: Time::from_decimal(when),
            volume,
            duration: Time::ZERO,
            what: SequenceWhat::Callback(Box::new(callback)),
        });
    }

    /// Add a drum pattern like `"x---x---x---x---"`. Each slot is a
    /// sixteenth (a quarter of a tick).
    pub fn add_pattern(
        &mut self,
        pattern: &str,
        note: i32,
        volume: f64,
        duration: f64,
    ) -> Result<(), CompositionError> {
        const SLOTS_PER_TICK: u32 = 4;

        for (i, ch) in pattern.chars().enumerate() {
            match ch {
                'x' => {
                    let i = i as u32;
                    let when = Time::new(
                        i / SLOTS_PER_TICK,
                        (i % SLOTS_PER_TICK) * SUBTICKS_PER_TICK / SLOTS_PER_TICK,
                    );
                    self.elements.push(SequenceElement {
                        when,
                        volume,
                        duration: Time::from_decimal(duration),
                        what: SequenceWhat::NoteNumber(note),
                    });
                }
                '-' => {} // rest
                other => {
                    return Err(CompositionError::InvalidPatternChar {
                        ch: other,
                        position: i,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// The complete composition: channels plus every scheduled step, keyed
/// by absolute subtick. Built once during setup, consumed by the
/// sequencer as time passes.
#[derive(Default)]
pub struct Composition {
    channels: Vec<Channel>,
    steps: BTreeMap<u64, Vec<ScheduledStep>>,
    length: Option<Time>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Channel] {
        &mut self.channels
    }

    pub fn channel(&self, number: u8) -> Option<&Channel> {
        self.channels.iter().find(|c| c.number == number)
    }

    pub fn channel_mut(&mut self, number: u8) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.number == number)
    }

    /// Finite end time. With none set, playback free-runs forever.
    pub fn set_length(&mut self, length: Time) {
        self.length = Some(length);
    }

    pub fn length(&self) -> Option<Time> {
        self.length
    }

    /// Materialize a sequence onto a channel starting at `start`.
    /// Note strings resolve through the parser; a string that parses to
    /// nothing is logged and skipped, it is not an error.
    pub fn add_sequence(
        &mut self,
        channel: u8,
        start: Time,
        sequence: Sequence,
        parser: &NoteParser<'_>,
    ) -> Result<(), CompositionError> {
        if self.channel(channel).is_none() {
            return Err(CompositionError::UnknownChannel(channel));
        }

        for element in sequence.elements {
            let when = start + element.when;
            match element.what {
                SequenceWhat::NoteString(s) => {
                    let notes = parser.parse_note(&s);
                    if notes.is_empty() {
                        log::warn!("invalid note '{s}', skipped");
                    }
                    for note in notes {
                        self.schedule_note(channel, when, note, element.volume, element.duration);
                    }
                }
                SequenceWhat::NoteNumber(note) => {
                    self.schedule_note(channel, when, note, element.volume, element.duration);
                }
                SequenceWhat::Callback(callback) => {
                    self.schedule(when, ScheduledStep::Callback { channel, callback });
                }
            }
        }
        Ok(())
    }

    /// Raw insertion at an absolute time. Also used by the sequencer to
    /// push time-wobbled steps a little into the future.
    pub fn schedule(&mut self, at: Time, step: ScheduledStep) {
        self.steps.entry(at.total_subticks()).or_default().push(step);
    }

    /// Remove and return everything due exactly at `at`. Steps are
    /// consumed exactly once.
    pub fn take_steps_at(&mut self, at: Time) -> Vec<ScheduledStep> {
        self.steps.remove(&at.total_subticks()).unwrap_or_default()
    }

    /// Total number of scheduled entries still waiting.
    pub fn step_count(&self) -> usize {
        self.steps.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn schedule_note(&mut self, channel: u8, when: Time, note: i32, volume: f64, duration: Time) {
        self.schedule(
            when,
            ScheduledStep::Step(Step::NoteOn {
                channel,
                note,
                velocity: volume,
                velocity_to_play: volume,
                duration,
            }),
        );
    }
}
