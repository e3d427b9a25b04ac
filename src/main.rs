// Stepline demo - a small looping composition driven by the wall clock

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ringbuf::traits::Consumer;
use stepline::midi::device;
use stepline::midi::input::MidiInput;
use stepline::midi::output::{DeviceCaps, NullTransport, OutputAdapter, Transport};
use stepline::notes::{NoteParser, NoteTable, ScriptDefs};
use stepline::sequencer::{Channel, Composition, Sequence, Sequencer, SequencerState, Time, Wobbler};
use stepline::settings::Settings;
use stepline::{create_command_channel, create_notification_channel, Notification};

const COMMAND_RINGBUFFER_CAPACITY: usize = 512;
const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 256;

const SETTINGS_PATH: &str = "stepline.ron";
const DEFS_PATH: &str = "resources/script_defs.md";

fn main() {
    env_logger::init();

    let settings = match Settings::load(Path::new(SETTINGS_PATH)) {
        Ok(settings) => settings,
        Err(e) => {
            log::info!("no settings file ({e}), using defaults");
            let settings = Settings::default();
            if let Err(e) = settings.save(Path::new(SETTINGS_PATH)) {
                log::warn!("could not write default settings: {e}");
            }
            settings
        }
    };

    let table = match NoteTable::load(Path::new(DEFS_PATH)) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("ERROR: cannot load {DEFS_PATH}: {e}");
            return;
        }
    };
    let defs = ScriptDefs::new();
    let parser = NoteParser::new(&table, &defs);

    let composition = match build_demo(&table, &parser) {
        Ok(composition) => composition,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return;
        }
    };

    // Real device when one is available, silent transport otherwise so
    // the loop still runs end to end.
    let transport: Box<dyn Transport> = match device::open_output(settings.output_device.as_deref())
    {
        Ok(connection) => Box::new(connection),
        Err(e) => {
            log::warn!("no MIDI output ({e}), running silent");
            Box::new(NullTransport)
        }
    };
    let mut adapter = OutputAdapter::new(transport, DeviceCaps::default());
    adapter.set_monitor(settings.monitor_output);
    let adapter = Arc::new(adapter);

    let (command_tx, command_rx) = create_command_channel(COMMAND_RINGBUFFER_CAPACITY);
    let (notification_tx, mut notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);

    let input = match MidiInput::open(
        settings.input_device.as_deref(),
        command_tx,
        settings.monitor_input,
    ) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("ERROR: MIDI input: {e}");
            return;
        }
    };
    if input.is_connected() {
        log::info!("MIDI input connected");
    }

    let mut sequencer = Sequencer::new(composition, adapter, notification_tx);
    sequencer.set_command_source(command_rx);
    sequencer.set_master_volume(settings.master_volume);
    sequencer.play();

    log::info!(
        "playing at {} ticks/minute ({:.2} ms per subtick)",
        settings.ticks_per_minute,
        settings.subtick_period_ms()
    );

    // Wall-clock driver: one advance() per subtick period. Sleep-based
    // timing drifts, so each deadline derives from the start instant.
    let period = Duration::from_secs_f64(settings.subtick_period_ms() / 1000.0);
    let start = Instant::now();
    let mut elapsed_subticks: u32 = 0;

    while sequencer.state() == SequencerState::Running {
        sequencer.advance();

        while let Some(notification) = notification_rx.try_pop() {
            match notification {
                Notification::ScriptError(message) => eprintln!("script error: {message}"),
                Notification::TransportError(message) => eprintln!("transport error: {message}"),
                Notification::Stopped { at } => println!("stopped at {at}"),
                _ => {}
            }
        }

        elapsed_subticks += 1;
        let deadline = start + period * elapsed_subticks;
        if let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            std::thread::sleep(remaining);
        }
    }

    // Anything still ringing past the end.
    while sequencer.output().pending_count() > 0 {
        sequencer.advance();
        std::thread::sleep(period);
    }

    println!("done at {}", sequencer.time());
}

/// Four bars of I-IV-V-I with a straight rock drum pattern.
fn build_demo(table: &NoteTable, parser: &NoteParser<'_>) -> Result<Composition, MainError> {
    let mut composition = Composition::new();

    let mut keys = Channel::new("keys", 1);
    keys.volume_wobbler = Wobbler::with_range(-8.0, 8.0);
    composition.add_channel(keys);
    composition.add_channel(Channel::new("drums", 10));

    let mut chords = Sequence::new();
    chords.add(0.0, "C4.M", 90.0, 3.5);
    chords.add(4.0, "F4.M", 90.0, 3.5);
    chords.add(8.0, "G4.7", 90.0, 3.5);
    chords.add(12.0, "C4.M", 95.0, 3.5);
    composition.add_sequence(1, Time::ZERO, chords, parser)?;

    let kick = drum_number(table, "AcousticBassDrum")?;
    let snare = drum_number(table, "AcousticSnare")?;
    let hat = drum_number(table, "ClosedHiHat")?;

    for bar in 0..4 {
        let mut drums = Sequence::new();
        drums.add_pattern("x-------x-------", kick, 100.0, 0.1)?;
        drums.add_pattern("----x-------x---", snare, 95.0, 0.1)?;
        drums.add_pattern("x-x-x-x-x-x-x-x-", hat, 70.0, 0.1)?;
        composition.add_sequence(10, Time::new(bar * 4, 0), drums, parser)?;
    }

    composition.set_length(Time::new(16, 0));
    Ok(composition)
}

fn drum_number(table: &NoteTable, name: &str) -> Result<i32, MainError> {
    let raw = table
        .drum_note(name)
        .ok_or_else(|| MainError::UnknownDrum(name.to_string()))?;
    raw.parse::<i32>()
        .map_err(|_| MainError::UnknownDrum(name.to_string()))
}

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error("unknown drum '{0}'")]
    UnknownDrum(String),

    #[error(transparent)]
    Composition(#[from] stepline::sequencer::CompositionError),
}
