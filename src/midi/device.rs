// MIDI device enumeration and connection

use crate::midi::MidiError;
use midir::{MidiInput as MidirInput, MidiInputPort, MidiOutput as MidirOutput,
            MidiOutputConnection};

const CLIENT_NAME: &str = "stepline";

/// List the names of all MIDI input ports.
pub fn list_input_ports() -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(midi_in) = MidirInput::new(CLIENT_NAME) {
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                names.push(name);
            }
        }
    }
    names
}

/// List the names of all MIDI output ports.
pub fn list_output_ports() -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(midi_out) = MidirOutput::new(CLIENT_NAME) {
        for port in midi_out.ports() {
            if let Ok(name) = midi_out.port_name(&port) {
                names.push(name);
            }
        }
    }
    names
}

/// Find an input port whose name contains the given string, or take
/// the first port when no name is given.
pub fn find_input_port(
    device_name: Option<&str>,
) -> Result<(MidirInput, MidiInputPort), MidiError> {
    let midi_in = MidirInput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
    let ports = midi_in.ports();

    let port = match device_name {
        Some(wanted) => ports
            .into_iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .map(|n| n.contains(wanted))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::DeviceNotFound(wanted.to_string()))?,
        None => ports
            .into_iter()
            .next()
            .ok_or_else(|| MidiError::DeviceNotFound("any input".to_string()))?,
    };

    Ok((midi_in, port))
}

/// Connect to an output port whose name contains the given string, or
/// to the first port when no name is given.
pub fn open_output(device_name: Option<&str>) -> Result<MidiOutputConnection, MidiError> {
    let midi_out = MidirOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
    let ports = midi_out.ports();

    let port = match device_name {
        Some(wanted) => ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| n.contains(wanted))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::DeviceNotFound(wanted.to_string()))?,
        None => ports
            .first()
            .ok_or_else(|| MidiError::DeviceNotFound("any output".to_string()))?,
    };

    let name = midi_out
        .port_name(port)
        .unwrap_or_else(|_| "unknown".to_string());
    log::info!("opening MIDI output '{name}'");

    midi_out
        .connect(port, "stepline-out")
        .map_err(|e| MidiError::Connect(e.to_string()))
}
