// Settings - persisted engine configuration in RON format

use crate::sequencer::time::SUBTICKS_PER_TICK;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("RON parse error: {0}")]
    Parse(#[from] ron::de::SpannedError),
}

/// Engine configuration, loaded at startup and saved on change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tempo as ticks (beats) per minute.
    pub ticks_per_minute: u32,
    /// Master volume, 0-127.
    pub master_volume: f64,
    /// Preferred MIDI input device, substring match. None means the
    /// first available port.
    pub input_device: Option<String>,
    /// Preferred MIDI output device, substring match.
    pub output_device: Option<String>,
    /// Log every step received from the input device.
    pub monitor_input: bool,
    /// Log every step sent to the output device.
    pub monitor_output: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ticks_per_minute: 100,
            master_volume: 90.0,
            input_device: None,
            output_device: None,
            monitor_input: false,
            monitor_output: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let data = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let pretty = ron::ser::PrettyConfig::default();
        let data = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Milliseconds between host timer callbacks for the configured
    /// tempo. One callback per subtick.
    pub fn subtick_period_ms(&self) -> f64 {
        60_000.0 / self.ticks_per_minute as f64 / SUBTICKS_PER_TICK as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.ticks_per_minute, 100);
        assert_eq!(settings.master_volume, 90.0);
        assert!(settings.input_device.is_none());
        assert!(!settings.monitor_output);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.ron");

        let mut settings = Settings::default();
        settings.ticks_per_minute = 120;
        settings.output_device = Some("loopMIDI".to_string());
        settings.monitor_output = true;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.ticks_per_minute, 120);
        assert_eq!(loaded.output_device.as_deref(), Some("loopMIDI"));
        assert!(loaded.monitor_output);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(&dir.path().join("nope.ron"));
        assert!(matches!(result, Err(SettingsError::Io(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.ron");
        std::fs::write(&path, "(ticks_per_minute: 90)").unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.ticks_per_minute, 90);
        assert_eq!(loaded.master_volume, 90.0);
    }

    #[test]
    fn test_subtick_period() {
        let settings = Settings {
            ticks_per_minute: 60,
            ..Settings::default()
        };
        // 60 bpm = 1000ms per tick, 8 subticks per tick.
        assert!((settings.subtick_period_ms() - 125.0).abs() < 1e-9);
    }
}
