// Note tables - chord/scale/drum definitions
// Built-ins load once from the definitions resource; script definitions
// live in a separate mutable table merged only at lookup time

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Definitions resource parse error.
#[derive(Debug, thiserror::Error)]
pub enum DefsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Definitions resource has no sections")]
    Empty,
}

/// The built-in chord, scale and drum name tables.
///
/// Loaded once at startup from a line-oriented resource:
/// sections are headed by a `Chord`, `Scale` or `Drum` marker row, and
/// each following `name | field1 | field2 | ...` row defines one entry
/// until a blank line or the next header. Field 0 is the interval list
/// (or the drum note number); later fields are documentation.
///
/// Read-only after load. Keys are case-sensitive exact-match strings;
/// a repeated name overwrites the earlier definition.
#[derive(Debug, Clone, Default)]
pub struct NoteTable {
    chords: HashMap<String, Vec<String>>,
    scales: HashMap<String, Vec<String>>,
    drums: HashMap<String, Vec<String>>,
}

/// Which table a parsed row belongs to.
#[derive(Clone, Copy)]
enum Section {
    Chords,
    Scales,
    Drums,
}

impl NoteTable {
    /// Load the definitions resource from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefsError> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Parse the definitions resource from any line source.
    pub fn read(reader: impl BufRead) -> Result<Self, DefsError> {
        let mut table = Self::default();
        let mut section: Option<Section> = None;

        for line in reader.lines() {
            let line = line?;
            let parts: Vec<String> = line
                .split('|')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();

            if parts.len() > 1 {
                match parts[0].as_str() {
                    "Chord" => section = Some(Section::Chords),
                    "Scale" => section = Some(Section::Scales),
                    "Drum" => section = Some(Section::Drums),
                    s if s.starts_with("---") => {} // markdown separator row
                    _ => {
                        if let Some(sec) = section {
                            let name = parts[0].clone();
                            let fields = parts[1..].to_vec();
                            match sec {
                                Section::Chords => table.chords.insert(name, fields),
                                Section::Scales => table.scales.insert(name, fields),
                                Section::Drums => table.drums.insert(name, fields),
                            };
                        }
                    }
                }
            } else {
                // Blank line or prose ends the current section.
                section = None;
            }
        }

        if table.chords.is_empty() && table.scales.is_empty() && table.drums.is_empty() {
            return Err(DefsError::Empty);
        }

        Ok(table)
    }

    /// Interval list for a built-in chord.
    pub fn chord_intervals(&self, name: &str) -> Option<&str> {
        self.chords.get(name).and_then(|f| f.first()).map(String::as_str)
    }

    /// Interval list for a built-in scale.
    pub fn scale_intervals(&self, name: &str) -> Option<&str> {
        self.scales.get(name).and_then(|f| f.first()).map(String::as_str)
    }

    /// Note number field for a built-in drum name.
    pub fn drum_note(&self, name: &str) -> Option<&str> {
        self.drums.get(name).and_then(|f| f.first()).map(String::as_str)
    }

    /// Chord names in deterministic order, for reverse lookup.
    pub fn chord_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chords.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Drum names in deterministic order, for reverse lookup.
    pub fn drum_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drums.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Script-scope chord/scale definitions, added at runtime.
///
/// Searched before the built-in tables so a script can shadow a stock
/// name. Drums are built-in only.
#[derive(Debug, Clone, Default)]
pub struct ScriptDefs {
    defs: HashMap<String, String>,
}

impl ScriptDefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a chord/scale as a space-separated interval
    /// list, e.g. `"1 3 5 b7"`.
    pub fn define(&mut self, name: impl Into<String>, intervals: impl Into<String>) {
        self.defs.insert(name.into(), intervals.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.defs.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
