// Note string parsing and formatting
// Resolves "F4", "Db3.m7", "C.BLA" style strings to absolute note numbers
// against the built-in and script-scope tables

use crate::notes::table::{NoteTable, ScriptDefs};

pub const NOTES_PER_OCTAVE: i32 = 12;

/// Marker emitted for note lists that match no known chord, and for
/// note numbers with no drum name.
pub const UNKNOWN_NAME: &str = "???";

/// Enharmonic name table. Index modulo 12 is the pitch class, so the
/// extra rows alias onto the first: B# is C, the bare digits 1..12 are
/// the chromatic degrees for numeric key input. Empty slots never match.
const NOTE_NAMES: [&str; 36] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
    "B#", "C#", "", "D#", "Fb", "E#", "F#", "", "G#", "", "A#", "Cb",
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
];

/// Canonical names for formatting note numbers back to strings.
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Interval name to semitone offset. Index is the offset; empty slots
/// are chromatic steps with no plain interval name and never match.
const INTERVAL_OFFSETS: [&str; 24] = [
    "1", "", "2", "", "3", "4", "", "5", "", "6", "", "7",
    "", "", "9", "", "", "11", "", "", "", "13", "", "",
];

/// Semitone offset to interval name, for the reverse (chord naming)
/// direction. Empty slots format as nothing.
const INTERVAL_NAMES: [&str; 24] = [
    "1", "b2", "2", "b3", "3", "4", "b5", "5", "#5", "6", "b7", "7",
    "", "", "9", "#9", "", "11", "#11", "", "", "13", "", "",
];

/// Split an absolute note number into (pitch class, octave).
/// Octave 4 holds middle C (note 60).
pub fn split_note_number(note: i32) -> (i32, i32) {
    let root = note.rem_euclid(NOTES_PER_OCTAVE);
    let octave = note.div_euclid(NOTES_PER_OCTAVE) - 1;
    (root, octave)
}

/// True iff the note falls on a piano white key.
pub fn is_white_key(note: i32) -> bool {
    const NATURALS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
    NATURALS.contains(&note.rem_euclid(NOTES_PER_OCTAVE))
}

/// Resolve a note name (without octave) to its pitch class.
fn note_name_to_number(name: &str) -> Option<i32> {
    if name.is_empty() {
        return None;
    }
    NOTE_NAMES
        .iter()
        .position(|&n| n == name)
        .map(|i| i as i32 % NOTES_PER_OCTAVE)
}

/// Resolve an interval token like "b3", "#11" or "5" to a semitone
/// offset. Flats and sharps accumulate.
fn interval_offset(token: &str) -> Option<i32> {
    let flats = token.chars().filter(|&c| c == 'b').count() as i32;
    let sharps = token.chars().filter(|&c| c == '#').count() as i32;
    let bare: String = token.chars().filter(|&c| c != 'b' && c != '#').collect();

    if bare.is_empty() {
        return None;
    }

    INTERVAL_OFFSETS
        .iter()
        .position(|&n| n == bare)
        .map(|i| i as i32 + sharps - flats)
}

/// Interval name for a semitone offset, or empty when the offset has no
/// plain name (which makes any chord match fail, as intended).
fn interval_name(offset: i32) -> &'static str {
    if offset < 0 || offset as usize >= INTERVAL_NAMES.len() {
        return "";
    }
    INTERVAL_NAMES[offset as usize]
}

/// Resolves note strings against the built-in and script-scope tables.
///
/// Pure borrower; build one wherever a string needs resolving. On any
/// malformed input the parse functions return an empty list - "no note"
/// is signalled by emptiness, never by an error.
pub struct NoteParser<'a> {
    table: &'a NoteTable,
    script: &'a ScriptDefs,
}

impl<'a> NoteParser<'a> {
    pub fn new(table: &'a NoteTable, script: &'a ScriptDefs) -> Self {
        Self { table, script }
    }

    /// Parse a note/chord string into absolute note numbers.
    ///
    /// Accepted forms: `"F4"` (named note), `"F4.dim7"` (named chord),
    /// `"F4.BLA"` (script-defined chord), `"5"` (chromatic degree,
    /// default octave). Octave defaults to 4, the middle-C convention.
    pub fn parse_note(&self, input: &str) -> Vec<i32> {
        let parts: Vec<&str> = input
            .split('.')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let Some(&token) = parts.first() else {
            return Vec::new();
        };

        // Trailing digit is the octave, unless the digit is the whole name.
        let mut octave = 4i32;
        let mut name = token;
        if token.len() > 1
            && let Some(last) = token.chars().last()
            && let Some(digit) = last.to_digit(10)
        {
            octave = digit as i32;
            name = &token[..token.len() - 1];
        }

        let Some(pitch_class) = note_name_to_number(name) else {
            return Vec::new();
        };
        let root = pitch_class + (octave + 1) * NOTES_PER_OCTAVE;

        let Some(&chord_name) = parts.get(1) else {
            return vec![root];
        };

        // Chord or scale suffix - script definitions shadow built-ins.
        let Some(intervals) = self
            .script
            .get(chord_name)
            .or_else(|| self.table.chord_intervals(chord_name))
        else {
            return Vec::new();
        };

        let mut notes = Vec::new();
        for raw in intervals.split_whitespace() {
            let down = raw.starts_with('-');
            let token: String = raw.chars().filter(|&c| c != '-').collect();

            // Unknown interval tokens are skipped silently.
            if let Some(mut offset) = interval_offset(&token) {
                if down {
                    offset -= NOTES_PER_OCTAVE;
                }
                notes.push(root + offset);
            }
        }
        notes
    }

    /// Absolute note numbers for a named scale in the given key.
    /// `key` is any form `parse_note` accepts; its first note is the root.
    pub fn get_scale_notes(&self, scale: &str, key: &str) -> Vec<i32> {
        let key_notes = self.parse_note(key);
        let Some(&root) = key_notes.first() else {
            return Vec::new();
        };

        let Some(intervals) = self
            .script
            .get(scale)
            .or_else(|| self.table.scale_intervals(scale))
        else {
            return Vec::new();
        };

        intervals
            .split_whitespace()
            .filter_map(interval_offset)
            .map(|offset| root + offset)
            .collect()
    }

    /// Format a note list back to strings. A list whose intervals match
    /// a built-in chord definition formats as one `"root.octave.chord"`
    /// string; otherwise every note is emitted individually with the
    /// unknown-chord marker.
    pub fn format_notes(&self, notes: &[i32]) -> Vec<String> {
        let Some(&first) = notes.first() else {
            return Vec::new();
        };

        let (root, octave) = split_note_number(first);
        let sroot = format!("{}.{}", FLAT_NAMES[root as usize], octave);

        if notes.len() == 1 {
            return vec![sroot];
        }

        let min = *notes.iter().min().unwrap_or(&first);
        let intervals: Vec<&str> = notes.iter().map(|&n| interval_name(n - min)).collect();
        let joined = intervals.join(" ");

        for name in self.table.chord_names() {
            if self.table.chord_intervals(name) == Some(joined.as_str()) {
                return vec![format!("{sroot}.{name}")];
            }
        }

        notes
            .iter()
            .map(|&n| {
                let (root, octave) = split_note_number(n);
                format!("{}.{}.{}", FLAT_NAMES[root as usize], octave, UNKNOWN_NAME)
            })
            .collect()
    }

    /// Drum name for a note number, by reverse lookup into the drum
    /// table. Unknown numbers format as the unknown marker.
    pub fn format_drum(&self, note: i32) -> String {
        let wanted = note.to_string();
        for name in self.table.drum_names() {
            if self.table.drum_note(name) == Some(wanted.as_str()) {
                return name.to_string();
            }
        }
        UNKNOWN_NAME.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::table::{NoteTable, ScriptDefs};
    use std::io::Cursor;

    const DEFS: &str = "\
Chord | Notes | Description
--- | --- | ---
M | 1 3 5 | Major triad
m | 1 b3 5 | Minor triad
M7 | 1 3 5 7 | Major seventh
m7b5 | 1 b3 b5 b7 | Half diminished

Scale | Notes | Description
--- | --- | ---
Major | 1 2 3 4 5 6 7 | Ionian
NaturalMinor | 1 2 b3 4 5 b6 b7 | Aeolian

Drum | Note
--- | ---
AcousticBassDrum | 35
AcousticSnare | 38
ClosedHiHat | 42
";

    fn table() -> NoteTable {
        NoteTable::read(Cursor::new(DEFS)).unwrap()
    }

    #[test]
    fn test_parse_single_notes() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        assert_eq!(parser.parse_note("C4"), vec![60]);
        assert_eq!(parser.parse_note("A4"), vec![69]);
        assert_eq!(parser.parse_note("Db3"), vec![49]);
        // Enharmonic alias row maps onto the same pitch classes.
        assert_eq!(parser.parse_note("C#3"), vec![49]);
        // Default octave is 4.
        assert_eq!(parser.parse_note("C"), vec![60]);
        assert_eq!(parser.parse_note("F"), vec![65]);
    }

    #[test]
    fn test_parse_numeric_degrees() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        // Bare chromatic degree, default octave.
        assert_eq!(parser.parse_note("1"), vec![60]);
        assert_eq!(parser.parse_note("5"), vec![64]);
        // Two-digit input: trailing digit is the octave.
        assert_eq!(parser.parse_note("12"), vec![36]);
    }

    #[test]
    fn test_parse_chords() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        // F4 major triad: 1 3 5 over root 65.
        assert_eq!(parser.parse_note("F4.M"), vec![65, 69, 72]);
        assert_eq!(parser.parse_note("C4.m"), vec![60, 63, 67]);
        assert_eq!(parser.parse_note("C4.M7"), vec![60, 64, 67, 71]);
        assert_eq!(parser.parse_note("C4.m7b5"), vec![60, 63, 66, 70]);
    }

    #[test]
    fn test_parse_script_defined_chord_shadows() {
        let table = table();
        let mut script = ScriptDefs::new();
        script.define("BLA", "1 4 6 -1");
        script.define("M", "1 5");

        let parser = NoteParser::new(&table, &script);
        // Down-octave flag drops the interval by 12.
        assert_eq!(parser.parse_note("C4.BLA"), vec![60, 65, 69, 48]);
        // Script definition shadows the stock M.
        assert_eq!(parser.parse_note("C4.M"), vec![60, 67]);
    }

    #[test]
    fn test_parse_invalid_is_empty() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        assert!(parser.parse_note("").is_empty());
        assert!(parser.parse_note("bogus").is_empty());
        assert!(parser.parse_note("H4").is_empty());
        assert!(parser.parse_note("C4.nochord").is_empty());
    }

    #[test]
    fn test_unknown_interval_tokens_skipped() {
        let table = table();
        let mut script = ScriptDefs::new();
        script.define("ODD", "1 zzz 5");

        let parser = NoteParser::new(&table, &script);
        assert_eq!(parser.parse_note("C4.ODD"), vec![60, 67]);
    }

    #[test]
    fn test_format_notes_round_trip() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        let notes = parser.parse_note("C4.M");
        assert_eq!(parser.format_notes(&notes), vec!["C.4.M"]);

        let single = parser.parse_note("A4");
        assert_eq!(parser.format_notes(&single), vec!["A.4"]);
    }

    #[test]
    fn test_format_notes_unknown_chord() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        // A cluster no one defined: each note formats individually.
        let formatted = parser.format_notes(&[60, 61, 62]);
        assert_eq!(
            formatted,
            vec!["C.4.???", "Db.4.???", "D.4.???"]
        );
    }

    #[test]
    fn test_get_scale_notes() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        assert_eq!(
            parser.get_scale_notes("Major", "C4"),
            vec![60, 62, 64, 65, 67, 69, 71]
        );
        assert_eq!(
            parser.get_scale_notes("NaturalMinor", "A3"),
            vec![57, 59, 60, 62, 64, 65, 67]
        );
        assert!(parser.get_scale_notes("NoSuchScale", "C4").is_empty());
        assert!(parser.get_scale_notes("Major", "bogus").is_empty());
    }

    #[test]
    fn test_format_drum() {
        let table = table();
        let script = ScriptDefs::new();
        let parser = NoteParser::new(&table, &script);

        assert_eq!(parser.format_drum(35), "AcousticBassDrum");
        assert_eq!(parser.format_drum(42), "ClosedHiHat");
        assert_eq!(parser.format_drum(1), UNKNOWN_NAME);
    }

    #[test]
    fn test_is_white_key() {
        assert!(is_white_key(60)); // C
        assert!(!is_white_key(61)); // Db
        assert!(is_white_key(71)); // B
        assert!(is_white_key(0));
    }

    #[test]
    fn test_split_note_number() {
        assert_eq!(split_note_number(60), (0, 4));
        assert_eq!(split_note_number(69), (9, 4));
        assert_eq!(split_note_number(0), (0, -1));
    }
}
