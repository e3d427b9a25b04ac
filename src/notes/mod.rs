// Notes module - note/chord/scale name resolution
// Tables load from the script definitions resource; the parser resolves
// human-readable notation against them

pub mod parser;
pub mod table;

pub use parser::{NoteParser, is_white_key, split_note_number, NOTES_PER_OCTAVE, UNKNOWN_NAME};
pub use table::{DefsError, NoteTable, ScriptDefs};
