pub mod api;
pub mod chart;
pub mod chord;
pub mod document;
pub mod editor;
pub mod error;
pub mod instruments;
pub mod midi;
pub mod model;
pub mod musicxml;
pub mod scheduler;
pub mod sequencer;
pub mod settings;
pub mod theory;

pub use chord::{ChordExtension, ChordQuality, ChordSymbol};
pub use editor::{Change, Command, Editor, EditorSession};
pub use error::*;
pub use instruments::InstrumentId;
pub use model::{Bar, ChordSegment, ChordSpec, GridNote, Line, MelodyLane, Song, TimeSignature};
pub use musicxml::to_musicxml;
pub use sequencer::{flatten_song, flatten_to_events, Sequence};
pub use settings::Settings;
pub use theory::Scale;

/// Load a song document (JSON or YAML, by extension) and render it as MusicXML.
pub fn export_musicxml(path: impl AsRef<std::path::Path>) -> Result<String, SongError> {
    let song = document::load(path)?;
    Ok(to_musicxml(&song))
}

/// Load a song document and render it as a Standard MIDI File.
pub fn export_midi(path: impl AsRef<std::path::Path>) -> Result<Vec<u8>, SongError> {
    let song = document::load(path)?;
    midi::song_to_midi(&song)
}
