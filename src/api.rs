//! JSON-in / JSON-out entry points for a front end.
//!
//! Every function takes plain strings and returns a JSON string. Failures come
//! back as a serialized [`ApiError`] so callers on the other side of a language
//! boundary get the location without parsing error text.

use serde::Serialize;

use crate::chord::{parse_chord_symbol, CHORD_OCTAVE};
use crate::document;
use crate::error::SongError;
use crate::instruments::{instrument_notes, InstrumentId};
use crate::sequencer::{flatten_line, flatten_song, locate_beat};
use crate::theory::{scale_notes, Scale};

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub line: Option<usize>,
    pub bar: Option<usize>,
}

impl From<SongError> for ApiError {
    fn from(e: SongError) -> Self {
        let (line, bar) = match &e {
            SongError::LineNotFound { line } => (Some(*line), None),
            SongError::BarNotFound { line, bar } | SongError::ChordNotFound { line, bar, .. } => {
                (Some(*line), Some(*bar))
            }
            SongError::LaneNotFound { line, .. } | SongError::NoteNotFound { line, .. } => (Some(*line), None),
            _ => (None, None),
        };
        ApiError {
            message: e.to_string(),
            line,
            bar,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| error_json(SongError::Json(e)))
}

fn error_json(e: SongError) -> String {
    let error = ApiError::from(e);
    serde_json::to_string(&error).unwrap_or_else(|_| format!("{{\"message\":{:?}}}", error.message))
}

/// Scale pitch classes as a JSON array. Unknown keys or scale names give `[]`.
pub fn scale_notes_json(key: &str, scale: &str) -> String {
    let notes = Scale::from_name(scale)
        .map(|scale| scale_notes(key, scale))
        .unwrap_or_default();
    serde_json::to_string(&notes).unwrap_or_else(|_| "[]".to_string())
}

/// Selectable pitches for an instrument key such as `acoustic_bass`.
pub fn instrument_notes_json(instrument: &str, key: &str, scale: &str) -> Result<String, String> {
    let Some(id) = InstrumentId::from_key(instrument) else {
        return Err(error_json(SongError::Document(format!(
            "Unknown instrument '{}'",
            instrument
        ))));
    };
    let notes = Scale::from_name(scale)
        .map(|scale| scale_notes(key, scale))
        .unwrap_or_default();
    to_json(&instrument_notes(id, &notes, key))
}

/// MIDI notes of a chord symbol voiced for playback. Unparseable symbols give `[]`.
pub fn chord_notes_json(symbol: &str) -> String {
    let notes = parse_chord_symbol(symbol)
        .map(|chord| chord.midi_notes(CHORD_OCTAVE))
        .unwrap_or_default();
    serde_json::to_string(&notes).unwrap_or_else(|_| "[]".to_string())
}

/// Flatten a whole song document into `{ "chords": [...], "notes": [...] }`.
pub fn flatten_json(json: &str) -> Result<String, String> {
    let song = document::from_json(json).map_err(error_json)?;
    to_json(&flatten_song(&song))
}

/// Flatten one line of a song document, starting at beat 0.
pub fn flatten_line_json(json: &str, line: usize) -> Result<String, String> {
    let song = document::from_json(json).map_err(error_json)?;
    let sequence = flatten_line(&song, line).map_err(error_json)?;
    to_json(&sequence)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionJson {
    line: usize,
    bar: usize,
    beat_in_line: f64,
}

/// Visual position of a played beat, or `null` past the end of the song.
pub fn locate_beat_json(json: &str, beat: f64) -> Result<String, String> {
    let song = document::from_json(json).map_err(error_json)?;
    let position = locate_beat(&song, beat).map(|p| PositionJson {
        line: p.line,
        bar: p.bar,
        beat_in_line: p.beat_in_line,
    });
    to_json(&position)
}
