//! Song persistence.
//!
//! Songs are stored in the interchange shape (camelCase keys):
//!
//! ```json
//! {
//!   "key": "C", "scale": "major", "timeSignature": "4/4", "barsPerLine": 4, "bpm": 120,
//!   "lines": [{
//!     "bars": [{ "chords": [], "lyrics": "", "repeatStart": false, "repeatEnd": false }],
//!     "melodyLines": [{ "id": "m0", "instrument": "piano", "pitchScale": ["C5"],
//!                       "notes": [{ "id": "n0", "row": 0, "col": 0, "span": 4, "pitch": "C5", "midiNote": 72 }],
//!                       "volume": 0.7, "collapsed": false }]
//!   }]
//! }
//! ```
//!
//! JSON and YAML carry the same structure. [`load`] and [`save`] pick the format
//! from the file extension (`.yaml` / `.yml`, anything else is JSON).

use std::path::Path;

use crate::error::SongError;
use crate::model::Song;
use crate::settings::{validate_bars_per_line, validate_bpm, validate_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

pub fn to_json(song: &Song) -> Result<String, SongError> {
    Ok(serde_json::to_string_pretty(song)?)
}

pub fn from_json(content: &str) -> Result<Song, SongError> {
    let song: Song = serde_json::from_str(content)?;
    finish_load(song)
}

pub fn to_yaml(song: &Song) -> Result<String, SongError> {
    Ok(serde_yaml::to_string(song)?)
}

pub fn from_yaml(content: &str) -> Result<Song, SongError> {
    let song: Song = serde_yaml::from_str(content)?;
    finish_load(song)
}

pub fn load(path: impl AsRef<Path>) -> Result<Song, SongError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let song = match Format::from_path(path) {
        Format::Json => from_json(&content)?,
        Format::Yaml => from_yaml(&content)?,
    };
    log::debug!("loaded {} lines from {}", song.lines.len(), path.display());
    Ok(song)
}

pub fn save(song: &Song, path: impl AsRef<Path>) -> Result<(), SongError> {
    let path = path.as_ref();
    let content = match Format::from_path(path) {
        Format::Json => to_json(song)?,
        Format::Yaml => to_yaml(song)?,
    };
    std::fs::write(path, content)?;
    Ok(())
}

/// Validate the header, enforce the bar count per line and renumber lines.
fn finish_load(mut song: Song) -> Result<Song, SongError> {
    song.key = validate_key(&song.key)?;
    validate_bars_per_line(song.bars_per_line)?;
    validate_bpm(song.bpm)?;

    if song.lines.is_empty() {
        song.add_line();
    }
    let bars_per_line = song.bars_per_line;
    for (i, line) in song.lines.iter_mut().enumerate() {
        if line.bars.len() != bars_per_line {
            log::warn!(
                "Line {} has {} bars, expected {}; resizing",
                i,
                line.bars.len(),
                bars_per_line
            );
            line.bars.resize_with(bars_per_line, Default::default);
        }
    }
    // refits chords and notes to the declared grid
    song.set_time_signature(song.time_signature);
    song.reindex();
    Ok(song)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::InstrumentId;
    use crate::model::NoteVoice;
    use crate::theory::Scale;

    const DOC: &str = r##"{
        "key": "G",
        "scale": "mixolydian",
        "timeSignature": "3/4",
        "barsPerLine": 2,
        "bpm": 90,
        "lines": [
            {
                "bars": [
                    { "chords": [{ "root": "G", "quality": "", "extension": "7", "degree": 0, "duration": 3, "color": "#667eea" }],
                      "lyrics": "hello", "repeatStart": true, "repeatEnd": false },
                    { "chords": [], "lyrics": "", "repeatStart": false, "repeatEnd": true }
                ],
                "melodyLines": [
                    { "id": "m4", "instrument": "drumset", "pitchScale": ["Kick", "Snare"],
                      "notes": [{ "id": "n9", "row": 1, "col": 4, "span": 2, "pitch": "Snare", "drumName": "Snare" }],
                      "volume": 0.5 }
                ]
            },
            {
                "bars": [
                    { "chords": [{ "root": "C", "quality": "m", "extension": "", "degree": -1, "duration": 2 }] },
                    {}
                ]
            }
        ]
    }"##;

    #[test]
    fn test_load_document() {
        let song = from_json(DOC).unwrap();
        assert_eq!(song.scale, Scale::Mixolydian);
        assert_eq!(song.time_signature.beats, 3);
        assert_eq!(song.lines.len(), 2);
        assert_eq!(song.lines[1].index, 1);

        let chord = &song.lines[0].bars[0].chords[0];
        assert_eq!(chord.name(), "G7");
        assert_eq!(chord.degree, Some(0));
        assert_eq!(song.lines[1].bars[0].chords[0].degree, None);

        let lane = &song.lines[0].melody_lines[0];
        assert_eq!(lane.instrument, InstrumentId::Drumset);
        assert!(!lane.collapsed);
        assert_eq!(
            lane.notes[0].voice,
            NoteVoice::Drum {
                drum_name: "Snare".to_string()
            }
        );
    }

    #[test]
    fn test_ids_continue_after_load() {
        let mut song = from_json(DOC).unwrap();
        let lane = song.add_lane(1, InstrumentId::Piano, "G", Scale::Major).unwrap();
        assert_eq!(lane, "m5");
        let note = song.insert_note(1, &lane, 0, 0, 1).unwrap();
        assert_eq!(note, "n10");
    }

    #[test]
    fn test_json_round_trip() {
        let song = from_json(DOC).unwrap();
        let again = from_json(&to_json(&song).unwrap()).unwrap();
        assert_eq!(song, again);
    }

    #[test]
    fn test_yaml_round_trip() {
        let song = from_json(DOC).unwrap();
        let yaml = to_yaml(&song).unwrap();
        assert!(yaml.contains("timeSignature: 3/4"));
        assert_eq!(from_yaml(&yaml).unwrap(), song);
    }

    #[test]
    fn test_rejects_invalid_header() {
        let bad = DOC.replace("\"3/4\"", "\"three\"");
        assert!(matches!(from_json(&bad), Err(SongError::Json(_))));
        let bad = DOC.replace("\"G\",\n", "\"Q\",\n");
        assert!(matches!(from_json(&bad), Err(SongError::Document(_))));
        let bad = DOC.replace("\"bpm\": 90", "\"bpm\": 0");
        assert!(matches!(from_json(&bad), Err(SongError::Document(_))));
    }

    #[test]
    fn test_bar_count_is_enforced() {
        let doc = r#"{"key":"C","scale":"major","timeSignature":"4/4","barsPerLine":3,"bpm":120,
                      "lines":[{"bars":[{}]}]}"#;
        let song = from_json(doc).unwrap();
        assert_eq!(song.lines[0].bars.len(), 3);

        let doc = r#"{"key":"C","scale":"major","timeSignature":"4/4","barsPerLine":3,"bpm":120,"lines":[]}"#;
        assert_eq!(from_json(doc).unwrap().lines.len(), 1);
    }

    #[test]
    fn test_non_positive_chord_durations_are_dropped() {
        let doc = r#"{"key":"C","scale":"major","timeSignature":"4/4","barsPerLine":1,"bpm":120,
                      "lines":[{"bars":[{"chords":[
                          {"root":"C","quality":"","extension":"","degree":0,"duration":-2},
                          {"root":"F","quality":"","extension":"","degree":3,"duration":0},
                          {"root":"G","quality":"","extension":"","degree":4,"duration":2}
                      ]}]}]}"#;
        let song = from_json(doc).unwrap();
        let chords = &song.lines[0].bars[0].chords;
        assert_eq!(chords.len(), 1);
        assert_eq!(chords[0].name(), "G");

        let sequence = crate::sequencer::flatten_song(&song);
        let durations: Vec<f64> = sequence.chords.iter().map(|c| c.duration).collect();
        assert_eq!(durations, vec![2.0, 2.0]);
        assert_eq!(sequence.chord_beats(), 4.0);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("song.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("song.YAML")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("song.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("song")), Format::Json);
    }
}
