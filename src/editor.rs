//! # Editor
//!
//! Editing is expressed as [`Command`] values applied to a [`Song`] by an
//! [`Editor`]. Each successful command produces a [`Change`] that is handed to
//! every subscribed listener, so views re-render as a projection of the model.
//!
//! Transient selections (key, scale, chord extension, durations, the picked
//! chord) live in an [`EditorSession`]. The song document never depends on it.
//!
//! ## Example
//! ```rust
//! use songwriter::editor::{Command, Editor};
//! use songwriter::Song;
//!
//! let mut editor = Editor::new(Song::default());
//! editor.session.select_degree(4); // G in C major
//! editor.insert_selected_chord(0, 0).unwrap();
//!
//! assert_eq!(editor.song.lines[0].bars[0].chords[0].name(), "G");
//! editor.apply(Command::AddLine).unwrap();
//! assert_eq!(editor.song.lines.len(), 2);
//! ```

use crate::chord::{ChordExtension, ChordQuality};
use crate::error::SongError;
use crate::instruments::InstrumentId;
use crate::model::{ChordSegment, ChordSpec, RepeatMark, Song, TimeSignature};
use crate::settings::validate_key;
use crate::theory::{chord_quality, scale_notes, Scale};

/// Transient editor selections.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSession {
    pub key: String,
    pub scale: Scale,
    pub extension: ChordExtension,
    /// Chord duration in beats.
    pub duration: f64,
    /// Note span in grid columns.
    pub note_span: usize,
    pub selected_chord: Option<ChordSpec>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self {
            key: "C".to_string(),
            scale: Scale::Major,
            extension: ChordExtension::None,
            duration: 1.0,
            note_span: 1,
            selected_chord: None,
        }
    }
}

impl EditorSession {
    /// Session seeded with a song's key and scale.
    pub fn for_song(song: &Song) -> Self {
        Self {
            key: song.key.clone(),
            scale: song.scale,
            ..Self::default()
        }
    }

    pub fn scale_notes(&self) -> Vec<&'static str> {
        scale_notes(&self.key, self.scale)
    }

    /// Select the diatonic chord on a scale degree, with its quality from the
    /// scale's chord table. Returns `None` for a degree the scale lacks.
    pub fn select_degree(&mut self, degree: usize) -> Option<&ChordSpec> {
        let root = *self.scale_notes().get(degree)?;
        self.selected_chord = Some(ChordSpec {
            root: root.to_string(),
            quality: chord_quality(self.scale, Some(degree)),
            extension: self.extension,
            degree: Some(degree),
        });
        self.selected_chord.as_ref()
    }

    /// Select a chord picked directly (outer ring major, inner ring minor).
    /// `degree` is `None` for a root outside the scale.
    pub fn select_chord(&mut self, root: &str, degree: Option<usize>, minor: bool) {
        self.selected_chord = Some(ChordSpec {
            root: root.to_string(),
            quality: if minor { ChordQuality::Minor } else { ChordQuality::Major },
            extension: self.extension,
            degree,
        });
    }

    pub fn set_extension(&mut self, extension: ChordExtension) {
        self.extension = extension;
        if let Some(chord) = &mut self.selected_chord {
            chord.extension = extension;
        }
    }

    /// Name of the selected chord, e.g. `Dm7`.
    pub fn selected_chord_name(&self) -> Option<String> {
        self.selected_chord.as_ref().map(|c| c.symbol().to_string())
    }
}

/// The most recent chord before `(line, bar)`, searching backwards across lines.
pub fn previous_chord(song: &Song, line: usize, bar: usize) -> Option<&ChordSegment> {
    let line = line.min(song.lines.len().checked_sub(1)?);
    song.lines[..=line]
        .iter()
        .enumerate()
        .rev()
        .flat_map(|(i, l)| {
            let end = if i == line { bar.min(l.bars.len()) } else { l.bars.len() };
            l.bars[..end].iter().rev()
        })
        .find_map(|b| b.chords.last())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddLine,
    DeleteLine { line: usize },
    InsertChord { line: usize, bar: usize, chord: ChordSpec, duration: f64 },
    RemoveChord { line: usize, bar: usize, index: usize },
    SetLyrics { line: usize, bar: usize, text: String },
    ToggleRepeat { line: usize, bar: usize, mark: RepeatMark },
    AddLane { line: usize, instrument: InstrumentId },
    RemoveLane { line: usize, lane: String },
    SetLaneVolume { line: usize, lane: String, volume: f64 },
    ToggleLaneCollapsed { line: usize, lane: String },
    InsertNote { line: usize, lane: String, row: usize, col: usize, span: usize },
    InsertStackedNotes { line: usize, lane: String, rows: Vec<usize>, col: usize, span: usize },
    ResizeNote { line: usize, lane: String, note: String, span: usize },
    DeleteNote { line: usize, lane: String, note: String },
    SetKey(String),
    SetScale(Scale),
    SetTimeSignature(TimeSignature),
    SetBarsPerLine(usize),
    SetBpm(u16),
}

/// What a command touched.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Lines were added, removed or re-shaped; line indices may have moved.
    Structure,
    /// Chords, lyrics or repeat flags of these `(line, bar)` positions.
    Bars { positions: Vec<(usize, usize)> },
    /// A lane was added to or removed from a line.
    Lanes { line: usize, lane: String },
    /// Notes or settings of one lane. `notes` lists created note ids.
    Lane { line: usize, lane: String, notes: Vec<String> },
    /// Key, scale or tempo.
    Header,
}

type Listener = Box<dyn FnMut(&Change, &Song)>;

pub struct Editor {
    pub song: Song,
    pub session: EditorSession,
    listeners: Vec<Listener>,
}

impl Editor {
    pub fn new(song: Song) -> Self {
        let session = EditorSession::for_song(&song);
        Self {
            song,
            session,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Change, &Song) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Insert the session's selected chord with the session's duration.
    /// Does nothing when no chord is selected.
    pub fn insert_selected_chord(&mut self, line: usize, bar: usize) -> Result<Option<Change>, SongError> {
        let Some(chord) = self.session.selected_chord.clone() else {
            return Ok(None);
        };
        let duration = self.session.duration;
        self.apply(Command::InsertChord { line, bar, chord, duration }).map(Some)
    }

    /// Apply one command and notify listeners. Failed commands leave the song
    /// untouched and notify nobody.
    pub fn apply(&mut self, command: Command) -> Result<Change, SongError> {
        let change = self.execute(command)?;
        log::debug!("applied edit: {:?}", change);
        for listener in &mut self.listeners {
            listener(&change, &self.song);
        }
        Ok(change)
    }

    fn execute(&mut self, command: Command) -> Result<Change, SongError> {
        let song = &mut self.song;
        let change = match command {
            Command::AddLine => {
                song.add_line();
                Change::Structure
            }
            Command::DeleteLine { line } => {
                song.delete_line(line)?;
                Change::Structure
            }
            Command::InsertChord { line, bar, chord, duration } => {
                let lines_before = song.lines.len();
                let positions = song.insert_chord(line, bar, &chord, duration)?;
                if song.lines.len() != lines_before {
                    Change::Structure
                } else {
                    Change::Bars { positions }
                }
            }
            Command::RemoveChord { line, bar, index } => {
                song.remove_chord(line, bar, index)?;
                Change::Bars { positions: vec![(line, bar)] }
            }
            Command::SetLyrics { line, bar, text } => {
                song.set_lyrics(line, bar, &text)?;
                Change::Bars { positions: vec![(line, bar)] }
            }
            Command::ToggleRepeat { line, bar, mark } => {
                song.toggle_repeat(line, bar, mark)?;
                Change::Bars { positions: vec![(line, bar)] }
            }
            Command::AddLane { line, instrument } => {
                let lane = song.add_lane(line, instrument, &self.session.key, self.session.scale)?;
                Change::Lanes { line, lane }
            }
            Command::RemoveLane { line, lane } => {
                song.remove_lane(line, &lane)?;
                Change::Lanes { line, lane }
            }
            Command::SetLaneVolume { line, lane, volume } => {
                song.set_lane_volume(line, &lane, volume)?;
                Change::Lane { line, lane, notes: vec![] }
            }
            Command::ToggleLaneCollapsed { line, lane } => {
                song.toggle_lane_collapsed(line, &lane)?;
                Change::Lane { line, lane, notes: vec![] }
            }
            Command::InsertNote { line, lane, row, col, span } => {
                let id = song.insert_note(line, &lane, row, col, span)?;
                Change::Lane { line, lane, notes: vec![id] }
            }
            Command::InsertStackedNotes { line, lane, rows, col, span } => {
                let notes = song.insert_stacked_notes(line, &lane, &rows, col, span)?;
                Change::Lane { line, lane, notes }
            }
            Command::ResizeNote { line, lane, note, span } => {
                song.resize_note(line, &lane, &note, span)?;
                Change::Lane { line, lane, notes: vec![] }
            }
            Command::DeleteNote { line, lane, note } => {
                song.delete_note(line, &lane, &note)?;
                Change::Lane { line, lane, notes: vec![] }
            }
            Command::SetKey(key) => {
                let key = validate_key(&key)?;
                song.key = key.clone();
                self.session.key = key;
                self.session.selected_chord = None;
                Change::Header
            }
            Command::SetScale(scale) => {
                song.scale = scale;
                self.session.scale = scale;
                self.session.selected_chord = None;
                Change::Header
            }
            Command::SetTimeSignature(time_signature) => {
                song.set_time_signature(time_signature);
                Change::Structure
            }
            Command::SetBarsPerLine(bars) => {
                song.set_bars_per_line(bars)?;
                Change::Structure
            }
            Command::SetBpm(bpm) => {
                song.set_bpm(bpm)?;
                Change::Header
            }
        };
        Ok(change)
    }
}
