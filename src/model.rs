//! # Composition Model
//!
//! The song document: lines of bars holding chord segments, lyrics and repeat
//! marks, plus melody lanes holding grid notes. All structural invariants are
//! enforced here by the editing operations; the sequencer trusts the result.
//!
//! ## Invariants
//! - every line holds exactly `bars_per_line` bars
//! - the chord durations of a bar never exceed its capacity (the time-signature
//!   numerator); longer chords are split across following bars on insert
//! - within one lane, notes on the same row never overlap on `[col, col + span)`
//! - a song always keeps at least one line
//! - `Line::index` equals the line's position in `Song::lines`
//!
//! ## Grid
//! Each line is a grid of `bars_per_line × beats × SUBDIVISIONS_PER_BEAT` columns.
//! A note's `col` is absolute within its line.
//!
//! ## Related Modules
//! - `editor` - command objects that call these operations
//! - `sequencer` - flattens the document into events
//! - `document` - JSON / YAML persistence

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chord::{ChordExtension, ChordQuality, ChordSymbol};
use crate::error::SongError;
use crate::instruments::{pitch_scale, InstrumentId};
use crate::settings::{validate_bars_per_line, validate_bpm, Settings, MAX_BARS_PER_LINE};
use crate::theory::{parse_pitch_name, scale_notes, Scale};

/// Fixed grid resolution: sixteenth notes in a quarter-note beat.
pub const SUBDIVISIONS_PER_BEAT: usize = 4;

pub const DEGREE_COLORS: [&str; 7] = [
    "#667eea", "#764ba2", "#f093fb", "#4facfe", "#00f2fe", "#43e97b", "#fa709a",
];

pub const CHROMATIC_COLOR: &str = "#999999";

pub const DEFAULT_LANE_VOLUME: f64 = 0.7;

/// Display colour for a chord of the given scale degree.
pub fn degree_color(degree: Option<usize>) -> &'static str {
    match degree {
        Some(d) => DEGREE_COLORS[d % DEGREE_COLORS.len()],
        None => CHROMATIC_COLOR,
    }
}

/// Time signature, serialized as `"N/D"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { beats: 4, beat_type: 4 }
    }
}

impl TimeSignature {
    /// Bar capacity in beats.
    pub fn beats_per_bar(&self) -> usize {
        self.beats as usize
    }
}

impl FromStr for TimeSignature {
    type Err = SongError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 2 {
            return Err(SongError::Document(format!("Invalid time signature: {}", s)));
        }

        let beats: u8 = parts[0]
            .trim()
            .parse()
            .map_err(|_| SongError::Document(format!("Invalid time signature beats: {}", s)))?;
        let beat_type: u8 = parts[1]
            .trim()
            .parse()
            .map_err(|_| SongError::Document(format!("Invalid time signature beat type: {}", s)))?;

        if beats == 0 || beat_type == 0 {
            return Err(SongError::Document(format!("Invalid time signature: {}", s)));
        }

        Ok(TimeSignature { beats, beat_type })
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = SongError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(ts: TimeSignature) -> Self {
        ts.to_string()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

/// Scale degree stored as `-1` when chromatic.
mod degree_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(degree: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
        match degree {
            Some(d) => s.serialize_i64(*d as i64),
            None => s.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
        let value = Option::<i64>::deserialize(d)?;
        Ok(value.and_then(|v| usize::try_from(v).ok()))
    }
}

/// A chord picked in the editor, before it is placed into bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSpec {
    pub root: String,
    pub quality: ChordQuality,
    pub extension: ChordExtension,
    pub degree: Option<usize>,
}

impl ChordSpec {
    pub fn symbol(&self) -> ChordSymbol {
        ChordSymbol::new(self.root.clone(), self.quality, self.extension)
    }
}

/// A chord occupying part of one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordSegment {
    pub root: String,
    #[serde(default)]
    pub quality: ChordQuality,
    #[serde(default)]
    pub extension: ChordExtension,
    #[serde(default, with = "degree_serde")]
    pub degree: Option<usize>,
    pub duration: f64,
    #[serde(default)]
    pub color: String,
}

impl ChordSegment {
    pub fn new(spec: &ChordSpec, duration: f64) -> Self {
        Self {
            root: spec.root.clone(),
            quality: spec.quality,
            extension: spec.extension,
            degree: spec.degree,
            duration,
            color: degree_color(spec.degree).to_string(),
        }
    }

    pub fn symbol(&self) -> ChordSymbol {
        ChordSymbol::new(self.root.clone(), self.quality, self.extension)
    }

    /// Symbol text such as `Am7`.
    pub fn name(&self) -> String {
        self.symbol().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    #[serde(default)]
    pub chords: Vec<ChordSegment>,
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub repeat_start: bool,
    #[serde(default)]
    pub repeat_end: bool,
}

impl Bar {
    pub fn used_beats(&self) -> f64 {
        self.chords.iter().map(|c| c.duration).sum()
    }

    pub fn free_beats(&self, capacity: usize) -> f64 {
        (capacity as f64 - self.used_beats()).max(0.0)
    }

    /// Drop segments without a positive length, then shorten or drop trailing
    /// segments so the bar fits `capacity`.
    fn fit(&mut self, capacity: usize) {
        let mut used = 0.0;
        self.chords.retain_mut(|chord| {
            if !(chord.duration.is_finite() && chord.duration > 0.0) {
                log::warn!("Dropping chord {} with duration {}", chord.name(), chord.duration);
                return false;
            }
            let space = capacity as f64 - used;
            if space <= 0.0 {
                return false;
            }
            chord.duration = chord.duration.min(space);
            used += chord.duration;
            true
        });
    }
}

/// Which repeat flag of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMark {
    Start,
    End,
}

/// Pitch identity of a grid note: a MIDI number for melodic lanes, a drum voice
/// name for the drum set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteVoice {
    Midi {
        #[serde(rename = "midiNote")]
        midi_note: u8,
    },
    Drum {
        #[serde(rename = "drumName")]
        drum_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridNote {
    #[serde(default)]
    pub id: String,
    pub row: usize,
    pub col: usize,
    pub span: usize,
    pub pitch: String,
    #[serde(flatten)]
    pub voice: NoteVoice,
    #[serde(default)]
    pub simultaneous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord_index: Option<usize>,
}

impl GridNote {
    pub fn end(&self) -> usize {
        self.col + self.span
    }

    fn overlaps(&self, row: usize, col: usize, span: usize) -> bool {
        self.row == row && col < self.end() && col + span > self.col
    }
}

/// One instrument's note grid within a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyLane {
    #[serde(default)]
    pub id: String,
    pub instrument: InstrumentId,
    pub pitch_scale: Vec<String>,
    #[serde(default)]
    pub notes: Vec<GridNote>,
    #[serde(default = "default_lane_volume")]
    pub volume: f64,
    #[serde(default)]
    pub collapsed: bool,
}

fn default_lane_volume() -> f64 {
    DEFAULT_LANE_VOLUME
}

impl MelodyLane {
    pub fn note(&self, id: &str) -> Option<&GridNote> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Drop every note on `row` overlapping `[col, col + span)`, except `keep`.
    fn evict(&mut self, row: usize, col: usize, span: usize, keep: Option<&str>) {
        self.notes
            .retain(|n| Some(n.id.as_str()) == keep || !n.overlaps(row, col, span));
    }

    fn voice_for_row(&self, row: usize, col: usize) -> Result<(String, NoteVoice), SongError> {
        let label = self
            .pitch_scale
            .get(row)
            .ok_or(SongError::InvalidCell { row, col })?;

        let voice = if self.instrument.is_drums() {
            NoteVoice::Drum {
                drum_name: label.clone(),
            }
        } else {
            let (_, _, midi_note) =
                parse_pitch_name(label).ok_or(SongError::InvalidCell { row, col })?;
            NoteVoice::Midi { midi_note }
        };
        Ok((label.clone(), voice))
    }

    fn next_chord_index(&self) -> usize {
        self.notes
            .iter()
            .filter_map(|n| n.chord_index)
            .max()
            .map_or(0, |i| i + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    /// Position in the song. Only valid for the current in-memory document.
    #[serde(skip)]
    pub index: usize,
    pub bars: Vec<Bar>,
    #[serde(default)]
    pub melody_lines: Vec<MelodyLane>,
}

impl Line {
    pub fn new(index: usize, bars_per_line: usize) -> Self {
        Self {
            index,
            bars: vec![Bar::default(); bars_per_line],
            melody_lines: Vec::new(),
        }
    }

    pub fn lane(&self, id: &str) -> Option<&MelodyLane> {
        self.melody_lines.iter().find(|l| l.id == id)
    }
}

/// The whole song document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub key: String,
    pub scale: Scale,
    pub time_signature: TimeSignature,
    pub bars_per_line: usize,
    pub bpm: u16,
    pub lines: Vec<Line>,
    #[serde(skip)]
    next_lane: usize,
    #[serde(skip)]
    next_note: usize,
}

impl Default for Song {
    fn default() -> Self {
        Song::new(&Settings::default())
    }
}

impl Song {
    /// A song with one empty line.
    pub fn new(settings: &Settings) -> Self {
        Self {
            key: settings.key.clone(),
            scale: settings.scale,
            time_signature: settings.time_signature,
            bars_per_line: settings.bars_per_line,
            bpm: settings.bpm,
            lines: vec![Line::new(0, settings.bars_per_line)],
            next_lane: 0,
            next_note: 0,
        }
    }

    pub fn beats_per_bar(&self) -> usize {
        self.time_signature.beats_per_bar()
    }

    pub fn columns_per_bar(&self) -> usize {
        self.beats_per_bar() * SUBDIVISIONS_PER_BEAT
    }

    pub fn columns_per_line(&self) -> usize {
        self.bars_per_line * self.columns_per_bar()
    }

    pub fn line(&self, line: usize) -> Result<&Line, SongError> {
        self.lines.get(line).ok_or(SongError::LineNotFound { line })
    }

    fn line_mut(&mut self, line: usize) -> Result<&mut Line, SongError> {
        self.lines.get_mut(line).ok_or(SongError::LineNotFound { line })
    }

    pub fn bar(&self, line: usize, bar: usize) -> Result<&Bar, SongError> {
        self.line(line)?
            .bars
            .get(bar)
            .ok_or(SongError::BarNotFound { line, bar })
    }

    fn bar_mut(&mut self, line: usize, bar: usize) -> Result<&mut Bar, SongError> {
        self.line_mut(line)?
            .bars
            .get_mut(bar)
            .ok_or(SongError::BarNotFound { line, bar })
    }

    pub fn lane(&self, line: usize, lane: &str) -> Result<&MelodyLane, SongError> {
        self.line(line)?
            .lane(lane)
            .ok_or_else(|| SongError::LaneNotFound {
                line,
                lane: lane.to_string(),
            })
    }

    fn lane_mut(&mut self, line: usize, lane: &str) -> Result<&mut MelodyLane, SongError> {
        self.line_mut(line)?
            .melody_lines
            .iter_mut()
            .find(|l| l.id == lane)
            .ok_or_else(|| SongError::LaneNotFound {
                line,
                lane: lane.to_string(),
            })
    }

    /// Recompute line indices and the lane / note id counters. Called after
    /// loading and after structural changes.
    pub fn reindex(&mut self) {
        let mut max_lane = None;
        let mut max_note = None;
        for (i, line) in self.lines.iter_mut().enumerate() {
            line.index = i;
            for lane in &line.melody_lines {
                max_lane = max_lane.max(numeric_suffix(&lane.id, 'm'));
                for note in &lane.notes {
                    max_note = max_note.max(numeric_suffix(&note.id, 'n'));
                }
            }
        }
        self.next_lane = self.next_lane.max(max_lane.map_or(0, |n| n + 1));
        self.next_note = self.next_note.max(max_note.map_or(0, |n| n + 1));

        // documents written by hand may omit ids
        for line in &mut self.lines {
            for lane in &mut line.melody_lines {
                if lane.id.is_empty() {
                    lane.id = format!("m{}", self.next_lane);
                    self.next_lane += 1;
                }
                for note in &mut lane.notes {
                    if note.id.is_empty() {
                        note.id = format!("n{}", self.next_note);
                        self.next_note += 1;
                    }
                }
            }
        }
    }

    fn next_note_id(&mut self) -> String {
        let id = format!("n{}", self.next_note);
        self.next_note += 1;
        id
    }

    /// Append an empty line and return its index.
    pub fn add_line(&mut self) -> usize {
        let index = self.lines.len();
        self.lines.push(Line::new(index, self.bars_per_line));
        index
    }

    /// Remove a line; later lines move up by one. The last line cannot be removed.
    pub fn delete_line(&mut self, line: usize) -> Result<(), SongError> {
        self.line(line)?;
        if self.lines.len() <= 1 {
            return Err(SongError::LastLine);
        }
        self.lines.remove(line);
        self.reindex();
        Ok(())
    }

    /// Change the number of bars per line, padding or truncating every line.
    /// Notes beyond the new grid are dropped, spans crossing its end are shortened.
    pub fn set_bars_per_line(&mut self, bars: usize) -> Result<(), SongError> {
        validate_bars_per_line(bars)?;
        self.bars_per_line = bars;
        for line in &mut self.lines {
            line.bars.resize_with(bars, Bar::default);
        }
        self.fit_notes_to_grid();
        Ok(())
    }

    /// Change the time signature. Bars are refitted to the new capacity and
    /// notes to the new grid width.
    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        let capacity = self.beats_per_bar();
        for line in &mut self.lines {
            for bar in &mut line.bars {
                bar.fit(capacity);
            }
        }
        self.fit_notes_to_grid();
    }

    pub fn set_bpm(&mut self, bpm: u16) -> Result<(), SongError> {
        validate_bpm(bpm)?;
        self.bpm = bpm;
        Ok(())
    }

    fn fit_notes_to_grid(&mut self) {
        let columns = self.columns_per_line();
        for line in &mut self.lines {
            for lane in &mut line.melody_lines {
                lane.notes.retain_mut(|n| {
                    n.span = n.span.min(columns.saturating_sub(n.col));
                    n.span > 0
                });
            }
        }
    }

    /// Place a chord at the end of a bar's chord list.
    ///
    /// `duration` is limited to the beats of [`MAX_BARS_PER_LINE`] bars.
    /// When `duration` exceeds the bar's free beats the chord fills the bar and
    /// continues into the following bars, wrapping onto the next line and
    /// appending new lines when the song runs out. Returns the `(line, bar)`
    /// positions that received a segment.
    pub fn insert_chord(
        &mut self,
        line: usize,
        bar: usize,
        spec: &ChordSpec,
        duration: f64,
    ) -> Result<Vec<(usize, usize)>, SongError> {
        let max_duration = (MAX_BARS_PER_LINE * self.beats_per_bar()) as f64;
        if !(duration.is_finite() && duration > 0.0 && duration <= max_duration) {
            return Err(SongError::InvalidDuration { duration });
        }
        self.bar(line, bar)?;

        let capacity = self.beats_per_bar();
        let mut touched = Vec::new();
        let mut remaining = duration;
        let (mut line_idx, mut bar_idx) = (line, bar);

        while remaining > 0.0 {
            let target = self.bar_mut(line_idx, bar_idx)?;
            let here = remaining.min(target.free_beats(capacity));
            if here > 0.0 {
                target.chords.push(ChordSegment::new(spec, here));
                remaining -= here;
                touched.push((line_idx, bar_idx));
            }

            bar_idx += 1;
            if bar_idx >= self.bars_per_line {
                bar_idx = 0;
                line_idx += 1;
                if remaining > 0.0 && line_idx >= self.lines.len() {
                    self.add_line();
                }
            }
        }

        Ok(touched)
    }

    pub fn remove_chord(
        &mut self,
        line: usize,
        bar: usize,
        index: usize,
    ) -> Result<ChordSegment, SongError> {
        let target = self.bar_mut(line, bar)?;
        if index >= target.chords.len() {
            return Err(SongError::ChordNotFound { line, bar, index });
        }
        Ok(target.chords.remove(index))
    }

    pub fn set_lyrics(&mut self, line: usize, bar: usize, text: &str) -> Result<(), SongError> {
        self.bar_mut(line, bar)?.lyrics = text.to_string();
        Ok(())
    }

    pub fn set_repeat(
        &mut self,
        line: usize,
        bar: usize,
        mark: RepeatMark,
        on: bool,
    ) -> Result<(), SongError> {
        let target = self.bar_mut(line, bar)?;
        match mark {
            RepeatMark::Start => target.repeat_start = on,
            RepeatMark::End => target.repeat_end = on,
        }
        Ok(())
    }

    /// Flip a repeat flag and return its new value.
    pub fn toggle_repeat(&mut self, line: usize, bar: usize, mark: RepeatMark) -> Result<bool, SongError> {
        let target = self.bar_mut(line, bar)?;
        let flag = match mark {
            RepeatMark::Start => &mut target.repeat_start,
            RepeatMark::End => &mut target.repeat_end,
        };
        *flag = !*flag;
        Ok(*flag)
    }

    /// Add a melody lane for `instrument`. Row labels are taken from the
    /// instrument's playable notes in `key`/`scale` (drum voices for the drum set).
    pub fn add_lane(
        &mut self,
        line: usize,
        instrument: InstrumentId,
        key: &str,
        scale: Scale,
    ) -> Result<String, SongError> {
        self.line(line)?;
        let id = format!("m{}", self.next_lane);
        self.next_lane += 1;

        let lane = MelodyLane {
            id: id.clone(),
            instrument,
            pitch_scale: pitch_scale(instrument, &scale_notes(key, scale), key),
            notes: Vec::new(),
            volume: DEFAULT_LANE_VOLUME,
            collapsed: false,
        };
        self.line_mut(line)?.melody_lines.push(lane);
        Ok(id)
    }

    pub fn remove_lane(&mut self, line: usize, lane: &str) -> Result<MelodyLane, SongError> {
        let lanes = &mut self.line_mut(line)?.melody_lines;
        let pos = lanes
            .iter()
            .position(|l| l.id == lane)
            .ok_or_else(|| SongError::LaneNotFound {
                line,
                lane: lane.to_string(),
            })?;
        Ok(lanes.remove(pos))
    }

    pub fn set_lane_volume(&mut self, line: usize, lane: &str, volume: f64) -> Result<(), SongError> {
        self.lane_mut(line, lane)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn toggle_lane_collapsed(&mut self, line: usize, lane: &str) -> Result<bool, SongError> {
        let target = self.lane_mut(line, lane)?;
        target.collapsed = !target.collapsed;
        Ok(target.collapsed)
    }

    fn checked_span(&self, row: usize, col: usize, span: usize) -> Result<usize, SongError> {
        if span == 0 {
            return Err(SongError::InvalidDuration { duration: 0.0 });
        }
        let columns = self.columns_per_line();
        if col >= columns {
            return Err(SongError::InvalidCell { row, col });
        }
        Ok(span.min(columns - col))
    }

    /// Put a note on `row` at `col`, evicting the notes it would overlap on that
    /// row. The span is clamped to the end of the line. Returns the new note id.
    pub fn insert_note(
        &mut self,
        line: usize,
        lane: &str,
        row: usize,
        col: usize,
        span: usize,
    ) -> Result<String, SongError> {
        let span = self.checked_span(row, col, span)?;
        let (pitch, voice) = self.lane(line, lane)?.voice_for_row(row, col)?;
        let id = self.next_note_id();

        let target = self.lane_mut(line, lane)?;
        target.evict(row, col, span, None);
        target.notes.push(GridNote {
            id: id.clone(),
            row,
            col,
            span,
            pitch,
            voice,
            simultaneous: false,
            chord_index: None,
        });
        Ok(id)
    }

    /// Insert several rows at one column as a group. With more than one row the
    /// notes are marked simultaneous and share a chord index.
    pub fn insert_stacked_notes(
        &mut self,
        line: usize,
        lane: &str,
        rows: &[usize],
        col: usize,
        span: usize,
    ) -> Result<Vec<String>, SongError> {
        let mut rows = rows.to_vec();
        rows.sort_unstable();
        rows.dedup();
        let Some(&first) = rows.first() else {
            return Ok(Vec::new());
        };

        let span = self.checked_span(first, col, span)?;
        let lane_ref = self.lane(line, lane)?;
        let voices = rows
            .iter()
            .map(|&row| lane_ref.voice_for_row(row, col).map(|v| (row, v)))
            .collect::<Result<Vec<_>, _>>()?;

        let grouped = voices.len() > 1;
        let chord_index = grouped.then(|| lane_ref.next_chord_index());

        let mut ids = Vec::with_capacity(voices.len());
        for (row, (pitch, voice)) in voices {
            let id = self.next_note_id();
            let target = self.lane_mut(line, lane)?;
            target.evict(row, col, span, None);
            target.notes.push(GridNote {
                id: id.clone(),
                row,
                col,
                span,
                pitch,
                voice,
                simultaneous: grouped,
                chord_index,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    /// Change a note's span, evicting whatever it would now overlap on its row.
    pub fn resize_note(
        &mut self,
        line: usize,
        lane: &str,
        note: &str,
        span: usize,
    ) -> Result<(), SongError> {
        let found = self
            .lane(line, lane)?
            .note(note)
            .ok_or_else(|| SongError::NoteNotFound {
                line,
                lane: lane.to_string(),
                note: note.to_string(),
            })?;
        let (row, col) = (found.row, found.col);
        let span = self.checked_span(row, col, span)?;

        let target = self.lane_mut(line, lane)?;
        target.evict(row, col, span, Some(note));
        if let Some(n) = target.notes.iter_mut().find(|n| n.id == note) {
            n.span = span;
        }
        Ok(())
    }

    pub fn delete_note(&mut self, line: usize, lane: &str, note: &str) -> Result<GridNote, SongError> {
        let target = self.lane_mut(line, lane)?;
        let pos = target
            .notes
            .iter()
            .position(|n| n.id == note)
            .ok_or_else(|| SongError::NoteNotFound {
                line,
                lane: lane.to_string(),
                note: note.to_string(),
            })?;
        Ok(target.notes.remove(pos))
    }
}

fn numeric_suffix(id: &str, prefix: char) -> Option<usize> {
    id.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_major() -> ChordSpec {
        ChordSpec {
            root: "C".to_string(),
            quality: ChordQuality::Major,
            extension: ChordExtension::None,
            degree: Some(0),
        }
    }

    #[test]
    fn test_time_signature_parse() {
        let ts: TimeSignature = "6/8".parse().unwrap();
        assert_eq!(ts, TimeSignature { beats: 6, beat_type: 8 });
        assert_eq!(ts.to_string(), "6/8");
        assert!("4".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("x/4".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn test_insert_chord_fits() {
        let mut song = Song::default();
        let touched = song.insert_chord(0, 1, &c_major(), 2.0).unwrap();
        assert_eq!(touched, vec![(0, 1)]);
        let bar = song.bar(0, 1).unwrap();
        assert_eq!(bar.chords.len(), 1);
        assert_eq!(bar.chords[0].color, "#667eea");
        assert_eq!(bar.used_beats(), 2.0);
    }

    #[test]
    fn test_insert_chord_splits_across_bars() {
        let mut song = Song::default();
        song.insert_chord(0, 0, &c_major(), 3.0).unwrap();
        let touched = song.insert_chord(0, 0, &c_major(), 4.0).unwrap();
        assert_eq!(touched, vec![(0, 0), (0, 1)]);
        assert_eq!(song.bar(0, 0).unwrap().used_beats(), 4.0);
        assert_eq!(song.bar(0, 1).unwrap().chords[0].duration, 3.0);
    }

    #[test]
    fn test_insert_chord_appends_line() {
        let mut song = Song::default();
        let touched = song.insert_chord(0, 3, &c_major(), 8.0).unwrap();
        assert_eq!(touched, vec![(0, 3), (1, 0)]);
        assert_eq!(song.lines.len(), 2);
        assert_eq!(song.lines[1].index, 1);
        for line in &song.lines {
            for bar in &line.bars {
                assert!(bar.used_beats() <= 4.0);
            }
        }
    }

    #[test]
    fn test_insert_chord_rejects_bad_duration() {
        let mut song = Song::default();
        assert!(matches!(
            song.insert_chord(0, 0, &c_major(), 0.0),
            Err(SongError::InvalidDuration { .. })
        ));
        assert!(matches!(
            song.insert_chord(0, 9, &c_major(), 1.0),
            Err(SongError::BarNotFound { line: 0, bar: 9 })
        ));
    }

    #[test]
    fn test_insert_chord_duration_is_capped() {
        let mut song = Song::default();
        assert!(matches!(
            song.insert_chord(0, 0, &c_major(), 1e9),
            Err(SongError::InvalidDuration { .. })
        ));
        assert!(matches!(
            song.insert_chord(0, 0, &c_major(), f64::INFINITY),
            Err(SongError::InvalidDuration { .. })
        ));
        assert_eq!(song.lines.len(), 1);

        // sixteen 4/4 bars is the longest chord accepted
        let touched = song.insert_chord(0, 0, &c_major(), 64.0).unwrap();
        assert_eq!(touched.len(), 16);
        assert_eq!(song.lines.len(), 4);
    }

    #[test]
    fn test_chromatic_chord_color() {
        let mut spec = c_major();
        spec.degree = None;
        assert_eq!(ChordSegment::new(&spec, 1.0).color, CHROMATIC_COLOR);
        spec.degree = Some(8);
        assert_eq!(ChordSegment::new(&spec, 1.0).color, DEGREE_COLORS[1]);
    }

    #[test]
    fn test_remove_chord() {
        let mut song = Song::default();
        song.insert_chord(0, 0, &c_major(), 1.0).unwrap();
        let removed = song.remove_chord(0, 0, 0).unwrap();
        assert_eq!(removed.name(), "C");
        assert!(matches!(
            song.remove_chord(0, 0, 0),
            Err(SongError::ChordNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_line_renumbers() {
        let mut song = Song::default();
        song.add_line();
        song.add_line();
        song.set_lyrics(2, 0, "last").unwrap();
        song.delete_line(0).unwrap();
        assert_eq!(song.lines.len(), 2);
        assert_eq!(song.lines[0].index, 0);
        assert_eq!(song.lines[1].index, 1);
        assert_eq!(song.bar(1, 0).unwrap().lyrics, "last");

        song.delete_line(0).unwrap();
        assert!(matches!(song.delete_line(0), Err(SongError::LastLine)));
        assert!(matches!(song.delete_line(5), Err(SongError::LineNotFound { line: 5 })));
    }

    #[test]
    fn test_toggle_repeat() {
        let mut song = Song::default();
        assert!(song.toggle_repeat(0, 1, RepeatMark::Start).unwrap());
        assert!(!song.toggle_repeat(0, 1, RepeatMark::Start).unwrap());
        song.set_repeat(0, 2, RepeatMark::End, true).unwrap();
        assert!(song.bar(0, 2).unwrap().repeat_end);
    }

    #[test]
    fn test_lane_rows_and_ids() {
        let mut song = Song::default();
        let flute = song.add_lane(0, InstrumentId::Flute, "C", Scale::Major).unwrap();
        let drums = song.add_lane(0, InstrumentId::Drumset, "C", Scale::Major).unwrap();
        assert_eq!(flute, "m0");
        assert_eq!(drums, "m1");

        let lane = song.lane(0, &flute).unwrap();
        assert_eq!(lane.pitch_scale.first().map(String::as_str), Some("C7"));
        assert_eq!(lane.volume, DEFAULT_LANE_VOLUME);
        assert_eq!(song.lane(0, &drums).unwrap().pitch_scale[0], "Kick");
    }

    #[test]
    fn test_insert_note_evicts_overlap() {
        let mut song = Song::default();
        let lane = song.add_lane(0, InstrumentId::Flute, "C", Scale::Major).unwrap();
        song.insert_note(0, &lane, 2, 0, 4).unwrap();
        song.insert_note(0, &lane, 3, 0, 4).unwrap();
        song.insert_note(0, &lane, 2, 2, 4).unwrap();

        let notes = &song.lane(0, &lane).unwrap().notes;
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().any(|n| n.row == 3 && n.col == 0));
        assert!(notes.iter().any(|n| n.row == 2 && n.col == 2));
    }

    #[test]
    fn test_insert_note_resolves_voice() {
        let mut song = Song::default();
        let flute = song.add_lane(0, InstrumentId::Flute, "C", Scale::Major).unwrap();
        let drums = song.add_lane(0, InstrumentId::Drumset, "C", Scale::Major).unwrap();
        let id = song.insert_note(0, &flute, 0, 0, 1).unwrap();
        let note = song.lane(0, &flute).unwrap().note(&id).unwrap().clone();
        assert_eq!(note.pitch, "C7");
        assert_eq!(note.voice, NoteVoice::Midi { midi_note: 96 });

        let id = song.insert_note(0, &drums, 3, 4, 1).unwrap();
        let note = song.lane(0, &drums).unwrap().note(&id).unwrap();
        assert_eq!(
            note.voice,
            NoteVoice::Drum {
                drum_name: "HiHat".to_string()
            }
        );
    }

    #[test]
    fn test_insert_note_clamps_span() {
        let mut song = Song::default();
        let lane = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
        let id = song.insert_note(0, &lane, 0, 62, 16).unwrap();
        assert_eq!(song.lane(0, &lane).unwrap().note(&id).unwrap().span, 2);
        assert!(matches!(
            song.insert_note(0, &lane, 0, 64, 1),
            Err(SongError::InvalidCell { row: 0, col: 64 })
        ));
        assert!(matches!(
            song.insert_note(0, &lane, 999, 0, 1),
            Err(SongError::InvalidCell { row: 999, .. })
        ));
    }

    #[test]
    fn test_insert_then_resize_is_idempotent() {
        let mut song = Song::default();
        let lane = song.add_lane(0, InstrumentId::Violin, "G", Scale::Major).unwrap();
        song.insert_note(0, &lane, 1, 8, 2).unwrap();
        let id = song.insert_note(0, &lane, 4, 4, 3).unwrap();
        let before = song.lane(0, &lane).unwrap().notes.clone();

        song.resize_note(0, &lane, &id, 3).unwrap();
        assert_eq!(song.lane(0, &lane).unwrap().notes, before);
    }

    #[test]
    fn test_resize_evicts_neighbours() {
        let mut song = Song::default();
        let lane = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
        let id = song.insert_note(0, &lane, 5, 0, 1).unwrap();
        song.insert_note(0, &lane, 5, 2, 1).unwrap();
        song.insert_note(0, &lane, 6, 2, 1).unwrap();

        song.resize_note(0, &lane, &id, 4).unwrap();
        let notes = &song.lane(0, &lane).unwrap().notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes.iter().find(|n| n.id == id).unwrap().span, 4);
        assert!(matches!(
            song.resize_note(0, &lane, "n999", 1),
            Err(SongError::NoteNotFound { .. })
        ));
    }

    #[test]
    fn test_stacked_notes_share_group() {
        let mut song = Song::default();
        let lane = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
        let first = song.insert_stacked_notes(0, &lane, &[2, 4, 6], 0, 4).unwrap();
        let second = song.insert_stacked_notes(0, &lane, &[1, 3], 4, 4).unwrap();
        let single = song.insert_stacked_notes(0, &lane, &[1], 8, 4).unwrap();

        let lane = song.lane(0, &lane).unwrap();
        for id in &first {
            let note = lane.note(id).unwrap();
            assert!(note.simultaneous);
            assert_eq!(note.chord_index, Some(0));
        }
        for id in &second {
            assert_eq!(lane.note(id).unwrap().chord_index, Some(1));
        }
        let note = lane.note(&single[0]).unwrap();
        assert!(!note.simultaneous);
        assert_eq!(note.chord_index, None);
    }

    #[test]
    fn test_set_bars_per_line_trims_grid() {
        let mut song = Song::default();
        let lane = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
        song.insert_note(0, &lane, 0, 30, 4).unwrap();
        song.insert_note(0, &lane, 1, 40, 4).unwrap();

        song.set_bars_per_line(2).unwrap();
        assert_eq!(song.lines[0].bars.len(), 2);
        let notes = &song.lane(0, &lane).unwrap().notes;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].span, 2);
        assert!(song.set_bars_per_line(0).is_err());
    }

    #[test]
    fn test_set_time_signature_refits_bars() {
        let mut song = Song::default();
        song.insert_chord(0, 0, &c_major(), 2.0).unwrap();
        song.insert_chord(0, 0, &c_major(), 2.0).unwrap();
        song.set_time_signature(TimeSignature { beats: 3, beat_type: 4 });
        let bar = song.bar(0, 0).unwrap();
        assert_eq!(bar.chords.len(), 2);
        assert_eq!(bar.used_beats(), 3.0);
    }

    #[test]
    fn test_lane_volume_and_collapse() {
        let mut song = Song::default();
        let lane = song.add_lane(0, InstrumentId::Flute, "C", Scale::Major).unwrap();
        song.set_lane_volume(0, &lane, 1.5).unwrap();
        assert_eq!(song.lane(0, &lane).unwrap().volume, 1.0);
        assert!(song.toggle_lane_collapsed(0, &lane).unwrap());
        song.remove_lane(0, &lane).unwrap();
        assert!(matches!(
            song.remove_lane(0, &lane),
            Err(SongError::LaneNotFound { .. })
        ));
    }

    #[test]
    fn test_document_shape() {
        let mut song = Song::default();
        let mut spec = c_major();
        spec.degree = None;
        song.insert_chord(0, 0, &spec, 4.0).unwrap();
        let lane = song.add_lane(0, InstrumentId::Drumset, "C", Scale::Major).unwrap();
        song.insert_note(0, &lane, 0, 0, 1).unwrap();

        let json = serde_json::to_value(&song).unwrap();
        assert_eq!(json["timeSignature"], "4/4");
        assert_eq!(json["barsPerLine"], 4);
        let chord = &json["lines"][0]["bars"][0]["chords"][0];
        assert_eq!(chord["degree"], -1);
        assert_eq!(chord["quality"], "");
        let note = &json["lines"][0]["melodyLines"][0]["notes"][0];
        assert_eq!(note["drumName"], "Kick");
        assert!(note.get("midiNote").is_none());
        assert!(note.get("chordIndex").is_none());
    }
}
