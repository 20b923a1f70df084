//! Sequencer output types
//!
//! Chord events carry only durations and compose left to right. Note events
//! carry absolute beats from the start of the flattened region.

use serde::Serialize;

use crate::chord::ChordSymbol;
use crate::instruments::InstrumentId;
use crate::model::NoteVoice;

/// A chord, or a rest when `symbol` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordEvent {
    pub symbol: Option<ChordSymbol>,
    pub duration: f64,
}

impl ChordEvent {
    pub fn rest(duration: f64) -> Self {
        Self { symbol: None, duration }
    }

    pub fn is_rest(&self) -> bool {
        self.symbol.is_none()
    }

    pub fn name(&self) -> Option<String> {
        self.symbol.as_ref().map(|s| s.to_string())
    }
}

/// A single melody or drum hit.
///
/// # Fields
/// - `beat`: absolute start in beats
/// - `duration`: length in beats
/// - `voice`: MIDI note or drum voice name
/// - `volume`: lane volume, 0.0 to 1.0
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub beat: f64,
    pub duration: f64,
    #[serde(flatten)]
    pub voice: NoteVoice,
    pub instrument: InstrumentId,
    pub volume: f64,
}

impl NoteEvent {
    pub fn end(&self) -> f64 {
        self.beat + self.duration
    }
}

/// Flattened chord and note streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sequence {
    pub chords: Vec<ChordEvent>,
    pub notes: Vec<NoteEvent>,
}

impl Sequence {
    /// Sum of all chord and rest durations.
    pub fn chord_beats(&self) -> f64 {
        self.chords.iter().map(|c| c.duration).sum()
    }

    /// Length of the timeline: the later of the chord stream end and the last
    /// note end.
    pub fn total_beats(&self) -> f64 {
        self.notes
            .iter()
            .map(NoteEvent::end)
            .fold(self.chord_beats(), f64::max)
    }

    /// Chord events paired with their absolute start beat.
    pub fn chord_starts(&self) -> impl Iterator<Item = (f64, &ChordEvent)> + '_ {
        self.chords.iter().scan(0.0, |beat, chord| {
            let start = *beat;
            *beat += chord.duration;
            Some((start, chord))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty() && self.notes.is_empty()
    }
}

/// Visual location of a played beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub line: usize,
    pub bar: usize,
    /// Beats from the start of the line.
    pub beat_in_line: f64,
}
