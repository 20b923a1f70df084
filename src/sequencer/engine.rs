//! Flattening engine
//!
//! Walks lines then bars once, keeping a beat cursor and at most one open
//! repeat section.

use crate::error::SongError;
use crate::model::{Bar, Line, Song, TimeSignature, SUBDIVISIONS_PER_BEAT};
use super::types::{ChordEvent, NoteEvent, Position, Sequence};

const BEAT_EPSILON: f64 = 1e-9;

/// Events buffered between a repeat start and its end.
struct RepeatSection {
    start_beat: f64,
    chords: Vec<ChordEvent>,
    notes: Vec<NoteEvent>,
}

impl RepeatSection {
    fn new(start_beat: f64) -> Self {
        Self {
            start_beat,
            chords: Vec::new(),
            notes: Vec::new(),
        }
    }
}

struct Flattener {
    beats_per_bar: usize,
    subdivisions: usize,
    current_beat: f64,
    output: Sequence,
    repeat: Option<RepeatSection>,
}

impl Flattener {
    fn new(time_signature: &TimeSignature, subdivisions: usize) -> Self {
        Self {
            beats_per_bar: time_signature.beats_per_bar(),
            subdivisions: subdivisions.max(1),
            current_beat: 0.0,
            output: Sequence::default(),
            repeat: None,
        }
    }

    fn flush_open_section(&mut self) {
        if let Some(section) = self.repeat.take() {
            log::warn!(
                "Repeat section starting at beat {} was not closed, playing it once ({} chords, {} notes)",
                section.start_beat,
                section.chords.len(),
                section.notes.len()
            );
            self.output.chords.extend(section.chords);
            self.output.notes.extend(section.notes);
        }
    }

    fn bar_chords(&self, bar: &Bar) -> Vec<ChordEvent> {
        let mut events: Vec<ChordEvent> = bar
            .chords
            .iter()
            .map(|c| ChordEvent {
                symbol: Some(c.symbol()),
                duration: c.duration,
            })
            .collect();

        // pad so the chord stream stays aligned with the bar grid
        let free = bar.free_beats(self.beats_per_bar);
        if free > BEAT_EPSILON {
            events.push(ChordEvent::rest(free));
        }
        events
    }

    fn bar_notes(&self, line: &Line, bar_index: usize) -> Vec<NoteEvent> {
        let cols_per_bar = self.beats_per_bar * self.subdivisions;
        let subdivisions = self.subdivisions as f64;

        let mut notes = Vec::new();
        for lane in &line.melody_lines {
            for note in &lane.notes {
                if cols_per_bar == 0 || note.col / cols_per_bar != bar_index {
                    continue;
                }
                let col_in_bar = note.col % cols_per_bar;
                notes.push(NoteEvent {
                    beat: self.current_beat + col_in_bar as f64 / subdivisions,
                    duration: note.span as f64 / subdivisions,
                    voice: note.voice.clone(),
                    instrument: lane.instrument,
                    volume: lane.volume,
                });
            }
        }
        notes
    }

    fn visit_bar(&mut self, line: &Line, bar_index: usize, bar: &Bar) {
        if bar.repeat_start {
            if self.repeat.is_some() {
                // a second start closes nothing; play what was buffered once
                self.flush_open_section();
            }
            self.repeat = Some(RepeatSection::new(self.current_beat));
        }

        let chords = self.bar_chords(bar);
        let notes = self.bar_notes(line, bar_index);
        match &mut self.repeat {
            Some(section) => {
                section.chords.extend(chords);
                section.notes.extend(notes);
            }
            None => {
                self.output.chords.extend(chords);
                self.output.notes.extend(notes);
            }
        }

        self.current_beat += self.beats_per_bar as f64;

        if bar.repeat_end {
            if let Some(section) = self.repeat.take() {
                let span = self.current_beat - section.start_beat;
                self.output.chords.extend(section.chords.iter().cloned());
                self.output.chords.extend(section.chords);
                self.output.notes.extend(section.notes.iter().cloned());
                self.output.notes.extend(section.notes.into_iter().map(|mut n| {
                    n.beat += span;
                    n
                }));
                self.current_beat += span;
            }
        }
    }

    fn finish(mut self) -> Sequence {
        self.flush_open_section();
        log::debug!(
            "flattened {} chord events and {} note events over {} beats",
            self.output.chords.len(),
            self.output.notes.len(),
            self.current_beat
        );
        self.output
    }
}

/// Flatten lines into repeat-expanded chord and note streams.
///
/// Every bar contributes its chord segments followed by a rest for any unused
/// beats (a whole-bar rest when empty), plus the notes of every lane whose
/// column falls inside it. Bars inside a closed repeat section appear twice.
pub fn flatten_to_events(lines: &[Line], time_signature: &TimeSignature, subdivisions: usize) -> Sequence {
    let mut flattener = Flattener::new(time_signature, subdivisions);
    for line in lines {
        for (bar_index, bar) in line.bars.iter().enumerate() {
            flattener.visit_bar(line, bar_index, bar);
        }
    }
    flattener.finish()
}

/// The whole song.
pub fn flatten_song(song: &Song) -> Sequence {
    flatten_to_events(&song.lines, &song.time_signature, SUBDIVISIONS_PER_BEAT)
}

/// One line on its own, starting at beat 0.
pub fn flatten_line(song: &Song, line: usize) -> Result<Sequence, SongError> {
    let line = song.line(line)?;
    Ok(flatten_to_events(
        std::slice::from_ref(line),
        &song.time_signature,
        SUBDIVISIONS_PER_BEAT,
    ))
}

/// The chords of a single bar, without repeats or rests. Empty bars give an
/// empty list.
pub fn bar_events(song: &Song, line: usize, bar: usize) -> Result<Vec<ChordEvent>, SongError> {
    Ok(song
        .bar(line, bar)?
        .chords
        .iter()
        .map(|c| ChordEvent {
            symbol: Some(c.symbol()),
            duration: c.duration,
        })
        .collect())
}

/// Map a beat of the flattened song back to the bar it was played from.
///
/// Beats in the second pass of a repeat resolve to the bars of the first pass.
/// Returns `None` past the end of the song.
pub fn locate_beat(song: &Song, beat: f64) -> Option<Position> {
    if !beat.is_finite() || beat < 0.0 {
        return None;
    }
    let beats_per_bar = song.beats_per_bar() as f64;
    let mut cursor = 0.0;
    let mut section: Option<Vec<(usize, usize)>> = None;

    for (line_index, line) in song.lines.iter().enumerate() {
        for (bar_index, bar) in line.bars.iter().enumerate() {
            if bar.repeat_start {
                section = Some(Vec::new());
            }

            if beat >= cursor && beat < cursor + beats_per_bar {
                return Some(Position {
                    line: line_index,
                    bar: bar_index,
                    beat_in_line: bar_index as f64 * beats_per_bar + (beat - cursor),
                });
            }
            if let Some(bars) = &mut section {
                bars.push((line_index, bar_index));
            }
            cursor += beats_per_bar;

            if bar.repeat_end {
                if let Some(bars) = section.take() {
                    let span = bars.len() as f64 * beats_per_bar;
                    if beat >= cursor && beat < cursor + span {
                        let offset = beat - cursor;
                        let k = ((offset / beats_per_bar) as usize).min(bars.len() - 1);
                        let (line, bar) = bars[k];
                        return Some(Position {
                            line,
                            bar,
                            beat_in_line: bar as f64 * beats_per_bar + (offset - k as f64 * beats_per_bar),
                        });
                    }
                    cursor += span;
                }
            }
        }
    }
    None
}
