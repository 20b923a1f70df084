//! Plain-text chord chart for printing.
//!
//! ```text
//! Key: C major | Time: 4/4 | Tempo: 120 bpm
//!
//! Line 1
//! |: C       G      | Am      F      :|
//!    hello            world
//! ```
//!
//! Chords sit at their beat position inside the bar, repeat marks are drawn on
//! the bar lines, and each bar's lyrics go on the row below.

use std::fmt::Write;

use crate::model::{Bar, Line, Song};

/// Characters per beat in a bar cell.
const CHARS_PER_BEAT: usize = 4;

pub fn to_chord_chart(song: &Song) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = writeln!(
        out,
        "Key: {} {} | Time: {} | Tempo: {} bpm",
        song.key,
        song.scale.name(),
        song.time_signature,
        song.bpm
    );

    for (index, line) in song.lines.iter().enumerate() {
        out.push('\n');
        let _ = writeln!(out, "Line {}", index + 1);
        out.push_str(&line_rows(line, song.beats_per_bar()));
    }
    out
}

/// Text of a bar's chords, each placed at its beat offset.
fn chord_text(bar: &Bar) -> String {
    let mut text = String::new();
    let mut beat = 0.0;
    for chord in &bar.chords {
        let target = 1 + (beat * CHARS_PER_BEAT as f64).round() as usize;
        let len = text.chars().count();
        if len < target {
            text.extend(std::iter::repeat(' ').take(target - len));
        } else {
            text.push(' ');
        }
        text.push_str(&chord.name());
        beat += chord.duration;
    }
    text
}

/// Bar line between `left` and `right`, either of which may be absent at the
/// ends of a line.
fn bar_line(left: Option<&Bar>, right: Option<&Bar>) -> &'static str {
    let end = left.map_or(false, |b| b.repeat_end);
    let start = right.map_or(false, |b| b.repeat_start);
    match (end, start) {
        (true, true) => ":|:",
        (true, false) => ":|",
        (false, true) => "|:",
        (false, false) => "|",
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let mut padded = text.to_string();
    padded.extend(std::iter::repeat(' ').take(width.saturating_sub(len)));
    padded
}

fn line_rows(line: &Line, beats_per_bar: usize) -> String {
    let chords: Vec<String> = line.bars.iter().map(chord_text).collect();
    let widths: Vec<usize> = line
        .bars
        .iter()
        .zip(&chords)
        .map(|(bar, text)| {
            (beats_per_bar * CHARS_PER_BEAT)
                .max(text.chars().count() + 1)
                .max(bar.lyrics.chars().count() + 2)
        })
        .collect();

    let mut chord_row = String::new();
    let mut lyric_row = String::new();
    let mut has_lyrics = false;
    for (i, bar) in line.bars.iter().enumerate() {
        let separator = bar_line(i.checked_sub(1).and_then(|p| line.bars.get(p)), Some(bar));
        chord_row.push_str(separator);
        lyric_row.push_str(&" ".repeat(separator.len()));

        chord_row.push_str(&pad(&chords[i], widths[i]));
        lyric_row.push_str(&pad(&format!(" {}", bar.lyrics), widths[i]));
        has_lyrics |= !bar.lyrics.is_empty();
    }
    chord_row.push_str(bar_line(line.bars.last(), None));

    let mut out = chord_row;
    out.push('\n');
    if has_lyrics {
        out.push_str(lyric_row.trim_end());
        out.push('\n');
    }
    out
}
