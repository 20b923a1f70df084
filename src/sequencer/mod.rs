//! # Sequencer Module
//!
//! Flatten a song into a repeat-expanded event timeline.
//!
//! ## Purpose
//! One canonical flattening feeds every consumer:
//! 1. **Playback** - the scheduler turns beats into wall-clock triggers
//! 2. **MIDI export** - beats become absolute ticks
//! 3. **Progress display** - [`locate_beat`] maps a played beat back to a line
//!
//! ## Sub-modules
//! - `types` - ChordEvent, NoteEvent, Sequence, Position type definitions
//! - `engine` - The flattening walk and beat location
//!
//! ## Entry Point
//! [`flatten_to_events()`] - Flatten lines into chord and note events
//!
//! ## Example
//! ```rust
//! use songwriter::model::{ChordSpec, Song};
//! use songwriter::chord::{ChordExtension, ChordQuality};
//! use songwriter::sequencer::flatten_song;
//!
//! let mut song = Song::default();
//! let chord = ChordSpec {
//!     root: "A".to_string(),
//!     quality: ChordQuality::Minor,
//!     extension: ChordExtension::None,
//!     degree: Some(5),
//! };
//! song.insert_chord(0, 0, &chord, 4.0).unwrap();
//!
//! let sequence = flatten_song(&song);
//! assert_eq!(sequence.chords.len(), 4); // Am + three rests
//! assert_eq!(sequence.total_beats(), 16.0);
//! ```
//!
//! ## Repeats
//!
//! Bars between a `repeat_start` and the next `repeat_end` are buffered and
//! played twice, back to back:
//!
//! ```text
//! bars:    |: A | B :| C
//! chords:  A B A B C
//! beats:   0 4 8 12 16
//! ```
//!
//! Notes inside the section are emitted once at their own beats and once more
//! shifted by the section length. Repeat state carries across line boundaries.
//! A `repeat_end` with no open section is ignored, and a section still open
//! at the end of the input is played once.
//!
//! ## Related Modules
//! - `model` - Song, Line, Bar, MelodyLane
//! - `scheduler` - plays a [`Sequence`]
//! - `midi` - writes a [`Sequence`] as a Standard MIDI File

mod types;
mod engine;

#[cfg(test)]
mod tests;

pub use types::{ChordEvent, NoteEvent, Position, Sequence};
pub use engine::{bar_events, flatten_line, flatten_song, flatten_to_events, locate_beat};
