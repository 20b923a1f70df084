//! # Error Types
//!
//! This module defines all error types for the songwriter core.
//!
//! Editing errors carry the line / bar / lane location that was addressed so a
//! front end can point at the offending cell.
//!
//! ## Error Types
//! - [`SongError`] - document, editing, persistence and export failures
//! - [`SinkError`] - an audio collaborator could not play one trigger
//!
//! Music theory lookups never fail: they fall back to documented defaults
//! (empty scale, plain major triad) instead of returning an error.
//!
//! ## Usage
//! ```rust
//! use songwriter::{Song, SongError};
//!
//! let mut song = Song::default();
//! match song.delete_line(0) {
//!     Err(SongError::LastLine) => eprintln!("a song keeps at least one line"),
//!     Err(e) => eprintln!("Error: {}", e),
//!     Ok(()) => {}
//! }
//! ```

use thiserror::Error;

use crate::instruments::InstrumentId;

#[derive(Error, Debug)]
pub enum SongError {
    /// Invalid document or settings value.
    ///
    /// # Example
    /// ```
    /// # use songwriter::SongError;
    /// let err = SongError::Document("time signature must be in format N/D".to_string());
    /// assert_eq!(err.to_string(), "Invalid document: time signature must be in format N/D");
    /// ```
    #[error("Invalid document: {0}")]
    Document(String),

    #[error("Line {line} does not exist")]
    LineNotFound { line: usize },

    #[error("Bar {bar} does not exist in line {line}")]
    BarNotFound { line: usize, bar: usize },

    #[error("Chord {index} does not exist in line {line}, bar {bar}")]
    ChordNotFound { line: usize, bar: usize, index: usize },

    #[error("Melody lane '{lane}' does not exist in line {line}")]
    LaneNotFound { line: usize, lane: String },

    #[error("Note '{note}' does not exist in lane '{lane}' of line {line}")]
    NoteNotFound {
        line: usize,
        lane: String,
        note: String,
    },

    /// Durations and spans must be strictly positive.
    #[error("Invalid duration: {duration}")]
    InvalidDuration { duration: f64 },

    /// A grid row or column outside the lane's pitch scale / line grid.
    #[error("Grid cell (row {row}, col {col}) is outside the lane")]
    InvalidCell { row: usize, col: usize },

    /// The song always keeps at least one line.
    #[error("Cannot delete the last remaining line")]
    LastLine,

    #[error("MIDI export failed: {0}")]
    Midi(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure reported by an audio collaborator for a single trigger.
///
/// The scheduler logs these and keeps going; they never abort a sequence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Instrument {0:?} is not loaded yet")]
    InstrumentNotLoaded(InstrumentId),

    #[error("Drum sample '{0}' is not loaded")]
    SampleMissing(String),
}
