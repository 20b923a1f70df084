//! # Music Theory Engine
//!
//! Pure lookups over fixed tables: scale notes for a key, diatonic chord quality
//! per scale degree, enharmonic spelling and pitch-name parsing.
//!
//! ## Spelling
//! Pitch classes are spelled once per key. Flat keys (F, Bb, Eb, Ab, Db, Gb, Cb and
//! any key literal containing a `b`) use the flat table, every other key uses the
//! sharp table:
//!
//! ```text
//! sharps: C C# D D# E F F# G G# A A# B
//! flats:  C Db D Eb E F Gb G Ab A Bb B
//! ```
//!
//! ## Fallbacks
//! Every lookup is total. An unknown key yields an empty scale, an unknown
//! scale/degree pair yields a major quality.
//!
//! ## Related Modules
//! - `chord` - chord qualities, extensions and interval tables
//! - `instruments` - instrument ranges built on top of [`scale_notes`]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chord::ChordQuality;

pub const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// The five black-key spelling pairs (sharp, flat).
const ENHARMONIC_PAIRS: [(&str, &str); 5] = [
    ("C#", "Db"),
    ("D#", "Eb"),
    ("F#", "Gb"),
    ("G#", "Ab"),
    ("A#", "Bb"),
];

const FLAT_KEYS: [&str; 7] = ["F", "Bb", "Eb", "Ab", "Db", "Gb", "Cb"];

pub const ROMAN_NUMERALS: [&str; 12] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
];

/// Circle of fifths, clockwise from C.
pub const CIRCLE_OF_FIFTHS: [&str; 12] = [
    "C", "G", "D", "A", "E", "B", "F#", "Db", "Ab", "Eb", "Bb", "F",
];

/// Sharp or flat spelling for the black keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spelling {
    Sharps,
    Flats,
}

impl Spelling {
    /// Spelling used for everything displayed in `key`.
    pub fn for_key(key: &str) -> Self {
        let key = key.trim();
        if FLAT_KEYS.contains(&key) || key.contains('b') {
            Spelling::Flats
        } else {
            Spelling::Sharps
        }
    }

    pub fn names(self) -> &'static [&'static str; 12] {
        match self {
            Spelling::Sharps => &SHARP_NAMES,
            Spelling::Flats => &FLAT_NAMES,
        }
    }

    /// Respell a pitch-class name into this spelling. Naturals and unknown
    /// names pass through untouched.
    pub fn respell<'a>(self, name: &'a str) -> &'a str {
        for (sharp, flat) in ENHARMONIC_PAIRS {
            match self {
                Spelling::Flats if name == sharp => return flat,
                Spelling::Sharps if name == flat => return sharp,
                _ => {}
            }
        }
        name
    }
}

/// Scales offered by the editor, each a fixed interval pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scale {
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    WholeTone,
    Diminished,
    BebopMajor,
    BebopDominant,
    Altered,
    LydianDominant,
}

impl Scale {
    pub const ALL: [Scale; 18] = [
        Scale::Major,
        Scale::Minor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Locrian,
        Scale::HarmonicMinor,
        Scale::MelodicMinor,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Blues,
        Scale::WholeTone,
        Scale::Diminished,
        Scale::BebopMajor,
        Scale::BebopDominant,
        Scale::Altered,
        Scale::LydianDominant,
    ];

    /// Semitone offsets from the root, in degree order.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::WholeTone => &[0, 2, 4, 6, 8, 10],
            Scale::Diminished => &[0, 2, 3, 5, 6, 8, 9, 11],
            Scale::BebopMajor => &[0, 2, 4, 5, 7, 8, 9, 11],
            Scale::BebopDominant => &[0, 2, 4, 5, 7, 9, 10, 11],
            Scale::Altered => &[0, 1, 3, 4, 6, 8, 10],
            Scale::LydianDominant => &[0, 2, 4, 6, 7, 9, 10],
        }
    }

    /// Name used in documents and settings (`harmonicMinor`, `blues`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::Locrian => "locrian",
            Scale::HarmonicMinor => "harmonicMinor",
            Scale::MelodicMinor => "melodicMinor",
            Scale::PentatonicMajor => "pentatonicMajor",
            Scale::PentatonicMinor => "pentatonicMinor",
            Scale::Blues => "blues",
            Scale::WholeTone => "wholeTone",
            Scale::Diminished => "diminished",
            Scale::BebopMajor => "bebopMajor",
            Scale::BebopDominant => "bebopDominant",
            Scale::Altered => "altered",
            Scale::LydianDominant => "lydianDominant",
        }
    }

    /// Parse a scale name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        Scale::ALL
            .iter()
            .copied()
            .find(|scale| scale.name().to_lowercase() == wanted)
    }

    /// Diatonic chord quality table, indexed by degree. Scales without a
    /// harmonized table return `None`.
    fn quality_table(self) -> Option<&'static [ChordQuality]> {
        use ChordQuality::{Augmented as A, Diminished as D, Major as M, Minor as m};
        match self {
            Scale::Major => Some(&[M, m, m, M, M, m, D]),
            Scale::Minor => Some(&[m, D, M, m, m, M, M]),
            Scale::Dorian => Some(&[m, m, M, M, m, D, M]),
            Scale::Phrygian => Some(&[m, M, M, m, D, M, m]),
            Scale::Lydian => Some(&[M, M, m, D, M, m, m]),
            Scale::Mixolydian => Some(&[M, m, D, M, m, m, M]),
            Scale::Locrian => Some(&[D, M, m, m, M, M, m]),
            Scale::HarmonicMinor => Some(&[m, D, A, m, M, M, D]),
            Scale::MelodicMinor => Some(&[m, m, A, M, M, D, D]),
            Scale::BebopMajor => Some(&[M, m, m, M, M, m, D, M]),
            Scale::BebopDominant => Some(&[M, m, D, M, m, m, M, M]),
            Scale::Diminished => Some(&[D, M, m, D, M, m, D, M]),
            _ => None,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semitone offset from C for a pitch-class name in either spelling.
pub fn pitch_class_offset(name: &str) -> Option<u8> {
    SHARP_NAMES
        .iter()
        .position(|n| *n == name)
        .or_else(|| FLAT_NAMES.iter().position(|n| *n == name))
        .map(|i| i as u8)
}

/// MIDI number for a pitch class and octave (C4 = 60).
pub fn midi_number(name: &str, octave: i8) -> Option<i32> {
    pitch_class_offset(name).map(|pc| (octave as i32 + 1) * 12 + pc as i32)
}

/// Parse a pitch display name such as `C4`, `F#5` or `Bb-1` into
/// `(pitch class, octave, midi)`. Returns `None` when the MIDI number falls
/// outside 0..=127.
pub fn parse_pitch_name(name: &str) -> Option<(String, i8, u8)> {
    let split = name.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let (pitch_class, octave) = name.split_at(split);
    let octave: i8 = octave.parse().ok()?;
    let midi = midi_number(pitch_class, octave)?;
    let midi = u8::try_from(midi).ok().filter(|m| *m <= 127)?;
    Some((pitch_class.to_string(), octave, midi))
}

/// True iff `a` and `b` are the two spellings of the same black key.
pub fn enharmonic_equivalent(a: &str, b: &str) -> bool {
    ENHARMONIC_PAIRS
        .iter()
        .any(|&(sharp, flat)| (a == sharp && b == flat) || (a == flat && b == sharp))
}

/// Pitch-class names of `scale` rooted at `key`, one per scale degree.
///
/// The key is looked up in the table chosen by [`Spelling::for_key`]; a key
/// spelled the other way (e.g. `A#` in a flat context) is resolved through the
/// enharmonic table. Unknown keys yield an empty list.
///
/// # Examples
/// ```
/// use songwriter::theory::{scale_notes, Scale};
///
/// assert_eq!(scale_notes("C", Scale::Major), vec!["C", "D", "E", "F", "G", "A", "B"]);
/// assert_eq!(scale_notes("F", Scale::Major), vec!["F", "G", "A", "Bb", "C", "D", "E"]);
/// assert!(scale_notes("H", Scale::Major).is_empty());
/// ```
pub fn scale_notes(key: &str, scale: Scale) -> Vec<&'static str> {
    let key = key.trim();
    let names = Spelling::for_key(key).names();

    let root = names.iter().position(|n| *n == key).or_else(|| {
        ENHARMONIC_PAIRS
            .iter()
            .find_map(|&(sharp, flat)| match key {
                k if k == sharp => Some(flat),
                k if k == flat => Some(sharp),
                _ => None,
            })
            .and_then(|equivalent| names.iter().position(|n| *n == equivalent))
    });

    match root {
        Some(root) => scale
            .intervals()
            .iter()
            .map(|interval| names[(root + *interval as usize) % 12])
            .collect(),
        None => Vec::new(),
    }
}

/// Diatonic chord quality for a scale degree (0-based). Chromatic selections
/// (`None`), out-of-range degrees and scales without a table give `Major`.
pub fn chord_quality(scale: Scale, degree: Option<usize>) -> ChordQuality {
    degree
        .and_then(|d| scale.quality_table().and_then(|table| table.get(d)))
        .copied()
        .unwrap_or_default()
}

/// Key signature in circle-of-fifths steps (sharps positive, flats negative).
pub fn key_fifths(key: &str) -> i8 {
    match key.trim() {
        "G" => 1,
        "D" => 2,
        "A" => 3,
        "E" => 4,
        "B" => 5,
        "F#" => 6,
        "C#" => 7,
        "F" => -1,
        "Bb" | "A#" => -2,
        "Eb" | "D#" => -3,
        "Ab" | "G#" => -4,
        "Db" => -5,
        "Gb" => -6,
        "Cb" => -7,
        _ => 0,
    }
}
