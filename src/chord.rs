//! Chord symbols, qualities and extensions
//!
//! One interval table turns a chord symbol into pitches. Playback and MIDI export
//! both go through [`chord_intervals`], so identical symbols always sound the same.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::theory::pitch_class_offset;

/// Octave chords are voiced in (C3 = MIDI 48).
pub const CHORD_OCTAVE: i8 = 3;

/// Triad quality, serialized as its chord-symbol suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChordQuality {
    #[default]
    Major,
    Minor,
    Diminished,
    Augmented,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 4] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
        }
    }

    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "" | "maj" | "M" => Some(ChordQuality::Major),
            "m" | "min" | "-" => Some(ChordQuality::Minor),
            "dim" | "°" => Some(ChordQuality::Diminished),
            "aug" | "+" => Some(ChordQuality::Augmented),
            _ => None,
        }
    }

    fn triad(self) -> Vec<u8> {
        match self {
            ChordQuality::Major => vec![0, 4, 7],
            ChordQuality::Minor => vec![0, 3, 7],
            ChordQuality::Diminished => vec![0, 3, 6],
            ChordQuality::Augmented => vec![0, 4, 8],
        }
    }
}

impl From<String> for ChordQuality {
    fn from(s: String) -> Self {
        ChordQuality::from_suffix(&s).unwrap_or_else(|| {
            log::warn!("Unknown chord quality '{}', using major", s);
            ChordQuality::Major
        })
    }
}

impl From<ChordQuality> for String {
    fn from(q: ChordQuality) -> Self {
        q.suffix().to_string()
    }
}

/// Extension added on top of the triad. `None` leaves the triad alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChordExtension {
    #[default]
    None,
    Seventh,
    MajorSeventh,
    MinorSeventh,
    DiminishedSeventh,
    Ninth,
    MajorNinth,
    MinorNinth,
    Eleventh,
    Thirteenth,
    Sus2,
    Sus4,
}

impl ChordExtension {
    pub const ALL: [ChordExtension; 12] = [
        ChordExtension::None,
        ChordExtension::Seventh,
        ChordExtension::MajorSeventh,
        ChordExtension::MinorSeventh,
        ChordExtension::DiminishedSeventh,
        ChordExtension::Ninth,
        ChordExtension::MajorNinth,
        ChordExtension::MinorNinth,
        ChordExtension::Eleventh,
        ChordExtension::Thirteenth,
        ChordExtension::Sus2,
        ChordExtension::Sus4,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ChordExtension::None => "",
            ChordExtension::Seventh => "7",
            ChordExtension::MajorSeventh => "maj7",
            ChordExtension::MinorSeventh => "m7",
            ChordExtension::DiminishedSeventh => "dim7",
            ChordExtension::Ninth => "9",
            ChordExtension::MajorNinth => "maj9",
            ChordExtension::MinorNinth => "m9",
            ChordExtension::Eleventh => "11",
            ChordExtension::Thirteenth => "13",
            ChordExtension::Sus2 => "sus2",
            ChordExtension::Sus4 => "sus4",
        }
    }

    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "" => Some(ChordExtension::None),
            "7" => Some(ChordExtension::Seventh),
            "maj7" | "M7" => Some(ChordExtension::MajorSeventh),
            "m7" | "min7" | "-7" => Some(ChordExtension::MinorSeventh),
            "dim7" => Some(ChordExtension::DiminishedSeventh),
            "9" => Some(ChordExtension::Ninth),
            "maj9" | "M9" => Some(ChordExtension::MajorNinth),
            "m9" | "min9" => Some(ChordExtension::MinorNinth),
            "11" => Some(ChordExtension::Eleventh),
            "13" => Some(ChordExtension::Thirteenth),
            "sus2" => Some(ChordExtension::Sus2),
            "sus4" => Some(ChordExtension::Sus4),
            _ => None,
        }
    }
}

impl From<String> for ChordExtension {
    fn from(s: String) -> Self {
        ChordExtension::from_suffix(&s).unwrap_or_else(|| {
            log::warn!("Unknown chord extension '{}', ignoring it", s);
            ChordExtension::None
        })
    }
}

impl From<ChordExtension> for String {
    fn from(e: ChordExtension) -> Self {
        e.suffix().to_string()
    }
}

/// Semitone offsets from the root for a quality/extension pair.
///
/// The extension overrides the triad. `7` and `9` follow a minor quality; every
/// other extension has a fixed voicing. Without an extension the quality's
/// triad is used.
///
/// # Examples
/// ```
/// use songwriter::chord::{chord_intervals, ChordExtension, ChordQuality};
///
/// assert_eq!(chord_intervals(ChordQuality::Major, ChordExtension::None), vec![0, 4, 7]);
/// assert_eq!(chord_intervals(ChordQuality::Minor, ChordExtension::Seventh), vec![0, 3, 7, 10]);
/// assert_eq!(chord_intervals(ChordQuality::Major, ChordExtension::Sus4), vec![0, 5, 7]);
/// ```
pub fn chord_intervals(quality: ChordQuality, extension: ChordExtension) -> Vec<u8> {
    let minor = quality == ChordQuality::Minor;
    match extension {
        ChordExtension::None => quality.triad(),
        ChordExtension::Seventh if minor => vec![0, 3, 7, 10],
        ChordExtension::Seventh => vec![0, 4, 7, 10],
        ChordExtension::MajorSeventh => vec![0, 4, 7, 11],
        ChordExtension::MinorSeventh => vec![0, 3, 7, 10],
        ChordExtension::DiminishedSeventh => vec![0, 3, 6, 9],
        ChordExtension::Ninth if minor => vec![0, 3, 7, 10, 14],
        ChordExtension::Ninth => vec![0, 4, 7, 10, 14],
        ChordExtension::MajorNinth => vec![0, 4, 7, 11, 14],
        ChordExtension::MinorNinth => vec![0, 3, 7, 10, 14],
        ChordExtension::Eleventh => vec![0, 4, 7, 10, 14, 17],
        ChordExtension::Thirteenth => vec![0, 4, 7, 10, 14, 21],
        ChordExtension::Sus2 => vec![0, 2, 7],
        ChordExtension::Sus4 => vec![0, 5, 7],
    }
}

/// A playable chord symbol: root spelling plus quality and extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSymbol {
    pub root: String,
    pub quality: ChordQuality,
    pub extension: ChordExtension,
}

impl ChordSymbol {
    pub fn new(root: impl Into<String>, quality: ChordQuality, extension: ChordExtension) -> Self {
        Self {
            root: root.into(),
            quality,
            extension,
        }
    }

    pub fn intervals(&self) -> Vec<u8> {
        chord_intervals(self.quality, self.extension)
    }

    /// MIDI notes with the root voiced in `octave`. An unknown root yields no notes.
    pub fn midi_notes(&self, octave: i8) -> Vec<u8> {
        let Some(pc) = pitch_class_offset(&self.root) else {
            return vec![];
        };
        let root = (octave as i32 + 1) * 12 + pc as i32;
        self.intervals()
            .into_iter()
            .map(|interval| root + interval as i32)
            .filter(|midi| (0..=127).contains(midi))
            .map(|midi| midi as u8)
            .collect()
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.root, self.quality.suffix(), self.extension.suffix())
    }
}

/// Parse a chord symbol such as `C`, `Am`, `G7`, `Bbmaj7` or `F#dim7`.
///
/// The modifier after the root is matched against the known extensions first,
/// then quality + extension combinations. Anything unrecognised falls back to a
/// plain major triad on the parsed root. Returns `None` only when the root itself
/// is not a note name.
///
/// # Examples
/// ```
/// use songwriter::chord::parse_chord_symbol;
///
/// assert_eq!(parse_chord_symbol("C").unwrap().midi_notes(3), vec![48, 52, 55]);
/// assert_eq!(parse_chord_symbol("Dm").unwrap().midi_notes(3), vec![50, 53, 57]);
/// assert_eq!(parse_chord_symbol("G7").unwrap().midi_notes(3), vec![55, 59, 62, 65]);
/// assert_eq!(parse_chord_symbol("F#").unwrap().midi_notes(3), vec![54, 58, 61]);
/// ```
pub fn parse_chord_symbol(symbol: &str) -> Option<ChordSymbol> {
    let symbol = symbol.trim();
    let mut chars = symbol.chars();
    let letter = chars.next().filter(|c| ('A'..='G').contains(c))?;

    let mut root = letter.to_string();
    if let Some(accidental) = chars.next().filter(|c| *c == '#' || *c == 'b') {
        root.push(accidental);
    }
    pitch_class_offset(&root)?;

    let modifier = &symbol[root.len()..];

    if let Some(quality) = ChordQuality::from_suffix(modifier) {
        return Some(ChordSymbol::new(root, quality, ChordExtension::None));
    }
    if let Some(extension) = ChordExtension::from_suffix(modifier) {
        return Some(ChordSymbol::new(root, ChordQuality::Major, extension));
    }
    for quality in ChordQuality::ALL {
        if let Some(rest) = modifier.strip_prefix(quality.suffix()).filter(|_| quality != ChordQuality::Major) {
            if let Some(extension) = ChordExtension::from_suffix(rest) {
                return Some(ChordSymbol::new(root, quality, extension));
            }
        }
    }

    log::warn!("Unknown chord modifier '{}' in '{}', using major", modifier, symbol);
    Some(ChordSymbol::new(root, ChordQuality::Major, ChordExtension::None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chord_parsing() {
        let cmaj7 = parse_chord_symbol("Cmaj7").unwrap();
        assert_eq!(cmaj7.midi_notes(3), vec![48, 52, 55, 59]);

        let b_flat_minor = parse_chord_symbol("Bbm").unwrap();
        assert_eq!(b_flat_minor.root, "Bb");
        assert_eq!(b_flat_minor.quality, ChordQuality::Minor);
        assert_eq!(b_flat_minor.midi_notes(3), vec![58, 61, 65]);

        let am7 = parse_chord_symbol("Am7").unwrap();
        assert_eq!(am7.intervals(), vec![0, 3, 7, 10]);

        let dim7 = parse_chord_symbol("F#dim7").unwrap();
        assert_eq!(dim7.intervals(), vec![0, 3, 6, 9]);

        let min_maj7 = parse_chord_symbol("Cmmaj7").unwrap();
        assert_eq!(min_maj7.quality, ChordQuality::Minor);
        assert_eq!(min_maj7.extension, ChordExtension::MajorSeventh);
    }

    #[test]
    fn test_unknown_modifier_falls_back_to_major() {
        let chord = parse_chord_symbol("Cxyz").unwrap();
        assert_eq!(chord.intervals(), vec![0, 4, 7]);
        assert!(parse_chord_symbol("H7").is_none());
        assert!(parse_chord_symbol("").is_none());
    }

    #[test]
    fn test_interval_table_shape() {
        for quality in ChordQuality::ALL {
            for extension in ChordExtension::ALL {
                let intervals = chord_intervals(quality, extension);
                assert!(!intervals.is_empty());
                assert_eq!(intervals[0], 0);
                assert!(
                    intervals.windows(2).all(|w| w[0] < w[1]),
                    "{:?} {:?} not ascending",
                    quality,
                    extension
                );
            }
        }
    }

    #[test]
    fn test_symbol_display_round_trip() {
        for text in ["C", "Am", "G7", "Ebmaj7", "Ddim", "Eaug", "Asus4", "Bbm9"] {
            let chord = parse_chord_symbol(text).unwrap();
            assert_eq!(chord.to_string(), text);
        }
    }

    #[test]
    fn test_serde_suffix_fallback() {
        let q: ChordQuality = serde_json::from_str("\"m\"").unwrap();
        assert_eq!(q, ChordQuality::Minor);
        let e: ChordExtension = serde_json::from_str("\"add11\"").unwrap();
        assert_eq!(e, ChordExtension::None);
        assert_eq!(serde_json::to_string(&ChordExtension::MajorSeventh).unwrap(), "\"maj7\"");
    }
}
