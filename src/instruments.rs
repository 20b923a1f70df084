//! # Instrument Registry
//!
//! Static table of the instruments a melody lane can use: display name, soundfont
//! reference, playable range, legend colour and, for the drum set, its voices.
//!
//! ## Key Types
//! - [`InstrumentId`] - closed set of instruments, serialized as snake_case keys
//! - [`Instrument`] - registry entry returned by [`InstrumentId::info`]
//! - [`NoteOption`] - one selectable pitch for an instrument in a key/scale
//!
//! ## Related Modules
//! - `theory` - scale notes and pitch spelling used by [`instrument_notes`]
//! - `model` - lanes derive their row labels from [`pitch_scale`]
//! - `midi` - General-MIDI drum numbers via [`gm_drum_note`]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::theory::{midi_number, Spelling};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentId {
    AcousticBass,
    ElectricBass,
    SynthBass,
    AcousticGuitar,
    ElectricGuitarClean,
    Piano,
    Flute,
    Violin,
    Drumset,
}

/// Lowest or highest playable pitch, as note name plus octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeBound {
    pub note: &'static str,
    pub octave: i8,
}

impl RangeBound {
    pub fn midi(&self) -> i32 {
        midi_number(self.note, self.octave).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumVoice {
    pub name: &'static str,
    pub sample: &'static str,
    /// General-MIDI percussion key on channel 10.
    pub gm_note: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct Instrument {
    pub id: InstrumentId,
    pub name: &'static str,
    pub display_name: &'static str,
    /// Soundfont patch; the drum set plays samples instead.
    pub soundfont: Option<&'static str>,
    pub min: RangeBound,
    pub max: RangeBound,
    pub color: &'static str,
    pub drum_voices: &'static [DrumVoice],
}

impl Instrument {
    pub fn min_midi(&self) -> i32 {
        self.min.midi()
    }

    pub fn max_midi(&self) -> i32 {
        self.max.midi()
    }
}

const fn bound(note: &'static str, octave: i8) -> RangeBound {
    RangeBound { note, octave }
}

const fn voice(name: &'static str, sample: &'static str, gm_note: u8) -> DrumVoice {
    DrumVoice { name, sample, gm_note }
}

/// Snare, used for drum voices without a General-MIDI mapping.
pub const DEFAULT_GM_DRUM: u8 = 38;

pub static DRUM_VOICES: [DrumVoice; 12] = [
    voice("Kick", "samples/kick.mp3", 36),
    voice("Snare", "samples/snare.mp3", 38),
    voice("Snare Rim", "samples/snarerim.wav", 37),
    voice("HiHat", "samples/hh.mp3", 42),
    voice("HiHat Open", "samples/hihatopen.wav", 46),
    voice("Tom 1", "samples/tom1.wav", 50),
    voice("Tom 2", "samples/tom2.wav", 47),
    voice("Floor Tom", "samples/floortom.wav", 43),
    voice("Crash", "samples/jazz-crash.wav", 49),
    voice("Ride", "samples/jazz-ride.wav", 51),
    voice("Cowbell", "samples/cowbell.wav", 56),
    voice("Clap", "samples/klap.wav", 39),
];

static REGISTRY: [Instrument; 9] = [
    Instrument {
        id: InstrumentId::AcousticBass,
        name: "Acoustic Bass",
        display_name: "Double Bass",
        soundfont: Some("acoustic_bass"),
        min: bound("C", 1),
        max: bound("G", 4),
        color: "#8B4513",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::ElectricBass,
        name: "Electric Bass",
        display_name: "Electric Bass 5",
        soundfont: Some("electric_bass_finger"),
        min: bound("B", 0),
        max: bound("G", 4),
        color: "#FF6B35",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::SynthBass,
        name: "Synth Bass",
        display_name: "Synth Bass",
        soundfont: Some("synth_bass_1"),
        min: bound("C", 0),
        max: bound("G", 4),
        color: "#4ECDC4",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::AcousticGuitar,
        name: "Acoustic Guitar",
        display_name: "Acoustic Guitar",
        soundfont: Some("acoustic_guitar_steel"),
        min: bound("E", 2),
        max: bound("E", 6),
        color: "#3498db",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::ElectricGuitarClean,
        name: "Electric Guitar (Clean)",
        display_name: "E-Guitar Clean",
        soundfont: Some("electric_guitar_clean"),
        min: bound("E", 2),
        max: bound("E", 6),
        color: "#F38181",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::Piano,
        name: "Piano",
        display_name: "Acoustic Piano",
        soundfont: Some("acoustic_grand_piano"),
        min: bound("A", 0),
        max: bound("C", 8),
        color: "#AA96DA",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::Flute,
        name: "Flute",
        display_name: "Flute",
        soundfont: Some("flute"),
        min: bound("C", 4),
        max: bound("C", 7),
        color: "#FCBAD3",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::Violin,
        name: "Violin",
        display_name: "Violin",
        soundfont: Some("violin"),
        min: bound("G", 3),
        max: bound("E", 7),
        color: "#D4A017",
        drum_voices: &[],
    },
    Instrument {
        id: InstrumentId::Drumset,
        name: "Drumset",
        display_name: "Drum Set",
        soundfont: None,
        min: bound("C", 0),
        max: bound("C", 1),
        color: "#28a745",
        drum_voices: &DRUM_VOICES,
    },
];

impl InstrumentId {
    pub const ALL: [InstrumentId; 9] = [
        InstrumentId::AcousticBass,
        InstrumentId::ElectricBass,
        InstrumentId::SynthBass,
        InstrumentId::AcousticGuitar,
        InstrumentId::ElectricGuitarClean,
        InstrumentId::Piano,
        InstrumentId::Flute,
        InstrumentId::Violin,
        InstrumentId::Drumset,
    ];

    pub fn info(self) -> &'static Instrument {
        match self {
            InstrumentId::AcousticBass => &REGISTRY[0],
            InstrumentId::ElectricBass => &REGISTRY[1],
            InstrumentId::SynthBass => &REGISTRY[2],
            InstrumentId::AcousticGuitar => &REGISTRY[3],
            InstrumentId::ElectricGuitarClean => &REGISTRY[4],
            InstrumentId::Piano => &REGISTRY[5],
            InstrumentId::Flute => &REGISTRY[6],
            InstrumentId::Violin => &REGISTRY[7],
            InstrumentId::Drumset => &REGISTRY[8],
        }
    }

    pub fn is_drums(self) -> bool {
        self == InstrumentId::Drumset
    }

    /// Registry key, as stored in documents (`acoustic_bass`, `drumset`, ...).
    pub fn key(self) -> &'static str {
        match self {
            InstrumentId::AcousticBass => "acoustic_bass",
            InstrumentId::ElectricBass => "electric_bass",
            InstrumentId::SynthBass => "synth_bass",
            InstrumentId::AcousticGuitar => "acoustic_guitar",
            InstrumentId::ElectricGuitarClean => "electric_guitar_clean",
            InstrumentId::Piano => "piano",
            InstrumentId::Flute => "flute",
            InstrumentId::Violin => "violin",
            InstrumentId::Drumset => "drumset",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        InstrumentId::ALL.iter().copied().find(|id| id.key() == key)
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().display_name)
    }
}

/// A selectable pitch for an instrument, e.g. `Bb3` (MIDI 58).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOption {
    pub pitch_class: String,
    pub octave: i8,
    pub midi: u8,
    pub display_name: String,
}

/// Every scale pitch the instrument can play, highest first.
///
/// Pitches are respelled to match `key` and filtered to the instrument's declared
/// MIDI range. Notes sharing a MIDI number keep their scale order.
///
/// # Examples
/// ```
/// use songwriter::instruments::{instrument_notes, InstrumentId};
/// use songwriter::theory::{scale_notes, Scale};
///
/// let notes = instrument_notes(InstrumentId::Flute, &scale_notes("C", Scale::Major), "C");
/// assert_eq!(notes.first().unwrap().display_name, "C7");
/// assert_eq!(notes.last().unwrap().display_name, "C4");
/// ```
pub fn instrument_notes(instrument: InstrumentId, scale_notes: &[&str], key: &str) -> Vec<NoteOption> {
    let info = instrument.info();
    let (min_midi, max_midi) = (info.min_midi(), info.max_midi());
    let spelling = Spelling::for_key(key);

    let mut notes = Vec::new();
    for octave in info.min.octave..=info.max.octave {
        for pitch_class in scale_notes {
            let Some(midi) = midi_number(pitch_class, octave) else {
                continue;
            };
            if midi < min_midi || midi > max_midi {
                continue;
            }
            let Ok(midi) = u8::try_from(midi) else {
                continue;
            };
            let display = spelling.respell(pitch_class);
            notes.push(NoteOption {
                pitch_class: display.to_string(),
                octave,
                midi,
                display_name: format!("{}{}", display, octave),
            });
        }
    }

    // sort_by is stable, so equal MIDI numbers keep scale order
    notes.sort_by(|a, b| b.midi.cmp(&a.midi));
    notes
}

/// Row labels for a new lane: drum voice names for the drum set, otherwise the
/// display names from [`instrument_notes`].
pub fn pitch_scale(instrument: InstrumentId, scale_notes: &[&str], key: &str) -> Vec<String> {
    if instrument.is_drums() {
        return instrument
            .info()
            .drum_voices
            .iter()
            .map(|v| v.name.to_string())
            .collect();
    }
    instrument_notes(instrument, scale_notes, key)
        .into_iter()
        .map(|n| n.display_name)
        .collect()
}

pub fn drum_voice(name: &str) -> Option<&'static DrumVoice> {
    DRUM_VOICES.iter().find(|v| v.name == name)
}

/// General-MIDI percussion key for a drum voice name, snare when unknown.
pub fn gm_drum_note(name: &str) -> u8 {
    match drum_voice(name) {
        Some(v) => v.gm_note,
        None => {
            log::warn!("Unknown drum voice '{}', using snare", name);
            DEFAULT_GM_DRUM
        }
    }
}
