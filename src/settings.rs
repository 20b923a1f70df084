//! Song settings loaded from YAML.
//!
//! ```yaml
//! key: Bb
//! scale: dorian
//! time-signature: 3/4
//! bars-per-line: 4
//! bpm: 96
//! ```
//!
//! Every field is optional. Missing fields take the defaults of a fresh song
//! (C major, 4/4, 4 bars per line, 120 bpm).

use std::path::Path;

use serde::Deserialize;

use crate::error::SongError;
use crate::model::TimeSignature;
use crate::theory::{pitch_class_offset, Scale};

pub const DEFAULT_BPM: u16 = 120;
pub const DEFAULT_BARS_PER_LINE: usize = 4;
pub const MAX_BARS_PER_LINE: usize = 16;
pub const MIN_BPM: u16 = 20;
pub const MAX_BPM: u16 = 400;

/// Raw settings for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RawSettings {
    pub key: Option<String>,
    pub scale: Option<String>,
    pub time_signature: Option<String>,
    pub bars_per_line: Option<usize>,
    pub bpm: Option<u16>,
}

/// Validated settings used to seed a new song and its editor session.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub key: String,
    pub scale: Scale,
    pub time_signature: TimeSignature,
    pub bars_per_line: usize,
    pub bpm: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key: "C".to_string(),
            scale: Scale::Major,
            time_signature: TimeSignature::default(),
            bars_per_line: DEFAULT_BARS_PER_LINE,
            bpm: DEFAULT_BPM,
        }
    }
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self, SongError> {
        let raw: RawSettings = if content.trim().is_empty() {
            RawSettings::default()
        } else {
            serde_yaml::from_str(content)?
        };
        Self::from_raw(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SongError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_raw(raw: RawSettings) -> Result<Self, SongError> {
        let defaults = Settings::default();

        let key = match raw.key {
            Some(key) => validate_key(&key)?,
            None => defaults.key,
        };

        let scale = match &raw.scale {
            Some(name) => Scale::from_name(name)
                .ok_or_else(|| SongError::Document(format!("Unknown scale: {}", name)))?,
            None => defaults.scale,
        };

        let time_signature = match &raw.time_signature {
            Some(ts) => ts.parse()?,
            None => defaults.time_signature,
        };

        let bars_per_line = raw.bars_per_line.unwrap_or(defaults.bars_per_line);
        validate_bars_per_line(bars_per_line)?;

        let bpm = raw.bpm.unwrap_or(defaults.bpm);
        validate_bpm(bpm)?;

        Ok(Settings {
            key,
            scale,
            time_signature,
            bars_per_line,
            bpm,
        })
    }
}

pub fn validate_key(key: &str) -> Result<String, SongError> {
    let key = key.trim();
    match pitch_class_offset(key) {
        Some(_) => Ok(key.to_string()),
        None => Err(SongError::Document(format!("Invalid key: {}", key))),
    }
}

pub fn validate_bars_per_line(bars: usize) -> Result<(), SongError> {
    if bars == 0 || bars > MAX_BARS_PER_LINE {
        return Err(SongError::Document(format!(
            "bars per line must be between 1 and {}, got {}",
            MAX_BARS_PER_LINE, bars
        )));
    }
    Ok(())
}

pub fn validate_bpm(bpm: u16) -> Result<(), SongError> {
    if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
        return Err(SongError::Document(format!(
            "bpm must be between {} and {}, got {}",
            MIN_BPM, MAX_BPM, bpm
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let settings = Settings::from_yaml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.time_signature.beats, 4);
    }

    #[test]
    fn test_full_settings() {
        let yaml = "key: Bb\nscale: dorian\ntime-signature: 3/4\nbars-per-line: 2\nbpm: 96\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.key, "Bb");
        assert_eq!(settings.scale, Scale::Dorian);
        assert_eq!(settings.time_signature, TimeSignature { beats: 3, beat_type: 4 });
        assert_eq!(settings.bars_per_line, 2);
        assert_eq!(settings.bpm, 96);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(Settings::from_yaml("key: H"), Err(SongError::Document(_))));
        assert!(matches!(Settings::from_yaml("scale: klezmer"), Err(SongError::Document(_))));
        assert!(matches!(Settings::from_yaml("time-signature: 4-4"), Err(SongError::Document(_))));
        assert!(matches!(Settings::from_yaml("bars-per-line: 0"), Err(SongError::Document(_))));
        assert!(matches!(Settings::from_yaml("bpm: 5"), Err(SongError::Document(_))));
        assert!(matches!(Settings::from_yaml("bpm: [1"), Err(SongError::Yaml(_))));
    }
}
