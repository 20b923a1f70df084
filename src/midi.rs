//! Standard MIDI File export.
//!
//! Everything is written from the flattened sequence, so repeats are expanded
//! exactly as they are heard during playback. Events are collected with absolute
//! ticks, sorted, then converted to delta times.

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use crate::chord::CHORD_OCTAVE;
use crate::error::SongError;
use crate::instruments::{gm_drum_note, InstrumentId};
use crate::model::{NoteVoice, Song};
use crate::sequencer::{flatten_song, NoteEvent, Sequence};

pub const TICKS_PER_BEAT: u16 = 480;
pub const CHORD_VELOCITY: u8 = 80;
pub const MELODIC_VELOCITY: u8 = 80;
pub const DRUM_VELOCITY: u8 = 100;
/// General-MIDI percussion channel (channel 10, zero based).
pub const DRUM_CHANNEL: u8 = 9;

/// General-MIDI program for an instrument's patch. The drum set has none.
pub fn gm_program(instrument: InstrumentId) -> Option<u8> {
    match instrument {
        InstrumentId::AcousticBass => Some(32),
        InstrumentId::ElectricBass => Some(33),
        InstrumentId::SynthBass => Some(38),
        InstrumentId::AcousticGuitar => Some(25),
        InstrumentId::ElectricGuitarClean => Some(27),
        InstrumentId::Piano => Some(0),
        InstrumentId::Flute => Some(73),
        InstrumentId::Violin => Some(40),
        InstrumentId::Drumset => None,
    }
}

fn beats_to_ticks(beats: f64) -> u32 {
    (beats * TICKS_PER_BEAT as f64).round().max(0.0) as u32
}

/// Export the whole song: conductor track, chord track and one track per
/// instrument used in any lane.
pub fn song_to_midi(song: &Song) -> Result<Vec<u8>, SongError> {
    let sequence = flatten_song(song);

    let mut tracks = vec![conductor_track(song), chord_track(&sequence)];
    let mut channels = (1u8..16).filter(|c| *c != DRUM_CHANNEL);
    for instrument in instruments_used(&sequence) {
        let channel = if instrument.is_drums() {
            DRUM_CHANNEL
        } else {
            match channels.next() {
                Some(channel) => channel,
                None => {
                    log::warn!("Out of MIDI channels, skipping {}", instrument);
                    continue;
                }
            }
        };
        tracks.push(instrument_track(instrument, channel, &sequence.notes));
    }

    log::debug!("writing {} MIDI tracks", tracks.len());
    write_smf(tracks)
}

/// Export a single instrument with its own tempo map, melodic notes on channel 0
/// and drums on channel 9.
pub fn instrument_to_midi(song: &Song, instrument: InstrumentId) -> Result<Vec<u8>, SongError> {
    let sequence = flatten_song(song);
    let channel = if instrument.is_drums() { DRUM_CHANNEL } else { 0 };
    let tracks = vec![
        conductor_track(song),
        instrument_track(instrument, channel, &sequence.notes),
    ];
    write_smf(tracks)
}

/// Instruments in the order they first appear in the note stream.
pub fn instruments_used(sequence: &Sequence) -> Vec<InstrumentId> {
    let mut instruments = Vec::new();
    for note in &sequence.notes {
        if !instruments.contains(&note.instrument) {
            instruments.push(note.instrument);
        }
    }
    instruments
}

fn write_smf(tracks: Vec<Track<'_>>) -> Result<Vec<u8>, SongError> {
    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(TICKS_PER_BEAT.into()),
        },
        tracks,
    };
    let mut out = Vec::new();
    smf.write(&mut out)
        .map_err(|e| SongError::Midi(format!("Failed to write MIDI: {}", e)))?;
    Ok(out)
}

fn conductor_track(song: &Song) -> Track<'static> {
    let microseconds_per_quarter = 60_000_000 / song.bpm.max(1) as u32;
    let denominator_power = song.time_signature.beat_type.max(1).trailing_zeros() as u8;

    vec![
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(microseconds_per_quarter.into())),
        },
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                song.time_signature.beats,
                denominator_power,
                24,
                8,
            )),
        },
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]
}

fn note_pair(tick: u32, end: u32, channel: u8, key: u8, vel: u8) -> [TrackEvent<'static>; 2] {
    [
        TrackEvent {
            delta: tick.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: vel.into(),
                },
            },
        },
        TrackEvent {
            delta: end.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOff {
                    key: key.into(),
                    vel: 0.into(),
                },
            },
        },
    ]
}

fn chord_track(sequence: &Sequence) -> Track<'static> {
    let mut events = Vec::new();
    for (beat, chord) in sequence.chord_starts() {
        let Some(symbol) = &chord.symbol else {
            continue;
        };
        let start = beats_to_ticks(beat);
        let end = beats_to_ticks(beat + chord.duration);
        for key in symbol.midi_notes(CHORD_OCTAVE) {
            events.extend(note_pair(start, end, 0, key, CHORD_VELOCITY));
        }
    }
    finish_track(b"Chords", events)
}

fn instrument_track(instrument: InstrumentId, channel: u8, notes: &[NoteEvent]) -> Track<'static> {
    let mut events = Vec::new();
    if let Some(program) = gm_program(instrument) {
        events.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::ProgramChange {
                    program: program.into(),
                },
            },
        });
    }

    for note in notes.iter().filter(|n| n.instrument == instrument) {
        let start = beats_to_ticks(note.beat);
        let end = beats_to_ticks(note.end());
        match &note.voice {
            NoteVoice::Drum { drum_name } => {
                events.extend(note_pair(start, end, channel, gm_drum_note(drum_name), DRUM_VELOCITY));
            }
            NoteVoice::Midi { midi_note } => {
                if *midi_note > 127 {
                    log::warn!("Skipping out-of-range MIDI note {}", midi_note);
                    continue;
                }
                events.extend(note_pair(start, end, channel, *midi_note, MELODIC_VELOCITY));
            }
        }
    }
    finish_track(instrument.info().display_name.as_bytes(), events)
}

/// Prefix the track name, sort by absolute tick, convert to deltas and close
/// the track.
fn finish_track(name: &'static [u8], mut events: Vec<TrackEvent<'static>>) -> Track<'static> {
    // note-offs first at a shared tick so back-to-back notes keep their length
    events.sort_by_key(|e| (e.delta.as_int(), is_note_on(e)));
    convert_to_delta_times(&mut events);

    let mut track = Vec::with_capacity(events.len() + 2);
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name)),
    });
    track.extend(events);
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn is_note_on(event: &TrackEvent) -> bool {
    matches!(
        event.kind,
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { .. },
            ..
        }
    )
}

fn convert_to_delta_times(events: &mut [TrackEvent]) {
    let mut prev_tick = 0u32;
    for event in events.iter_mut() {
        let current_tick = event.delta.as_int();
        event.delta = current_tick.saturating_sub(prev_tick).into();
        prev_tick = current_tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::{ChordExtension, ChordQuality};
    use crate::model::{ChordSpec, RepeatMark};
    use crate::settings::Settings;
    use crate::theory::Scale;

    fn song() -> Song {
        Song::new(&Settings {
            bars_per_line: 2,
            bpm: 100,
            ..Settings::default()
        })
    }

    fn c_major() -> ChordSpec {
        ChordSpec {
            root: "C".to_string(),
            quality: ChordQuality::Major,
            extension: ChordExtension::None,
            degree: Some(0),
        }
    }

    /// (absolute tick, channel, key, vel) of every note-on in a track.
    fn note_ons(track: &Track) -> Vec<(u32, u8, u8, u8)> {
        let mut tick = 0;
        let mut out = Vec::new();
        for event in track {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            } = event.kind
            {
                out.push((tick, channel.as_int(), key.as_int(), vel.as_int()));
            }
        }
        out
    }

    #[test]
    fn test_song_header_and_tempo() {
        let bytes = song_to_midi(&song()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(480.into()));
        // conductor + chords, no lanes
        assert_eq!(smf.tracks.len(), 2);
        assert!(smf.tracks[0].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 600_000
        )));
        assert!(smf.tracks[0].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8))
        )));
    }

    #[test]
    fn test_chord_track_uses_octave_three() {
        let mut song = song();
        song.insert_chord(0, 1, &c_major(), 4.0).unwrap();

        let bytes = song_to_midi(&song).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let ons = note_ons(&smf.tracks[1]);
        // the empty first bar is a rest, so the chord starts at beat 4
        assert_eq!(ons, vec![(1920, 0, 48, 80), (1920, 0, 52, 80), (1920, 0, 55, 80)]);
    }

    #[test]
    fn test_repeats_are_expanded() {
        let mut song = song();
        song.insert_chord(0, 0, &c_major(), 4.0).unwrap();
        song.set_repeat(0, 0, RepeatMark::Start, true).unwrap();
        song.set_repeat(0, 0, RepeatMark::End, true).unwrap();

        let bytes = song_to_midi(&song).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let roots: Vec<u32> = note_ons(&smf.tracks[1])
            .into_iter()
            .filter(|(_, _, key, _)| *key == 48)
            .map(|(tick, ..)| tick)
            .collect();
        assert_eq!(roots, vec![0, 1920]);
    }

    #[test]
    fn test_instrument_tracks() {
        let mut song = song();
        let piano = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
        let drums = song.add_lane(0, InstrumentId::Drumset, "C", Scale::Major).unwrap();
        song.insert_note(0, &piano, 0, 2, 2).unwrap();
        // drum rows follow the kit order: Kick first
        song.insert_note(0, &drums, 0, 4, 1).unwrap();

        let bytes = song_to_midi(&song).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 4);

        let piano_ons = note_ons(&smf.tracks[2]);
        assert_eq!(piano_ons.len(), 1);
        assert_eq!(piano_ons[0].0, 240);
        assert_eq!(piano_ons[0].1, 1);
        assert_eq!(piano_ons[0].3, MELODIC_VELOCITY);

        assert_eq!(note_ons(&smf.tracks[3]), vec![(480, 9, 36, 100)]);
    }

    #[test]
    fn test_single_instrument_export() {
        let mut song = song();
        let bass = song.add_lane(0, InstrumentId::AcousticBass, "C", Scale::Major).unwrap();
        let flute = song.add_lane(0, InstrumentId::Flute, "C", Scale::Major).unwrap();
        song.insert_note(0, &bass, 0, 0, 4).unwrap();
        song.insert_note(0, &flute, 0, 0, 4).unwrap();

        let bytes = instrument_to_midi(&song, InstrumentId::AcousticBass).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 2);
        let ons = note_ons(&smf.tracks[1]);
        assert_eq!(ons.len(), 1);
        assert_eq!(ons[0].1, 0);
        assert!(smf.tracks[1].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Midi { message: MidiMessage::ProgramChange { program }, .. } if program.as_int() == 32
        )));
    }

    #[test]
    fn test_back_to_back_notes_inserted_out_of_order() {
        let mut song = song();
        let piano = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
        song.insert_note(0, &piano, 5, 4, 4).unwrap();
        song.insert_note(0, &piano, 5, 0, 4).unwrap();

        let bytes = song_to_midi(&song).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let mut tick = 0;
        let mut keys = Vec::new();
        for event in &smf.tracks[2] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = event.kind {
                match message {
                    MidiMessage::NoteOn { .. } => keys.push((tick, "on")),
                    MidiMessage::NoteOff { .. } => keys.push((tick, "off")),
                    _ => {}
                }
            }
        }
        assert_eq!(keys, vec![(0, "on"), (480, "off"), (480, "on"), (960, "off")]);
    }

    #[test]
    fn test_delta_time_conversion() {
        let mut events: Vec<TrackEvent> = [0u32, 100, 100, 250]
            .into_iter()
            .map(|tick| TrackEvent {
                delta: tick.into(),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            })
            .collect();
        convert_to_delta_times(&mut events);
        let deltas: Vec<u32> = events.iter().map(|e| e.delta.as_int()).collect();
        assert_eq!(deltas, vec![0, 100, 0, 150]);
    }
}
