use super::*;
use crate::chord::{ChordExtension, ChordQuality};
use crate::instruments::InstrumentId;
use crate::model::{ChordSpec, NoteVoice, RepeatMark, Song, TimeSignature, SUBDIVISIONS_PER_BEAT};
use crate::settings::Settings;
use crate::theory::Scale;

fn chord(root: &str) -> ChordSpec {
    ChordSpec {
        root: root.to_string(),
        quality: ChordQuality::Major,
        extension: ChordExtension::None,
        degree: Some(0),
    }
}

fn song_with_bars(bars_per_line: usize) -> Song {
    Song::new(&Settings {
        bars_per_line,
        ..Settings::default()
    })
}

fn names(sequence: &Sequence) -> Vec<String> {
    sequence
        .chords
        .iter()
        .map(|c| c.name().unwrap_or_else(|| "-".to_string()))
        .collect()
}

#[test]
fn test_no_repeat_total_duration() {
    let mut song = song_with_bars(4);
    song.add_line();
    song.insert_chord(0, 0, &chord("C"), 2.0).unwrap();
    song.insert_chord(0, 0, &chord("G"), 1.0).unwrap();
    song.insert_chord(1, 2, &chord("F"), 4.0).unwrap();

    let sequence = flatten_song(&song);
    assert_eq!(sequence.chord_beats(), 32.0);
    assert_eq!(names(&sequence), vec!["C", "G", "-", "-", "-", "-", "-", "-", "F", "-"]);
}

#[test]
fn test_two_bar_repeat() {
    let mut song = song_with_bars(2);
    song.insert_chord(0, 0, &chord("C"), 4.0).unwrap();
    song.set_repeat(0, 0, RepeatMark::Start, true).unwrap();
    song.set_repeat(0, 1, RepeatMark::End, true).unwrap();

    let sequence = flatten_song(&song);
    assert_eq!(names(&sequence), vec!["C", "-", "C", "-"]);
    assert_eq!(sequence.chord_beats(), 16.0);
    assert!(sequence.chords[1].is_rest());
    assert_eq!(sequence.chords[1].duration, 4.0);
}

#[test]
fn test_note_absolute_beat() {
    let mut song = song_with_bars(4);
    let lane = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
    song.insert_note(0, &lane, 0, 0, SUBDIVISIONS_PER_BEAT).unwrap();
    song.insert_note(0, &lane, 1, 22, 2).unwrap();

    let sequence = flatten_song(&song);
    assert_eq!(sequence.notes.len(), 2);
    assert_eq!(sequence.notes[0].beat, 0.0);
    assert_eq!(sequence.notes[0].duration, 1.0);
    // column 22 = bar 1, column 6 in bar
    assert_eq!(sequence.notes[1].beat, 5.5);
    assert_eq!(sequence.notes[1].duration, 0.5);
    assert_eq!(sequence.notes[1].instrument, InstrumentId::Piano);
    assert_eq!(sequence.notes[1].volume, 0.7);
}

#[test]
fn test_repeat_notes_second_pass_offset() {
    let mut song = song_with_bars(4);
    let lane = song.add_lane(0, InstrumentId::Drumset, "C", Scale::Major).unwrap();
    song.set_repeat(0, 1, RepeatMark::Start, true).unwrap();
    song.set_repeat(0, 2, RepeatMark::End, true).unwrap();
    song.insert_note(0, &lane, 0, 16, 1).unwrap(); // bar 1, beat 4
    song.insert_note(0, &lane, 1, 48, 1).unwrap(); // bar 3

    let sequence = flatten_song(&song);
    let beats: Vec<f64> = sequence.notes.iter().map(|n| n.beat).collect();
    assert_eq!(beats, vec![4.0, 12.0, 20.0]);
    assert_eq!(
        sequence.notes[0].voice,
        NoteVoice::Drum {
            drum_name: "Kick".to_string()
        }
    );
    assert_eq!(names(&sequence), vec!["-", "-", "-", "-", "-", "-"]);
    assert_eq!(sequence.total_beats(), 24.0);
}

#[test]
fn test_repeat_across_lines() {
    let mut song = song_with_bars(2);
    song.add_line();
    song.insert_chord(0, 1, &chord("A"), 4.0).unwrap();
    song.insert_chord(1, 0, &chord("B"), 4.0).unwrap();
    song.insert_chord(1, 1, &chord("E"), 4.0).unwrap();
    song.set_repeat(0, 1, RepeatMark::Start, true).unwrap();
    song.set_repeat(1, 0, RepeatMark::End, true).unwrap();

    let sequence = flatten_song(&song);
    assert_eq!(names(&sequence), vec!["-", "A", "B", "A", "B", "E"]);
}

#[test]
fn test_repeat_end_without_start_is_ignored() {
    let mut song = song_with_bars(2);
    song.insert_chord(0, 0, &chord("C"), 4.0).unwrap();
    song.set_repeat(0, 1, RepeatMark::End, true).unwrap();

    let sequence = flatten_song(&song);
    assert_eq!(names(&sequence), vec!["C", "-"]);
    assert_eq!(sequence.total_beats(), 8.0);
}

#[test]
fn test_unterminated_repeat_plays_once() {
    let mut song = song_with_bars(3);
    let lane = song.add_lane(0, InstrumentId::Flute, "C", Scale::Major).unwrap();
    song.insert_chord(0, 1, &chord("D"), 4.0).unwrap();
    song.set_repeat(0, 1, RepeatMark::Start, true).unwrap();
    song.insert_note(0, &lane, 0, 32, 4).unwrap();

    let sequence = flatten_song(&song);
    assert_eq!(names(&sequence), vec!["-", "D", "-"]);
    assert_eq!(sequence.notes.len(), 1);
    assert_eq!(sequence.notes[0].beat, 8.0);
}

#[test]
fn test_flatten_single_line_starts_at_zero() {
    let mut song = song_with_bars(2);
    song.add_line();
    let lane = song.add_lane(1, InstrumentId::AcousticBass, "E", Scale::Minor).unwrap();
    song.insert_note(1, &lane, 0, 4, 4).unwrap();

    let sequence = flatten_line(&song, 1).unwrap();
    assert_eq!(sequence.chords.len(), 2);
    assert_eq!(sequence.notes[0].beat, 1.0);
    assert!(flatten_line(&song, 2).is_err());
}

#[test]
fn test_bar_events() {
    let mut song = song_with_bars(2);
    song.insert_chord(0, 0, &chord("C"), 1.0).unwrap();
    song.insert_chord(0, 0, &chord("F"), 3.0).unwrap();

    let sequence = flatten_song(&song);
    assert_eq!(names(&sequence), vec!["C", "F", "-"]);

    let events = bar_events(&song, 0, 0).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].duration, 3.0);
    assert!(bar_events(&song, 0, 1).unwrap().is_empty());
}

#[test]
fn test_waltz_time() {
    let mut song = song_with_bars(2);
    song.set_time_signature(TimeSignature { beats: 3, beat_type: 4 });
    let lane = song.add_lane(0, InstrumentId::Piano, "C", Scale::Major).unwrap();
    song.insert_note(0, &lane, 0, 12, 4).unwrap(); // first column of bar 1

    let sequence = flatten_song(&song);
    assert_eq!(sequence.chord_beats(), 6.0);
    assert_eq!(sequence.notes[0].beat, 3.0);
}

#[test]
fn test_chord_starts() {
    let mut song = song_with_bars(2);
    song.insert_chord(0, 0, &chord("C"), 2.0).unwrap();
    song.insert_chord(0, 0, &chord("G"), 2.0).unwrap();

    let sequence = flatten_song(&song);
    let starts: Vec<f64> = sequence.chord_starts().map(|(beat, _)| beat).collect();
    assert_eq!(starts, vec![0.0, 2.0, 4.0]);
}

#[test]
fn test_locate_beat_folds_second_pass() {
    let mut song = song_with_bars(4);
    song.set_repeat(0, 1, RepeatMark::Start, true).unwrap();
    song.set_repeat(0, 2, RepeatMark::End, true).unwrap();

    // timeline: bar0 [0,4) bar1 [4,8) bar2 [8,12) bar1 [12,16) bar2 [16,20) bar3 [20,24)
    let at = |beat| locate_beat(&song, beat).map(|p| (p.line, p.bar, p.beat_in_line));
    assert_eq!(at(2.0), Some((0, 0, 2.0)));
    assert_eq!(at(9.0), Some((0, 2, 9.0)));
    assert_eq!(at(13.5), Some((0, 1, 5.5)));
    assert_eq!(at(17.0), Some((0, 2, 9.0)));
    assert_eq!(at(21.0), Some((0, 3, 13.0)));
    assert_eq!(at(24.0), None);
    assert_eq!(at(-1.0), None);
}

#[test]
fn test_locate_beat_second_line() {
    let mut song = song_with_bars(2);
    song.add_line();
    let position = locate_beat(&song, 9.0).unwrap();
    assert_eq!(position.line, 1);
    assert_eq!(position.bar, 0);
    assert_eq!(position.beat_in_line, 1.0);
}
