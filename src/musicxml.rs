//! MusicXML export.
//!
//! Writes a partwise score: part `P1` holds the chord symbols, lyrics and repeat
//! barlines, followed by one part per instrument used in any lane. Lines map to
//! systems, bars map to measures. Notes are taken from the lanes as written, so
//! repeats stay notated as barlines instead of being expanded.

use quick_xml::escape::escape;

use crate::chord::{ChordExtension, ChordQuality};
use crate::instruments::InstrumentId;
use crate::model::{Bar, ChordSegment, GridNote, NoteVoice, Song, SUBDIVISIONS_PER_BEAT};
use crate::theory::{key_fifths, Scale, Spelling};

/// Divisions per beat; one division is one grid column.
const DIVISIONS: usize = SUBDIVISIONS_PER_BEAT;

/// Convert a song to MusicXML.
pub fn to_musicxml(song: &Song) -> String {
    let instruments = lane_instruments(song);
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');
    xml.push_str(r#"<score-partwise version="4.0">"#);
    xml.push('\n');

    xml.push_str("  <identification>\n");
    xml.push_str("    <encoding>\n");
    xml.push_str(&format!(
        "      <software>songwriter {}</software>\n",
        env!("CARGO_PKG_VERSION")
    ));
    xml.push_str("    </encoding>\n");
    xml.push_str("  </identification>\n");

    xml.push_str("  <part-list>\n");
    xml.push_str("    <score-part id=\"P1\">\n");
    xml.push_str("      <part-name>Chords</part-name>\n");
    xml.push_str("    </score-part>\n");
    for (i, instrument) in instruments.iter().enumerate() {
        let id = i + 2;
        let name = escape(instrument.info().display_name);
        xml.push_str(&format!("    <score-part id=\"P{}\">\n", id));
        xml.push_str(&format!("      <part-name>{}</part-name>\n", name));
        xml.push_str(&format!("      <score-instrument id=\"P{}-I1\">\n", id));
        xml.push_str(&format!("        <instrument-name>{}</instrument-name>\n", name));
        xml.push_str("      </score-instrument>\n");
        xml.push_str("    </score-part>\n");
    }
    xml.push_str("  </part-list>\n");

    xml.push_str(&chord_part(song));
    for (i, instrument) in instruments.iter().enumerate() {
        xml.push_str(&instrument_part(song, *instrument, i + 2));
    }

    xml.push_str("</score-partwise>\n");
    xml
}

/// Distinct lane instruments in order of first appearance.
fn lane_instruments(song: &Song) -> Vec<InstrumentId> {
    let mut instruments = Vec::new();
    for lane in song.lines.iter().flat_map(|l| &l.melody_lines) {
        if !instruments.contains(&lane.instrument) {
            instruments.push(lane.instrument);
        }
    }
    instruments
}

fn chord_part(song: &Song) -> String {
    let mut xml = String::new();
    xml.push_str("  <part id=\"P1\">\n");

    let mut number = 1;
    for (line_index, line) in song.lines.iter().enumerate() {
        for (bar_index, bar) in line.bars.iter().enumerate() {
            xml.push_str(&format!("    <measure number=\"{}\">\n", number));
            if number > 1 && bar_index == 0 {
                xml.push_str("      <print new-system=\"yes\"/>\n");
            }
            if number == 1 {
                xml.push_str(&attributes(song, Clef::Treble));
            }
            if bar.repeat_start {
                xml.push_str(&repeat_barline(true));
            }

            let mut offset = 0.0;
            for chord in &bar.chords {
                xml.push_str(&harmony_to_xml(chord, offset));
                offset += chord.duration;
            }
            if !bar.lyrics.is_empty() {
                xml.push_str(&lyrics_to_xml(bar));
            }
            xml.push_str(&measure_rest(song.beats_per_bar()));

            if bar.repeat_end {
                xml.push_str(&repeat_barline(false));
            }
            xml.push_str("    </measure>\n");
            log::trace!("wrote chord measure {} (line {})", number, line_index);
            number += 1;
        }
    }

    xml.push_str("  </part>\n");
    xml
}

fn instrument_part(song: &Song, instrument: InstrumentId, part: usize) -> String {
    let mut xml = String::new();
    xml.push_str(&format!("  <part id=\"P{}\">\n", part));

    let cols_per_bar = song.columns_per_bar();
    let spelling = Spelling::for_key(&song.key);
    let mut number = 1;
    for line in &song.lines {
        let notes: Vec<&GridNote> = line
            .melody_lines
            .iter()
            .filter(|lane| lane.instrument == instrument)
            .flat_map(|lane| &lane.notes)
            .collect();

        for bar_index in 0..line.bars.len() {
            xml.push_str(&format!("    <measure number=\"{}\">\n", number));
            if number == 1 {
                xml.push_str(&attributes(song, Clef::for_instrument(instrument)));
            }

            let mut in_bar: Vec<&GridNote> = notes
                .iter()
                .copied()
                .filter(|n| cols_per_bar > 0 && n.col / cols_per_bar == bar_index)
                .collect();
            in_bar.sort_by_key(|n| (n.col, n.row));

            if in_bar.is_empty() {
                xml.push_str(&measure_rest(song.beats_per_bar()));
            } else {
                xml.push_str(&measure_notes(&in_bar, bar_index * cols_per_bar, cols_per_bar, spelling));
            }
            xml.push_str("    </measure>\n");
            number += 1;
        }
    }

    xml.push_str("  </part>\n");
    xml
}

/// Notes of one measure with rests filling the gaps. Notes starting together
/// form a chord; a note starting inside an earlier one cannot be notated in a
/// single voice and is dropped.
fn measure_notes(notes: &[&GridNote], bar_start: usize, cols_per_bar: usize, spelling: Spelling) -> String {
    let mut xml = String::new();
    let mut cursor = 0;
    let mut group_start = None;

    for note in notes {
        let start = note.col - bar_start;
        // notes never extend past their bar in notation
        let span = note.span.min(cols_per_bar - start);
        if group_start == Some(start) {
            xml.push_str(&note_to_xml(note, span, true, spelling));
            continue;
        }
        if start < cursor {
            log::debug!("dropping overlapping note {} from notation", note.id);
            continue;
        }
        if start > cursor {
            xml.push_str(&rest_to_xml(start - cursor));
        }
        xml.push_str(&note_to_xml(note, span, false, spelling));
        group_start = Some(start);
        cursor = start + span;
    }

    if cursor < cols_per_bar {
        xml.push_str(&rest_to_xml(cols_per_bar - cursor));
    }
    xml
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clef {
    Treble,
    Bass,
    Percussion,
}

impl Clef {
    fn for_instrument(instrument: InstrumentId) -> Self {
        match instrument {
            InstrumentId::Drumset => Clef::Percussion,
            InstrumentId::AcousticBass | InstrumentId::ElectricBass | InstrumentId::SynthBass => Clef::Bass,
            _ => Clef::Treble,
        }
    }

    fn sign_and_line(self) -> (&'static str, u8) {
        match self {
            Clef::Treble => ("G", 2),
            Clef::Bass => ("F", 4),
            Clef::Percussion => ("percussion", 2),
        }
    }
}

fn mode_name(scale: Scale) -> &'static str {
    match scale {
        Scale::Major => "major",
        Scale::Minor | Scale::HarmonicMinor | Scale::MelodicMinor => "minor",
        Scale::Dorian => "dorian",
        Scale::Phrygian => "phrygian",
        Scale::Lydian => "lydian",
        Scale::Mixolydian => "mixolydian",
        Scale::Locrian => "locrian",
        _ => "none",
    }
}

fn attributes(song: &Song, clef: Clef) -> String {
    let (sign, line) = clef.sign_and_line();
    let mut xml = String::new();
    xml.push_str("      <attributes>\n");
    xml.push_str(&format!("        <divisions>{}</divisions>\n", DIVISIONS));
    xml.push_str("        <key>\n");
    xml.push_str(&format!("          <fifths>{}</fifths>\n", key_fifths(&song.key)));
    xml.push_str(&format!("          <mode>{}</mode>\n", mode_name(song.scale)));
    xml.push_str("        </key>\n");
    xml.push_str("        <time>\n");
    xml.push_str(&format!("          <beats>{}</beats>\n", song.time_signature.beats));
    xml.push_str(&format!(
        "          <beat-type>{}</beat-type>\n",
        song.time_signature.beat_type
    ));
    xml.push_str("        </time>\n");
    xml.push_str("        <clef>\n");
    xml.push_str(&format!("          <sign>{}</sign>\n", sign));
    xml.push_str(&format!("          <line>{}</line>\n", line));
    xml.push_str("        </clef>\n");
    xml.push_str("      </attributes>\n");
    xml
}

fn repeat_barline(forward: bool) -> String {
    let (location, style, direction) = if forward {
        ("left", "heavy-light", "forward")
    } else {
        ("right", "light-heavy", "backward")
    };
    format!(
        "      <barline location=\"{}\">\n        <bar-style>{}</bar-style>\n        <repeat direction=\"{}\"/>\n      </barline>\n",
        location, style, direction
    )
}

/// MusicXML `kind` value for a quality/extension pair.
pub fn chord_kind(quality: ChordQuality, extension: ChordExtension) -> &'static str {
    use ChordExtension as E;
    match (quality, extension) {
        (ChordQuality::Minor, E::Seventh | E::MinorSeventh) => "minor-seventh",
        (ChordQuality::Minor, E::MajorSeventh) => "major-minor",
        (ChordQuality::Minor, E::Ninth | E::MinorNinth) => "minor-ninth",
        (ChordQuality::Minor, E::Eleventh) => "minor-11th",
        (ChordQuality::Minor, E::Thirteenth) => "minor-13th",
        (ChordQuality::Minor, _) => "minor",
        (ChordQuality::Diminished, E::Seventh | E::DiminishedSeventh) => "diminished-seventh",
        (ChordQuality::Diminished, E::MinorSeventh) => "half-diminished",
        (ChordQuality::Diminished, _) => "diminished",
        (ChordQuality::Augmented, E::Seventh) => "augmented-seventh",
        (ChordQuality::Augmented, _) => "augmented",
        (ChordQuality::Major, E::None) => "major",
        (ChordQuality::Major, E::Seventh) => "dominant",
        (ChordQuality::Major, E::MajorSeventh) => "major-seventh",
        (ChordQuality::Major, E::MinorSeventh) => "minor-seventh",
        (ChordQuality::Major, E::DiminishedSeventh) => "diminished-seventh",
        (ChordQuality::Major, E::Ninth) => "dominant-ninth",
        (ChordQuality::Major, E::MajorNinth) => "major-ninth",
        (ChordQuality::Major, E::MinorNinth) => "minor-ninth",
        (ChordQuality::Major, E::Eleventh) => "dominant-11th",
        (ChordQuality::Major, E::Thirteenth) => "dominant-13th",
        (ChordQuality::Major, E::Sus2) => "suspended-second",
        (ChordQuality::Major, E::Sus4) => "suspended-fourth",
    }
}

/// Split a spelled pitch class such as `Bb` into step and alter.
fn step_and_alter(name: &str) -> (char, i8) {
    let mut chars = name.chars();
    let step = chars.next().unwrap_or('C');
    let alter = match chars.next() {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    (step, alter)
}

fn harmony_to_xml(chord: &ChordSegment, offset_beats: f64) -> String {
    let (step, alter) = step_and_alter(&chord.root);
    let text = format!("{}{}", chord.quality.suffix(), chord.extension.suffix());

    let mut xml = String::new();
    xml.push_str("      <harmony>\n");
    xml.push_str("        <root>\n");
    xml.push_str(&format!("          <root-step>{}</root-step>\n", step));
    if alter != 0 {
        xml.push_str(&format!("          <root-alter>{}</root-alter>\n", alter));
    }
    xml.push_str("        </root>\n");
    let kind = chord_kind(chord.quality, chord.extension);
    if text.is_empty() {
        xml.push_str(&format!("        <kind>{}</kind>\n", kind));
    } else {
        xml.push_str(&format!("        <kind text=\"{}\">{}</kind>\n", escape(text.as_str()), kind));
    }
    let offset = beats_to_divisions(offset_beats);
    if offset > 0 {
        xml.push_str(&format!("        <offset>{}</offset>\n", offset));
    }
    xml.push_str("      </harmony>\n");
    xml
}

fn lyrics_to_xml(bar: &Bar) -> String {
    let mut xml = String::new();
    xml.push_str("      <direction placement=\"below\">\n");
    xml.push_str("        <direction-type>\n");
    xml.push_str(&format!("          <words>{}</words>\n", escape(bar.lyrics.as_str())));
    xml.push_str("        </direction-type>\n");
    xml.push_str("      </direction>\n");
    xml
}

fn measure_rest(beats_per_bar: usize) -> String {
    format!(
        "      <note>\n        <rest measure=\"yes\"/>\n        <duration>{}</duration>\n      </note>\n",
        beats_per_bar * DIVISIONS
    )
}

fn rest_to_xml(divisions: usize) -> String {
    let mut xml = String::new();
    xml.push_str("      <note>\n");
    xml.push_str("        <rest/>\n");
    xml.push_str(&format!("        <duration>{}</duration>\n", divisions));
    xml.push_str(&type_to_xml(divisions));
    xml.push_str("      </note>\n");
    xml
}

fn note_to_xml(note: &GridNote, divisions: usize, chord: bool, spelling: Spelling) -> String {
    let mut xml = String::new();
    xml.push_str("      <note>\n");
    if chord {
        xml.push_str("        <chord/>\n");
    }

    match &note.voice {
        NoteVoice::Midi { midi_note } => {
            let name = spelling.names()[(*midi_note % 12) as usize];
            let (step, alter) = step_and_alter(name);
            let octave = (*midi_note / 12) as i32 - 1;
            xml.push_str("        <pitch>\n");
            xml.push_str(&format!("          <step>{}</step>\n", step));
            if alter != 0 {
                xml.push_str(&format!("          <alter>{}</alter>\n", alter));
            }
            xml.push_str(&format!("          <octave>{}</octave>\n", octave));
            xml.push_str("        </pitch>\n");
        }
        NoteVoice::Drum { .. } => {
            xml.push_str("        <unpitched>\n");
            xml.push_str("          <display-step>C</display-step>\n");
            xml.push_str("          <display-octave>5</display-octave>\n");
            xml.push_str("        </unpitched>\n");
        }
    }

    xml.push_str(&format!("        <duration>{}</duration>\n", divisions));
    xml.push_str(&type_to_xml(divisions));
    if let NoteVoice::Drum { drum_name } = &note.voice {
        xml.push_str(&format!(
            "        <notations>\n          <technical>\n            <other-technical>{}</other-technical>\n          </technical>\n        </notations>\n",
            escape(drum_name.as_str())
        ));
    }
    xml.push_str("      </note>\n");
    xml
}

/// Note type and dot for a length in divisions; lengths without a single
/// notated value get no `<type>`.
fn type_to_xml(divisions: usize) -> String {
    let (name, dotted) = match divisions {
        16 => ("whole", false),
        12 => ("half", true),
        8 => ("half", false),
        6 => ("quarter", true),
        4 => ("quarter", false),
        3 => ("eighth", true),
        2 => ("eighth", false),
        1 => ("16th", false),
        _ => return String::new(),
    };
    let mut xml = format!("        <type>{}</type>\n", name);
    if dotted {
        xml.push_str("        <dot/>\n");
    }
    xml
}

fn beats_to_divisions(beats: f64) -> usize {
    (beats * DIVISIONS as f64).round().max(0.0) as usize
}
