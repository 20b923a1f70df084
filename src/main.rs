use std::env;
use std::fs;
use std::io::Write;
use std::process;

use songwriter::document;
use songwriter::instruments::{instrument_notes, InstrumentId};
use songwriter::scheduler::{LogSink, PlaybackCallbacks, Scheduler, SystemClock};
use songwriter::theory::{scale_notes, Scale};
use songwriter::{Settings, Song};

const USAGE: &str = "Usage: songwriter <command> [args]

Commands:
  events <song>                       Print the flattened chord and note events as JSON
  midi <song> [out.mid]               Export a Standard MIDI File
  musicxml <song> [out.xml]           Export MusicXML
  chart <song>                        Print a plain-text chord chart
  notes <instrument> [key] [scale]    List the pitches an instrument can play
  play <song>                         Play through the logging sink in real time
  new [settings.yaml] [out.json]      Create an empty song document

Song documents are JSON, or YAML when the file ends in .yaml / .yml.
Set RUST_LOG=debug for more output.";

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];
    match command {
        "events" => events(rest),
        "midi" => midi(rest),
        "musicxml" => musicxml(rest),
        "chart" => chart(rest),
        "notes" => notes(rest),
        "play" => play(rest),
        "new" => new_song(rest),
        "-h" | "--help" | "help" => println!("{}", USAGE),
        other => {
            eprintln!("Unknown command '{}'\n\n{}", other, USAGE);
            process::exit(1);
        }
    }
}

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn load_song(args: &[String], usage: &str) -> Song {
    let Some(path) = args.first() else {
        fail(format!("Usage: songwriter {}", usage));
    };
    match document::load(path) {
        Ok(song) => song,
        Err(e) => fail(format!("Error reading song '{}': {}", path, e)),
    }
}

/// Write to the given path, or to stdout when none is given.
fn output(path: Option<&String>, bytes: &[u8], what: &str) {
    match path {
        Some(path) => {
            if let Err(e) = fs::write(path, bytes) {
                fail(format!("Error writing to '{}': {}", path, e));
            }
            eprintln!("Wrote {} to {}", what, path);
        }
        None => {
            let mut stdout = std::io::stdout();
            if let Err(e) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
                fail(format!("Error writing output: {}", e));
            }
        }
    }
}

fn events(args: &[String]) {
    let song = load_song(args, "events <song>");
    let sequence = songwriter::flatten_song(&song);
    match serde_json::to_string_pretty(&sequence) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(format!("Error serializing events: {}", e)),
    }
}

fn midi(args: &[String]) {
    let song = load_song(args, "midi <song> [out.mid]");
    match songwriter::midi::song_to_midi(&song) {
        Ok(bytes) => output(args.get(1), &bytes, "MIDI"),
        Err(e) => fail(format!("Export error: {}", e)),
    }
}

fn musicxml(args: &[String]) {
    let song = load_song(args, "musicxml <song> [out.xml]");
    let xml = songwriter::to_musicxml(&song);
    output(args.get(1), xml.as_bytes(), "MusicXML");
}

fn chart(args: &[String]) {
    let song = load_song(args, "chart <song>");
    print!("{}", songwriter::chart::to_chord_chart(&song));
}

fn notes(args: &[String]) {
    let Some(name) = args.first() else {
        let keys: Vec<&str> = InstrumentId::ALL.iter().map(|i| i.key()).collect();
        fail(format!(
            "Usage: songwriter notes <instrument> [key] [scale]\nInstruments: {}",
            keys.join(", ")
        ));
    };
    let Some(instrument) = InstrumentId::from_key(name) else {
        fail(format!("Unknown instrument '{}'", name));
    };
    let key = args.get(1).map(String::as_str).unwrap_or("C");
    let scale = match args.get(2) {
        Some(name) => match Scale::from_name(name) {
            Some(scale) => scale,
            None => fail(format!("Unknown scale '{}'", name)),
        },
        None => Scale::Major,
    };

    if instrument.is_drums() {
        for voice in instrument.info().drum_voices {
            println!("{:<12} GM {}", voice.name, voice.gm_note);
        }
        return;
    }
    for note in instrument_notes(instrument, &scale_notes(key, scale), key) {
        println!("{:<5} {}", note.display_name, note.midi);
    }
}

fn play(args: &[String]) {
    let song = load_song(args, "play <song>");
    let mut scheduler = Scheduler::new(SystemClock::default(), LogSink);
    let callbacks = PlaybackCallbacks::default().on_complete(|| eprintln!("Done"));
    scheduler.play_song(&song, callbacks);
    eprintln!(
        "Playing {:.1}s at {} bpm",
        scheduler.total_seconds(),
        song.bpm
    );
    scheduler.run();
}

fn new_song(args: &[String]) {
    let settings = match args.first() {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => fail(format!("Error reading settings '{}': {}", path, e)),
        },
        None => Settings::default(),
    };
    let song = Song::new(&settings);

    match args.get(1) {
        Some(path) => {
            if let Err(e) = document::save(&song, path) {
                fail(format!("Error writing to '{}': {}", path, e));
            }
            eprintln!("Wrote new song to {}", path);
        }
        None => match document::to_json(&song) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(format!("Error serializing song: {}", e)),
        },
    }
}
