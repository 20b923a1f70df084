//! # Playback Scheduler
//!
//! Turns a flattened [`Sequence`] into timed triggers for an audio collaborator.
//!
//! ## State Machine
//! `Idle → Playing → Idle`. [`Scheduler::play`] while playing stops the running
//! sequence first. [`Scheduler::stop`] drops every pending trigger and the
//! completion callback, and does nothing when already idle.
//!
//! ## Timing
//! - one beat lasts `60 / bpm` seconds
//! - a chord starts at the sum of the durations before it and is strummed, one
//!   string every 40 ms, in the chord voicing octave
//! - a note starts at `beat × seconds_per_beat`
//! - every trigger sounds for 95 % of its event length
//! - the run ends at the latest chord or note end; completion fires once then
//!
//! The scheduler is cooperative: it holds a queue ordered by start time and fires
//! due triggers each time [`Scheduler::poll`] is called. A trigger the sink
//! cannot play is logged and skipped.
//!
//! ## Example
//! ```rust
//! use songwriter::scheduler::{LogSink, ManualClock, PlaybackCallbacks, PlaybackState, Scheduler};
//! use songwriter::sequencer::flatten_song;
//! use songwriter::Song;
//!
//! let song = Song::default();
//! let mut scheduler = Scheduler::new(ManualClock::default(), LogSink);
//! scheduler.play(&flatten_song(&song), song.bpm, PlaybackCallbacks::default());
//!
//! scheduler.clock().advance(8.0); // 16 beats at 120 bpm
//! assert_eq!(scheduler.poll(), PlaybackState::Idle);
//! ```

use std::cell::Cell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::chord::CHORD_OCTAVE;
use crate::error::{SinkError, SongError};
use crate::instruments::InstrumentId;
use crate::model::{NoteVoice, Song};
use crate::sequencer::{bar_events, flatten_line, flatten_song, Sequence};

/// Delay between successive chord tones.
pub const STRUM_SECONDS: f64 = 0.04;
/// Fraction of an event's length that its trigger sounds.
pub const GATE: f64 = 0.95;
pub const DEFAULT_CHORD_VOLUME: f64 = 0.8;
/// Instrument used for chord accompaniment.
pub const CHORD_INSTRUMENT: InstrumentId = InstrumentId::AcousticGuitar;

const MAX_SLEEP: Duration = Duration::from_millis(20);

/// Monotonic time source in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock advanced by hand, for tests and offline rendering.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// A sound for the audio collaborator to start. Durations are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Note {
        midi: u8,
        instrument: InstrumentId,
        duration: f64,
        volume: f64,
    },
    Drum {
        voice: String,
        duration: f64,
        volume: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTrigger {
    /// Seconds after the start of the run.
    pub at: f64,
    pub trigger: Trigger,
}

/// Audio collaborator. Errors skip the single trigger.
pub trait AudioSink {
    fn trigger(&mut self, trigger: &Trigger) -> Result<(), SinkError>;

    /// Silence everything that is sounding.
    fn stop_all(&mut self) {}
}

/// Sink that only logs what would sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AudioSink for LogSink {
    fn trigger(&mut self, trigger: &Trigger) -> Result<(), SinkError> {
        match trigger {
            Trigger::Note { midi, instrument, duration, volume } => {
                log::info!("note {} on {:?} for {:.3}s at volume {:.2}", midi, instrument, duration, volume)
            }
            Trigger::Drum { voice, duration, volume } => {
                log::info!("drum {} for {:.3}s at volume {:.2}", voice, duration, volume)
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Callbacks for one run. Progress reports the current beat and never goes
/// backwards; completion fires at most once.
#[derive(Default)]
pub struct PlaybackCallbacks {
    pub on_progress: Option<Box<dyn FnMut(f64)>>,
    pub on_complete: Option<Box<dyn FnOnce()>>,
}

impl PlaybackCallbacks {
    pub fn on_progress(mut self, f: impl FnMut(f64) + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

/// Build the trigger queue for a sequence, ordered by start time.
pub fn schedule(sequence: &Sequence, bpm: u16, chord_volume: f64) -> Vec<ScheduledTrigger> {
    let seconds_per_beat = seconds_per_beat(bpm);
    let mut triggers = Vec::new();

    if chord_volume > 0.0 {
        for (beat, event) in sequence.chord_starts() {
            let Some(symbol) = &event.symbol else {
                continue;
            };
            let start = beat * seconds_per_beat;
            let duration = event.duration * seconds_per_beat * GATE;
            for (string, midi) in symbol.midi_notes(CHORD_OCTAVE).into_iter().enumerate() {
                triggers.push(ScheduledTrigger {
                    at: start + string as f64 * STRUM_SECONDS,
                    trigger: Trigger::Note {
                        midi,
                        instrument: CHORD_INSTRUMENT,
                        duration,
                        volume: chord_volume,
                    },
                });
            }
        }
    }

    for note in &sequence.notes {
        if note.volume <= 0.0 {
            continue;
        }
        let duration = note.duration * seconds_per_beat * GATE;
        let trigger = match &note.voice {
            NoteVoice::Midi { midi_note } => Trigger::Note {
                midi: *midi_note,
                instrument: note.instrument,
                duration,
                volume: note.volume,
            },
            NoteVoice::Drum { drum_name } => Trigger::Drum {
                voice: drum_name.clone(),
                duration,
                volume: note.volume,
            },
        };
        triggers.push(ScheduledTrigger {
            at: note.beat * seconds_per_beat,
            trigger,
        });
    }

    triggers.sort_by(|a, b| a.at.total_cmp(&b.at));
    triggers
}

pub fn seconds_per_beat(bpm: u16) -> f64 {
    60.0 / f64::from(bpm.max(1))
}

pub struct Scheduler<C: Clock, S: AudioSink> {
    clock: C,
    sink: S,
    state: PlaybackState,
    queue: VecDeque<ScheduledTrigger>,
    callbacks: PlaybackCallbacks,
    chord_volume: f64,
    start: f64,
    seconds_per_beat: f64,
    total_seconds: f64,
    last_progress: Option<f64>,
}

impl<C: Clock, S: AudioSink> Scheduler<C, S> {
    pub fn new(clock: C, sink: S) -> Self {
        Self {
            clock,
            sink,
            state: PlaybackState::Idle,
            queue: VecDeque::new(),
            callbacks: PlaybackCallbacks::default(),
            chord_volume: DEFAULT_CHORD_VOLUME,
            start: 0.0,
            seconds_per_beat: seconds_per_beat(120),
            total_seconds: 0.0,
            last_progress: None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn chord_volume(&self) -> f64 {
        self.chord_volume
    }

    /// Chord accompaniment volume, clamped to 0..=1. Zero mutes chords.
    pub fn set_chord_volume(&mut self, volume: f64) {
        self.chord_volume = volume.clamp(0.0, 1.0);
    }

    /// Total length of the current run in seconds.
    pub fn total_seconds(&self) -> f64 {
        self.total_seconds
    }

    /// Start playing a sequence, stopping any run in progress.
    pub fn play(&mut self, sequence: &Sequence, bpm: u16, callbacks: PlaybackCallbacks) {
        if self.is_playing() {
            self.stop();
        }

        self.seconds_per_beat = seconds_per_beat(bpm);
        let triggers = schedule(sequence, bpm, self.chord_volume);
        let last_trigger = triggers.last().map_or(0.0, |t| t.at);
        self.total_seconds = (sequence.total_beats() * self.seconds_per_beat).max(last_trigger);
        self.queue = triggers.into();
        self.callbacks = callbacks;
        self.last_progress = None;
        self.start = self.clock.now();
        self.state = PlaybackState::Playing;

        log::debug!(
            "playing {} triggers over {:.2}s at {} bpm",
            self.queue.len(),
            self.total_seconds,
            bpm
        );
        self.poll();
    }

    /// Play the whole song at its own tempo.
    pub fn play_song(&mut self, song: &Song, callbacks: PlaybackCallbacks) {
        self.play(&flatten_song(song), song.bpm, callbacks);
    }

    /// Play one line on its own, starting from its first bar.
    pub fn play_line(&mut self, song: &Song, line: usize, callbacks: PlaybackCallbacks) -> Result<(), SongError> {
        let sequence = flatten_line(song, line)?;
        self.play(&sequence, song.bpm, callbacks);
        Ok(())
    }

    /// Audition the chords of a single bar. Lane notes and trailing rests are
    /// left out.
    pub fn play_bar(
        &mut self,
        song: &Song,
        line: usize,
        bar: usize,
        callbacks: PlaybackCallbacks,
    ) -> Result<(), SongError> {
        let sequence = Sequence {
            chords: bar_events(song, line, bar)?,
            notes: Vec::new(),
        };
        self.play(&sequence, song.bpm, callbacks);
        Ok(())
    }

    /// Fire every due trigger, report progress and complete the run when its
    /// end is reached. Returns the state after polling.
    pub fn poll(&mut self) -> PlaybackState {
        if !self.is_playing() {
            return self.state;
        }
        let elapsed = self.clock.now() - self.start;

        while self.queue.front().is_some_and(|t| t.at <= elapsed) {
            let Some(due) = self.queue.pop_front() else {
                break;
            };
            if let Err(e) = self.sink.trigger(&due.trigger) {
                log::warn!("Skipping trigger at {:.3}s: {}", due.at, e);
            }
        }

        let beat = elapsed.clamp(0.0, self.total_seconds) / self.seconds_per_beat;
        if self.last_progress.map_or(true, |last| beat > last) {
            self.last_progress = Some(beat);
            if let Some(on_progress) = &mut self.callbacks.on_progress {
                on_progress(beat);
            }
        }

        if elapsed >= self.total_seconds {
            self.state = PlaybackState::Idle;
            self.queue.clear();
            let callbacks = std::mem::take(&mut self.callbacks);
            log::debug!("playback complete");
            if let Some(on_complete) = callbacks.on_complete {
                on_complete();
            }
        }
        self.state
    }

    /// Cancel the current run. Pending triggers and the completion callback
    /// are dropped.
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.queue.clear();
        self.callbacks = PlaybackCallbacks::default();
        self.sink.stop_all();
        self.state = PlaybackState::Idle;
        log::debug!("playback stopped");
    }

    /// Seconds until the next trigger or the end of the run.
    fn next_deadline(&self) -> f64 {
        let elapsed = self.clock.now() - self.start;
        let next = self.queue.front().map_or(self.total_seconds, |t| t.at);
        (next - elapsed).max(0.0)
    }

    /// Poll until the run ends, sleeping between deadlines.
    pub fn run(&mut self) {
        while self.poll() == PlaybackState::Playing {
            let wait = Duration::from_secs_f64(self.next_deadline()).min(MAX_SLEEP);
            std::thread::sleep(wait);
        }
    }
}
