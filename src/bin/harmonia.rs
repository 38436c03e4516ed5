// harmonia -- chord progression playback and tuning
// Copyright (C) 2021  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! `harmonia` plays chord progressions through sox and tunes instruments
//! from the microphone.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use structopt::StructOpt;
use uuid::Uuid;

use harmonia::chord;
use harmonia::graph::ContextConfig;
use harmonia::history::HistoryStore;
use harmonia::instrument::Timbre;
use harmonia::output::{AudioSink, GainSink, SoxSink, SoxTarget};
use harmonia::play::Player;
use harmonia::progression::{Melody, Progression};
use harmonia::sequencer::Settings;
use harmonia::tuner::capture::{CaptureError, CaptureSource, SoxCapture};
use harmonia::tuner::{Tuner, TunerConfig, TunerReading};
use harmonia::tuning::Tuning;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Debug, StructOpt)]
#[structopt(name = "harmonia", about = "Chord progression playback and tuning")]
struct Opt {
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// File holding the saved progressions.
    #[structopt(long, parse(from_os_str), default_value = "harmonia-history.json")]
    store: PathBuf,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Play a chord progression.
    Play(PlayOpt),
    /// Show the notes of chord symbols.
    Chord {
        #[structopt(required = true)]
        symbols: Vec<String>,
    },
    /// Show the pitch of the microphone input or of an audio file.
    Tune(TuneOpt),
    /// Inspect the saved progressions.
    History(HistoryCommand),
}

#[derive(Debug, StructOpt)]
struct PlayOpt {
    /// Chord symbols such as C, Am7 or F#dim.
    chords: Vec<String>,

    /// Play a saved progression instead.
    #[structopt(long)]
    history_id: Option<String>,

    #[structopt(short, long, default_value = "120")]
    tempo: u32,

    /// synth or piano
    #[structopt(long, default_value = "piano")]
    timbre: Timbre,

    #[structopt(long)]
    arpeggio: bool,

    #[structopt(long)]
    metronome: bool,

    #[structopt(long)]
    drums: bool,

    /// Number of passes through the progression.
    #[structopt(short, long, default_value = "1")]
    repeat: u32,

    /// Melody played on top, e.g. "C4 E4 G4 B4".
    #[structopt(long)]
    melody: Option<String>,

    /// Output file (any sox-supported format). Music is played directly if not given.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Seed for the drums and melody timing.
    #[structopt(long)]
    seed: Option<u64>,

    /// Save the progression after playing it.
    #[structopt(long)]
    save: bool,

    /// Output volume.
    #[structopt(short, long, default_value = "1.0")]
    gain: f64,
}

#[derive(Debug, StructOpt)]
struct TuneOpt {
    /// Audio file to analyse. The microphone is used if not given.
    #[structopt(short, long, parse(from_os_str))]
    input: Option<PathBuf>,

    /// Stop after this many seconds.
    #[structopt(short, long)]
    seconds: Option<f64>,

    #[structopt(long, default_value = "44100")]
    rate: u32,

    /// Frequency of A4.
    #[structopt(long, default_value = "440")]
    reference: f64,
}

#[derive(Debug, StructOpt)]
enum HistoryCommand {
    /// List the saved progressions.
    List,
    /// Remove a saved progression.
    Delete { id: String },
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let level = match opt.verbose {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    simple_logger::init_with_level(level)?;

    match opt.command {
        Command::Play(play_opt) => play(play_opt, &opt.store),
        Command::Chord { symbols } => {
            show_chords(&symbols);
            Ok(())
        }
        Command::Tune(tune_opt) => tune(tune_opt),
        Command::History(command) => history(command, &opt.store),
    }
}

fn play(opt: PlayOpt, store_path: &Path) -> Result<()> {
    let mut store = HistoryStore::open(store_path);
    let mut progression = match &opt.history_id {
        Some(id) => store
            .get(id)
            .cloned()
            .ok_or_else(|| format!("no saved progression with id {}", id))?,
        None if opt.chords.is_empty() => return Err("no chords given".into()),
        None => Progression::from_chords(&Uuid::new_v4().to_string(), opt.chords.iter().cloned()),
    };
    if let Some(melody) = &opt.melody {
        progression = progression.with_melody(Melody {
            notes: melody.split_whitespace().map(String::from).collect(),
            style: "Simple".to_string(),
            tips: String::new(),
        });
    }

    let settings = Settings {
        tempo_bpm: opt.tempo,
        looping: opt.repeat > 1,
        arpeggio: opt.arpeggio,
        metronome: opt.metronome,
        drums: opt.drums,
        timbre: opt.timbre,
    };
    if settings.tempo() != settings.tempo_bpm {
        warn!("tempo {} is out of range, using {}", settings.tempo_bpm, settings.tempo());
    }

    let config = ContextConfig::default();
    let mut player = Player::new(config, opt.seed);
    player.set_settings(settings);
    if !player.toggle_play(&progression) {
        return Err("audio output is not available".into());
    }
    info!("playing {}", progression.chords.join(" - "));

    let target = match &opt.output {
        Some(path) => SoxTarget::File(path),
        None => SoxTarget::Play,
    };
    let mut sink = GainSink::new(SoxSink::new(config.sample_rate, target)?, opt.gain);
    player.play_to_sink(&mut sink, Some(opt.repeat.max(1)))?;
    sink.finish()?;

    if opt.save && !store.is_saved(&progression.id) {
        store.toggle_saved(&progression, now_ms())?;
        println!("saved as {}", progression.id);
    }
    Ok(())
}

fn show_chords(symbols: &[String]) {
    let tuning = Tuning::default();
    for symbol in symbols {
        let notes = chord::resolve(symbol);
        if notes.is_empty() {
            println!("{}: not a chord", symbol);
            continue;
        }
        let described: Vec<String> = notes
            .iter()
            .map(|note| format!("{} ({:.2} Hz)", note, tuning.frequency(*note)))
            .collect();
        println!("{}: {}", symbol, described.join(" "));
    }
}

fn tune(opt: TuneOpt) -> Result<()> {
    let config = TunerConfig {
        tuning: Tuning {
            reference_frequency: opt.reference,
            ..Tuning::default()
        },
        ..TunerConfig::default()
    };
    let frames_per_second = config.frames_per_second;
    let mut tuner = Tuner::new(config);

    let rate = opt.rate;
    let input = opt.input.clone();
    let listening = tuner.start_listening(move || {
        let capture = match &input {
            Some(path) => SoxCapture::file(path, rate)?,
            None => SoxCapture::microphone(rate)?,
        };
        Ok(Box::new(capture) as Box<dyn CaptureSource>)
    });
    if !listening {
        let message = tuner.error().unwrap_or("could not open audio input");
        return Err(message.to_string().into());
    }

    let max_frames = opt
        .seconds
        .map(|seconds| (seconds * f64::from(frames_per_second)).ceil() as u64);
    let mut frames = 0;
    let mut shown: Option<TunerReading> = None;
    while max_frames.map_or(true, |max| frames < max) {
        match tuner.process_frame() {
            Ok(_) => {}
            Err(CaptureError::EndOfStream) => break,
            Err(err) => return Err(err.into()),
        }
        frames += 1;

        let current = tuner.reading().cloned();
        if current != shown {
            match &current {
                Some(reading) if reading.in_tune() => println!("{} (in tune)", reading),
                Some(reading) => println!("{}", reading),
                None => println!("-"),
            }
            shown = current;
        }
    }
    tuner.stop_listening();
    Ok(())
}

fn history(command: HistoryCommand, store_path: &Path) -> Result<()> {
    let mut store = HistoryStore::open(store_path);
    match command {
        HistoryCommand::List => {
            for progression in store.entries() {
                println!(
                    "{}  {}  [{}]  {}",
                    progression.id,
                    progression.key,
                    progression.chords.join(" - "),
                    progression.mood
                );
            }
        }
        HistoryCommand::Delete { id } => {
            if !store.delete(&id)? {
                return Err(format!("no saved progression with id {}", id).into());
            }
        }
    }
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
