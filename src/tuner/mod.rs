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

//! Pitch detection on a live input stream.
//!
//! A `Tuner` reads the input in small hops, keeps a sliding analysis window
//! over the most recent samples and runs the autocorrelation detector on it
//! once per hop. The `Stabilizer` turns the resulting estimates into the
//! reading that is actually displayed.

pub mod capture;
pub mod detect;
pub mod stabilizer;

use std::fmt;
use std::time::Duration;

use log::{debug, error, info};

use crate::note::Note;
use crate::tuning::Tuning;
use crate::util;
use capture::{CaptureError, CaptureSource};
use detect::PitchDetector;
use stabilizer::Stabilizer;

/// Readings closer than this many cents to the ideal frequency count as in tune.
pub const IN_TUNE_CENTS: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct TunerConfig {
    /// Number of samples the detector looks at.
    pub window_size: usize,
    /// How often the window is analysed.
    pub frames_per_second: u32,
    pub noise_floor: f64,
    pub confidence: f64,
    /// Number of recent estimates taking part in the vote.
    pub history_size: usize,
    /// Votes a note needs before it is shown.
    pub stable_count: usize,
    /// How long the input must be silent before the reading is cleared.
    pub silence_clear: Duration,
    pub tuning: Tuning,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            frames_per_second: 60,
            noise_floor: detect::NOISE_FLOOR,
            confidence: detect::CONFIDENCE,
            history_size: 10,
            stable_count: 5,
            silence_clear: Duration::from_millis(500),
            tuning: Tuning::default(),
        }
    }
}

/// What the tuner displays.
#[derive(Debug, Clone, PartialEq)]
pub struct TunerReading {
    pub note: Note,
    pub note_name: &'static str,
    pub octave: i32,
    /// Measured frequency in Hz, rounded to two decimals.
    pub frequency: f64,
    /// Frequency of `note` under the tuning, rounded to two decimals.
    pub ideal_frequency: f64,
    /// Deviation from the ideal frequency, rounded to one decimal.
    pub cents: f64,
}

impl TunerReading {
    /// The reading for a measured frequency, `None` if it is not a valid frequency.
    ///
    /// ```
    /// use harmonia::tuner::TunerReading;
    /// use harmonia::tuning::Tuning;
    ///
    /// let reading = TunerReading::from_frequency(261.0, &Tuning::default()).unwrap();
    /// assert_eq!(reading.to_string(), "C4 261.00 Hz -4.1 cents");
    /// assert!(reading.in_tune());
    /// ```
    pub fn from_frequency(frequency: f64, tuning: &Tuning) -> Option<Self> {
        let note = tuning.nearest_note(frequency)?;
        let ideal = tuning.frequency(note);
        Some(Self {
            note,
            note_name: note.pitch_class().name(),
            octave: note.octave(),
            frequency: util::round_to(frequency, 2),
            ideal_frequency: util::round_to(ideal, 2),
            cents: util::round_to(tuning.cents_deviation(frequency)?, 1),
        })
    }

    pub fn in_tune(&self) -> bool {
        self.cents.abs() < IN_TUNE_CENTS
    }
}

impl fmt::Display for TunerReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {:.2} Hz {:+.1} cents",
            self.note_name, self.octave, self.frequency, self.cents
        )
    }
}

/// Everything that only exists while listening. Dropping it releases the input.
struct Listening {
    capture: Box<dyn CaptureSource>,
    window: Vec<f64>,
    hop: Vec<f64>,
    samples_read: u64,
}

pub struct Tuner {
    config: TunerConfig,
    detector: PitchDetector,
    stabilizer: Stabilizer,
    listening: Option<Listening>,
    error: Option<String>,
}

impl Tuner {
    pub fn new(config: TunerConfig) -> Self {
        Self {
            detector: PitchDetector::new(config.noise_floor, config.confidence),
            stabilizer: Stabilizer::new(&config),
            config,
            listening: None,
            error: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.is_some()
    }

    /// The message of the last failure to start listening.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The reading currently on display.
    pub fn reading(&self) -> Option<&TunerReading> {
        self.stabilizer.current()
    }

    /// Acquire an input with `open` and start listening to it.
    /// Returns whether the tuner is listening afterwards.
    pub fn start_listening<F>(&mut self, open: F) -> bool
    where
        F: FnOnce() -> Result<Box<dyn CaptureSource>, CaptureError>,
    {
        if self.listening.is_some() {
            return true;
        }
        self.error = None;
        let capture = match open() {
            Ok(capture) => capture,
            Err(err) => {
                error!("failed to open audio input: {}", err);
                self.error = Some(
                    "Microphone access denied. Please allow microphone access in your settings."
                        .to_string(),
                );
                return false;
            }
        };

        let sample_rate = capture.sample_rate();
        let hop = ((sample_rate / self.config.frames_per_second.max(1)) as usize)
            .max(1)
            .min(self.config.window_size);
        info!(
            "listening at {} Hz, analysing {} samples every {} samples",
            sample_rate, self.config.window_size, hop
        );
        self.listening = Some(Listening {
            capture,
            window: vec![0.0; self.config.window_size],
            hop: vec![0.0; hop],
            samples_read: 0,
        });
        true
    }

    /// Read the next hop of input and analyse the window ending there.
    /// Returns a reading if this frame published one. Stops listening when
    /// the input fails or ends.
    pub fn process_frame(&mut self) -> Result<Option<TunerReading>, CaptureError> {
        let listening = match self.listening.as_mut() {
            Some(listening) => listening,
            None => return Ok(None),
        };

        if let Err(err) = listening.capture.read(&mut listening.hop) {
            debug!("audio input stopped: {}", err);
            self.stop_listening();
            return Err(err);
        }

        let hop_len = listening.hop.len();
        let window_len = listening.window.len();
        listening.window.copy_within(hop_len.., 0);
        listening.window[window_len - hop_len..].copy_from_slice(&listening.hop);
        listening.samples_read += hop_len as u64;

        let sample_rate = f64::from(listening.capture.sample_rate());
        let now = Duration::from_secs_f64(listening.samples_read as f64 / sample_rate);
        let estimate = self.detector.estimate(&listening.window, sample_rate);
        Ok(self.stabilizer.update(estimate, now))
    }

    /// Release the input and forget the reading.
    pub fn stop_listening(&mut self) {
        if self.listening.take().is_some() {
            info!("stopped listening");
        }
        self.stabilizer.reset();
    }
}

impl Drop for Tuner {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use capture::SampleCapture;
    use std::f64::consts::PI;

    fn tone_then_silence(frequency: f64, seconds: f64, silence: f64) -> Vec<f64> {
        let sample_rate = 44100.0;
        let tone = (seconds * sample_rate) as usize;
        let total = ((seconds + silence) * sample_rate) as usize;
        (0..total)
            .map(|i| {
                if i < tone {
                    0.5 * (2.0 * PI * frequency * i as f64 / sample_rate).sin()
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn reading_follows_the_input() {
        let samples = tone_then_silence(440.0, 1.0, 1.0);
        let mut tuner = Tuner::new(TunerConfig::default());
        assert!(tuner.start_listening(|| Ok(Box::new(SampleCapture::new(samples, 44100)))));
        assert!(tuner.is_listening());

        // one second of tone is 60 frames
        let mut published = Vec::new();
        for _ in 0..60 {
            if let Some(reading) = tuner.process_frame().unwrap() {
                published.push(reading);
            }
        }
        assert!(!published.is_empty());
        let reading = tuner.reading().unwrap();
        assert_eq!(reading.note_name, "A");
        assert_eq!(reading.octave, 4);
        assert!((reading.frequency - 440.0).abs() < 5.0, "{}", reading);

        for _ in 0..59 {
            tuner.process_frame().unwrap();
        }
        assert_eq!(tuner.reading(), None);

        // the samples run out eventually
        let mut result = Ok(None);
        for _ in 0..5 {
            result = tuner.process_frame();
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(CaptureError::EndOfStream)));
        assert!(!tuner.is_listening());
    }

    #[test]
    fn failing_to_open_leaves_tuner_idle() {
        let mut tuner = Tuner::new(TunerConfig::default());
        assert!(!tuner.start_listening(|| Err(CaptureError::EndOfStream)));
        assert!(!tuner.is_listening());
        assert!(tuner.error().unwrap().starts_with("Microphone access denied"));
        assert_eq!(tuner.process_frame().unwrap(), None);
    }

    #[test]
    fn stopping_clears_reading() {
        let samples = tone_then_silence(440.0, 0.5, 0.0);
        let mut tuner = Tuner::new(TunerConfig::default());
        tuner.start_listening(|| Ok(Box::new(SampleCapture::new(samples, 44100))));
        for _ in 0..20 {
            tuner.process_frame().unwrap();
        }
        assert!(tuner.reading().is_some());
        tuner.stop_listening();
        assert_eq!(tuner.reading(), None);
        assert!(!tuner.is_listening());
    }

    #[test]
    fn reading_display() {
        let reading = TunerReading::from_frequency(440.0 * 1.01, &Tuning::default()).unwrap();
        assert_eq!(reading.cents, 17.2);
        assert_eq!(reading.ideal_frequency, 440.0);
        assert!(!reading.in_tune());
        assert_eq!(reading.to_string(), "A4 444.40 Hz +17.2 cents");
    }
}
