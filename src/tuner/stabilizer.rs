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

//! Turns jittery per-frame estimates into a steady reading.
//!
//! The last few estimates are voted on by their nearest note. Only a note that
//! wins enough votes is shown, at the average frequency of its voters. Silence
//! clears the reading, but only once it has lasted for a while.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use log::{debug, trace};

use super::{TunerConfig, TunerReading};
use crate::tuning::Tuning;

#[derive(Debug, Clone)]
pub struct Stabilizer {
    tuning: Tuning,
    history_size: usize,
    stable_count: usize,
    silence_clear: Duration,
    /// Recent estimates, oldest first. Silent frames are not recorded.
    history: VecDeque<f64>,
    /// When the current stretch of silence clears the reading.
    silence_deadline: Option<Duration>,
    current: Option<TunerReading>,
}

impl Stabilizer {
    pub fn new(config: &TunerConfig) -> Self {
        Self {
            tuning: config.tuning,
            history_size: config.history_size,
            stable_count: config.stable_count,
            silence_clear: config.silence_clear,
            history: VecDeque::with_capacity(config.history_size + 1),
            silence_deadline: None,
            current: None,
        }
    }

    /// The reading that is currently shown.
    pub fn current(&self) -> Option<&TunerReading> {
        self.current.as_ref()
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.history.clear();
        self.silence_deadline = None;
        self.current = None;
    }

    /// Clear the reading if silence has lasted past its deadline.
    /// Returns whether the reading was cleared.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.silence_deadline {
            Some(deadline) if now >= deadline => {
                debug!("silence, clearing tuner reading");
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Feed the estimate of the frame at `now`, `None` meaning no signal.
    /// Returns the reading if the frame produced a stable one.
    pub fn update(&mut self, estimate: Option<f64>, now: Duration) -> Option<TunerReading> {
        self.poll(now);

        let frequency = match estimate {
            Some(frequency) => frequency,
            None => {
                if self.silence_deadline.is_none() {
                    self.silence_deadline = Some(now + self.silence_clear);
                }
                return None;
            }
        };

        self.silence_deadline = None;
        self.history.push_back(frequency);
        while self.history.len() > self.history_size {
            self.history.pop_front();
        }
        if self.history.len() < self.stable_count {
            return None;
        }

        let tuning = self.tuning;
        let notes: Vec<Option<i32>> = self
            .history
            .iter()
            .map(|f| tuning.nearest_note(*f).map(|n| n.index()))
            .collect();

        // ties go to the lowest note
        let mut votes = BTreeMap::new();
        for note in notes.iter().flatten() {
            *votes.entry(*note).or_insert(0) += 1;
        }
        let mut winner: Option<(i32, usize)> = None;
        for (note, count) in votes {
            if winner.map_or(true, |(_, best)| count > best) {
                winner = Some((note, count));
            }
        }
        let (note, count) = winner?;
        if count < self.stable_count {
            trace!("no stable note yet, best is {} with {} votes", note, count);
            return None;
        }

        let (sum, matching) = self
            .history
            .iter()
            .zip(notes.iter())
            .filter(|(_, n)| **n == Some(note))
            .fold((0.0, 0), |(sum, n), (f, _)| (sum + f, n + 1));
        let reading = TunerReading::from_frequency(sum / matching as f64, &tuning)?;
        self.current = Some(reading.clone());
        Some(reading)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn stabilizer() -> Stabilizer {
        Stabilizer::new(&TunerConfig::default())
    }

    #[test]
    fn publishes_on_fifth_consistent_frame() {
        let mut s = stabilizer();
        let frames = [439.0, 441.0, 440.5, 439.5, 442.0];
        for (i, f) in frames[..4].iter().enumerate() {
            assert_eq!(s.update(Some(*f), ms(16 * i as u64)), None);
        }
        assert_eq!(s.current(), None);

        let reading = s.update(Some(frames[4]), ms(64)).unwrap();
        assert_eq!(reading.note_name, "A");
        assert_eq!(reading.octave, 4);
        assert_abs_diff_eq!(reading.frequency, 440.4);
        assert_eq!(s.current(), Some(&reading));
    }

    #[test]
    fn fewer_than_five_votes_publish_nothing() {
        let mut s = stabilizer();
        // alternating between A4 and A#4, four votes each
        for i in 0..8 {
            let f = if i % 2 == 0 { 440.0 } else { 466.16 };
            assert_eq!(s.update(Some(f), ms(i * 16)), None);
        }
    }

    #[test]
    fn only_matching_frames_are_averaged() {
        let mut s = stabilizer();
        for (i, f) in [440.0, 880.0, 442.0, 440.0, 438.0, 440.0].iter().enumerate() {
            s.update(Some(*f), ms(i as u64 * 16));
        }
        assert_abs_diff_eq!(s.current().unwrap().frequency, 440.0);
    }

    #[test]
    fn ties_go_to_the_lower_note() {
        let mut s = stabilizer();
        let frames = [
            466.16, 466.16, 466.16, 466.16, 466.16, 440.0, 440.0, 440.0, 440.0, 440.0,
        ];
        let mut last = None;
        for (i, f) in frames.iter().enumerate() {
            last = s.update(Some(*f), ms(i as u64 * 16));
        }
        assert_eq!(last.unwrap().note_name, "A");
    }

    #[test]
    fn short_silence_keeps_reading() {
        let mut s = stabilizer();
        for i in 0..5 {
            s.update(Some(440.0), ms(i * 16));
        }
        assert!(s.current().is_some());
        s.update(None, ms(100));
        s.update(None, ms(500));
        assert!(s.current().is_some());
        // signal resumes before the deadline and cancels it
        s.update(Some(440.0), ms(550));
        s.update(None, ms(700));
        assert!(!s.poll(ms(1100)));
        assert!(s.current().is_some());
    }

    #[test]
    fn long_silence_clears_reading_and_history() {
        let mut s = stabilizer();
        for i in 0..5 {
            s.update(Some(440.0), ms(i * 16));
        }
        s.update(None, ms(100));
        assert!(!s.poll(ms(599)));
        assert!(s.poll(ms(600)));
        assert_eq!(s.current(), None);
        // the history is gone, so it takes five frames again
        for i in 0..4 {
            assert_eq!(s.update(Some(440.0), ms(700 + i * 16)), None);
        }
        assert!(s.update(Some(440.0), ms(800)).is_some());
    }
}
