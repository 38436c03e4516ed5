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

//! Starting, stopping and timing the playback of one progression.

use log::{debug, info, warn};
use rand::Rng;

use crate::progression::Progression;
use crate::sequencer::{Effect, Session, Settings};

/// Periodic timer on the sample clock. Fire times are kept as fractional
/// sample positions so that rounding errors do not accumulate.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Timer {
    interval: f64,
    next_fire: f64,
}

impl Timer {
    fn samples_until(&self, now: u64) -> u64 {
        (self.next_fire.ceil() as u64).saturating_sub(now)
    }

    fn fire(&mut self) {
        self.next_fire += self.interval;
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Stopped,
    Running { session: Session, timer: Timer },
}

/// What the UI should currently show as playing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Highlight {
    pub chord: Option<usize>,
    pub melody_note: Option<usize>,
}

pub struct Transport {
    progression: Progression,
    settings: Settings,
    sample_rate: f64,
    state: State,
    highlight: Highlight,
}

impl Transport {
    pub fn new(progression: Progression, settings: Settings, sample_rate: f64) -> Self {
        Self {
            progression,
            settings,
            sample_rate,
            state: State::Stopped,
            highlight: Highlight::default(),
        }
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// The playback session, only present while running.
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            State::Running { session, .. } => Some(session),
            State::Stopped => None,
        }
    }

    pub fn highlight(&self) -> Highlight {
        self.highlight
    }

    fn interval(&self) -> f64 {
        self.settings.tick_seconds() * self.sample_rate
    }

    /// Start playing from the beginning, with the first tick due at `now`.
    /// Does nothing if already running. Progressions without chords cannot be played.
    pub fn start(&mut self, now: u64) -> bool {
        if self.is_running() {
            return true;
        }
        if self.progression.chords.is_empty() {
            warn!("not playing {:?}, it has no chords", self.progression.id);
            return false;
        }
        info!(
            "playing {:?} at {} bpm",
            self.progression.id,
            self.settings.tempo()
        );
        self.state = State::Running {
            session: Session::start(&self.progression),
            timer: Timer {
                interval: self.interval(),
                next_fire: now as f64,
            },
        };
        self.highlight = Highlight {
            chord: Some(0),
            melody_note: None,
        };
        true
    }

    /// Stop playing, forgetting the position. Does nothing if already stopped.
    pub fn stop(&mut self) {
        if self.is_running() {
            info!("stopped {:?}", self.progression.id);
        }
        self.state = State::Stopped;
        self.highlight = Highlight::default();
    }

    /// Returns whether the transport is running afterwards.
    pub fn toggle(&mut self, now: u64) -> bool {
        if self.is_running() {
            self.stop();
            false
        } else {
            self.start(now)
        }
    }

    /// Restart the timer for the new settings, keeping the position.
    /// The next tick is one (new) interval away.
    pub fn set_settings(&mut self, settings: Settings, now: u64) {
        self.settings = settings;
        let interval = self.interval();
        if let State::Running { timer, .. } = &mut self.state {
            debug!("restarting timer at {:.1} samples per tick", interval);
            *timer = Timer {
                interval,
                next_fire: now as f64 + interval,
            };
        }
    }

    /// Replace the progression as a whole. While running, the position is kept
    /// if it still exists in the new progression, otherwise playback restarts
    /// at its beginning. The timer is restarted like for changed settings.
    pub fn set_progression(&mut self, progression: Progression, now: u64) {
        self.progression = progression;
        if self.progression.chords.is_empty() {
            self.stop();
            return;
        }
        if let State::Running { session, .. } = &mut self.state {
            session.reload(&self.progression);
        }
        self.set_settings(self.settings, now);
    }

    /// Number of samples from `now` until the next tick is due, if running.
    pub fn samples_until_tick(&self, now: u64) -> Option<u64> {
        match &self.state {
            State::Running { timer, .. } => Some(timer.samples_until(now)),
            State::Stopped => None,
        }
    }

    /// Carry out one tick and schedule the next one. Returns what should be
    /// played. The transport stops by itself when the progression ends.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> Vec<Effect> {
        let effects = match &mut self.state {
            State::Running { session, timer } => {
                timer.fire();
                session.advance(&self.progression, &self.settings, rng)
            }
            State::Stopped => return Vec::new(),
        };

        for effect in effects.iter() {
            match effect {
                Effect::HighlightChord(index) => self.highlight.chord = Some(*index),
                Effect::HighlightMelodyNote(index) => self.highlight.melody_note = Some(*index),
                Effect::Stop => self.stop(),
                _ => {}
            }
        }
        effects
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn transport(chords: &[&str]) -> Transport {
        let progression = Progression::from_chords("p", chords.iter().copied());
        Transport::new(progression, Settings::default(), 44100.0)
    }

    #[test]
    fn start_then_stop_resets_everything() {
        let mut t = transport(&["C", "G"]);
        assert!(t.start(0));
        t.stop();
        assert!(!t.is_running());
        assert_eq!(t.session(), None);
        assert_eq!(t.highlight(), Highlight::default());
        assert_eq!(t.samples_until_tick(0), None);
        assert!(t.tick(&mut Pcg32::seed_from_u64(0)).is_empty());
    }

    #[test]
    fn first_tick_is_immediate() {
        let mut t = transport(&["C"]);
        let mut rng = Pcg32::seed_from_u64(0);
        t.start(1000);
        assert_eq!(t.samples_until_tick(1000), Some(0));
        let effects = t.tick(&mut rng);
        assert!(effects.iter().any(|e| matches!(e, Effect::PlayChord { .. })));
        // 120 bpm, two ticks per beat
        assert_eq!(t.samples_until_tick(1000), Some(11025));
        assert_eq!(t.highlight().chord, Some(0));
    }

    #[test]
    fn starting_twice_keeps_position() {
        let mut t = transport(&["C"]);
        let mut rng = Pcg32::seed_from_u64(0);
        t.start(0);
        t.tick(&mut rng);
        t.tick(&mut rng);
        assert!(t.start(50000));
        assert_eq!(t.session().unwrap().tick(), 2);
        assert_eq!(t.samples_until_tick(0), Some(22050));
    }

    #[test]
    fn empty_progression_does_not_start() {
        let mut t = transport(&[]);
        assert!(!t.start(0));
        assert!(!t.toggle(0));
        assert!(!t.is_running());
    }

    #[test]
    fn settings_change_keeps_tick() {
        let mut t = transport(&["C", "G"]);
        let mut rng = Pcg32::seed_from_u64(0);
        t.start(0);
        for _ in 0..3 {
            t.tick(&mut rng);
        }
        let settings = Settings {
            tempo_bpm: 60,
            ..Settings::default()
        };
        t.set_settings(settings, 30000);
        assert_eq!(t.session().unwrap().tick(), 3);
        assert_eq!(t.samples_until_tick(30000), Some(22050));
    }

    #[test]
    fn shorter_progression_restarts() {
        let mut t = transport(&["C", "F", "G"]);
        let mut rng = Pcg32::seed_from_u64(0);
        t.start(0);
        for _ in 0..20 {
            t.tick(&mut rng);
        }
        t.set_progression(Progression::from_chords("p", vec!["Am", "Dm"]), 0);
        assert!(t.is_running());
        assert_eq!(t.session().unwrap().tick(), 0);
        let effects = t.tick(&mut rng);
        assert_eq!(effects[0], Effect::HighlightChord(0));

        t.set_progression(Progression::from_chords("p", Vec::<String>::new()), 0);
        assert!(!t.is_running());
    }

    #[test]
    fn stops_at_end_without_looping() {
        let mut t = transport(&["C"]);
        let mut rng = Pcg32::seed_from_u64(0);
        t.set_settings(
            Settings {
                looping: false,
                ..Settings::default()
            },
            0,
        );
        t.start(0);
        for _ in 0..7 {
            t.tick(&mut rng);
            assert!(t.is_running());
        }
        assert!(t.tick(&mut rng).contains(&Effect::Stop));
        assert!(!t.is_running());
        assert_eq!(t.highlight(), Highlight::default());
    }
}
