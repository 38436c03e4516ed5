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

//! The playback state machine.
//!
//! Everything is derived from a single counter of eighth-note ticks:
//! chords change every measure (eight ticks), melody notes advance every tick,
//! metronome and drums sound on quarter notes. A `Session` only computes what
//! should happen on a tick, the resulting `Effect`s are carried out by the player.

use log::{debug, trace, warn};
use rand::Rng;

use crate::chord;
use crate::instrument::Timbre;
use crate::note::Note;
use crate::progression::Progression;

/// One chord lasts a measure of four beats, each split into two eighth notes.
pub const TICKS_PER_CHORD: u64 = 8;

pub const MIN_TEMPO: u32 = 40;
pub const MAX_TEMPO: u32 = 240;
pub const DEFAULT_TEMPO: u32 = 120;

/// Fraction of a tick a block chord sounds.
const CHORD_LENGTH: f64 = 0.6;
/// Fraction of a tick an arpeggiated note sounds.
const ARPEGGIO_LENGTH: f64 = 0.8;
/// Bounds of the randomized fraction of a tick a melody note sounds.
const MELODY_LENGTH_MIN: f64 = 0.3;
const MELODY_LENGTH_MAX: f64 = 0.5;

/// Playback settings shared by all progressions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Quarter notes per minute, clamped to `MIN_TEMPO..=MAX_TEMPO` when used.
    pub tempo_bpm: u32,
    pub looping: bool,
    pub arpeggio: bool,
    pub metronome: bool,
    pub drums: bool,
    pub timbre: Timbre,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tempo_bpm: DEFAULT_TEMPO,
            looping: true,
            arpeggio: false,
            metronome: false,
            drums: false,
            timbre: Timbre::default(),
        }
    }
}

impl Settings {
    /// The effective tempo.
    ///
    /// ```
    /// use harmonia::sequencer::Settings;
    ///
    /// let settings = Settings { tempo_bpm: 500, ..Settings::default() };
    /// assert_eq!(settings.tempo(), 240);
    /// assert_eq!(settings.tick_seconds(), 0.125);
    /// ```
    pub fn tempo(&self) -> u32 {
        self.tempo_bpm.max(MIN_TEMPO).min(MAX_TEMPO)
    }

    /// Length of an eighth note in seconds.
    pub fn tick_seconds(&self) -> f64 {
        60.0 / self.tempo() as f64 / 2.0
    }
}

/// Something the player has to do on a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PlayChord { notes: Vec<Note>, duration: f64 },
    PlayNote { note: Note, duration: f64 },
    HighlightChord(usize),
    HighlightMelodyNote(usize),
    Click { accent: bool },
    /// Drums for the quarter note with this index since the start.
    Drum { beat: u64 },
    /// The progression wrapped around to its beginning.
    Loop,
    /// The progression ended and does not loop.
    Stop,
}

/// Transient state of one playback of a progression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    tick: u64,
    chord_index: Option<usize>,
    melody_index: usize,
    arpeggio_index: usize,
    chord_notes: Vec<Note>,
}

impl Session {
    /// A session at the very beginning, with the first chord already resolved.
    pub fn start(progression: &Progression) -> Self {
        let mut session = Self::default();
        session.load_chord(progression, 0);
        session
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn chord_index(&self) -> Option<usize> {
        self.chord_index
    }

    pub fn melody_index(&self) -> usize {
        self.melody_index
    }

    pub fn arpeggio_index(&self) -> usize {
        self.arpeggio_index
    }

    /// Notes of the chord that is currently playing.
    pub fn chord_notes(&self) -> &[Note] {
        &self.chord_notes
    }

    /// Adapt to a changed progression: continue at the same tick if it still
    /// exists, otherwise start over. The current chord is resolved again.
    pub fn reload(&mut self, progression: &Progression) {
        if self.tick >= total_ticks(progression) {
            self.tick = 0;
            self.melody_index = 0;
        }
        self.chord_index = None;
        self.chord_notes.clear();
    }

    fn load_chord(&mut self, progression: &Progression, index: usize) {
        self.chord_index = Some(index);
        self.arpeggio_index = 0;
        self.chord_notes = progression
            .chords
            .get(index)
            .map(|symbol| chord::resolve(symbol))
            .unwrap_or_default();
        if self.chord_notes.is_empty() {
            warn!("chord {} of {:?} has nothing to play", index, progression.id);
        }
    }

    /// Compute everything that happens on the current tick and move on to the next one.
    pub fn advance<R: Rng>(
        &mut self,
        progression: &Progression,
        settings: &Settings,
        rng: &mut R,
    ) -> Vec<Effect> {
        let tick_seconds = settings.tick_seconds();
        let chord_index = (self.tick / TICKS_PER_CHORD) as usize;
        let position = self.tick % TICKS_PER_CHORD;
        let mut effects = Vec::new();
        trace!("tick {} (chord {}, position {})", self.tick, chord_index, position);

        if self.chord_index != Some(chord_index) {
            self.load_chord(progression, chord_index);
            effects.push(Effect::HighlightChord(chord_index));
        }

        if settings.arpeggio {
            if !self.chord_notes.is_empty() {
                let note = self.chord_notes[self.arpeggio_index % self.chord_notes.len()];
                effects.push(Effect::PlayNote {
                    note,
                    duration: ARPEGGIO_LENGTH * tick_seconds,
                });
            }
            self.arpeggio_index += 1;
        } else if position == 0 && !self.chord_notes.is_empty() {
            effects.push(Effect::PlayChord {
                notes: self.chord_notes.clone(),
                duration: CHORD_LENGTH * tick_seconds,
            });
        }

        if let Some(melody) = &progression.melody {
            if self.melody_index < melody.notes.len() {
                match melody.note(self.melody_index) {
                    Some(note) => {
                        let length = rng.gen_range(MELODY_LENGTH_MIN..=MELODY_LENGTH_MAX);
                        effects.push(Effect::PlayNote {
                            note,
                            duration: length * tick_seconds,
                        });
                    }
                    None => warn!(
                        "skipping unparseable melody note {:?}",
                        melody.notes[self.melody_index]
                    ),
                }
                effects.push(Effect::HighlightMelodyNote(self.melody_index));
                self.melody_index += 1;
            }
        }

        if position % 2 == 0 {
            if settings.metronome {
                effects.push(Effect::Click {
                    accent: position == 0,
                });
            }
            if settings.drums {
                effects.push(Effect::Drum {
                    beat: self.tick / 2,
                });
            }
        }

        self.tick += 1;
        if self.tick >= total_ticks(progression) {
            if settings.looping {
                debug!("looping {:?}", progression.id);
                self.tick = 0;
                self.melody_index = 0;
                effects.push(Effect::Loop);
            } else {
                debug!("reached the end of {:?}", progression.id);
                effects.push(Effect::Stop);
            }
        }
        effects
    }
}

/// Number of ticks in one pass through the progression.
pub fn total_ticks(progression: &Progression) -> u64 {
    progression.chords.len() as u64 * TICKS_PER_CHORD
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::progression::Melody;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn progression(chords: &[&str]) -> Progression {
        Progression::from_chords("test", chords.iter().copied())
    }

    fn melody(notes: &[&str]) -> Melody {
        Melody {
            notes: notes.iter().map(|n| n.to_string()).collect(),
            style: "Simple".into(),
            tips: String::new(),
        }
    }

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(42)
    }

    fn midi(notes: &[Note]) -> Vec<i32> {
        notes.iter().map(|n| n.index()).collect()
    }

    #[test]
    fn loops_after_all_chords() {
        let prog = progression(&["C", "F", "G"]);
        let settings = Settings::default();
        let mut session = Session::start(&prog);
        let mut rng = rng();
        for pass in 0..2 {
            for tick in 0..24 {
                let effects = session.advance(&prog, &settings, &mut rng);
                let wrapped = effects.contains(&Effect::Loop);
                assert_eq!(wrapped, tick == 23, "pass {} tick {}", pass, tick);
                assert!(!effects.contains(&Effect::Stop));
            }
            assert_eq!(session.tick(), 0);
        }
    }

    #[test]
    fn stops_without_looping() {
        let prog = progression(&["C", "G"]);
        let settings = Settings {
            looping: false,
            ..Settings::default()
        };
        let mut session = Session::start(&prog);
        let mut rng = rng();
        let stops: Vec<usize> = (0..16)
            .filter(|_| {
                session
                    .advance(&prog, &settings, &mut rng)
                    .contains(&Effect::Stop)
            })
            .collect();
        assert_eq!(stops, vec![15]);
    }

    #[test]
    fn block_chords_on_measure_start() {
        let prog = progression(&["C", "Am"]);
        let settings = Settings::default();
        let mut session = Session::start(&prog);
        let mut rng = rng();
        let mut chords = Vec::new();
        let mut highlights = Vec::new();
        for tick in 0..16 {
            for effect in session.advance(&prog, &settings, &mut rng) {
                match effect {
                    Effect::PlayChord { notes, duration } => {
                        assert_eq!(duration, 0.6 * 0.25);
                        chords.push((tick, midi(&notes)));
                    }
                    Effect::HighlightChord(index) => highlights.push((tick, index)),
                    _ => {}
                }
            }
        }
        assert_eq!(chords, vec![(0, vec![60, 64, 67]), (8, vec![69, 72, 76])]);
        // the first chord is resolved when the session starts
        assert_eq!(highlights, vec![(8, 1)]);
    }

    #[test]
    fn arpeggio_round_robin() {
        let prog = progression(&["C", "Am7"]);
        let settings = Settings {
            arpeggio: true,
            ..Settings::default()
        };
        let mut session = Session::start(&prog);
        let mut rng = rng();
        let mut played = Vec::new();
        for _ in 0..16 {
            for effect in session.advance(&prog, &settings, &mut rng) {
                match effect {
                    Effect::PlayNote { note, duration } => {
                        assert_eq!(duration, 0.8 * 0.25);
                        played.push(note.index());
                    }
                    Effect::PlayChord { .. } => panic!("no block chords while arpeggiating"),
                    _ => {}
                }
            }
        }
        assert_eq!(
            played,
            vec![60, 64, 67, 60, 64, 67, 60, 64, 69, 72, 76, 79, 69, 72, 76, 79]
        );
    }

    #[test]
    fn melody_advances_every_tick_and_resets_on_loop() {
        let prog = progression(&["C"]).with_melody(melody(&["E4", "bogus", "G4"]));
        let settings = Settings::default();
        let mut session = Session::start(&prog);
        let mut rng = rng();
        let mut notes = Vec::new();
        let mut highlighted = Vec::new();
        for _ in 0..8 {
            for effect in session.advance(&prog, &settings, &mut rng) {
                match effect {
                    Effect::PlayNote { note, duration } => {
                        assert!(duration >= 0.3 * 0.25 && duration <= 0.5 * 0.25);
                        notes.push(note.index());
                    }
                    Effect::HighlightMelodyNote(index) => highlighted.push(index),
                    _ => {}
                }
            }
        }
        assert_eq!(notes, vec![64, 67]);
        assert_eq!(highlighted, vec![0, 1, 2]);
        assert_eq!(session.melody_index(), 0);
        assert_eq!(session.tick(), 0);
    }

    #[test]
    fn metronome_and_drums_on_quarter_notes() {
        let prog = progression(&["C", "G"]);
        let settings = Settings {
            metronome: true,
            drums: true,
            ..Settings::default()
        };
        let mut session = Session::start(&prog);
        let mut rng = rng();
        let mut clicks = Vec::new();
        let mut drums = Vec::new();
        for tick in 0..16 {
            for effect in session.advance(&prog, &settings, &mut rng) {
                match effect {
                    Effect::Click { accent } => clicks.push((tick, accent)),
                    Effect::Drum { beat } => drums.push(beat),
                    _ => {}
                }
            }
        }
        assert_eq!(
            clicks,
            vec![
                (0, true),
                (2, false),
                (4, false),
                (6, false),
                (8, true),
                (10, false),
                (12, false),
                (14, false)
            ]
        );
        assert_eq!(drums, (0..8).collect::<Vec<u64>>());
    }

    #[test]
    fn invalid_chords_are_skipped() {
        let prog = progression(&["H7", "C"]);
        let settings = Settings::default();
        let mut session = Session::start(&prog);
        let mut rng = rng();
        let mut chord_ticks = Vec::new();
        for tick in 0..16 {
            let effects = session.advance(&prog, &settings, &mut rng);
            if effects.iter().any(|e| matches!(e, Effect::PlayChord { .. })) {
                chord_ticks.push(tick);
            }
        }
        assert_eq!(chord_ticks, vec![8]);
    }

    #[test]
    fn reload_clamps_tick() {
        let long = progression(&["C", "F", "G"]);
        let short = progression(&["Am", "Dm"]);
        let settings = Settings::default();
        let mut session = Session::start(&long);
        let mut rng = rng();
        for _ in 0..20 {
            session.advance(&long, &settings, &mut rng);
        }
        session.reload(&long);
        assert_eq!(session.tick(), 20);
        assert_eq!(session.chord_index(), None);

        session.reload(&short);
        assert_eq!(session.tick(), 0);
        let effects = session.advance(&short, &settings, &mut rng);
        assert_eq!(effects[0], Effect::HighlightChord(0));
        assert_eq!(midi(session.chord_notes()), vec![69, 72, 76]);
    }

    #[test]
    fn tempo_is_clamped() {
        let slow = Settings {
            tempo_bpm: 10,
            ..Settings::default()
        };
        assert_eq!(slow.tempo(), MIN_TEMPO);
        assert_eq!(Settings::default().tick_seconds(), 0.25);
    }
}
