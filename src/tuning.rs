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

use crate::note::*;
use crate::util;

/// Defines the tuning of an instrument by assinging a frequency to a certain note.
/// This defines the frequencies of all other notes at a standard tuning of 12 half-tones per octave.
///
/// # Examples
///
/// ```
/// use harmonia::note::*;
/// use harmonia::tuning::*;
/// assert_eq!(Tuning::default().frequency(Note::from_midi(57)), 220.0);
/// assert_eq!(Tuning::default().frequency(Note::from_midi(81)), 880.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub reference_note: Note,
    pub reference_frequency: f64,
}

impl Tuning {
    /// Return the frequency of a note relative to this tuning.
    pub fn frequency(&self, other: Note) -> f64 {
        let semitones = other.index() - self.reference_note.index();
        self.reference_frequency * util::from_semitones(semitones as f64)
    }

    /// The note whose frequency is closest to the given one, on a logarithmic scale.
    /// Returns `None` for frequencies that are not strictly positive.
    ///
    /// # Examples
    ///
    /// ```
    /// # use harmonia::note::*;
    /// # use harmonia::tuning::*;
    /// let tuning = Tuning::default();
    /// assert_eq!(tuning.nearest_note(440.0), Some(Note::from_midi(69)));
    /// assert_eq!(tuning.nearest_note(450.0), Some(Note::from_midi(69)));
    /// assert_eq!(tuning.nearest_note(460.0), Some(Note::from_midi(70)));
    /// assert_eq!(tuning.nearest_note(0.0), None);
    /// ```
    pub fn nearest_note(&self, frequency: f64) -> Option<Note> {
        if !(frequency > 0.0) || !frequency.is_finite() {
            return None;
        }
        let semitones = 12.0 * (frequency / self.reference_frequency).log2();
        Some(self.reference_note.transpose(semitones.round() as i32))
    }

    /// Deviation of `frequency` from the ideal frequency of its nearest note, in cents.
    /// Lies within -50 to +50 cents for all positive frequencies.
    pub fn cents_deviation(&self, frequency: f64) -> Option<f64> {
        let note = self.nearest_note(frequency)?;
        Some(util::to_cents(frequency, self.frequency(note)))
    }
}

/// Default concert tuning, where A4 corresponds to 440 Hz.
impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            reference_note: Note::named(NoteName::A, NoteOffset::Base, 4),
            reference_frequency: 440.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cents_at_ideal_frequency_is_zero() {
        let tuning = Tuning::default();
        for index in 24..108 {
            let ideal = tuning.frequency(Note::from_midi(index));
            assert_abs_diff_eq!(tuning.cents_deviation(ideal).unwrap(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn one_percent_sharp() {
        let tuning = Tuning::default();
        let cents = tuning.cents_deviation(440.0 * 1.01).unwrap();
        assert_abs_diff_eq!(cents, 1200.0 * 1.01f64.log2(), epsilon = 1e-9);
        assert_abs_diff_eq!(cents, 17.226, epsilon = 1e-3);
    }

    #[test]
    fn flat_readings_are_negative() {
        let tuning = Tuning::default();
        let cents = tuning.cents_deviation(440.0 / 1.01).unwrap();
        assert!(cents < 0.0);
        assert_eq!(tuning.nearest_note(440.0 / 1.01), Some(Note::from_midi(69)));
    }
}
