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

//! Utility functions that I don't know where to put else

/// Compute a factor measured in cents (1/100 of a semitone)
///
/// # Example
///
/// ```
/// # use harmonia::util::*;
///
/// assert_eq!(from_cents(-16.0), from_semitones(-16.0 / 100.0));
/// ```
pub fn from_cents(cents: f64) -> f64 {
    2.0f64.powf(cents / 1200.0)
}

/// The inverse of `from_cents`: how many cents lie between two frequencies.
///
/// # Example
///
/// ```
/// # use harmonia::util::*;
///
/// assert_eq!(to_cents(880.0, 440.0), 1200.0);
/// assert_eq!(to_cents(440.0, 440.0), 0.0);
/// ```
pub fn to_cents(frequency: f64, reference: f64) -> f64 {
    1200.0 * (frequency / reference).log2()
}

/// Compute a factor measured in semitones (one octave consists of 12 semitones)
///
/// # Example
///
/// ```
/// # use harmonia::util::*;
///
/// assert_eq!(from_semitones(12.0), 2.0);
/// assert_eq!(from_semitones(-24.0), 0.25);
/// ```
pub fn from_semitones(semitones: f64) -> f64 {
    2.0f64.powf(semitones / 12.0)
}

/// Round to a fixed number of decimal places, as used for displaying readings.
///
/// # Example
///
/// ```
/// # use harmonia::util::*;
///
/// assert_eq!(round_to(440.1234, 2), 440.12);
/// assert_eq!(round_to(-17.26, 1), -17.3);
/// ```
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10.0f64.powi(decimals);
    (value * scale).round() / scale
}
