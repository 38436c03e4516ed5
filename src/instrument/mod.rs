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

//! The sounds the player can make: pitched tones, drums and metronome clicks.
//! Every sound is scheduled on the audio context together with its stop time.

use std::fmt;
use std::str::FromStr;

pub mod click;
pub mod drums;
pub mod tone;

/// Sound profile used for chords and melody notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timbre {
    /// A single triangle oscillator with a plain attack/release envelope.
    Synth,
    /// Three layered oscillators with a percussive decay, filtered for a softer tone.
    Piano,
}

impl Default for Timbre {
    fn default() -> Self {
        Timbre::Piano
    }
}

impl FromStr for Timbre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synth" => Ok(Timbre::Synth),
            "piano" => Ok(Timbre::Piano),
            other => Err(format!("unknown timbre {:?}, expected synth or piano", other)),
        }
    }
}

impl fmt::Display for Timbre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timbre::Synth => write!(f, "synth"),
            Timbre::Piano => write!(f, "piano"),
        }
    }
}
