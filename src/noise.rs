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

//! Randomly sampled noise buffers, the raw material for percussion.

use rand::Rng;

use crate::graph::Source;

/// Fill a buffer of `seconds` length with uniformly distributed white noise.
pub fn white_noise<R: Rng>(rng: &mut R, sample_rate: f64, seconds: f64) -> Vec<f64> {
    let length = (sample_rate * seconds).round().max(0.0) as usize;
    (0..length).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Plays back a buffer once, followed by silence.
pub struct BufferPlayer {
    samples: Vec<f64>,
    position: usize,
}

impl BufferPlayer {
    pub fn new(samples: Vec<f64>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }
}

impl Source for BufferPlayer {
    fn sample(&mut self, _time: f64) -> f64 {
        let value = self.samples.get(self.position).copied().unwrap_or(0.0);
        self.position += 1;
        value
    }
}
