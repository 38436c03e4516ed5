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

use crate::envelope::Param;
use crate::graph::Source;

#[derive(Debug, Copy, Clone)]
pub struct Phase(f64);

impl Phase {
    pub const ZERO: Phase = Phase(0.0);

    pub fn new(offset: f64) -> Phase {
        Phase(offset.rem_euclid(1.0))
    }

    pub fn offset(self) -> f64 {
        self.0
    }

    pub fn step(self, amount: f64) -> Phase {
        Phase::new(self.0 + amount)
    }

    pub fn step_frequency(self, frequency: f64, sample_rate: f64) -> Phase {
        self.step(frequency / sample_rate)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaveShape {
    Sine,
    Square,
    Triangle,
    Saw,
}

impl WaveShape {
    /// Evaluate one period of the wave, all shapes ranging from -1.0 to 1.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use harmonia::oscillator::*;
    ///
    /// assert_eq!(WaveShape::Triangle.eval(Phase::new(0.25)), 1.0);
    /// assert_eq!(WaveShape::Triangle.eval(Phase::new(0.75)), -1.0);
    /// assert_eq!(WaveShape::Saw.eval(Phase::ZERO), -1.0);
    /// assert_eq!(WaveShape::Square.eval(Phase::new(0.6)), -1.0);
    /// ```
    pub fn eval(self, phase: Phase) -> f64 {
        let offset = phase.offset();
        use std::f64::consts::PI;
        match self {
            WaveShape::Sine => (offset * 2.0 * PI).sin(),
            WaveShape::Square => {
                if offset < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            WaveShape::Triangle => {
                if offset < 0.25 {
                    4.0 * offset
                } else if offset < 0.75 {
                    2.0 - 4.0 * offset
                } else {
                    4.0 * offset - 4.0
                }
            }
            WaveShape::Saw => 2.0 * offset - 1.0,
        }
    }
}

/// An oscillator sampling a wave of some shape at a fixed sample rate.
/// The frequency may follow a schedule, e.g. for pitch sweeps.
#[derive(Debug)]
pub struct Oscillator {
    shape: WaveShape,
    sample_rate: f64,
    frequency: Param,
    phase: Phase,
}

impl Oscillator {
    pub fn new(shape: WaveShape, sample_rate: f64, frequency: f64) -> Self {
        Self::with_frequency(shape, sample_rate, Param::constant(frequency))
    }

    pub fn with_frequency(shape: WaveShape, sample_rate: f64, frequency: Param) -> Self {
        Self {
            shape,
            sample_rate,
            frequency,
            phase: Phase::ZERO,
        }
    }

    /// Sample the wave at `time` seconds on the audio clock and advance by one sample.
    pub fn next_sample(&mut self, time: f64) -> f64 {
        let result = self.shape.eval(self.phase);
        let frequency = self.frequency.value_at(time);
        self.phase = self.phase.step_frequency(frequency, self.sample_rate);
        result
    }
}

impl Source for Oscillator {
    fn sample(&mut self, time: f64) -> f64 {
        self.next_sample(time)
    }
}
