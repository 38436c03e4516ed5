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

//! Parameters changing over time, used for amplitude envelopes and pitch sweeps.

/// A value that follows a schedule of breakpoints.
/// Between two breakpoints the value either jumps (at the later one),
/// or ramps linearly or exponentially towards it.
///
/// Times are absolute, measured in seconds on the audio clock.
///
/// # Example
///
/// ```
/// use harmonia::envelope::*;
/// let mut gain = Param::new(0.0);
/// gain.set_value_at_time(0.0, 1.0)
///     .linear_ramp_to_value_at_time(1.0, 1.5)
///     .linear_ramp_to_value_at_time(0.0, 3.5);
///
/// assert_eq!(gain.value_at(0.0), 0.0);
/// assert_eq!(gain.value_at(1.25), 0.5);
/// assert_eq!(gain.value_at(1.5), 1.0);
/// assert_eq!(gain.value_at(2.5), 0.5);
/// assert_eq!(gain.value_at(10.0), 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Param {
    /// Value before the first breakpoint.
    initial: f64,
    /// Breakpoints sorted by time.
    events: Vec<Breakpoint>,
}

#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    time: f64,
    value: f64,
    approach: Approach,
}

/// How a breakpoint is approached from the preceding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Approach {
    Jump,
    Linear,
    Exponential,
}

impl Param {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    /// A parameter that never changes.
    pub fn constant(value: f64) -> Self {
        Self::new(value)
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(Breakpoint {
            time,
            value,
            approach: Approach::Jump,
        })
    }

    /// Ramp linearly from the previous breakpoint, reaching `value` at `end_time`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) -> &mut Self {
        self.insert(Breakpoint {
            time: end_time,
            value,
            approach: Approach::Linear,
        })
    }

    /// Ramp exponentially from the previous breakpoint, reaching `value` at `end_time`.
    /// Both values must be non-zero and have the same sign, otherwise the
    /// previous value is held until `end_time`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) -> &mut Self {
        self.insert(Breakpoint {
            time: end_time,
            value,
            approach: Approach::Exponential,
        })
    }

    fn insert(&mut self, event: Breakpoint) -> &mut Self {
        // breakpoints at the same time keep their insertion order
        let index = self
            .events
            .iter()
            .position(|e| e.time > event.time)
            .unwrap_or_else(|| self.events.len());
        self.events.insert(index, event);
        self
    }

    /// Evaluate the parameter at this point in time.
    pub fn value_at(&self, time: f64) -> f64 {
        let mut previous_time = 0.0;
        let mut previous_value = self.initial;
        for event in self.events.iter() {
            if event.time <= time {
                previous_time = event.time;
                previous_value = event.value;
                continue;
            }
            let progress = (time - previous_time) / (event.time - previous_time);
            return match event.approach {
                Approach::Jump => previous_value,
                Approach::Linear => previous_value + (event.value - previous_value) * progress,
                Approach::Exponential => {
                    if previous_value * event.value > 0.0 {
                        previous_value * (event.value / previous_value).powf(progress)
                    } else {
                        previous_value
                    }
                }
            };
        }
        previous_value
    }
}
