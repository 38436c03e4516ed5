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

//! Digital filters galore

use std::f64::consts::FRAC_1_SQRT_2;

/// Pre-define types of biquad filters that can be used for deriving
/// various combinations of `BiquadCoefficients`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BiquadType {
    /// The identity filter that lets the signal pass unchanged.
    Allpass,
    /// Lowpass filter with the given cutoff frequency and Q factor (controls resonance)
    Lowpass { cutoff: f64, q: f64 },
    /// Highpass filter with the given cutoff frequency and Q factor
    Highpass { cutoff: f64, q: f64 },
    /// Bandpass filter with 0 dB gain at the center frequency,
    /// the Q factor controls the width of the band.
    Bandpass { center: f64, q: f64 },
}

impl BiquadType {
    /// Butterworth lowpass, i.e. no resonance peak.
    pub fn lowpass(cutoff: f64) -> Self {
        BiquadType::Lowpass {
            cutoff,
            q: FRAC_1_SQRT_2,
        }
    }

    /// Butterworth highpass, i.e. no resonance peak.
    pub fn highpass(cutoff: f64) -> Self {
        BiquadType::Highpass {
            cutoff,
            q: FRAC_1_SQRT_2,
        }
    }

    pub fn bandpass(center: f64) -> Self {
        BiquadType::Bandpass { center, q: 1.0 }
    }

    pub fn to_coefficients(&self, sample_rate: f64) -> BiquadCoefficients {
        match *self {
            BiquadType::Allpass => BiquadCoefficients::allpass(),
            BiquadType::Lowpass { cutoff, q } => BiquadCoefficients::lowpass(sample_rate, cutoff, q),
            BiquadType::Highpass { cutoff, q } => {
                BiquadCoefficients::highpass(sample_rate, cutoff, q)
            }
            BiquadType::Bandpass { center, q } => {
                BiquadCoefficients::bandpass(sample_rate, center, q)
            }
        }
    }
}

/// Filter coefficients for a biquadratic filter,
/// based on https://www.w3.org/2011/audio/audio-eq-cookbook.html.
#[derive(Debug, Clone)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Shared terms of the cookbook formulas. Frequencies at or above Nyquist are
/// clamped just below it, where the formulas are still well-defined.
struct Omega {
    cos: f64,
    alpha: f64,
}

impl Omega {
    fn new(sample_rate: f64, frequency: f64, q: f64) -> Self {
        let frequency = frequency.max(1.0).min(0.499 * sample_rate);
        let omega0 = 2.0 * std::f64::consts::PI * frequency / sample_rate;
        let (sin, cos) = omega0.sin_cos();
        Self {
            cos,
            alpha: sin / (2.0 * q),
        }
    }
}

impl BiquadCoefficients {
    /// The identity filter that lets the signal pass unchanged.
    pub fn allpass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Lowpass filter with the given cutoff frequency and Q factor
    pub fn lowpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w = Omega::new(sample_rate, cutoff, q);
        let a0_inv = 1.0 / (1.0 + w.alpha);
        Self {
            b0: a0_inv * (1.0 - w.cos) / 2.0,
            b1: a0_inv * (1.0 - w.cos),
            b2: a0_inv * (1.0 - w.cos) / 2.0,
            a1: a0_inv * (-2.0 * w.cos),
            a2: a0_inv * (1.0 - w.alpha),
        }
    }

    /// Highpass filter with the given cutoff frequency and Q factor
    pub fn highpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w = Omega::new(sample_rate, cutoff, q);
        let a0_inv = 1.0 / (1.0 + w.alpha);
        Self {
            b0: a0_inv * (1.0 + w.cos) / 2.0,
            b1: a0_inv * -(1.0 + w.cos),
            b2: a0_inv * (1.0 + w.cos) / 2.0,
            a1: a0_inv * (-2.0 * w.cos),
            a2: a0_inv * (1.0 - w.alpha),
        }
    }

    /// Bandpass filter with a constant 0 dB peak gain at the center frequency.
    pub fn bandpass(sample_rate: f64, center: f64, q: f64) -> Self {
        let w = Omega::new(sample_rate, center, q);
        let a0_inv = 1.0 / (1.0 + w.alpha);
        Self {
            b0: a0_inv * w.alpha,
            b1: 0.0,
            b2: a0_inv * -w.alpha,
            a1: a0_inv * (-2.0 * w.cos),
            a2: a0_inv * (1.0 - w.alpha),
        }
    }
}

/// Biquadratic filter with four delay gates, based on https://www.w3.org/2011/audio/audio-eq-cookbook.html.
#[derive(Debug, Clone)]
pub struct Biquad {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    pub fn new() -> Self {
        Self {
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Feed the next value through the filter using the given coefficients.
    pub fn step(&mut self, c: &BiquadCoefficients, input: f64) -> f64 {
        let output =
            c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

/// A filter together with its coefficients, for filters whose settings never change.
#[derive(Debug, Clone)]
pub struct FixedFilter {
    coefficients: BiquadCoefficients,
    state: Biquad,
}

impl FixedFilter {
    pub fn new(filter: BiquadType, sample_rate: f64) -> Self {
        Self {
            coefficients: filter.to_coefficients(sample_rate),
            state: Biquad::new(),
        }
    }

    pub fn step(&mut self, input: f64) -> f64 {
        self.state.step(&self.coefficients, input)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::oscillator::{Oscillator, WaveShape};

    /// Peak amplitude of a filtered sine after the filter has settled.
    fn response(filter: BiquadType, frequency: f64) -> f64 {
        let sample_rate = 44100.0;
        let mut osc = Oscillator::new(WaveShape::Sine, sample_rate, frequency);
        let mut filter = FixedFilter::new(filter, sample_rate);
        let mut peak: f64 = 0.0;
        for i in 0..44100 {
            let out = filter.step(osc.next_sample(i as f64 / sample_rate));
            if i > 22050 {
                peak = peak.max(out.abs());
            }
        }
        peak
    }

    #[test]
    fn lowpass_attenuates_highs() {
        let filter = BiquadType::lowpass(4000.0);
        assert!(response(filter, 200.0) > 0.95);
        assert!(response(filter, 16000.0) < 0.1);
    }

    #[test]
    fn highpass_attenuates_lows() {
        let filter = BiquadType::highpass(1000.0);
        assert!(response(filter, 100.0) < 0.05);
        assert!(response(filter, 8000.0) > 0.95);
    }

    #[test]
    fn bandpass_peaks_at_center() {
        let filter = BiquadType::bandpass(10000.0);
        assert!(response(filter, 10000.0) > 0.95);
        assert!(response(filter, 1000.0) < 0.2);
    }
}
