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

//! Fundamental frequency estimation by autocorrelation.

/// Default RMS level below which a buffer counts as silence.
pub const NOISE_FLOOR: f64 = 0.01;
/// Default normalized correlation a period must reach to be trusted.
pub const CONFIDENCE: f64 = 0.9;

/// Estimates the pitch of a buffer by finding the lag at which the signal
/// correlates best with itself.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    noise_floor: f64,
    confidence: f64,
    correlations: Vec<f64>,
}

impl Default for PitchDetector {
    fn default() -> Self {
        Self::new(NOISE_FLOOR, CONFIDENCE)
    }
}

impl PitchDetector {
    pub fn new(noise_floor: f64, confidence: f64) -> Self {
        Self {
            noise_floor,
            confidence,
            correlations: Vec::new(),
        }
    }

    /// Estimate the fundamental frequency of `buffer` in Hz.
    /// Returns `None` for silence and for signals without a clear period.
    pub fn estimate(&mut self, buffer: &[f64], sample_rate: f64) -> Option<f64> {
        let n = buffer.len();
        if n < 2 || rms(buffer) < self.noise_floor {
            return None;
        }

        self.correlations.clear();
        self.correlations.extend((0..n).map(|lag| {
            buffer[..n - lag]
                .iter()
                .zip(&buffer[lag..])
                .map(|(a, b)| a * b)
                .sum::<f64>()
        }));
        let correlations = &self.correlations;

        // walk down the slope of the zero lag peak
        let mut start = 0;
        while start + 1 < n && correlations[start] > correlations[start + 1] {
            start += 1;
        }

        let mut best_lag = start;
        for lag in start..n {
            if correlations[lag] > correlations[best_lag] {
                best_lag = lag;
            }
        }
        if best_lag == 0 || correlations[0] <= 0.0 {
            return None;
        }

        let clarity = correlations[best_lag] / correlations[0];
        if clarity > self.confidence {
            Some(sample_rate / best_lag as f64)
        } else {
            None
        }
    }
}

/// Estimate the fundamental frequency with the default thresholds.
///
/// ```
/// use harmonia::tuner::detect::estimate_frequency;
///
/// assert_eq!(estimate_frequency(&[0.0; 2048], 44100.0), None);
/// ```
pub fn estimate_frequency(buffer: &[f64], sample_rate: f64) -> Option<f64> {
    PitchDetector::default().estimate(buffer, sample_rate)
}

/// Root mean square of the samples.
pub fn rms(buffer: &[f64]) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    (buffer.iter().map(|s| s * s).sum::<f64>() / buffer.len() as f64).sqrt()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn sine(frequency: f64, amplitude: f64, sample_rate: f64, length: usize) -> Vec<f64> {
        (0..length)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn detects_pure_sines() {
        for frequency in &[300.0, 440.0, 660.0, 880.0] {
            let buffer = sine(*frequency, 0.5, 44100.0, 2048);
            let estimate = estimate_frequency(&buffer, 44100.0).unwrap();
            // lags are whole samples, so the error grows with the frequency
            let tolerance = frequency * frequency / 44100.0;
            assert!(
                (estimate - frequency).abs() <= tolerance.max(2.0),
                "{} vs {}",
                estimate,
                frequency
            );
        }
    }

    #[test]
    fn a440_within_two_hertz() {
        let buffer = sine(440.0, 0.8, 44100.0, 2048);
        let estimate = estimate_frequency(&buffer, 44100.0).unwrap();
        assert!((estimate - 440.0).abs() <= 2.0, "{}", estimate);
    }

    #[test]
    fn silence_and_quiet_signals() {
        assert_eq!(estimate_frequency(&[0.0; 2048], 44100.0), None);
        let quiet = sine(440.0, 0.005, 44100.0, 2048);
        assert_eq!(estimate_frequency(&quiet, 44100.0), None);
        assert_eq!(estimate_frequency(&[], 44100.0), None);
    }

    #[test]
    fn noise_has_no_pitch() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_pcg::Pcg32::seed_from_u64(5);
        let noise: Vec<f64> = (0..2048).map(|_| rng.gen_range(-0.5..0.5)).collect();
        assert_eq!(estimate_frequency(&noise, 44100.0), None);
    }
}
