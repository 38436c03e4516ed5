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

//! Destinations for rendered audio.

use std::io;

use snafu::Snafu;

use crate::wave::AudioBuffer;

pub mod sox;

pub use sox::{SoxSink, SoxTarget};

#[derive(Debug, Snafu)]
pub enum OutputError {
    #[snafu(display("Failed to start {}: {}", program, source))]
    Spawn { program: String, source: io::Error },
    #[snafu(display("The {} process has no input stream", program))]
    NoInput { program: String },
    #[snafu(display("Failed to write audio to sox stream: {}", source))]
    Write { source: io::Error },
    #[snafu(display("Failed to wait for sox to finish: {}", source))]
    Wait { source: io::Error },
}

/// Something that consumes rendered audio buffers in order.
pub trait AudioSink {
    fn write(&mut self, audio: &AudioBuffer) -> Result<(), OutputError>;

    /// Flush everything written so far. Nothing may be written afterwards.
    fn finish(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Collects all audio in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    samples: Vec<f64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}

impl AudioSink for MemorySink {
    fn write(&mut self, audio: &AudioBuffer) -> Result<(), OutputError> {
        self.samples.extend_from_slice(audio.samples());
        Ok(())
    }
}

/// Scales everything by a constant factor before passing it on.
pub struct GainSink<S> {
    inner: S,
    gain: f64,
    scaled: AudioBuffer,
}

impl<S: AudioSink> GainSink<S> {
    pub fn new(inner: S, gain: f64) -> Self {
        Self {
            inner,
            gain,
            scaled: AudioBuffer::new(0),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AudioSink> AudioSink for GainSink<S> {
    fn write(&mut self, audio: &AudioBuffer) -> Result<(), OutputError> {
        if self.scaled.len() != audio.len() {
            self.scaled = AudioBuffer::new(audio.len());
        }
        for (out, sample) in self.scaled.samples_mut().iter_mut().zip(audio.samples()) {
            *out = sample * self.gain;
        }
        self.inner.write(&self.scaled)
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        self.inner.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gain_scales_samples() {
        let mut audio = AudioBuffer::new(3);
        audio.samples_mut().copy_from_slice(&[0.5, -1.0, 0.25]);
        let mut sink = GainSink::new(MemorySink::new(), 0.5);
        sink.write(&audio).unwrap();
        sink.write(&audio).unwrap();
        sink.finish().unwrap();
        assert_eq!(
            sink.into_inner().into_samples(),
            vec![0.25, -0.5, 0.125, 0.25, -0.5, 0.125]
        );
    }
}
