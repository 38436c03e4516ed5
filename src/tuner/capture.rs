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

//! Where the tuner gets its samples from.

use std::io::{self, Read as _};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use log::debug;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::output::sox::sox_binary;

#[derive(Debug, Snafu)]
pub enum CaptureError {
    #[snafu(display("Failed to start {}: {}", program, source))]
    Spawn { program: String, source: io::Error },
    #[snafu(display("The {} process has no output stream", program))]
    NoOutput { program: String },
    #[snafu(display("Failed to read captured audio: {}", source))]
    Read { source: io::Error },
    #[snafu(display("The audio input ended"))]
    EndOfStream,
}

/// A live stream of mono samples.
pub trait CaptureSource {
    fn sample_rate(&self) -> u32;

    /// Fill the whole buffer with the next samples, blocking until they are available.
    fn read(&mut self, buffer: &mut [f64]) -> Result<(), CaptureError>;
}

/// Captures audio through a sox subprocess, either from the default
/// recording device or by decoding a file. The process is terminated
/// when the capture is dropped.
pub struct SoxCapture {
    process: Child,
    stream: ChildStdout,
    sample_rate: u32,
    bytes: Vec<u8>,
}

impl SoxCapture {
    /// Record from the default input device using `rec`.
    pub fn microphone(sample_rate: u32) -> Result<Self, CaptureError> {
        Self::spawn("rec", &[], sample_rate)
    }

    /// Decode an audio file in any format sox understands.
    pub fn file(path: &Path, sample_rate: u32) -> Result<Self, CaptureError> {
        Self::spawn("sox", &[path.as_os_str()], sample_rate)
    }

    fn spawn(
        program: &str,
        inputs: &[&std::ffi::OsStr],
        sample_rate: u32,
    ) -> Result<Self, CaptureError> {
        let sample_rate_str = format!("{}", sample_rate);
        let output_args = &[
            "--channels",
            "1",
            "--rate",
            &sample_rate_str,
            "--type",
            "f64",
            "-",
        ];
        let mut process = Command::new(sox_binary(program))
            .arg("-q")
            .args(inputs)
            .args(output_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context(Spawn { program })?;
        let stream = process.stdout.take().context(NoOutput { program })?;
        debug!("capturing audio with {} at {} Hz", program, sample_rate);

        Ok(Self {
            process,
            stream,
            sample_rate,
            bytes: Vec::new(),
        })
    }
}

impl CaptureSource for SoxCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut [f64]) -> Result<(), CaptureError> {
        self.bytes.resize(buffer.len() * 8, 0);
        if let Err(err) = self.stream.read_exact(&mut self.bytes) {
            return if err.kind() == io::ErrorKind::UnexpectedEof {
                Err(CaptureError::EndOfStream)
            } else {
                Err(err).context(Read)
            };
        }
        for (sample, chunk) in buffer.iter_mut().zip(self.bytes.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *sample = f64::from_le_bytes(raw);
        }
        Ok(())
    }
}

impl Drop for SoxCapture {
    fn drop(&mut self) {
        // the process may already have exited on its own
        let _ = self.process.kill();
        match self.process.wait() {
            Ok(status) => debug!("capture process exited with {}", status),
            Err(err) => debug!("failed to reap capture process: {}", err),
        }
    }
}

/// Replays samples from memory.
#[derive(Debug, Clone)]
pub struct SampleCapture {
    samples: Vec<f64>,
    position: usize,
    sample_rate: u32,
}

impl SampleCapture {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }
}

impl CaptureSource for SampleCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut [f64]) -> Result<(), CaptureError> {
        let end = self.position + buffer.len();
        if end > self.samples.len() {
            return Err(CaptureError::EndOfStream);
        }
        buffer.copy_from_slice(&self.samples[self.position..end]);
        self.position = end;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sample_capture_runs_out() {
        let mut capture = SampleCapture::new(vec![0.1, 0.2, 0.3, 0.4, 0.5], 8000);
        let mut buffer = [0.0; 2];
        capture.read(&mut buffer).unwrap();
        assert_eq!(buffer, [0.1, 0.2]);
        capture.read(&mut buffer).unwrap();
        assert_eq!(buffer, [0.3, 0.4]);
        assert!(matches!(
            capture.read(&mut buffer),
            Err(CaptureError::EndOfStream)
        ));
    }
}
