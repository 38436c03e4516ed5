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

//! Easy interface for getting sound to play using a sox subprocess.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use snafu::{OptionExt, ResultExt};

use super::{AudioSink, NoInput, OutputError, Spawn, Wait};
use crate::wave::AudioBuffer;

pub enum SoxTarget<'a> {
    Play,
    File(&'a Path),
}

/// Path of one of the sox binaries (`sox`, `play`, `rec`).
pub fn sox_binary(name: &str) -> PathBuf {
    // For properly recording the sox dependency on nix:
    if let Some(sox_bin) = option_env!("NIX_SOX_BIN") {
        log::debug!("using {} from nix store {}", name, sox_bin);
        Path::new(sox_bin).join(name)
    } else {
        name.into()
    }
}

/// Pipes mono `f64` samples into a sox process that either plays them
/// or writes them to a file in a format derived from its extension.
pub struct SoxSink {
    process: Child,
    audio_stream: Option<ChildStdin>,
    buffer: Vec<u8>,
}

impl SoxSink {
    pub fn new(sample_rate: u32, target: SoxTarget) -> Result<Self, OutputError> {
        let sample_rate_str = format!("{}", sample_rate);
        let input_args = &[
            "-R", // make the output reproducible
            "--channels",
            "1",
            "--rate",
            &sample_rate_str,
            "--type",
            "f64",
            "/dev/stdin",
        ];

        let program = match target {
            SoxTarget::Play => "play",
            SoxTarget::File(_) => "sox",
        };
        let mut command = Command::new(sox_binary(program));
        command.args(input_args).stdin(Stdio::piped());
        match target {
            SoxTarget::Play => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
            SoxTarget::File(outfile) => {
                command.arg(outfile);
            }
        }
        let mut process = command.spawn().context(Spawn { program })?;
        let audio_stream = process.stdin.take().context(NoInput { program })?;

        Ok(Self {
            process,
            audio_stream: Some(audio_stream),
            buffer: Vec::new(),
        })
    }
}

impl AudioSink for SoxSink {
    fn write(&mut self, audio: &AudioBuffer) -> Result<(), OutputError> {
        let audio_stream = self
            .audio_stream
            .as_mut()
            .context(NoInput { program: "sox" })?;
        if self.buffer.len() != audio.byte_len() {
            self.buffer.resize(audio.byte_len(), 0);
        }
        audio.copy_bytes_to(&mut self.buffer);
        audio_stream
            .write_all(&self.buffer)
            .and_then(|_| audio_stream.flush())
            .context(super::Write)
    }

    /// Close the input stream and wait for sox to drain it.
    fn finish(&mut self) -> Result<(), OutputError> {
        // sox exits by itself once its input is closed
        drop(self.audio_stream.take());
        let status = self.process.wait().context(Wait)?;
        log::debug!("sox exited with {}", status);
        Ok(())
    }
}

impl Drop for SoxSink {
    fn drop(&mut self) {
        if self.audio_stream.is_some() {
            if let Err(err) = self.finish() {
                log::error!("{}", err);
            }
        }
    }
}
