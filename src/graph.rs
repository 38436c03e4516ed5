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

//! The audio context owns the sample clock and mixes every scheduled voice
//! into the output. Voices are fire-and-forget: each one is scheduled with a
//! start and a stop time and dropped once the clock has passed its stop time.

use log::{debug, error, info, trace};
use snafu::Snafu;

use crate::envelope::Param;
use crate::filter::{BiquadType, FixedFilter};

/// Anything that produces a mono signal, one sample at a time.
pub trait Source {
    /// Produce the sample at `time`, measured in seconds on the audio clock.
    /// Called exactly once for every sample while the voice is live, in order.
    fn sample(&mut self, time: f64) -> f64;
}

impl Source for Box<dyn Source> {
    fn sample(&mut self, time: f64) -> f64 {
        (**self).sample(time)
    }
}

/// Scales a source by an automatable gain.
pub struct Gain<S> {
    source: S,
    gain: Param,
}

impl<S: Source> Gain<S> {
    pub fn new(source: S, gain: Param) -> Self {
        Self { source, gain }
    }
}

impl<S: Source> Source for Gain<S> {
    fn sample(&mut self, time: f64) -> f64 {
        self.source.sample(time) * self.gain.value_at(time)
    }
}

/// Feeds a source through a biquad filter.
pub struct Filtered<S> {
    source: S,
    filter: FixedFilter,
}

impl<S: Source> Filtered<S> {
    pub fn new(source: S, filter: BiquadType, sample_rate: f64) -> Self {
        Self {
            source,
            filter: FixedFilter::new(filter, sample_rate),
        }
    }
}

impl<S: Source> Source for Filtered<S> {
    fn sample(&mut self, time: f64) -> f64 {
        self.filter.step(self.source.sample(time))
    }
}

/// Sum of several sources.
#[derive(Default)]
pub struct Mix {
    sources: Vec<Box<dyn Source>>,
}

impl Mix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: Source + 'static>(&mut self, source: S) -> &mut Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl Source for Mix {
    fn sample(&mut self, time: f64) -> f64 {
        self.sources.iter_mut().map(|s| s.sample(time)).sum()
    }
}

/// Possible errors when creating an audio context.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum AudioError {
    #[snafu(display("Unsupported sample rate {} Hz", sample_rate))]
    UnsupportedSampleRate { sample_rate: u32 },
    #[snafu(display("The buffer size must be at least one sample"))]
    EmptyBuffer,
}

/// Information about how audio is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Number of samples per second.
    pub sample_rate: u32,
    /// Number of samples rendered at once.
    pub buffer_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 441,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
}

/// Opaque handle identifying a scheduled voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u64);

struct ScheduledVoice {
    id: VoiceId,
    /// First sample at which the voice is audible.
    start: u64,
    /// First sample at which the voice is gone.
    stop: u64,
    source: Box<dyn Source>,
}

pub struct AudioContext {
    config: ContextConfig,
    sample_rate: f64,
    /// Number of samples rendered so far.
    clock: u64,
    state: ContextState,
    next_voice_id: u64,
    voices: Vec<ScheduledVoice>,
}

impl AudioContext {
    /// Create a suspended context.
    pub fn new(config: ContextConfig) -> Result<Self, AudioError> {
        if !(8000..=192_000).contains(&config.sample_rate) {
            return Err(AudioError::UnsupportedSampleRate {
                sample_rate: config.sample_rate,
            });
        }
        if config.buffer_size == 0 {
            return Err(AudioError::EmptyBuffer);
        }
        Ok(Self {
            config,
            sample_rate: config.sample_rate as f64,
            clock: 0,
            state: ContextState::Suspended,
            next_voice_id: 0,
            voices: Vec::new(),
        })
    }

    pub fn config(&self) -> ContextConfig {
        self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Start the clock. Does nothing if it is already running.
    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            debug!("resuming audio context at {:.3}s", self.current_time());
            self.state = ContextState::Running;
        }
    }

    /// Stop the clock. Scheduled voices are kept and continue where they left off.
    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            debug!("suspending audio context at {:.3}s", self.current_time());
            self.state = ContextState::Suspended;
        }
    }

    /// Number of samples rendered so far.
    pub fn current_sample(&self) -> u64 {
        self.clock
    }

    /// Current time on the audio clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.clock as f64 / self.sample_rate
    }

    /// Number of voices that have been scheduled and not yet stopped.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Schedule a voice that sounds from `start` until `stop`, both in seconds
    /// on the audio clock. Start times in the past are moved to the present.
    ///
    /// Returns `None` without scheduling anything if the voice would stop
    /// before it starts.
    pub fn schedule<S: Source + 'static>(
        &mut self,
        source: S,
        start: f64,
        stop: f64,
    ) -> Option<VoiceId> {
        let start_sample = self.to_samples(start).max(self.clock);
        let stop_sample = self.to_samples(stop);
        if stop_sample <= start_sample {
            trace!("dropping empty voice {:.3}s - {:.3}s", start, stop);
            return None;
        }

        let id = VoiceId(self.next_voice_id);
        self.next_voice_id += 1;
        trace!("scheduled {:?} from {:.3}s to {:.3}s", id, start, stop);
        self.voices.push(ScheduledVoice {
            id,
            start: start_sample,
            stop: stop_sample,
            source: Box::new(source),
        });
        Some(id)
    }

    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate).round().max(0.0) as u64
    }

    /// Mix all live voices into `output`, overwriting its contents,
    /// and advance the clock by the length of the buffer.
    pub fn render(&mut self, output: &mut [f64]) {
        output.iter_mut().for_each(|s| *s = 0.0);
        if self.state == ContextState::Suspended {
            return;
        }

        let begin = self.clock;
        let end = begin + output.len() as u64;
        for voice in self.voices.iter_mut() {
            let from = voice.start.max(begin);
            let to = voice.stop.min(end);
            for position in from..to {
                let time = position as f64 / self.sample_rate;
                output[(position - begin) as usize] += voice.source.sample(time);
            }
        }

        let voice_count = self.voices.len();
        for voice_index in (0..voice_count).rev() {
            if self.voices[voice_index].stop <= end {
                trace!("removing stopped voice {:?}", self.voices[voice_index].id);
                self.voices.swap_remove(voice_index);
            }
        }
        self.clock = end;
    }
}

/// Owning handle to the process-wide audio context.
///
/// The context is only created on first use. If that fails, the failure is
/// logged once and the handle stays inert: every request for the context
/// returns `None` and nothing is played.
pub struct AudioHandle {
    config: ContextConfig,
    context: Option<AudioContext>,
    failed: bool,
}

impl AudioHandle {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            context: None,
            failed: false,
        }
    }

    /// The running context, created and resumed as needed.
    pub fn context(&mut self) -> Option<&mut AudioContext> {
        if self.context.is_none() && !self.failed {
            match AudioContext::new(self.config) {
                Ok(context) => {
                    info!(
                        "created audio context at {} Hz, {} samples per buffer",
                        self.config.sample_rate, self.config.buffer_size
                    );
                    self.context = Some(context);
                }
                Err(err) => {
                    error!("Failed to create audio context, audio is disabled: {}", err);
                    self.failed = true;
                }
            }
        }
        let context = self.context.as_mut()?;
        context.resume();
        Some(context)
    }

    /// The context if it has already been created, without creating or resuming it.
    pub fn existing(&mut self) -> Option<&mut AudioContext> {
        self.context.as_mut()
    }

    pub fn current(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn config(&self) -> ContextConfig {
        self.config
    }

    /// Whether creating the context failed.
    pub fn is_inert(&self) -> bool {
        self.failed
    }
}
