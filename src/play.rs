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

//! The player ties everything together: it owns the audio context and the
//! transport of the one progression that is currently playing, and turns the
//! effects of each tick into sound.

use log::{debug, info, trace, warn};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::graph::{AudioContext, AudioHandle, ContextConfig};
use crate::instrument::{click, drums, tone};
use crate::output::{AudioSink, OutputError};
use crate::progression::Progression;
use crate::sequencer::{Effect, Settings};
use crate::transport::{Highlight, Transport};
use crate::wave::AudioBuffer;

/// Length of a chord preview in seconds.
const PREVIEW_LENGTH: f64 = 1.0;

pub struct Player {
    audio: AudioHandle,
    /// At most one progression plays at any time.
    transport: Option<Transport>,
    settings: Settings,
    rng: Pcg32,
}

impl Player {
    /// Create a player. The audio context is only created once something is played.
    /// Without a seed, randomness is seeded from the operating system.
    pub fn new(config: ContextConfig, seed: Option<u64>) -> Self {
        Self {
            audio: AudioHandle::new(config),
            transport: None,
            settings: Settings::default(),
            rng: seed.map_or_else(Pcg32::from_entropy, Pcg32::seed_from_u64),
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Id of the progression that is currently playing.
    pub fn playing_id(&self) -> Option<&str> {
        self.transport
            .as_ref()
            .filter(|t| t.is_running())
            .map(|t| t.progression().id.as_str())
    }

    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    pub fn highlight(&self) -> Highlight {
        self.transport
            .as_ref()
            .map(Transport::highlight)
            .unwrap_or_default()
    }

    /// Number of voices that are still sounding.
    pub fn active_voices(&self) -> usize {
        self.audio.current().map_or(0, AudioContext::active_voices)
    }

    /// Start playing the progression, stopping whatever else was playing,
    /// or stop it if it is the one currently playing.
    /// Returns whether the progression is playing afterwards.
    pub fn toggle_play(&mut self, progression: &Progression) -> bool {
        if self.playing_id() == Some(progression.id.as_str()) {
            self.stop();
            return false;
        }
        self.stop();

        let ctx = match self.audio.context() {
            Some(ctx) => ctx,
            None => {
                warn!("cannot play {:?} without audio", progression.id);
                return false;
            }
        };
        let mut transport = Transport::new(progression.clone(), self.settings, ctx.sample_rate());
        if transport.start(ctx.current_sample()) {
            self.transport = Some(transport);
            true
        } else {
            false
        }
    }

    /// Stop playback. Sounds that were already scheduled fade out normally.
    pub fn stop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.stop();
        }
    }

    /// Change the playback settings, also for the progression that is playing.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
        let now = self.audio.current().map_or(0, AudioContext::current_sample);
        if let Some(transport) = self.transport.as_mut() {
            transport.set_settings(settings, now);
        }
    }

    /// Replace a progression that may currently be playing, e.g. after it was
    /// transposed or got a melody. Other progressions are ignored.
    pub fn update_progression(&mut self, progression: &Progression) {
        let now = self.audio.current().map_or(0, AudioContext::current_sample);
        if let Some(transport) = self.transport.as_mut() {
            if transport.progression().id == progression.id {
                debug!("updating playing progression {:?}", progression.id);
                transport.set_progression(progression.clone(), now);
            }
        }
        if !self.transport.as_ref().map_or(false, Transport::is_running) {
            self.transport = None;
        }
    }

    /// Play a single chord right away, independently of the transport.
    /// Returns the number of voices started.
    pub fn preview_chord(&mut self, symbol: &str) -> usize {
        let timbre = self.settings.timbre;
        match self.audio.context() {
            Some(ctx) => tone::play_chord(ctx, symbol, timbre, PREVIEW_LENGTH).len(),
            None => 0,
        }
    }

    /// Render the next block of audio, firing ticks at their exact sample positions.
    /// Returns the effects of all ticks fired during this block.
    pub fn render(&mut self, buffer: &mut AudioBuffer) -> Vec<Effect> {
        let mut fired = Vec::new();
        let ctx = match self.audio.existing() {
            Some(ctx) => ctx,
            None => {
                buffer.fill_zero();
                return fired;
            }
        };

        let samples = buffer.samples_mut();
        let mut offset = 0;
        while offset < samples.len() {
            let remaining = samples.len() - offset;
            let until_tick = self
                .transport
                .as_ref()
                .and_then(|t| t.samples_until_tick(ctx.current_sample()));
            let chunk = match until_tick {
                Some(0) => {
                    if let Some(transport) = self.transport.as_mut() {
                        let effects = transport.tick(&mut self.rng);
                        for effect in effects.iter() {
                            perform(ctx, effect, &self.settings, &mut self.rng);
                        }
                        fired.extend(effects);
                    }
                    continue;
                }
                Some(delay) => (delay as usize).min(remaining),
                None => remaining,
            };
            ctx.render(&mut samples[offset..offset + chunk]);
            offset += chunk;
        }

        if fired.contains(&Effect::Stop) {
            self.transport = None;
        }
        fired
    }

    /// Render into `sink` until playback has stopped by itself or `loops`
    /// passes through the progression were played, then let all sounds ring out.
    pub fn play_to_sink(
        &mut self,
        sink: &mut dyn AudioSink,
        loops: Option<u32>,
    ) -> Result<(), OutputError> {
        let buffer_size = self.audio.config().buffer_size;
        let mut buffer = AudioBuffer::new(buffer_size);
        let mut passes = 0;
        while self.playing_id().is_some() {
            let effects = self.render(&mut buffer);
            sink.write(&buffer)?;
            passes += effects.iter().filter(|e| **e == Effect::Loop).count() as u32;
            if loops.map_or(false, |loops| passes >= loops) {
                info!("played {} passes", passes);
                self.stop();
            }
        }
        self.drain(sink)
    }

    /// Render into `sink` until no more voices are sounding.
    pub fn drain(&mut self, sink: &mut dyn AudioSink) -> Result<(), OutputError> {
        let mut buffer = AudioBuffer::new(self.audio.config().buffer_size);
        while self.active_voices() > 0 {
            self.render(&mut buffer);
            sink.write(&buffer)?;
        }
        Ok(())
    }
}

/// Turn an effect into sound on the audio context.
fn perform(ctx: &mut AudioContext, effect: &Effect, settings: &Settings, rng: &mut Pcg32) {
    match effect {
        Effect::PlayChord { notes, duration } => {
            tone::play_notes(ctx, notes, settings.timbre, *duration);
        }
        Effect::PlayNote { note, duration } => {
            tone::play_pitch(ctx, *note, settings.timbre, *duration);
        }
        Effect::Click { accent } => {
            click::play_click(ctx, *accent);
        }
        Effect::Drum { beat } => {
            drums::play_drum_hit(ctx, *beat, rng);
        }
        Effect::HighlightChord(_)
        | Effect::HighlightMelodyNote(_)
        | Effect::Loop
        | Effect::Stop => trace!("{:?}", effect),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::output::MemorySink;

    fn player() -> Player {
        Player::new(ContextConfig::default(), Some(3))
    }

    fn progression(id: &str, chords: &[&str]) -> Progression {
        Progression::from_chords(id, chords.iter().copied())
    }

    #[test]
    fn only_one_progression_plays() {
        let mut player = player();
        let a = progression("a", &["C", "G"]);
        let b = progression("b", &["Am", "F"]);
        assert!(player.toggle_play(&a));
        assert_eq!(player.playing_id(), Some("a"));
        assert!(player.toggle_play(&b));
        assert_eq!(player.playing_id(), Some("b"));
        assert!(!player.toggle_play(&b));
        assert_eq!(player.playing_id(), None);
        assert_eq!(player.highlight(), Highlight::default());
    }

    #[test]
    fn ticks_fire_on_schedule() {
        let mut player = player();
        player.set_settings(Settings {
            metronome: true,
            ..Settings::default()
        });
        player.toggle_play(&progression("a", &["C"]));
        let mut buffer = AudioBuffer::new(441);
        let mut clicks = 0;
        // one second at 120 bpm has four eighth notes
        for _ in 0..100 {
            let effects = player.render(&mut buffer);
            clicks += effects
                .iter()
                .filter(|e| matches!(e, Effect::Click { .. }))
                .count();
        }
        assert_eq!(player.transport().unwrap().session().unwrap().tick(), 4);
        assert_eq!(clicks, 2);
    }

    #[test]
    fn stops_at_end_and_rings_out() {
        let mut player = player();
        player.set_settings(Settings {
            looping: false,
            timbre: crate::instrument::Timbre::Synth,
            ..Settings::default()
        });
        player.toggle_play(&progression("a", &["C"]));
        let mut sink = MemorySink::new();
        player.play_to_sink(&mut sink, None).unwrap();
        assert_eq!(player.playing_id(), None);
        assert_eq!(player.active_voices(), 0);
        // eight ticks of a quarter second, only the first one sounds
        let seconds = sink.samples().len() as f64 / 44100.0;
        assert!(seconds > 1.75 && seconds < 2.1, "{}", seconds);
    }

    #[test]
    fn looping_playback_is_cut_after_passes() {
        let mut player = player();
        player.toggle_play(&progression("a", &["C", "G"]));
        let mut sink = MemorySink::new();
        player.play_to_sink(&mut sink, Some(2)).unwrap();
        let seconds = sink.samples().len() as f64 / 44100.0;
        // two passes of two measures at 120 bpm
        assert!(seconds > 7.5 && seconds < 8.5, "{}", seconds);
    }

    #[test]
    fn inert_audio_plays_nothing() {
        let mut player = Player::new(
            ContextConfig {
                sample_rate: 44100,
                buffer_size: 0,
            },
            None,
        );
        assert!(!player.toggle_play(&progression("a", &["C"])));
        assert_eq!(player.preview_chord("C"), 0);
        let mut buffer = AudioBuffer::new(16);
        assert!(player.render(&mut buffer).is_empty());
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn update_replaces_playing_progression() {
        let mut player = player();
        player.toggle_play(&progression("a", &["C", "G", "F"]));
        player.update_progression(&progression("b", &["Dm"]));
        assert_eq!(player.transport().unwrap().progression().chords.len(), 3);
        player.update_progression(&progression("a", &["Dm"]));
        assert_eq!(player.transport().unwrap().progression().chords, vec!["Dm"]);
        player.update_progression(&progression("a", &[]));
        assert_eq!(player.playing_id(), None);
    }

    #[test]
    fn preview_uses_timbre() {
        let mut player = player();
        assert_eq!(player.preview_chord("Cmaj7"), 4);
        assert_eq!(player.preview_chord("nope"), 0);
        assert_eq!(player.playing_id(), None);
    }
}
