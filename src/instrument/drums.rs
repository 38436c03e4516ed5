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

//! Procedural percussion in a fixed 4/4 rock pattern.

use log::trace;
use rand::Rng;

use crate::envelope::Param;
use crate::filter::BiquadType;
use crate::graph::{AudioContext, Filtered, Gain, VoiceId};
use crate::noise::{white_noise, BufferPlayer};
use crate::oscillator::{Oscillator, WaveShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drum {
    Kick,
    Snare,
    HiHat,
}

/// The drums hit on a quarter note: kick on beats 1 and 3 of the measure,
/// snare on 2 and 4, hi-hat on every beat.
///
/// ```
/// use harmonia::instrument::drums::*;
///
/// assert_eq!(pattern(0), &[Drum::Kick, Drum::HiHat]);
/// assert_eq!(pattern(5), &[Drum::Snare, Drum::HiHat]);
/// ```
pub fn pattern(beat: u64) -> &'static [Drum] {
    match beat % 4 {
        0 | 2 => &[Drum::Kick, Drum::HiHat],
        _ => &[Drum::Snare, Drum::HiHat],
    }
}

/// Play the drums of the given quarter note, starting now.
pub fn play_drum_hit<R: Rng>(ctx: &mut AudioContext, beat: u64, rng: &mut R) -> Vec<VoiceId> {
    pattern(beat)
        .iter()
        .filter_map(|drum| play_drum(ctx, *drum, rng))
        .collect()
}

pub fn play_drum<R: Rng>(ctx: &mut AudioContext, drum: Drum, rng: &mut R) -> Option<VoiceId> {
    let now = ctx.current_time();
    let sample_rate = ctx.sample_rate();
    trace!("{:?} at {:.3}s", drum, now);
    match drum {
        Drum::Kick => {
            let mut pitch = Param::new(150.0);
            pitch
                .set_value_at_time(150.0, now)
                .exponential_ramp_to_value_at_time(0.01, now + 0.1);
            let osc = Oscillator::with_frequency(WaveShape::Sine, sample_rate, pitch);
            let voice = Gain::new(osc, decay(1.0, now, 0.1));
            ctx.schedule(voice, now, now + 0.15)
        }
        Drum::Snare => {
            let noise = BufferPlayer::new(white_noise(rng, sample_rate, 1.0));
            let filtered = Filtered::new(noise, BiquadType::highpass(1000.0), sample_rate);
            let voice = Gain::new(filtered, decay(0.5, now, 0.1));
            ctx.schedule(voice, now, now + 0.15)
        }
        Drum::HiHat => {
            let noise = BufferPlayer::new(white_noise(rng, sample_rate, 0.1));
            let band = Filtered::new(noise, BiquadType::bandpass(10000.0), sample_rate);
            let filtered = Filtered::new(band, BiquadType::highpass(7000.0), sample_rate);
            let voice = Gain::new(filtered, decay(0.2, now, 0.05));
            ctx.schedule(voice, now, now + 0.1)
        }
    }
}

/// Exponential decay from `level` to 1% over `length` seconds.
fn decay(level: f64, start: f64, length: f64) -> Param {
    let mut gain = Param::new(level);
    gain.set_value_at_time(level, start)
        .exponential_ramp_to_value_at_time(0.01, start + length);
    gain
}
