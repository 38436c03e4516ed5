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

//! Metronome clicks.

use crate::envelope::Param;
use crate::graph::{AudioContext, Gain, VoiceId};
use crate::oscillator::{Oscillator, WaveShape};

const ACCENT_FREQUENCY: f64 = 1200.0;
const FREQUENCY: f64 = 800.0;
const LENGTH: f64 = 0.1;

/// Play a short click, higher pitched when `accent` marks the start of a measure.
pub fn play_click(ctx: &mut AudioContext, accent: bool) -> Option<VoiceId> {
    let now = ctx.current_time();
    let frequency = if accent { ACCENT_FREQUENCY } else { FREQUENCY };
    let osc = Oscillator::new(WaveShape::Triangle, ctx.sample_rate(), frequency);

    let mut gain = Param::new(0.0);
    gain.set_value_at_time(0.0, now)
        .linear_ramp_to_value_at_time(0.5, now + 0.01)
        .linear_ramp_to_value_at_time(0.0, now + LENGTH);
    ctx.schedule(Gain::new(osc, gain), now, now + LENGTH)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::ContextConfig;

    #[test]
    fn click_is_short_and_bounded() {
        let mut ctx = AudioContext::new(ContextConfig::default()).unwrap();
        ctx.resume();
        assert!(play_click(&mut ctx, true).is_some());
        let mut buffer = vec![0.0; 4410];
        ctx.render(&mut buffer);
        assert_eq!(ctx.active_voices(), 0);
        let peak = buffer.iter().fold(0.0f64, |p, s| p.max(s.abs()));
        assert!(peak <= 0.5 && peak > 0.3, "{}", peak);
    }
}
