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

//! Pitched voices for chords and melody notes.

use log::{trace, warn};

use super::Timbre;
use crate::chord;
use crate::envelope::Param;
use crate::filter::BiquadType;
use crate::graph::{AudioContext, Filtered, Gain, Mix, VoiceId};
use crate::note::Note;
use crate::oscillator::{Oscillator, WaveShape};
use crate::tuning::Tuning;
use crate::util;

/// Peak gain of everything that is played at once by one call,
/// split evenly between the voices of a chord.
pub const HEADROOM: f64 = 0.3;

/// Voices keep running for this long after their envelope has ended.
const STOP_DELAY: f64 = 0.05;

const ATTACK: f64 = 0.005;
const PIANO_SUSTAIN: f64 = 0.2;
const PIANO_CUTOFF: f64 = 4000.0;
/// Detuning of the upper piano layers.
const PIANO_DETUNE_CENTS: f64 = 4.0;

/// Play a single note for `duration` seconds, starting now.
pub fn play_pitch(
    ctx: &mut AudioContext,
    note: Note,
    timbre: Timbre,
    duration: f64,
) -> Option<VoiceId> {
    play_voice(ctx, note, timbre, duration, HEADROOM)
}

/// Play all notes together, sharing the available headroom.
pub fn play_notes(
    ctx: &mut AudioContext,
    notes: &[Note],
    timbre: Timbre,
    duration: f64,
) -> Vec<VoiceId> {
    if notes.is_empty() {
        return Vec::new();
    }
    let gain = HEADROOM / notes.len() as f64;
    notes
        .iter()
        .filter_map(|note| play_voice(ctx, *note, timbre, duration, gain))
        .collect()
}

/// Resolve a chord symbol and play its notes. Symbols without a valid root
/// play nothing.
pub fn play_chord(
    ctx: &mut AudioContext,
    symbol: &str,
    timbre: Timbre,
    duration: f64,
) -> Vec<VoiceId> {
    let notes = chord::resolve(symbol);
    if notes.is_empty() {
        warn!("not playing chord {:?}, it has no valid root", symbol);
    }
    play_notes(ctx, &notes, timbre, duration)
}

fn play_voice(
    ctx: &mut AudioContext,
    note: Note,
    timbre: Timbre,
    duration: f64,
    peak: f64,
) -> Option<VoiceId> {
    let now = ctx.current_time();
    let sample_rate = ctx.sample_rate();
    let duration = duration.max(0.0);
    let frequency = Tuning::default().frequency(note);
    let stop = now + duration + STOP_DELAY;
    trace!("{} {} for {:.3}s at {:.3}", timbre, note, duration, peak);

    match timbre {
        Timbre::Synth => {
            let osc = Oscillator::new(WaveShape::Triangle, sample_rate, frequency);
            let voice = Gain::new(osc, synth_envelope(now, duration, peak));
            ctx.schedule(voice, now, stop)
        }
        Timbre::Piano => {
            let detune = util::from_cents(PIANO_DETUNE_CENTS);
            let mut layers = Mix::new();
            layers
                .add(Oscillator::new(WaveShape::Sine, sample_rate, frequency))
                .add(Gain::new(
                    Oscillator::new(WaveShape::Saw, sample_rate, 2.0 * frequency * detune),
                    Param::constant(0.4),
                ))
                .add(Gain::new(
                    Oscillator::new(WaveShape::Square, sample_rate, 1.5 * frequency / detune),
                    Param::constant(0.2),
                ));
            let voice = Filtered::new(
                Gain::new(layers, piano_envelope(now, duration, peak)),
                BiquadType::lowpass(PIANO_CUTOFF),
                sample_rate,
            );
            ctx.schedule(voice, now, stop)
        }
    }
}

/// Linear attack to `peak`, hold, then a linear release to silence
/// that ends exactly after `duration`.
fn synth_envelope(start: f64, duration: f64, peak: f64) -> Param {
    let end = start + duration;
    let attack_end = start + ATTACK.min(duration);
    let release = 0.05f64.min(0.3 * duration);
    let release_start = (end - release).max(attack_end);

    let mut gain = Param::new(0.0);
    gain.set_value_at_time(0.0, start)
        .linear_ramp_to_value_at_time(peak, attack_end)
        .set_value_at_time(peak, release_start)
        .linear_ramp_to_value_at_time(0.0, end);
    gain
}

/// Linear attack to `peak`, exponential decay to the sustain level,
/// then a linear release to near silence that ends after `duration`.
fn piano_envelope(start: f64, duration: f64, peak: f64) -> Param {
    let end = start + duration;
    let attack_end = start + ATTACK.min(duration);
    let release = 0.1f64.min(0.3 * duration);
    let release_start = (end - release).max(attack_end);
    let decay_end = (attack_end + 0.08f64.min(0.2 * duration)).min(release_start);
    let sustain = PIANO_SUSTAIN * peak;

    let mut gain = Param::new(0.0);
    gain.set_value_at_time(0.0, start)
        .linear_ramp_to_value_at_time(peak, attack_end)
        .exponential_ramp_to_value_at_time(sustain, decay_end)
        .set_value_at_time(sustain, release_start)
        .linear_ramp_to_value_at_time(0.001 * peak, end);
    gain
}
