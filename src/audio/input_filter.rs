//! Optional microphone cleanup ahead of the voice encoder
//!
//! Rumble high-pass plus a downward noise gate. Enabled per user setting;
//! when disabled the captured frame goes straight to the compression sink.

use super::biquad::BiquadFilter;
use super::Sample;
use crate::constants::SAMPLE_RATE_HZ;

const RUMBLE_CUTOFF_HZ: f32 = 100.0;
const GATE_OPEN_THRESHOLD: f32 = 0.015;
const GATE_ATTENUATION: f32 = 0.1;
const ENVELOPE_MS: f32 = 10.0;
const GAIN_SMOOTH_MS: f32 = 15.0;

pub struct InputFilter {
    rumble: BiquadFilter,
    envelope: f32,
    gain: f32,
    envelope_coef: f32,
    gain_coef: f32,
}

impl InputFilter {
    pub fn new() -> Self {
        Self {
            rumble: BiquadFilter::high_pass(RUMBLE_CUTOFF_HZ, 0.7),
            envelope: 0.0,
            gain: 1.0,
            envelope_coef: one_pole_coefficient(ENVELOPE_MS),
            gain_coef: one_pole_coefficient(GAIN_SMOOTH_MS),
        }
    }

    /// Clean one captured frame into `buffer_out`.
    pub fn process_frame(&mut self, buffer_out: &mut [Sample], buffer_in: &[Sample]) {
        for (out, &sample) in buffer_out.iter_mut().zip(buffer_in.iter()) {
            let s = self.rumble.transform_one(sample);

            self.envelope =
                self.envelope_coef * self.envelope + (1.0 - self.envelope_coef) * s.abs();
            let target = if self.envelope >= GATE_OPEN_THRESHOLD {
                1.0
            } else {
                GATE_ATTENUATION
            };
            self.gain = self.gain_coef * self.gain + (1.0 - self.gain_coef) * target;

            *out = s * self.gain;
        }
    }

    pub fn reset(&mut self) {
        self.rumble.reset();
        self.envelope = 0.0;
        self.gain = 1.0;
    }
}

impl Default for InputFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn one_pole_coefficient(ms: f32) -> f32 {
    (-1.0 / (ms * 0.001 * SAMPLE_RATE_HZ as f32)).exp()
}
