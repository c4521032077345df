//! Narrowband airband voice emulation
//!
//! Chains dynamics compression and band-limiting EQ to make clean decoded
//! voice sound like it came out of an aircraft-band receiver. One instance
//! per incoming stream; the filters are stateful.

use super::biquad::BiquadFilter;
use super::compressor::Compressor;
use super::Sample;

const COMPRESSOR_ATTACK_MS: f32 = 5.0;
const COMPRESSOR_RELEASE_MS: f32 = 10.0;
const COMPRESSOR_THRESHOLD_DB: f32 = 16.0;
const COMPRESSOR_RATIO: f32 = 6.0;
const COMPRESSOR_POST_GAIN_DB: f32 = -5.5;

pub struct VhfFilter {
    compressor: Compressor,
    post_gain: f32,
    high_pass: BiquadFilter,
    peaking_eq: BiquadFilter,
    low_pass: BiquadFilter,
}

impl VhfFilter {
    pub fn new() -> Self {
        Self {
            compressor: Compressor::new(
                COMPRESSOR_ATTACK_MS,
                COMPRESSOR_RELEASE_MS,
                COMPRESSOR_THRESHOLD_DB,
                COMPRESSOR_RATIO,
            ),
            post_gain: 10.0f32.powf(COMPRESSOR_POST_GAIN_DB / 20.0),
            high_pass: BiquadFilter::high_pass(450.0, 1.0),
            peaking_eq: BiquadFilter::peaking_eq(2200.0, 0.25, 13.0),
            low_pass: BiquadFilter::low_pass(3000.0, 1.0),
        }
    }

    /// Apply the chain to a whole frame. Always writes every sample of
    /// `buffer_out`; the input is never modified in place.
    pub fn transform_frame(&mut self, buffer_out: &mut [Sample], buffer_in: &[Sample]) {
        for (out, &sample) in buffer_out.iter_mut().zip(buffer_in.iter()) {
            let s = self.compressor.process(sample) * self.post_gain;
            let s = self.high_pass.transform_one(s);
            let s = self.peaking_eq.transform_one(s);
            *out = self.low_pass.transform_one(s);
        }
    }
}

impl Default for VhfFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_SIZE_SAMPLES;

    #[test]
    fn output_covers_whole_frame() {
        let mut filter = VhfFilter::new();
        let input = vec![0.3; FRAME_SIZE_SAMPLES];
        let mut output = vec![9.9; FRAME_SIZE_SAMPLES];

        filter.transform_frame(&mut output, &input);

        assert!(output.iter().all(|s| *s != 9.9));
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn dc_is_rejected() {
        let mut filter = VhfFilter::new();
        let input = vec![0.5; FRAME_SIZE_SAMPLES];
        let mut output = vec![0.0; FRAME_SIZE_SAMPLES];

        // run several frames so the high-pass settles
        for _ in 0..20 {
            filter.transform_frame(&mut output, &input);
        }
        let tail_energy: f32 = output[FRAME_SIZE_SAMPLES - 100..]
            .iter()
            .map(|s| s.abs())
            .sum::<f32>()
            / 100.0;
        assert!(tail_energy < 0.01, "dc leak {tail_energy}");
    }

    #[test]
    fn in_band_speech_survives() {
        let mut filter = VhfFilter::new();
        let step = 2.0 * std::f32::consts::PI * 1000.0 / crate::constants::SAMPLE_RATE_HZ as f32;
        let input: Vec<Sample> = (0..FRAME_SIZE_SAMPLES)
            .map(|i| (i as f32 * step).sin() * 0.5)
            .collect();
        let mut output = vec![0.0; FRAME_SIZE_SAMPLES];

        for _ in 0..10 {
            filter.transform_frame(&mut output, &input);
        }
        let rms: f32 = (output.iter().map(|s| s * s).sum::<f32>() / output.len() as f32).sqrt();
        assert!(rms > 0.05, "in-band rms {rms}");
    }
}
