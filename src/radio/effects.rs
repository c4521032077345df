//! Shared effect sample set for the receiver simulation

use std::sync::Arc;

use crate::audio::generators::{PinkNoiseGenerator, WhiteNoiseGenerator};
use crate::audio::sampled::SampleBuffer;
use crate::audio::SampleSource;
use crate::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

/// Squelch click playback gain
pub const CLICK_GAIN: f32 = 1.0;

/// Co-channel block tone gain
pub const BLOCK_TONE_GAIN: f32 = 0.22;

/// Background static gain for VHF reception
pub const WHITE_NOISE_GAIN: f32 = 0.01;

/// Background static gain for HF reception
pub const HF_WHITE_NOISE_GAIN: f32 = 0.6;

/// Heterodyne tone simulating two stations blocking each other
pub const BLOCK_TONE_FREQUENCY_HZ: f32 = 180.0;

/// Frequencies below this are treated as HF
pub const HF_FREQUENCY_CEILING_HZ: u32 = 30_000_000;

pub fn freq_is_hf(frequency: u32) -> bool {
    frequency < HF_FREQUENCY_CEILING_HZ
}

/// The recorded effect samples every radio shares.
///
/// Buffers are immutable and reference-counted; each radio plays them
/// through its own cursor. Clients with recorded effect audio supply their
/// own buffers; [`EffectResources::synthesized`] builds a deterministic
/// stand-in set from the noise generators.
pub struct EffectResources {
    pub click: Arc<SampleBuffer>,
    pub white_noise: Arc<SampleBuffer>,
    pub hf_white_noise: Arc<SampleBuffer>,
    pub crackle: Arc<SampleBuffer>,
}

impl EffectResources {
    pub fn new(
        click: Arc<SampleBuffer>,
        white_noise: Arc<SampleBuffer>,
        hf_white_noise: Arc<SampleBuffer>,
        crackle: Arc<SampleBuffer>,
    ) -> Self {
        Self {
            click,
            white_noise,
            hf_white_noise,
            crackle,
        }
    }

    /// Build a synthesized effect set.
    pub fn synthesized() -> Self {
        Self {
            click: synth_click(),
            white_noise: synth_noise_bed(false),
            hf_white_noise: synth_noise_bed(true),
            crackle: synth_crackle(),
        }
    }
}

/// 40 ms burst of decaying noise; reads as a squelch click.
fn synth_click() -> Arc<SampleBuffer> {
    let len = SAMPLE_RATE_HZ as usize * 40 / 1000;
    let mut noise = WhiteNoiseGenerator::new(0.4);
    let samples = (0..len)
        .map(|i| {
            let decay = 1.0 - (i as f32 / len as f32);
            noise.iterate_one_sample() * decay * decay
        })
        .collect();
    SampleBuffer::new(samples)
}

/// One second of noise bed; pink-tilted for the harsher HF variant.
fn synth_noise_bed(hf: bool) -> Arc<SampleBuffer> {
    let mut samples = vec![0.0; SAMPLE_RATE_HZ as usize];
    if hf {
        let mut generator = PinkNoiseGenerator::new(1.0);
        fill_from(&mut generator, &mut samples);
    } else {
        let mut generator = WhiteNoiseGenerator::new(1.0);
        fill_from(&mut generator, &mut samples);
    }
    SampleBuffer::new(samples)
}

/// One second of sparse impulses over a faint noise floor.
fn synth_crackle() -> Arc<SampleBuffer> {
    let mut noise = WhiteNoiseGenerator::new(1.0);
    let samples = (0..SAMPLE_RATE_HZ as usize)
        .map(|_| {
            let s = noise.iterate_one_sample();
            if s.abs() > 0.995 {
                s.signum() * 0.8
            } else {
                s * 0.02
            }
        })
        .collect();
    SampleBuffer::new(samples)
}

fn fill_from(source: &mut dyn SampleSource, samples: &mut [f32]) {
    for chunk in samples.chunks_mut(FRAME_SIZE_SAMPLES) {
        let _ = source.get_audio_frame(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hf_boundary() {
        assert!(freq_is_hf(29_999_999));
        assert!(!freq_is_hf(30_000_000));
        assert!(!freq_is_hf(121_500_000));
    }

    #[test]
    fn synthesized_set_is_populated() {
        let resources = EffectResources::synthesized();
        assert!(!resources.click.is_empty());
        assert!(!resources.white_noise.is_empty());
        assert!(!resources.hf_white_noise.is_empty());
        assert!(!resources.crackle.is_empty());
    }

    #[test]
    fn click_decays_to_silence() {
        let resources = EffectResources::synthesized();
        let samples = resources.click.samples();
        let head: f32 = samples[..100].iter().map(|s| s.abs()).sum();
        let tail: f32 = samples[samples.len() - 100..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 10.0, "head {head} tail {tail}");
    }

    #[test]
    fn crackle_is_mostly_quiet() {
        let resources = EffectResources::synthesized();
        let loud = resources
            .crackle
            .samples()
            .iter()
            .filter(|s| s.abs() > 0.5)
            .count();
        // impulses are sparse
        assert!(loud < resources.crackle.len() / 50, "{loud} loud samples");
    }
}
