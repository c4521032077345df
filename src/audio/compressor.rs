//! Log-domain envelope compressor
//!
//! Single-band dynamics stage used by the narrowband voice chain. The
//! envelope follower runs in decibels with one-pole attack/release
//! smoothing and a hard knee.

use super::Sample;
use crate::constants::SAMPLE_RATE_HZ;

const KEY_FLOOR: f32 = 1e-10;

pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    attack_coef: f32,
    release_coef: f32,
    envelope_db: f32,
}

impl Compressor {
    pub fn new(attack_ms: f32, release_ms: f32, threshold_db: f32, ratio: f32) -> Self {
        Self {
            threshold_db,
            ratio,
            attack_coef: time_coefficient(attack_ms),
            release_coef: time_coefficient(release_ms),
            envelope_db: 0.0,
        }
    }

    /// Compress one sample.
    #[inline]
    pub fn process(&mut self, sample: Sample) -> Sample {
        let key_db = 20.0 * sample.abs().max(KEY_FLOOR).log10();
        let over_db = (key_db - self.threshold_db).max(0.0);

        self.envelope_db = if over_db > self.envelope_db {
            over_db + self.attack_coef * (self.envelope_db - over_db)
        } else {
            over_db + self.release_coef * (self.envelope_db - over_db)
        };

        let reduction_db = -self.envelope_db * (self.ratio - 1.0) / self.ratio;
        sample * 10.0f32.powf(reduction_db / 20.0)
    }

    pub fn reset(&mut self) {
        self.envelope_db = 0.0;
    }
}

fn time_coefficient(ms: f32) -> f32 {
    (-1.0 / (ms * 0.001 * SAMPLE_RATE_HZ as f32)).exp()
}
