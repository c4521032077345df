//! Element-wise frame mixing kernel
//!
//! The hot loop of the whole engine: `dst[i] += gain * src[i]` over one
//! frame, vectorized in groups of 4 on x86_64 with a scalar tail. The
//! scalar implementation is the reference; the vectorized path must match
//! it within floating-point tolerance.

use super::Sample;
use crate::constants::FRAME_SIZE_SAMPLES;

/// One audio frame aligned for the vectorized kernel.
///
/// Mixing destinations (the accumulator and effect fetch scratch) use this
/// wrapper so the SSE path can issue aligned destination loads; sources may
/// be arbitrary slices.
#[derive(Clone)]
#[repr(C, align(16))]
pub struct AlignedFrame(pub [Sample; FRAME_SIZE_SAMPLES]);

impl AlignedFrame {
    pub fn zeroed() -> Box<Self> {
        Box::new(AlignedFrame([0.0; FRAME_SIZE_SAMPLES]))
    }

    #[inline]
    pub fn fill_silence(&mut self) {
        self.0.fill(0.0);
    }
}

impl std::ops::Deref for AlignedFrame {
    type Target = [Sample];

    fn deref(&self) -> &[Sample] {
        &self.0
    }
}

impl std::ops::DerefMut for AlignedFrame {
    fn deref_mut(&mut self) -> &mut [Sample] {
        &mut self.0
    }
}

/// Mix `src` into `dst` at `gain`: `dst[i] += gain * src[i]`.
///
/// Takes the vectorized path when `dst` is 16-byte aligned, the scalar
/// reference otherwise. `src` may be unaligned either way.
#[inline]
pub fn mix_buffers(dst: &mut [Sample], src: &[Sample], gain: f32) {
    debug_assert_eq!(dst.len(), src.len());

    #[cfg(target_arch = "x86_64")]
    {
        if dst.as_ptr() as usize % 16 == 0 {
            // SAFETY: alignment of dst was just checked; lengths match.
            unsafe { mix_buffers_sse(dst, src, gain) };
            return;
        }
    }

    mix_buffers_scalar(dst, src, gain);
}

/// Scalar reference implementation of [`mix_buffers`].
pub fn mix_buffers_scalar(dst: &mut [Sample], src: &[Sample], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += gain * *s;
    }
}

/// Scale `dst` in place by `gain`.
pub fn scale_buffer(dst: &mut [Sample], gain: f32) {
    #[cfg(target_arch = "x86_64")]
    {
        if dst.as_ptr() as usize % 16 == 0 {
            // SAFETY: alignment of dst was just checked.
            unsafe { scale_buffer_sse(dst, gain) };
            return;
        }
    }

    for d in dst.iter_mut() {
        *d *= gain;
    }
}

#[cfg(target_arch = "x86_64")]
unsafe fn mix_buffers_sse(dst: &mut [Sample], src: &[Sample], gain: f32) {
    use std::arch::x86_64::*;

    let n = dst.len();
    let gain_reg = _mm_set1_ps(gain);
    let mut i = 0usize;
    // SAFETY: dst is 16-byte aligned (caller contract) so _mm_load_ps /
    // _mm_store_ps are valid; src uses unaligned loads; i + 4 <= n keeps
    // every access in bounds.
    while i + 4 <= n {
        let d = _mm_load_ps(dst.as_ptr().add(i));
        let s = _mm_loadu_ps(src.as_ptr().add(i));
        let scaled = _mm_mul_ps(s, gain_reg);
        _mm_store_ps(dst.as_mut_ptr().add(i), _mm_add_ps(d, scaled));
        i += 4;
    }
    // scalar remainder tail
    while i < n {
        dst[i] += gain * src[i];
        i += 1;
    }
}

#[cfg(target_arch = "x86_64")]
unsafe fn scale_buffer_sse(dst: &mut [Sample], gain: f32) {
    use std::arch::x86_64::*;

    let n = dst.len();
    let gain_reg = _mm_set1_ps(gain);
    let mut i = 0usize;
    // SAFETY: dst is 16-byte aligned (caller contract); i + 4 <= n keeps
    // every access in bounds.
    while i + 4 <= n {
        let d = _mm_load_ps(dst.as_ptr().add(i));
        _mm_store_ps(dst.as_mut_ptr().add(i), _mm_mul_ps(d, gain_reg));
        i += 4;
    }
    while i < n {
        dst[i] *= gain;
        i += 1;
    }
}
