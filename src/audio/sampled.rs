//! Shared recorded-sample buffers and playback cursors

use std::sync::Arc;

use super::{Sample, SampleSource, SourceStatus};

/// Immutable decoded mono PCM, shared between playback cursors.
pub struct SampleBuffer {
    samples: Vec<Sample>,
}

impl SampleBuffer {
    pub fn new(samples: Vec<Sample>) -> Arc<Self> {
        Arc::new(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Plays a shared sample buffer, one-shot or looping.
///
/// Each source keeps its own cursor, so any number of them may play the
/// same buffer simultaneously. A non-looping source pads its final partial
/// frame with silence and reports [`SourceStatus::Closed`] on the call
/// after the buffer is exhausted.
pub struct RecordedSampleSource {
    buffer: Arc<SampleBuffer>,
    cursor: usize,
    looping: bool,
    played_out: bool,
}

impl RecordedSampleSource {
    pub fn new(buffer: Arc<SampleBuffer>, looping: bool) -> Self {
        Self {
            buffer,
            cursor: 0,
            looping,
            played_out: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.looping || !self.played_out
    }
}

impl SampleSource for RecordedSampleSource {
    fn get_audio_frame(&mut self, buffer_out: &mut [Sample]) -> SourceStatus {
        let samples = self.buffer.samples();
        if samples.is_empty() {
            self.played_out = true;
            return SourceStatus::Closed;
        }

        if self.looping {
            for out in buffer_out.iter_mut() {
                *out = samples[self.cursor];
                self.cursor = (self.cursor + 1) % samples.len();
            }
            return SourceStatus::Ok;
        }

        if self.played_out {
            return SourceStatus::Closed;
        }

        let available = samples.len() - self.cursor;
        let n = available.min(buffer_out.len());
        buffer_out[..n].copy_from_slice(&samples[self.cursor..self.cursor + n]);
        buffer_out[n..].fill(0.0);
        self.cursor += n;
        if self.cursor >= samples.len() {
            self.played_out = true;
        }
        SourceStatus::Ok
    }
}
