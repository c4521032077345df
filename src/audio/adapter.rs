//! Frame-size adapters at the device boundary
//!
//! The engine works in fixed frames; audio hardware rarely does. These
//! adapters sit between the two, splitting engine frames into arbitrary
//! device pulls and accumulating arbitrary device pushes back into engine
//! frames.

use super::mix::AlignedFrame;
use super::{Sample, SampleSink, SampleSource, SourceStatus};
use crate::constants::FRAME_SIZE_SAMPLES;

/// Serves arbitrary-length pulls from a fixed-frame source.
pub struct SourceFrameSizeAdapter {
    source: Box<dyn SampleSource>,
    buffer: Box<AlignedFrame>,
    offset: usize,
    available: usize,
    closed: bool,
}

impl SourceFrameSizeAdapter {
    pub fn new(source: Box<dyn SampleSource>) -> Self {
        Self {
            source,
            buffer: AlignedFrame::zeroed(),
            offset: 0,
            available: 0,
            closed: false,
        }
    }

    /// Fill `buffer_out` completely, pulling whole engine frames from the
    /// wrapped source as needed. Once the source reports a non-OK status
    /// the rest of the output is silence and the status is returned.
    pub fn pull(&mut self, buffer_out: &mut [Sample]) -> SourceStatus {
        let mut written = 0;
        while written < buffer_out.len() {
            if self.offset == self.available {
                if self.closed {
                    buffer_out[written..].fill(0.0);
                    return SourceStatus::Closed;
                }
                match self.source.get_audio_frame(&mut self.buffer.0) {
                    SourceStatus::Ok => {
                        self.offset = 0;
                        self.available = FRAME_SIZE_SAMPLES;
                    }
                    status => {
                        self.closed = true;
                        buffer_out[written..].fill(0.0);
                        return status;
                    }
                }
            }
            let n = (self.available - self.offset).min(buffer_out.len() - written);
            buffer_out[written..written + n]
                .copy_from_slice(&self.buffer.0[self.offset..self.offset + n]);
            self.offset += n;
            written += n;
        }
        SourceStatus::Ok
    }
}

/// Accumulates arbitrary-length pushes into whole engine frames.
pub struct SinkFrameSizeAdapter {
    sink: Box<dyn SampleSink>,
    buffer: Box<AlignedFrame>,
    fill: usize,
}

impl SinkFrameSizeAdapter {
    pub fn new(sink: Box<dyn SampleSink>) -> Self {
        Self {
            sink,
            buffer: AlignedFrame::zeroed(),
            fill: 0,
        }
    }

    /// Append `buffer_in`, forwarding every completed engine frame to the
    /// wrapped sink. Partial frames stay buffered across calls.
    pub fn push(&mut self, buffer_in: &[Sample]) {
        let mut consumed = 0;
        while consumed < buffer_in.len() {
            let n = (FRAME_SIZE_SAMPLES - self.fill).min(buffer_in.len() - consumed);
            self.buffer.0[self.fill..self.fill + n]
                .copy_from_slice(&buffer_in[consumed..consumed + n]);
            self.fill += n;
            consumed += n;
            if self.fill == FRAME_SIZE_SAMPLES {
                self.sink.put_audio_frame(&self.buffer.0);
                self.fill = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Source counting up from zero so split boundaries are verifiable.
    struct RampSource {
        next: f32,
        frames_left: usize,
    }

    impl SampleSource for RampSource {
        fn get_audio_frame(&mut self, buffer_out: &mut [Sample]) -> SourceStatus {
            if self.frames_left == 0 {
                return SourceStatus::Closed;
            }
            self.frames_left -= 1;
            for s in buffer_out.iter_mut() {
                *s = self.next;
                self.next += 1.0;
            }
            SourceStatus::Ok
        }
    }

    struct CountingSink {
        frames: Arc<AtomicUsize>,
        last_first_sample: Arc<parking_lot::Mutex<Vec<Sample>>>,
    }

    impl SampleSink for CountingSink {
        fn put_audio_frame(&mut self, buffer_in: &[Sample]) {
            assert_eq!(buffer_in.len(), FRAME_SIZE_SAMPLES);
            self.frames.fetch_add(1, Ordering::Relaxed);
            self.last_first_sample.lock().push(buffer_in[0]);
        }
    }

    #[test]
    fn source_adapter_preserves_sample_order_across_odd_pulls() {
        let source = RampSource {
            next: 0.0,
            frames_left: 4,
        };
        let mut adapter = SourceFrameSizeAdapter::new(Box::new(source));

        let mut collected = Vec::new();
        let mut chunk = vec![0.0; 777];
        for _ in 0..4 {
            assert_eq!(adapter.pull(&mut chunk), SourceStatus::Ok);
            collected.extend_from_slice(&chunk);
        }

        for (i, s) in collected.iter().enumerate() {
            assert_eq!(*s, i as f32);
        }
    }

    #[test]
    fn source_adapter_pads_silence_after_close() {
        let source = RampSource {
            next: 0.0,
            frames_left: 1,
        };
        let mut adapter = SourceFrameSizeAdapter::new(Box::new(source));

        let mut chunk = vec![1.0; FRAME_SIZE_SAMPLES + 100];
        assert_eq!(adapter.pull(&mut chunk), SourceStatus::Closed);
        assert_eq!(chunk[FRAME_SIZE_SAMPLES - 1], (FRAME_SIZE_SAMPLES - 1) as f32);
        assert!(chunk[FRAME_SIZE_SAMPLES..].iter().all(|s| *s == 0.0));

        // further pulls stay closed and silent
        assert_eq!(adapter.pull(&mut chunk), SourceStatus::Closed);
        assert!(chunk.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn sink_adapter_emits_whole_frames_only() {
        let frames = Arc::new(AtomicUsize::new(0));
        let firsts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = CountingSink {
            frames: frames.clone(),
            last_first_sample: firsts.clone(),
        };
        let mut adapter = SinkFrameSizeAdapter::new(Box::new(sink));

        // 3 engine frames delivered in awkward chunk sizes
        let total = FRAME_SIZE_SAMPLES * 3;
        let data: Vec<Sample> = (0..total).map(|i| i as f32).collect();
        for chunk in data.chunks(531) {
            adapter.push(chunk);
        }

        assert_eq!(frames.load(Ordering::Relaxed), 3);
        assert_eq!(
            firsts.lock().as_slice(),
            &[0.0, FRAME_SIZE_SAMPLES as f32, (2 * FRAME_SIZE_SAMPLES) as f32]
        );
    }

    #[test]
    fn sink_adapter_holds_partial_frame() {
        let frames = Arc::new(AtomicUsize::new(0));
        let firsts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = CountingSink {
            frames: frames.clone(),
            last_first_sample: firsts,
        };
        let mut adapter = SinkFrameSizeAdapter::new(Box::new(sink));

        adapter.push(&vec![0.0; FRAME_SIZE_SAMPLES - 1]);
        assert_eq!(frames.load(Ordering::Relaxed), 0);

        adapter.push(&[0.0]);
        assert_eq!(frames.load(Ordering::Relaxed), 1);
    }
}
