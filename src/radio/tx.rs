//! Transmit path: captured frame → optional cleanup → compression

use bytes::Bytes;

use crate::audio::input_filter::InputFilter;
use crate::audio::mix::AlignedFrame;
use crate::audio::Sample;
use crate::codec::VoiceEncoder;
use crate::error::CodecError;

/// Owns the encoder and the optional microphone cleanup chain.
pub struct VoiceTxPath {
    input_filter: Option<InputFilter>,
    encoder: VoiceEncoder,
    filter_scratch: Box<AlignedFrame>,
}

impl VoiceTxPath {
    pub fn new(bitrate: u32) -> Result<Self, CodecError> {
        Ok(Self {
            input_filter: None,
            encoder: VoiceEncoder::new(bitrate)?,
            filter_scratch: AlignedFrame::zeroed(),
        })
    }

    pub fn set_filter_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.input_filter.is_none() {
                self.input_filter = Some(InputFilter::new());
            }
        } else {
            self.input_filter = None;
        }
    }

    pub fn filter_enabled(&self) -> bool {
        self.input_filter.is_some()
    }

    /// Compress one captured frame, applying the cleanup chain when
    /// enabled.
    pub fn compress_frame(&mut self, buffer_in: &[Sample]) -> Result<Bytes, CodecError> {
        match &mut self.input_filter {
            Some(filter) => {
                filter.process_frame(&mut self.filter_scratch.0, buffer_in);
                self.encoder.encode(&self.filter_scratch.0)
            }
            None => self.encoder.encode(buffer_in),
        }
    }

    /// Reset codec and filter state for a fresh transmission.
    pub fn reset(&mut self) {
        if let Err(e) = self.encoder.reset() {
            tracing::warn!(error = %e, "voice encoder reset failed");
        }
        if let Some(filter) = &mut self.input_filter {
            filter.reset();
        }
    }
}
