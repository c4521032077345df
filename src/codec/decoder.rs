//! Opus decoder for incoming voice

use opus::{Channels, Decoder};

use crate::audio::Sample;
use crate::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::error::CodecError;

/// Mono Opus decoder with packet-loss concealment.
pub struct VoiceDecoder {
    decoder: Decoder,
    /// Decoding buffer (reused to avoid allocations); sized for the
    /// largest legal Opus frame (120 ms)
    decode_buffer: Vec<Sample>,
    frames_decoded: u64,
    frames_concealed: u64,
}

impl VoiceDecoder {
    pub fn new() -> Result<Self, CodecError> {
        let decoder = Decoder::new(SAMPLE_RATE_HZ, Channels::Mono)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        let decode_buffer = vec![0.0f32; SAMPLE_RATE_HZ as usize * 120 / 1000];

        Ok(Self {
            decoder,
            decode_buffer,
            frames_decoded: 0,
            frames_concealed: 0,
        })
    }

    /// Decode one packet; returns the decoded samples.
    pub fn decode(&mut self, data: &[u8]) -> Result<&[Sample], CodecError> {
        let samples = self
            .decoder
            .decode_float(data, &mut self.decode_buffer, false)
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;

        self.frames_decoded += 1;
        Ok(&self.decode_buffer[..samples])
    }

    /// Conceal one missing engine frame.
    pub fn decode_plc(&mut self) -> Result<&[Sample], CodecError> {
        let samples = self
            .decoder
            .decode_float(&[], &mut self.decode_buffer[..FRAME_SIZE_SAMPLES], false)
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;

        self.frames_concealed += 1;
        Ok(&self.decode_buffer[..samples])
    }

    /// Reset the codec state.
    pub fn reset(&mut self) -> Result<(), CodecError> {
        self.decoder
            .reset_state()
            .map_err(|e| CodecError::DecoderInit(e.to_string()))
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_concealed: self.frames_concealed,
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_concealed: u64,
}
