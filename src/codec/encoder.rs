//! Opus encoder for outbound voice

use bytes::Bytes;
use opus::{Application, Bitrate, Channels, Encoder};

use crate::audio::Sample;
use crate::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::error::CodecError;

/// Mono VoIP Opus encoder, one engine frame per encode.
pub struct VoiceEncoder {
    encoder: Encoder,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    frames_encoded: u64,
    bytes_produced: u64,
}

impl VoiceEncoder {
    pub fn new(bitrate: u32) -> Result<Self, CodecError> {
        let mut encoder = Encoder::new(SAMPLE_RATE_HZ, Channels::Mono, Application::Voip)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        encoder
            .set_bitrate(Bitrate::Bits(bitrate as i32))
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set bitrate: {}", e)))?;
        // Narrowband speech over a lossy radio link: no FEC, no DTX, and
        // the sequence numbering relies on every frame being sent.
        encoder
            .set_inband_fec(false)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set FEC: {}", e)))?;
        encoder
            .set_dtx(false)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set DTX: {}", e)))?;
        encoder
            .set_signal(opus::Signal::Voice)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set signal type: {}", e)))?;

        // max Opus frame is about 1275 bytes
        let encode_buffer = vec![0u8; 4000];

        Ok(Self {
            encoder,
            encode_buffer,
            frames_encoded: 0,
            bytes_produced: 0,
        })
    }

    /// Encode one engine frame of mono samples.
    pub fn encode(&mut self, samples: &[Sample]) -> Result<Bytes, CodecError> {
        if samples.len() != FRAME_SIZE_SAMPLES {
            return Err(CodecError::InvalidFrameSize(samples.len()));
        }

        let size = self
            .encoder
            .encode_float(samples, &mut self.encode_buffer)
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;

        self.frames_encoded += 1;
        self.bytes_produced += size as u64;

        Ok(Bytes::copy_from_slice(&self.encode_buffer[..size]))
    }

    /// Reset the codec state (start of a new transmission).
    pub fn reset(&mut self) -> Result<(), CodecError> {
        self.encoder
            .reset_state()
            .map_err(|e| CodecError::EncoderInit(e.to_string()))
    }

    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
        }
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_VOICE_BITRATE;

    #[test]
    fn encoder_creation() {
        assert!(VoiceEncoder::new(DEFAULT_VOICE_BITRATE).is_ok());
    }

    #[test]
    fn encodes_one_frame() {
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();
        let samples = vec![0.0f32; FRAME_SIZE_SAMPLES];

        let encoded = encoder.encode(&samples).unwrap();
        assert!(!encoded.is_empty());
        assert!(encoded.len() < FRAME_SIZE_SAMPLES * 4);
        assert_eq!(encoder.stats().frames_encoded, 1);
    }

    #[test]
    fn rejects_wrong_frame_size() {
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();
        let samples = vec![0.0f32; FRAME_SIZE_SAMPLES - 1];

        match encoder.encode(&samples) {
            Err(CodecError::InvalidFrameSize(n)) => assert_eq!(n, FRAME_SIZE_SAMPLES - 1),
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }
}
