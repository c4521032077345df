//! # Airband Radio
//!
//! Real-time receiver simulation and voice mixing core for an
//! air-traffic-control voice client.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           AUDIO THREAD                               │
//! │                                                                      │
//! │   speaker ◄── produce_frame ─┐            ┌─ consume_frame ◄── mic   │
//! │                              │            │                          │
//! │  ┌───────────────────────────▼────────────▼───────────────────────┐  │
//! │  │                      RadioMixer (radio::mixer)                 │  │
//! │  │                                                                │  │
//! │  │  per radio: freq match → crackle/attenuation → VHF-filtered    │  │
//! │  │  voice mix → click / white-noise / crackle / block-tone FX     │  │
//! │  │                                                                │  │
//! │  │  tx path: VU meter → input filter → Opus encode → packet out   │  │
//! │  └───────────────┬────────────────────────────────┬───────────────┘  │
//! └──────────────────┼────────────────────────────────┼──────────────────┘
//!                    │ stream-map lock                │ TxVoicePacket
//! ┌──────────────────▼──────────────┐      ┌──────────▼───────────────┐
//! │  StreamRegistry (radio::streams)│      │ VoiceTransport (network) │
//! │  callsign → decoder + FIFO +    │      │ provided by the caller   │
//! │  transceiver list, idle GC      │      └──────────▲───────────────┘
//! └──────────────────▲──────────────┘                 │
//!                    │ rx_voice_packet                │
//! ┌──────────────────┴────────────────────────────────┴──────────────────┐
//! │                     NETWORK / EVENT-LOOP THREAD                      │
//! │        decoded voice packets in, compressed voice packets out,       │
//! │        periodic stream maintenance sweep (spawn_maintenance)         │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All audio moves in fixed 20 ms mono frames at 48 kHz. The mixer acts
//! as a [`audio::SampleSource`] for the playback side of an audio device
//! and as a [`audio::SampleSink`] for the capture side; the `audio::device`
//! module provides a thin cpal shell for both.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod radio;

pub use config::{EngineConfig, RadioConfig};
pub use error::{Error, Result};
pub use radio::RadioMixer;

/// Engine-wide constants
pub mod constants {
    use std::time::Duration;

    /// Sample rate all processing runs at
    pub const SAMPLE_RATE_HZ: u32 = 48_000;

    /// Length of one audio frame in milliseconds
    pub const FRAME_LENGTH_MS: u32 = 20;

    /// Samples in one mono audio frame
    pub const FRAME_SIZE_SAMPLES: usize =
        (SAMPLE_RATE_HZ as usize / 1000) * FRAME_LENGTH_MS as usize;

    /// Default Opus bitrate for the voice uplink in bits per second
    pub const DEFAULT_VOICE_BITRATE: u32 = 16_000;

    /// Interval between incoming-stream maintenance sweeps
    pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

    /// Idle time after which an incoming stream is evicted
    pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

    /// VU meter response window, in frames (300 ms zero-to-peak)
    pub const VU_WINDOW_FRAMES: usize = 300 / FRAME_LENGTH_MS as usize;

    /// Maximum encoded voice packet size (MTU minus IP/UDP headers)
    pub const MAX_PACKET_SIZE: usize = 1472;
}
