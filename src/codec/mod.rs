//! Opus codec wrappers for the voice path
//!
//! The engine uses one fixed profile: mono VoIP at the engine sample rate,
//! one codec frame per engine frame.

pub mod decoder;
pub mod encoder;

pub use decoder::VoiceDecoder;
pub use encoder::VoiceEncoder;
