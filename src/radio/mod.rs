//! Receiver simulation: stream registry, effects, transmit path and the
//! mixing engine

pub mod effects;
pub mod meter;
pub mod mixer;
pub mod streams;
pub mod tx;

pub use effects::EffectResources;
pub use mixer::{crackle_factor, RadioMixer};
pub use streams::{StreamRegistry, VoiceStream};
