//! Engine configuration surface

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_VOICE_BITRATE;
use crate::error::{Error, Result};

/// One configured radio channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Tuned frequency in Hz
    pub frequency_hz: u32,
    /// Output gain, linear; callers typically clamp to 0–1.5
    #[serde(default = "default_gain")]
    pub gain: f32,
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identity sent with outbound voice packets
    pub callsign: String,
    pub radios: Vec<RadioConfig>,
    /// Index of the radio used for transmit
    #[serde(default)]
    pub tx_radio: usize,
    /// Receive-side radio effects (static, clicks, block tone)
    #[serde(default = "default_true")]
    pub output_effects: bool,
    /// Microphone cleanup ahead of the encoder
    #[serde(default)]
    pub input_filter: bool,
    /// Opus bitrate for the voice uplink
    #[serde(default = "default_bitrate")]
    pub voice_bitrate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            callsign: String::new(),
            radios: vec![
                RadioConfig {
                    frequency_hz: 122_800_000,
                    gain: 1.0,
                },
                RadioConfig {
                    frequency_hz: 121_500_000,
                    gain: 1.0,
                },
            ],
            tx_radio: 0,
            output_effects: true,
            input_filter: false,
            voice_bitrate: DEFAULT_VOICE_BITRATE,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

fn default_gain() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_bitrate() -> u32 {
    DEFAULT_VOICE_BITRATE
}
