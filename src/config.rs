//! Configuration management for the DTMF detector

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// Detector tuning parameters.
///
/// `tone_volume` is a dB-scale sensitivity (typically in [-40, 0]);
/// `tone_duration` is the analysis window length in milliseconds and
/// `tone_interval` the minimum gap enforced between two reported digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub tone_volume: i32,
    pub tone_duration: u32,
    pub tone_interval: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tone_volume: -35,
            tone_duration: 100,
            tone_interval: 100,
        }
    }
}

impl DetectorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: DetectorConfig = toml::from_str(&contents)
            .map_err(|e| Error::parse(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("DTMF").try_parsing(true))
            .build()?;

        let config: DetectorConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tone_duration == 0 {
            return Err(Error::invalid_configuration(
                "Tone duration must be positive",
            ));
        }

        if self.tone_interval == 0 {
            return Err(Error::invalid_configuration(
                "Tone interval must be positive",
            ));
        }

        if self.tone_volume > 0 {
            return Err(Error::invalid_configuration(
                "Tone volume is a dB level at or below zero",
            ));
        }

        Ok(())
    }
}
