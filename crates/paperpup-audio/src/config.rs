//! Engine and output device configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::Path;

use paperpup_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mix buffer size, in stereo frames, allocated before the first callback.
pub const DEFAULT_MIX_CAPACITY: usize = 4096;

const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8_000..=192_000;

/// Settings for opening the audio output.
///
/// Unset fields defer to the device's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output device name; the host default when unset.
    pub device: Option<String>,
    /// Requested output rate in Hz.
    pub sample_rate: Option<u32>,
    /// Requested device buffer size in frames.
    pub buffer_frames: Option<u32>,
    /// Stereo frames the mix buffer holds up front.
    pub mix_capacity_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: None,
            buffer_frames: None,
            mix_capacity_frames: DEFAULT_MIX_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading engine config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that every set value is usable.
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.sample_rate {
            if !SAMPLE_RATE_RANGE.contains(&rate) {
                return Err(Error::Config(format!(
                    "sample rate {rate} Hz outside {}..={} Hz",
                    SAMPLE_RATE_RANGE.start(),
                    SAMPLE_RATE_RANGE.end()
                )));
            }
        }

        if self.buffer_frames == Some(0) {
            return Err(Error::Config("buffer size must be positive".to_string()));
        }

        if self.mix_capacity_frames == 0 {
            return Err(Error::Config(
                "mix buffer capacity must be positive".to_string(),
            ));
        }

        if self.device.as_deref().is_some_and(str::is_empty) {
            return Err(Error::Config("device name is empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.device.is_none());
        assert!(config.sample_rate.is_none());
        assert_eq!(config.mix_capacity_frames, DEFAULT_MIX_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "sample_rate": 48000 }"#).unwrap();
        assert_eq!(config.sample_rate, Some(48_000));
        assert_eq!(config.buffer_frames, None);
        assert_eq!(config.mix_capacity_frames, DEFAULT_MIX_CAPACITY);
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "device": "pipewire",
            "sample_rate": 44100,
            "buffer_frames": 512,
            "mix_capacity_frames": 1024
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.device.as_deref(), Some("pipewire"));
        assert_eq!(config.buffer_frames, Some(512));
        assert_eq!(config.mix_capacity_frames, 1024);
    }

    #[test]
    fn test_rejects_bad_values() {
        for json in [
            r#"{ "sample_rate": 100 }"#,
            r#"{ "buffer_frames": 0 }"#,
            r#"{ "mix_capacity_frames": 0 }"#,
            r#"{ "device": "" }"#,
        ] {
            let err = EngineConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{json}: {err}");
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = EngineConfig::from_json_str("{ sample_rate").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/nonexistent/paperpup.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
