//! Configuration loading.
//!
//! TOML file with full defaults, so an empty (or absent) file is a valid
//! configuration, plus `ROOMSCRIBE_*` environment overrides for the
//! settings that change between deployments.

use crate::error::{Result, RoomscribeError};
use crate::recognition::RecognitionOptions;
use crate::session::{SessionConfig, StreamBridgeConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub room: RoomConfig,
    pub recognition: RecognitionConfig,
    pub relay: RelayConfig,
}

/// Room identity, used for logging and the pipe-mode track id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoomConfig {
    pub name: String,
    pub identity: String,
}

/// Recognition backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Backend address as `host:port`.
    pub endpoint: String,
    pub language: String,
    pub punctuate: bool,
    pub model: Option<String>,
}

/// Relay pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum container bytes per outbound message.
    pub chunk_size: usize,
    /// Minimum interval between outbound messages, in milliseconds.
    pub send_interval_ms: u64,
    /// Codec clock rate for synthesized pipe-mode timestamps.
    pub clock_rate: u32,
    /// Opus frame duration for synthesized pipe-mode timestamps.
    pub frame_duration_ms: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            identity: "roomscribe".to_string(),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:8090".to_string(),
            language: "en-US".to_string(),
            punctuate: true,
            model: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            send_interval_ms: 10,
            clock_rate: 48000,
            frame_duration_ms: 20,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is unreadable or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file does
    /// not exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(RoomscribeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ROOMSCRIBE_ENDPOINT → recognition.endpoint
    /// - ROOMSCRIBE_LANGUAGE → recognition.language
    /// - ROOMSCRIBE_MODEL → recognition.model
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("ROOMSCRIBE_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.recognition.endpoint = endpoint;
        }

        if let Ok(language) = std::env::var("ROOMSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.recognition.language = language;
        }

        if let Ok(model) = std::env::var("ROOMSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.recognition.model = Some(model);
        }

        self
    }

    /// Rejects values that would stall or corrupt the relay pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.relay.chunk_size == 0 {
            return Err(RoomscribeError::ConfigParse {
                message: "relay.chunk_size must be non-zero".to_string(),
            });
        }
        if self.relay.clock_rate == 0 {
            return Err(RoomscribeError::ConfigParse {
                message: "relay.clock_rate must be non-zero".to_string(),
            });
        }
        if self.relay.frame_duration_ms == 0 {
            return Err(RoomscribeError::ConfigParse {
                message: "relay.frame_duration_ms must be non-zero".to_string(),
            });
        }
        if self.recognition.endpoint.is_empty() {
            return Err(RoomscribeError::ConfigParse {
                message: "recognition.endpoint must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The recognition options this configuration describes.
    pub fn recognition_options(&self) -> RecognitionOptions {
        RecognitionOptions {
            language: self.recognition.language.clone(),
            punctuate: self.recognition.punctuate,
            model: self.recognition.model.clone(),
        }
    }

    /// The per-session settings this configuration describes.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_options(self.recognition_options())
            .with_bridge(StreamBridgeConfig {
                chunk_size: self.relay.chunk_size,
                send_interval: Duration::from_millis(self.relay.send_interval_ms),
            })
    }

    /// Timestamp increment per pipe-mode packet, in clock-rate units.
    pub fn timestamp_step(&self) -> u32 {
        self.relay.clock_rate / 1000 * self.relay.frame_duration_ms
    }
}
