//! Scanner configuration.
//!
//! Every setting is optional. A configuration file only needs the values
//! it changes:
//!
//! ```toml
//! [scanner]
//! threshold = 2
//! symbologies = ["ean13", "code128"]
//! workers = 2
//! region = { top = 25.0, right = 10.0, bottom = 25.0, left = 10.0 }
//!
//! [output]
//! metrics_port = 9090
//! ```

use crate::capture::CameraConstraintTier;
use crate::consensus::DEFAULT_THRESHOLD;
use crate::decode::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("consensus threshold must be at least 1")]
    InvalidThreshold,
    #[error("invalid decoder settings: {0}")]
    InvalidDecoder(String),
    #[error("invalid camera tier '{tier}': {reason}")]
    InvalidTier { tier: String, reason: String },
    #[error("at least one camera tier is required")]
    NoTiers,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Settings for one scan session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Agreeing reads required before a code is confirmed.
    pub threshold: u32,
    #[serde(flatten)]
    pub decoder: DecoderConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            decoder: DecoderConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Confirms on the first read.
    pub fn single_read() -> Self {
        Self {
            threshold: 1,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        self.decoder.validate().map_err(ConfigError::InvalidDecoder)
    }
}

/// Camera fallback ladder, tried top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub tiers: Vec<CameraConstraintTier>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            tiers: CameraConstraintTier::default_ladder(),
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }
        for tier in &self.tiers {
            tier.validate().map_err(|reason| ConfigError::InvalidTier {
                tier: tier.name.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { metrics_port: 0 }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub scanner: ScanConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates TOML configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scanner.validate()?;
        self.camera.validate()
    }
}
