//! Customizer configuration
//!
//! Timing constants, endpoint location and feature flags for a customizer
//! instance. Everything has a default, so an empty TOML document is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::viewer::format::FrameFormat;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// A value is out of its allowed range
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Optional behaviours of the viewer and controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Start auto-rotation when a viewer mounts
    pub auto_rotate: bool,
    /// Try every configured format instead of only the first one
    pub format_fallback: bool,
    /// Warm the neighbouring frames after each successful display
    pub preload_neighbors: bool,
    /// Offer the AR render mode when the device reports AR readiness
    pub ar: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            format_fallback: true,
            preload_neighbors: true,
            ar: false,
        }
    }
}

/// Top-level customizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomizerConfig {
    /// Origin prepended to the asset endpoint path
    pub api_base_url: String,
    /// Frames in one full rotation
    pub total_frames: usize,
    pub auto_rotate_interval_ms: u64,
    /// Inactivity after a gesture before auto-rotation resumes
    pub idle_resume_ms: u64,
    /// Horizontal pixels of drag per frame step
    pub drag_sensitivity_px: f32,
    /// Frame image formats in the order they are attempted
    pub formats: Vec<FrameFormat>,
    /// Asset requests allowed on the shared transport at once
    pub max_concurrent_fetches: usize,
    pub engraving_max_chars: usize,
    /// Product price before material and stone adjustments, in cents
    pub base_price_cents: u64,
    pub features: FeatureFlags,
}

impl Default for CustomizerConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            total_frames: 36,
            auto_rotate_interval_ms: 100,
            idle_resume_ms: 2000,
            drag_sensitivity_px: 10.0,
            formats: vec![FrameFormat::Webp, FrameFormat::Avif, FrameFormat::Png],
            max_concurrent_fetches: 4,
            engraving_max_chars: 20,
            base_price_cents: 120_000,
            features: FeatureFlags::default(),
        }
    }
}

impl CustomizerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the viewer and scheduler cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_frames == 0 {
            return Err(invalid("total_frames", "must be at least 1"));
        }
        if self.auto_rotate_interval_ms == 0 {
            return Err(invalid("auto_rotate_interval_ms", "must be non-zero"));
        }
        if self.drag_sensitivity_px.is_nan() || self.drag_sensitivity_px <= 0.0 {
            return Err(invalid("drag_sensitivity_px", "must be positive"));
        }
        if self.formats.is_empty() {
            return Err(invalid("formats", "at least one format is required"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(invalid("max_concurrent_fetches", "must be at least 1"));
        }
        Ok(())
    }

    pub fn auto_rotate_interval(&self) -> Duration {
        Duration::from_millis(self.auto_rotate_interval_ms)
    }

    pub fn idle_resume(&self) -> Duration {
        Duration::from_millis(self.idle_resume_ms)
    }

    /// Formats the viewer actually attempts, honouring `format_fallback`
    pub fn active_formats(&self) -> &[FrameFormat] {
        if self.features.format_fallback {
            &self.formats
        } else {
            &self.formats[..self.formats.len().min(1)]
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
