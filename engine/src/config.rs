//! Engine configuration.
//!
//! Loaded from a TOML file with one table per component. Every section
//! and field is optional; omitted values take the defaults below.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::calibration::{AdvisorConfig, DriftConfig};
use crate::error::{ensure_positive, ConfigError, Result};
use crate::filter::FilterConfig;
use crate::interaction::{ClickConfig, EdgeConfig, SwipeConfig};

/// Display geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width_px: u32,
    pub height_px: u32,
    /// Pixels per density-independent pixel.
    pub density: f64,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width_px: 1080,
            height_px: 2400,
            density: 2.75,
        }
    }
}

impl ScreenConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("screen.width_px", self.width_px as f64)?;
        ensure_positive("screen.height_px", self.height_px as f64)?;
        ensure_positive("screen.density", self.density)?;
        Ok(())
    }
}

/// Fixed offset added to the filtered gaze point.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub offset_x: f32,
    pub offset_y: f32,
}

impl CursorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.offset_x.is_finite() {
            return Err(ConfigError::invalid("cursor.offset_x", "must be finite"));
        }
        if !self.offset_y.is_finite() {
            return Err(ConfigError::invalid("cursor.offset_y", "must be finite"));
        }
        Ok(())
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub screen: ScreenConfig,
    pub filter: FilterConfig,
    pub edge: EdgeConfig,
    pub swipe: SwipeConfig,
    pub click: ClickConfig,
    pub drift: DriftConfig,
    pub advisor: AdvisorConfig,
    pub cursor: CursorConfig,
}

impl EngineConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.screen.validate()?;
        self.filter.validate()?;
        self.edge.validate()?;
        self.swipe.validate()?;
        self.click.validate()?;
        self.drift.validate()?;
        self.advisor.validate()?;
        self.cursor.validate()?;
        Ok(())
    }
}
