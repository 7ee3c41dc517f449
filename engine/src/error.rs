//! Error types for configuration, calibration and trace replay.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its permitted range
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Unknown filter preset name
    #[error("Unknown filter preset: {0}")]
    UnknownPreset(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Require a finite, strictly positive value.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(field, format!("must be > 0, got {}", value)));
    }
    Ok(())
}

/// Require a finite value inside `[lo, hi]`.
pub(crate) fn ensure_range(field: &'static str, value: f64, lo: f64, hi: f64) -> Result<()> {
    if !value.is_finite() || value < lo || value > hi {
        return Err(ConfigError::invalid(
            field,
            format!("must be within [{}, {}], got {}", lo, hi, value),
        ));
    }
    Ok(())
}

/// Calibration request rejections.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// A calibration is already collecting points
    #[error("Calibration already in progress")]
    AlreadyCalibrating,

    /// A lifecycle callback arrived with no calibration running
    #[error("No calibration in progress")]
    NotCalibrating,

    /// Minimum interval since the previous calibration has not elapsed
    #[error("Calibration requested too soon, retry in {remaining_ms} ms")]
    TooSoon { remaining_ms: u64 },

    /// Hourly calibration limit reached
    #[error("Calibration limit reached: {count} in the last hour (max {limit})")]
    TooFrequent { count: usize, limit: usize },
}

/// Trace replay error types
#[derive(Error, Debug)]
pub enum TraceError {
    /// Trace file could not be read
    #[error("Failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    /// A trace line is not a valid event
    #[error("Invalid trace event on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An event could not be written
    #[error("Failed to write trace event: {0}")]
    Encode(#[source] serde_json::Error),
}
