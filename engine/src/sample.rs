//! Input value types delivered by the tracking engine.

use serde::{Deserialize, Serialize};

/// Per-frame tracking outcome reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingState {
    Success,
    OtherFailure,
}

impl TrackingState {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::OtherFailure => "other-failure",
        }
    }
}

/// One raw gaze frame in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    /// Engine timestamp, monotonic milliseconds.
    pub timestamp_ms: u64,
    pub x: f32,
    pub y: f32,
    pub state: TrackingState,
    /// Fixation point, when the engine reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixation: Option<(f32, f32)>,
}

impl GazeSample {
    pub fn new(timestamp_ms: u64, x: f32, y: f32, state: TrackingState) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            state,
            fixation: None,
        }
    }

    pub fn valid(timestamp_ms: u64, x: f32, y: f32) -> Self {
        Self::new(timestamp_ms, x, y, TrackingState::Success)
    }

    pub fn with_fixation(mut self, fx: f32, fy: f32) -> Self {
        self.fixation = Some((fx, fy));
        self
    }
}

/// Periodic attentiveness report from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserStatus {
    /// Attention score in [0, 1].
    pub attention: f32,
    /// Drowsiness intensity in [0, 1].
    pub drowsiness: f32,
    pub is_drowsy: bool,
}

impl UserStatus {
    /// Build a status, clamping scores into [0, 1]. Non-finite scores
    /// become 0.
    pub fn new(attention: f32, drowsiness: f32, is_drowsy: bool) -> Self {
        Self {
            attention: unit(attention),
            drowsiness: unit(drowsiness),
            is_drowsy,
        }
    }
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::new(0.0, 0.0, false)
    }
}

fn unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
