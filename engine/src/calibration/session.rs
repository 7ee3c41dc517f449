//! Calibration lifecycle as driven by the tracking engine's callbacks.

use tracing::{debug, info, warn};

use super::advisor::{AccuracyTier, CalibrationMode};
use crate::error::CalibrationError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationPhase {
    Idle,
    Collecting {
        mode: CalibrationMode,
        accuracy: AccuracyTier,
        started_ms: u64,
        /// Targets shown so far.
        point_index: usize,
        /// Progress on the current target (0-1).
        progress: f32,
        target: Option<(f32, f32)>,
    },
}

impl CalibrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting { .. } => "collecting",
        }
    }
}

/// Summary of a calibration that left the collecting phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub mode: CalibrationMode,
    pub accuracy: AccuracyTier,
    pub points: usize,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct CalibrationSession {
    phase: CalibrationPhase,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self {
            phase: CalibrationPhase::Idle,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.phase, CalibrationPhase::Collecting { .. })
    }

    pub fn start(
        &mut self,
        mode: CalibrationMode,
        accuracy: AccuracyTier,
        now_ms: u64,
    ) -> Result<(), CalibrationError> {
        if self.is_calibrating() {
            warn!("calibration: start refused, already collecting");
            return Err(CalibrationError::AlreadyCalibrating);
        }
        info!(
            "Calibration started ({} points, {} accuracy)",
            mode.points(),
            accuracy.as_str()
        );
        self.phase = CalibrationPhase::Collecting {
            mode,
            accuracy,
            started_ms: now_ms,
            point_index: 0,
            progress: 0.0,
            target: None,
        };
        Ok(())
    }

    pub fn on_progress(&mut self, value: f32) -> Result<f32, CalibrationError> {
        match &mut self.phase {
            CalibrationPhase::Collecting { progress, .. } => {
                *progress = if value.is_finite() {
                    value.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                Ok(*progress)
            }
            CalibrationPhase::Idle => Err(CalibrationError::NotCalibrating),
        }
    }

    /// Record the next target. Returns its 1-based index.
    pub fn on_next_point(&mut self, x: f32, y: f32) -> Result<usize, CalibrationError> {
        match &mut self.phase {
            CalibrationPhase::Collecting {
                point_index,
                progress,
                target,
                ..
            } => {
                *point_index += 1;
                *progress = 0.0;
                *target = Some((x, y));
                debug!("calibration: point {} at ({:.0}, {:.0})", point_index, x, y);
                Ok(*point_index)
            }
            CalibrationPhase::Idle => Err(CalibrationError::NotCalibrating),
        }
    }

    /// Leave the collecting phase (finished or canceled).
    pub fn end(&mut self, now_ms: u64) -> Result<SessionSummary, CalibrationError> {
        match std::mem::replace(&mut self.phase, CalibrationPhase::Idle) {
            CalibrationPhase::Collecting {
                mode,
                accuracy,
                started_ms,
                point_index,
                ..
            } => Ok(SessionSummary {
                mode,
                accuracy,
                points: point_index,
                duration_ms: now_ms.saturating_sub(started_ms),
            }),
            CalibrationPhase::Idle => Err(CalibrationError::NotCalibrating),
        }
    }

    pub fn status_sexp(&self) -> String {
        match self.phase {
            CalibrationPhase::Idle => "(:phase :idle)".to_string(),
            CalibrationPhase::Collecting {
                mode,
                accuracy,
                point_index,
                progress,
                ..
            } => format!(
                "(:phase :collecting :mode :{} :accuracy :{} :point {} :progress {:.2})",
                mode.as_str(),
                accuracy.as_str(),
                point_index,
                progress,
            ),
        }
    }
}
