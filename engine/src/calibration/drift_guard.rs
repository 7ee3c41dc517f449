//! Bounded drift correction.
//!
//! Small positional corrections may be applied between calibrations, but
//! never faster than the adaptation interval, never more than the session
//! and consecutive ceilings, and never beyond a cumulative drift ceiling.
//! Crossing the ceiling throws the accumulated correction away and asks
//! for a fresh calibration instead.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ensure_positive, ConfigError, Result};

// ── Config ─────────────────────────────────────────────────

/// Ceilings for drift correction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Minimum time between accepted adjustments (ms).
    pub min_adaptation_interval_ms: u64,
    pub max_adaptations_per_session: u32,
    pub max_consecutive_adaptations: u32,
    /// Largest single adjustment (px); larger ones are scaled down.
    pub max_step_px: f64,
    /// Ceiling on the accumulated adjustment magnitude (px).
    pub max_cumulative_px: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            min_adaptation_interval_ms: 300_000,
            max_adaptations_per_session: 10,
            max_consecutive_adaptations: 3,
            max_step_px: 20.0,
            max_cumulative_px: 50.0,
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("drift.max_step_px", self.max_step_px)?;
        ensure_positive("drift.max_cumulative_px", self.max_cumulative_px)?;
        if self.max_adaptations_per_session == 0 {
            return Err(ConfigError::invalid(
                "drift.max_adaptations_per_session",
                "must be at least 1",
            ));
        }
        if self.max_consecutive_adaptations == 0 {
            return Err(ConfigError::invalid(
                "drift.max_consecutive_adaptations",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// ── Safety level ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SafetyLevel {
    Safe,
    Caution,
    Warning,
    Critical,
}

impl SafetyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.9 {
            Self::Critical
        } else if ratio > 0.7 {
            Self::Warning
        } else if ratio > 0.5 {
            Self::Caution
        } else {
            Self::Safe
        }
    }

    /// User-facing wording. Kept mild: high levels are routine in long
    /// sessions.
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Safe => "Tracking is stable.",
            Self::Caution => "Tracking is adjusting to small shifts. All good for now.",
            Self::Warning => "A quick recalibration may improve accuracy when convenient.",
            Self::Critical => "Recalibrating soon is recommended for best accuracy.",
        }
    }
}

// ── Accumulator ────────────────────────────────────────────

/// Accepted-correction bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftAccumulator {
    pub total_drift_x: f64,
    pub total_drift_y: f64,
    pub adaptation_count: u32,
    pub consecutive_adaptations: u32,
    pub last_adaptation_ms: Option<u64>,
    pub session_start_ms: u64,
}

impl DriftAccumulator {
    fn new(session_start_ms: u64) -> Self {
        Self {
            total_drift_x: 0.0,
            total_drift_y: 0.0,
            adaptation_count: 0,
            consecutive_adaptations: 0,
            last_adaptation_ms: None,
            session_start_ms,
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.total_drift_x.hypot(self.total_drift_y)
    }
}

/// Reason an adjustment was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooSoon,
    SessionLimit,
    ConsecutiveLimit,
    CumulativeCeiling,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooSoon => "too-soon",
            Self::SessionLimit => "session-limit",
            Self::ConsecutiveLimit => "consecutive-limit",
            Self::CumulativeCeiling => "cumulative-ceiling",
        }
    }
}

/// Pending request for a fresh calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalibrationRequest {
    pub requested_ms: u64,
    /// Magnitude the rejected adjustment would have reached (px).
    pub would_be_drift_px: f64,
}

// ── Guard ──────────────────────────────────────────────────

pub struct CalibrationDriftGuard {
    config: DriftConfig,
    acc: DriftAccumulator,
    last_rejection: Option<Rejection>,
    recalibration: Option<RecalibrationRequest>,
}

impl CalibrationDriftGuard {
    pub fn new(config: DriftConfig, now_ms: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            acc: DriftAccumulator::new(now_ms),
            last_rejection: None,
            recalibration: None,
        })
    }

    pub fn accumulator(&self) -> &DriftAccumulator {
        &self.acc
    }

    pub fn last_rejection(&self) -> Option<Rejection> {
        self.last_rejection
    }

    /// Try to apply a drift correction. Gates run in order and stop at the
    /// first failure.
    pub fn safely_apply_adjustment(&mut self, dx: f64, dy: f64, now_ms: u64) -> bool {
        if !dx.is_finite() || !dy.is_finite() {
            debug!("drift: ignored non-finite adjustment");
            return false;
        }
        match self.check(dx, dy, now_ms) {
            Ok((sx, sy)) => {
                self.acc.total_drift_x += sx;
                self.acc.total_drift_y += sy;
                self.acc.adaptation_count += 1;
                self.acc.consecutive_adaptations += 1;
                self.acc.last_adaptation_ms = Some(now_ms);
                self.last_rejection = None;
                debug!(
                    "drift: accepted ({:.1}, {:.1}), total {:.1} px",
                    sx,
                    sy,
                    self.acc.magnitude()
                );
                true
            }
            Err(rejection) => {
                self.last_rejection = Some(rejection);
                false
            }
        }
    }

    fn check(&mut self, dx: f64, dy: f64, now_ms: u64) -> std::result::Result<(f64, f64), Rejection> {
        if let Some(last) = self.acc.last_adaptation_ms {
            if now_ms.saturating_sub(last) < self.config.min_adaptation_interval_ms {
                return Err(Rejection::TooSoon);
            }
        }
        if self.acc.adaptation_count >= self.config.max_adaptations_per_session {
            return Err(Rejection::SessionLimit);
        }
        if self.acc.consecutive_adaptations >= self.config.max_consecutive_adaptations {
            debug!("drift: consecutive limit reached, counter cleared");
            self.acc.consecutive_adaptations = 0;
            return Err(Rejection::ConsecutiveLimit);
        }

        let magnitude = dx.hypot(dy);
        let (sx, sy) = if magnitude > self.config.max_step_px {
            let k = self.config.max_step_px / magnitude;
            (dx * k, dy * k)
        } else {
            (dx, dy)
        };

        let total = (self.acc.total_drift_x + sx).hypot(self.acc.total_drift_y + sy);
        if total > self.config.max_cumulative_px {
            warn!(
                "drift: {:.1} px would exceed ceiling {:.1} px, recalibration requested",
                total, self.config.max_cumulative_px
            );
            self.zero_drift();
            self.recalibration = Some(RecalibrationRequest {
                requested_ms: now_ms,
                would_be_drift_px: total,
            });
            return Err(Rejection::CumulativeCeiling);
        }
        Ok((sx, sy))
    }

    fn zero_drift(&mut self) {
        self.acc.total_drift_x = 0.0;
        self.acc.total_drift_y = 0.0;
        self.acc.consecutive_adaptations = 0;
    }

    pub fn can_adapt(&self, now_ms: u64) -> bool {
        let interval_ok = self
            .acc
            .last_adaptation_ms
            .map_or(true, |last| {
                now_ms.saturating_sub(last) >= self.config.min_adaptation_interval_ms
            });
        interval_ok
            && self.acc.adaptation_count < self.config.max_adaptations_per_session
            && self.acc.consecutive_adaptations < self.config.max_consecutive_adaptations
            && self.acc.magnitude() < self.config.max_cumulative_px
    }

    pub fn recalibration_requested(&self) -> bool {
        self.recalibration.is_some()
    }

    /// Consume the pending recalibration request.
    pub fn take_recalibration_request(&mut self) -> Option<RecalibrationRequest> {
        self.recalibration.take()
    }

    pub fn drift_ratio(&self) -> f64 {
        self.acc.magnitude() / self.config.max_cumulative_px
    }

    pub fn adaptation_ratio(&self) -> f64 {
        self.acc.adaptation_count as f64 / self.config.max_adaptations_per_session as f64
    }

    pub fn safety_level(&self) -> SafetyLevel {
        SafetyLevel::from_ratio(self.drift_ratio().max(self.adaptation_ratio()))
    }

    pub fn recommendation(&self) -> &'static str {
        self.safety_level().recommendation()
    }

    /// Clear accumulated drift after a calibration. Counters for the
    /// session are kept.
    pub fn reset_drift(&mut self) {
        self.zero_drift();
        self.recalibration = None;
        self.last_rejection = None;
    }

    /// Start a new session.
    pub fn reset_session(&mut self, now_ms: u64) {
        info!("drift: session reset");
        self.acc = DriftAccumulator::new(now_ms);
        self.recalibration = None;
        self.last_rejection = None;
    }

    /// Safety report.
    pub fn status_sexp(&self, now_ms: u64) -> String {
        format!(
            "(:level :{} :drift-x {:.1} :drift-y {:.1} :drift-px {:.1} :adaptations {} :consecutive {} :session-ms {} :can-adapt {} :recalibrate {} :recommendation \"{}\")",
            self.safety_level().as_str(),
            self.acc.total_drift_x,
            self.acc.total_drift_y,
            self.acc.magnitude(),
            self.acc.adaptation_count,
            self.acc.consecutive_adaptations,
            now_ms.saturating_sub(self.acc.session_start_ms),
            if self.can_adapt(now_ms) { "t" } else { "nil" },
            if self.recalibration_requested() { "t" } else { "nil" },
            self.recommendation(),
        )
    }
}
