//! Calibration service: one lock around the calibration-side state.
//!
//! Calibration callbacks, user-status reports and drift adjustments can
//! arrive from the tracking engine's producer thread while gaze samples
//! are processed elsewhere. Everything they touch lives behind a single
//! mutex, and the notices they produce are handed to the listener through
//! the scheduler, never while the lock is held.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::advisor::{
    recommended_settings, AccuracyTier, AdvisorConfig, CalibrationMode, CalibrationQuality,
    CalibrationQualityAdvisor, CalibrationRecommendation, CalibrationStrategy,
};
use super::drift_guard::{CalibrationDriftGuard, DriftConfig, SafetyLevel};
use super::history::{CalibrationHistory, DriftTrend, HistoryStats, RecordOutcome};
use super::session::{CalibrationSession, SessionSummary};
use crate::clock::Clock;
use crate::error::{CalibrationError, Result};
use crate::sample::UserStatus;
use crate::scheduler::Scheduler;

// ── Notices ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalibrationReason {
    DriftCeiling,
    DriftTrend,
    PoorQuality,
}

impl RecalibrationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DriftCeiling => "drift-ceiling",
            Self::DriftTrend => "drift-trend",
            Self::PoorQuality => "poor-quality",
        }
    }
}

/// Event delivered to the calibration listener.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationNotice {
    Started {
        mode: CalibrationMode,
        accuracy: AccuracyTier,
    },
    Completed(SessionSummary),
    Canceled,
    LowQuality { score: f64 },
    DriftTrend(DriftTrend),
    QualityAssessed(CalibrationQuality),
    Recommendation(CalibrationRecommendation),
    RecalibrationRequested(RecalibrationReason),
}

impl CalibrationNotice {
    pub fn to_sexp(&self) -> String {
        match self {
            Self::Started { mode, accuracy } => format!(
                "(:calibration :started :mode :{} :accuracy :{})",
                mode.as_str(),
                accuracy.as_str()
            ),
            Self::Completed(s) => format!(
                "(:calibration :completed :points {} :duration-ms {})",
                s.points, s.duration_ms
            ),
            Self::Canceled => "(:calibration :canceled)".to_string(),
            Self::LowQuality { score } => {
                format!("(:calibration :low-quality :score {:.2})", score)
            }
            Self::DriftTrend(t) => format!(
                "(:calibration :drift-trend :dx {:.1} :dy {:.1})",
                t.dx, t.dy
            ),
            Self::QualityAssessed(q) => format!("(:calibration :quality {})", q.to_sexp()),
            Self::Recommendation(r) => format!("(:calibration :recommend {})", r.to_sexp()),
            Self::RecalibrationRequested(reason) => {
                format!("(:calibration :recalibrate :reason :{})", reason.as_str())
            }
        }
    }
}

/// Receiver for calibration notices.
pub trait CalibrationListener: Send + Sync {
    fn on_notice(&self, notice: &CalibrationNotice);
}

// ── Service ────────────────────────────────────────────────

struct Inner {
    session: CalibrationSession,
    history: CalibrationHistory,
    advisor: CalibrationQualityAdvisor,
    guard: CalibrationDriftGuard,
    last_status: Option<UserStatus>,
    /// Status captured at calibration start.
    pre_status: Option<UserStatus>,
    /// Set after a finished calibration until the next status arrives.
    awaiting_assessment: Option<UserStatus>,
}

pub struct CalibrationService {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    listener: Arc<dyn CalibrationListener>,
}

impl CalibrationService {
    pub fn new(
        advisor: AdvisorConfig,
        drift: DriftConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        listener: Arc<dyn CalibrationListener>,
    ) -> Result<Self> {
        let now = clock.now_ms();
        Ok(Self {
            inner: Mutex::new(Inner {
                session: CalibrationSession::new(),
                history: CalibrationHistory::new(),
                advisor: CalibrationQualityAdvisor::new(advisor)?,
                guard: CalibrationDriftGuard::new(drift, now)?,
                last_status: None,
                pre_status: None,
                awaiting_assessment: None,
            }),
            clock,
            scheduler,
            listener,
        })
    }

    fn publish(&self, notices: Vec<CalibrationNotice>) {
        for notice in notices {
            let listener = Arc::clone(&self.listener);
            self.scheduler
                .post(Box::new(move || listener.on_notice(&notice)));
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.inner.lock().session.is_calibrating()
    }

    pub fn start(
        &self,
        mode: CalibrationMode,
        accuracy: AccuracyTier,
    ) -> std::result::Result<(), CalibrationError> {
        {
            let mut inner = self.inner.lock();
            inner
                .history
                .check_safe_to_calibrate(self.clock.unix_millis())?;
            inner.session.start(mode, accuracy, self.clock.now_ms())?;
            inner.pre_status = inner.last_status;
            inner.awaiting_assessment = None;
        }
        self.publish(vec![CalibrationNotice::Started { mode, accuracy }]);
        Ok(())
    }

    /// Start with settings chosen from the latest user status.
    pub fn start_adaptive(
        &self,
    ) -> std::result::Result<(CalibrationMode, AccuracyTier), CalibrationError> {
        let status = self.inner.lock().last_status;
        let (mode, accuracy) = match status.map(|s| recommended_settings(&s).0) {
            Some(CalibrationStrategy::Precision) | None => {
                (CalibrationMode::FivePoint, AccuracyTier::High)
            }
            Some(CalibrationStrategy::Balanced) => {
                (CalibrationMode::FivePoint, AccuracyTier::Default)
            }
            Some(CalibrationStrategy::QuickStart) => (CalibrationMode::OnePoint, AccuracyTier::Low),
        };
        self.start(mode, accuracy)?;
        Ok((mode, accuracy))
    }

    pub fn on_progress(&self, progress: f32) -> std::result::Result<f32, CalibrationError> {
        self.inner.lock().session.on_progress(progress)
    }

    pub fn on_next_point(&self, x: f32, y: f32) -> std::result::Result<usize, CalibrationError> {
        self.inner.lock().session.on_next_point(x, y)
    }

    /// Engine reported a finished calibration.
    pub fn on_finished(
        &self,
        samples: Vec<f64>,
        center_offset: (f64, f64),
    ) -> std::result::Result<RecordOutcome, CalibrationError> {
        let mut notices = Vec::new();
        let outcome = {
            let mut inner = self.inner.lock();
            let summary = inner.session.end(self.clock.now_ms())?;
            info!(
                "Calibration finished ({} points, {} ms)",
                summary.points, summary.duration_ms
            );
            notices.push(CalibrationNotice::Completed(summary));

            let outcome = inner
                .history
                .record(samples, center_offset, self.clock.unix_millis());
            if outcome.low_quality {
                notices.push(CalibrationNotice::LowQuality {
                    score: outcome.record.quality_score,
                });
            }
            if let Some(trend) = outcome.drift_trend {
                notices.push(CalibrationNotice::DriftTrend(trend));
                notices.push(CalibrationNotice::RecalibrationRequested(
                    RecalibrationReason::DriftTrend,
                ));
            }
            inner.guard.reset_drift();
            inner.awaiting_assessment = inner.pre_status;
            if inner.awaiting_assessment.is_none() {
                debug!("No user status before calibration, skipping quality assessment");
            }
            outcome
        };
        self.publish(notices);
        Ok(outcome)
    }

    /// Engine reported a canceled calibration. Scored as a failure.
    pub fn on_canceled(&self, _samples: Vec<f64>) -> std::result::Result<(), CalibrationError> {
        let quality = {
            let mut inner = self.inner.lock();
            inner.session.end(self.clock.now_ms())?;
            warn!("Calibration canceled");
            inner.advisor.failed_calibration()
        };
        self.publish(vec![
            CalibrationNotice::Canceled,
            CalibrationNotice::QualityAssessed(quality),
        ]);
        Ok(())
    }

    /// Periodic user-status report.
    pub fn on_user_status(&self, status: UserStatus) {
        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.last_status = Some(status);

            if let Some(pre) = inner.awaiting_assessment.take() {
                let quality = inner.advisor.evaluate_calibration(&pre, &status, true);
                info!("Calibration quality {} ({})", quality.score, quality.assessment.as_str());
                let recalibrate = quality.needs_recalibration;
                notices.push(CalibrationNotice::QualityAssessed(quality));
                if recalibrate {
                    notices.push(CalibrationNotice::RecalibrationRequested(
                        RecalibrationReason::PoorQuality,
                    ));
                }
            }

            if !inner.session.is_calibrating() {
                let now = self.clock.now_ms();
                if let Some(rec) = inner.advisor.observe(&status, now) {
                    notices.push(CalibrationNotice::Recommendation(rec));
                }
            }
        }
        self.publish(notices);
    }

    /// Offer a drift correction. Returns whether it was applied.
    pub fn propose_adjustment(&self, dx: f64, dy: f64) -> bool {
        let (accepted, recalibrate) = {
            let mut inner = self.inner.lock();
            let accepted = inner
                .guard
                .safely_apply_adjustment(dx, dy, self.clock.now_ms());
            (accepted, inner.guard.take_recalibration_request().is_some())
        };
        if recalibrate {
            self.publish(vec![CalibrationNotice::RecalibrationRequested(
                RecalibrationReason::DriftCeiling,
            )]);
        }
        accepted
    }

    pub fn accumulated_drift(&self) -> (f64, f64) {
        let inner = self.inner.lock();
        let acc = inner.guard.accumulator();
        (acc.total_drift_x, acc.total_drift_y)
    }

    pub fn safety_level(&self) -> SafetyLevel {
        self.inner.lock().guard.safety_level()
    }

    pub fn history_stats(&self) -> HistoryStats {
        self.inner.lock().history.stats(self.clock.unix_millis())
    }

    /// New usage session: drift counters and advisor cooldown start over.
    pub fn reset_session(&self) {
        let mut inner = self.inner.lock();
        let now = self.clock.now_ms();
        inner.guard.reset_session(now);
        inner.advisor.reset();
    }

    pub fn status_sexp(&self) -> String {
        let inner = self.inner.lock();
        let now = self.clock.now_ms();
        format!(
            "(:session {} :drift {} :advisor {} :history {})",
            inner.session.status_sexp(),
            inner.guard.status_sexp(now),
            inner.advisor.status_sexp(),
            inner.history.len(),
        )
    }
}
