//! Calibration lifecycle, quality advice and drift safety.

pub mod advisor;
pub mod drift_guard;
pub mod history;
pub mod offset;
pub mod service;
pub mod session;

pub use advisor::{
    recommended_settings, AccuracyTier, AdvisorConfig, Assessment, CalibrationMode,
    CalibrationQuality, CalibrationQualityAdvisor, CalibrationRecommendation,
    CalibrationStrategy, PerformanceMode,
};
pub use drift_guard::{
    CalibrationDriftGuard, DriftAccumulator, DriftConfig, RecalibrationRequest, Rejection,
    SafetyLevel,
};
pub use history::{CalibrationHistory, CalibrationRecord, DriftTrend, HistoryStats, RecordOutcome};
pub use offset::{validate_offset, OffsetLevel, OffsetValidation};
pub use service::{CalibrationListener, CalibrationNotice, CalibrationService, RecalibrationReason};
pub use session::{CalibrationPhase, CalibrationSession, SessionSummary};
