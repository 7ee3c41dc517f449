//! Calibration history: rate limiting, quality scoring and drift trends.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::CalibrationError;

/// Records older than this are dropped.
pub const RETENTION_MS: i64 = 7 * 24 * 60 * 60 * 1000;
/// Minimum spacing between calibrations.
pub const MIN_CALIBRATION_INTERVAL_MS: i64 = 30_000;
pub const MAX_CALIBRATIONS_PER_HOUR: usize = 5;
/// Drift trend magnitude above which a trend is reported (px).
pub const DRIFT_TREND_THRESHOLD_PX: f64 = 20.0;
/// Quality below which a calibration is reported as weak.
pub const LOW_QUALITY_THRESHOLD: f64 = 0.7;
/// Dispersion at which the dispersion bonus reaches zero (px).
const DISPERSION_SCALE_PX: f64 = 50.0;
const TREND_WINDOW: usize = 3;
const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// One finished calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    /// Raw samples reported by the engine.
    pub payload: Vec<f64>,
    /// Wall-clock time, ms since UNIX epoch.
    pub timestamp_ms: i64,
    /// 0-1.
    pub quality_score: f64,
    pub center_offset: (f64, f64),
}

/// Averaged center-offset change over the latest records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftTrend {
    pub dx: f64,
    pub dy: f64,
}

impl DriftTrend {
    pub fn magnitude(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

/// What `record` found out about a new calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub record: CalibrationRecord,
    pub low_quality: bool,
    pub drift_trend: Option<DriftTrend>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryStats {
    pub total: usize,
    pub last_hour: usize,
    pub last_day: usize,
    pub average_quality: f64,
}

/// Deterministic quality in [0, 1] from sample dispersion.
///
/// The payload is read as interleaved (x, y) pairs; a trailing unpaired
/// value is ignored. Tighter clusters score higher.
pub fn quality_score(payload: &[f64]) -> f64 {
    let points: Vec<(f64, f64)> = payload
        .chunks_exact(2)
        .map(|c| (c[0], c[1]))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.is_empty() {
        return 0.5;
    }

    let mut score = 0.7;
    if payload.len() >= 10 {
        score += 0.1;
    }
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n;
    let rms = (points
        .iter()
        .map(|(x, y)| (x - cx).powi(2) + (y - cy).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    score += 0.2 * (1.0 - rms / DISPERSION_SCALE_PX).max(0.0);
    score.min(1.0)
}

/// Time-ordered calibration log.
#[derive(Debug, Default)]
pub struct CalibrationHistory {
    records: VecDeque<CalibrationRecord>,
}

impl CalibrationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> impl Iterator<Item = &CalibrationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&CalibrationRecord> {
        self.records.back()
    }

    /// Check the rate limits before starting a calibration.
    pub fn check_safe_to_calibrate(&self, now_ms: i64) -> Result<(), CalibrationError> {
        if let Some(last) = self.records.back() {
            let since = now_ms - last.timestamp_ms;
            if since < MIN_CALIBRATION_INTERVAL_MS {
                return Err(CalibrationError::TooSoon {
                    remaining_ms: (MIN_CALIBRATION_INTERVAL_MS - since.max(0)) as u64,
                });
            }
        }
        let count = self.count_since(now_ms - HOUR_MS);
        if count >= MAX_CALIBRATIONS_PER_HOUR {
            return Err(CalibrationError::TooFrequent {
                count,
                limit: MAX_CALIBRATIONS_PER_HOUR,
            });
        }
        Ok(())
    }

    pub fn is_safe_to_calibrate(&self, now_ms: i64) -> bool {
        self.check_safe_to_calibrate(now_ms).is_ok()
    }

    /// Append a finished calibration, prune stale records and report
    /// quality and drift findings. Timestamps earlier than the latest
    /// record are raised to it so the log stays ordered.
    pub fn record(&mut self, payload: Vec<f64>, center_offset: (f64, f64), now_ms: i64) -> RecordOutcome {
        let timestamp_ms = self
            .records
            .back()
            .map_or(now_ms, |last| now_ms.max(last.timestamp_ms));
        let record = CalibrationRecord {
            quality_score: quality_score(&payload),
            payload,
            timestamp_ms,
            center_offset,
        };
        self.records.push_back(record.clone());
        self.prune(now_ms);

        let low_quality = record.quality_score < LOW_QUALITY_THRESHOLD;
        if low_quality {
            warn!("calibration quality low: {:.2}", record.quality_score);
        }
        let drift_trend = self
            .drift_trend()
            .filter(|t| t.magnitude() > DRIFT_TREND_THRESHOLD_PX);
        if let Some(t) = drift_trend {
            warn!("calibration drift trend {:.1} px", t.magnitude());
        }
        RecordOutcome {
            record,
            low_quality,
            drift_trend,
        }
    }

    /// Mean center-offset change of the latest records relative to the
    /// first of them. `None` with fewer than three records.
    pub fn drift_trend(&self) -> Option<DriftTrend> {
        if self.records.len() < TREND_WINDOW {
            return None;
        }
        let recent: Vec<_> = self.records.iter().rev().take(TREND_WINDOW).rev().collect();
        let base = recent[0].center_offset;
        let n = (TREND_WINDOW - 1) as f64;
        let (sx, sy) = recent[1..].iter().fold((0.0, 0.0), |(sx, sy), r| {
            (sx + r.center_offset.0 - base.0, sy + r.center_offset.1 - base.1)
        });
        Some(DriftTrend { dx: sx / n, dy: sy / n })
    }

    fn prune(&mut self, now_ms: i64) {
        let before = self.records.len();
        while self
            .records
            .front()
            .is_some_and(|r| now_ms - r.timestamp_ms > RETENTION_MS)
        {
            self.records.pop_front();
        }
        if self.records.len() != before {
            debug!("calibration history: pruned {}", before - self.records.len());
        }
    }

    fn count_since(&self, since_ms: i64) -> usize {
        self.records
            .iter()
            .filter(|r| r.timestamp_ms > since_ms)
            .count()
    }

    /// Counts over the last hour and day. Average quality covers the last
    /// day only; 0 when nothing was recorded in it.
    pub fn stats(&self, now_ms: i64) -> HistoryStats {
        let since = now_ms - DAY_MS;
        let (sum, last_day) = self
            .records
            .iter()
            .filter(|r| r.timestamp_ms > since)
            .fold((0.0, 0usize), |(sum, n), r| (sum + r.quality_score, n + 1));
        HistoryStats {
            total: self.records.len(),
            last_hour: self.count_since(now_ms - HOUR_MS),
            last_day,
            average_quality: sum / last_day.max(1) as f64,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
