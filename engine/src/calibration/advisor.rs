//! Calibration quality advisor.
//!
//! Watches periodic user-status reports for a sustained alert, non-drowsy
//! window in which to suggest recalibrating, and scores finished
//! calibrations by how the user's state changed across them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ensure_positive, ensure_range, Result};
use crate::sample::UserStatus;

// ── Config ─────────────────────────────────────────────────

/// Thresholds for window detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Minimum attention score to qualify (0.5-1).
    pub attention_threshold: f32,
    /// Maximum drowsiness intensity to qualify (0-0.5).
    pub drowsiness_threshold: f32,
    /// Qualification must hold this long before recommending (ms).
    pub min_observation_ms: u64,
    /// Quiet period after a recommendation (ms).
    pub cooldown_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            attention_threshold: 0.8,
            drowsiness_threshold: 0.1,
            min_observation_ms: 10_000,
            cooldown_ms: 60_000,
        }
    }
}

impl AdvisorConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_range(
            "advisor.attention_threshold",
            self.attention_threshold as f64,
            0.5,
            1.0,
        )?;
        ensure_range(
            "advisor.drowsiness_threshold",
            self.drowsiness_threshold as f64,
            0.0,
            0.5,
        )?;
        ensure_positive("advisor.min_observation_ms", self.min_observation_ms as f64)?;
        Ok(())
    }
}

// ── Recommendation types ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationMode {
    OnePoint,
    FivePoint,
}

impl CalibrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnePoint => "one-point",
            Self::FivePoint => "five-point",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "one-point" => Some(Self::OnePoint),
            "five-point" => Some(Self::FivePoint),
            _ => None,
        }
    }

    pub fn points(&self) -> usize {
        match self {
            Self::OnePoint => 1,
            Self::FivePoint => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccuracyTier {
    Low,
    Default,
    High,
}

impl AccuracyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Default => "default",
            Self::High => "high",
        }
    }

    fn from_score(score: u32) -> Self {
        if score >= 80 {
            Self::High
        } else if score >= 60 {
            Self::Default
        } else {
            Self::Low
        }
    }
}

/// Suggested recalibration, emitted once per qualifying window.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecommendation {
    pub mode: CalibrationMode,
    pub accuracy: AccuracyTier,
    /// 0-100.
    pub confidence: u32,
    pub reason: String,
}

impl CalibrationRecommendation {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:mode :{} :accuracy :{} :confidence {} :reason \"{}\")",
            self.mode.as_str(),
            self.accuracy.as_str(),
            self.confidence,
            self.reason,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Excellent,
    Good,
    NeedsImprovement,
}

impl Assessment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::NeedsImprovement => "needs-improvement",
        }
    }
}

/// Score for one finished calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationQuality {
    /// 0-100.
    pub score: u32,
    pub needs_recalibration: bool,
    pub assessment: Assessment,
    pub accuracy: AccuracyTier,
}

impl CalibrationQuality {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:score {} :assessment :{} :accuracy :{} :recalibrate {})",
            self.score,
            self.assessment.as_str(),
            self.accuracy.as_str(),
            if self.needs_recalibration { "t" } else { "nil" },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStrategy {
    QuickStart,
    Balanced,
    Precision,
}

impl CalibrationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickStart => "quick-start",
            Self::Balanced => "balanced",
            Self::Precision => "precision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceMode {
    PowerSaving,
    Balanced,
    Performance,
}

impl PerformanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerSaving => "power-saving",
            Self::Balanced => "balanced",
            Self::Performance => "performance",
        }
    }
}

// ── Advisor ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_ms: u64,
    qualifying_samples: u32,
}

pub struct CalibrationQualityAdvisor {
    config: AdvisorConfig,
    window: Option<Window>,
    last_recommendation_ms: Option<u64>,
    /// Exponential moving average of attention.
    pub average_attention: f32,
    pub observations: u64,
}

impl CalibrationQualityAdvisor {
    pub fn new(config: AdvisorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            window: None,
            last_recommendation_ms: None,
            average_attention: 0.0,
            observations: 0,
        })
    }

    pub fn is_observing(&self) -> bool {
        self.window.is_some()
    }

    fn qualifies(&self, status: &UserStatus, now_ms: u64) -> bool {
        let cooled = self
            .last_recommendation_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.config.cooldown_ms);
        status.attention >= self.config.attention_threshold
            && status.drowsiness <= self.config.drowsiness_threshold
            && !status.is_drowsy
            && cooled
    }

    /// Feed one user-status report.
    pub fn observe(&mut self, status: &UserStatus, now_ms: u64) -> Option<CalibrationRecommendation> {
        self.observations += 1;
        self.average_attention = if self.observations == 1 {
            status.attention
        } else {
            self.average_attention * 0.9 + status.attention * 0.1
        };

        if !self.qualifies(status, now_ms) {
            if self.window.take().is_some() {
                debug!("advisor: observation window aborted");
            }
            return None;
        }

        let window = self.window.get_or_insert(Window {
            opened_ms: now_ms,
            qualifying_samples: 0,
        });
        window.qualifying_samples += 1;
        if now_ms.saturating_sub(window.opened_ms) < self.config.min_observation_ms {
            return None;
        }

        let count = window.qualifying_samples;
        self.window = None;
        self.last_recommendation_ms = Some(now_ms);
        let rec = recommend(status, count);
        info!(
            "advisor: recommending {} calibration ({}% confidence)",
            rec.mode.as_str(),
            rec.confidence
        );
        Some(rec)
    }

    /// Score for a calibration that did not complete.
    pub fn failed_calibration(&self) -> CalibrationQuality {
        CalibrationQuality {
            score: 20,
            needs_recalibration: true,
            assessment: Assessment::NeedsImprovement,
            accuracy: AccuracyTier::Low,
        }
    }

    /// Score a finished calibration from the user's state before and after.
    pub fn evaluate_calibration(
        &self,
        pre: &UserStatus,
        post: &UserStatus,
        success: bool,
    ) -> CalibrationQuality {
        if !success {
            return self.failed_calibration();
        }

        let mut score: i32 = 50;
        let attention_drop = pre.attention - post.attention;
        score += if attention_drop <= 0.1 {
            20
        } else if attention_drop <= 0.2 {
            10
        } else {
            -10
        };
        let drowsiness_rise = post.drowsiness - pre.drowsiness;
        score += if drowsiness_rise <= 0.1 {
            15
        } else if drowsiness_rise <= 0.2 {
            5
        } else {
            -15
        };
        if pre.attention >= 0.8 {
            score += 10;
        }
        let score = score.clamp(0, 100) as u32;

        let needs_recalibration = post.is_drowsy || post.drowsiness > 0.3 || score < 60;
        let assessment = if score >= 80 {
            Assessment::Excellent
        } else if score >= 60 {
            Assessment::Good
        } else {
            Assessment::NeedsImprovement
        };
        CalibrationQuality {
            score,
            needs_recalibration,
            assessment,
            accuracy: AccuracyTier::from_score(score),
        }
    }

    pub fn reset(&mut self) {
        self.window = None;
        self.last_recommendation_ms = None;
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:observing {} :window-samples {} :average-attention {:.3} :observations {})",
            if self.is_observing() { "t" } else { "nil" },
            self.window.map_or(0, |w| w.qualifying_samples),
            self.average_attention,
            self.observations,
        )
    }
}

fn recommend(status: &UserStatus, qualifying_samples: u32) -> CalibrationRecommendation {
    let (mode, accuracy, base, reason) = if status.attention >= 0.9 && status.drowsiness <= 0.05 {
        (
            CalibrationMode::FivePoint,
            AccuracyTier::High,
            95.0,
            "very high attention and alertness",
        )
    } else if status.attention >= 0.8 && status.drowsiness <= 0.1 {
        (
            CalibrationMode::FivePoint,
            AccuracyTier::Default,
            85.0,
            "high attention",
        )
    } else {
        (
            CalibrationMode::OnePoint,
            AccuracyTier::Low,
            70.0,
            "acceptable attention",
        )
    };
    let bonus = (qualifying_samples as f64 / 10.0).min(0.1);
    let confidence = ((base * (1.0 + bonus)).round() as u32).min(100);
    CalibrationRecommendation {
        mode,
        accuracy,
        confidence,
        reason: reason.to_string(),
    }
}

/// Calibration strategy and performance mode suited to the user's state.
pub fn recommended_settings(status: &UserStatus) -> (CalibrationStrategy, PerformanceMode) {
    let strategy = if status.attention >= 0.9 {
        CalibrationStrategy::Precision
    } else if status.attention >= 0.7 {
        CalibrationStrategy::Balanced
    } else {
        CalibrationStrategy::QuickStart
    };
    let performance = if status.drowsiness > 0.2 || status.is_drowsy {
        PerformanceMode::PowerSaving
    } else if status.attention >= 0.8 {
        PerformanceMode::Performance
    } else {
        PerformanceMode::Balanced
    };
    (strategy, performance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisor() -> CalibrationQualityAdvisor {
        CalibrationQualityAdvisor::new(AdvisorConfig::default()).unwrap()
    }

    fn alert() -> UserStatus {
        UserStatus::new(0.85, 0.05, false)
    }

    #[test]
    fn test_window_emits_after_min_observation() {
        let mut a = advisor();
        let mut rec = None;
        for i in 0..=10u64 {
            rec = a.observe(&alert(), i * 1000);
            if i < 10 {
                assert!(rec.is_none(), "early at {}", i);
            }
        }
        let rec = rec.unwrap();
        assert_eq!(rec.mode, CalibrationMode::FivePoint);
        assert_eq!(rec.accuracy, AccuracyTier::Default);
        // 11 samples: bonus capped at 0.1 -> 85 * 1.1 = 93.5 -> 94.
        assert_eq!(rec.confidence, 94);
        assert!(!a.is_observing());
    }

    #[test]
    fn test_disqualifying_sample_aborts_window() {
        let mut a = advisor();
        for i in 0..8u64 {
            a.observe(&alert(), i * 1000);
        }
        assert!(a.is_observing());
        a.observe(&UserStatus::new(0.5, 0.05, false), 8000);
        assert!(!a.is_observing());
        // Restarting the window needs a full new observation period.
        assert!(a.observe(&alert(), 9000).is_none());
        assert!(a.observe(&alert(), 12_000).is_none());
        assert!(a.observe(&alert(), 19_000).is_some());
    }

    #[test]
    fn test_drowsy_flag_disqualifies() {
        let mut a = advisor();
        a.observe(&UserStatus::new(0.95, 0.0, true), 0);
        assert!(!a.is_observing());
    }

    #[test]
    fn test_cooldown_after_recommendation() {
        let mut a = advisor();
        a.observe(&alert(), 0);
        assert!(a.observe(&alert(), 10_000).is_some());
        assert!(a.observe(&alert(), 20_000).is_none());
        assert!(!a.is_observing());
        // Cooldown over at 70 s.
        assert!(a.observe(&alert(), 70_000).is_none());
        assert!(a.is_observing());
        assert!(a.observe(&alert(), 80_000).is_some());
    }

    #[test]
    fn test_recommendation_tiers() {
        let high = recommend(&UserStatus::new(0.95, 0.02, false), 1);
        assert_eq!(high.mode, CalibrationMode::FivePoint);
        assert_eq!(high.accuracy, AccuracyTier::High);
        // 95 * 1.1 = 104.5 -> capped.
        assert_eq!(high.confidence, 100);

        let low = recommend(&UserStatus::new(0.6, 0.3, false), 0);
        assert_eq!(low.mode, CalibrationMode::OnePoint);
        assert_eq!(low.confidence, 70);

        let few = recommend(&alert(), 0);
        assert_eq!(few.confidence, 85);
    }

    #[test]
    fn test_evaluate_good_calibration() {
        let a = advisor();
        let q = a.evaluate_calibration(&alert(), &UserStatus::new(0.82, 0.08, false), true);
        // 50 + 20 + 15 + 10
        assert_eq!(q.score, 95);
        assert_eq!(q.assessment, Assessment::Excellent);
        assert_eq!(q.accuracy, AccuracyTier::High);
        assert!(!q.needs_recalibration);
    }

    #[test]
    fn test_evaluate_degraded_calibration() {
        let a = advisor();
        let pre = UserStatus::new(0.7, 0.1, false);
        let post = UserStatus::new(0.4, 0.45, false);
        let q = a.evaluate_calibration(&pre, &post, true);
        // 50 - 10 - 15
        assert_eq!(q.score, 25);
        assert!(q.needs_recalibration);
        assert_eq!(q.accuracy, AccuracyTier::Low);
    }

    #[test]
    fn test_post_drowsiness_forces_recalibration() {
        let a = advisor();
        let q = a.evaluate_calibration(&alert(), &UserStatus::new(0.85, 0.05, true), true);
        assert!(q.score >= 80);
        assert!(q.needs_recalibration);
    }

    #[test]
    fn test_failed_calibration() {
        let a = advisor();
        let q = a.evaluate_calibration(&alert(), &alert(), false);
        assert_eq!(q.score, 20);
        assert!(q.needs_recalibration);
    }

    #[test]
    fn test_recommended_settings() {
        assert_eq!(
            recommended_settings(&UserStatus::new(0.95, 0.0, false)),
            (CalibrationStrategy::Precision, PerformanceMode::Performance)
        );
        assert_eq!(
            recommended_settings(&UserStatus::new(0.75, 0.1, false)),
            (CalibrationStrategy::Balanced, PerformanceMode::Balanced)
        );
        assert_eq!(
            recommended_settings(&UserStatus::new(0.4, 0.6, true)),
            (CalibrationStrategy::QuickStart, PerformanceMode::PowerSaving)
        );
    }

    #[test]
    fn test_performance_mode_table() {
        let cases = [
            ((0.82, 0.25, false), PerformanceMode::PowerSaving),
            ((0.8, 0.0, false), PerformanceMode::Performance),
            ((0.4, 0.0, false), PerformanceMode::Balanced),
            ((0.95, 0.2, false), PerformanceMode::Performance),
            ((0.95, 0.0, true), PerformanceMode::PowerSaving),
        ];
        for ((attention, drowsiness, drowsy), expected) in cases {
            let (_, mode) = recommended_settings(&UserStatus::new(attention, drowsiness, drowsy));
            assert_eq!(mode, expected, "status ({}, {}, {})", attention, drowsiness, drowsy);
        }
    }

    #[test]
    fn test_invalid_thresholds_fail_fast() {
        let bad = AdvisorConfig {
            attention_threshold: 0.3,
            ..AdvisorConfig::default()
        };
        assert!(CalibrationQualityAdvisor::new(bad).is_err());
        let bad = AdvisorConfig {
            drowsiness_threshold: 0.9,
            ..AdvisorConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
