//! Confidence-aware gaze smoothing.
//!
//! One filter state per channel, tuned by a discrete profile:
//! `Responsive` while the engine reports successful tracking, `Stable`
//! once enough consecutive non-success samples arrive. A second channel
//! smooths the engine's fixation point, which can pull the primary point
//! toward it to compensate for lens refraction.

use serde::Deserialize;
use tracing::{debug, info};

use super::one_euro::{OneEuroFilter2D, OneEuroParams};
use crate::error::{ensure_positive, ensure_range, ConfigError, Result};
use crate::sample::TrackingState;

// ── Presets ────────────────────────────────────────────────

/// Named filter tunings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPreset {
    Stability,
    #[default]
    BalancedStability,
    Balanced,
    Responsive,
}

impl FilterPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stability => "stability",
            Self::BalancedStability => "balanced-stability",
            Self::Balanced => "balanced",
            Self::Responsive => "responsive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stability" => Some(Self::Stability),
            "balanced-stability" => Some(Self::BalancedStability),
            "balanced" => Some(Self::Balanced),
            "responsive" => Some(Self::Responsive),
            _ => None,
        }
    }

    pub fn params(&self) -> OneEuroParams {
        let (min_cutoff, beta) = match self {
            Self::Stability => (0.3, 0.002),
            Self::BalancedStability | Self::Balanced => (0.5, 0.003),
            Self::Responsive => (0.8, 0.01),
        };
        OneEuroParams {
            freq: 30.0,
            min_cutoff,
            beta,
            d_cutoff: 1.0,
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Configuration for gaze smoothing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Base tuning.
    pub preset: FilterPreset,
    /// Overrides for individual preset values.
    pub freq: Option<f64>,
    pub min_cutoff: Option<f64>,
    pub beta: Option<f64>,
    pub d_cutoff: Option<f64>,
    /// Consecutive non-success samples before switching to `Stable`.
    pub low_confidence_threshold: u32,
    /// Pull the gaze point toward the fixation point.
    pub refraction_correction: bool,
    /// Fraction of the gaze→fixation distance to apply (0-1).
    pub refraction_factor: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            preset: FilterPreset::default(),
            freq: None,
            min_cutoff: None,
            beta: None,
            d_cutoff: None,
            low_confidence_threshold: 3,
            refraction_correction: false,
            refraction_factor: 0.15,
        }
    }
}

impl FilterConfig {
    /// Preset values with overrides applied.
    pub fn params(&self) -> OneEuroParams {
        let base = self.preset.params();
        OneEuroParams {
            freq: self.freq.unwrap_or(base.freq),
            min_cutoff: self.min_cutoff.unwrap_or(base.min_cutoff),
            beta: self.beta.unwrap_or(base.beta),
            d_cutoff: self.d_cutoff.unwrap_or(base.d_cutoff),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = self.params();
        ensure_positive("filter.freq", p.freq)?;
        ensure_positive("filter.min_cutoff", p.min_cutoff)?;
        ensure_range("filter.beta", p.beta, 0.0, f64::MAX)?;
        ensure_positive("filter.d_cutoff", p.d_cutoff)?;
        ensure_range("filter.refraction_factor", self.refraction_factor, 0.0, 1.0)?;
        if self.low_confidence_threshold == 0 {
            return Err(ConfigError::invalid(
                "filter.low_confidence_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// ── Profile ────────────────────────────────────────────────

/// Active tuning profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterProfile {
    Responsive,
    Stable,
}

impl FilterProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Responsive => "responsive",
            Self::Stable => "stable",
        }
    }

    fn params(&self, base: &OneEuroParams) -> OneEuroParams {
        match self {
            Self::Responsive => base.scaled(1.0, 0.9),
            Self::Stable => base.scaled(0.4, 0.6),
        }
    }
}

fn fixation_params(base: &OneEuroParams) -> OneEuroParams {
    base.scaled(0.6, 0.7)
}

// ── SignalFilter ───────────────────────────────────────────

/// Dual-channel adaptive smoother.
pub struct SignalFilter {
    config: FilterConfig,
    base: OneEuroParams,
    gaze: OneEuroFilter2D,
    fixation: OneEuroFilter2D,
    profile: FilterProfile,
    low_confidence_count: u32,
    last_timestamp_ms: Option<u64>,
    output: Option<(f32, f32)>,
}

impl SignalFilter {
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        let base = config.params();
        Ok(Self {
            gaze: OneEuroFilter2D::new(FilterProfile::Responsive.params(&base)),
            fixation: OneEuroFilter2D::new(fixation_params(&base)),
            config,
            base,
            profile: FilterProfile::Responsive,
            low_confidence_count: 0,
            last_timestamp_ms: None,
            output: None,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn profile(&self) -> FilterProfile {
        self.profile
    }

    /// Feed one sample. Returns true iff a smoothed value is available.
    pub fn filter(&mut self, timestamp_ms: u64, x: f32, y: f32, state: TrackingState) -> bool {
        self.filter_with_fixation(timestamp_ms, x, y, None, state)
    }

    /// Feed one sample with an optional fixation point.
    ///
    /// Non-finite coordinates and timestamps older than the previous one
    /// are rejected without touching any state. A repeated timestamp
    /// keeps the current output.
    pub fn filter_with_fixation(
        &mut self,
        timestamp_ms: u64,
        x: f32,
        y: f32,
        fixation: Option<(f32, f32)>,
        state: TrackingState,
    ) -> bool {
        if !x.is_finite() || !y.is_finite() {
            debug!("filter: rejected non-finite sample ({}, {})", x, y);
            return false;
        }
        match self.last_timestamp_ms {
            Some(last) if timestamp_ms < last => {
                debug!("filter: rejected out-of-order timestamp {} < {}", timestamp_ms, last);
                return false;
            }
            Some(last) if timestamp_ms == last => return self.output.is_some(),
            _ => {}
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        self.track_confidence(state);

        let t = timestamp_ms as f64 / 1000.0;
        let (gx, gy) = self.gaze.filter(t, (x as f64, y as f64));

        let fix = fixation
            .filter(|(fx, fy)| fx.is_finite() && fy.is_finite())
            .map(|(fx, fy)| self.fixation.filter(t, (fx as f64, fy as f64)));

        let (ox, oy) = match fix {
            Some((fx, fy)) if self.config.refraction_correction => {
                let k = self.config.refraction_factor;
                (gx + (fx - gx) * k, gy + (fy - gy) * k)
            }
            _ => (gx, gy),
        };
        self.output = Some((ox as f32, oy as f32));
        true
    }

    fn track_confidence(&mut self, state: TrackingState) {
        let next = if state.is_success() {
            self.low_confidence_count = 0;
            FilterProfile::Responsive
        } else {
            self.low_confidence_count = self.low_confidence_count.saturating_add(1);
            if self.low_confidence_count >= self.config.low_confidence_threshold {
                FilterProfile::Stable
            } else {
                self.profile
            }
        };
        if next != self.profile {
            debug!("filter: profile {} -> {}", self.profile.as_str(), next.as_str());
            self.profile = next;
            self.gaze.set_params(next.params(&self.base));
        }
    }

    /// Latest smoothed point, (0, 0) before the first accepted sample.
    pub fn filtered_value(&self) -> (f32, f32) {
        self.output.unwrap_or((0.0, 0.0))
    }

    pub fn has_value(&self) -> bool {
        self.output.is_some()
    }

    /// Clear smoothing memory. Configured tuning is kept.
    pub fn reset(&mut self) {
        self.gaze.reset();
        self.fixation.reset();
        self.profile = FilterProfile::Responsive;
        self.gaze.set_params(FilterProfile::Responsive.params(&self.base));
        self.low_confidence_count = 0;
        self.last_timestamp_ms = None;
        self.output = None;
    }

    /// Switch to a named preset, dropping overrides. Resets state.
    pub fn apply_preset(&mut self, preset: FilterPreset) {
        info!("filter preset: {}", preset.as_str());
        self.config.preset = preset;
        self.config.freq = None;
        self.config.min_cutoff = None;
        self.config.beta = None;
        self.config.d_cutoff = None;
        self.retune();
    }

    /// Replace the base tuning. Resets state.
    pub fn set_parameters(&mut self, params: OneEuroParams) -> Result<()> {
        let mut next = self.config.clone();
        next.freq = Some(params.freq);
        next.min_cutoff = Some(params.min_cutoff);
        next.beta = Some(params.beta);
        next.d_cutoff = Some(params.d_cutoff);
        next.validate()?;
        self.config = next;
        self.retune();
        Ok(())
    }

    pub fn set_refraction(&mut self, enabled: bool, factor: f64) -> Result<()> {
        ensure_range("filter.refraction_factor", factor, 0.0, 1.0)?;
        self.config.refraction_correction = enabled;
        self.config.refraction_factor = factor;
        Ok(())
    }

    fn retune(&mut self) {
        self.base = self.config.params();
        self.fixation.set_params(fixation_params(&self.base));
        self.reset();
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:preset :{} :profile :{} :low-confidence {} :min-cutoff {:.3} :beta {:.4} :refraction {} :refraction-factor {:.2})",
            self.config.preset.as_str(),
            self.profile.as_str(),
            self.low_confidence_count,
            self.base.min_cutoff,
            self.base.beta,
            if self.config.refraction_correction { "t" } else { "nil" },
            self.config.refraction_factor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: TrackingState = TrackingState::Success;
    const BAD: TrackingState = TrackingState::OtherFailure;

    fn filter() -> SignalFilter {
        SignalFilter::new(FilterConfig::default()).unwrap()
    }

    #[test]
    fn test_first_sample_bypasses_smoothing() {
        let mut f = filter();
        assert!(!f.has_value());
        assert!(f.filter(0, 300.0, 400.0, OK));
        assert_eq!(f.filtered_value(), (300.0, 400.0));
    }

    #[test]
    fn test_converges_on_constant_input() {
        for state in [OK, BAD] {
            let mut f = filter();
            f.filter(0, 0.0, 0.0, state);
            for i in 1..=300u64 {
                f.filter(i * 33, 500.0, 250.0, state);
            }
            let expected = if state == OK {
                FilterProfile::Responsive
            } else {
                FilterProfile::Stable
            };
            assert_eq!(f.profile(), expected);
            let (x, y) = f.filtered_value();
            assert!((x - 500.0).abs() < 0.5, "x = {}", x);
            assert!((y - 250.0).abs() < 0.5, "y = {}", y);
        }
    }

    #[test]
    fn test_stable_profile_from_third_failure() {
        let mut f = filter();
        f.filter(0, 10.0, 10.0, OK);
        f.filter(33, 10.0, 10.0, BAD);
        assert_eq!(f.profile(), FilterProfile::Responsive);
        f.filter(66, 10.0, 10.0, BAD);
        assert_eq!(f.profile(), FilterProfile::Responsive);
        f.filter(99, 10.0, 10.0, BAD);
        assert_eq!(f.profile(), FilterProfile::Stable);
        f.filter(132, 10.0, 10.0, BAD);
        assert_eq!(f.profile(), FilterProfile::Stable);
        f.filter(165, 10.0, 10.0, OK);
        assert_eq!(f.profile(), FilterProfile::Responsive);
    }

    #[test]
    fn test_success_interrupts_failure_run() {
        let mut f = filter();
        f.filter(0, 1.0, 1.0, BAD);
        f.filter(33, 1.0, 1.0, BAD);
        f.filter(66, 1.0, 1.0, OK);
        f.filter(99, 1.0, 1.0, BAD);
        f.filter(132, 1.0, 1.0, BAD);
        assert_eq!(f.profile(), FilterProfile::Responsive);
    }

    #[test]
    fn test_rejects_non_finite_without_state_change() {
        let mut f = filter();
        f.filter(0, 100.0, 100.0, OK);
        assert!(!f.filter(33, f32::NAN, 100.0, BAD));
        assert!(!f.filter(33, 100.0, f32::INFINITY, BAD));
        assert_eq!(f.filtered_value(), (100.0, 100.0));
        assert!(f.status_sexp().contains(":low-confidence 0"));
    }

    #[test]
    fn test_rejects_out_of_order_timestamp() {
        let mut f = filter();
        f.filter(100, 50.0, 50.0, OK);
        assert!(!f.filter(50, 900.0, 900.0, OK));
        assert_eq!(f.filtered_value(), (50.0, 50.0));
        // Same timestamp keeps the current output.
        assert!(f.filter(100, 900.0, 900.0, OK));
        assert_eq!(f.filtered_value(), (50.0, 50.0));
    }

    #[test]
    fn test_refraction_pulls_toward_fixation() {
        let config = FilterConfig {
            refraction_correction: true,
            refraction_factor: 0.5,
            ..FilterConfig::default()
        };
        let mut f = SignalFilter::new(config).unwrap();
        f.filter_with_fixation(0, 100.0, 100.0, Some((200.0, 100.0)), OK);
        assert_eq!(f.filtered_value(), (150.0, 100.0));

        f.set_refraction(false, 0.5).unwrap();
        f.filter_with_fixation(33, 100.0, 100.0, Some((200.0, 100.0)), OK);
        let (x, _) = f.filtered_value();
        assert!(x < 150.0);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let bad = FilterConfig {
            min_cutoff: Some(-1.0),
            ..FilterConfig::default()
        };
        assert!(SignalFilter::new(bad).is_err());

        let bad = FilterConfig {
            refraction_factor: 1.5,
            ..FilterConfig::default()
        };
        assert!(SignalFilter::new(bad).is_err());

        let mut f = filter();
        assert!(f.set_refraction(true, -0.1).is_err());
    }

    #[test]
    fn test_reset_keeps_tuning() {
        let mut f = SignalFilter::new(FilterConfig {
            preset: FilterPreset::Responsive,
            ..FilterConfig::default()
        })
        .unwrap();
        f.filter(0, 1.0, 1.0, BAD);
        f.filter(33, 1.0, 1.0, BAD);
        f.filter(66, 1.0, 1.0, BAD);
        f.reset();
        f.reset();
        assert!(!f.has_value());
        assert_eq!(f.profile(), FilterProfile::Responsive);
        assert_eq!(f.config().preset, FilterPreset::Responsive);
        // Timestamps may restart after a reset.
        assert!(f.filter(0, 5.0, 5.0, OK));
    }

    #[test]
    fn test_preset_change_resets_state() {
        let mut f = filter();
        f.filter(0, 1.0, 1.0, OK);
        f.apply_preset(FilterPreset::Stability);
        assert!(!f.has_value());
        assert!(f.status_sexp().contains(":preset :stability"));
        assert!(f.set_parameters(FilterPreset::Responsive.params()).is_ok());
        assert!(f.status_sexp().contains(":min-cutoff 0.800"));
    }

    #[test]
    fn test_preset_names() {
        for p in [
            FilterPreset::Stability,
            FilterPreset::BalancedStability,
            FilterPreset::Balanced,
            FilterPreset::Responsive,
        ] {
            assert_eq!(FilterPreset::from_str(p.as_str()), Some(p));
        }
        assert_eq!(FilterPreset::default(), FilterPreset::BalancedStability);
    }
}
