//! Dwell-to-click.
//!
//! Gaze resting inside an area of interest (AOI) around its first point
//! for the dwell duration produces one click. Leaving the AOI re-anchors
//! the timer at the new point.

use serde::Deserialize;
use tracing::{debug, info};

use crate::effects::HapticCue;
use crate::error::{ensure_positive, Result};

const CLICK_PULSE_MS: u64 = 100;

/// Dwell duration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickTiming {
    #[default]
    Normal,
    Slow,
}

impl ClickTiming {
    pub fn dwell_ms(&self) -> u64 {
        match self {
            Self::Normal => 1000,
            Self::Slow => 1500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Slow => "slow",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "slow" => Some(Self::Slow),
            _ => None,
        }
    }
}

/// Configuration for dwell clicks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    pub enabled: bool,
    /// AOI radius around the anchor point (px).
    pub aoi_radius_px: f64,
    pub timing: ClickTiming,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            aoi_radius_px: 40.0,
            timing: ClickTiming::Normal,
        }
    }
}

impl ClickConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("click.aoi_radius_px", self.aoi_radius_px)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    x: f32,
    y: f32,
    since_ms: u64,
    clicked: bool,
}

/// Result of one dwell-click update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClickStep {
    pub click: Option<(f32, f32)>,
    pub cue: Option<HapticCue>,
    /// Dwell progress toward the click (0-1).
    pub progress: f32,
}

pub struct DwellClickDetector {
    config: ClickConfig,
    anchor: Option<Anchor>,
}

impl DwellClickDetector {
    pub fn new(config: ClickConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            anchor: None,
        })
    }

    pub fn config(&self) -> &ClickConfig {
        &self.config
    }

    pub fn set_timing(&mut self, timing: ClickTiming) {
        self.config.timing = timing;
        self.anchor = None;
    }

    pub fn update(&mut self, x: f32, y: f32, now_ms: u64) -> ClickStep {
        if !self.config.enabled {
            return ClickStep::default();
        }
        let radius = self.config.aoi_radius_px as f32;
        let dwell_ms = self.config.timing.dwell_ms();

        let anchor = match self.anchor {
            Some(a) if (x - a.x).hypot(y - a.y) <= radius => a,
            _ => {
                self.anchor = Some(Anchor {
                    x,
                    y,
                    since_ms: now_ms,
                    clicked: false,
                });
                return ClickStep::default();
            }
        };
        if anchor.clicked {
            return ClickStep::default();
        }

        let elapsed = now_ms.saturating_sub(anchor.since_ms);
        if elapsed < dwell_ms {
            return ClickStep {
                progress: elapsed as f32 / dwell_ms as f32,
                ..ClickStep::default()
            };
        }
        self.anchor = Some(Anchor {
            clicked: true,
            ..anchor
        });
        info!("click: dwell at ({:.0}, {:.0})", x, y);
        ClickStep {
            click: Some((x, y)),
            cue: Some(HapticCue::Pulse(CLICK_PULSE_MS)),
            progress: 1.0,
        }
    }

    pub fn reset(&mut self) {
        if self.anchor.take().is_some() {
            debug!("click: dwell abandoned");
        }
    }

    pub fn status_sexp(&self, now_ms: u64) -> String {
        let elapsed = self
            .anchor
            .map_or(0, |a| now_ms.saturating_sub(a.since_ms));
        format!(
            "(:enabled {} :timing :{} :aoi-radius {:.0} :dwell-ms {})",
            if self.config.enabled { "t" } else { "nil" },
            self.config.timing.as_str(),
            self.config.aoi_radius_px,
            elapsed,
        )
    }
}
