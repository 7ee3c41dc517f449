//! Edge-dwell triggers.
//!
//! The screen border is split into six zones: top and bottom bands, and
//! four corner quadrants of the left and right bands. Dwelling in a zone
//! for the trigger duration scrolls (top/bottom) or fires a corner action.
//! Only one zone is tracked at a time; entering a zone clears the others.

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ScreenConfig;
use crate::effects::{Action, Corner, HapticCue};
use crate::error::{ensure_positive, ensure_range, ConfigError, Result};

/// Pulse when the dwell timer starts (ms).
const START_PULSE_MS: u64 = 50;
/// Pulse at each elapsed-time tier (ms).
const TIER_PULSE_MS: u64 = 100;
/// Confirmation pulse with the action (ms).
const TRIGGER_PULSE_MS: u64 = 300;
const TIER_1_MS: u64 = 1000;
const TIER_2_MS: u64 = 2000;

// ── Config ─────────────────────────────────────────────────

/// Configuration for edge-dwell triggers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub enabled: bool,
    /// Band thickness as a fraction of the screen dimension (0-0.5).
    pub margin_ratio: f64,
    /// Dwell time before the zone fires (ms).
    pub trigger_ms: u64,
    /// Consecutive in-zone frames before the dwell timer starts.
    pub min_consecutive_frames: u32,
    /// Scroll steps per top/bottom trigger.
    pub scroll_count: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            margin_ratio: 0.1,
            trigger_ms: 2000,
            min_consecutive_frames: 5,
            scroll_count: 2,
        }
    }
}

impl EdgeConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("edge.margin_ratio", self.margin_ratio)?;
        ensure_range("edge.margin_ratio", self.margin_ratio, 0.0, 0.5)?;
        if self.trigger_ms == 0 {
            return Err(ConfigError::invalid("edge.trigger_ms", "must be > 0"));
        }
        if self.min_consecutive_frames == 0 {
            return Err(ConfigError::invalid(
                "edge.min_consecutive_frames",
                "must be at least 1",
            ));
        }
        if self.scroll_count == 0 {
            return Err(ConfigError::invalid("edge.scroll_count", "must be at least 1"));
        }
        Ok(())
    }
}

// ── Zone ───────────────────────────────────────────────────

/// Classification of a screen point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    None,
    Top,
    Bottom,
    Corner(Corner),
}

impl Zone {
    pub const ACTIVE: [Zone; 6] = [
        Zone::Top,
        Zone::Bottom,
        Zone::Corner(Corner::LeftTop),
        Zone::Corner(Corner::LeftBottom),
        Zone::Corner(Corner::RightTop),
        Zone::Corner(Corner::RightBottom),
    ];

    /// Slot in the zone-state table.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Top => Some(0),
            Self::Bottom => Some(1),
            Self::Corner(Corner::LeftTop) => Some(2),
            Self::Corner(Corner::LeftBottom) => Some(3),
            Self::Corner(Corner::RightTop) => Some(4),
            Self::Corner(Corner::RightBottom) => Some(5),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Corner(c) => c.as_str(),
        }
    }

    pub fn glyph(&self) -> char {
        match self {
            Self::None => '●',
            Self::Top => '▲',
            Self::Bottom => '▼',
            Self::Corner(Corner::LeftTop) => '◤',
            Self::Corner(Corner::LeftBottom) => '◣',
            Self::Corner(Corner::RightTop) => '◥',
            Self::Corner(Corner::RightBottom) => '◢',
        }
    }

    /// Action fired when this zone's dwell completes.
    pub fn action(&self, scroll_count: u32) -> Option<Action> {
        match self {
            Self::None => None,
            Self::Top => Some(Action::ScrollDown(scroll_count)),
            Self::Bottom => Some(Action::ScrollUp(scroll_count)),
            Self::Corner(c) => Some(Action::CornerAction(*c)),
        }
    }
}

/// Ordered classification: top band, bottom band, left band corners,
/// right band corners. Corners split on the horizontal midline.
pub fn classify(x: f32, y: f32, width: f32, height: f32, margin_ratio: f32) -> Zone {
    let in_top = y < height * margin_ratio;
    let in_bottom = y > height * (1.0 - margin_ratio);
    let in_left = x < width * margin_ratio;
    let in_right = x > width * (1.0 - margin_ratio);
    let upper = y < height / 2.0;

    match (in_top, in_bottom, in_left, in_right) {
        (true, _, _, _) => Zone::Top,
        (_, true, _, _) => Zone::Bottom,
        (_, _, true, _) if upper => Zone::Corner(Corner::LeftTop),
        (_, _, true, _) => Zone::Corner(Corner::LeftBottom),
        (_, _, _, true) if upper => Zone::Corner(Corner::RightTop),
        (_, _, _, true) => Zone::Corner(Corner::RightBottom),
        _ => Zone::None,
    }
}

// ── Zone state ─────────────────────────────────────────────

/// Dwell progress for one zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneState {
    pub consecutive_frames: u32,
    pub dwell_start_ms: Option<u64>,
    pub fired_start: bool,
    pub fired_tier_1: bool,
    pub fired_tier_2: bool,
    pub triggered: bool,
}

impl ZoneState {
    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result of one edge update.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStep {
    pub zone: Zone,
    pub cue: Option<HapticCue>,
    pub action: Option<Action>,
}

impl EdgeStep {
    fn quiet(zone: Zone) -> Self {
        Self {
            zone,
            cue: None,
            action: None,
        }
    }

    fn cue(zone: Zone, ms: u64) -> Self {
        Self {
            zone,
            cue: Some(HapticCue::Pulse(ms)),
            action: None,
        }
    }
}

// ── Engine ─────────────────────────────────────────────────

/// Six-zone edge-dwell detector.
pub struct EdgeTriggerEngine {
    config: EdgeConfig,
    width: f32,
    height: f32,
    zones: [ZoneState; 6],
    active: Zone,
}

impl EdgeTriggerEngine {
    pub fn new(config: EdgeConfig, screen: &ScreenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            width: screen.width_px as f32,
            height: screen.height_px as f32,
            zones: Default::default(),
            active: Zone::None,
        })
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn classify(&self, x: f32, y: f32) -> Zone {
        classify(x, y, self.width, self.height, self.config.margin_ratio as f32)
    }

    pub fn active_zone(&self) -> Zone {
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active != Zone::None
    }

    pub fn zone_state(&self, zone: Zone) -> Option<&ZoneState> {
        zone.index().map(|i| &self.zones[i])
    }

    /// Feed one stabilized point. At most one cue per call.
    pub fn update(&mut self, x: f32, y: f32, now_ms: u64) -> EdgeStep {
        if !self.config.enabled {
            return EdgeStep::quiet(Zone::None);
        }

        let zone = self.classify(x, y);
        if zone != self.active {
            if zone != Zone::None {
                debug!("edge: entered {}", zone.as_str());
            }
            self.active = zone;
            let keep = zone.index();
            for (i, state) in self.zones.iter_mut().enumerate() {
                if Some(i) != keep {
                    state.reset();
                }
            }
        }

        let Some(idx) = zone.index() else {
            return EdgeStep::quiet(zone);
        };
        let min_frames = self.config.min_consecutive_frames;
        let trigger_ms = self.config.trigger_ms;
        let state = &mut self.zones[idx];

        state.consecutive_frames = state.consecutive_frames.saturating_add(1);
        if state.consecutive_frames < min_frames {
            return EdgeStep::quiet(zone);
        }

        let Some(start) = state.dwell_start_ms else {
            state.dwell_start_ms = Some(now_ms);
            state.fired_start = true;
            debug!("edge: dwell started in {}", zone.as_str());
            return EdgeStep::cue(zone, START_PULSE_MS);
        };
        if state.triggered {
            return EdgeStep::quiet(zone);
        }

        let elapsed = now_ms.saturating_sub(start);
        if elapsed > TIER_1_MS && !state.fired_tier_1 {
            state.fired_tier_1 = true;
            return EdgeStep::cue(zone, TIER_PULSE_MS);
        }
        if elapsed > TIER_2_MS && !state.fired_tier_2 {
            state.fired_tier_2 = true;
            return EdgeStep::cue(zone, TIER_PULSE_MS);
        }
        if elapsed >= trigger_ms {
            state.triggered = true;
            let action = zone.action(self.config.scroll_count);
            info!("edge: {} triggered after {} ms", zone.as_str(), elapsed);
            return EdgeStep {
                zone,
                cue: Some(HapticCue::Pulse(TRIGGER_PULSE_MS)),
                action,
            };
        }
        EdgeStep::quiet(zone)
    }

    /// Status glyph: zone symbol, then elapsed-time tier once dwelling.
    pub fn glyph(&self, now_ms: u64) -> char {
        let Some(state) = self.zone_state(self.active) else {
            return Zone::None.glyph();
        };
        if state.triggered {
            return '③';
        }
        match state.dwell_start_ms.map(|s| now_ms.saturating_sub(s)) {
            Some(e) if e > TIER_2_MS => '②',
            Some(e) if e > TIER_1_MS => '①',
            _ => self.active.glyph(),
        }
    }

    pub fn reset(&mut self) {
        for state in self.zones.iter_mut() {
            state.reset();
        }
        self.active = Zone::None;
    }

    pub fn status_sexp(&self, now_ms: u64) -> String {
        let (frames, elapsed, triggered) = match self.zone_state(self.active) {
            Some(s) => (
                s.consecutive_frames,
                s.dwell_start_ms.map_or(0, |t| now_ms.saturating_sub(t)),
                s.triggered,
            ),
            None => (0, 0, false),
        };
        format!(
            "(:enabled {} :zone :{} :frames {} :dwell-ms {} :triggered {})",
            if self.config.enabled { "t" } else { "nil" },
            self.active.as_str(),
            frames,
            elapsed,
            if triggered { "t" } else { "nil" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> ScreenConfig {
        ScreenConfig {
            width_px: 1000,
            height_px: 1000,
            density: 1.0,
        }
    }

    fn engine() -> EdgeTriggerEngine {
        EdgeTriggerEngine::new(EdgeConfig::default(), &screen()).unwrap()
    }

    /// Feed `n` frames at (x, y), 33 ms apart, starting at `t`.
    fn feed(e: &mut EdgeTriggerEngine, x: f32, y: f32, t: &mut u64, n: usize) -> Vec<EdgeStep> {
        (0..n)
            .map(|_| {
                let step = e.update(x, y, *t);
                *t += 33;
                step
            })
            .collect()
    }

    #[test]
    fn test_classify_priority() {
        let c = |x, y| classify(x, y, 1000.0, 1000.0, 0.1);
        assert_eq!(c(500.0, 50.0), Zone::Top);
        // Top band beats the left band in the corner.
        assert_eq!(c(10.0, 10.0), Zone::Top);
        assert_eq!(c(990.0, 990.0), Zone::Bottom);
        assert_eq!(c(10.0, 300.0), Zone::Corner(Corner::LeftTop));
        assert_eq!(c(10.0, 500.0), Zone::Corner(Corner::LeftBottom));
        assert_eq!(c(990.0, 499.0), Zone::Corner(Corner::RightTop));
        assert_eq!(c(990.0, 700.0), Zone::Corner(Corner::RightBottom));
        assert_eq!(c(500.0, 500.0), Zone::None);
    }

    #[test]
    fn test_debounce_before_dwell() {
        let mut e = engine();
        let mut t = 0;
        let steps = feed(&mut e, 500.0, 2.0, &mut t, 4);
        assert!(steps.iter().all(|s| s.cue.is_none()));
        assert!(e.zone_state(Zone::Top).unwrap().dwell_start_ms.is_none());

        let fifth = e.update(500.0, 2.0, t);
        assert_eq!(fifth.cue, Some(HapticCue::Pulse(START_PULSE_MS)));
        assert_eq!(e.zone_state(Zone::Top).unwrap().dwell_start_ms, Some(t));
    }

    #[test]
    fn test_full_dwell_fires_once() {
        let mut e = engine();
        let mut t = 0;
        let steps = feed(&mut e, 500.0, 2.0, &mut t, 5 + 2100 / 33 + 1);
        let cues: Vec<_> = steps.iter().filter_map(|s| s.cue.clone()).collect();
        let actions: Vec<_> = steps.iter().filter_map(|s| s.action.clone()).collect();
        assert_eq!(
            cues,
            vec![
                HapticCue::Pulse(50),
                HapticCue::Pulse(100),
                HapticCue::Pulse(100),
                HapticCue::Pulse(300),
            ]
        );
        assert_eq!(actions, vec![Action::ScrollDown(2)]);

        // Staying put never re-fires.
        let more = feed(&mut e, 500.0, 2.0, &mut t, 60);
        assert!(more.iter().all(|s| s.cue.is_none() && s.action.is_none()));
        assert_eq!(e.glyph(t), '③');
    }

    #[test]
    fn test_bottom_and_corner_actions() {
        assert_eq!(Zone::Bottom.action(3), Some(Action::ScrollUp(3)));
        assert_eq!(
            Zone::Corner(Corner::LeftBottom).action(2),
            Some(Action::CornerAction(Corner::LeftBottom))
        );
        assert_eq!(Zone::None.action(2), None);
    }

    #[test]
    fn test_zone_change_clears_siblings_same_frame() {
        let mut e = engine();
        let mut t = 0;
        feed(&mut e, 500.0, 2.0, &mut t, 8);
        assert!(!e.zone_state(Zone::Top).unwrap().is_clear());

        let step = e.update(10.0, 300.0, t);
        assert_eq!(step.zone, Zone::Corner(Corner::LeftTop));
        assert!(e.zone_state(Zone::Top).unwrap().is_clear());
        assert_eq!(
            e.zone_state(Zone::Corner(Corner::LeftTop))
                .unwrap()
                .consecutive_frames,
            1
        );
    }

    #[test]
    fn test_leaving_all_zones_returns_idle() {
        let mut e = engine();
        let mut t = 0;
        feed(&mut e, 500.0, 990.0, &mut t, 10);
        assert!(e.is_active());
        let step = e.update(500.0, 500.0, t);
        assert_eq!(step.zone, Zone::None);
        assert!(!e.is_active());
        assert!(Zone::ACTIVE.iter().all(|z| e.zone_state(*z).unwrap().is_clear()));
        assert_eq!(e.glyph(t), '●');
    }

    #[test]
    fn test_glyph_tiers() {
        let mut e = engine();
        let mut t = 0;
        feed(&mut e, 990.0, 800.0, &mut t, 5);
        let start = e.zone_state(Zone::Corner(Corner::RightBottom))
            .unwrap()
            .dwell_start_ms
            .unwrap();
        assert_eq!(e.glyph(start + 500), '◢');
        assert_eq!(e.glyph(start + 1500), '①');
        assert_eq!(e.glyph(start + 2001), '②');
    }

    #[test]
    fn test_short_trigger_skips_later_tiers() {
        let config = EdgeConfig {
            trigger_ms: 800,
            ..EdgeConfig::default()
        };
        let mut e = EdgeTriggerEngine::new(config, &screen()).unwrap();
        let mut t = 0;
        let steps = feed(&mut e, 500.0, 2.0, &mut t, 5 + 3000 / 33);
        let cues: Vec<_> = steps.iter().filter_map(|s| s.cue.clone()).collect();
        assert_eq!(cues, vec![HapticCue::Pulse(50), HapticCue::Pulse(300)]);
    }

    #[test]
    fn test_disabled_engine_is_inert() {
        let config = EdgeConfig {
            enabled: false,
            ..EdgeConfig::default()
        };
        let mut e = EdgeTriggerEngine::new(config, &screen()).unwrap();
        let mut t = 0;
        let steps = feed(&mut e, 500.0, 2.0, &mut t, 100);
        assert!(steps.iter().all(|s| s.zone == Zone::None && s.cue.is_none()));
    }

    #[test]
    fn test_invalid_config() {
        let bad = EdgeConfig {
            margin_ratio: -0.1,
            ..EdgeConfig::default()
        };
        assert!(EdgeTriggerEngine::new(bad, &screen()).is_err());
        let bad = EdgeConfig {
            margin_ratio: 0.6,
            ..EdgeConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = EdgeConfig {
            min_consecutive_frames: 0,
            ..EdgeConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_reset_idempotent() {
        let mut e = engine();
        let mut t = 0;
        feed(&mut e, 500.0, 2.0, &mut t, 10);
        e.reset();
        e.reset();
        assert_eq!(e.active_zone(), Zone::None);
        assert!(e.status_sexp(t).contains(":zone :none"));
    }
}
