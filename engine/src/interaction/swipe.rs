//! Trigger-zone swipes.
//!
//! Two trigger zones sit in the bottom corners. Holding gaze in one for
//! the trigger wait arms a swipe toward the opposite side; leaving the
//! zone starts the swipe, which must then cover the minimum distance fast
//! enough and within the time budget.
//!
//! ```text
//! Waiting ──enter zone──▶ TriggerReady ──exit after wait──▶ Swiping
//!    ▲                        │ exit early                  │ done / failed
//!    └────────────────────────┴─────────────────────────────┘
//! ```

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ScreenConfig;
use crate::effects::{Action, HapticCue};
use crate::error::{ensure_positive, ConfigError, Result};

const ENTER_PULSE_MS: u64 = 50;
const ARMED_PULSE_MS: u64 = 100;
const START_PULSE_MS: u64 = 150;
const SUCCESS_PATTERN_MS: [u64; 4] = [0, 100, 50, 100];

// ── Config ─────────────────────────────────────────────────

/// Configuration for trigger-zone swipes. Lengths are in dp.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwipeConfig {
    pub enabled: bool,
    pub trigger_zone_width_dp: f64,
    pub trigger_zone_height_dp: f64,
    /// Minimum time inside the trigger zone before exiting (ms).
    pub trigger_wait_ms: u64,
    pub min_distance_dp: f64,
    pub min_speed_dp_s: f64,
    pub max_swipe_ms: u64,
    /// Backward travel tolerated before the swipe fails.
    pub reverse_tolerance_dp: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_zone_width_dp: 120.0,
            trigger_zone_height_dp: 200.0,
            trigger_wait_ms: 800,
            min_distance_dp: 300.0,
            min_speed_dp_s: 150.0,
            max_swipe_ms: 2000,
            reverse_tolerance_dp: 50.0,
        }
    }
}

impl SwipeConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("swipe.trigger_zone_width_dp", self.trigger_zone_width_dp)?;
        ensure_positive("swipe.trigger_zone_height_dp", self.trigger_zone_height_dp)?;
        ensure_positive("swipe.min_distance_dp", self.min_distance_dp)?;
        ensure_positive("swipe.min_speed_dp_s", self.min_speed_dp_s)?;
        ensure_positive("swipe.reverse_tolerance_dp", self.reverse_tolerance_dp)?;
        if self.trigger_wait_ms == 0 {
            return Err(ConfigError::invalid("swipe.trigger_wait_ms", "must be > 0"));
        }
        if self.max_swipe_ms == 0 {
            return Err(ConfigError::invalid("swipe.max_swipe_ms", "must be > 0"));
        }
        Ok(())
    }
}

// ── Direction / outcome ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    LeftToRight,
    RightToLeft,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftToRight => "left-to-right",
            Self::RightToLeft => "right-to-left",
        }
    }

    fn sign(&self) -> f32 {
        match self {
            Self::LeftToRight => 1.0,
            Self::RightToLeft => -1.0,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Self::LeftToRight => Action::SwipeRight,
            Self::RightToLeft => Action::SwipeLeft,
        }
    }
}

/// Why a swipe attempt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeFailure {
    /// Left the trigger zone before the wait elapsed.
    EarlyExit,
    /// Left the trigger zone away from the swipe direction.
    WrongExit,
    TimedOut,
    Reversed,
    /// Covered the distance below the minimum speed.
    TooSlow,
}

impl SwipeFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EarlyExit => "early-exit",
            Self::WrongExit => "wrong-exit",
            Self::TimedOut => "timed-out",
            Self::Reversed => "reversed",
            Self::TooSlow => "too-slow",
        }
    }
}

// ── State ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwipeState {
    Waiting,
    TriggerReady {
        direction: SwipeDirection,
        entered_ms: u64,
        armed: bool,
    },
    Swiping {
        direction: SwipeDirection,
        start_x: f32,
        start_y: f32,
        start_ms: u64,
    },
}

impl SwipeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::TriggerReady { .. } => "trigger-ready",
            Self::Swiping { .. } => "swiping",
        }
    }
}

/// Result of one swipe update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwipeStep {
    pub cue: Option<HapticCue>,
    pub completed: Option<SwipeDirection>,
    pub failure: Option<SwipeFailure>,
}

impl SwipeStep {
    fn pulse(ms: u64) -> Self {
        Self {
            cue: Some(HapticCue::Pulse(ms)),
            ..Self::default()
        }
    }
}

// ── Engine ─────────────────────────────────────────────────

pub struct SwipeGestureEngine {
    config: SwipeConfig,
    width: f32,
    height: f32,
    density: f32,
    state: SwipeState,
}

impl SwipeGestureEngine {
    pub fn new(config: SwipeConfig, screen: &ScreenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            width: screen.width_px as f32,
            height: screen.height_px as f32,
            density: screen.density as f32,
            state: SwipeState::Waiting,
        })
    }

    pub fn config(&self) -> &SwipeConfig {
        &self.config
    }

    pub fn state(&self) -> SwipeState {
        self.state
    }

    /// True unless waiting for a trigger-zone entry.
    pub fn is_active(&self) -> bool {
        self.state != SwipeState::Waiting
    }

    fn px(&self, dp: f64) -> f32 {
        dp as f32 * self.density
    }

    /// Trigger zone containing the point, as the swipe it would start.
    pub fn trigger_zone(&self, x: f32, y: f32) -> Option<SwipeDirection> {
        if !self.config.enabled || y <= self.height - self.px(self.config.trigger_zone_height_dp) {
            return None;
        }
        let zone_w = self.px(self.config.trigger_zone_width_dp);
        if x < zone_w {
            Some(SwipeDirection::LeftToRight)
        } else if x > self.width - zone_w {
            Some(SwipeDirection::RightToLeft)
        } else {
            None
        }
    }

    /// Feed one stabilized point.
    pub fn update(&mut self, x: f32, y: f32, now_ms: u64) -> SwipeStep {
        if !self.config.enabled {
            return SwipeStep::default();
        }
        match self.state {
            SwipeState::Waiting => match self.trigger_zone(x, y) {
                Some(direction) => {
                    debug!("swipe: trigger zone entered ({})", direction.as_str());
                    self.state = SwipeState::TriggerReady {
                        direction,
                        entered_ms: now_ms,
                        armed: false,
                    };
                    SwipeStep::pulse(ENTER_PULSE_MS)
                }
                None => SwipeStep::default(),
            },
            SwipeState::TriggerReady {
                direction,
                entered_ms,
                armed,
            } => {
                let waited = now_ms.saturating_sub(entered_ms);
                if self.trigger_zone(x, y) == Some(direction) {
                    if !armed && waited > self.config.trigger_wait_ms / 2 {
                        self.state = SwipeState::TriggerReady {
                            direction,
                            entered_ms,
                            armed: true,
                        };
                        return SwipeStep::pulse(ARMED_PULSE_MS);
                    }
                    return SwipeStep::default();
                }
                if waited < self.config.trigger_wait_ms {
                    return self.fail(SwipeFailure::EarlyExit);
                }
                let zone_w = self.px(self.config.trigger_zone_width_dp);
                let forward = match direction {
                    SwipeDirection::LeftToRight => x >= zone_w,
                    SwipeDirection::RightToLeft => x <= self.width - zone_w,
                };
                if !forward {
                    return self.fail(SwipeFailure::WrongExit);
                }
                debug!("swipe: started at ({:.0}, {:.0})", x, y);
                self.state = SwipeState::Swiping {
                    direction,
                    start_x: x,
                    start_y: y,
                    start_ms: now_ms,
                };
                SwipeStep::pulse(START_PULSE_MS)
            }
            SwipeState::Swiping {
                direction,
                start_x,
                start_ms,
                ..
            } => {
                let elapsed = now_ms.saturating_sub(start_ms);
                if elapsed > self.config.max_swipe_ms {
                    return self.fail(SwipeFailure::TimedOut);
                }
                let progress_dp = (direction.sign() * (x - start_x) / self.density) as f64;
                if progress_dp <= -self.config.reverse_tolerance_dp {
                    return self.fail(SwipeFailure::Reversed);
                }
                if progress_dp < self.config.min_distance_dp {
                    return SwipeStep::default();
                }
                let speed = progress_dp / (elapsed.max(1) as f64 / 1000.0);
                if speed < self.config.min_speed_dp_s {
                    return self.fail(SwipeFailure::TooSlow);
                }
                info!(
                    "swipe: {} completed ({:.0} dp in {} ms, {:.0} dp/s)",
                    direction.as_str(),
                    progress_dp,
                    elapsed,
                    speed
                );
                self.state = SwipeState::Waiting;
                SwipeStep {
                    cue: Some(HapticCue::Pattern(SUCCESS_PATTERN_MS.to_vec())),
                    completed: Some(direction),
                    failure: None,
                }
            }
        }
    }

    fn fail(&mut self, failure: SwipeFailure) -> SwipeStep {
        debug!("swipe: failed ({}) in {}", failure.as_str(), self.state.as_str());
        self.state = SwipeState::Waiting;
        SwipeStep {
            failure: Some(failure),
            ..SwipeStep::default()
        }
    }

    /// Progress glyph, `None` while waiting.
    pub fn glyph(&self, now_ms: u64) -> Option<char> {
        match self.state {
            SwipeState::Waiting => None,
            SwipeState::TriggerReady {
                direction,
                entered_ms,
                ..
            } => {
                let waited = now_ms.saturating_sub(entered_ms);
                Some(if waited >= self.config.trigger_wait_ms {
                    match direction {
                        SwipeDirection::LeftToRight => '→',
                        SwipeDirection::RightToLeft => '←',
                    }
                } else if waited > self.config.trigger_wait_ms / 2 {
                    '◊'
                } else {
                    '◦'
                })
            }
            SwipeState::Swiping { direction, .. } => Some(match direction {
                SwipeDirection::LeftToRight => '⟶',
                SwipeDirection::RightToLeft => '⟵',
            }),
        }
    }

    pub fn reset(&mut self) {
        self.state = SwipeState::Waiting;
    }

    pub fn status_sexp(&self) -> String {
        let direction = match self.state {
            SwipeState::Waiting => "nil".to_string(),
            SwipeState::TriggerReady { direction, .. } | SwipeState::Swiping { direction, .. } => {
                format!(":{}", direction.as_str())
            }
        };
        format!(
            "(:enabled {} :state :{} :direction {})",
            if self.config.enabled { "t" } else { "nil" },
            self.state.as_str(),
            direction,
        )
    }
}
