//! Discrete actions and haptic cues leaving the engine, plus the ports
//! that deliver them.
//!
//! Engines never call the ports directly: they return `Action` and
//! `HapticCue` values from each frame, and the integration layer decides
//! how to deliver them (see `scheduler::EffectRelay`).

use parking_lot::Mutex;
use tracing::{debug, info};

// ── Corner ─────────────────────────────────────────────────

/// Screen corner quadrant, used both for edge zones and corner actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    LeftTop,
    LeftBottom,
    RightTop,
    RightBottom,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::LeftTop,
        Corner::LeftBottom,
        Corner::RightTop,
        Corner::RightBottom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftTop => "left-top",
            Self::LeftBottom => "left-bottom",
            Self::RightTop => "right-top",
            Self::RightBottom => "right-bottom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "left-top" => Some(Self::LeftTop),
            "left-bottom" => Some(Self::LeftBottom),
            "right-top" => Some(Self::RightTop),
            "right-bottom" => Some(Self::RightBottom),
            _ => None,
        }
    }
}

// ── Action ─────────────────────────────────────────────────

/// A discrete interaction token for the OS action dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ClickAt { x: f32, y: f32 },
    ScrollUp(u32),
    ScrollDown(u32),
    SwipeLeft,
    SwipeRight,
    CornerAction(Corner),
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClickAt { .. } => "click",
            Self::ScrollUp(_) => "scroll-up",
            Self::ScrollDown(_) => "scroll-down",
            Self::SwipeLeft => "swipe-left",
            Self::SwipeRight => "swipe-right",
            Self::CornerAction(_) => "corner",
        }
    }

    /// S-expression form used by the replay CLI.
    pub fn to_sexp(&self) -> String {
        match self {
            Self::ClickAt { x, y } => format!("(:action :click :x {:.1} :y {:.1})", x, y),
            Self::ScrollUp(n) => format!("(:action :scroll-up :count {})", n),
            Self::ScrollDown(n) => format!("(:action :scroll-down :count {})", n),
            Self::SwipeLeft => "(:action :swipe-left)".to_string(),
            Self::SwipeRight => "(:action :swipe-right)".to_string(),
            Self::CornerAction(c) => format!("(:action :corner :id :{})", c.as_str()),
        }
    }
}

// ── Haptics ────────────────────────────────────────────────

/// Vibration request emitted alongside gesture progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HapticCue {
    /// Single pulse of the given duration (ms).
    Pulse(u64),
    /// Alternating off/on durations (ms), first entry is a delay.
    Pattern(Vec<u64>),
}

/// Fire-and-forget haptic device.
pub trait HapticPort: Send + Sync {
    fn pulse(&self, duration_ms: u64);
    fn pulse_pattern(&self, pattern_ms: &[u64]);

    /// Deliver a cue through the matching method.
    fn play(&self, cue: &HapticCue) {
        match cue {
            HapticCue::Pulse(ms) => self.pulse(*ms),
            HapticCue::Pattern(p) => self.pulse_pattern(p),
        }
    }
}

/// Receiver for discrete actions.
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, action: &Action);
}

/// Haptic port that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHaptics;

impl HapticPort for LoggingHaptics {
    fn pulse(&self, duration_ms: u64) {
        debug!("haptic pulse {} ms", duration_ms);
    }

    fn pulse_pattern(&self, pattern_ms: &[u64]) {
        debug!("haptic pattern {:?}", pattern_ms);
    }
}

/// Dispatcher that logs and prints actions as s-expressions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintingDispatcher;

impl ActionDispatcher for PrintingDispatcher {
    fn dispatch(&self, action: &Action) {
        info!("dispatch {}", action.kind());
        println!("{}", action.to_sexp());
    }
}

/// One delivered effect, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivered {
    Haptic(HapticCue),
    Action(Action),
}

/// Haptic port and dispatcher that record everything delivered.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    log: Mutex<Vec<Delivered>>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn delivered(&self) -> Vec<Delivered> {
        self.log.lock().clone()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.log
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivered::Action(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn cues(&self) -> Vec<HapticCue> {
        self.log
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivered::Haptic(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }
}

impl HapticPort for RecordingEffects {
    fn pulse(&self, duration_ms: u64) {
        self.log.lock().push(Delivered::Haptic(HapticCue::Pulse(duration_ms)));
    }

    fn pulse_pattern(&self, pattern_ms: &[u64]) {
        self.log
            .lock()
            .push(Delivered::Haptic(HapticCue::Pattern(pattern_ms.to_vec())));
    }
}

impl ActionDispatcher for RecordingEffects {
    fn dispatch(&self, action: &Action) {
        self.log.lock().push(Delivered::Action(action.clone()));
    }
}
