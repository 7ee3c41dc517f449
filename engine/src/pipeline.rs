//! Per-sample processing: smoothing, cursor placement and gesture
//! arbitration.
//!
//! `GazePipeline::process` is synchronous and single-threaded. Each call
//! returns the frame's cursor, cues and at most one action as values;
//! delivering them is the caller's job (see `scheduler::EffectRelay`).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::calibration::offset::{
    is_offset_change_safe, offset_quality_score, validate_offset, OffsetValidation,
};
use crate::clock::Clock;
use crate::config::{EngineConfig, ScreenConfig};
use crate::effects::{Action, HapticCue};
use crate::error::Result;
use crate::filter::{FilterPreset, SignalFilter};
use crate::interaction::{
    ClickTiming, DwellClickDetector, EdgeTriggerEngine, SwipeGestureEngine, Zone,
};
use crate::sample::GazeSample;

/// Quiet period after an edge or click action (ms).
pub const REARM_AFTER_ACTION_MS: u64 = 500;
/// Quiet period after a completed swipe (ms).
pub const REARM_AFTER_SWIPE_MS: u64 = 800;

/// Which detector handled a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    None,
    Swipe,
    Edge,
    Click,
}

impl Owner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Swipe => "swipe",
            Self::Edge => "edge",
            Self::Click => "click",
        }
    }
}

/// Everything one sample produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    /// Cursor position in screen pixels, offset applied and clamped.
    pub cursor: Option<(f32, f32)>,
    pub action: Option<Action>,
    pub cues: Vec<HapticCue>,
    pub glyph: char,
    /// Dwell-click progress (0-1).
    pub click_progress: f32,
    pub owner: Owner,
}

impl FrameOutput {
    fn idle(cursor: Option<(f32, f32)>) -> Self {
        Self {
            cursor,
            action: None,
            cues: Vec::new(),
            glyph: Zone::None.glyph(),
            click_progress: 0.0,
            owner: Owner::None,
        }
    }

    pub fn to_sexp(&self) -> String {
        let cursor = match self.cursor {
            Some((x, y)) => format!("({:.1} {:.1})", x, y),
            None => "nil".to_string(),
        };
        let action = self
            .action
            .as_ref()
            .map_or_else(|| "nil".to_string(), Action::to_sexp);
        format!(
            "(:cursor {} :owner :{} :glyph \"{}\" :progress {:.2} :cues {} :action {})",
            cursor,
            self.owner.as_str(),
            self.glyph,
            self.click_progress,
            self.cues.len(),
            action,
        )
    }
}

pub struct GazePipeline {
    clock: Arc<dyn Clock>,
    screen: ScreenConfig,
    filter: SignalFilter,
    edge: EdgeTriggerEngine,
    swipe: SwipeGestureEngine,
    click: DwellClickDetector,
    offset: (f32, f32),
    calibrating: bool,
    rearm_at_ms: Option<u64>,
    frames: u64,
}

impl GazePipeline {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let EngineConfig {
            screen,
            filter,
            edge,
            swipe,
            click,
            cursor,
            ..
        } = config;
        let mut pipeline = Self {
            filter: SignalFilter::new(filter)?,
            edge: EdgeTriggerEngine::new(edge, &screen)?,
            swipe: SwipeGestureEngine::new(swipe, &screen)?,
            click: DwellClickDetector::new(click)?,
            screen,
            clock,
            offset: (0.0, 0.0),
            calibrating: false,
            rearm_at_ms: None,
            frames: 0,
        };
        pipeline.set_cursor_offset(cursor.offset_x, cursor.offset_y);
        Ok(pipeline)
    }

    pub fn filter(&self) -> &SignalFilter {
        &self.filter
    }

    pub fn edge(&self) -> &EdgeTriggerEngine {
        &self.edge
    }

    pub fn swipe(&self) -> &SwipeGestureEngine {
        &self.swipe
    }

    pub fn cursor_offset(&self) -> (f32, f32) {
        self.offset
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Gate interaction while a calibration collects points.
    pub fn set_calibrating(&mut self, calibrating: bool) {
        if calibrating != self.calibrating {
            debug!("pipeline: calibrating {}", calibrating);
            self.calibrating = calibrating;
            self.reset_engines();
        }
    }

    /// Validate and apply a cursor offset. The recommended offset is the
    /// one applied.
    pub fn set_cursor_offset(&mut self, ox: f32, oy: f32) -> OffsetValidation {
        let validation = validate_offset(
            ox,
            oy,
            self.screen.width_px as f32,
            self.screen.height_px as f32,
        );
        if !is_offset_change_safe(self.offset, validation.recommended) {
            warn!(
                "cursor offset jumps from {:?} to {:?}",
                self.offset, validation.recommended
            );
        }
        self.offset = validation.recommended;
        debug!(
            "cursor offset {:?} ({}), quality {}",
            self.offset,
            validation.level.as_str(),
            offset_quality_score(
                self.offset.0,
                self.offset.1,
                self.screen.width_px as f32,
                self.screen.height_px as f32,
            )
        );
        validation
    }

    pub fn apply_preset(&mut self, preset: FilterPreset) {
        self.filter.apply_preset(preset);
    }

    pub fn set_click_timing(&mut self, timing: ClickTiming) {
        self.click.set_timing(timing);
    }

    /// Filter state and every detector back to their initial state.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.reset_engines();
    }

    fn reset_engines(&mut self) {
        self.edge.reset();
        self.swipe.reset();
        self.click.reset();
        self.rearm_at_ms = None;
    }

    fn place_cursor(&self, (x, y): (f32, f32)) -> (f32, f32) {
        let max_x = self.screen.width_px.saturating_sub(1) as f32;
        let max_y = self.screen.height_px.saturating_sub(1) as f32;
        (
            (x + self.offset.0).clamp(0.0, max_x),
            (y + self.offset.1).clamp(0.0, max_y),
        )
    }

    /// Process one raw sample.
    pub fn process(&mut self, sample: &GazeSample) -> FrameOutput {
        let now = self.clock.now_ms();
        self.frames += 1;

        if let Some(due) = self.rearm_at_ms {
            if now >= due {
                debug!("pipeline: re-armed");
                self.reset_engines();
            }
        }

        let accepted = self.filter.filter_with_fixation(
            sample.timestamp_ms,
            sample.x,
            sample.y,
            sample.fixation,
            sample.state,
        );
        if !accepted {
            return FrameOutput::idle(None);
        }
        let cursor = self.place_cursor(self.filter.filtered_value());
        if !sample.state.is_success() || self.calibrating || self.rearm_at_ms.is_some() {
            return FrameOutput::idle(Some(cursor));
        }

        let (x, y) = cursor;
        let mut out = FrameOutput::idle(Some(cursor));

        if self.swipe.is_active() || self.swipe.trigger_zone(x, y).is_some() {
            self.edge.reset();
            self.click.reset();
            let step = self.swipe.update(x, y, now);
            out.owner = Owner::Swipe;
            out.cues.extend(step.cue);
            out.glyph = self.swipe.glyph(now).unwrap_or(out.glyph);
            if let Some(direction) = step.completed {
                out.action = Some(direction.action());
                self.schedule_rearm(now, REARM_AFTER_SWIPE_MS);
            }
        } else if self.edge.config().enabled && self.edge.classify(x, y) != Zone::None {
            self.click.reset();
            let step = self.edge.update(x, y, now);
            out.owner = Owner::Edge;
            out.cues.extend(step.cue);
            out.glyph = self.edge.glyph(now);
            if step.action.is_some() {
                out.action = step.action;
                self.schedule_rearm(now, REARM_AFTER_ACTION_MS);
            }
        } else {
            if self.edge.is_active() {
                self.edge.reset();
            }
            let step = self.click.update(x, y, now);
            out.owner = Owner::Click;
            out.cues.extend(step.cue);
            out.click_progress = step.progress;
            if let Some((cx, cy)) = step.click {
                out.action = Some(Action::ClickAt { x: cx, y: cy });
                self.schedule_rearm(now, REARM_AFTER_ACTION_MS);
            }
        }

        if let Some(action) = &out.action {
            info!("action {} via {}", action.kind(), out.owner.as_str());
        }
        out
    }

    fn schedule_rearm(&mut self, now: u64, delay_ms: u64) {
        self.rearm_at_ms = Some(now.saturating_add(delay_ms));
    }

    pub fn status_sexp(&self) -> String {
        let now = self.clock.now_ms();
        format!(
            "(:frames {} :calibrating {} :offset ({:.1} {:.1}) :rearm-ms {} :filter {} :edge {} :swipe {} :click {})",
            self.frames,
            if self.calibrating { "t" } else { "nil" },
            self.offset.0,
            self.offset.1,
            self.rearm_at_ms
                .map_or(0, |due| due.saturating_sub(now)),
            self.filter.status_sexp(),
            self.edge.status_sexp(now),
            self.swipe.status_sexp(),
            self.click.status_sexp(now),
        )
    }
}
