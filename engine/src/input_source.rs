//! Recorded tracking traces.
//!
//! A trace is the sequence of events the tracking engine delivered: gaze
//! frames, user-status reports, calibration callbacks and drift
//! proposals. [`TraceReplay`] feeds one back against a [`ManualClock`] so
//! the replay binary and the integration tests see the same timing the
//! engine did. Traces are JSON lines, one internally tagged event per
//! line:
//!
//! ```text
//! {"type":"gaze","timestamp_ms":33,"x":540.0,"y":12.0,"state":"success"}
//! {"type":"user_status","attention":0.9,"drowsiness":0.02}
//! {"type":"wait","ms":500}
//! ```

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calibration::{AccuracyTier, CalibrationMode};
use crate::clock::ManualClock;
use crate::error::TraceError;
use crate::sample::{GazeSample, UserStatus};

/// A unified input event from the tracking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Raw gaze frame.
    Gaze(GazeSample),
    /// Periodic attentiveness report.
    UserStatus {
        attention: f32,
        drowsiness: f32,
        #[serde(default)]
        is_drowsy: bool,
    },
    /// Calibration requested. Without a mode, settings are chosen from
    /// the latest user status.
    CalibrationStart {
        #[serde(default)]
        mode: Option<CalibrationMode>,
        #[serde(default)]
        accuracy: Option<AccuracyTier>,
    },
    CalibrationProgress { progress: f32 },
    CalibrationNextPoint { x: f32, y: f32 },
    CalibrationFinished {
        #[serde(default)]
        samples: Vec<f64>,
        #[serde(default)]
        center_offset: (f64, f64),
    },
    CalibrationCanceled {
        #[serde(default)]
        samples: Vec<f64>,
    },
    /// Drift correction proposal (px).
    Adjustment { dx: f64, dy: f64 },
    /// Let time pass (used in scripted sequences).
    Wait { ms: u64 },
}

impl InputEvent {
    /// User status carried by a `UserStatus` event, clamped.
    pub fn user_status(&self) -> Option<UserStatus> {
        match self {
            Self::UserStatus {
                attention,
                drowsiness,
                is_drowsy,
            } => Some(UserStatus::new(*attention, *drowsiness, *is_drowsy)),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gaze(_) => "gaze",
            Self::UserStatus { .. } => "user_status",
            Self::CalibrationStart { .. } => "calibration_start",
            Self::CalibrationProgress { .. } => "calibration_progress",
            Self::CalibrationNextPoint { .. } => "calibration_next_point",
            Self::CalibrationFinished { .. } => "calibration_finished",
            Self::CalibrationCanceled { .. } => "calibration_canceled",
            Self::Adjustment { .. } => "adjustment",
            Self::Wait { .. } => "wait",
        }
    }
}

/// Parse a JSON-lines trace. Blank lines and lines starting with `#` are
/// skipped; line numbers in errors are 1-based.
pub fn parse_trace(text: &str) -> Result<Vec<InputEvent>, TraceError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| TraceError::Json {
                line: i + 1,
                source,
            })
        })
        .collect()
}

/// Read and parse a trace file.
pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<InputEvent>, TraceError> {
    let text = std::fs::read_to_string(path)?;
    parse_trace(&text)
}

/// Write events as a JSON-lines trace that [`parse_trace`] reads back.
pub fn write_trace<W: Write>(mut writer: W, events: &[InputEvent]) -> Result<(), TraceError> {
    for event in events {
        serde_json::to_writer(&mut writer, event).map_err(TraceError::Encode)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Hands out trace events in order, keeping a [`ManualClock`] in step:
/// a gaze event moves the clock to its timestamp and a wait event
/// advances it, before the event is returned.
pub struct TraceReplay {
    events: VecDeque<InputEvent>,
    clock: Arc<ManualClock>,
    replayed: usize,
}

impl TraceReplay {
    pub fn new(events: Vec<InputEvent>, clock: Arc<ManualClock>) -> Self {
        Self {
            events: VecDeque::from(events),
            clock,
            replayed: 0,
        }
    }

    pub fn from_trace(text: &str, clock: Arc<ManualClock>) -> Result<Self, TraceError> {
        Ok(Self::new(parse_trace(text)?, clock))
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    /// Events handed out so far.
    pub fn replayed(&self) -> usize {
        self.replayed
    }
}

impl Iterator for TraceReplay {
    type Item = InputEvent;

    fn next(&mut self) -> Option<InputEvent> {
        let event = self.events.pop_front()?;
        match &event {
            InputEvent::Gaze(sample) => self.clock.advance_to(sample.timestamp_ms),
            InputEvent::Wait { ms } => self.clock.advance(Duration::from_millis(*ms)),
            _ => {}
        }
        self.replayed += 1;
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.events.len(), Some(self.events.len()))
    }
}
