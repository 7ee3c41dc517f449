//! End-to-end replay tests.
//!
//! Uses `ManualClock`, `ManualScheduler` and `TraceReplay` to drive
//! deterministic traces through the pipeline and the calibration
//! service, with recording ports on the far side of the scheduler.

use gaze_engine::calibration::{
    AccuracyTier, CalibrationListener, CalibrationMode, CalibrationNotice, CalibrationService,
    RecalibrationReason,
};
use gaze_engine::clock::{Clock, ManualClock};
use gaze_engine::config::EngineConfig;
use gaze_engine::effects::{Action, Delivered, HapticCue, RecordingEffects};
use gaze_engine::error::CalibrationError;
use gaze_engine::input_source::{read_trace, write_trace, InputEvent, TraceReplay};
use gaze_engine::pipeline::GazePipeline;
use gaze_engine::sample::{GazeSample, UserStatus};
use gaze_engine::scheduler::{EffectRelay, ManualScheduler};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"
[screen]
width_px = 1000
height_px = 1000
density = 1.0

[filter]
min_cutoff = 1000.0
"#;

#[derive(Default)]
struct NoticeLog(Mutex<Vec<CalibrationNotice>>);

impl CalibrationListener for NoticeLog {
    fn on_notice(&self, notice: &CalibrationNotice) {
        self.0.lock().push(notice.clone());
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    scheduler: Arc<ManualScheduler>,
    effects: Arc<RecordingEffects>,
    notices: Arc<NoticeLog>,
    relay: EffectRelay,
    service: CalibrationService,
    pipeline: GazePipeline,
}

impl Harness {
    fn new(config: &str) -> Self {
        let config = EngineConfig::from_toml_str(config).unwrap();
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let effects = Arc::new(RecordingEffects::new());
        let notices = Arc::new(NoticeLog::default());
        let relay = EffectRelay::new(scheduler.clone(), effects.clone(), effects.clone());
        let service = CalibrationService::new(
            config.advisor.clone(),
            config.drift.clone(),
            clock.clone(),
            scheduler.clone(),
            notices.clone(),
        )
        .unwrap();
        let pipeline = GazePipeline::new(config, clock.clone()).unwrap();
        Self {
            clock,
            scheduler,
            effects,
            notices,
            relay,
            service,
            pipeline,
        }
    }

    fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::Gaze(sample) => {
                let out = self.pipeline.process(&sample);
                self.relay.relay(&out.cues, out.action.as_ref());
            }
            InputEvent::UserStatus {
                attention,
                drowsiness,
                is_drowsy,
            } => self
                .service
                .on_user_status(UserStatus::new(attention, drowsiness, is_drowsy)),
            InputEvent::CalibrationStart { mode, accuracy } => {
                let _ = match mode {
                    Some(mode) => self
                        .service
                        .start(mode, accuracy.unwrap_or(AccuracyTier::Default)),
                    None => self.service.start_adaptive().map(|_| ()),
                };
            }
            InputEvent::CalibrationProgress { progress } => {
                let _ = self.service.on_progress(progress);
            }
            InputEvent::CalibrationNextPoint { x, y } => {
                let _ = self.service.on_next_point(x, y);
            }
            InputEvent::CalibrationFinished {
                samples,
                center_offset,
            } => {
                let _ = self.service.on_finished(samples, center_offset);
            }
            InputEvent::CalibrationCanceled { samples } => {
                let _ = self.service.on_canceled(samples);
            }
            InputEvent::Adjustment { dx, dy } => {
                self.service.propose_adjustment(dx, dy);
            }
            InputEvent::Wait { .. } => {}
        }
        self.pipeline.set_calibrating(self.service.is_calibrating());
        self.scheduler.run_due();
    }

    /// Replay events in order; returns how many were handled.
    fn run(&mut self, events: Vec<InputEvent>) -> usize {
        let mut replay = TraceReplay::new(events, self.clock.clone());
        for event in replay.by_ref() {
            self.handle(event);
        }
        replay.replayed()
    }

    fn apply(&mut self, event: InputEvent) {
        self.run(vec![event]);
    }

    fn notices(&self) -> Vec<CalibrationNotice> {
        self.notices.0.lock().clone()
    }
}

fn gaze_run(from_ms: u64, to_ms: u64, step_ms: u64, x: f32, y: f32) -> Vec<InputEvent> {
    (from_ms..=to_ms)
        .step_by(step_ms as usize)
        .map(|t| InputEvent::Gaze(GazeSample::valid(t, x, y)))
        .collect()
}

// ── Edge dwell ─────────────────────────────────────────────

#[test]
fn test_top_edge_dwell_scrolls_down_once() {
    let mut h = Harness::new(CONFIG);
    h.run(gaze_run(0, 2400, 30, 500.0, 2.0));

    assert_eq!(h.effects.actions(), vec![Action::ScrollDown(2)]);
    assert_eq!(
        h.effects.cues(),
        vec![
            HapticCue::Pulse(50),
            HapticCue::Pulse(100),
            HapticCue::Pulse(100),
            HapticCue::Pulse(300),
        ]
    );
    // Trigger cue is delivered before the action.
    let delivered = h.effects.delivered();
    assert_eq!(
        &delivered[delivered.len() - 2..],
        &[
            Delivered::Haptic(HapticCue::Pulse(300)),
            Delivered::Action(Action::ScrollDown(2)),
        ]
    );
}

#[test]
fn test_corner_zone_change_restarts_dwell() {
    let mut h = Harness::new(CONFIG);
    let mut events = gaze_run(0, 1500, 30, 20.0, 300.0);
    events.extend(gaze_run(1530, 3000, 30, 980.0, 300.0));
    h.run(events);

    // Neither residence reached the trigger time on its own.
    assert!(h.effects.actions().is_empty());
    assert_eq!(
        h.pipeline.edge().active_zone().as_str(),
        "right-top"
    );
}

#[test]
fn test_right_bottom_corner_action() {
    let mut h = Harness::new(CONFIG);
    h.run(gaze_run(0, 2400, 30, 980.0, 700.0));
    assert_eq!(
        h.effects.actions(),
        vec![Action::CornerAction(gaze_engine::effects::Corner::RightBottom)]
    );
}

// ── Swipe ──────────────────────────────────────────────────

#[test]
fn test_swipe_left_to_right_with_density() {
    let mut h = Harness::new(
        r#"
[screen]
width_px = 1000
height_px = 2000
density = 2.0

[filter]
min_cutoff = 1000.0
"#,
    );
    let mut events = gaze_run(0, 900, 30, 150.0, 1700.0);
    events.push(InputEvent::Gaze(GazeSample::valid(930, 300.0, 1700.0)));
    events.push(InputEvent::Gaze(GazeSample::valid(960, 1000.0, 1700.0)));
    events.extend(gaze_run(990, 1500, 30, 1000.0, 1700.0));
    h.run(events);

    assert_eq!(h.effects.actions(), vec![Action::SwipeRight]);
    let cues = h.effects.cues();
    assert_eq!(
        cues,
        vec![
            HapticCue::Pulse(50),
            HapticCue::Pulse(100),
            HapticCue::Pulse(150),
            HapticCue::Pattern(vec![0, 100, 50, 100]),
        ]
    );
    assert!(!h.pipeline.swipe().is_active());
}

#[test]
fn test_early_exit_from_trigger_zone_fails() {
    let mut h = Harness::new(CONFIG);
    let mut events = gaze_run(0, 300, 30, 950.0, 900.0);
    events.extend(gaze_run(330, 900, 30, 500.0, 900.0));
    h.run(events);
    assert!(h.effects.actions().is_empty());
    assert!(!h.pipeline.swipe().is_active());
}

// ── Dwell click ────────────────────────────────────────────

#[test]
fn test_dwell_click_within_aoi() {
    let mut h = Harness::new(CONFIG);
    let events: Vec<_> = (0..=25u64)
        .map(|i| {
            let jitter = if i % 2 == 0 { 10.0 } else { -10.0 };
            InputEvent::Gaze(GazeSample::valid(i * 50, 500.0 + jitter, 500.0))
        })
        .collect();
    h.run(events);

    let actions = h.effects.actions();
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], Action::ClickAt { .. }));
    assert_eq!(h.effects.cues(), vec![HapticCue::Pulse(100)]);
}

// ── Calibration ────────────────────────────────────────────

#[test]
fn test_calibration_gates_interaction_and_assesses_quality() {
    let mut h = Harness::new(CONFIG);
    let mut events = vec![
        InputEvent::UserStatus {
            attention: 0.95,
            drowsiness: 0.02,
            is_drowsy: false,
        },
        InputEvent::CalibrationStart {
            mode: None,
            accuracy: None,
        },
        InputEvent::CalibrationNextPoint { x: 100.0, y: 100.0 },
        InputEvent::CalibrationProgress { progress: 1.0 },
    ];
    // Top-edge gaze while calibrating does nothing.
    events.extend(gaze_run(0, 3000, 30, 500.0, 2.0));
    events.push(InputEvent::CalibrationFinished {
        samples: vec![500.0, 500.0, 502.0, 498.0],
        center_offset: (0.0, 0.0),
    });
    events.push(InputEvent::UserStatus {
        attention: 0.93,
        drowsiness: 0.03,
        is_drowsy: false,
    });
    // Go through the on-disk trace format, as the replay binary does.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.jsonl");
    write_trace(std::fs::File::create(&path).unwrap(), &events).unwrap();
    let replayed = h.run(read_trace(&path).unwrap());

    assert!(h.effects.delivered().is_empty());
    assert!(!h.pipeline.is_calibrating());

    let notices = h.notices();
    assert_eq!(
        notices[0],
        CalibrationNotice::Started {
            mode: CalibrationMode::FivePoint,
            accuracy: AccuracyTier::High,
        }
    );
    assert!(matches!(&notices[1], CalibrationNotice::Completed(s) if s.points == 1));
    match &notices[2] {
        CalibrationNotice::QualityAssessed(q) => {
            assert_eq!(q.score, 95);
            assert!(!q.needs_recalibration);
        }
        other => panic!("unexpected notice {:?}", other),
    }
    assert_eq!(replayed, 4 + 101 + 2);
}

#[test]
fn test_recalibration_rate_limited() {
    let h = Harness::new(CONFIG);
    h.clock.set_unix_millis(1_700_000_000_000);
    h.service
        .start(CalibrationMode::OnePoint, AccuracyTier::Low)
        .unwrap();
    h.service.on_finished(vec![], (0.0, 0.0)).unwrap();

    h.clock.advance(Duration::from_secs(10));
    assert_eq!(
        h.service.start(CalibrationMode::OnePoint, AccuracyTier::Low),
        Err(CalibrationError::TooSoon {
            remaining_ms: 20_000
        })
    );
    h.clock.advance(Duration::from_secs(20));
    assert!(h
        .service
        .start(CalibrationMode::OnePoint, AccuracyTier::Low)
        .is_ok());
}

#[test]
fn test_low_quality_and_drift_trend_notices() {
    let mut h = Harness::new(CONFIG);
    for (i, offset) in [0.0, 20.0, 40.0].iter().enumerate() {
        if i > 0 {
            h.apply(InputEvent::Wait { ms: 60_000 });
        }
        h.apply(InputEvent::CalibrationStart {
            mode: Some(CalibrationMode::OnePoint),
            accuracy: Some(AccuracyTier::Low),
        });
        h.apply(InputEvent::CalibrationFinished {
            samples: vec![],
            center_offset: (*offset, 0.0),
        });
    }
    let notices = h.notices();
    assert_eq!(
        notices
            .iter()
            .filter(|n| matches!(n, CalibrationNotice::LowQuality { .. }))
            .count(),
        3
    );
    assert!(notices.contains(&CalibrationNotice::RecalibrationRequested(
        RecalibrationReason::DriftTrend
    )));
    assert_eq!(h.service.history_stats().total, 3);
}

#[test]
fn test_advisor_recommendation_after_sustained_attention() {
    let mut h = Harness::new(CONFIG);
    for _ in 0..=10 {
        h.apply(InputEvent::UserStatus {
            attention: 0.85,
            drowsiness: 0.05,
            is_drowsy: false,
        });
        h.apply(InputEvent::Wait { ms: 1000 });
    }
    let recs: Vec<_> = h
        .notices()
        .into_iter()
        .filter_map(|n| match n {
            CalibrationNotice::Recommendation(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].mode, CalibrationMode::FivePoint);
    assert_eq!(recs[0].confidence, 94);
    assert_eq!(h.clock.now_ms(), 11_000);
}

// ── Drift ──────────────────────────────────────────────────

#[test]
fn test_drift_ceiling_requests_recalibration() {
    let mut h = Harness::new(
        r#"
[drift]
max_consecutive_adaptations = 5
"#,
    );
    for dx in [20.0, 20.0, 5.0] {
        h.apply(InputEvent::Adjustment { dx, dy: 0.0 });
        h.apply(InputEvent::Wait { ms: 300_000 });
    }
    assert_eq!(h.service.accumulated_drift(), (45.0, 0.0));

    h.apply(InputEvent::Adjustment { dx: 10.0, dy: 0.0 });
    assert_eq!(h.service.accumulated_drift(), (0.0, 0.0));
    assert_eq!(
        h.notices(),
        vec![CalibrationNotice::RecalibrationRequested(
            RecalibrationReason::DriftCeiling
        )]
    );
}

#[test]
fn test_finished_calibration_clears_drift() {
    let mut h = Harness::new(CONFIG);
    h.apply(InputEvent::Adjustment { dx: 10.0, dy: 5.0 });
    assert_eq!(h.service.accumulated_drift(), (10.0, 5.0));
    h.apply(InputEvent::CalibrationStart {
        mode: Some(CalibrationMode::FivePoint),
        accuracy: None,
    });
    h.apply(InputEvent::CalibrationFinished {
        samples: vec![],
        center_offset: (0.0, 0.0),
    });
    assert_eq!(h.service.accumulated_drift(), (0.0, 0.0));
}
