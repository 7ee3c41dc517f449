//! gaze-engine - replay a recorded gaze trace through the engine.
//!
//! Reads JSON-lines tracking events, runs them through the pipeline and
//! the calibration service on a manual clock, and prints every dispatched
//! action and calibration notice as an s-expression.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use gaze_engine::calibration::{
    AccuracyTier, CalibrationListener, CalibrationNotice, CalibrationService,
};
use gaze_engine::clock::ManualClock;
use gaze_engine::config::EngineConfig;
use gaze_engine::effects::{LoggingHaptics, PrintingDispatcher};
use gaze_engine::error::ConfigError;
use gaze_engine::filter::FilterPreset;
use gaze_engine::input_source::{parse_trace, write_trace, InputEvent, TraceReplay};
use gaze_engine::pipeline::GazePipeline;
use gaze_engine::sample::UserStatus;
use gaze_engine::scheduler::{EffectRelay, ManualScheduler};

#[derive(Parser, Debug)]
#[command(name = "gaze-engine", version, about = "Replay a gaze trace through the gesture engine")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines trace to replay (default: stdin)
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Filter preset: stability, balanced-stability, balanced or responsive
    #[arg(long)]
    preset: Option<String>,

    /// Print engine status after the replay
    #[arg(long)]
    status: bool,

    /// Write the replayed events back out as a normalised trace
    #[arg(long)]
    record: Option<PathBuf>,
}

/// Prints calibration notices.
struct PrintingListener;

impl CalibrationListener for PrintingListener {
    fn on_notice(&self, notice: &CalibrationNotice) {
        info!("calibration notice: {:?}", notice);
        println!("{}", notice.to_sexp());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gaze_engine=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("gaze-engine v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let text = match &cli.trace {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading trace {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading trace from stdin")?;
            buf
        }
    };
    let events = parse_trace(&text).context("parsing trace")?;
    if let Some(path) = &cli.record {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        write_trace(std::io::BufWriter::new(file), &events)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let clock = Arc::new(ManualClock::new());
    let replay = TraceReplay::new(events, clock.clone());
    info!("replaying {} events", replay.remaining());
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let relay = EffectRelay::new(
        scheduler.clone(),
        Arc::new(LoggingHaptics),
        Arc::new(PrintingDispatcher),
    );
    let service = CalibrationService::new(
        config.advisor.clone(),
        config.drift.clone(),
        clock.clone(),
        scheduler.clone(),
        Arc::new(PrintingListener),
    )
    .context("creating calibration service")?;
    let mut pipeline = GazePipeline::new(config, clock.clone()).context("creating pipeline")?;

    if let Some(name) = &cli.preset {
        let preset =
            FilterPreset::from_str(name).ok_or_else(|| ConfigError::UnknownPreset(name.clone()))?;
        pipeline.apply_preset(preset);
    }

    let mut actions = 0usize;
    for event in replay {
        match event {
            InputEvent::Gaze(sample) => {
                let out = pipeline.process(&sample);
                if out.action.is_some() {
                    actions += 1;
                }
                relay.relay(&out.cues, out.action.as_ref());
            }
            InputEvent::UserStatus {
                attention,
                drowsiness,
                is_drowsy,
            } => service.on_user_status(UserStatus::new(attention, drowsiness, is_drowsy)),
            InputEvent::CalibrationStart { mode, accuracy } => {
                let started = match mode {
                    Some(mode) => service.start(mode, accuracy.unwrap_or(AccuracyTier::Default)),
                    None => service.start_adaptive().map(|_| ()),
                };
                if let Err(e) = started {
                    warn!("calibration start refused: {}", e);
                }
            }
            InputEvent::CalibrationProgress { progress } => {
                if let Err(e) = service.on_progress(progress) {
                    debug!("progress ignored: {}", e);
                }
            }
            InputEvent::CalibrationNextPoint { x, y } => {
                if let Err(e) = service.on_next_point(x, y) {
                    debug!("next point ignored: {}", e);
                }
            }
            InputEvent::CalibrationFinished {
                samples,
                center_offset,
            } => {
                if let Err(e) = service.on_finished(samples, center_offset) {
                    warn!("calibration finish ignored: {}", e);
                }
            }
            InputEvent::CalibrationCanceled { samples } => {
                if let Err(e) = service.on_canceled(samples) {
                    warn!("calibration cancel ignored: {}", e);
                }
            }
            InputEvent::Adjustment { dx, dy } => {
                let applied = service.propose_adjustment(dx, dy);
                debug!("adjustment ({:.1}, {:.1}) applied: {}", dx, dy, applied);
            }
            InputEvent::Wait { ms } => debug!("waited {} ms", ms),
        }
        pipeline.set_calibrating(service.is_calibrating());
        scheduler.run_due();
    }
    scheduler.run_due();

    info!("replay finished: {} actions", actions);
    if cli.status {
        println!("{}", pipeline.status_sexp());
        println!("{}", service.status_sexp());
    }
    Ok(())
}
