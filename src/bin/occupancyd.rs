//! occupancyd - occupancy witness daemon
//!
//! This daemon:
//! 1. Starts background acquisition on the configured source
//! 2. Runs the configured detector on each new frame
//! 3. Debounces per-frame counts into stable occupancy events
//! 4. Forwards events to the configured sink
//! 5. Stops acquisition on Ctrl-C or when the source ends

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use occupancy_witness::config::{DetectorSettings, OccupancyConfig, SinkKind};
use occupancy_witness::{
    AcquisitionStatus, DetectorBackend, EventSink, FrameSource, JsonLinesSink, LogSink, Pipeline,
    RunExit, ScriptedBackend, StubBackend,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "OCCUPANCY_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = OccupancyConfig::load_from(args.config.as_deref())?;

    let backend = build_backend(&cfg.detector)?;
    let sink = build_sink(cfg.sink);
    let mut pipeline = Pipeline::new(cfg.debounce.clone(), backend, sink)?;
    pipeline
        .backend_mut()
        .warm_up()
        .map_err(|e| anyhow!("detector warm-up failed: {:#}", e))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let source = FrameSource::start(
        &cfg.source.id,
        cfg.source.history_frames,
        &cfg.source.capture,
    )?;

    log::info!("occupancyd running. source={}", source.source_id());
    log::info!(
        "targets={} threshold={:.2} required_streak={} history_frames={}",
        cfg.debounce.targets.join(","),
        cfg.debounce.confidence_threshold,
        cfg.debounce.required_streak,
        cfg.source.history_frames
    );

    let mut last_health_log = Instant::now();
    let summary = pipeline.run_with(&source, &shutdown, |pipeline, source| {
        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "source status={:?} frames={} history={} id={} counts: {}",
                stats.status,
                stats.frames_captured,
                stats.history_len,
                stats.source_id,
                pipeline.debounce().last_emitted()
            );
            last_health_log = Instant::now();
        }
    });
    if summary.exit == RunExit::Shutdown {
        log::info!("shutdown signal received, stopping acquisition...");
    }

    let stopped = source.stop();
    log::info!(
        "occupancyd exiting ({:?}): {} frames processed, {} events emitted",
        summary.exit,
        summary.frames_processed,
        summary.events_emitted
    );
    stopped?;

    match summary.exit {
        RunExit::SourceEnded(AcquisitionStatus::Failed) => {
            Err(anyhow!("acquisition on {} failed", source.source_id()))
        }
        _ => Ok(()),
    }
}

fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings {
        DetectorSettings::Stub => Ok(Box::new(StubBackend::new())),
        DetectorSettings::Scripted { script_path } => {
            let backend = ScriptedBackend::from_json_file(script_path)?;
            log::info!(
                "scripted detector loaded {} frames from {}",
                backend.len(),
                script_path.display()
            );
            Ok(Box::new(backend))
        }
    }
}

fn build_sink(kind: SinkKind) -> Box<dyn EventSink> {
    match kind {
        SinkKind::Log => Box::new(LogSink::new()),
        SinkKind::Stdout => Box::new(JsonLinesSink::stdout()),
    }
}
