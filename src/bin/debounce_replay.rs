//! debounce_replay - run recorded detections through the debounce filter
//!
//! Reads JSON Lines, one array of detections per frame, and writes every
//! emitted count as one JSON object per line on stdout. A blank or malformed
//! line is logged and replayed as a frame with no detections.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use occupancy_witness::debounce::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_REQUIRED_STREAK};
use occupancy_witness::{DebounceConfig, DebounceDetector, Detection, EventSink, JsonLinesSink};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input file (JSON Lines). Reads stdin when omitted or "-".
    input: Option<PathBuf>,
    /// Comma-separated target labels.
    #[arg(long, default_value = "person,cat", value_delimiter = ',')]
    targets: Vec<String>,
    /// Minimum detection confidence.
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    threshold: f32,
    /// Consecutive frames required before an event.
    #[arg(long, default_value_t = DEFAULT_REQUIRED_STREAK)]
    required_streak: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut detector = DebounceDetector::new(DebounceConfig {
        targets: args.targets.iter().map(|t| t.trim().to_string()).collect(),
        confidence_threshold: args.threshold,
        required_streak: args.required_streak,
    })?;

    let reader: Box<dyn BufRead> = match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => Box::new(BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("open input {}", path.display()))?,
        )),
        _ => Box::new(BufReader::new(std::io::stdin())),
    };

    let mut sink = JsonLinesSink::stdout();
    let stats = replay(reader, &mut detector, &mut sink)?;
    log::info!(
        "replayed {} frames ({} malformed), {} events",
        stats.frames,
        stats.malformed,
        stats.events
    );
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplayStats {
    frames: u64,
    malformed: u64,
    events: u64,
}

fn replay<R: BufRead, S: EventSink>(
    reader: R,
    detector: &mut DebounceDetector,
    sink: &mut S,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("read input line")?;
        let detections: Vec<Detection> = if line.trim().is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str(&line) {
                Ok(detections) => detections,
                Err(err) => {
                    log::warn!(
                        "line {}: invalid detections, treating as empty: {}",
                        idx + 1,
                        err
                    );
                    stats.malformed += 1;
                    Vec::new()
                }
            }
        };
        stats.frames += 1;
        if let Some(counts) = detector.update(&detections) {
            stats.events += 1;
            log::debug!("frame {}: emitted {}", stats.frames, counts);
            sink.emit(&counts)?;
        }
    }
    Ok(stats)
}
