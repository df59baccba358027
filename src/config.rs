use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::debounce::DebounceConfig;
use crate::error::ConfigError;
use crate::ingest::{CaptureOptions, OPTION_FPS};

const DEFAULT_SOURCE_ID: &str = "stub://camera0";
const DEFAULT_HISTORY_FRAMES: usize = 10;
const DEFAULT_CAPTURE_FPS: f64 = 15.0;

#[derive(Debug, Deserialize, Default)]
struct OccupancyConfigFile {
    source: Option<SourceConfigFile>,
    debounce: Option<DebounceConfigFile>,
    detector: Option<DetectorConfigFile>,
    sink: Option<SinkConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    id: Option<String>,
    history_frames: Option<usize>,
    capture: Option<CaptureOptions>,
}

#[derive(Debug, Deserialize, Default)]
struct DebounceConfigFile {
    targets: Option<Vec<String>>,
    confidence_threshold: Option<f32>,
    required_streak: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    script_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SinkConfigFile {
    kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OccupancyConfig {
    pub source: SourceSettings,
    pub debounce: DebounceConfig,
    pub detector: DetectorSettings,
    pub sink: SinkKind,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub id: String,
    pub history_frames: usize,
    pub capture: CaptureOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorSettings {
    /// Reports no detections.
    Stub,
    /// Replays a JSON detection script.
    Scripted { script_path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Log,
    Stdout,
}

impl SinkKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(SinkKind::Log),
            "stdout" => Ok(SinkKind::Stdout),
            other => Err(anyhow!("unknown sink kind '{}' (expected log or stdout)", other)),
        }
    }
}

impl OccupancyConfig {
    /// Load from the file named by `OCCUPANCY_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OCCUPANCY_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, but reads the given file instead of `OCCUPANCY_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON config document without consulting the environment.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: OccupancyConfigFile =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let mut cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OccupancyConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let mut capture = source_file.capture.unwrap_or_default();
        if capture.get(OPTION_FPS).is_none() {
            capture.set(OPTION_FPS, DEFAULT_CAPTURE_FPS);
        }
        let source = SourceSettings {
            id: source_file
                .id
                .unwrap_or_else(|| DEFAULT_SOURCE_ID.to_string()),
            history_frames: source_file
                .history_frames
                .unwrap_or(DEFAULT_HISTORY_FRAMES),
            capture,
        };

        let defaults = DebounceConfig::default();
        let debounce_file = file.debounce.unwrap_or_default();
        let debounce = DebounceConfig {
            targets: debounce_file.targets.unwrap_or(defaults.targets),
            confidence_threshold: debounce_file
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            required_streak: debounce_file
                .required_streak
                .unwrap_or(defaults.required_streak),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = match (detector_file.backend.as_deref(), detector_file.script_path) {
            (Some("stub"), _) | (None, None) => DetectorSettings::Stub,
            (None | Some("scripted"), Some(script_path)) => {
                DetectorSettings::Scripted { script_path }
            }
            (Some("scripted"), None) => {
                return Err(anyhow!("scripted detector requires detector.script_path"))
            }
            (Some(other), _) => return Err(anyhow!("unknown detector backend '{}'", other)),
        };

        let sink = match file.sink.and_then(|sink| sink.kind) {
            Some(kind) => SinkKind::parse(&kind)?,
            None => SinkKind::Log,
        };

        Ok(Self {
            source,
            debounce,
            detector,
            sink,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("OCCUPANCY_SOURCE") {
            if !source.trim().is_empty() {
                self.source.id = source.trim().to_string();
            }
        }
        if let Ok(fps) = std::env::var("OCCUPANCY_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("OCCUPANCY_FPS must be a whole number of frames per second"))?;
            self.source.capture.set(OPTION_FPS, fps as f64);
        }
        if let Ok(frames) = std::env::var("OCCUPANCY_HISTORY_FRAMES") {
            self.source.history_frames = frames
                .parse()
                .map_err(|_| anyhow!("OCCUPANCY_HISTORY_FRAMES must be an integer"))?;
        }
        if let Ok(targets) = std::env::var("OCCUPANCY_TARGETS") {
            let parsed = split_csv(&targets);
            if !parsed.is_empty() {
                self.debounce.targets = parsed;
            }
        }
        if let Ok(threshold) = std::env::var("OCCUPANCY_THRESHOLD") {
            self.debounce.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("OCCUPANCY_THRESHOLD must be a number in [0, 1]"))?;
        }
        if let Ok(streak) = std::env::var("OCCUPANCY_REQUIRED_STREAK") {
            self.debounce.required_streak = streak
                .parse()
                .map_err(|_| anyhow!("OCCUPANCY_REQUIRED_STREAK must be a positive integer"))?;
        }
        if let Ok(path) = std::env::var("OCCUPANCY_DETECTOR_SCRIPT") {
            if !path.trim().is_empty() {
                self.detector = DetectorSettings::Scripted {
                    script_path: PathBuf::from(path),
                };
            }
        }
        if let Ok(kind) = std::env::var("OCCUPANCY_SINK") {
            self.sink = SinkKind::parse(&kind)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.debounce.targets = self
            .debounce
            .targets
            .iter()
            .map(|t| t.trim().to_string())
            .collect();
        self.debounce.validate()?;
        if self.source.history_frames == 0 {
            return Err(ConfigError::ZeroHistoryCapacity.into());
        }
        self.source.capture.fps()?;
        self.source.capture.width()?;
        self.source.capture.height()?;
        if self.source.id.trim().is_empty() {
            return Err(anyhow!("source id must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<OccupancyConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
