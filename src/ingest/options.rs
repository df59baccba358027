use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

pub const OPTION_FPS: &str = "fps";
pub const OPTION_WIDTH: &str = "width";
pub const OPTION_HEIGHT: &str = "height";
/// Synthetic devices only: end the stream after this many frames.
pub const OPTION_FRAMES: &str = "frames";

/// Key/value capture settings applied to a device when it is opened
/// (e.g. `fps = 15`). Devices apply what they understand and warn about the rest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureOptions {
    values: BTreeMap<String, f64>,
}

impl CaptureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fps(&self) -> Result<Option<u32>, ConfigError> {
        self.positive_integer(OPTION_FPS)
            .map(|v| v.map(|fps| fps.min(u32::MAX as u64) as u32))
    }

    pub fn width(&self) -> Result<Option<u32>, ConfigError> {
        self.positive_integer(OPTION_WIDTH)
            .map(|v| v.map(|w| w.min(u32::MAX as u64) as u32))
    }

    pub fn height(&self) -> Result<Option<u32>, ConfigError> {
        self.positive_integer(OPTION_HEIGHT)
            .map(|v| v.map(|h| h.min(u32::MAX as u64) as u32))
    }

    pub fn frames(&self) -> Result<Option<u64>, ConfigError> {
        self.positive_integer(OPTION_FRAMES)
    }

    /// Log every key not in `known`. Returns the ignored keys.
    pub fn warn_unsupported(&self, device: &str, known: &[&str]) -> Vec<String> {
        let ignored: Vec<String> = self
            .values
            .keys()
            .filter(|key| !known.contains(&key.as_str()))
            .cloned()
            .collect();
        for key in &ignored {
            log::warn!("{}: ignoring unsupported capture option {:?}", device, key);
        }
        ignored
    }

    fn positive_integer(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
            return Err(ConfigError::InvalidOption {
                key: key.to_string(),
                value,
            });
        }
        Ok(Some(value as u64))
    }
}
