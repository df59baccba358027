//! Debounce / hysteresis filter over per-frame target counts.
//!
//! Each frame's detections are filtered by confidence and tallied per
//! configured target label. Two references are tracked separately:
//!
//! - `last_frame_count`: the previous frame's tally. A target's streak grows
//!   while its count repeats frame to frame and drops to 1 on any change.
//! - `baseline`: the last *emitted* tally. An event fires only when some
//!   target's streak reaches `required_streak` and the current tally differs
//!   from the baseline as a whole.
//!
//! A frame with no detections at all resets every streak to 0. Emitting also
//! resets every streak to 0.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::detect::Detection;
use crate::error::ConfigError;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_REQUIRED_STREAK: u32 = 15;
pub const DEFAULT_TARGETS: [&str; 2] = ["person", "cat"];

// ----------------------------------------------------------------------------
// TargetCount
// ----------------------------------------------------------------------------

/// Count per configured target label, in configuration order.
///
/// Always holds exactly one entry per target. Serializes as a JSON object,
/// e.g. `{"person":1,"cat":0}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetCount {
    labels: Arc<[String]>,
    counts: Vec<u32>,
}

impl TargetCount {
    /// All-zero counts for `labels`.
    pub fn zeroed(labels: Arc<[String]>) -> Self {
        let counts = vec![0; labels.len()];
        Self { labels, counts }
    }

    /// Build from `(label, count)` pairs, keeping their order.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, u32)]) -> Self {
        let labels: Arc<[String]> = pairs.iter().map(|(l, _)| l.as_ref().to_string()).collect();
        let counts = pairs.iter().map(|(_, c)| *c).collect();
        Self { labels, counts }
    }

    /// Count for `label`, or `None` if it is not a configured target.
    pub fn get(&self, label: &str) -> Option<u32> {
        self.index_of(label).map(|i| self.counts[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.counts.iter().copied())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

impl fmt::Display for TargetCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (label, count)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", label, count)?;
        }
        Ok(())
    }
}

impl Serialize for TargetCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label, &count)?;
        }
        map.end()
    }
}

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Target labels, ordered, fixed for the detector's lifetime.
    pub targets: Vec<String>,
    /// Detections scoring below this are ignored.
    pub confidence_threshold: f32,
    /// Consecutive unchanged frames needed before a tally can be emitted.
    pub required_streak: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            targets: DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            required_streak: DEFAULT_REQUIRED_STREAK,
        }
    }
}

impl DebounceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::EmptyTargets);
        }
        for (i, target) in self.targets.iter().enumerate() {
            if self.targets[..i].contains(target) {
                return Err(ConfigError::DuplicateTarget(target.clone()));
            }
        }
        validate_threshold(self.confidence_threshold)?;
        if self.required_streak == 0 {
            return Err(ConfigError::ZeroRequiredStreak);
        }
        Ok(())
    }
}

fn validate_threshold(value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ThresholdOutOfRange(value));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// DebounceDetector
// ----------------------------------------------------------------------------

/// Per-target view of the filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    /// Streak below `required_streak`.
    Unstable,
    /// Streak at or above `required_streak`.
    Stable,
}

/// Hysteresis filter turning per-frame detections into stable count events.
///
/// Owned and mutated by a single consumer thread. `update` only compares
/// in-memory counts and is cheap enough to call at frame rate.
#[derive(Clone, Debug)]
pub struct DebounceDetector {
    labels: Arc<[String]>,
    last_frame_count: Vec<u32>,
    stable_streak: Vec<u32>,
    baseline: TargetCount,
    confidence_threshold: f32,
    required_streak: u32,
}

impl DebounceDetector {
    pub fn new(config: DebounceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let labels: Arc<[String]> = config.targets.into();
        let n = labels.len();
        Ok(Self {
            baseline: TargetCount::zeroed(labels.clone()),
            labels,
            last_frame_count: vec![0; n],
            stable_streak: vec![0; n],
            confidence_threshold: config.confidence_threshold,
            required_streak: config.required_streak,
        })
    }

    /// Feed one frame's detections. Returns the new tally when it has settled
    /// and differs from the last emitted one.
    pub fn update(&mut self, detections: &[Detection]) -> Option<TargetCount> {
        if detections.is_empty() {
            self.reset_streaks();
            return None;
        }

        let current = self.tally(detections);
        for (i, &count) in current.counts.iter().enumerate() {
            self.stable_streak[i] = if count == self.last_frame_count[i] {
                self.stable_streak[i].saturating_add(1)
            } else {
                1
            };
            self.last_frame_count[i] = count;
        }

        let settled = self
            .stable_streak
            .iter()
            .any(|&streak| streak >= self.required_streak);
        if settled && current != self.baseline {
            log::debug!("debounce: {} -> {}", self.baseline, current);
            self.baseline = current.clone();
            self.reset_streaks();
            return Some(current);
        }
        None
    }

    /// Change the confidence threshold for frames processed from now on.
    /// Streaks already accumulated are kept.
    pub fn set_threshold(&mut self, value: f32) -> Result<(), ConfigError> {
        validate_threshold(value)?;
        self.confidence_threshold = value;
        Ok(())
    }

    /// The last emitted tally; all zeros until the first emission.
    pub fn last_emitted(&self) -> &TargetCount {
        &self.baseline
    }

    pub fn threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn required_streak(&self) -> u32 {
        self.required_streak
    }

    pub fn targets(&self) -> &[String] {
        &self.labels
    }

    pub fn streak(&self, label: &str) -> Option<u32> {
        self.index_of(label).map(|i| self.stable_streak[i])
    }

    pub fn last_frame_count(&self, label: &str) -> Option<u32> {
        self.index_of(label).map(|i| self.last_frame_count[i])
    }

    pub fn state(&self, label: &str) -> Option<TargetState> {
        self.streak(label).map(|streak| {
            if streak >= self.required_streak {
                TargetState::Stable
            } else {
                TargetState::Unstable
            }
        })
    }

    fn tally(&self, detections: &[Detection]) -> TargetCount {
        let mut current = TargetCount::zeroed(self.labels.clone());
        for detection in detections
            .iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
        {
            if let Some(i) = self.index_of(&detection.label) {
                current.counts[i] += 1;
            }
        }
        current
    }

    fn reset_streaks(&mut self) {
        self.stable_streak.iter_mut().for_each(|s| *s = 0);
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
