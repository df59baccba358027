use thiserror::Error;

/// Configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("target label set must not be empty")]
    EmptyTargets,
    #[error("target label {0:?} is listed more than once")]
    DuplicateTarget(String),
    #[error("confidence threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f32),
    #[error("required stability streak must be at least 1")]
    ZeroRequiredStreak,
    #[error("frame history capacity must be at least 1")]
    ZeroHistoryCapacity,
    #[error("capture option {key:?} has invalid value {value}")]
    InvalidOption { key: String, value: f64 },
}

/// Errors raised by capture devices and the frame source.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device could not be opened. Acquisition never begins.
    #[error("failed to open video source {source_id:?}: {reason}")]
    DeviceOpen { source_id: String, reason: String },
    /// A frame read failed. Ends the acquisition thread.
    #[error("failed to read frame from {source_id:?}: {reason}")]
    DeviceRead { source_id: String, reason: String },
    #[error("frame buffer length mismatch: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
