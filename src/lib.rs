//! Occupancy Witness
//!
//! Turns a noisy stream of per-frame object detections into stable, low-rate
//! "occupancy changed" events, while acquiring frames from a live device on a
//! background thread.
//!
//! # Architecture
//!
//! ```text
//! device -> FrameSource (acquisition thread) -> current frame
//!        -> DetectorBackend (black box) -> detections
//!        -> DebounceDetector::update -> Option<TargetCount> -> EventSink
//! ```
//!
//! # Module Structure
//!
//! - `frame`: immutable frames, latest-frame slot, bounded history
//! - `ingest`: capture devices and the `FrameSource` acquisition thread
//! - `detect`: detection result types and the detector backend trait
//! - `debounce`: target counts and the hysteresis filter
//! - `sink`: destinations for emitted counts
//! - `pipeline`: the consumer loop tying the above together
//! - `config`: file + environment configuration for the daemon

pub mod config;
pub mod debounce;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod sink;

pub use debounce::{DebounceConfig, DebounceDetector, TargetCount, TargetState};
pub use detect::{BoundingBox, Detection, DetectorBackend, ScriptedBackend, StubBackend};
pub use error::{CaptureError, ConfigError};
pub use frame::{Frame, FrameHistory, FrameSlot, PixelFormat};
pub use ingest::{
    open_device, AcquisitionStatus, CaptureDevice, CaptureOptions, FrameSource, SourceStats,
    SyntheticDevice,
};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::V4l2Device;
pub use pipeline::{LatestCounts, Pipeline, PollOutcome, RunExit, RunSummary};
pub use sink::{ChannelSink, EventSink, JsonLinesSink, LogSink};
