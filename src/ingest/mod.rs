//! Frame acquisition.
//!
//! This module provides:
//! - `CaptureDevice`: the device abstraction (read one frame, close)
//! - Device backends selected by source id:
//!   - `stub://<name>`: synthetic test pattern
//!   - `/dev/videoN` or a bare camera index: V4L2 (feature: ingest-v4l2)
//! - `FrameSource`: the background acquisition thread with latest-frame slot
//!   and bounded history
//!
//! Device reads block. Only the acquisition thread ever calls them.

mod options;
mod source;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use options::{CaptureOptions, OPTION_FPS, OPTION_FRAMES, OPTION_HEIGHT, OPTION_WIDTH};
pub use source::{AcquisitionStatus, FrameSource, SourceStats};
pub use synthetic::SyntheticDevice;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Device;

use crate::error::CaptureError;
use crate::frame::Frame;

/// A capture device owned by the acquisition thread.
pub trait CaptureDevice: Send {
    /// Human-readable identity for logs.
    fn describe(&self) -> String;

    /// Block until the next frame is available.
    ///
    /// `Ok(None)` marks end-of-stream. Any error ends acquisition.
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Release the underlying device. Called exactly once, on the acquisition
    /// thread, after the last read.
    fn close(&mut self) {}
}

/// Open the device named by `source_id` and apply `options`.
pub fn open_device(
    source_id: &str,
    options: &CaptureOptions,
) -> Result<Box<dyn CaptureDevice>, CaptureError> {
    if source_id.starts_with("stub://") {
        return Ok(Box::new(SyntheticDevice::open(source_id, options)?));
    }
    if let Some(path) = v4l2_device_path(source_id) {
        #[cfg(feature = "ingest-v4l2")]
        {
            return Ok(Box::new(V4l2Device::open(&path, options)?));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            return Err(CaptureError::DeviceOpen {
                source_id: path,
                reason: "V4L2 capture requires the ingest-v4l2 feature".to_string(),
            });
        }
    }
    Err(CaptureError::DeviceOpen {
        source_id: source_id.to_string(),
        reason: "unsupported source (expected stub://<name>, /dev/videoN, or a camera index)"
            .to_string(),
    })
}

/// Map a bare camera index or `/dev/videoN` path to a device node path.
pub(crate) fn v4l2_device_path(source_id: &str) -> Option<String> {
    let trimmed = source_id.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("/dev/video{}", trimmed));
    }
    let index = trimmed.strip_prefix("/dev/video")?;
    if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    None
}
