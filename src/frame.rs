//! Captured frames and the two structures that hold them.
//!
//! - `Frame`: immutable image buffer. Pixel bytes are private and read-only.
//! - `FrameSlot`: the single most-recent frame, replaced by reference swap.
//! - `FrameHistory`: bounded FIFO of the last K frames.
//!
//! Frames travel as `Arc<Frame>`. Publishing a frame swaps a pointer under a
//! lock, so a reader either sees the previous frame or the new one, never a
//! partially written buffer.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::error::{CaptureError, ConfigError};

/// Pixel layout of a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Gray8,
    Yuyv,
    /// Compressed; length is not checked against dimensions.
    Mjpeg,
}

impl PixelFormat {
    fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(3),
            PixelFormat::Gray8 => Some(1),
            PixelFormat::Yuyv => Some(2),
            PixelFormat::Mjpeg => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// An owned image buffer, immutable once captured.
///
/// There is no mutable accessor. The acquisition thread stamps the sequence
/// number before the frame is shared; after that the frame is only read.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a captured buffer. Raw formats must carry exactly
    /// `width * height * bytes_per_pixel` bytes.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, CaptureError> {
        if let Some(bpp) = format.bytes_per_pixel() {
            let expected = (width as usize)
                .saturating_mul(height as usize)
                .saturating_mul(bpp);
            if data.len() != expected {
                return Err(CaptureError::InvalidFrame {
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            sequence: 0,
            captured_at: Instant::now(),
        })
    }

    /// Read-only pixel access.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// 1-based capture order assigned by the frame source (0 if never published).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

// ----------------------------------------------------------------------------
// FrameSlot
// ----------------------------------------------------------------------------

/// Holder of the most recent frame.
///
/// One writer (the acquisition thread), any number of readers. Readers hold
/// the read lock only long enough to clone the `Arc`.
#[derive(Debug, Default)]
pub struct FrameSlot {
    current: RwLock<Option<Arc<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame.
    pub fn publish(&self, frame: Arc<Frame>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(frame);
    }

    /// The most recently published frame, if any.
    pub fn current(&self) -> Option<Arc<Frame>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ----------------------------------------------------------------------------
// FrameHistory
// ----------------------------------------------------------------------------

/// Fixed-capacity history of the last K frames.
///
/// Eviction is strict FIFO: when full, the oldest frame is dropped before the
/// new one is appended. Capacity never changes after construction.
#[derive(Debug)]
pub struct FrameHistory {
    frames: VecDeque<Arc<Frame>>,
    capacity: usize,
}

impl FrameHistory {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        Ok(Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a frame, evicting the oldest while at capacity.
    pub fn push(&mut self, frame: Arc<Frame>) {
        while self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Frames oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Frame>> {
        self.frames.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Arc<Frame>> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Memory usage estimate.
    pub fn memory_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.byte_len()).sum()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
