//! Background frame acquisition.
//!
//! `FrameSource` owns one producer thread that reads frames from a capture
//! device and publishes them to a `FrameSlot` (latest frame) and a
//! `FrameHistory` (last K frames). The slot and the history are guarded
//! independently; no thread holds both locks at once.
//!
//! Acquisition ends when:
//! - `stop()` is called (checked between reads),
//! - the device reports end-of-stream, or
//! - a read fails or panics. There is no retry; the last frame stays readable.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use super::options::CaptureOptions;
use super::{open_device, CaptureDevice};
use crate::error::CaptureError;
use crate::frame::{Frame, FrameHistory, FrameSlot};

/// Lifecycle of the acquisition thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AcquisitionStatus {
    Running = 0,
    /// `stop()` was requested and the thread has exited.
    Stopped = 1,
    /// The device reported end-of-stream.
    EndOfStream = 2,
    /// A device read failed.
    Failed = 3,
}

impl AcquisitionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => AcquisitionStatus::Running,
            1 => AcquisitionStatus::Stopped,
            2 => AcquisitionStatus::EndOfStream,
            _ => AcquisitionStatus::Failed,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source_id: String,
    pub history_len: usize,
    pub status: AcquisitionStatus,
}

struct Shared {
    slot: FrameSlot,
    history: Mutex<FrameHistory>,
    stop_requested: AtomicBool,
    status: AtomicU8,
    frames_captured: AtomicU64,
}

impl Shared {
    fn publish(&self, frame: Frame) {
        let sequence = self.frames_captured.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = Arc::new(frame.with_sequence(sequence));
        self.slot.publish(frame.clone());
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
    }

    fn status(&self) -> AcquisitionStatus {
        AcquisitionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn set_status(&self, status: AcquisitionStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }
}

/// Decouples a blocking capture device from any number of frame readers.
///
/// Dropping a `FrameSource` stops it, so the device is released on every exit
/// path of the owning scope.
pub struct FrameSource {
    source_id: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FrameSource {
    /// Open `source_id`, apply `options`, and start acquisition.
    ///
    /// Configuration and open failures are returned here, before any thread
    /// exists.
    pub fn start(
        source_id: &str,
        capacity: usize,
        options: &CaptureOptions,
    ) -> Result<Self, CaptureError> {
        let history = FrameHistory::new(capacity)?;
        let device = open_device(source_id, options)?;
        Self::launch(device, source_id, history)
    }

    /// Start acquisition on a device that is already open.
    pub fn spawn(
        device: Box<dyn CaptureDevice>,
        source_id: &str,
        capacity: usize,
    ) -> Result<Self, CaptureError> {
        let history = FrameHistory::new(capacity)?;
        Self::launch(device, source_id, history)
    }

    fn launch(
        device: Box<dyn CaptureDevice>,
        source_id: &str,
        history: FrameHistory,
    ) -> Result<Self, CaptureError> {
        let shared = Arc::new(Shared {
            slot: FrameSlot::new(),
            history: Mutex::new(history),
            stop_requested: AtomicBool::new(false),
            status: AtomicU8::new(AcquisitionStatus::Running as u8),
            frames_captured: AtomicU64::new(0),
        });
        let description = device.describe();
        let acquisition = Acquisition {
            device,
            source_id: source_id.to_string(),
            shared: shared.clone(),
            exit: AcquisitionStatus::Failed,
        };
        // If the spawn fails the closure is dropped, and the guard inside it
        // still closes the device.
        let worker = std::thread::Builder::new()
            .name(format!("acquire:{}", source_id))
            .spawn(move || acquisition.run())
            .map_err(|e| CaptureError::DeviceOpen {
                source_id: source_id.to_string(),
                reason: format!("spawn acquisition thread: {}", e),
            })?;
        log::info!("FrameSource: started video capture from {}", description);

        Ok(Self {
            source_id: source_id.to_string(),
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Most recently captured frame, or `None` before the first successful read.
    /// Never blocks on the device.
    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.shared.slot.current()
    }

    /// Up to `capacity` most recent frames, oldest first.
    pub fn history(&self) -> Vec<Arc<Frame>> {
        self.shared
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Signal the acquisition thread to exit, wait for it, and release the device.
    ///
    /// Idempotent and callable from any thread. Blocks until the in-flight
    /// device read returns; a device stalled inside a read delays this call
    /// for as long as the read blocks. Concurrent callers all return only
    /// after the device has been released.
    pub fn stop(&self) -> Result<()> {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = worker.take() else {
            return Ok(());
        };
        if handle.join().is_err() {
            self.shared.set_status(AcquisitionStatus::Failed);
            return Err(anyhow!(
                "acquisition thread for {} panicked",
                self.source_id
            ));
        }
        log::info!("FrameSource: stopped video capture from {}", self.source_id);
        Ok(())
    }

    pub fn status(&self) -> AcquisitionStatus {
        self.shared.status()
    }

    pub fn is_running(&self) -> bool {
        self.status() == AcquisitionStatus::Running
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.shared.frames_captured.load(Ordering::SeqCst),
            source_id: self.source_id.clone(),
            history_len: self
                .shared
                .history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            status: self.status(),
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("FrameSource: {}", err);
        }
    }
}

/// Owns the device on the acquisition thread.
///
/// Dropping it closes the device and publishes the exit status, so this also
/// happens when a read panics or the thread never starts. `exit` stays
/// `Failed` unless the loop ends normally.
struct Acquisition {
    device: Box<dyn CaptureDevice>,
    source_id: String,
    shared: Arc<Shared>,
    exit: AcquisitionStatus,
}

impl Acquisition {
    fn run(mut self) {
        self.exit = loop {
            if self.shared.stop_requested.load(Ordering::SeqCst) {
                break AcquisitionStatus::Stopped;
            }
            match self.device.read_frame() {
                Ok(Some(frame)) => self.shared.publish(frame),
                Ok(None) => {
                    log::info!("FrameSource: end of stream from {}", self.source_id);
                    break AcquisitionStatus::EndOfStream;
                }
                Err(err) => {
                    log::warn!(
                        "FrameSource: failed to read frame from {}: {}",
                        self.source_id,
                        err
                    );
                    break AcquisitionStatus::Failed;
                }
            }
        };
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::error!("FrameSource: acquisition from {} panicked", self.source_id);
        }
        self.device.close();
        // Status is written after close so a non-Running status implies release.
        self.shared.set_status(self.exit);
    }
}
