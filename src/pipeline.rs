//! Consumer loop: frame source -> detector -> debounce -> sink.
//!
//! The pipeline is the single writer of the debounce state. Other threads
//! that need the last-known counts read them through `LatestCounts`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::debounce::{DebounceConfig, DebounceDetector, TargetCount};
use crate::detect::DetectorBackend;
use crate::error::ConfigError;
use crate::frame::Frame;
use crate::ingest::{AcquisitionStatus, FrameSource};
use crate::sink::EventSink;

const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(5);

/// Shared read handle for the last emitted counts.
#[derive(Clone, Debug)]
pub struct LatestCounts {
    inner: Arc<RwLock<TargetCount>>,
}

impl LatestCounts {
    fn new(initial: TargetCount) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> TargetCount {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, counts: TargetCount) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = counts;
    }
}

/// Result of one `Pipeline::poll`.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// A new frame went through detection; carries the emitted counts, if any.
    Processed(Option<TargetCount>),
    /// The current frame was already processed (or none captured yet).
    NoNewFrame,
    /// Acquisition has ended and every captured frame was processed.
    SourceEnded(AcquisitionStatus),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunExit {
    Shutdown,
    SourceEnded(AcquisitionStatus),
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub events_emitted: u64,
    pub exit: RunExit,
}

pub struct Pipeline<B: DetectorBackend, S: EventSink> {
    debounce: DebounceDetector,
    backend: B,
    sink: S,
    latest: LatestCounts,
    last_sequence: u64,
    frames_processed: u64,
    events_emitted: u64,
    idle_interval: Duration,
}

impl<B: DetectorBackend, S: EventSink> Pipeline<B, S> {
    pub fn new(config: DebounceConfig, backend: B, sink: S) -> Result<Self, ConfigError> {
        let debounce = DebounceDetector::new(config)?;
        let latest = LatestCounts::new(debounce.last_emitted().clone());
        Ok(Self {
            debounce,
            backend,
            sink,
            latest,
            last_sequence: 0,
            frames_processed: 0,
            events_emitted: 0,
            idle_interval: DEFAULT_IDLE_INTERVAL,
        })
    }

    /// Sleep between polls when no new frame is available.
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Run one frame through detection and debounce, emitting on change.
    ///
    /// Detector errors are logged and the frame is treated as having no
    /// detections.
    pub fn process_frame(&mut self, frame: &Frame) -> Option<TargetCount> {
        let detections = match self.backend.detect(frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!(
                    "pipeline: detector {} failed on frame {}: {:#}",
                    self.backend.name(),
                    frame.sequence(),
                    err
                );
                Vec::new()
            }
        };
        self.frames_processed += 1;

        let emitted = self.debounce.update(&detections)?;
        self.events_emitted += 1;
        self.latest.set(emitted.clone());
        if let Err(err) = self.sink.emit(&emitted) {
            log::warn!(
                "pipeline: error sending counts to {} sink: {:#}",
                self.sink.name(),
                err
            );
        }
        Some(emitted)
    }

    /// Process the source's current frame if it has not been processed yet.
    pub fn poll(&mut self, source: &FrameSource) -> PollOutcome {
        // Read status first: once acquisition has exited, the frame read
        // below is the final one.
        let status = source.status();
        match source.current_frame() {
            Some(frame) if frame.sequence() > self.last_sequence => {
                self.last_sequence = frame.sequence();
                PollOutcome::Processed(self.process_frame(&frame))
            }
            _ if status != AcquisitionStatus::Running => PollOutcome::SourceEnded(status),
            _ => PollOutcome::NoNewFrame,
        }
    }

    /// Poll until `shutdown` is set or acquisition ends.
    pub fn run(&mut self, source: &FrameSource, shutdown: &AtomicBool) -> RunSummary {
        self.run_with(source, shutdown, |_, _| {})
    }

    /// Like `run`, calling `after_poll` once per iteration (health logging,
    /// threshold changes).
    pub fn run_with<F>(
        &mut self,
        source: &FrameSource,
        shutdown: &AtomicBool,
        mut after_poll: F,
    ) -> RunSummary
    where
        F: FnMut(&mut Self, &FrameSource),
    {
        let exit = loop {
            if shutdown.load(Ordering::SeqCst) {
                break RunExit::Shutdown;
            }
            match self.poll(source) {
                PollOutcome::Processed(_) => {}
                PollOutcome::NoNewFrame => std::thread::sleep(self.idle_interval),
                PollOutcome::SourceEnded(status) => break RunExit::SourceEnded(status),
            }
            after_poll(self, source);
        };
        RunSummary {
            frames_processed: self.frames_processed,
            events_emitted: self.events_emitted,
            exit,
        }
    }

    pub fn latest_counts(&self) -> LatestCounts {
        self.latest.clone()
    }

    pub fn debounce(&self) -> &DebounceDetector {
        &self.debounce
    }

    /// Mutable access for threshold changes between frames.
    pub fn debounce_mut(&mut self) -> &mut DebounceDetector {
        &mut self.debounce
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn events_emitted(&self) -> u64 {
        self.events_emitted
    }
}
