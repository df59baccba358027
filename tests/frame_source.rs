use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use occupancy_witness::{
    AcquisitionStatus, CaptureDevice, CaptureError, CaptureOptions, ChannelSink, DebounceConfig,
    Detection, Frame, FrameSource, Pipeline, PixelFormat, PollOutcome, RunExit, ScriptedBackend,
    StubBackend, TargetCount,
};

/// Blocks in `read_frame` until the test hands it a frame.
struct GatedDevice {
    frames: Receiver<Option<Frame>>,
    closed: Arc<AtomicBool>,
}

impl CaptureDevice for GatedDevice {
    fn describe(&self) -> String {
        "gated".to_string()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.frames.recv() {
            Ok(frame) => Ok(frame),
            Err(_) => Err(CaptureError::DeviceRead {
                source_id: "gated".to_string(),
                reason: "gate dropped".to_string(),
            }),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn gated_source(capacity: usize) -> (FrameSource, Sender<Option<Frame>>, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::channel();
    let closed = Arc::new(AtomicBool::new(false));
    let device = GatedDevice {
        frames: rx,
        closed: closed.clone(),
    };
    let source = FrameSource::spawn(Box::new(device), "gated", capacity).expect("spawn source");
    (source, tx, closed)
}

fn rgb(fill: u8) -> Frame {
    Frame::new(vec![fill; 2 * 2 * 3], 2, 2, PixelFormat::Rgb24).unwrap()
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("condition not reached in time");
}

fn small_stub_options(frames: f64) -> CaptureOptions {
    CaptureOptions::new()
        .with("width", 8.0)
        .with("height", 6.0)
        .with("frames", frames)
}

#[test]
fn current_frame_is_none_before_first_read() {
    let (source, tx, closed) = gated_source(3);
    assert!(source.current_frame().is_none());
    assert!(source.history().is_empty());
    assert!(source.is_running());

    tx.send(Some(rgb(7))).unwrap();
    wait_until(|| source.current_frame().is_some());
    let frame = source.current_frame().unwrap();
    assert_eq!(frame.sequence(), 1);
    assert_eq!(frame.pixels(), &[7; 12][..]);

    tx.send(None).unwrap();
    wait_until(|| !source.is_running());
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn stop_during_blocked_read_waits_then_is_idempotent() {
    let (source, tx, closed) = gated_source(3);
    let source = Arc::new(source);

    let stopper = {
        let source = source.clone();
        std::thread::spawn(move || source.stop())
    };

    // The device is still inside read_frame, so stop cannot finish yet.
    std::thread::sleep(Duration::from_millis(50));
    assert!(!stopper.is_finished());
    assert!(!closed.load(Ordering::SeqCst));

    tx.send(Some(rgb(1))).unwrap();
    stopper.join().unwrap().expect("first stop");

    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(source.status(), AcquisitionStatus::Stopped);
    assert!(!source.is_running());

    source.stop().expect("second stop is a no-op");
    assert_eq!(source.status(), AcquisitionStatus::Stopped);
}

#[test]
fn history_keeps_most_recent_frames_in_order() {
    let source = FrameSource::start("stub://history", 3, &small_stub_options(5.0))
        .expect("start synthetic source");
    wait_until(|| !source.is_running());

    assert_eq!(source.status(), AcquisitionStatus::EndOfStream);
    let sequences: Vec<u64> = source.history().iter().map(|f| f.sequence()).collect();
    assert_eq!(sequences, vec![3, 4, 5]);
    assert_eq!(source.current_frame().unwrap().sequence(), 5);

    let stats = source.stats();
    assert_eq!(stats.frames_captured, 5);
    assert_eq!(stats.history_len, 3);
    assert_eq!(stats.source_id, "stub://history");
    source.stop().unwrap();
}

#[test]
fn unsupported_source_fails_before_acquisition() {
    let err = FrameSource::start("rtsp://camera", 4, &CaptureOptions::new())
        .err()
        .expect("rtsp is not a capture backend");
    assert!(matches!(err, CaptureError::DeviceOpen { .. }));
}

#[test]
fn zero_capacity_fails_before_opening_device() {
    let err = FrameSource::start("stub://zero", 0, &CaptureOptions::new())
        .err()
        .expect("capacity 0 must fail");
    assert!(matches!(err, CaptureError::Config(_)));
}

#[test]
fn readers_always_see_whole_frames() {
    let (source, tx, _closed) = gated_source(4);
    let source = Arc::new(source);
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let source = source.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut last_seen = 0u64;
                while !done.load(Ordering::SeqCst) {
                    if let Some(frame) = source.current_frame() {
                        let first = frame.pixels()[0];
                        assert!(frame.pixels().iter().all(|&b| b == first));
                        assert!(frame.sequence() >= last_seen);
                        last_seen = frame.sequence();
                    }
                    for frame in source.history() {
                        let first = frame.pixels()[0];
                        assert!(frame.pixels().iter().all(|&b| b == first));
                    }
                }
            })
        })
        .collect();

    for fill in 0..200u8 {
        tx.send(Some(rgb(fill))).unwrap();
    }
    tx.send(None).unwrap();
    wait_until(|| !source.is_running());
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().expect("reader saw a torn frame");
    }

    assert_eq!(source.current_frame().unwrap().pixels()[0], 199);
    let history = source.history();
    assert_eq!(history.len(), 4);
    assert!(history.windows(2).all(|w| w[0].sequence() < w[1].sequence()));
}

#[test]
fn pipeline_processes_each_frame_once() {
    let (source, tx, _closed) = gated_source(2);
    let (events_tx, events_rx) = mpsc::channel();
    let config = DebounceConfig {
        required_streak: 2,
        ..DebounceConfig::default()
    };
    let backend = ScriptedBackend::new(vec![vec![Detection::new("person", 0.9)]]);
    let mut pipeline = Pipeline::new(config, backend, ChannelSink::new(events_tx)).unwrap();

    assert_eq!(pipeline.poll(&source), PollOutcome::NoNewFrame);

    tx.send(Some(rgb(1))).unwrap();
    wait_until(|| source.current_frame().is_some());
    assert_eq!(pipeline.poll(&source), PollOutcome::Processed(None));
    assert_eq!(pipeline.poll(&source), PollOutcome::NoNewFrame);

    tx.send(Some(rgb(2))).unwrap();
    wait_until(|| source.current_frame().map(|f| f.sequence()) == Some(2));
    assert_eq!(
        pipeline.poll(&source),
        PollOutcome::Processed(Some(TargetCount::from_pairs(&[("person", 1), ("cat", 0)])))
    );

    tx.send(None).unwrap();
    wait_until(|| !source.is_running());
    assert_eq!(
        pipeline.poll(&source),
        PollOutcome::SourceEnded(AcquisitionStatus::EndOfStream)
    );
    assert_eq!(pipeline.frames_processed(), 2);
    assert_eq!(events_rx.try_iter().count(), 1);
}

#[test]
fn pipeline_run_ends_with_the_source() {
    let source = FrameSource::start("stub://run", 2, &small_stub_options(20.0)).unwrap();
    let (events_tx, _events_rx) = mpsc::channel();
    let mut pipeline = Pipeline::new(
        DebounceConfig::default(),
        StubBackend::new(),
        ChannelSink::new(events_tx),
    )
    .unwrap()
    .with_idle_interval(Duration::from_millis(1));

    let shutdown = AtomicBool::new(false);
    let summary = pipeline.run(&source, &shutdown);

    assert_eq!(
        summary.exit,
        RunExit::SourceEnded(AcquisitionStatus::EndOfStream)
    );
    assert!(summary.frames_processed >= 1);
    assert!(summary.frames_processed <= 20);
    assert_eq!(summary.events_emitted, 0);
    assert_eq!(pipeline.backend_mut().frames_seen(), summary.frames_processed);
}

#[test]
fn pipeline_run_honors_shutdown_flag() {
    let (source, gate, closed) = gated_source(2);
    let (events_tx, _events_rx) = mpsc::channel();
    let mut pipeline = Pipeline::new(
        DebounceConfig::default(),
        StubBackend::new(),
        ChannelSink::new(events_tx),
    )
    .unwrap();

    let shutdown = AtomicBool::new(true);
    let summary = pipeline.run(&source, &shutdown);
    assert_eq!(summary.exit, RunExit::Shutdown);
    assert_eq!(summary.frames_processed, 0);

    drop(gate);
    source.stop().unwrap();
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn dropping_source_mid_read_releases_device() {
    let (source, tx, closed) = gated_source(2);

    let dropper = std::thread::spawn(move || drop(source));

    // Drop waits for the in-flight read like an explicit stop.
    std::thread::sleep(Duration::from_millis(50));
    assert!(!dropper.is_finished());
    assert!(!closed.load(Ordering::SeqCst));

    tx.send(Some(rgb(3))).unwrap();
    dropper.join().expect("drop returns once the read completes");
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn source_leaving_scope_releases_device() {
    let closed = {
        let (source, tx, closed) = gated_source(2);
        tx.send(Some(rgb(4))).unwrap();
        wait_until(|| source.current_frame().is_some());
        // `tx` drops before `source`, which ends the pending read.
        closed
    };
    assert!(closed.load(Ordering::SeqCst));
}

struct PanickingDevice;

impl CaptureDevice for PanickingDevice {
    fn describe(&self) -> String {
        "panicking".to_string()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        panic!("driver bug");
    }
}

#[test]
fn pipeline_sees_failure_when_acquisition_panics() {
    let source = FrameSource::spawn(Box::new(PanickingDevice), "panicking", 2).unwrap();
    let (events_tx, _events_rx) = mpsc::channel();
    let mut pipeline = Pipeline::new(
        DebounceConfig::default(),
        StubBackend::new(),
        ChannelSink::new(events_tx),
    )
    .unwrap()
    .with_idle_interval(Duration::from_millis(1));

    let shutdown = AtomicBool::new(false);
    let summary = pipeline.run(&source, &shutdown);

    assert_eq!(summary.exit, RunExit::SourceEnded(AcquisitionStatus::Failed));
    assert!(!source.is_running());
    assert!(source.stop().is_err());
}
