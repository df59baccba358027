//! Synthetic capture device for `stub://` sources.
//!
//! Produces a deterministic RGB test pattern whose content drifts every frame
//! and shifts "scene" every 50 frames. Honors the `fps`, `width`, `height` and
//! `frames` capture options, so tests can drive the acquisition thread
//! without hardware and observe end-of-stream.

use std::time::{Duration, Instant};

use super::options::{CaptureOptions, OPTION_FPS, OPTION_FRAMES, OPTION_HEIGHT, OPTION_WIDTH};
use super::CaptureDevice;
use crate::error::CaptureError;
use crate::frame::{Frame, PixelFormat};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const SCENE_PERIOD_FRAMES: u64 = 50;

pub struct SyntheticDevice {
    source_id: String,
    width: u32,
    height: u32,
    frame_interval: Option<Duration>,
    frame_limit: Option<u64>,
    frame_count: u64,
    scene_state: u8,
    last_frame_at: Option<Instant>,
    closed: bool,
}

impl SyntheticDevice {
    pub fn open(source_id: &str, options: &CaptureOptions) -> Result<Self, CaptureError> {
        options.warn_unsupported(
            "SyntheticDevice",
            &[OPTION_FPS, OPTION_WIDTH, OPTION_HEIGHT, OPTION_FRAMES],
        );
        let frame_interval = options
            .fps()?
            .map(|fps| Duration::from_secs_f64(1.0 / fps as f64));
        let device = Self {
            source_id: source_id.to_string(),
            width: options.width()?.unwrap_or(DEFAULT_WIDTH),
            height: options.height()?.unwrap_or(DEFAULT_HEIGHT),
            frame_interval,
            frame_limit: options.frames()?,
            frame_count: 0,
            scene_state: 0,
            last_frame_at: None,
            closed: false,
        };
        log::info!(
            "SyntheticDevice: opened {} ({}x{})",
            device.source_id,
            device.width,
            device.height
        );
        Ok(device)
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        if self.frame_count % SCENE_PERIOD_FRAMES == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let offset = self.frame_count + self.scene_state as u64;
        (0..pixel_count)
            .map(|i| ((i as u64 + offset) % 256) as u8)
            .collect()
    }
}

impl CaptureDevice for SyntheticDevice {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.source_id)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.closed {
            return Err(CaptureError::DeviceRead {
                source_id: self.source_id.clone(),
                reason: "device is closed".to_string(),
            });
        }
        if self.frame_limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        self.pace();
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::new(pixels, self.width, self.height, PixelFormat::Rgb24).map(Some)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::info!(
                "SyntheticDevice: closed {} after {} frames",
                self.source_id,
                self.frame_count
            );
        }
    }
}
