//! V4L2 capture device.
//!
//! Opens a local device node (e.g. `/dev/video0`), negotiates size, pixel
//! format and frame rate from the capture options, and streams frames through
//! memory-mapped buffers. Reads block until the driver hands over a buffer;
//! there is no read timeout.

use ouroboros::self_referencing;

use super::options::{CaptureOptions, OPTION_FPS, OPTION_HEIGHT, OPTION_WIDTH};
use super::CaptureDevice;
use crate::error::CaptureError;
use crate::frame::{Frame, PixelFormat};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Device {
    path: String,
    state: Option<V4l2State>,
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_count: u64,
}

impl V4l2Device {
    pub fn open(path: &str, options: &CaptureOptions) -> Result<Self, CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        options.warn_unsupported("V4l2Device", &[OPTION_FPS, OPTION_WIDTH, OPTION_HEIGHT]);
        let open_error = |reason: String| CaptureError::DeviceOpen {
            source_id: path.to_string(),
            reason,
        };

        let mut device = v4l::Device::with_path(path).map_err(|e| open_error(e.to_string()))?;
        let mut format = device
            .format()
            .map_err(|e| open_error(format!("read format: {}", e)))?;
        format.width = options.width()?.unwrap_or(DEFAULT_WIDTH);
        format.height = options.height()?.unwrap_or(DEFAULT_HEIGHT);
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Device: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .map_err(|e| open_error(format!("read format after set failure: {}", e)))?
            }
        };
        let pixel_format = pixel_format_for(&format.fourcc.repr).ok_or_else(|| {
            open_error(format!("unsupported pixel format {}", format.fourcc))
        })?;

        if let Some(fps) = options.fps()? {
            let params = v4l::video::capture::Parameters::with_fps(fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Device: failed to set fps on {}: {}", path, err);
            }
        }

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            },
        }
        .try_build()
        .map_err(|e| open_error(format!("create buffer stream: {}", e)))?;

        log::info!(
            "V4l2Device: opened {} ({}x{} {:?})",
            path,
            format.width,
            format.height,
            pixel_format
        );
        Ok(Self {
            path: path.to_string(),
            state: Some(state),
            width: format.width,
            height: format.height,
            format: pixel_format,
            frame_count: 0,
        })
    }
}

impl CaptureDevice for V4l2Device {
    fn describe(&self) -> String {
        format!("{} (v4l2 {}x{})", self.path, self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let read_error = |reason: String| CaptureError::DeviceRead {
            source_id: self.path.clone(),
            reason,
        };
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| read_error("device is closed".to_string()))?;
        let bytes = state
            .with_mut(|fields| {
                fields.stream.next().map(|(buf, meta)| {
                    let used = (meta.bytesused as usize).min(buf.len());
                    buf[..used].to_vec()
                })
            })
            .map_err(|e| read_error(e.to_string()))?;

        self.frame_count += 1;
        Frame::new(bytes, self.width, self.height, self.format).map(Some)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Device: closed {} after {} frames",
                self.path,
                self.frame_count
            );
        }
    }
}

fn pixel_format_for(fourcc: &[u8; 4]) -> Option<PixelFormat> {
    match fourcc {
        b"RGB3" => Some(PixelFormat::Rgb24),
        b"BGR3" => Some(PixelFormat::Bgr24),
        b"GREY" => Some(PixelFormat::Gray8),
        b"YUYV" => Some(PixelFormat::Yuyv),
        b"MJPG" => Some(PixelFormat::Mjpeg),
        _ => None,
    }
}
