// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture
//!
//! Uses the v4l crate to pull YUYV or RGB3 buffers straight from a
//! `/dev/video*` node. Each dequeued buffer is copied into a [`Frame`] so
//! the mmap buffer can be requeued immediately.

use super::types::{Frame, PixelFormat, VideoFormat};
use super::FrameSource;
use crate::constants::timing;
use crate::errors::CaptureError;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

pub struct V4l2Source {
    device_path: String,
    format: VideoFormat,
    pixel_format: PixelFormat,
    stream: MmapStream<'static>,
    // Kept alive for the stream's file handle
    _device: Device,
}

impl V4l2Source {
    /// Open a device and negotiate the requested format
    pub fn open(device_path: &str, format: VideoFormat) -> Result<Self, CaptureError> {
        let open_failed = |reason: String| CaptureError::OpenFailed {
            device: device_path.to_string(),
            reason,
        };

        let device = Device::with_path(device_path).map_err(|e| open_failed(e.to_string()))?;

        let mut requested = device.format().map_err(|e| open_failed(e.to_string()))?;
        requested.width = format.width;
        requested.height = format.height;
        requested.fourcc = FourCC::new(b"YUYV");

        let negotiated = device
            .set_format(&requested)
            .map_err(|e| open_failed(e.to_string()))?;

        let pixel_format = match &negotiated.fourcc.repr {
            b"YUYV" => PixelFormat::Yuyv,
            b"RGB3" => PixelFormat::Rgb24,
            b"BGR3" => PixelFormat::Bgr24,
            other => {
                return Err(CaptureError::UnsupportedFormat(format!(
                    "device {} offers {}",
                    device_path,
                    String::from_utf8_lossy(other)
                )));
            }
        };

        if negotiated.width != format.width || negotiated.height != format.height {
            return Err(CaptureError::UnsupportedFormat(format!(
                "device {} cannot capture {}x{} (offers {}x{})",
                device_path, format.width, format.height, negotiated.width, negotiated.height
            )));
        }

        if let Err(e) = device.set_params(&v4l::video::capture::Parameters::with_fps(
            format.framerate,
        )) {
            warn!(device = device_path, error = %e, "Could not set framerate, using device default");
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, 4)
            .map_err(|e| open_failed(format!("failed to create buffer stream: {}", e)))?;

        info!(
            device = device_path,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = %negotiated.fourcc,
            "V4L2 capture stream started"
        );

        Ok(Self {
            device_path: device_path.to_string(),
            format,
            pixel_format,
            stream,
            _device: device,
        })
    }
}

impl FrameSource for V4l2Source {
    fn format(&self) -> VideoFormat {
        self.format
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.stream.next() {
            Ok((buf, meta)) => {
                let expected = self.pixel_format.frame_size(self.format.width, self.format.height);
                if buf.len() < expected {
                    debug!(got = buf.len(), expected, "Short V4L2 buffer, skipping");
                    return Ok(None);
                }
                Ok(Some(Frame::new(
                    self.format.width,
                    self.format.height,
                    self.pixel_format,
                    buf[..expected].to_vec(),
                    meta.sequence as u64,
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock
                || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                std::thread::sleep(timing::CAPTURE_RETRY_DELAY);
                Ok(None)
            }
            Err(e) => Err(CaptureError::DeviceFailed(format!(
                "{}: {}",
                self.device_path, e
            ))),
        }
    }

    fn name(&self) -> String {
        format!("V4L2 {} {}", self.device_path, self.format)
    }
}

/// List V4L2 capture nodes as `path (name)`
pub fn enumerate_devices() -> Vec<String> {
    v4l::context::enum_devices()
        .into_iter()
        .map(|node| {
            let name = node.name().unwrap_or_else(|| "unknown".to_string());
            format!("{} ({})", node.path().display(), name)
        })
        .collect()
}
