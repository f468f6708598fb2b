// SPDX-License-Identifier: GPL-3.0-only
// Shared types for frame sources

//! Shared types for frame sources

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frame pixel storage
///
/// Reference counted so the recording and broadcast paths can both read a
/// frame without copying it.
#[derive(Clone)]
pub struct FrameData(Arc<[u8]>);

impl FrameData {
    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData(Arc::from(data))
    }
}

impl From<Arc<[u8]>> for FrameData {
    fn from(data: Arc<[u8]>) -> Self {
        FrameData(data)
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameData({} bytes)", self.0.len())
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Pixel layout of a raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGB24 - 3 bytes per pixel, R G B order
    Rgb24,
    /// BGR24 - 3 bytes per pixel, B G R order (RealSense `bgr8`, OpenCV)
    Bgr24,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    Yuyv,
}

impl PixelFormat {
    /// Bytes per pixel (YUYV averages two)
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Yuyv => 2,
        }
    }

    /// Expected buffer size for a tightly packed frame
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// Fixed capture/recording format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, framerate: u32) -> Self {
        Self {
            width,
            height,
            framerate: framerate.max(1),
        }
    }

    /// Native interval between two frames
    pub fn frame_interval(&self) -> Duration {
        crate::constants::frame_interval(self.framerate)
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ {}fps", self.width, self.height, self.framerate)
    }
}

/// One captured frame
///
/// Produced once per capture tick and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: FrameData,
    /// Monotonic sequence number assigned by the source
    pub sequence: u64,
    /// Timestamp when the frame was captured
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap a packed pixel buffer captured now
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            format,
            data: FrameData::from(data),
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Check that the buffer matches the declared geometry
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.format.frame_size(self.width, self.height)
    }
}
