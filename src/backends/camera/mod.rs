// SPDX-License-Identifier: GPL-3.0-only

//! Frame source abstraction
//!
//! The pipeline pulls frames through the [`FrameSource`] trait and never
//! touches device details.
//!
//! ```text
//! ┌──────────────────────┐
//! │   Pipeline driver    │
//! └──────────┬───────────┘
//!            │ next_frame()
//!            ▼
//! ┌──────────────────────┐
//! │  FrameSource trait   │
//! └──────────┬───────────┘
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌─────────┐  ┌────────┐
//! │ Pattern │  │  V4L2  │  (feature "v4l2")
//! └─────────┘  └────────┘
//! ```

pub mod format_converters;
pub mod test_pattern;
pub mod types;
#[cfg(all(feature = "v4l2", target_os = "linux"))]
pub mod v4l2;

pub use test_pattern::TestPatternSource;
pub use types::*;

use crate::config::SourceKind;
use crate::errors::CaptureError;

/// A blocking pull API for raw frames
pub trait FrameSource: Send {
    /// Fixed format of every frame this source yields
    fn format(&self) -> VideoFormat;

    /// Wait for the next frame
    ///
    /// Blocks for at most about one frame interval.
    ///
    /// # Returns
    /// * `Ok(Some(frame))` - A new frame
    /// * `Ok(None)` - No frame this tick; callers skip and retry
    /// * `Err(CaptureError)` - The source is unusable
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Human readable name for logging
    fn name(&self) -> String;
}

/// Open the configured frame source
pub fn open_source(
    kind: &SourceKind,
    format: VideoFormat,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    match kind {
        SourceKind::TestPattern => Ok(Box::new(TestPatternSource::new(format))),
        SourceKind::V4l2 { device } => open_v4l2(device, format),
    }
}

#[cfg(all(feature = "v4l2", target_os = "linux"))]
fn open_v4l2(device: &str, format: VideoFormat) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(v4l2::V4l2Source::open(device, format)?))
}

#[cfg(not(all(feature = "v4l2", target_os = "linux")))]
fn open_v4l2(device: &str, _format: VideoFormat) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::NotAvailable(format!(
        "V4L2 device {} requested but the \"v4l2\" feature is disabled",
        device
    )))
}

/// Describe the sources this build can open
pub fn available_sources() -> Vec<String> {
    #[allow(unused_mut)]
    let mut sources = vec!["test (synthetic colour bars)".to_string()];

    #[cfg(all(feature = "v4l2", target_os = "linux"))]
    sources.extend(v4l2::enumerate_devices());

    sources
}
