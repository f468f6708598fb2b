// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! These are the defaults behind [`crate::config::Config`]. Anything an
//! operator may want to change goes through the config; the rest stays here.

use std::time::Duration;

/// Network listener defaults
pub mod network {
    /// Default WebSocket listen port
    pub const DEFAULT_PORT: u16 = 8080;

    /// Default bind address (viewers are expected on the same host)
    pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
}

/// Capture format defaults
pub mod capture {
    /// Frame width in pixels
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Frame height in pixels
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Frames per second delivered by the source
    pub const DEFAULT_FRAMERATE: u32 = 60;
}

/// Recording output defaults
pub mod recording {
    /// Root directory under which every recording folder is created
    pub const DEFAULT_UPLOAD_ROOT: &str = "video_uploads";

    /// File name used when a recording is started in full-session mode
    pub const FULL_MODE_FILE_NAME: &str = "recording_realsense.avi";

    /// JPEG quality for frames stored in the AVI container
    pub const DEFAULT_RECORDING_QUALITY: u8 = 90;

    /// GStreamer elements the recording pipeline is built from
    pub const PIPELINE_ELEMENTS: [&str; 5] = ["appsrc", "videoconvert", "jpegenc", "avimux", "filesink"];
}

/// Live feed defaults
pub mod feed {
    /// JPEG quality for frames pushed to viewers
    pub const DEFAULT_JPEG_QUALITY: u8 = 80;

    /// Frames buffered per viewer before new frames are dropped for it
    ///
    /// Kept tiny so a stalled viewer never sees a backlog of stale frames.
    pub const DEFAULT_VIEWER_BUFFER: usize = 2;

    /// Control replies buffered per connection
    pub const REPLY_BUFFER: usize = 16;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Pause between pipeline iterations so other threads get the lock
    pub const PIPELINE_YIELD: Duration = Duration::from_millis(1);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 300;

    /// Backoff after a V4L2 dequeue error before retrying
    pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(10);

    /// Backoff after a failed accept (e.g. out of file descriptors)
    pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

    /// How long open sessions get to close after shutdown is signalled
    pub const SESSION_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

    /// How long a recording may take to drain and write its index on close
    pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Frame interval for a given framerate
pub fn frame_interval(framerate: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / framerate.max(1) as u64)
}
