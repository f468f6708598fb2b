// SPDX-License-Identifier: GPL-3.0-only

//! Camera Relay - live camera frames to WebSocket viewers, MJPEG recording on command
//!
//! One frame source feeds any number of WebSocket viewers. Any connection
//! can also start and stop a recording of the same stream to disk.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources (V4L2, synthetic test pattern)
//! - [`media`]: JPEG encoding and the MJPEG AVI container
//! - [`pipelines`]: The frame loop and the recording controller
//! - [`server`]: Broadcast hub, control protocol and connection sessions
//! - [`config`]: Relay configuration
//!
//! # Example
//!
//! ```ignore
//! // Serve the test pattern on 127.0.0.1:8080:
//! // camera-relay serve --source test
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod server;

// Re-export commonly used types
pub use backends::camera::{Frame, FrameSource, PixelFormat, VideoFormat};
pub use config::{Config, SourceKind};
pub use errors::{AppError, AppResult};
pub use pipelines::video::{Command, RecordingController, RecordingMode};
pub use pipelines::{PipelineDriver, PipelineHandle};
pub use server::{BroadcastHub, RelayServer};
