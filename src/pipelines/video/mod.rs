// SPDX-License-Identifier: GPL-3.0-only

//! Video recording
//!
//! - [`controller`]: the Idle/Recording state machine driven by control commands
//! - [`recorder`]: sinks that persist frames, a GStreamer MJPEG AVI pipeline in production
//! - [`muxer`]: the `avimux` and `filesink` end of that pipeline
//! - [`paths`]: mapping folder/file requests onto the upload root

pub mod controller;
pub mod muxer;
pub mod paths;
pub mod recorder;

pub use controller::{
    Command, CommandOutcome, RecordingController, RecordingMode, RecordingStatus, WriteOutcome,
};
pub use recorder::{AviSinkFactory, RecordingSink, RecordingSummary, SinkFactory};
