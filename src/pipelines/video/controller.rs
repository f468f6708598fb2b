// SPDX-License-Identifier: GPL-3.0-only

//! Recording controller
//!
//! The single owner of the process-wide recording state. Two states:
//!
//! ```text
//!            START (sink opened)
//!   ┌──────┐ ─────────────────────▶ ┌───────────┐
//!   │ Idle │                        │ Recording │ ──┐ START: close, then open
//!   └──────┘ ◀───────────────────── └───────────┘ ◀─┘
//!       ▲      STOP / write failure
//!       └─ STOP (no-op)
//! ```
//!
//! The open sink lives inside the `Recording` variant, so "a sink exists"
//! and "state is Recording" cannot disagree. Two locks:
//!
//! - `state` guards the variant and every frame write. It is only ever held
//!   for one write or for swapping the variant.
//! - `transition` serialises START and STOP. Finalising the old file and
//!   opening the new one happen under it, outside `state`, so the pipeline
//!   keeps running while files are closed and opened. Frames arriving
//!   in between see `Idle` and are not recorded.
//!
//! Lock order is always `transition` then `state`.

use super::paths::resolve_target;
use super::recorder::{RecordingSink, RecordingSummary, SinkFactory};
use crate::backends::camera::types::{Frame, VideoFormat};
use crate::errors::RecordingError;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// How the output file is named
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingMode {
    /// Fixed default file name inside the folder
    Full,
    /// Caller-chosen file name (may include sub-directories)
    Segment { file: String },
}

/// A parsed control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { folder: String, mode: RecordingMode },
    Stop,
    Status,
}

/// Snapshot of the controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStatus {
    pub recording: bool,
    pub path: Option<PathBuf>,
    pub frames: u32,
}

/// Result of applying a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Started {
        path: PathBuf,
        /// The recording implicitly closed by this START, if any
        replaced: Option<RecordingSummary>,
    },
    /// `None` when STOP arrived while already idle
    Stopped(Option<RecordingSummary>),
    Status(RecordingStatus),
}

/// Result of offering a frame to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Not recording, frame ignored
    Idle,
    Written,
    /// The sink failed and was closed; the controller is idle again
    Failed,
}

enum RecordingState {
    Idle,
    Recording(Box<dyn RecordingSink>),
}

pub struct RecordingController {
    state: Mutex<RecordingState>,
    transition: Mutex<()>,
    upload_root: PathBuf,
    format: VideoFormat,
    factory: Box<dyn SinkFactory>,
}

impl RecordingController {
    /// Create an idle controller
    ///
    /// # Arguments
    /// * `upload_root` - Directory every recording path is resolved under
    /// * `format` - Fixed size and frame rate for every sink
    /// * `factory` - Opens the sinks
    pub fn new(upload_root: PathBuf, format: VideoFormat, factory: Box<dyn SinkFactory>) -> Self {
        Self {
            state: Mutex::new(RecordingState::Idle),
            transition: Mutex::new(()),
            upload_root,
            format,
            factory,
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    /// Dispatch one control command
    pub fn apply(&self, command: Command) -> Result<CommandOutcome, RecordingError> {
        match command {
            Command::Start { folder, mode } => self.start(&folder, &mode),
            Command::Stop => Ok(CommandOutcome::Stopped(self.stop()?)),
            Command::Status => Ok(CommandOutcome::Status(self.status())),
        }
    }

    /// Begin a new recording, closing any active one first
    ///
    /// An invalid target path is rejected before anything changes. If the
    /// new sink cannot be opened the controller is left idle. A previous
    /// recording that fails to finalize is logged and does not block the
    /// new one.
    pub fn start(&self, folder: &str, mode: &RecordingMode) -> Result<CommandOutcome, RecordingError> {
        let path = resolve_target(&self.upload_root, folder, mode)?;

        let _transition = self.transition.lock();
        let replaced = match self.take_sink() {
            None => None,
            Some(sink) => {
                info!(previous = %sink.path().display(), "START while recording, closing current file");
                close_sink(sink).ok()
            }
        };

        let sink = self.factory.open(&path, self.format).map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to open recording");
            e
        })?;

        info!(path = %path.display(), format = %self.format, "Recording started");
        *self.state.lock() = RecordingState::Recording(sink);

        Ok(CommandOutcome::Started { path, replaced })
    }

    /// Close the active recording
    ///
    /// # Returns
    /// * `Ok(Some(summary))` - The recording that was closed
    /// * `Ok(None)` - Already idle
    /// * `Err(RecordingError)` - The recording was closed but not finalized cleanly
    pub fn stop(&self) -> Result<Option<RecordingSummary>, RecordingError> {
        let _transition = self.transition.lock();
        match self.take_sink() {
            None => Ok(None),
            Some(sink) => close_sink(sink).map(Some),
        }
    }

    /// Append a frame to the active recording
    ///
    /// Called by the pipeline for every frame. A failed write closes the
    /// sink and returns the controller to idle.
    pub fn write(&self, frame: &Frame) -> WriteOutcome {
        let failed = {
            let mut state = self.state.lock();
            let RecordingState::Recording(sink) = &mut *state else {
                return WriteOutcome::Idle;
            };

            match sink.write_frame(frame) {
                Ok(()) => return WriteOutcome::Written,
                Err(e) => {
                    error!(error = %e, sequence = frame.sequence, "Recording write failed, stopping recording");
                    std::mem::replace(&mut *state, RecordingState::Idle)
                }
            }
        };

        if let RecordingState::Recording(sink) = failed {
            // Best effort so the frames already written stay playable
            let _ = close_sink(sink);
        }
        WriteOutcome::Failed
    }

    /// Swap the state to Idle and hand back the sink it held
    fn take_sink(&self) -> Option<Box<dyn RecordingSink>> {
        match std::mem::replace(&mut *self.state.lock(), RecordingState::Idle) {
            RecordingState::Idle => None,
            RecordingState::Recording(sink) => Some(sink),
        }
    }

    pub fn status(&self) -> RecordingStatus {
        match &*self.state.lock() {
            RecordingState::Idle => RecordingStatus {
                recording: false,
                path: None,
                frames: 0,
            },
            RecordingState::Recording(sink) => RecordingStatus {
                recording: true,
                path: Some(sink.path().to_path_buf()),
                frames: sink.frames_written(),
            },
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(&*self.state.lock(), RecordingState::Recording(_))
    }

    /// Finalise any active recording before the process exits
    pub fn shutdown(&self) {
        match self.stop() {
            Ok(Some(summary)) => info!(
                path = %summary.path.display(),
                frames = summary.frames,
                "Recording closed on shutdown"
            ),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Recording closed with errors on shutdown"),
        }
    }
}

fn close_sink(sink: Box<dyn RecordingSink>) -> Result<RecordingSummary, RecordingError> {
    let path = sink.path().to_path_buf();
    match sink.finish() {
        Ok(summary) => {
            info!(
                path = %summary.path.display(),
                frames = summary.frames,
                duration_ms = summary.duration.as_millis() as u64,
                "Recording stopped"
            );
            Ok(summary)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Recording closed with errors");
            Err(e)
        }
    }
}
