// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline driver
//!
//! The single loop that moves frames through the relay:
//!
//! ```text
//! FrameSource ──▶ RecordingController::write (raw frame)
//!      │
//!      └──▶ encode ──▶ BroadcastHub::publish   (only with viewers)
//! ```
//!
//! The source pull blocks for up to one frame interval, so the loop runs on
//! its own OS thread. A source error ends the loop and is reported to
//! whoever holds the [`PipelineHandle`].

use crate::backends::camera::FrameSource;
use crate::constants::timing;
use crate::errors::CaptureError;
use crate::media::encoders::FrameEncoder;
use crate::pipelines::video::{RecordingController, WriteOutcome};
use crate::server::hub::BroadcastHub;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Counters for one driver run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Frames pulled from the source
    pub frames: u64,
    /// Pulls that produced no frame
    pub skipped: u64,
    /// Frames handed to the recording sink
    pub recorded: u64,
    /// Frames encoded and published to at least the hub
    pub published: u64,
    pub encode_errors: u64,
    /// Viewer deliveries dropped for backpressure
    pub viewer_drops: u64,
}

/// What one [`PipelineDriver::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The source had no frame this tick
    Skipped,
    Processed {
        recorded: bool,
        /// Viewers the frame reached, zero when nobody was watching
        delivered: usize,
    },
}

pub struct PipelineDriver {
    source: Box<dyn FrameSource>,
    controller: Arc<RecordingController>,
    hub: Arc<BroadcastHub>,
    encoder: Box<dyn FrameEncoder>,
    stats: DriverStats,
}

impl PipelineDriver {
    pub fn new(
        source: Box<dyn FrameSource>,
        controller: Arc<RecordingController>,
        hub: Arc<BroadcastHub>,
        encoder: Box<dyn FrameEncoder>,
    ) -> Self {
        Self {
            source,
            controller,
            hub,
            encoder,
            stats: DriverStats::default(),
        }
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Pull one frame and route it
    ///
    /// # Returns
    /// * `Ok(StepOutcome)` - What happened to the frame
    /// * `Err(CaptureError)` - The source failed; the pipeline must end
    pub fn step(&mut self) -> Result<StepOutcome, CaptureError> {
        let Some(frame) = self.source.next_frame()? else {
            self.stats.skipped += 1;
            return Ok(StepOutcome::Skipped);
        };
        self.stats.frames += 1;

        let recorded = match self.controller.write(&frame) {
            WriteOutcome::Written => {
                self.stats.recorded += 1;
                true
            }
            WriteOutcome::Idle | WriteOutcome::Failed => false,
        };

        // Encoding is only paid for when someone is watching
        let mut delivered = 0;
        if !self.hub.is_empty() {
            match self.encoder.encode(&frame) {
                Ok(bytes) => {
                    let report = self.hub.publish(bytes);
                    self.stats.published += 1;
                    self.stats.viewer_drops += report.dropped as u64;
                    delivered = report.delivered;
                }
                Err(e) => {
                    self.stats.encode_errors += 1;
                    warn!(sequence = frame.sequence, error = %e, "Failed to encode live frame");
                }
            }
        }

        if self.stats.frames % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frames = self.stats.frames,
                skipped = self.stats.skipped,
                published = self.stats.published,
                viewer_drops = self.stats.viewer_drops,
                viewers = self.hub.viewer_count(),
                recording = self.controller.is_recording(),
                "Pipeline progress"
            );
        } else {
            trace!(sequence = frame.sequence, recorded, delivered, "Frame processed");
        }

        Ok(StepOutcome::Processed { recorded, delivered })
    }

    /// Loop until `stop` is set or the source fails
    pub fn run(&mut self, stop: &AtomicBool) -> Result<DriverStats, CaptureError> {
        info!(source = %self.source.name(), "Pipeline started");

        while !stop.load(Ordering::SeqCst) {
            if let Err(e) = self.step() {
                error!(error = %e, "Frame source failed, pipeline stopping");
                return Err(e);
            }
            // Let command handlers and the accept loop get the controller lock
            thread::sleep(timing::PIPELINE_YIELD);
        }

        info!(frames = self.stats.frames, "Pipeline stopped");
        Ok(self.stats)
    }
}

/// A driver running on its own thread
pub struct PipelineHandle {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
}

impl PipelineHandle {
    /// Start `driver` on a dedicated thread
    ///
    /// # Returns
    /// The handle plus a receiver that resolves when the loop ends, with the
    /// source error if that is why it ended
    pub fn spawn(
        mut driver: PipelineDriver,
    ) -> std::io::Result<(Self, oneshot::Receiver<Result<DriverStats, CaptureError>>)> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let (exit_tx, exit_rx) = oneshot::channel();

        let thread_handle = thread::Builder::new()
            .name("camera-pipeline".into())
            .spawn(move || {
                let result = driver.run(&stop);
                // Receiver may be gone during shutdown
                let _ = exit_tx.send(result);
            })?;

        Ok((
            Self {
                thread_handle: Some(thread_handle),
                stop_signal,
            },
            exit_rx,
        ))
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Ask the loop to stop after the current frame
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Pipeline thread panicked");
            }
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}
