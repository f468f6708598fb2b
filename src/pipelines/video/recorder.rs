// SPDX-License-Identifier: GPL-3.0-only

//! Recording sinks
//!
//! A sink owns one open output file for the length of a recording. It is
//! created on START and consumed by [`RecordingSink::finish`]; a finished
//! sink cannot be written again because `finish` takes it by value.

use super::muxer::{self, MuxerConfig};
use crate::backends::camera::format_converters::frame_to_rgb;
use crate::backends::camera::types::{Frame, VideoFormat};
use crate::constants::timing;
use crate::errors::RecordingError;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use gstreamer_video as gst_video;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What a closed recording produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub frames: u32,
    pub duration: Duration,
}

/// An open, file-backed frame destination
pub trait RecordingSink: Send {
    /// Append one raw frame
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError>;

    /// Close the file and report what was written
    fn finish(self: Box<Self>) -> Result<RecordingSummary, RecordingError>;

    fn path(&self) -> &Path;

    fn frames_written(&self) -> u32;
}

/// Opens sinks for the recording controller
pub trait SinkFactory: Send + Sync {
    /// Open a new sink at `path`, truncating anything already there
    fn open(&self, path: &Path, format: VideoFormat)
    -> Result<Box<dyn RecordingSink>, RecordingError>;
}

/// Motion-JPEG AVI sink
///
/// Pipeline: `appsrc ! videoconvert ! jpegenc ! avimux ! filesink`.
/// Frames are pushed as RGB with timestamps derived from the frame count,
/// so playback runs at the configured rate regardless of capture jitter.
/// Dropping an unfinished sink drains and closes it.
pub struct AviSink {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    path: PathBuf,
    format: VideoFormat,
    frames: u32,
    started: Instant,
    finished: bool,
}

impl AviSink {
    fn create(path: &Path, format: VideoFormat, quality: u8) -> Result<Self, RecordingError> {
        let open_failed = |reason: String| RecordingError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let pipeline = gst::Pipeline::new();

        let appsrc = gst::ElementFactory::make("appsrc")
            .name("recording_src")
            .build()
            .map_err(|e| open_failed(format!("Failed to create appsrc: {}", e)))?
            .downcast::<AppSrc>()
            .map_err(|_| open_failed("Failed to downcast to AppSrc".into()))?;

        let caps = gst_video::VideoInfo::builder(
            gst_video::VideoFormat::Rgb,
            format.width,
            format.height,
        )
        .fps(gst::Fraction::new(format.framerate as i32, 1))
        .build()
        .and_then(|info| info.to_caps())
        .map_err(|e| open_failed(format!("Invalid video caps: {}", e)))?;

        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(false);

        let convert = gst::ElementFactory::make("videoconvert")
            .name("recording_convert")
            .build()
            .map_err(|e| open_failed(format!("Failed to create videoconvert: {}", e)))?;

        let encoder = gst::ElementFactory::make("jpegenc")
            .name("recording_jpegenc")
            .property("quality", quality.clamp(1, 100) as i32)
            .build()
            .map_err(|e| open_failed(format!("Failed to create jpegenc: {}", e)))?;

        let mux: MuxerConfig = muxer::create_muxer(path)?;

        pipeline
            .add_many([appsrc.upcast_ref(), &convert, &encoder, &mux.muxer, &mux.filesink])
            .map_err(|e| open_failed(format!("Failed to add elements: {}", e)))?;

        gst::Element::link_many([appsrc.upcast_ref(), &convert, &encoder])
            .map_err(|e| open_failed(format!("Failed to link elements: {}", e)))?;
        muxer::link_video_to_muxer(&encoder, &mux)?;
        muxer::link_muxer_to_sink(&mux)?;

        // The file sink opens (and truncates) the file during this transition
        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let reason = pop_error(&pipeline).unwrap_or_else(|| e.to_string());
            let _ = pipeline.set_state(gst::State::Null);
            return Err(open_failed(reason));
        }
        if let Some(reason) = pop_error(&pipeline) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(open_failed(reason));
        }

        Ok(Self {
            pipeline,
            appsrc,
            path: path.to_path_buf(),
            format,
            frames: 0,
            started: Instant::now(),
            finished: false,
        })
    }

    fn write_error(&self, reason: String) -> RecordingError {
        RecordingError::Write {
            path: self.path.clone(),
            reason,
        }
    }

    fn finish_error(&self, reason: String) -> RecordingError {
        RecordingError::Finish {
            path: self.path.clone(),
            reason,
        }
    }

    /// Send end-of-stream, wait for the muxer to write its index, stop
    fn finalize(&mut self) -> Result<(), RecordingError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let drained = self.drain();
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            error!(?e, path = %self.path.display(), "Failed to set recording pipeline to Null");
        }
        drained
    }

    fn drain(&self) -> Result<(), RecordingError> {
        self.appsrc
            .end_of_stream()
            .map_err(|e| self.finish_error(format!("End of stream rejected: {:?}", e)))?;

        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| self.finish_error("No bus available".into()))?;
        let timeout = gst::ClockTime::from_mseconds(timing::FINALIZE_TIMEOUT.as_millis() as u64);

        match bus.timed_pop_filtered(timeout, &[gst::MessageType::Eos, gst::MessageType::Error]) {
            Some(msg) => match msg.view() {
                gst::MessageView::Error(err) => Err(self.finish_error(err.error().to_string())),
                _ => {
                    debug!(path = %self.path.display(), frames = self.frames, "Recording pipeline drained");
                    Ok(())
                }
            },
            None => Err(self.finish_error("Timed out waiting for end of stream".into())),
        }
    }
}

impl RecordingSink for AviSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        if self.finished {
            return Err(self.write_error("recording already finished".into()));
        }
        if frame.width != self.format.width || frame.height != self.format.height {
            return Err(self.write_error(format!(
                "frame is {}x{}, recording is {}x{}",
                frame.width, frame.height, self.format.width, self.format.height
            )));
        }
        if !frame.is_well_formed() {
            return Err(self.write_error(format!(
                "frame buffer is {} bytes, expected {}",
                frame.data.len(),
                frame.format.frame_size(frame.width, frame.height)
            )));
        }
        if let Some(reason) = pop_error(&self.pipeline) {
            return Err(self.write_error(reason));
        }

        let interval = self.format.frame_interval();
        let pts = interval * self.frames;

        let mut buffer = gst::Buffer::from_mut_slice(frame_to_rgb(frame).into_owned());
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| self.write_error("Failed to get mutable buffer reference".into()))?;
            buffer.set_pts(gst::ClockTime::from_nseconds(pts.as_nanos() as u64));
            buffer.set_duration(gst::ClockTime::from_nseconds(interval.as_nanos() as u64));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| self.write_error(format!("Failed to push frame: {:?}", e)))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<RecordingSummary, RecordingError> {
        self.finalize()?;
        Ok(RecordingSummary {
            path: self.path.clone(),
            frames: self.frames,
            duration: self.started.elapsed(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn frames_written(&self) -> u32 {
        self.frames
    }
}

impl Drop for AviSink {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            warn!(error = %e, "Failed to finalize recording on drop");
        }
    }
}

/// Take the first pending error off the pipeline bus, if any
fn pop_error(pipeline: &gst::Pipeline) -> Option<String> {
    let msg = pipeline.bus()?.pop_filtered(&[gst::MessageType::Error])?;
    match msg.view() {
        gst::MessageView::Error(err) => {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                source = ?err.src().map(|s| s.name()),
                "GStreamer error in recording pipeline"
            );
            Some(err.error().to_string())
        }
        _ => None,
    }
}

/// Production factory writing MJPEG AVI files through GStreamer
#[derive(Debug, Clone, Copy)]
pub struct AviSinkFactory {
    quality: u8,
}

impl AviSinkFactory {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    /// Whether GStreamer and every element the sink needs are installed
    pub fn is_available() -> bool {
        muxer::recording_elements_available()
    }
}

impl SinkFactory for AviSinkFactory {
    fn open(
        &self,
        path: &Path,
        format: VideoFormat,
    ) -> Result<Box<dyn RecordingSink>, RecordingError> {
        let open_failed = |reason: String| RecordingError::Open {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| open_failed(e.to_string()))?;
                debug!(dir = %parent.display(), "Recording directory ready");
            }
        }

        gst::init().map_err(|e| open_failed(format!("Failed to initialize GStreamer: {}", e)))?;

        let sink = AviSink::create(path, format, self.quality)?;
        info!(path = %path.display(), %format, quality = self.quality, "Opened AVI recording");

        Ok(Box::new(sink))
    }
}
