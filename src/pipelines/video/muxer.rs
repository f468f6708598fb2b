// SPDX-License-Identifier: GPL-3.0-only

//! AVI muxing
//!
//! Builds the container end of the recording pipeline: `avimux` writing
//! through a `filesink`. The muxer rewrites its header and appends the
//! index when it receives end-of-stream, so a file is only complete once
//! the pipeline has drained.

use crate::constants::recording;
use crate::errors::RecordingError;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Muxer and file sink for one recording
pub struct MuxerConfig {
    pub muxer: gst::Element,
    pub filesink: gst::Element,
    pub output_path: PathBuf,
}

/// Check that every element of the recording pipeline is installed
pub fn recording_elements_available() -> bool {
    if gst::init().is_err() {
        return false;
    }
    recording::PIPELINE_ELEMENTS.iter().all(|name| {
        let found = gst::ElementFactory::find(name).is_some();
        if !found {
            warn!(element = name, "GStreamer element not installed");
        }
        found
    })
}

/// Create `avimux` and a `filesink` writing to `output_path`
///
/// The file sink truncates an existing file when the pipeline starts.
pub fn create_muxer(output_path: &Path) -> Result<MuxerConfig, RecordingError> {
    let open_failed = |reason: String| RecordingError::Open {
        path: output_path.to_path_buf(),
        reason,
    };

    info!(path = %output_path.display(), "Creating AVI muxer");

    let location = output_path
        .to_str()
        .ok_or_else(|| open_failed("path is not valid UTF-8".into()))?;

    let muxer = gst::ElementFactory::make("avimux")
        .name("recording_mux")
        .build()
        .map_err(|e| open_failed(format!("Failed to create avimux: {}", e)))?;

    // OpenDML chunks lift the 1 GiB / 4 GiB limits of plain AVI
    if muxer.has_property("bigfile") {
        muxer.set_property("bigfile", true);
    }

    let filesink = gst::ElementFactory::make("filesink")
        .name("recording_sink")
        .property("location", location)
        .build()
        .map_err(|e| open_failed(format!("Failed to create filesink: {}", e)))?;

    debug!("Muxer and filesink created");

    Ok(MuxerConfig {
        muxer,
        filesink,
        output_path: output_path.to_path_buf(),
    })
}

/// Link the JPEG encoder to a new video pad on the muxer
pub fn link_video_to_muxer(encoder: &gst::Element, config: &MuxerConfig) -> Result<(), RecordingError> {
    encoder.link(&config.muxer).map_err(|_| RecordingError::Open {
        path: config.output_path.clone(),
        reason: "Failed to link video encoder to muxer".into(),
    })?;

    debug!("Video encoder linked to muxer");
    Ok(())
}

/// Link the muxer to the file sink
pub fn link_muxer_to_sink(config: &MuxerConfig) -> Result<(), RecordingError> {
    config
        .muxer
        .link(&config.filesink)
        .map_err(|_| RecordingError::Open {
            path: config.output_path.clone(),
            reason: "Failed to link muxer to filesink".into(),
        })?;

    debug!("Muxer linked to filesink");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesink_targets_output_path() {
        if !recording_elements_available() {
            return;
        }
        let path = std::env::temp_dir().join("camera_relay_muxer_test.avi");
        let config = create_muxer(&path).unwrap();
        let location: String = config.filesink.property("location");
        assert_eq!(Path::new(&location), path);
        assert_eq!(config.output_path, path);
    }
}
