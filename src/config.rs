// SPDX-License-Identifier: GPL-3.0-only

//! Relay configuration
//!
//! Defaults come from [`crate::constants`]. A JSON file can override any
//! subset of fields, and command-line flags override the file.

use crate::backends::camera::types::VideoFormat;
use crate::constants::{capture, feed, network, recording};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

/// Which frame source feeds the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic colour bars, no hardware needed
    #[default]
    TestPattern,
    /// V4L2 capture device (e.g. `/dev/video0`)
    V4l2 { device: String },
}

impl SourceKind {
    /// Parse the `--source` flag: `test` or a device path
    pub fn from_arg(arg: &str) -> Self {
        match arg {
            "test" | "test-pattern" | "pattern" => SourceKind::TestPattern,
            device => SourceKind::V4l2 {
                device: device.to_string(),
            },
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::TestPattern => write!(f, "test pattern"),
            SourceKind::V4l2 { device } => write!(f, "V4L2 {}", device),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Address the WebSocket listener binds to
    pub bind_address: String,
    /// WebSocket listen port
    pub port: u16,
    /// Capture and recording width
    pub width: u32,
    /// Capture and recording height
    pub height: u32,
    /// Capture and recording framerate
    pub framerate: u32,
    /// Root directory for recordings
    pub upload_root: PathBuf,
    /// JPEG quality of the live feed (1-100)
    pub jpeg_quality: u8,
    /// JPEG quality of recorded frames (1-100)
    pub recording_quality: u8,
    /// Frames buffered per viewer
    pub viewer_buffer: usize,
    /// Frame source
    pub source: SourceKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: network::DEFAULT_BIND_ADDRESS.to_string(),
            port: network::DEFAULT_PORT,
            width: capture::DEFAULT_WIDTH,
            height: capture::DEFAULT_HEIGHT,
            framerate: capture::DEFAULT_FRAMERATE,
            upload_root: PathBuf::from(recording::DEFAULT_UPLOAD_ROOT),
            jpeg_quality: feed::DEFAULT_JPEG_QUALITY,
            recording_quality: recording::DEFAULT_RECORDING_QUALITY,
            viewer_buffer: feed::DEFAULT_VIEWER_BUFFER,
            source: SourceKind::default(),
        }
    }
}

impl Config {
    /// Load a config file; fields missing from the file keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check value ranges before anything is started
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.framerate == 0 {
            return Err(ConfigError::Invalid("framerate must be non-zero".into()));
        }
        for (name, quality) in [
            ("jpegQuality", self.jpeg_quality),
            ("recordingQuality", self.recording_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within 1..=100, got {}",
                    name, quality
                )));
            }
        }
        if self.viewer_buffer == 0 {
            return Err(ConfigError::Invalid("viewerBuffer must be at least 1".into()));
        }
        Ok(())
    }

    /// Fixed format shared by the frame source and every recording sink
    pub fn video_format(&self) -> VideoFormat {
        VideoFormat::new(self.width, self.height, self.framerate)
    }

    /// Socket address for the listener
    ///
    /// The bind address may be an IPv4 or IPv6 literal or a host name such
    /// as `localhost`, which is resolved to its first address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = self.bind_address.trim();
        if host.is_empty() {
            return Err(ConfigError::Invalid("bindAddress must not be empty".into()));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        let bad = |reason: String| {
            ConfigError::Invalid(format!("bad listen address {} port {}: {}", host, self.port, reason))
        };
        (host, self.port)
            .to_socket_addrs()
            .map_err(|e| bad(e.to_string()))?
            .next()
            .ok_or_else(|| bad("name resolved to no addresses".into()))
    }
}
