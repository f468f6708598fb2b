// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera relay
//!
//! Only [`CaptureError`] is fatal. Every other error is recovered where it
//! happens and at most reported back to the connection that caused it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame source errors
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No device could be opened
    #[error("Failed to open capture device {device}: {reason}")]
    OpenFailed { device: String, reason: String },

    /// The device rejected the requested format
    #[error("Unsupported capture format: {0}")]
    UnsupportedFormat(String),

    /// The device went away or returned an unrecoverable error
    #[error("Capture device failed: {0}")]
    DeviceFailed(String),

    /// A finite source has no more frames
    #[error("Frame source ended")]
    StreamEnded,

    /// Feature not compiled in
    #[error("Source not available in this build: {0}")]
    NotAvailable(String),
}

/// Frame encoding errors
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel buffer does not match the declared frame geometry
    #[error("Frame buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// The JPEG encoder failed
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Recording errors
#[derive(Debug, Error)]
pub enum RecordingError {
    /// Requested folder or file name would escape the upload root
    #[error("Invalid recording path: {0}")]
    InvalidPath(String),

    /// Creating the target directory or starting the muxer failed
    #[error("Failed to open recording at {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// Appending a frame failed
    #[error("Failed to write frame to {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Draining the pipeline or writing the container index failed
    #[error("Failed to finalize recording {path}: {reason}")]
    Finish { path: PathBuf, reason: String },

    /// A written file could not be parsed back
    #[error("Not a readable AVI file: {0}")]
    Malformed(String),
}

/// Control message errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message has no \"action\" field")]
    MissingAction,

    #[error("START requires \"folderName\"")]
    MissingFolder,

    #[error("SEGMENT mode requires a non-empty \"fileName\"")]
    MissingFileName,

    #[error("Unknown recording mode: {0}")]
    UnknownMode(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
