// SPDX-License-Identifier: GPL-3.0-only

//! Frame encoders
//!
//! The pipeline only needs "raw frame in, compressed bytes out", so the
//! encoder sits behind [`FrameEncoder`] and tests can count or fail calls.

pub mod jpeg;

pub use jpeg::{JpegFrameEncoder, encode_jpeg};

use crate::backends::camera::types::Frame;
use crate::errors::EncodeError;
use bytes::Bytes;

/// Compresses a raw frame into a transmittable image
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: &Frame) -> Result<Bytes, EncodeError>;
}
