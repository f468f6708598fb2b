// SPDX-License-Identifier: GPL-3.0-only

//! JPEG frame encoding
//!
//! Frames are normalised to RGB24 and compressed with the image crate's
//! baseline JPEG encoder at a fixed quality.

use super::FrameEncoder;
use crate::backends::camera::format_converters::frame_to_rgb;
use crate::backends::camera::types::Frame;
use crate::errors::EncodeError;
use bytes::Bytes;

/// Encode one frame as a JPEG image
///
/// # Arguments
/// * `frame` - Raw frame in any supported pixel format
/// * `quality` - JPEG quality (1-100)
///
/// # Returns
/// * `Ok(Vec<u8>)` - Complete JPEG file (SOI to EOI)
/// * `Err(EncodeError)` - Geometry mismatch or encoder failure
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if !frame.is_well_formed() {
        return Err(EncodeError::BufferSize {
            expected: frame.format.frame_size(frame.width, frame.height),
            actual: frame.data.len(),
        });
    }

    let rgb = frame_to_rgb(frame);

    // Typical compression ratio is well above 10:1
    let mut buffer = Vec::with_capacity(rgb.len() / 8);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));

    encoder.encode(
        &rgb,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(buffer)
}

/// Live-feed encoder at a fixed quality
#[derive(Debug, Clone, Copy)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<Bytes, EncodeError> {
        encode_jpeg(frame, self.quality).map(Bytes::from)
    }
}
