// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to RGB24
//!
//! The JPEG encoders only take RGB24, so every source format is normalised
//! here before encoding.

use super::types::{Frame, PixelFormat};
use std::borrow::Cow;

/// Convert YUYV (YUV 4:2:2) to RGB24
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            if rgb.len() >= pixel_count * 3 {
                break;
            }
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    // Short buffers are padded black so the geometry stays valid
    rgb.resize(pixel_count * 3, 0);
    rgb
}

/// Swap BGR24 byte order to RGB24
pub fn bgr_to_rgb(bgr: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bgr.len());
    for chunk in bgr.chunks_exact(3) {
        rgb.extend_from_slice(&[chunk[2], chunk[1], chunk[0]]);
    }
    rgb
}

/// Borrow or convert a frame's pixels as RGB24
pub fn frame_to_rgb(frame: &Frame) -> Cow<'_, [u8]> {
    match frame.format {
        PixelFormat::Rgb24 => Cow::Borrowed(&frame.data[..]),
        PixelFormat::Bgr24 => Cow::Owned(bgr_to_rgb(&frame.data)),
        PixelFormat::Yuyv => Cow::Owned(yuyv_to_rgb(&frame.data, frame.width, frame.height)),
    }
}
