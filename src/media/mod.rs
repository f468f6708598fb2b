// SPDX-License-Identifier: GPL-3.0-only

//! Media encoding utilities
//!
//! # Image Encoding
//!
//! The [`encoders`] module turns raw frames into JPEG, both for the live
//! feed and for each frame stored in a recording.
//!
//! # Container
//!
//! Recordings are muxed by GStreamer (see
//! [`crate::pipelines::video::recorder`]). The [`avi`] module reads the
//! finished Motion-JPEG AVI files back for `inspect` and for tests.

pub mod avi;
pub mod encoders;

pub use avi::AviSummary;
pub use encoders::{FrameEncoder, JpegFrameEncoder};
