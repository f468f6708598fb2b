// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! - [`camera`]: Frame sources (synthetic pattern, V4L2) behind one trait
//!
//! Everything above this layer sees frames only through
//! [`camera::FrameSource`].

pub mod camera;
