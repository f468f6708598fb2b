// SPDX-License-Identifier: GPL-3.0-only

//! Frame pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Frame Source │ ──▶ │  Pipeline Driver  │ ──▶ │ Recording    │ ──▶ AVI file
//! │ (V4L2/test)  │     │  (own thread)     │     │ Controller   │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!                                │ JPEG, only with viewers
//!                                ▼
//!                       ┌───────────────────┐
//!                       │  Broadcast Hub    │ ──▶ WebSocket viewers
//!                       └───────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`driver`]: the frame loop and its thread handle
//! - [`video`]: recording controller and sinks

pub mod driver;
pub mod video;

pub use driver::{DriverStats, PipelineDriver, PipelineHandle, StepOutcome};
