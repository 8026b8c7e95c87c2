// SPDX-License-Identifier: GPL-3.0-only

//! HDR Preview - a camera preview pipeline with a pluggable compute stage
//!
//! This library drives a live camera preview through a two-pass GPU
//! protocol: pass 1 normalizes the camera stream into an offscreen texture,
//! a compute stage transforms it, and pass 2 presents the result on the
//! display target.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera device abstraction and capture threading
//! - [`gpu`]: GPU context, texture/framebuffer lifetime, shader programs
//! - [`compute`]: The pluggable frame-compute stage between the passes
//! - [`pipeline`]: Lifecycle orchestration, frame signalling, rendering
//! - [`config`]: User configuration handling

pub mod backends;
pub mod compute;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod pipeline;

// Re-export commonly used types
pub use backends::camera::{CameraDevice, CameraFrame, CaptureSize};
pub use compute::{ComputeStage, PassthroughStage};
pub use config::Config;
pub use errors::{PipelineError, PipelineResult};
pub use gpu::{GpuContext, WgpuContext};
pub use pipeline::{FramePipeline, FrameSignal, PipelineOptions, PipelineState};
