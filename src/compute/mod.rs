// SPDX-License-Identifier: GPL-3.0-only

//! Pluggable frame-compute stage
//!
//! The render loop hands each captured frame to a [`ComputeStage`] between
//! the two render passes: pass 1 writes the normalized camera image into the
//! stage's input texture, the stage transforms it into its output texture,
//! and pass 2 displays the output. Stages address textures by the handle
//! values the pipeline passes in, which stay stable across surface
//! recreation (see [`crate::gpu`]).
//!
//! `process` is called synchronously on the render thread with no deadline;
//! a slow stage lowers the frame rate but never corrupts state.

use std::fmt;

use tracing::{debug, warn};

use crate::gpu::{GpuContext, TextureHandle};

pub type ComputeResult<T> = Result<T, ComputeError>;

/// Errors from a compute stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// Stage initialisation failed; the pipeline keeps rendering pass-through
    InitFailed(String),
    /// A single frame could not be processed; the frame is skipped
    ProcessFailed(String),
    /// Method called against the stage's lifecycle contract
    NotInitialised,
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeError::InitFailed(msg) => write!(f, "Compute stage init failed: {}", msg),
            ComputeError::ProcessFailed(msg) => write!(f, "Frame processing failed: {}", msg),
            ComputeError::NotInitialised => write!(f, "Compute stage not initialised"),
        }
    }
}

impl std::error::Error for ComputeError {}

/// Textures and dimensions a stage is initialised against.
///
/// Handle values stay stable across surface recreation, so a stage may cache
/// them between `init` and `teardown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBinding {
    /// Capture width the input/output textures are sized to
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Texture populated by pass 1
    pub input: TextureHandle,
    /// Texture sampled by pass 2; equals `input` for in-place stages
    pub output: TextureHandle,
    /// Separate output texture, when two were allocated
    pub second_output: Option<TextureHandle>,
}

/// A frame-processing stage slotted between the two render passes.
///
/// Lifecycle: `init` once per surface session, after the textures exist and
/// the host application has started (whichever comes later); `process` once
/// per rendered frame while initialised; `teardown` before the session's
/// textures are deleted, and again only after a matching `init`. The
/// `on_app_*` hooks mirror the host lifecycle for stages that manage their
/// own resources across pauses.
pub trait ComputeStage: Send {
    /// Prepare stage resources against the session's textures.
    fn init(&mut self, gpu: &mut dyn GpuContext, binding: &ComputeBinding) -> ComputeResult<()>;

    /// Transform `input` into `output`. The handles may be equal, in which
    /// case the stage works in place.
    fn process(
        &mut self,
        gpu: &mut dyn GpuContext,
        input: TextureHandle,
        output: TextureHandle,
    ) -> ComputeResult<()>;

    /// Release stage resources. `process` is never called afterwards unless
    /// `init` runs again.
    fn teardown(&mut self, gpu: &mut dyn GpuContext) -> ComputeResult<()>;

    /// Host application became active
    fn on_app_start(&mut self) {}

    /// Host application paused; the stage may drop transient state
    fn on_app_pause(&mut self) {}

    /// Host application stopped
    fn on_app_stop(&mut self) {}
}

/// Identity stage: copies input to output unchanged.
///
/// Stands in for a real tone-mapping stage during bring-up and in tests, and
/// keeps the two-pass protocol exercised end to end.
#[derive(Debug, Default)]
pub struct PassthroughStage {
    initialised: bool,
}

impl PassthroughStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeStage for PassthroughStage {
    fn init(&mut self, _gpu: &mut dyn GpuContext, binding: &ComputeBinding) -> ComputeResult<()> {
        if self.initialised {
            warn!("PassthroughStage initialised twice");
            return Ok(());
        }
        self.initialised = true;
        debug!(
            width = binding.width,
            height = binding.height,
            input = %binding.input,
            output = %binding.output,
            "PassthroughStage initialised"
        );
        Ok(())
    }

    fn process(
        &mut self,
        gpu: &mut dyn GpuContext,
        input: TextureHandle,
        output: TextureHandle,
    ) -> ComputeResult<()> {
        if !self.initialised {
            return Err(ComputeError::NotInitialised);
        }
        if input == output {
            // In-place identity is a no-op.
            return Ok(());
        }
        gpu.copy_texture(input, output)
            .map_err(|e| ComputeError::ProcessFailed(e.to_string()))
    }

    fn teardown(&mut self, _gpu: &mut dyn GpuContext) -> ComputeResult<()> {
        if !self.initialised {
            return Err(ComputeError::NotInitialised);
        }
        self.initialised = false;
        debug!("PassthroughStage torn down");
        Ok(())
    }
}
