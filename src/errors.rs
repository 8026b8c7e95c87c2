// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the preview pipeline
//!
//! Lower-level modules define their own error enums ([`GpuError`],
//! [`BackendError`], [`ComputeError`]); this module aggregates them into
//! [`PipelineError`] for callers that cross component boundaries.
//!
//! The taxonomy follows the pipeline's error policy: shader compile failures,
//! framebuffer incompleteness, and preview bind failures are logged and
//! rendering continues degraded; camera open or size negotiation failures
//! abort the rest of surface creation but keep the process alive; GPU errors
//! reported by `poll_errors` are fatal to the running tick.

use std::fmt;

use crate::backends::camera::BackendError;
use crate::compute::ComputeError;
use crate::gpu::GpuError;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main pipeline error type
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// GPU resource or rendering errors
    Gpu(GpuError),
    /// Camera backend errors
    Camera(BackendError),
    /// External compute stage errors
    Compute(ComputeError),
    /// Lifecycle ordering violation (e.g. tick after surface destruction)
    Lifecycle(String),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Gpu(e) => write!(f, "GPU error: {}", e),
            PipelineError::Camera(e) => write!(f, "Camera error: {}", e),
            PipelineError::Compute(e) => write!(f, "Compute error: {}", e),
            PipelineError::Lifecycle(msg) => write!(f, "Lifecycle error: {}", msg),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<GpuError> for PipelineError {
    fn from(err: GpuError) -> Self {
        PipelineError::Gpu(err)
    }
}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        PipelineError::Camera(err)
    }
}

impl From<ComputeError> for PipelineError {
    fn from(err: ComputeError) -> Self {
        PipelineError::Compute(err)
    }
}

impl From<String> for PipelineError {
    fn from(msg: String) -> Self {
        PipelineError::Other(msg)
    }
}

impl From<&str> for PipelineError {
    fn from(msg: &str) -> Self {
        PipelineError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}
