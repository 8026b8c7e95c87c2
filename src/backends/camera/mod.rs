// SPDX-License-Identifier: GPL-3.0-only
// Camera backend with trait-based abstraction for future multi-backend support

//! Camera backend abstraction
//!
//! The pipeline core never talks to camera hardware directly; it drives the
//! [`CameraDevice`] trait. A device produces frames into a GPU-importable
//! surface (the bound external texture) and reports frame arrival through an
//! asynchronous callback on its own capture thread.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ SurfaceLifecycle     │  ← owns the device, drives open/negotiate/start
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  CameraDevice trait  │  ← common interface
//! └──────────┬───────────┘
//!            │
//!            ▼
//!      ┌───────────┐
//!      │ Virtual   │  ← synthetic frame source (headless/demo/tests)
//!      └───────────┘
//! ```

pub mod frame_loop;
pub mod types;
pub mod virtual_device;

pub use types::*;
pub use virtual_device::VirtualCamera;

use crate::gpu::TextureHandle;

/// Complete camera device trait
///
/// Lifecycle order: `open` → `enumerate_supported_sizes`/`set_size` →
/// `bind_output_surface` → `start_streaming` → `stop_streaming` → `release`.
/// Implementations deliver frame-available notifications on their own capture
/// thread via the callback registered with `set_frame_callback`.
pub trait CameraDevice: Send {
    /// Open the device for exclusive use
    ///
    /// # Returns
    /// * `Ok(())` - Device opened successfully
    /// * `Err(BackendError::Busy)` - Device is in use elsewhere
    fn open(&mut self) -> BackendResult<()>;

    /// Capture sizes supported by the device, ordered largest to smallest.
    ///
    /// The ordering is part of the contract: size negotiation scans the list
    /// front to back assuming descending resolutions.
    fn enumerate_supported_sizes(&self) -> Vec<CaptureSize>;

    /// Apply a capture size. Must be one of the supported sizes.
    fn set_size(&mut self, size: CaptureSize) -> BackendResult<()>;

    /// Bind the device's frame stream to an external GPU texture.
    ///
    /// Frames produced after this call are importable into `texture` by the
    /// render thread.
    fn bind_output_surface(&mut self, texture: TextureHandle) -> BackendResult<()>;

    /// Register the frame-available callback.
    ///
    /// Invoked on the capture thread for every produced frame; must be cheap.
    fn set_frame_callback(&mut self, callback: FrameCallback);

    /// Start delivering frames
    fn start_streaming(&mut self) -> BackendResult<()>;

    /// Stop delivering frames. The device stays open.
    fn stop_streaming(&mut self) -> BackendResult<()>;

    /// The most recent frame produced by the device, if any.
    ///
    /// Multiple frames arriving between two render ticks collapse: only the
    /// latest is retained, which is all a display pipeline needs.
    fn latest_frame(&self) -> Option<CameraFrame>;

    /// Release the device and all associated resources
    fn release(&mut self) -> BackendResult<()>;

    /// Check if the device is open
    fn is_open(&self) -> bool;

    /// Check if the device is currently streaming
    fn is_streaming(&self) -> bool;

    /// Currently applied capture size (if any)
    fn current_size(&self) -> Option<CaptureSize>;
}

/// Get the default device for this system.
///
/// Only the virtual backend exists today; real hardware backends plug in
/// behind the same trait.
pub fn get_default_device() -> Box<dyn CameraDevice> {
    Box::new(VirtualCamera::new())
}
