// SPDX-License-Identifier: GPL-3.0-only

//! GPU abstraction for the preview pipeline
//!
//! The pipeline core addresses GPU resources through opaque numeric handles,
//! because the external compute stage caches texture handles *by value* and
//! keeps using them across surface recreation. Instead of relying on a driver
//! reusing numeric ids, the context keeps a resource table keyed by logical
//! [`TextureKey`]: recreating a texture under the same key yields the same
//! handle value, so a cached handle stays valid until the compute stage is
//! torn down.
//!
//! [`WgpuContext`] is the real implementation; tests drive the pipeline with
//! recording fakes behind the same trait.

pub mod device;
pub mod shader;
pub mod texture_set;
pub mod wgpu_context;

pub use device::{create_render_device, GpuDeviceInfo};
pub use shader::{
    ShaderProgram, CAMERA_FRAGMENT_SHADER, DISPLAY_FRAGMENT_SHADER, QUAD_VERTEX_SHADER,
};
pub use texture_set::TextureSet;
pub use wgpu_context::WgpuContext;

use std::fmt;

use crate::backends::camera::CameraFrame;

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// GPU layer errors
///
/// Compile, link, and framebuffer errors are recoverable: callers log them
/// and continue with degraded output. `Fatal` is an escalated device error
/// reported by `poll_errors` and terminates the running tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// No suitable GPU adapter found
    AdapterNotFound,
    /// Device creation failed
    DeviceCreation(String),
    /// A shader stage failed to compile; carries the compiler diagnostic
    ShaderCompile { stage: String, log: String },
    /// Program link (pipeline creation) failed. Link status is checked
    /// explicitly; a dead program must never reach the draw path unnoticed.
    ShaderLink(String),
    /// Framebuffer is incomplete; rendering continues degraded
    FramebufferIncomplete(String),
    /// A handle does not refer to a live resource
    InvalidHandle(String),
    /// Importing a camera frame into the external texture failed
    Import(String),
    /// Escalated device error; the tick must not continue
    Fatal(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::AdapterNotFound => write!(f, "No suitable GPU adapter found"),
            GpuError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GpuError::ShaderCompile { stage, log } => {
                write!(f, "Could not compile {} shader: {}", stage, log)
            }
            GpuError::ShaderLink(msg) => write!(f, "Program link failed: {}", msg),
            GpuError::FramebufferIncomplete(msg) => {
                write!(f, "Framebuffer incomplete: {}", msg)
            }
            GpuError::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            GpuError::Import(msg) => write!(f, "Frame import failed: {}", msg),
            GpuError::Fatal(msg) => write!(f, "Fatal GPU error: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {}

/// Opaque GPU texture handle.
///
/// Handle values are stable per [`TextureKey`] across texture recreation;
/// see the module docs. `INVALID` (0) is the sentinel returned on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u64);

impl TextureHandle {
    /// Sentinel handle returned by failed allocations
    pub const INVALID: TextureHandle = TextureHandle(0);

    /// Construct a handle from a raw value (implementations and test fakes)
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// True unless this is the INVALID sentinel
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// Opaque framebuffer handle; the display target is the implicit binding
/// and is addressed by `None` in [`DrawPass::target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(u64);

impl FramebufferHandle {
    pub const INVALID: FramebufferHandle = FramebufferHandle(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for FramebufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fbo#{}", self.0)
    }
}

/// Opaque shader program handle; `INVALID` is the degraded-output sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(u64);

impl ProgramHandle {
    pub const INVALID: ProgramHandle = ProgramHandle(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ProgramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prog#{}", self.0)
    }
}

/// Logical names for the pipeline's textures.
///
/// The key, not the numeric handle, is the unit of identity the GPU layer
/// tracks across surface recreation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKey {
    /// External texture the camera stream is imported into
    CameraInput,
    /// Pass-1 render target, read by the compute stage
    ComputeInput,
    /// Compute stage output, sampled by pass 2
    ComputeOutput,
}

impl fmt::Display for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureKey::CameraInput => write!(f, "camera-input"),
            TextureKey::ComputeInput => write!(f, "compute-input"),
            TextureKey::ComputeOutput => write!(f, "compute-output"),
        }
    }
}

/// Sampling filter for 2D textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    /// Linear filtering (offscreen targets sampled at their own size)
    #[default]
    Linear,
    /// Nearest filtering (external camera textures reject linear on most
    /// hardware)
    Nearest,
}

/// One full-bounds textured-quad draw
#[derive(Debug, Clone, Copy)]
pub struct DrawPass {
    /// Program to draw with; the INVALID sentinel makes the pass a no-op
    pub program: ProgramHandle,
    /// Texture sampled by the fragment stage
    pub source: TextureHandle,
    /// Offscreen render target, or `None` for the display target
    pub target: Option<FramebufferHandle>,
    /// Viewport dimensions for this pass
    pub viewport: (u32, u32),
    /// Clear the target before drawing
    pub clear: bool,
}

/// GPU context owned by the render thread.
///
/// All methods must be called from the render thread; nothing here is
/// shared with the camera or lifecycle threads.
pub trait GpuContext: Send {
    /// Allocate the external camera texture under `key`.
    ///
    /// Clamp-to-edge wrap, nearest filtering. The returned handle is stable
    /// across release/recreate for the same key.
    fn create_external_texture(&mut self, key: TextureKey) -> GpuResult<TextureHandle>;

    /// Allocate a 2D RGBA8 texture under `key`, sized `width` x `height`
    fn create_texture_2d(
        &mut self,
        key: TextureKey,
        width: u32,
        height: u32,
        filter: TextureFilter,
    ) -> GpuResult<TextureHandle>;

    /// Create a framebuffer with `color` as its color attachment.
    ///
    /// Completeness is checked here; an incomplete framebuffer is reported
    /// via a log by the implementation and the handle is still returned, so
    /// rendering continues in degraded form.
    fn create_framebuffer(&mut self, color: TextureHandle) -> GpuResult<FramebufferHandle>;

    /// Delete a texture. Not idempotent: exactly one delete per create.
    fn delete_texture(&mut self, texture: TextureHandle) -> GpuResult<()>;

    /// Delete a framebuffer object
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) -> GpuResult<()>;

    /// Current handle for a logical key, if one was ever created
    fn resolve(&self, key: TextureKey) -> Option<TextureHandle>;

    /// Compile a vertex+fragment pair into a program.
    ///
    /// Stage compile status and link status are both checked; failures carry
    /// the compiler diagnostic.
    fn compile_program(
        &mut self,
        label: &str,
        vertex_src: &str,
        fragment_src: &str,
    ) -> GpuResult<ProgramHandle>;

    /// Delete a shader program
    fn delete_program(&mut self, program: ProgramHandle) -> GpuResult<()>;

    /// Import the latest camera frame into an external texture
    fn import_camera_frame(
        &mut self,
        texture: TextureHandle,
        frame: &CameraFrame,
    ) -> GpuResult<()>;

    /// Resize the display target (surface-changed)
    fn set_display_size(&mut self, width: u32, height: u32);

    /// Current display target dimensions
    fn display_size(&self) -> (u32, u32);

    /// Draw one full-bounds textured quad
    fn draw_quad(&mut self, pass: &DrawPass) -> GpuResult<()>;

    /// Copy the full contents of one texture into another of the same size
    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle) -> GpuResult<()>;

    /// Block until all submitted GPU work has completed.
    ///
    /// Guarantees pass-1 output is visible to the external compute stage,
    /// which reads the texture outside this context's synchronization domain.
    fn finish(&mut self) -> GpuResult<()>;

    /// Submit pending work without waiting
    fn flush(&mut self);

    /// Poll for accumulated device errors; any error is fatal to the tick
    fn poll_errors(&mut self) -> GpuResult<()>;

    /// Read back the display target as RGBA bytes (diagnostics/screenshots)
    fn read_display(&mut self) -> GpuResult<Vec<u8>>;
}
