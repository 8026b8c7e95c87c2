// SPDX-License-Identifier: GPL-3.0-only

//! Texture and framebuffer ownership for one surface session
//!
//! A [`TextureSet`] owns the external camera texture, the one or two
//! offscreen compute textures, and the framebuffer that binds the first
//! compute texture as its color target. It is created on surface-created and
//! released exactly once on surface-destroyed; the underlying GPU API does
//! not guarantee idempotent deletes.

use tracing::{debug, warn};

use super::{FramebufferHandle, GpuContext, GpuResult, TextureFilter, TextureHandle, TextureKey};

/// Owns the GPU textures and framebuffer for one surface lifetime
#[derive(Debug, Default)]
pub struct TextureSet {
    camera_texture: Option<TextureHandle>,
    compute_textures: Vec<TextureHandle>,
    framebuffer: Option<FramebufferHandle>,
    released: bool,
}

impl TextureSet {
    /// Create an empty set; textures are allocated by the init methods
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the external camera texture.
    ///
    /// The handle is stable across release/recreate of the set: the context
    /// tracks it under [`TextureKey::CameraInput`], so an external compute
    /// module that cached the value keeps a valid binding.
    pub fn init_camera_texture(&mut self, gpu: &mut dyn GpuContext) -> GpuResult<TextureHandle> {
        let handle = gpu.create_external_texture(TextureKey::CameraInput)?;
        debug!(texture = %handle, "Camera texture initialised");
        self.camera_texture = Some(handle);
        Ok(handle)
    }

    /// Allocate `count` (1 or 2) offscreen RGBA8 compute textures sized to
    /// the capture resolution, and a framebuffer targeting the first.
    ///
    /// The first texture is the compute stage's input (pass-1 render target);
    /// the second, if present, is its declared output, displayed directly.
    /// Framebuffer incompleteness is reported by the context and rendering
    /// continues degraded rather than aborting.
    pub fn init_compute_textures(
        &mut self,
        gpu: &mut dyn GpuContext,
        width: u32,
        height: u32,
        count: u32,
    ) -> GpuResult<&[TextureHandle]> {
        let count = count.clamp(1, 2);
        self.compute_textures.clear();

        let input =
            gpu.create_texture_2d(TextureKey::ComputeInput, width, height, TextureFilter::Linear)?;
        self.compute_textures.push(input);

        if count == 2 {
            let output = gpu.create_texture_2d(
                TextureKey::ComputeOutput,
                width,
                height,
                TextureFilter::Linear,
            )?;
            self.compute_textures.push(output);
        }

        match gpu.create_framebuffer(input) {
            Ok(fb) => {
                debug!(framebuffer = %fb, width, height, "Offscreen framebuffer bound");
                self.framebuffer = Some(fb);
            }
            Err(e) => {
                // Best effort: a live-camera surface must not crash on
                // transient GPU state.
                warn!(error = %e, "Unable to bind offscreen framebuffer");
            }
        }

        Ok(&self.compute_textures)
    }

    /// The external camera texture, if initialised
    pub fn camera_texture(&self) -> Option<TextureHandle> {
        self.camera_texture
    }

    /// The compute stage's input texture (pass-1 render target)
    pub fn compute_input(&self) -> Option<TextureHandle> {
        self.compute_textures.first().copied()
    }

    /// The texture displayed by pass 2: the compute output when two textures
    /// were allocated, otherwise the single in-place texture
    pub fn compute_output(&self) -> Option<TextureHandle> {
        self.compute_textures.last().copied()
    }

    /// The second compute texture, when the stage declares a separate output
    pub fn second_output(&self) -> Option<TextureHandle> {
        self.compute_textures.get(1).copied()
    }

    /// The offscreen framebuffer, if complete enough to exist
    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    /// Delete all owned textures and the framebuffer object.
    ///
    /// Must be called exactly once per successful init; a second call is
    /// reported and skipped since the GPU API does not guarantee idempotent
    /// deletes.
    pub fn release(&mut self, gpu: &mut dyn GpuContext) {
        if self.released {
            warn!("TextureSet released twice; skipping");
            return;
        }
        self.released = true;

        if let Some(fb) = self.framebuffer.take() {
            if let Err(e) = gpu.delete_framebuffer(fb) {
                warn!(framebuffer = %fb, error = %e, "Failed to delete framebuffer");
            }
        }
        for tex in self.compute_textures.drain(..) {
            if let Err(e) = gpu.delete_texture(tex) {
                warn!(texture = %tex, error = %e, "Failed to delete compute texture");
            }
        }
        if let Some(tex) = self.camera_texture.take() {
            if let Err(e) = gpu.delete_texture(tex) {
                warn!(texture = %tex, error = %e, "Failed to delete camera texture");
            }
        }
        debug!("TextureSet released");
    }
}
