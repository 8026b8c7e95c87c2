// SPDX-License-Identifier: GPL-3.0-only

//! Shader program compilation
//!
//! [`ShaderProgram::compile`] wraps the context's program compilation with
//! the pipeline's degraded-output policy: a compile or link failure is logged
//! with the compiler diagnostic and produces the INVALID sentinel, which the
//! draw path treats as a no-op. The host process never crashes on bad shader
//! source; the surface just stays blank.

use tracing::error;

use super::{GpuContext, ProgramHandle};

/// Vertex stage shared by both passes
pub const QUAD_VERTEX_SHADER: &str = include_str!("shaders/quad.wgsl");
/// Pass-1 fragment stage (camera texture -> compute input)
pub const CAMERA_FRAGMENT_SHADER: &str = include_str!("shaders/camera.wgsl");
/// Pass-2 fragment stage (compute output -> display)
pub const DISPLAY_FRAGMENT_SHADER: &str = include_str!("shaders/display.wgsl");

/// A compiled vertex+fragment program
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    label: String,
}

impl ShaderProgram {
    /// Compile a vertex+fragment pair.
    ///
    /// Never fails hard: compile and link errors are logged and yield a
    /// program with the INVALID handle, usable for (blank) drawing.
    pub fn compile(
        gpu: &mut dyn GpuContext,
        label: &str,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Self {
        let handle = match gpu.compile_program(label, vertex_src, fragment_src) {
            Ok(handle) => handle,
            Err(e) => {
                error!(label = label, error = %e, "Shader program compilation failed");
                ProgramHandle::INVALID
            }
        };
        Self {
            handle,
            label: label.to_string(),
        }
    }

    /// Program handle (possibly INVALID)
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Label this program was compiled under
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True if compilation and linking succeeded
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// Release the underlying program object
    pub fn release(self, gpu: &mut dyn GpuContext) {
        if self.handle.is_valid() {
            if let Err(e) = gpu.delete_program(self.handle) {
                error!(label = %self.label, error = %e, "Failed to delete shader program");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::CameraFrame;
    use crate::gpu::{
        DrawPass, FramebufferHandle, GpuError, GpuResult, TextureFilter, TextureHandle, TextureKey,
    };

    /// Context whose compiler rejects everything
    struct FailingCompiler;

    impl GpuContext for FailingCompiler {
        fn create_external_texture(&mut self, _key: TextureKey) -> GpuResult<TextureHandle> {
            Ok(TextureHandle::from_raw(1))
        }
        fn create_texture_2d(
            &mut self,
            _key: TextureKey,
            _width: u32,
            _height: u32,
            _filter: TextureFilter,
        ) -> GpuResult<TextureHandle> {
            Ok(TextureHandle::from_raw(2))
        }
        fn create_framebuffer(
            &mut self,
            _color: TextureHandle,
        ) -> GpuResult<FramebufferHandle> {
            Ok(FramebufferHandle::from_raw(1))
        }
        fn delete_texture(&mut self, _texture: TextureHandle) -> GpuResult<()> {
            Ok(())
        }
        fn delete_framebuffer(&mut self, _framebuffer: FramebufferHandle) -> GpuResult<()> {
            Ok(())
        }
        fn resolve(&self, _key: TextureKey) -> Option<TextureHandle> {
            None
        }
        fn compile_program(
            &mut self,
            _label: &str,
            _vertex_src: &str,
            _fragment_src: &str,
        ) -> GpuResult<crate::gpu::ProgramHandle> {
            Err(GpuError::ShaderCompile {
                stage: "fragment".into(),
                log: "syntax error".into(),
            })
        }
        fn delete_program(&mut self, _program: ProgramHandle) -> GpuResult<()> {
            Ok(())
        }
        fn import_camera_frame(
            &mut self,
            _texture: TextureHandle,
            _frame: &CameraFrame,
        ) -> GpuResult<()> {
            Ok(())
        }
        fn set_display_size(&mut self, _width: u32, _height: u32) {}
        fn display_size(&self) -> (u32, u32) {
            (0, 0)
        }
        fn draw_quad(&mut self, _pass: &DrawPass) -> GpuResult<()> {
            Ok(())
        }
        fn copy_texture(
            &mut self,
            _src: TextureHandle,
            _dst: TextureHandle,
        ) -> GpuResult<()> {
            Ok(())
        }
        fn finish(&mut self) -> GpuResult<()> {
            Ok(())
        }
        fn flush(&mut self) {}
        fn poll_errors(&mut self) -> GpuResult<()> {
            Ok(())
        }
        fn read_display(&mut self) -> GpuResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn compile_failure_yields_invalid_sentinel_without_panic() {
        let mut gpu = FailingCompiler;
        let program = ShaderProgram::compile(&mut gpu, "bad", "vs", "not wgsl at all");
        assert!(!program.is_valid());
        assert_eq!(program.handle(), ProgramHandle::INVALID);
        // Releasing an invalid program is a no-op
        program.release(&mut gpu);
    }
}
