// SPDX-License-Identifier: GPL-3.0-only

//! Per-tick rendering: the two-pass protocol
//!
//! Each tick uploads the newest camera frame, renders it into the compute
//! stage's input texture, waits for that work to complete, runs the compute
//! stage, and renders the stage's output to the display target. The GPU wait
//! between pass 1 and the compute call is load-bearing: the stage reads the
//! input texture by handle and must observe the finished pass-1 write.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backends::camera::{CameraFrame, CaptureSize};
use crate::compute::ComputeStage;
use crate::constants::FPS_WINDOW_MS;
use crate::errors::PipelineResult;
use crate::gpu::{
    DrawPass, GpuContext, ShaderProgram, TextureSet, CAMERA_FRAGMENT_SHADER,
    DISPLAY_FRAGMENT_SHADER, QUAD_VERTEX_SHADER,
};

/// Frames-per-second counter over a fixed wall-clock window
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    window: Duration,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            window: Duration::from_millis(FPS_WINDOW_MS),
        }
    }

    /// Count one frame; returns the frame count when a window closes
    pub fn frame(&mut self) -> Option<u32> {
        self.frames += 1;
        if self.window_start.elapsed() >= self.window {
            let fps = self.frames;
            self.frames = 0;
            self.window_start = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the GPU-side rendering resources for one surface session
pub struct PipelineRenderer {
    camera_program: ShaderProgram,
    display_program: ShaderProgram,
    textures: TextureSet,
    capture: CaptureSize,
    fps: FpsCounter,
    log_fps: bool,
}

impl PipelineRenderer {
    /// Allocate textures and compile both pass programs.
    ///
    /// Shader failures degrade to blank output instead of failing; texture
    /// allocation failures are fatal for the session.
    pub fn new(
        gpu: &mut dyn GpuContext,
        capture: CaptureSize,
        compute_textures: u32,
        log_fps: bool,
    ) -> PipelineResult<Self> {
        let mut textures = TextureSet::new();
        textures.init_camera_texture(gpu)?;
        textures.init_compute_textures(gpu, capture.width, capture.height, compute_textures)?;

        let camera_program = ShaderProgram::compile(
            gpu,
            "camera_pass",
            QUAD_VERTEX_SHADER,
            CAMERA_FRAGMENT_SHADER,
        );
        let display_program = ShaderProgram::compile(
            gpu,
            "display_pass",
            QUAD_VERTEX_SHADER,
            DISPLAY_FRAGMENT_SHADER,
        );

        debug!(capture = %capture, "Pipeline renderer ready");
        Ok(Self {
            camera_program,
            display_program,
            textures,
            capture,
            fps: FpsCounter::new(),
            log_fps,
        })
    }

    /// Texture ownership for this session
    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }

    /// Negotiated capture size
    pub fn capture_size(&self) -> CaptureSize {
        self.capture
    }

    /// Render one tick.
    ///
    /// `frame` is the newest camera frame if one arrived since the last tick;
    /// `compute` is the stage to run between the passes, `None` while the
    /// stage is not initialised. A missing frame still redraws from the
    /// current texture contents.
    pub fn tick(
        &mut self,
        gpu: &mut dyn GpuContext,
        frame: Option<&CameraFrame>,
        compute: Option<&mut dyn ComputeStage>,
    ) -> PipelineResult<()> {
        let camera_texture = match self.textures.camera_texture() {
            Some(t) => t,
            None => {
                warn!("Tick without camera texture; skipping");
                return Ok(());
            }
        };

        if let Some(frame) = frame {
            if let Err(e) = gpu.import_camera_frame(camera_texture, frame) {
                // Skip the stale upload, keep rendering previous contents.
                warn!(error = %e, "Camera frame import failed");
            }
        }

        // Pass 1: camera texture -> compute input, at capture resolution.
        if let (Some(input), Some(fb)) = (self.textures.compute_input(), self.textures.framebuffer())
        {
            gpu.draw_quad(&DrawPass {
                program: self.camera_program.handle(),
                source: camera_texture,
                target: Some(fb),
                viewport: (self.capture.width, self.capture.height),
                clear: true,
            })?;

            // The compute stage reads the input texture directly; pass-1
            // work must be complete before it runs.
            gpu.finish()?;

            if let Some(stage) = compute {
                let output = self.textures.compute_output().unwrap_or(input);
                if let Err(e) = stage.process(gpu, input, output) {
                    warn!(error = %e, "Compute stage failed; displaying unprocessed frame");
                }
            }
        }

        // Pass 2: compute output -> display target, at display resolution.
        if let Some(output) = self.textures.compute_output() {
            let (dw, dh) = gpu.display_size();
            gpu.draw_quad(&DrawPass {
                program: self.display_program.handle(),
                source: output,
                target: None,
                viewport: (dw, dh),
                clear: true,
            })?;
        }

        gpu.flush();
        gpu.poll_errors()?;

        if let Some(fps) = self.fps.frame() {
            if self.log_fps {
                info!(fps, "Preview frame rate");
            }
        }
        Ok(())
    }

    /// Release programs and textures; the renderer is consumed
    pub fn release(mut self, gpu: &mut dyn GpuContext) {
        self.textures.release(gpu);
        self.camera_program.release(gpu);
        self.display_program.release(gpu);
        debug!("Pipeline renderer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_counter_reports_only_on_window_close() {
        let mut fps = FpsCounter {
            window_start: Instant::now(),
            frames: 0,
            window: Duration::from_millis(0),
        };
        // Zero-length window closes on the first frame
        assert_eq!(fps.frame(), Some(1));
        assert_eq!(fps.frame(), Some(1));

        let mut fps = FpsCounter {
            window_start: Instant::now(),
            frames: 0,
            window: Duration::from_secs(3600),
        };
        assert_eq!(fps.frame(), None);
        assert_eq!(fps.frame(), None);
    }
}
