// SPDX-License-Identifier: GPL-3.0-only

//! Frame pipeline orchestration
//!
//! [`FramePipeline`] ties the camera backend, the GPU context, and the
//! compute stage together and reacts to the two host lifecycles (application
//! and surface). All mutable state sits behind one mutex, which gives the
//! two ordering guarantees the host relies on: a surface-destroyed call
//! blocks until any in-flight render tick finishes, and no tick can start
//! once destruction began. The frame-ready latch is the only lock-free piece
//! and is safe to signal from the capture thread at any time.

pub mod frame_signal;
pub mod lifecycle;
pub mod renderer;
pub mod size;

pub use frame_signal::{FrameSignal, RedrawRequest};
pub use lifecycle::{may_render, AppEvent, AppState, PipelineState, SurfaceState};
pub use renderer::{FpsCounter, PipelineRenderer};
pub use size::select_capture_size;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::backends::camera::{CameraDevice, CaptureSize};
use crate::compute::{ComputeBinding, ComputeStage};
use crate::config::Config;
use crate::constants::{DEFAULT_CAPTURE_TARGET, DEFAULT_COMPUTE_TEXTURES};
use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::GpuContext;

/// Tunables for a pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Desired capture resolution; negotiated against the device's list
    pub target_size: CaptureSize,
    /// Number of offscreen compute textures (1 or 2)
    pub compute_textures: u32,
    /// Log the preview frame rate once per window
    pub log_fps: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_CAPTURE_TARGET,
            compute_textures: DEFAULT_COMPUTE_TEXTURES,
            log_fps: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_size: CaptureSize::new(config.target_width, config.target_height),
            compute_textures: config.compute_textures,
            log_fps: config.log_fps,
        }
    }
}

struct PipelineInner {
    gpu: Box<dyn GpuContext>,
    camera: Box<dyn CameraDevice>,
    compute: Box<dyn ComputeStage>,
    options: PipelineOptions,
    app: AppState,
    surface: SurfaceState,
    renderer: Option<PipelineRenderer>,
    compute_initialised: bool,
    /// True once any session was built; separates fresh from torn down
    had_session: bool,
}

/// The frame pipeline: camera in, compute stage in the middle, display out
pub struct FramePipeline {
    inner: Mutex<PipelineInner>,
    signal: Arc<FrameSignal>,
}

impl FramePipeline {
    pub fn new(
        gpu: Box<dyn GpuContext>,
        camera: Box<dyn CameraDevice>,
        compute: Box<dyn ComputeStage>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            inner: Mutex::new(PipelineInner {
                gpu,
                camera,
                compute,
                options,
                app: AppState::default(),
                surface: SurfaceState::default(),
                renderer: None,
                compute_initialised: false,
                had_session: false,
            }),
            signal: Arc::new(FrameSignal::new()),
        }
    }

    /// The latch the host wires to its redraw scheduler
    pub fn frame_signal(&self) -> Arc<FrameSignal> {
        Arc::clone(&self.signal)
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, PipelineInner>> {
        self.inner
            .lock()
            .map_err(|_| PipelineError::Lifecycle("pipeline state poisoned".into()))
    }

    // -- application lifecycle --

    pub fn on_app_start(&self) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        inner.app.apply(AppEvent::Start);
        inner.compute.on_app_start();
        // Compute init was deferred if the surface came up while stopped.
        Self::maybe_init_compute(&mut inner);
        Ok(())
    }

    pub fn on_app_resume(&self) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        inner.app.apply(AppEvent::Resume);
        Ok(())
    }

    pub fn on_app_pause(&self) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        inner.app.apply(AppEvent::Pause);
        inner.compute.on_app_pause();
        Ok(())
    }

    pub fn on_app_stop(&self) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        inner.app.apply(AppEvent::Stop);
        inner.compute.on_app_stop();
        Self::teardown_compute(&mut inner);
        Ok(())
    }

    // -- surface lifecycle --

    /// Open the camera, negotiate a capture size, and build the GPU session.
    ///
    /// On partial failure everything already acquired is released before the
    /// error is returned; the pipeline stays usable for a retry.
    pub fn on_surface_created(&self) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        if inner.renderer.is_some() {
            warn!("Surface created over a live session; recreating");
            Self::release_session(&mut inner);
        }
        inner.surface = SurfaceState::Created;

        if let Err(e) = Self::build_session(&mut inner, &self.signal) {
            error!(error = %e, "Surface session init failed");
            Self::release_session(&mut inner);
            return Err(e);
        }
        if !inner.app.is_stopped() {
            Self::maybe_init_compute(&mut inner);
        }
        Ok(())
    }

    /// The surface has valid dimensions; rendering may begin.
    ///
    /// Besides resizing the display target, the capture size is negotiated
    /// again with the new dimensions as the target and applied to the
    /// camera. A failure to re-apply is logged and the previous size stays
    /// in effect.
    pub fn on_surface_changed(&self, width: u32, height: u32) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        if inner.surface == SurfaceState::Destroyed {
            warn!(width, height, "Surface changed without a created surface; ignoring");
            return Ok(());
        }
        inner.gpu.set_display_size(width, height);

        let target = CaptureSize::new(width, height);
        let supported = inner.camera.enumerate_supported_sizes();
        match select_capture_size(&supported, target) {
            Some(capture) if inner.camera.current_size() != Some(capture) => {
                if let Err(e) = Self::apply_capture_size(&mut inner, capture) {
                    warn!(capture = %capture, error = %e, "Failed to re-apply capture size");
                }
            }
            Some(_) => {}
            None => warn!("Camera reports no capture sizes; keeping current"),
        }

        inner.surface = SurfaceState::Configured;
        debug!(width, height, "Surface configured");
        Ok(())
    }

    /// Tear down the session.
    ///
    /// Blocks until any in-flight render tick completes; no tick starts
    /// afterwards until the surface is recreated.
    pub fn on_surface_destroyed(&self) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        Self::release_session(&mut inner);
        inner.surface = SurfaceState::Destroyed;
        info!("Surface session released");
        Ok(())
    }

    // -- rendering --

    /// Render one frame if the lifecycle product allows it.
    ///
    /// Consumes the frame latch only when actually rendering, so a frame
    /// that arrives while gated is shown by the first tick after the gate
    /// opens.
    pub fn render_tick(&self) -> PipelineResult<()> {
        let mut inner = self.lock()?;
        if !may_render(inner.app, inner.surface) {
            debug!(app = ?inner.app, surface = %inner.surface, "Tick gated off");
            return Ok(());
        }

        let pending = self.signal.consume();
        let frame = if pending { inner.camera.latest_frame() } else { None };

        let PipelineInner {
            gpu,
            compute,
            renderer,
            compute_initialised,
            ..
        } = &mut *inner;
        if let Some(renderer) = renderer.as_mut() {
            let stage: Option<&mut dyn ComputeStage> = if *compute_initialised {
                Some(compute.as_mut())
            } else {
                None
            };
            renderer.tick(gpu.as_mut(), frame.as_ref(), stage)?;
        }
        Ok(())
    }

    // -- status --

    pub fn state(&self) -> PipelineState {
        match self.inner.lock() {
            Ok(inner) => PipelineState::derive(
                inner.app,
                inner.surface,
                inner.renderer.is_some(),
                inner.had_session,
            ),
            Err(_) => PipelineState::Uninitialized,
        }
    }

    pub fn app_state(&self) -> AppState {
        self.inner
            .lock()
            .map(|inner| inner.app)
            .unwrap_or_default()
    }

    pub fn surface_state(&self) -> SurfaceState {
        self.inner
            .lock()
            .map(|inner| inner.surface)
            .unwrap_or_default()
    }

    pub fn capture_size(&self) -> Option<CaptureSize> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.renderer.as_ref().map(|r| r.capture_size()))
    }

    /// Read back the current display target as tightly-packed RGBA8
    pub fn read_display(&self) -> PipelineResult<Vec<u8>> {
        let mut inner = self.lock()?;
        Ok(inner.gpu.read_display()?)
    }

    // -- internals --

    fn build_session(
        inner: &mut PipelineInner,
        signal: &Arc<FrameSignal>,
    ) -> PipelineResult<()> {
        inner.camera.open()?;
        let supported = inner.camera.enumerate_supported_sizes();
        let capture = select_capture_size(&supported, inner.options.target_size)
            .ok_or_else(|| PipelineError::Lifecycle("camera reports no capture sizes".into()))?;
        inner.camera.set_size(capture)?;

        let renderer = PipelineRenderer::new(
            inner.gpu.as_mut(),
            capture,
            inner.options.compute_textures,
            inner.options.log_fps,
        )?;
        if let Some(texture) = renderer.textures().camera_texture() {
            if let Err(e) = inner.camera.bind_output_surface(texture) {
                // Recoverable: the session comes up with a blank preview
                // rather than aborting.
                warn!(texture = %texture, error = %e, "Preview texture bind failed");
            }
        }

        let latch = Arc::clone(signal);
        inner
            .camera
            .set_frame_callback(Arc::new(move || latch.notify_frame()));
        inner.camera.start_streaming()?;
        inner.renderer = Some(renderer);
        inner.had_session = true;
        info!(capture = %capture, "Surface session established");
        Ok(())
    }

    /// Apply a new capture size, restarting the stream around it so the
    /// capture thread picks up the change
    fn apply_capture_size(inner: &mut PipelineInner, capture: CaptureSize) -> PipelineResult<()> {
        let was_streaming = inner.camera.is_streaming();
        if was_streaming {
            inner.camera.stop_streaming()?;
        }
        inner.camera.set_size(capture)?;
        if was_streaming {
            inner.camera.start_streaming()?;
        }
        debug!(capture = %capture, "Capture size re-applied");
        Ok(())
    }

    fn release_session(inner: &mut PipelineInner) {
        if inner.camera.is_streaming() {
            if let Err(e) = inner.camera.stop_streaming() {
                warn!(error = %e, "Failed to stop camera streaming");
            }
        }
        if inner.camera.is_open() {
            if let Err(e) = inner.camera.release() {
                warn!(error = %e, "Failed to release camera device");
            }
        }
        // The stage must let go of the texture handles before the textures
        // themselves are deleted.
        Self::teardown_compute(inner);
        if let Some(renderer) = inner.renderer.take() {
            renderer.release(inner.gpu.as_mut());
        }
    }

    fn maybe_init_compute(inner: &mut PipelineInner) {
        if inner.compute_initialised || inner.app.is_stopped() {
            return;
        }
        let PipelineInner {
            gpu,
            compute,
            renderer,
            ..
        } = &mut *inner;
        let Some(renderer) = renderer.as_ref() else {
            return;
        };
        let textures = renderer.textures();
        let (Some(input), Some(output)) = (textures.compute_input(), textures.compute_output())
        else {
            warn!("No compute textures available; stage left uninitialised");
            return;
        };
        let capture = renderer.capture_size();
        let binding = ComputeBinding {
            width: capture.width,
            height: capture.height,
            input,
            output,
            second_output: textures.second_output(),
        };
        match compute.init(gpu.as_mut(), &binding) {
            Ok(()) => {
                inner.compute_initialised = true;
                debug!("Compute stage initialised");
            }
            Err(e) => {
                // Preview keeps working without processing.
                warn!(error = %e, "Compute stage init failed; continuing without it");
            }
        }
    }

    fn teardown_compute(inner: &mut PipelineInner) {
        if !inner.compute_initialised {
            return;
        }
        let PipelineInner { gpu, compute, .. } = &mut *inner;
        if let Err(e) = compute.teardown(gpu.as_mut()) {
            warn!(error = %e, "Compute stage teardown failed");
        }
        inner.compute_initialised = false;
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            Self::release_session(&mut inner);
        }
    }
}
