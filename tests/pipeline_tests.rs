// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline tests over recording fakes
//!
//! These drive [`FramePipeline`] through realistic lifecycle sequences with
//! a fake GPU context, a fake camera, and an instrumented compute stage, and
//! assert on the recorded operation order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hdr_preview::backends::camera::{
    BackendError, BackendResult, CameraDevice, CameraFrame, CaptureSize, FrameCallback,
};
use hdr_preview::compute::{ComputeBinding, ComputeResult, ComputeStage};
use hdr_preview::gpu::{
    DrawPass, FramebufferHandle, GpuContext, GpuError, GpuResult, ProgramHandle, TextureFilter,
    TextureHandle, TextureKey,
};
use hdr_preview::pipeline::{AppState, FramePipeline, PipelineOptions, PipelineState, SurfaceState};

/// Shared operation log all fakes append to, so cross-component ordering
/// can be asserted
type OpLog = Arc<Mutex<Vec<String>>>;

fn log(ops: &OpLog, entry: impl Into<String>) {
    ops.lock().unwrap().push(entry.into());
}

fn index_of(ops: &[String], needle: &str) -> usize {
    ops.iter()
        .position(|op| op.starts_with(needle))
        .unwrap_or_else(|| panic!("operation {:?} not recorded in {:?}", needle, ops))
}

// -- fake GPU --

#[derive(Default)]
struct FakeGpuState {
    next: u64,
    keys: HashMap<TextureKey, TextureHandle>,
    live_textures: Vec<TextureHandle>,
    live_framebuffers: Vec<FramebufferHandle>,
    live_programs: Vec<ProgramHandle>,
    fail_compile: bool,
    display: (u32, u32),
}

struct FakeGpu {
    ops: OpLog,
    state: FakeGpuState,
}

impl FakeGpu {
    fn new(ops: OpLog) -> Self {
        Self {
            ops,
            state: FakeGpuState {
                next: 0,
                display: (1920, 1080),
                ..Default::default()
            },
        }
    }

    fn failing_compiler(ops: OpLog) -> Self {
        let mut gpu = Self::new(ops);
        gpu.state.fail_compile = true;
        gpu
    }

    fn mint(&mut self, key: TextureKey) -> TextureHandle {
        let FakeGpuState {
            next,
            keys,
            live_textures,
            ..
        } = &mut self.state;
        let handle = *keys.entry(key).or_insert_with(|| {
            *next += 1;
            TextureHandle::from_raw(*next)
        });
        live_textures.push(handle);
        handle
    }
}

impl GpuContext for FakeGpu {
    fn create_external_texture(&mut self, key: TextureKey) -> GpuResult<TextureHandle> {
        let handle = self.mint(key);
        log(&self.ops, format!("create_external:{}", handle));
        Ok(handle)
    }

    fn create_texture_2d(
        &mut self,
        key: TextureKey,
        width: u32,
        height: u32,
        _filter: TextureFilter,
    ) -> GpuResult<TextureHandle> {
        let handle = self.mint(key);
        log(&self.ops, format!("create_2d:{}:{}x{}", handle, width, height));
        Ok(handle)
    }

    fn create_framebuffer(&mut self, color: TextureHandle) -> GpuResult<FramebufferHandle> {
        if !self.state.live_textures.contains(&color) {
            return Err(GpuError::InvalidHandle(color.to_string()));
        }
        self.state.next += 1;
        let handle = FramebufferHandle::from_raw(self.state.next);
        self.state.live_framebuffers.push(handle);
        log(&self.ops, format!("create_fb:{}", handle));
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) -> GpuResult<()> {
        let before = self.state.live_textures.len();
        self.state.live_textures.retain(|t| *t != texture);
        if self.state.live_textures.len() == before {
            return Err(GpuError::InvalidHandle(texture.to_string()));
        }
        log(&self.ops, format!("delete_texture:{}", texture));
        Ok(())
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) -> GpuResult<()> {
        self.state.live_framebuffers.retain(|f| *f != framebuffer);
        log(&self.ops, format!("delete_fb:{}", framebuffer));
        Ok(())
    }

    fn resolve(&self, key: TextureKey) -> Option<TextureHandle> {
        self.state.keys.get(&key).copied()
    }

    fn compile_program(
        &mut self,
        label: &str,
        _vertex_src: &str,
        _fragment_src: &str,
    ) -> GpuResult<ProgramHandle> {
        if self.state.fail_compile {
            return Err(GpuError::ShaderCompile {
                stage: "fragment".into(),
                log: "forced failure".into(),
            });
        }
        self.state.next += 1;
        let handle = ProgramHandle::from_raw(self.state.next);
        self.state.live_programs.push(handle);
        log(&self.ops, format!("compile:{}:{}", label, handle));
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) -> GpuResult<()> {
        self.state.live_programs.retain(|p| *p != program);
        log(&self.ops, format!("delete_program:{}", program));
        Ok(())
    }

    fn import_camera_frame(
        &mut self,
        texture: TextureHandle,
        frame: &CameraFrame,
    ) -> GpuResult<()> {
        log(
            &self.ops,
            format!("import:{}:seq{}", texture, frame.sequence),
        );
        Ok(())
    }

    fn set_display_size(&mut self, width: u32, height: u32) {
        self.state.display = (width, height);
        log(&self.ops, format!("set_display:{}x{}", width, height));
    }

    fn display_size(&self) -> (u32, u32) {
        self.state.display
    }

    fn draw_quad(&mut self, pass: &DrawPass) -> GpuResult<()> {
        let target = match pass.target {
            Some(fb) => fb.to_string(),
            None => "display".to_string(),
        };
        log(
            &self.ops,
            format!("draw:{}->{}:{}", pass.source, target, pass.program),
        );
        Ok(())
    }

    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle) -> GpuResult<()> {
        log(&self.ops, format!("copy:{}->{}", src, dst));
        Ok(())
    }

    fn finish(&mut self) -> GpuResult<()> {
        log(&self.ops, "finish");
        Ok(())
    }

    fn flush(&mut self) {
        log(&self.ops, "flush");
    }

    fn poll_errors(&mut self) -> GpuResult<()> {
        Ok(())
    }

    fn read_display(&mut self) -> GpuResult<Vec<u8>> {
        Ok(vec![0; 16])
    }
}

// -- fake camera --

#[derive(Default)]
struct FakeCameraState {
    open: bool,
    streaming: bool,
    opens: u32,
    releases: u32,
    size: Option<CaptureSize>,
    bound: Option<TextureHandle>,
}

struct FakeCamera {
    ops: OpLog,
    state: Arc<Mutex<FakeCameraState>>,
    callback: Option<FrameCallback>,
    frame: Option<CameraFrame>,
    fail_bind: bool,
}

impl FakeCamera {
    fn new(ops: OpLog) -> (Self, Arc<Mutex<FakeCameraState>>) {
        let state = Arc::new(Mutex::new(FakeCameraState::default()));
        (
            Self {
                ops,
                state: Arc::clone(&state),
                callback: None,
                frame: None,
                fail_bind: false,
            },
            state,
        )
    }
}

impl CameraDevice for FakeCamera {
    fn open(&mut self) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.open {
            return Err(BackendError::Busy);
        }
        state.open = true;
        state.opens += 1;
        log(&self.ops, "camera_open");
        Ok(())
    }

    fn enumerate_supported_sizes(&self) -> Vec<CaptureSize> {
        vec![
            CaptureSize::new(1920, 1080),
            CaptureSize::new(1280, 720),
            CaptureSize::new(640, 480),
        ]
    }

    fn set_size(&mut self, size: CaptureSize) -> BackendResult<()> {
        self.state.lock().unwrap().size = Some(size);
        // One frame is "produced" as soon as the size is known.
        self.frame = Some(CameraFrame::new(
            size.width,
            size.height,
            vec![0u8; (size.width * size.height * 4) as usize],
            1,
        ));
        Ok(())
    }

    fn bind_output_surface(&mut self, texture: TextureHandle) -> BackendResult<()> {
        if self.fail_bind {
            return Err(BackendError::BindFailed("forced bind failure".into()));
        }
        self.state.lock().unwrap().bound = Some(texture);
        log(&self.ops, format!("camera_bind:{}", texture));
        Ok(())
    }

    fn set_frame_callback(&mut self, callback: FrameCallback) {
        self.callback = Some(callback);
    }

    fn start_streaming(&mut self) -> BackendResult<()> {
        self.state.lock().unwrap().streaming = true;
        log(&self.ops, "camera_start");
        Ok(())
    }

    fn stop_streaming(&mut self) -> BackendResult<()> {
        self.state.lock().unwrap().streaming = false;
        log(&self.ops, "camera_stop");
        Ok(())
    }

    fn latest_frame(&self) -> Option<CameraFrame> {
        self.frame.clone()
    }

    fn release(&mut self) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        state.open = false;
        state.releases += 1;
        log(&self.ops, "camera_release");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn is_streaming(&self) -> bool {
        self.state.lock().unwrap().streaming
    }

    fn current_size(&self) -> Option<CaptureSize> {
        self.state.lock().unwrap().size
    }
}

// -- instrumented compute stage --

#[derive(Default)]
struct ComputeCounters {
    inits: u32,
    processes: u32,
    teardowns: u32,
    bindings: Vec<ComputeBinding>,
}

struct InstrumentedCompute {
    ops: OpLog,
    counters: Arc<Mutex<ComputeCounters>>,
    seen_handles: Arc<Mutex<Vec<(TextureHandle, TextureHandle)>>>,
}

impl InstrumentedCompute {
    fn new(
        ops: OpLog,
    ) -> (
        Self,
        Arc<Mutex<ComputeCounters>>,
        Arc<Mutex<Vec<(TextureHandle, TextureHandle)>>>,
    ) {
        let counters = Arc::new(Mutex::new(ComputeCounters::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                ops,
                counters: Arc::clone(&counters),
                seen_handles: Arc::clone(&seen),
            },
            counters,
            seen,
        )
    }
}

impl ComputeStage for InstrumentedCompute {
    fn init(&mut self, _gpu: &mut dyn GpuContext, binding: &ComputeBinding) -> ComputeResult<()> {
        let mut counters = self.counters.lock().unwrap();
        counters.inits += 1;
        counters.bindings.push(*binding);
        log(&self.ops, "compute_init");
        Ok(())
    }

    fn process(
        &mut self,
        _gpu: &mut dyn GpuContext,
        input: TextureHandle,
        output: TextureHandle,
    ) -> ComputeResult<()> {
        self.counters.lock().unwrap().processes += 1;
        self.seen_handles.lock().unwrap().push((input, output));
        log(&self.ops, "compute_process");
        Ok(())
    }

    fn teardown(&mut self, _gpu: &mut dyn GpuContext) -> ComputeResult<()> {
        self.counters.lock().unwrap().teardowns += 1;
        log(&self.ops, "compute_teardown");
        Ok(())
    }
}

// -- harness --

struct Harness {
    pipeline: FramePipeline,
    ops: OpLog,
    camera_state: Arc<Mutex<FakeCameraState>>,
    compute_counters: Arc<Mutex<ComputeCounters>>,
    compute_handles: Arc<Mutex<Vec<(TextureHandle, TextureHandle)>>>,
}

fn harness() -> Harness {
    build_harness(false, false)
}

fn build_harness(fail_compile: bool, fail_bind: bool) -> Harness {
    let ops: OpLog = Arc::new(Mutex::new(Vec::new()));
    let gpu = if fail_compile {
        FakeGpu::failing_compiler(Arc::clone(&ops))
    } else {
        FakeGpu::new(Arc::clone(&ops))
    };
    let (mut camera, camera_state) = FakeCamera::new(Arc::clone(&ops));
    camera.fail_bind = fail_bind;
    let (compute, compute_counters, compute_handles) = InstrumentedCompute::new(Arc::clone(&ops));
    let pipeline = FramePipeline::new(
        Box::new(gpu),
        Box::new(camera),
        Box::new(compute),
        PipelineOptions {
            target_size: CaptureSize::new(1280, 720),
            compute_textures: 2,
            log_fps: false,
        },
    );
    Harness {
        pipeline,
        ops,
        camera_state,
        compute_counters,
        compute_handles,
    }
}

fn bring_up(h: &Harness) {
    h.pipeline.on_app_start().unwrap();
    h.pipeline.on_app_resume().unwrap();
    h.pipeline.on_surface_created().unwrap();
    h.pipeline.on_surface_changed(1920, 1080).unwrap();
}

#[test]
fn surface_creation_negotiates_and_starts_streaming() {
    let h = harness();
    bring_up(&h);

    assert_eq!(h.pipeline.capture_size(), Some(CaptureSize::new(1280, 720)));
    assert!(h.camera_state.lock().unwrap().streaming);
    assert!(h.camera_state.lock().unwrap().bound.is_some());
    assert_eq!(h.pipeline.state(), PipelineState::Rendering);
}

#[test]
fn tick_runs_the_two_pass_protocol_in_order() {
    let h = harness();
    bring_up(&h);
    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();

    let ops = h.ops.lock().unwrap().clone();
    let import = index_of(&ops, "import:");
    let pass1 = index_of(&ops, "draw:");
    let finish = index_of(&ops, "finish");
    let process = index_of(&ops, "compute_process");
    let pass2 = ops
        .iter()
        .position(|op| op.starts_with("draw:") && op.contains("->display"))
        .unwrap();
    let flush = index_of(&ops, "flush");

    assert!(import < pass1, "frame import precedes pass 1");
    assert!(pass1 < finish, "pass 1 precedes the GPU wait");
    assert!(finish < process, "compute runs only after the GPU wait");
    assert!(process < pass2, "pass 2 displays the compute output");
    assert!(pass2 < flush, "flush closes the tick");
}

#[test]
fn compute_sees_distinct_input_and_output_handles() {
    let h = harness();
    bring_up(&h);
    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();

    let seen = h.compute_handles.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let (input, output) = seen[0];
    assert_ne!(input, output);
}

#[test]
fn collapsed_notifications_import_one_frame() {
    let h = harness();
    bring_up(&h);
    let signal = h.pipeline.frame_signal();
    for _ in 0..5 {
        signal.notify_frame();
    }
    h.pipeline.render_tick().unwrap();
    // A tick with no pending frame redraws without importing
    h.pipeline.render_tick().unwrap();

    let ops = h.ops.lock().unwrap().clone();
    let imports = ops.iter().filter(|op| op.starts_with("import:")).count();
    assert_eq!(imports, 1, "burst of notifications collapses to one import");
}

#[test]
fn destroy_then_recreate_keeps_handles_stable() {
    let h = harness();
    bring_up(&h);
    let bound_first = h.camera_state.lock().unwrap().bound;

    h.pipeline.on_surface_destroyed().unwrap();
    assert_eq!(h.pipeline.surface_state(), SurfaceState::Destroyed);
    assert!(!h.camera_state.lock().unwrap().open);

    h.pipeline.on_surface_created().unwrap();
    h.pipeline.on_surface_changed(1920, 1080).unwrap();
    let bound_second = h.camera_state.lock().unwrap().bound;

    // The recreated camera texture carries the same handle value
    assert_eq!(bound_first, bound_second);

    let state = h.camera_state.lock().unwrap();
    assert_eq!(state.opens, 2);
    assert_eq!(state.releases, 1);
    assert_eq!(h.pipeline.state(), PipelineState::Rendering);

    // The stage was torn down before the first session's textures were
    // deleted, then re-initialised against the same handle values
    let counters = h.compute_counters.lock().unwrap();
    assert_eq!(counters.teardowns, 1);
    assert_eq!(counters.inits, 2);
    assert_eq!(counters.bindings[0], counters.bindings[1]);
}

#[test]
fn ticks_are_gated_until_both_lifecycles_allow_rendering() {
    let h = harness();
    h.pipeline.on_app_start().unwrap();
    // No surface yet: the tick is a no-op
    h.pipeline.render_tick().unwrap();
    assert!(h.ops.lock().unwrap().iter().all(|op| !op.starts_with("draw:")));

    h.pipeline.on_surface_created().unwrap();
    // Created but not configured: still gated
    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();
    assert!(h.ops.lock().unwrap().iter().all(|op| !op.starts_with("draw:")));

    h.pipeline.on_surface_changed(800, 600).unwrap();
    // The frame that arrived while gated is rendered by the first open tick
    h.pipeline.render_tick().unwrap();
    let ops = h.ops.lock().unwrap().clone();
    assert!(ops.iter().any(|op| op.starts_with("import:")));
}

#[test]
fn compute_init_is_deferred_until_app_start() {
    let h = harness();
    // Surface comes up while the app is stopped
    h.pipeline.on_surface_created().unwrap();
    h.pipeline.on_surface_changed(1920, 1080).unwrap();
    assert_eq!(h.compute_counters.lock().unwrap().inits, 0);

    // Stopped app renders nothing and never touches the compute stage
    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();
    assert_eq!(h.compute_counters.lock().unwrap().processes, 0);

    h.pipeline.on_app_start().unwrap();
    assert_eq!(h.compute_counters.lock().unwrap().inits, 1);

    h.pipeline.render_tick().unwrap();
    assert_eq!(h.compute_counters.lock().unwrap().processes, 1);
}

#[test]
fn app_stop_tears_down_the_compute_stage() {
    let h = harness();
    bring_up(&h);
    assert_eq!(h.compute_counters.lock().unwrap().inits, 1);

    h.pipeline.on_app_stop().unwrap();
    assert_eq!(h.compute_counters.lock().unwrap().teardowns, 1);
    assert_eq!(h.pipeline.app_state(), AppState::Stopped);

    // Subsequent ticks are gated; the stage is never called again
    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();
    assert_eq!(h.compute_counters.lock().unwrap().processes, 0);
}

#[test]
fn paused_app_keeps_rendering() {
    let h = harness();
    bring_up(&h);
    h.pipeline.on_app_pause().unwrap();

    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();
    assert_eq!(h.compute_counters.lock().unwrap().processes, 1);
}

#[test]
fn surface_changed_renegotiates_capture_size() {
    let h = harness();
    bring_up(&h);
    // Bring-up's surface-changed already renegotiated against 1920x1080
    assert_eq!(
        h.camera_state.lock().unwrap().size,
        Some(CaptureSize::new(1920, 1080))
    );

    h.pipeline.on_surface_changed(600, 400).unwrap();

    let state = h.camera_state.lock().unwrap();
    assert_eq!(
        state.size,
        Some(CaptureSize::new(640, 480)),
        "surface-changed must apply a size negotiated for the new dimensions"
    );
    assert!(state.streaming, "stream restarts around the size change");
}

#[test]
fn surface_changed_with_matching_size_leaves_the_stream_alone() {
    let h = harness();
    bring_up(&h);
    let restarts_before = h
        .ops
        .lock()
        .unwrap()
        .iter()
        .filter(|op| *op == "camera_start")
        .count();

    // 1920x1080 is already applied; no stop/start churn
    h.pipeline.on_surface_changed(1920, 1080).unwrap();
    let restarts_after = h
        .ops
        .lock()
        .unwrap()
        .iter()
        .filter(|op| *op == "camera_start")
        .count();
    assert_eq!(restarts_before, restarts_after);
}

#[test]
fn preview_bind_failure_keeps_the_session_alive() {
    let h = build_harness(false, true);
    bring_up(&h);

    {
        let state = h.camera_state.lock().unwrap();
        assert!(state.bound.is_none());
        assert!(state.streaming, "streaming starts despite the failed bind");
    }
    assert_eq!(h.pipeline.state(), PipelineState::Rendering);

    // Ticks keep running with a blank preview
    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();
}

#[test]
fn state_summary_tracks_session_history() {
    let h = harness();
    assert_eq!(h.pipeline.state(), PipelineState::Uninitialized);

    bring_up(&h);
    assert_eq!(h.pipeline.state(), PipelineState::Rendering);

    // Session alive but gated
    h.pipeline.on_app_stop().unwrap();
    assert_eq!(h.pipeline.state(), PipelineState::Ready);

    h.pipeline.on_surface_destroyed().unwrap();
    assert_eq!(h.pipeline.state(), PipelineState::TornDown);
}

#[test]
fn destroy_without_create_is_harmless() {
    let h = harness();
    h.pipeline.on_surface_destroyed().unwrap();
    assert_eq!(h.pipeline.surface_state(), SurfaceState::Destroyed);
    assert_eq!(h.camera_state.lock().unwrap().releases, 0);
}

#[test]
fn shader_failure_degrades_instead_of_failing() {
    let h = build_harness(true, false);
    bring_up(&h);

    // Session comes up despite dead programs and ticks stay error-free
    h.pipeline.frame_signal().notify_frame();
    h.pipeline.render_tick().unwrap();
    assert_eq!(h.pipeline.state(), PipelineState::Rendering);
}

#[test]
fn dropping_the_pipeline_releases_the_camera() {
    let h = harness();
    bring_up(&h);
    let camera_state = Arc::clone(&h.camera_state);
    drop(h);
    assert!(!camera_state.lock().unwrap().open);
    assert_eq!(camera_state.lock().unwrap().releases, 1);
}
