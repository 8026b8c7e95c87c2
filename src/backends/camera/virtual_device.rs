// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera device producing synthetic frames
//!
//! Synthesizes RGBA gradient frames on a capture-loop thread at a fixed rate,
//! so the full pipeline runs headless for demos and tests. Behaves like a real
//! device: it must be opened before use, advertises sizes largest-first, and
//! invokes the frame callback from its own thread.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::types::{BackendError, BackendResult, CameraFrame, CaptureSize, FrameCallback};
use super::CameraDevice;
use crate::constants::{VIRTUAL_CAMERA_FRAME_INTERVAL_MS, VIRTUAL_CAMERA_SIZES};
use crate::gpu::TextureHandle;

/// Synthetic camera device
pub struct VirtualCamera {
    open: bool,
    size: Option<CaptureSize>,
    bound_texture: Option<TextureHandle>,
    callback: Option<FrameCallback>,
    /// Latest frame slot shared with the capture thread
    latest: Arc<Mutex<Option<CameraFrame>>>,
    loop_controller: Option<CaptureLoopController>,
    frame_interval: Duration,
}

impl VirtualCamera {
    /// Create a new virtual camera (closed until `open` is called)
    pub fn new() -> Self {
        Self {
            open: false,
            size: None,
            bound_texture: None,
            callback: None,
            latest: Arc::new(Mutex::new(None)),
            loop_controller: None,
            frame_interval: Duration::from_millis(VIRTUAL_CAMERA_FRAME_INTERVAL_MS),
        }
    }

    /// Override the frame interval (tests use a short interval)
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Generate one synthetic RGBA gradient frame
    fn synthesize(size: CaptureSize, sequence: u64) -> CameraFrame {
        let (w, h) = (size.width, size.height);
        let mut data = vec![0u8; (w * h * 4) as usize];
        let phase = (sequence % 256) as u8;
        for y in 0..h {
            for x in 0..w {
                let i = ((y * w + x) * 4) as usize;
                data[i] = (x * 255 / w.max(1)) as u8;
                data[i + 1] = (y * 255 / h.max(1)) as u8;
                data[i + 2] = phase;
                data[i + 3] = 255;
            }
        }
        CameraFrame::new(w, h, data, sequence)
    }
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for VirtualCamera {
    fn open(&mut self) -> BackendResult<()> {
        if self.open {
            return Err(BackendError::Busy);
        }
        info!("Opening virtual camera");
        self.open = true;
        Ok(())
    }

    fn enumerate_supported_sizes(&self) -> Vec<CaptureSize> {
        VIRTUAL_CAMERA_SIZES.to_vec()
    }

    fn set_size(&mut self, size: CaptureSize) -> BackendResult<()> {
        if !self.open {
            return Err(BackendError::NotOpen);
        }
        if !VIRTUAL_CAMERA_SIZES.contains(&size) {
            return Err(BackendError::InvalidSize(size.to_string()));
        }
        debug!(size = %size, "Applying capture size");
        self.size = Some(size);
        Ok(())
    }

    fn bind_output_surface(&mut self, texture: TextureHandle) -> BackendResult<()> {
        if !self.open {
            return Err(BackendError::NotOpen);
        }
        if !texture.is_valid() {
            return Err(BackendError::BindFailed(format!(
                "invalid texture handle {}",
                texture
            )));
        }
        debug!(texture = %texture, "Bound frame stream to external texture");
        self.bound_texture = Some(texture);
        Ok(())
    }

    fn set_frame_callback(&mut self, callback: FrameCallback) {
        self.callback = Some(callback);
    }

    fn start_streaming(&mut self) -> BackendResult<()> {
        if !self.open {
            return Err(BackendError::NotOpen);
        }
        if self.loop_controller.is_some() {
            debug!("Virtual camera already streaming");
            return Ok(());
        }
        let size = self.size.ok_or_else(|| {
            BackendError::InvalidSize("no capture size applied before streaming".into())
        })?;

        let latest = Arc::clone(&self.latest);
        let callback = self.callback.clone();
        let interval = self.frame_interval;
        let mut sequence: u64 = 0;

        info!(size = %size, "Starting virtual camera stream");
        self.loop_controller = Some(CaptureLoopController::start("virtual-camera", move || {
            std::thread::sleep(interval);
            let frame = VirtualCamera::synthesize(size, sequence);
            sequence += 1;
            *latest.lock().unwrap() = Some(frame);
            if let Some(cb) = &callback {
                cb();
            }
            LoopAction::Continue
        }));
        Ok(())
    }

    fn stop_streaming(&mut self) -> BackendResult<()> {
        if let Some(mut controller) = self.loop_controller.take() {
            info!("Stopping virtual camera stream");
            controller.stop();
        }
        Ok(())
    }

    fn latest_frame(&self) -> Option<CameraFrame> {
        self.latest.lock().unwrap().clone()
    }

    fn release(&mut self) -> BackendResult<()> {
        if !self.open {
            warn!("Releasing a virtual camera that was never opened");
        }
        self.stop_streaming()?;
        info!("Releasing virtual camera");
        self.open = false;
        self.size = None;
        self.bound_texture = None;
        self.latest.lock().unwrap().take();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_streaming(&self) -> bool {
        self.loop_controller
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    fn current_size(&self) -> Option<CaptureSize> {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn sizes_are_descending() {
        let cam = VirtualCamera::new();
        let sizes = cam.enumerate_supported_sizes();
        for pair in sizes.windows(2) {
            assert!(pair[0] > pair[1], "sizes must be ordered largest-first");
        }
    }

    #[test]
    fn operations_require_open_device() {
        let mut cam = VirtualCamera::new();
        assert_eq!(
            cam.set_size(CaptureSize::new(1280, 720)),
            Err(BackendError::NotOpen)
        );
        assert_eq!(cam.start_streaming(), Err(BackendError::NotOpen));
    }

    #[test]
    fn double_open_reports_busy() {
        let mut cam = VirtualCamera::new();
        cam.open().unwrap();
        assert_eq!(cam.open(), Err(BackendError::Busy));
    }

    #[test]
    fn streaming_delivers_frames_and_callbacks() {
        let mut cam = VirtualCamera::new().with_frame_interval(Duration::from_millis(1));
        cam.open().unwrap();
        cam.set_size(CaptureSize::new(320, 240)).unwrap();

        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        cam.set_frame_callback(Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        cam.start_streaming().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        cam.stop_streaming().unwrap();

        assert!(count.load(Ordering::SeqCst) > 0);
        let frame = cam.latest_frame().expect("a frame should be retained");
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.len(), 320 * 240 * 4);
    }

    #[test]
    fn release_clears_state() {
        let mut cam = VirtualCamera::new().with_frame_interval(Duration::from_millis(1));
        cam.open().unwrap();
        cam.set_size(CaptureSize::new(640, 480)).unwrap();
        cam.start_streaming().unwrap();
        cam.release().unwrap();

        assert!(!cam.is_open());
        assert!(!cam.is_streaming());
        assert!(cam.latest_frame().is_none());
        assert!(cam.current_size().is_none());
    }
}
