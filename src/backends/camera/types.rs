// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Result type for camera backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Camera backend errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No camera devices found
    DeviceNotFound(String),
    /// Camera initialization/open failed
    InitializationFailed(String),
    /// Camera is busy or in use by another process
    Busy,
    /// The device rejected the requested capture size
    InvalidSize(String),
    /// Binding the output surface/texture failed
    BindFailed(String),
    /// Operation requires an open device
    NotOpen,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::InitializationFailed(msg) => {
                write!(f, "Initialization failed: {}", msg)
            }
            BackendError::Busy => write!(f, "Camera is busy"),
            BackendError::InvalidSize(msg) => write!(f, "Invalid capture size: {}", msg),
            BackendError::BindFailed(msg) => write!(f, "Preview bind failed: {}", msg),
            BackendError::NotOpen => write!(f, "Camera is not open"),
        }
    }
}

impl std::error::Error for BackendError {}

/// A capture resolution reported by or requested from a camera device.
///
/// Ordered lexicographically by width, then height, which matches the
/// largest-first ordering devices use when enumerating supported sizes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CaptureSize {
    /// Resolution width in pixels
    pub width: u32,
    /// Resolution height in pixels
    pub height: u32,
}

impl CaptureSize {
    /// Create a new capture size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if this size is at least as large as `other` in both dimensions
    pub fn dominates(&self, other: &CaptureSize) -> bool {
        self.width >= other.width && self.height >= other.height
    }

    /// Number of pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for CaptureSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single camera frame in RGBA format.
///
/// The pixel payload is reference counted so the capture thread and the
/// render thread can share the latest frame without copying.
#[derive(Clone)]
pub struct CameraFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGBA pixel data, `width * height * 4` bytes
    pub data: Arc<[u8]>,
    /// Capture timestamp
    pub timestamp: Instant,
    /// Monotonic frame sequence number assigned by the device
    pub sequence: u64,
}

impl CameraFrame {
    /// Create a frame from raw RGBA bytes
    pub fn new(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Size of the frame payload in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the frame payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Callback invoked on the capture thread whenever a new frame is available.
///
/// The callback must be cheap: it typically just latches a frame-pending flag
/// and requests a redraw. Heavy work belongs on the render thread.
pub type FrameCallback = Arc<dyn Fn() + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_size_ordering_is_lexicographic() {
        let a = CaptureSize::new(1920, 1080);
        let b = CaptureSize::new(1280, 720);
        let c = CaptureSize::new(1280, 1024);
        assert!(a > b);
        assert!(c > b);
        assert!(a > c);
    }

    #[test]
    fn capture_size_domination() {
        let big = CaptureSize::new(1280, 720);
        let target = CaptureSize::new(800, 600);
        assert!(big.dominates(&target));
        assert!(!target.dominates(&big));
        // Equal sizes dominate each other
        assert!(target.dominates(&target));
        // Wider but shorter does not dominate
        let wide = CaptureSize::new(1920, 480);
        assert!(!wide.dominates(&target));
    }

    #[test]
    fn camera_frame_is_shared_without_copy() {
        let frame = CameraFrame::new(2, 2, vec![0u8; 16], 7);
        let clone = frame.clone();
        assert!(Arc::ptr_eq(&frame.data, &clone.data));
        assert_eq!(clone.sequence, 7);
        assert_eq!(clone.len(), 16);
    }
}
