// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::CaptureSize;

/// Default capture target requested from the camera before negotiation
pub const DEFAULT_CAPTURE_TARGET: CaptureSize = CaptureSize {
    width: 1280,
    height: 720,
};

/// Default display dimensions used until the surface reports its real size
pub const DEFAULT_DISPLAY_WIDTH: u32 = 1920;
pub const DEFAULT_DISPLAY_HEIGHT: u32 = 1080;

/// Number of offscreen compute textures allocated per surface.
///
/// The first is the compute stage's input (pass-1 render target), the second
/// its declared output, displayed directly by pass 2.
pub const DEFAULT_COMPUTE_TEXTURES: u32 = 2;

/// Frame interval for the virtual camera backend (~30 fps)
pub const VIRTUAL_CAMERA_FRAME_INTERVAL_MS: u64 = 33;

/// Width of the FPS measurement window in milliseconds
pub const FPS_WINDOW_MS: u64 = 1_000;

/// Capture sizes advertised by the virtual camera, largest first, matching
/// the ordering real devices report
pub const VIRTUAL_CAMERA_SIZES: [CaptureSize; 5] = [
    CaptureSize {
        width: 1920,
        height: 1080,
    },
    CaptureSize {
        width: 1280,
        height: 720,
    },
    CaptureSize {
        width: 800,
        height: 600,
    },
    CaptureSize {
        width: 640,
        height: 480,
    },
    CaptureSize {
        width: 320,
        height: 240,
    },
];
