// SPDX-License-Identifier: GPL-3.0-only

//! Capture size negotiation
//!
//! The camera reports its supported sizes largest-first; we want the
//! smallest size that still covers the target resolution in both
//! dimensions, falling back to the largest available when nothing covers
//! it. This keeps the offscreen textures as small as the display quality
//! allows.

use tracing::debug;

use crate::backends::camera::CaptureSize;

/// Pick a capture size from `supported` (largest-first) for `target`.
///
/// Walks the list until an entry falls below the target in either
/// dimension, then backs up one step. Returns `None` only for an empty
/// list.
pub fn select_capture_size(supported: &[CaptureSize], target: CaptureSize) -> Option<CaptureSize> {
    if supported.is_empty() {
        return None;
    }

    let mut chosen = 0;
    for (i, size) in supported.iter().enumerate() {
        if size.width < target.width || size.height < target.height {
            chosen = i.saturating_sub(1);
            break;
        }
        // Every entry covers the target; the last (smallest) wins.
        chosen = i;
    }

    let selected = supported[chosen];
    debug!(target = %target, selected = %selected, "Capture size negotiated");
    Some(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> Vec<CaptureSize> {
        vec![
            CaptureSize::new(1920, 1080),
            CaptureSize::new(1280, 720),
            CaptureSize::new(640, 480),
        ]
    }

    #[test]
    fn smallest_size_covering_target_wins() {
        let selected = select_capture_size(&sizes(), CaptureSize::new(800, 600));
        assert_eq!(selected, Some(CaptureSize::new(1280, 720)));
    }

    #[test]
    fn exact_match_is_selected() {
        let selected = select_capture_size(&sizes(), CaptureSize::new(1280, 720));
        assert_eq!(selected, Some(CaptureSize::new(1280, 720)));
    }

    #[test]
    fn oversized_target_falls_back_to_largest() {
        let selected = select_capture_size(&sizes(), CaptureSize::new(2000, 2000));
        assert_eq!(selected, Some(CaptureSize::new(1920, 1080)));
    }

    #[test]
    fn tiny_target_gets_smallest_size() {
        let selected = select_capture_size(&sizes(), CaptureSize::new(16, 16));
        assert_eq!(selected, Some(CaptureSize::new(640, 480)));
    }

    #[test]
    fn single_dimension_shortfall_backs_up() {
        // Height covers the target but width does not: still a shortfall.
        let supported = vec![CaptureSize::new(1920, 1080), CaptureSize::new(720, 1080)];
        let selected = select_capture_size(&supported, CaptureSize::new(1000, 900));
        assert_eq!(selected, Some(CaptureSize::new(1920, 1080)));
    }

    #[test]
    fn empty_list_yields_none() {
        assert_eq!(select_capture_size(&[], CaptureSize::new(1280, 720)), None);
    }
}
