// SPDX-License-Identifier: GPL-3.0-only

//! Cross-thread frame-ready signalling
//!
//! The capture thread calls [`FrameSignal::notify_frame`] whenever a new
//! frame lands; the render thread calls [`FrameSignal::consume`] at the top
//! of each tick. The flag is a single atomic, so any number of notifications
//! between ticks collapse into one upload of the newest frame. That collapse
//! is deliberate: the preview only ever wants the latest image, and it keeps
//! the capture thread from ever blocking on the renderer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Callback asking the host to schedule a render tick
pub type RedrawRequest = Box<dyn Fn() + Send>;

/// Latch between the capture and render threads
#[derive(Default)]
pub struct FrameSignal {
    pending: AtomicBool,
    redraw: Mutex<Option<RedrawRequest>>,
}

impl FrameSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a new frame available and ask the host for a render tick.
    ///
    /// Callable from any thread. Multiple calls before the next `consume`
    /// collapse into one pending frame.
    pub fn notify_frame(&self) {
        self.pending.store(true, Ordering::Release);
        if let Ok(guard) = self.redraw.lock() {
            if let Some(request) = guard.as_ref() {
                request();
            }
        }
    }

    /// Clear the latch, returning whether a frame was pending.
    ///
    /// Render-thread side of the handshake; consuming an idle latch is a
    /// harmless no-op returning `false`.
    pub fn consume(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// True if a frame arrived since the last `consume`
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Install the host's redraw scheduler, replacing any previous one
    pub fn set_redraw_request(&self, request: Option<RedrawRequest>) {
        if let Ok(mut guard) = self.redraw.lock() {
            *guard = request;
        }
    }
}

impl std::fmt::Debug for FrameSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSignal")
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn notifications_collapse_into_one_pending_frame() {
        let signal = FrameSignal::new();
        signal.notify_frame();
        signal.notify_frame();
        signal.notify_frame();

        assert!(signal.consume());
        // Second consume sees the collapsed (already drained) latch
        assert!(!signal.consume());
    }

    #[test]
    fn consume_on_idle_latch_is_false() {
        let signal = FrameSignal::new();
        assert!(!signal.is_pending());
        assert!(!signal.consume());
    }

    #[test]
    fn each_notify_invokes_the_redraw_request() {
        let signal = FrameSignal::new();
        let redraws = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&redraws);
        signal.set_redraw_request(Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        signal.notify_frame();
        signal.notify_frame();
        assert_eq!(redraws.load(Ordering::SeqCst), 2);

        // Removing the scheduler stops redraw requests but not the latch
        signal.set_redraw_request(None);
        signal.notify_frame();
        assert_eq!(redraws.load(Ordering::SeqCst), 2);
        assert!(signal.is_pending());
    }

    #[test]
    fn signal_is_shareable_across_threads() {
        let signal = Arc::new(FrameSignal::new());
        let producer = Arc::clone(&signal);
        let handle = std::thread::spawn(move || {
            for _ in 0..100 {
                producer.notify_frame();
            }
        });
        handle.join().unwrap();
        assert!(signal.consume());
    }
}
