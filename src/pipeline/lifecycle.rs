// SPDX-License-Identifier: GPL-3.0-only

//! Application and surface lifecycle tracking
//!
//! Two independent state machines drive the pipeline: the host application's
//! lifecycle (start/resume/pause/stop) and the render surface's lifecycle
//! (created/changed/destroyed). Neither implies the other; a surface can be
//! configured while the application is stopped and vice versa. All
//! render-gating decisions go through [`may_render`], which evaluates the
//! explicit product of the two machines:
//!
//! | app \ surface | `Destroyed` | `Created` | `Configured` |
//! |---------------|-------------|-----------|--------------|
//! | `Stopped`     | idle        | idle      | idle         |
//! | `Started`     | idle        | idle      | render       |
//! | `Resumed`     | idle        | idle      | render       |
//! | `Paused`      | idle        | idle      | render       |
//!
//! A paused application keeps rendering whatever frames still arrive; only a
//! stopped one goes dark. The compute stage is stricter: it is initialised
//! on application start and torn down on stop, so a surface configured while
//! stopped renders camera frames without the compute pass.

use std::fmt;

use tracing::{debug, warn};

/// Host application lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    /// Not running; compute resources are released
    #[default]
    Stopped,
    /// Visible but not yet in the foreground
    Started,
    /// Foreground and interactive
    Resumed,
    /// Backgrounded but not stopped
    Paused,
}

impl AppState {
    /// Apply a lifecycle event, returning whether the state changed.
    ///
    /// Out-of-order events from the host are tolerated: an invalid
    /// transition is logged and dropped rather than corrupting the machine.
    pub fn apply(&mut self, event: AppEvent) -> bool {
        let next = match (*self, event) {
            (AppState::Stopped, AppEvent::Start) => AppState::Started,
            (AppState::Started | AppState::Paused, AppEvent::Resume) => AppState::Resumed,
            (AppState::Resumed, AppEvent::Pause) => AppState::Paused,
            (_, AppEvent::Stop) => AppState::Stopped,
            (current, event) => {
                warn!(state = ?current, event = ?event, "Ignoring out-of-order app event");
                return false;
            }
        };
        if next == *self {
            return false;
        }
        debug!(from = ?*self, to = ?next, "App state transition");
        *self = next;
        true
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, AppState::Stopped)
    }
}

/// Host application lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Start,
    Resume,
    Pause,
    Stop,
}

/// Render surface lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    /// No surface; GPU session resources are released
    #[default]
    Destroyed,
    /// Surface exists but its dimensions are unknown
    Created,
    /// Surface has valid dimensions and can be rendered to
    Configured,
}

impl SurfaceState {
    pub fn is_configured(&self) -> bool {
        matches!(self, SurfaceState::Configured)
    }
}

impl fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceState::Destroyed => write!(f, "destroyed"),
            SurfaceState::Created => write!(f, "created"),
            SurfaceState::Configured => write!(f, "configured"),
        }
    }
}

/// Summary of the pipeline's overall condition for status reporting.
///
/// The two lifecycle machines plus the session history collapse into four
/// externally meaningful states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No surface session has ever been built
    Uninitialized,
    /// A session exists but rendering is gated off
    Ready,
    /// Ticks render frames to the display target
    Rendering,
    /// The last session has been released
    TornDown,
}

impl PipelineState {
    /// Derive the summary from the lifecycle product and session history.
    ///
    /// `has_session` is whether GPU/camera session resources currently
    /// exist; `had_session` is whether any session was ever built, which is
    /// what separates a fresh pipeline from a torn-down one.
    pub fn derive(
        app: AppState,
        surface: SurfaceState,
        has_session: bool,
        had_session: bool,
    ) -> Self {
        if has_session {
            if may_render(app, surface) {
                PipelineState::Rendering
            } else {
                PipelineState::Ready
            }
        } else if had_session {
            PipelineState::TornDown
        } else {
            PipelineState::Uninitialized
        }
    }
}

/// Render gate over the product of both lifecycles (see the module table)
pub fn may_render(app: AppState, surface: SurfaceState) -> bool {
    surface.is_configured() && !app.is_stopped()
}
