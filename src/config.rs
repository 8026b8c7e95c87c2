// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_CAPTURE_TARGET, DEFAULT_COMPUTE_TEXTURES};
use crate::errors::{PipelineError, PipelineResult};

/// Persistent preview settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Desired capture width; negotiated against the camera's supported list
    pub target_width: u32,
    /// Desired capture height
    pub target_height: u32,
    /// Offscreen compute textures (1 = in-place stage, 2 = separate output)
    pub compute_textures: u32,
    /// Log the preview frame rate once per second
    pub log_fps: bool,
    /// Render only when a frame arrives instead of on a fixed interval
    pub demand_driven: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_CAPTURE_TARGET.width,
            target_height: DEFAULT_CAPTURE_TARGET.height,
            compute_textures: DEFAULT_COMPUTE_TEXTURES,
            log_fps: true,
            demand_driven: true,
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hdr-preview").join("config.json"))
    }

    /// Load from the user config directory; any problem falls back to
    /// defaults so a corrupt file never blocks startup
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Config>(&data) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded");
                    config.validated()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config; using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Write to the user config directory, creating it if needed
    pub fn save(&self) -> PipelineResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| PipelineError::Config("no config directory available".into()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        fs::write(&path, data)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Clamp out-of-range values instead of rejecting the file
    pub fn validated(mut self) -> Self {
        if self.target_width == 0 || self.target_height == 0 {
            warn!(
                width = self.target_width,
                height = self.target_height,
                "Invalid capture target in config; using default"
            );
            self.target_width = DEFAULT_CAPTURE_TARGET.width;
            self.target_height = DEFAULT_CAPTURE_TARGET.height;
        }
        let clamped = self.compute_textures.clamp(1, 2);
        if clamped != self.compute_textures {
            warn!(
                requested = self.compute_textures,
                "Compute texture count out of range; clamping"
            );
            self.compute_textures = clamped;
        }
        self
    }
}
