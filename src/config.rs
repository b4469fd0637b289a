//! Engine configuration.
//!
//! Manages engine settings loaded from an INI configuration file. Provides
//! defaults for safe startup and a loader that keeps defaults for missing
//! values.
//!
//! # Configuration File Format
//!
//! ```ini
//! [display]
//! width = 640
//! height = 360
//!
//! [stage]
//! grid_w = 400
//! grid_h = 400
//! max_collisions = 3
//!
//! [loop]
//! frame_time_limit_ms = 100
//!
//! [physics]
//! gravity_x = 0.0
//! gravity_y = 980.0
//! ```

use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

use crate::error::EngineError;

/// Default safe values for startup
const DEFAULT_WIDTH: f32 = 640.0;
const DEFAULT_HEIGHT: f32 = 360.0;
const DEFAULT_GRID_W: f32 = 400.0;
const DEFAULT_GRID_H: f32 = 400.0;
const DEFAULT_MAX_COLLISIONS: u32 = 3;
const DEFAULT_FRAME_TIME_LIMIT_MS: f32 = 100.0;
const DEFAULT_GRAVITY_X: f32 = 0.0;
const DEFAULT_GRAVITY_Y: f32 = 9.8 * 100.0;
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

/// Engine configuration.
///
/// Stores display dimensions, broad-phase grid cell size, collision pass
/// limits, and the frame clock ceiling. On startup the host typically calls
/// [`EngineConfig::load_from_file`] and ignores the error to fall back on
/// defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Logical display width in world units.
    pub width: f32,
    /// Logical display height in world units.
    pub height: f32,
    /// Broad-phase grid cell width.
    pub grid_w: f32,
    /// Broad-phase grid cell height.
    pub grid_h: f32,
    /// Maximum collision resolution passes per `Stage::collide` call.
    pub max_collisions: u32,
    /// Ceiling on a single frame delta, in milliseconds. Deltas above this
    /// are truncated rather than allowing one giant step after a stall.
    pub frame_time_limit_ms: f32,
    /// World gravity applied by the platformer component.
    pub gravity_x: f32,
    pub gravity_y: f32,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            grid_w: DEFAULT_GRID_W,
            grid_h: DEFAULT_GRID_H,
            max_collisions: DEFAULT_MAX_COLLISIONS,
            frame_time_limit_ms: DEFAULT_FRAME_TIME_LIMIT_MS,
            gravity_x: DEFAULT_GRAVITY_X,
            gravity_y: DEFAULT_GRAVITY_Y,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), EngineError> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| EngineError::Config(e.to_string()))?;

        // [display] section
        if let Some(width) = config.getfloat("display", "width").ok().flatten() {
            self.width = width as f32;
        }
        if let Some(height) = config.getfloat("display", "height").ok().flatten() {
            self.height = height as f32;
        }

        // [stage] section
        if let Some(w) = config.getfloat("stage", "grid_w").ok().flatten() {
            self.grid_w = w as f32;
        }
        if let Some(h) = config.getfloat("stage", "grid_h").ok().flatten() {
            self.grid_h = h as f32;
        }
        if let Some(max) = config.getuint("stage", "max_collisions").ok().flatten() {
            self.max_collisions = max as u32;
        }

        // [loop] section
        if let Some(limit) = config.getfloat("loop", "frame_time_limit_ms").ok().flatten() {
            self.frame_time_limit_ms = limit as f32;
        }

        // [physics] section
        if let Some(gx) = config.getfloat("physics", "gravity_x").ok().flatten() {
            self.gravity_x = gx as f32;
        }
        if let Some(gy) = config.getfloat("physics", "gravity_y").ok().flatten() {
            self.gravity_y = gy as f32;
        }

        info!("Loaded engine config from {}", self.config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let config = EngineConfig::new();
        assert_eq!(config.grid_w, 400.0);
        assert_eq!(config.grid_h, 400.0);
        assert_eq!(config.max_collisions, 3);
        assert_eq!(config.frame_time_limit_ms, 100.0);
    }

    #[test]
    fn missing_file_is_an_error_and_leaves_defaults() {
        let mut config = EngineConfig::with_path("./definitely-not-here.ini");
        assert!(config.load_from_file().is_err());
        assert_eq!(config.width, 640.0);
        assert_eq!(config.height, 360.0);
    }
}
