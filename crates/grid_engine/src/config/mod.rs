//! Application configuration
//!
//! A TOML file tunes the window, clear color, scene and device requirements.
//! A missing file falls back to compiled-in defaults; a malformed file is a
//! fatal configuration error.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::render::vulkan::DeviceRequirements;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path of the offending file
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The config file could not be parsed
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Path of the offending file
        path: String,
        /// Underlying TOML error
        source: toml::de::Error,
    },
}

/// Window settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in pixels
    pub width: u32,
    /// Initial height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Gridfall".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Render settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Clear color (RGBA)
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Demo scene settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Grid side length in cells
    pub grid_size: u16,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self { grid_size: 10 }
    }
}

/// Device capability requirements
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Only accept discrete GPUs
    pub require_discrete_gpu: bool,
    /// Require geometry shader support
    pub require_geometry_shader: bool,
    /// Require anisotropic sampling
    pub require_anisotropy: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let defaults = DeviceRequirements::default();
        Self {
            require_discrete_gpu: defaults.require_discrete_gpu,
            require_geometry_shader: defaults.require_geometry_shader,
            require_anisotropy: defaults.require_anisotropy,
        }
    }
}

impl DeviceConfig {
    /// Convert into the negotiator's requirement set
    pub fn requirements(&self) -> DeviceRequirements {
        DeviceRequirements {
            require_discrete_gpu: self.require_discrete_gpu,
            require_geometry_shader: self.require_geometry_shader,
            require_anisotropy: self.require_anisotropy,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Render settings
    pub render: RenderConfig,
    /// Demo scene settings
    pub scene: SceneConfig,
    /// Device capability requirements
    pub device: DeviceConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, defaulting when it is absent
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config file at {:?}; using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_window_size() {
        let config = AppConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.scene.grid_size, 10);
        assert_eq!(config.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn device_defaults_are_permissive_except_anisotropy() {
        let requirements = AppConfig::default().device.requirements();
        assert!(!requirements.require_discrete_gpu);
        assert!(!requirements.require_geometry_shader);
        assert!(requirements.require_anisotropy);
    }

    #[test]
    fn full_file_overrides_all_sections() {
        let config = AppConfig::parse(
            r#"
            [window]
            title = "Skirmish"
            width = 1280
            height = 720

            [render]
            clear_color = [0.1, 0.2, 0.3, 1.0]

            [scene]
            grid_size = 16

            [device]
            require_discrete_gpu = true
            require_geometry_shader = true
            require_anisotropy = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Skirmish");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.scene.grid_size, 16);
        assert_eq!(config.render.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert!(config.device.require_discrete_gpu);
        assert!(!config.device.requirements().require_anisotropy);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = AppConfig::parse("[window]\nwidth = 1024\n").unwrap();
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.scene.grid_size, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(AppConfig::parse("[window\nwidth = ").is_err());
    }
}
