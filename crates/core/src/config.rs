//! Startup configuration loaded from an optional `config.toml`.
//!
//! Every section falls back to its defaults when the file or a key is
//! missing. A present-but-unparseable file is an error: a misconfigured run
//! should fail loudly rather than start with settings the user did not ask
//! for.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub device: DeviceConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "glimmer".to_string(),
            width: 600,
            height: 500,
        }
    }
}

/// Physical-device selection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Rank of the GPU to use, counted from the best-scored candidate.
    /// Out-of-range values are rejected during device selection.
    pub index: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { index: 0 }
    }
}

/// Rendering settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Clear color as RGBA floats in `[0.0, 1.0]`.
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Debug settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Whether to enable the Vulkan validation layer.
    pub validation: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
        }
    }
}

impl Config {
    /// Load configuration from `config.toml` in the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults; a file that cannot be read or
    /// parsed is an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {:?}: {}", path, e)))?;

        info!("Loaded configuration from {:?}", path);
        debug!("Config: {:?}", config);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from_path("/nonexistent/glimmer/config.toml").unwrap();
        assert_eq!(config.window.width, 600);
        assert_eq!(config.window.height, 500);
        assert_eq!(config.window.title, "glimmer");
        assert_eq!(config.device.index, 0);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [device]
            index = 2

            [window]
            title = "custom"
            "#,
        )
        .unwrap();
        assert_eq!(config.device.index, 2);
        assert_eq!(config.window.title, "custom");
        // Unspecified keys keep their defaults.
        assert_eq!(config.window.width, 600);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn unparseable_file_is_a_config_error() {
        let path = std::env::temp_dir().join(format!(
            "glimmer-config-test-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[window\ntitle = ").unwrap();

        let result = Config::load_from_path(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn validation_default_follows_build_profile() {
        let config = Config::default();
        assert_eq!(config.debug.validation, cfg!(debug_assertions));
    }
}
