//! Application configuration.
//!
//! Settings are read from a TOML file when one exists; every field has
//! a default so the renderer runs without any configuration on disk.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Window settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Aurora".to_string(),
        }
    }
}

/// Asset path settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory containing compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
    /// Optional glTF scene to load at startup.
    pub model: Option<PathBuf>,
    /// Optional directory containing six cubemap face images
    /// (posx/negx/posy/negy/posz/negz).
    pub skybox_dir: Option<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders/spirv"),
            model: None,
            skybox_dir: None,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window settings.
    pub window: WindowConfig,
    /// Force validation layers on or off; unset follows the build profile.
    pub validation: Option<bool>,
    /// Asset paths.
    pub assets: AssetConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config =
            toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads configuration from a TOML file, falling back to defaults
    /// when the file is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                debug!("No usable config at {} ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Whether validation layers should be enabled for this run.
    pub fn validation_enabled(&self) -> bool {
        self.validation.unwrap_or(cfg!(debug_assertions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_config() {
        let config = WindowConfig::default();
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.title, "Aurora");
    }

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();
        assert!(config.validation.is_none());
        assert_eq!(config.assets.shader_dir, PathBuf::from("shaders/spirv"));
        assert!(config.assets.model.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"
            validation = true

            [window]
            width = 800
            height = 600
            title = "Test"

            [assets]
            shader_dir = "out/shaders"
            model = "assets/scene.gltf"
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "Test");
        assert_eq!(config.validation, Some(true));
        assert_eq!(config.assets.shader_dir, PathBuf::from("out/shaders"));
        assert_eq!(config.assets.model, Some(PathBuf::from("assets/scene.gltf")));
    }

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let text = r#"
            [window]
            width = 1920
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.window.title, "Aurora");
        assert!(config.assets.skybox_dir.is_none());
    }

    #[test]
    fn test_validation_follows_build_profile_when_unset() {
        let config = AppConfig::default();
        assert_eq!(config.validation_enabled(), cfg!(debug_assertions));

        let forced = AppConfig {
            validation: Some(true),
            ..Default::default()
        };
        assert!(forced.validation_enabled());
    }
}
