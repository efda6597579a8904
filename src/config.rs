// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every field has a default, so a missing file or a partial file still
// produces a usable configuration. The defaults reproduce the classic
// "Hello triangle" bootstrap: 800x600 fixed-size window, Vulkan 1.0,
// integrated GPU with geometry shader support.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::physical::{DeviceFilter, DeviceKind, DeviceRequirements};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub instance: InstanceConfig,
    pub device: DeviceConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "VulkanApp".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Values reported to the driver through `VkApplicationInfo`
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub application_name: String,
    pub engine_name: String,
    pub api_version: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            application_name: "Hello triangle".to_string(),
            engine_name: "No Engine".to_string(),
            api_version: "1.0".to_string(),
        }
    }
}

/// Physical device requirements
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// "integrated", "discrete", "virtual", "cpu", "other" or "any"
    pub device_type: String,
    pub require_geometry_shader: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: "integrated".to_string(),
            require_geometry_shader: true,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    /// Also forward INFO and VERBOSE messages from the validation layers
    pub verbose: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            verbose: false,
            log_level: "info".to_string(),
        }
    }
}

/// Where the active configuration came from. Loading happens before the
/// logger exists, so this is reported once logging is up.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    /// The file exists but could not be used; defaults are in effect
    Fallback(anyhow::Error),
}

impl ConfigSource {
    pub fn report(&self) {
        match self {
            ConfigSource::File(path) => log::info!("Loaded configuration from {:?}", path),
            ConfigSource::Missing(path) => {
                log::info!("Config file not found at {:?}, using defaults", path)
            }
            ConfigSource::Fallback(e) => {
                log::warn!("Failed to load config: {:#}. Using defaults.", e)
            }
        }
    }
}

impl Config {
    /// Load config.toml, falling back to defaults if missing or broken
    pub fn load() -> (Self, ConfigSource) {
        Self::load_or_default("config.toml")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, ConfigSource) {
        let path = path.as_ref();
        match Self::load_from_path(path) {
            Ok(Some(config)) => (config, ConfigSource::File(path.to_path_buf())),
            Ok(None) => (Config::default(), ConfigSource::Missing(path.to_path_buf())),
            Err(e) => (Config::default(), ConfigSource::Fallback(e)),
        }
    }

    /// Load configuration from a specific path. `None` if there is no file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(Some(config))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the requested API version as a packed Vulkan version
    pub fn get_api_version(&self) -> u32 {
        match self.instance.api_version.trim() {
            "1.0" => vk::API_VERSION_1_0,
            "1.1" => vk::API_VERSION_1_1,
            "1.2" => vk::API_VERSION_1_2,
            "1.3" => vk::API_VERSION_1_3,
            other => {
                log::warn!("Unknown API version '{}', defaulting to 1.0", other);
                vk::API_VERSION_1_0
            }
        }
    }

    /// Get the physical device requirements
    pub fn get_device_requirements(&self) -> DeviceRequirements {
        let device_type = DeviceFilter::parse(&self.device.device_type).unwrap_or_else(|| {
            log::warn!(
                "Unknown device type '{}', defaulting to integrated",
                self.device.device_type
            );
            DeviceFilter::Only(DeviceKind::Integrated)
        });

        DeviceRequirements {
            device_type,
            geometry_shader: self.device.require_geometry_shader,
        }
    }

    /// Validation layers are only honoured in debug builds
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hello_triangle() {
        let config = Config::default();
        assert_eq!(config.window.title, "VulkanApp");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert!(!config.window.resizable);
        assert_eq!(config.instance.application_name, "Hello triangle");
        assert_eq!(config.instance.engine_name, "No Engine");
        assert_eq!(config.get_api_version(), vk::API_VERSION_1_0);

        let req = config.get_device_requirements();
        assert_eq!(req.device_type, DeviceFilter::Only(DeviceKind::Integrated));
        assert!(req.geometry_shader);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 1024

            [device]
            device_type = "discrete"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "VulkanApp");
        assert_eq!(
            config.get_device_requirements().device_type,
            DeviceFilter::Only(DeviceKind::Discrete)
        );
        assert!(config.device.require_geometry_shader);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml_str("[window]\nwidth = \"wide\"").is_err());
        assert!(Config::from_toml_str("[window").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = "definitely/not/here/config.toml";
        assert!(Config::load_from_path(path).unwrap().is_none());

        let (config, source) = Config::load_or_default(path);
        assert_eq!(config.window.width, 800);
        assert!(matches!(source, ConfigSource::Missing(p) if p == Path::new(path)));
    }

    #[test]
    fn broken_file_falls_back_with_error() {
        let path = std::env::temp_dir().join(format!("vk-bootstrap-{}-broken.toml", std::process::id()));
        std::fs::write(&path, "[window\nwidth=").unwrap();

        let (config, source) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.width, 800);
        match source {
            ConfigSource::Fallback(e) => {
                assert!(format!("{:#}", e).contains("Failed to parse config file"))
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn valid_file_is_used() {
        let path = std::env::temp_dir().join(format!("vk-bootstrap-{}-valid.toml", std::process::id()));
        std::fs::write(&path, "[window]\ntitle = \"Bootstrap\"\n").unwrap();

        let (config, source) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.title, "Bootstrap");
        assert!(matches!(source, ConfigSource::File(p) if p == path));
    }

    #[test]
    fn api_version_parsing() {
        let mut config = Config::default();
        config.instance.api_version = "1.2".to_string();
        assert_eq!(config.get_api_version(), vk::API_VERSION_1_2);

        config.instance.api_version = " 1.3 ".to_string();
        assert_eq!(config.get_api_version(), vk::API_VERSION_1_3);

        config.instance.api_version = "2.0".to_string();
        assert_eq!(config.get_api_version(), vk::API_VERSION_1_0);
    }

    #[test]
    fn any_device_type_drops_type_requirement() {
        let config = Config::from_toml_str(
            r#"
            [device]
            device_type = "ANY"
            require_geometry_shader = false
            "#,
        )
        .unwrap();

        let req = config.get_device_requirements();
        assert_eq!(req.device_type, DeviceFilter::Any);
        assert!(!req.geometry_shader);
    }

    #[test]
    fn unknown_device_type_falls_back_to_integrated() {
        let mut config = Config::default();
        config.device.device_type = "quantum".to_string();
        assert_eq!(
            config.get_device_requirements().device_type,
            DeviceFilter::Only(DeviceKind::Integrated)
        );
    }
}
