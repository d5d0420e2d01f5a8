//! Configuration file support for the frame scrubber.
//!
//! This module provides serialization and deserialization of user settings:
//! buffering parameters, playback rate, overlay appearance and log level.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FPS, DEFAULT_MASK_ALPHA, DEFAULT_MAX_CACHE, DEFAULT_PREFETCH_CONCURRENCY,
    DEFAULT_PREFETCH_RADIUS, MAX_FPS, MIN_FPS,
};
use crate::state::BufferConfig;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Frame buffering
    #[serde(default)]
    pub buffer: BufferSettings,

    /// Playback
    #[serde(default)]
    pub playback: PlaybackSettings,

    /// Mask overlay appearance
    #[serde(default)]
    pub overlay: OverlaySettings,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Buffering section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferSettings {
    /// Frames to decode ahead of the cursor
    #[serde(default = "default_prefetch_radius")]
    pub prefetch_radius: usize,

    /// Frames kept on each side of the cursor
    #[serde(default = "default_max_cache")]
    pub max_cache: usize,

    /// Decodes per prefetch batch
    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,
}

fn default_prefetch_radius() -> usize {
    DEFAULT_PREFETCH_RADIUS
}

fn default_max_cache() -> usize {
    DEFAULT_MAX_CACHE
}

fn default_prefetch_concurrency() -> usize {
    DEFAULT_PREFETCH_CONCURRENCY
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            prefetch_radius: default_prefetch_radius(),
            max_cache: default_max_cache(),
            prefetch_concurrency: default_prefetch_concurrency(),
        }
    }
}

/// Playback section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self { fps: default_fps() }
    }
}

/// Overlay section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Mask translucency (0.0-1.0)
    #[serde(default = "default_mask_alpha")]
    pub mask_alpha: f32,

    /// Draw prompt markers over the frame
    #[serde(default = "default_show_prompts")]
    pub show_prompts: bool,
}

fn default_mask_alpha() -> f32 {
    DEFAULT_MASK_ALPHA
}

fn default_show_prompts() -> bool {
    true
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            mask_alpha: default_mask_alpha(),
            show_prompts: default_show_prompts(),
        }
    }
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            buffer: BufferSettings::default(),
            playback: PlaybackSettings::default(),
            overlay: OverlaySettings::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Runtime buffering parameters, sanitized.
    pub fn to_buffer_config(&self) -> BufferConfig {
        BufferConfig {
            prefetch_radius: self.buffer.prefetch_radius,
            max_cache: self.buffer.max_cache,
            prefetch_concurrency: self.buffer.prefetch_concurrency.max(1),
            fps: self.playback.fps.clamp(MIN_FPS, MAX_FPS),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "framescrub-config.json"
    }

    /// Get the default config file path for auto-load/save.
    /// Returns None on WASM (no filesystem access).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("framescrub").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("framescrub")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to a file, creating parent directories.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save(&path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.to_buffer_config(), BufferConfig::default());
        assert_eq!(config.overlay.mask_alpha, 0.4);
        assert!(config.overlay.show_prompts);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = AppConfig::new();
        config.buffer.prefetch_radius = 12;
        config.playback.fps = 24;
        config.log_level = LogLevel::Debug;

        let json = config.to_json().unwrap();
        assert!(json.contains("\"log_level\": \"debug\""));
        assert_eq!(AppConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = AppConfig::from_json(r#"{"version": 1, "buffer": {"max_cache": 30}}"#).unwrap();
        assert_eq!(config.buffer.max_cache, 30);
        assert_eq!(config.buffer.prefetch_radius, DEFAULT_PREFETCH_RADIUS);
        assert_eq!(config.playback.fps, DEFAULT_FPS);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let result = AppConfig::from_json(r#"{"version": 99}"#);
        assert!(matches!(
            result,
            Err(ConfigError::VersionTooNew {
                file_version: 99,
                ..
            })
        ));
    }

    #[test]
    fn test_buffer_config_is_sanitized() {
        let mut config = AppConfig::new();
        config.buffer.prefetch_concurrency = 0;
        config.playback.fps = 500;
        let buffer = config.to_buffer_config();
        assert_eq!(buffer.prefetch_concurrency, 1);
        assert_eq!(buffer.fps, MAX_FPS);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("framescrub-config-{}", std::process::id()));
        let path = dir.join("nested").join(AppConfig::default_filename());

        let mut config = AppConfig::new();
        config.overlay.show_prompts = false;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
