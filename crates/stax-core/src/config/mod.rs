//! Configuration management for StaX.
//!
//! Configuration is loaded from the platform config directory
//! (`config.toml`) and falls back to defaults when the file is absent.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure for StaX.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library-wide ingestion settings
    pub library: LibraryConfig,

    /// Sequence detection
    pub sequence: SequenceConfig,

    /// Thumbnails and clips
    pub preview: PreviewConfig,

    /// Animated GIF previews
    pub gif: GifConfig,

    /// External tools
    pub tools: ToolsConfig,

    /// Background preview workers
    pub workers: WorkersConfig,

    /// Pre/post ingest executables
    pub hooks: HooksConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.stax.stax/config.toml
    /// - Linux: ~/.config/stax/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\stax\stax\config\config.toml
    ///
    /// Falls back to ~/.stax/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "stax", "stax")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".stax").join("config.toml")
            })
    }

    /// Resolved preview directory (with ~ expansion).
    pub fn preview_dir(&self) -> PathBuf {
        expand(&self.library.preview_dir)
    }

    /// Resolved transcoder binary directory, if configured.
    pub fn ffmpeg_bin_dir(&self) -> Option<PathBuf> {
        self.tools.ffmpeg_bin_dir.as_deref().map(expand)
    }

    /// Resolved Blender override, if configured.
    pub fn blender_path(&self) -> Option<PathBuf> {
        self.tools.blender_path.as_deref().map(expand)
    }

    /// Sequence pattern key, `None` meaning "try every pattern".
    pub fn sequence_pattern(&self) -> Option<&str> {
        let key = self.sequence.pattern.trim_end_matches('\n');
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Wall-clock cap for transcoder invocations.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.command_timeout_secs)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
