//! Engine configuration (`tasweave.toml`)
//!
//! Settings are stored in TOML format in the platform-specific config
//! directory, or loaded from an explicit path. Missing sections and keys
//! fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "tasweave.toml";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Script file settings
    #[serde(default)]
    pub script: ScriptConfig,
    /// Playback settings
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Hot-reload settings
    #[serde(default)]
    pub reload: ReloadConfig,
}

/// Script file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Extension appended to `Read` targets (default: "tas")
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Speed of `***` markers without an explicit speed (default: 400)
    #[serde(default = "default_fast_forward_speed")]
    pub default_fast_forward_speed: u32,
    /// Host ticks per second, used when formatting times (default: 60)
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// How long an abort notice stays on screen (default: 2.0)
    #[serde(default = "default_abort_notice_secs")]
    pub abort_notice_secs: f32,
}

/// How tracked files are judged fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Freshness {
    /// Stale whenever a modification time differs
    #[default]
    ModifiedTime,
    /// Stale when the modification time differs and the bytes changed too
    ContentHash,
}

/// Hot-reload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReloadConfig {
    /// Freshness check (default: modified-time)
    #[serde(default)]
    pub freshness: Freshness,
}

fn default_extension() -> String {
    "tas".to_string()
}
fn default_fast_forward_speed() -> u32 {
    400
}
fn default_tick_rate() -> u32 {
    60
}
fn default_abort_notice_secs() -> f32 {
    2.0
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_fast_forward_speed: default_fast_forward_speed(),
            tick_rate: default_tick_rate(),
            abort_notice_secs: default_abort_notice_secs(),
        }
    }
}

/// Error loading an explicit config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Tasweave\config`
/// On macOS: `~/Library/Application Support/io.tasweave.Tasweave`
/// On Linux: `~/.config/tasweave`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.tasweave", "", "Tasweave")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> EngineConfig {
    config_dir()
        .and_then(|dir| std::fs::read_to_string(dir.join(CONFIG_FILE)).ok())
        .and_then(|content| toml::from_str(&content).ok())
        .unwrap_or_default()
}

/// Loads the configuration from an explicit file.
///
/// Unlike [`load`], a missing or malformed file is an error.
pub fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.script.extension, "tas");
        assert_eq!(config.playback.default_fast_forward_speed, 400);
        assert_eq!(config.playback.tick_rate, 60);
        assert_eq!(config.reload.freshness, Freshness::ModifiedTime);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [playback]
            default_fast_forward_speed = 100

            [reload]
            freshness = "content-hash"
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.default_fast_forward_speed, 100);
        assert_eq!(config.playback.tick_rate, 60);
        assert_eq!(config.script.extension, "tas");
        assert_eq!(config.reload.freshness, Freshness::ContentHash);
    }

    #[test]
    fn test_load_from_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert!(matches!(load_from(&path), Err(ConfigError::Io { .. })));

        std::fs::write(&path, "[script]\nextension = 5\n").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse { .. })));

        std::fs::write(&path, "[script]\nextension = \"txt\"\n").unwrap();
        assert_eq!(load_from(&path).unwrap().script.extension, "txt");
    }
}
