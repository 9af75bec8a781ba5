// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tool configuration loaded from the config directory.
//!
//! The directory defaults to `~/.config/garmin-to-fittrackee` and can be
//! overridden with `GARMIN_TO_FITTRACKEE_CONFIG_DIR` (a `.env` file is honoured).

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "GARMIN_TO_FITTRACKEE_CONFIG_DIR";

/// Tool config file name inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub garmin: GarminConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory holding the SQLite file
    #[serde(default = "default_data_dir")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GarminConfig {
    /// Directory holding the Garmin session tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Where downloaded tracks are written before upload
    #[serde(default = "env::temp_dir")]
    pub track_dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "garmin-to-fittrackee")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".local/share/garmin-to-fittrackee"))
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_data_dir(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            track_dir: env::temp_dir(),
        }
    }
}

/// Resolve the config directory.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dotenvy::dotenv().ok(); // Load .env file if present

    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDirectory)
}

impl Config {
    /// Load `config.toml` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(path.clone(), e.to_string()))?;
        Self::from_toml(&raw).map_err(|e| ConfigError::Parse(path, e))
    }

    /// Load `config.toml`, falling back to defaults when it does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        match Self::load(dir) {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::Io(dir.to_path_buf(), e.to_string()))?;
        let path = dir.join(CONFIG_FILE);
        let raw =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(path.clone(), e.to_string()))?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::Io(path, e.to_string()))
    }

    /// Garmin token directory, defaulting to `<config dir>/garmintoken`.
    pub fn garmin_token_dir(&self, config_dir: &Path) -> PathBuf {
        self.garmin
            .token_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("garmintoken"))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to access {}: {}", .0.display(), .1)]
    Io(PathBuf, String),

    #[error("Invalid configuration in {}: {}", .0.display(), .1)]
    Parse(PathBuf, String),

    #[error("Could not determine the home directory; set GARMIN_TO_FITTRACKEE_CONFIG_DIR")]
    NoHomeDirectory,
}
