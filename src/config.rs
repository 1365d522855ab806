//! Persisted application settings stored as `config.toml` in the app directory.
//!
//! Config keys: `default_volume`, `share_origin`, `sounds_dir`,
//! `[audio_output]`, `[timer]`, `[freesound]`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::app_dirs;
use crate::audio::{AudioOutputConfig, clamp_volume};
use crate::timer::TimerSettings;

pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Origin used to build share links.
pub const DEFAULT_SHARE_ORIGIN: &str = "https://harmoni.app";
/// Volume a sound gets the first time it is played.
pub const DEFAULT_VOLUME: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No suitable config directory found")]
    NoConfigDir,
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Freesound credentials; both are empty until the user supplies them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreesoundSettings {
    pub api_key: String,
    pub client_id: String,
}

impl FreesoundSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub audio_output: AudioOutputConfig,
    pub default_volume: f32,
    pub share_origin: String,
    /// Directory that `/sounds/...` catalog paths resolve against.
    pub sounds_dir: Option<PathBuf>,
    pub timer: TimerSettings,
    pub freesound: FreesoundSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            audio_output: AudioOutputConfig::default(),
            default_volume: DEFAULT_VOLUME,
            share_origin: DEFAULT_SHARE_ORIGIN.to_string(),
            sounds_dir: None,
            timer: TimerSettings::default(),
            freesound: FreesoundSettings::default(),
        }
    }
}

impl AppSettings {
    /// Clamp volumes, drop a trailing `/` from the share origin and replace a
    /// zero timer duration with the default.
    pub fn normalized(mut self) -> Self {
        self.default_volume = clamp_volume(self.default_volume);
        let origin = self.share_origin.trim().trim_end_matches('/');
        self.share_origin = if origin.is_empty() {
            DEFAULT_SHARE_ORIGIN.to_string()
        } else {
            origin.to_string()
        };
        if self.timer.duration_minutes == 0 {
            self.timer.duration_minutes = TimerSettings::default().duration_minutes;
        }
        self
    }
}

/// `<app dir>/config.toml`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings, falling back to defaults when no file exists yet.
pub fn load_or_default() -> Result<AppSettings, ConfigError> {
    load_from_path(&config_path()?)
}

pub fn save(settings: &AppSettings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

pub fn load_from_path(path: &Path) -> Result<AppSettings, ConfigError> {
    if !path.exists() {
        return Ok(AppSettings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text)
        .map(AppSettings::normalized)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
}

pub fn save_to_path(settings: &AppSettings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Saved settings to {}", path.display());
    Ok(())
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}
