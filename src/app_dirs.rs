//! Where Harmoni keeps its files.
//!
//! Everything lives under one `.harmoni` folder in the OS config directory
//! (e.g. `~/.config/.harmoni`). `HARMONI_CONFIG_HOME` replaces the OS config
//! directory for portable setups and integration tests.

use std::path::PathBuf;
use std::sync::{LazyLock, Mutex, PoisonError};

use directories::BaseDirs;
use thiserror::Error;

/// Folder created under the config base.
pub const APP_DIR_NAME: &str = ".harmoni";
/// Environment variable overriding the config base.
pub const CONFIG_HOME_ENV: &str = "HARMONI_CONFIG_HOME";

static CONFIG_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum AppDirError {
    /// Neither an override nor an OS config directory is available.
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The `.harmoni` root, created on demand.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = config_base_dir().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// Rotating log files.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("logs"))
}

/// Saved mixes and custom sounds, one JSON file per storage key.
pub fn data_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("data"))
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn config_base_dir() -> Option<PathBuf> {
    let forced = CONFIG_BASE_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    forced
        .or_else(|| std::env::var_os(CONFIG_HOME_ENV).map(PathBuf::from))
        .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
}

/// Points the config base at a test directory until dropped.
///
/// Holds a process-wide lock so tests relying on the override do not interleave.
#[cfg(test)]
pub(crate) struct ConfigBaseGuard {
    _serial: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
impl ConfigBaseGuard {
    pub(crate) fn set(path: PathBuf) -> Self {
        static SERIAL: Mutex<()> = Mutex::new(());
        let serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        *CONFIG_BASE_OVERRIDE
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path);
        Self { _serial: serial }
    }
}

#[cfg(test)]
impl Drop for ConfigBaseGuard {
    fn drop(&mut self) {
        *CONFIG_BASE_OVERRIDE
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
