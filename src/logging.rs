//! Tracing setup: human output on stderr plus a per-launch log file.
//!
//! Log files are named `harmoni_<timestamp>.log` under the app's `logs`
//! folder and only the most recent ones are kept.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs;

const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "harmoni";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log directory unavailable: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log filename time: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Install the global subscriber. `default_directive` applies when `RUST_LOG`
/// is unset. Later calls are no-ops; returns the log file path on first init.
pub fn init(default_directive: &str) -> Result<Option<PathBuf>, LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(None);
    }

    let log_dir = app_dirs::logs_dir()?;
    let file_name = log_file_name(now_local_or_utc())?;
    let log_path = log_dir.join(&file_name);
    touch(&log_path)?;
    prune_old_logs(&log_dir, MAX_LOG_FILES)?;

    let (file_writer, guard) = tracing_appender::non_blocking(rolling::never(&log_dir, file_name));
    let timer = local_timer();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_timer(timer.clone())
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = LOG_GUARD.set(guard);

    tracing::info!("Logging to {}", log_path.display());
    Ok(Some(log_path))
}

fn touch(path: &Path) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Delete the oldest `.log` files until at most `keep` remain.
fn prune_old_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let read = fs::read_dir(dir).map_err(|source| LoggingError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut logs: Vec<(SystemTime, PathBuf)> = read
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "log"))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();
    if logs.len() <= keep {
        return Ok(());
    }
    logs.sort_by_key(|(modified, _)| *modified);
    let excess = logs.len() - keep;
    for (_, path) in logs.drain(..excess) {
        fs::remove_file(&path).map_err(|source| LoggingError::RemoveFile { path, source })?;
    }
    Ok(())
}

fn log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    Ok(format!("{LOG_FILE_PREFIX}_{}.log", now.format(NAME_FORMAT)?))
}

fn local_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};
    use tempfile::tempdir;

    #[test]
    fn log_file_name_is_prefixed_and_timestamped() {
        let fixed = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(log_file_name(fixed).unwrap(), "harmoni_2023-11-14_22-13-20.log");
    }

    #[test]
    fn pruning_keeps_newest_logs_and_ignores_other_files() {
        let dir = tempdir().unwrap();
        for idx in 0..12 {
            touch(&dir.path().join(format!("harmoni_{idx:02}.log"))).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        prune_old_logs(dir.path(), 10).unwrap();
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 11);
        assert!(!names.contains(&"harmoni_00.log".to_string()));
        assert!(!names.contains(&"harmoni_01.log".to_string()));
        assert!(names.contains(&"notes.txt".to_string()));
    }
}
