//! Fetching encoded sound bytes from disk or over HTTP.

use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use super::graph::GraphError;
use crate::catalog::SoundId;
use crate::http_client;

/// Largest sound file accepted from a remote location.
pub const MAX_SOUND_BYTES: usize = 64 * 1024 * 1024;

/// Errors raised while loading a sound into the engine.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading a local file failed.
    #[error("Failed to read {location}: {source}")]
    Fetch {
        /// Location as given by the caller.
        location: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A remote request failed or returned an error status.
    #[error("Failed to fetch {location}: {message}")]
    Http {
        /// Requested URL.
        location: String,
        /// Transport or status description.
        message: String,
    },
    /// The bytes were fetched but could not be decoded.
    #[error("Failed to decode sound {id}: {source}")]
    Decode {
        /// Sound being loaded.
        id: SoundId,
        /// Decoder failure reported by the graph.
        #[source]
        source: GraphError,
    },
    /// No audio graph could be opened.
    #[error("Audio engine unavailable: {0}")]
    Backend(String),
}

/// Where a sound's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundLocation {
    /// `http` or `https` URL.
    Remote(Url),
    /// Local file.
    File(PathBuf),
}

/// Resolve a catalog path or URL.
///
/// Root-relative paths such as `/sounds/nature/rain.mp3` resolve under
/// `root` when one is configured.
pub fn resolve(location: &str, root: Option<&Path>) -> SoundLocation {
    if let Ok(url) = Url::parse(location) {
        match url.scheme() {
            "http" | "https" => return SoundLocation::Remote(url),
            "file" => {
                if let Ok(path) = url.to_file_path() {
                    return SoundLocation::File(path);
                }
            }
            _ => {}
        }
    }
    let path = Path::new(location);
    match root {
        Some(root) if !root.as_os_str().is_empty() => {
            let relative = location.trim_start_matches(['/', '\\']);
            if path.is_absolute() && path.exists() {
                SoundLocation::File(path.to_path_buf())
            } else {
                SoundLocation::File(root.join(relative))
            }
        }
        _ => SoundLocation::File(path.to_path_buf()),
    }
}

/// Read the encoded bytes behind `location`.
pub fn fetch(location: &str, root: Option<&Path>) -> Result<Vec<u8>, LoadError> {
    match resolve(location, root) {
        SoundLocation::File(path) => std::fs::read(&path).map_err(|source| LoadError::Fetch {
            location: path.display().to_string(),
            source,
        }),
        SoundLocation::Remote(url) => {
            let response = http_client::agent()
                .get(url.as_str())
                .call()
                .map_err(|err| LoadError::Http {
                    location: location.to_string(),
                    message: http_client::describe_error(&err),
                })?;
            http_client::read_response_bytes(response, MAX_SOUND_BYTES).map_err(|err| {
                LoadError::Http {
                    location: location.to_string(),
                    message: err.to_string(),
                }
            })
        }
    }
}

/// Lower-cased file extension of a path or URL, used as a decoder hint.
pub fn extension_hint(location: &str) -> Option<String> {
    let path = match Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => url.path().to_string(),
        _ => location.to_string(),
    };
    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}
