//! Key-value persistence for saved mixes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{MixId, SoundMix, SoundSetting};

/// Storage key holding the JSON array of saved mixes.
pub const MIXES_KEY: &str = "harmoni_sound_mixes";

/// Errors raised by key-value stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Keys become file names, so only a restricted alphabet is accepted.
    #[error("Invalid store key {0:?}")]
    InvalidKey(String),
    #[error("Unable to create store directory {path}: {source}")]
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
    #[error("Invalid JSON under {key}: {source}")]
    Parse {
        key: String,
        source: serde_json::Error,
    },
    #[error("Failed to serialize {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

/// String values addressed by key, in the manner of browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, value).map_err(|source| StoreError::Write { path, source })
    }
}

/// In-memory store; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Saved mixes persisted as one JSON array under [`MIXES_KEY`].
#[derive(Debug, Clone)]
pub struct MixStore<S> {
    store: S,
}

impl<S: KeyValueStore> MixStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// All saved mixes; unreadable or corrupt storage yields an empty list.
    pub fn saved_mixes(&self) -> Vec<SoundMix> {
        match self.load() {
            Ok(mixes) => mixes,
            Err(err) => {
                warn!("Failed to load saved mixes: {err}");
                Vec::new()
            }
        }
    }

    /// Persist a new mix with a fresh id.
    pub fn save_mix(
        &self,
        name: &str,
        sounds: Vec<SoundSetting>,
    ) -> Result<SoundMix, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mix = SoundMix {
            id: MixId::generate(),
            name: name.to_string(),
            sounds,
            created_at: now,
            updated_at: now,
        };
        let mut mixes = self.saved_mixes();
        mixes.push(mix.clone());
        self.persist(&mixes)?;
        info!(id = %mix.id, "Saved mix {:?}", mix.name);
        Ok(mix)
    }

    /// Store a mix received from elsewhere as a new local mix.
    pub fn import_mix(
        &self,
        name: &str,
        sounds: Vec<SoundSetting>,
    ) -> Result<SoundMix, StoreError> {
        self.save_mix(name, sounds)
    }

    /// Replace name and sounds of an existing mix; `None` when the id is unknown.
    pub fn update_mix(
        &self,
        id: &MixId,
        name: &str,
        sounds: Vec<SoundSetting>,
    ) -> Result<Option<SoundMix>, StoreError> {
        let mut mixes = self.saved_mixes();
        let Some(mix) = mixes.iter_mut().find(|mix| &mix.id == id) else {
            return Ok(None);
        };
        mix.name = name.to_string();
        mix.sounds = sounds;
        mix.updated_at = OffsetDateTime::now_utc();
        let updated = mix.clone();
        self.persist(&mixes)?;
        Ok(Some(updated))
    }

    /// Remove a mix; `false` when the id is unknown.
    pub fn delete_mix(&self, id: &MixId) -> Result<bool, StoreError> {
        let mut mixes = self.saved_mixes();
        let before = mixes.len();
        mixes.retain(|mix| &mix.id != id);
        if mixes.len() == before {
            return Ok(false);
        }
        self.persist(&mixes)?;
        Ok(true)
    }

    fn load(&self) -> Result<Vec<SoundMix>, StoreError> {
        let Some(text) = self.store.get(MIXES_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Parse {
            key: MIXES_KEY.to_string(),
            source,
        })
    }

    fn persist(&self, mixes: &[SoundMix]) -> Result<(), StoreError> {
        let text = serde_json::to_string(mixes).map_err(|source| StoreError::Serialize {
            key: MIXES_KEY.to_string(),
            source,
        })?;
        self.store.set(MIXES_KEY, &text)
    }
}
