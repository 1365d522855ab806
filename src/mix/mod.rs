//! Sound mixes: persisted presets, the shareable token codec and sharing.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::SoundId;

pub mod codec;
pub mod library;
pub mod share;
pub mod store;

pub use codec::{MixDecodeError, decode, encode, extract_from_url, shareable_url, strip_mix_param, try_decode};
pub use library::{MixLibrary, apply_mix};
pub use share::{Clipboard, ShareError, ShareOutcome, SharePayload, ShareSurface, share};
pub use store::{JsonFileStore, KeyValueStore, MIXES_KEY, MemoryStore, MixStore, StoreError};

/// Identifier of a saved mix, `mix_<uuid>` for mixes created locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MixId(String);

impl MixId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(format!("mix_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MixId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MixId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Per-sound entry of a mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundSetting {
    pub sound_id: SoundId,
    pub volume: f32,
    pub enabled: bool,
}

impl SoundSetting {
    pub fn new(sound_id: impl Into<SoundId>, volume: f32, enabled: bool) -> Self {
        Self {
            sound_id: sound_id.into(),
            volume,
            enabled,
        }
    }
}

/// A named, persisted preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundMix {
    pub id: MixId,
    pub name: String,
    pub sounds: Vec<SoundSetting>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SoundMix {
    /// The portable subset carried by share tokens.
    pub fn to_shared(&self) -> SharedMix {
        SharedMix {
            name: self.name.clone(),
            sounds: self.sounds.clone(),
        }
    }
}

/// Mix content decoded from a share token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedMix {
    pub name: String,
    pub sounds: Vec<SoundSetting>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let a = MixId::generate();
        let b = MixId::generate();
        assert!(a.as_str().starts_with("mix_"));
        assert_ne!(a, b);
    }

    #[test]
    fn mix_json_uses_iso_timestamps_and_camel_case() {
        let json = r#"{
            "id": "mix_1",
            "name": "Rainy Cafe",
            "sounds": [{"soundId": "rain", "volume": 0.5, "enabled": true}],
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-02T10:00:00.000Z"
        }"#;
        let mix: SoundMix = serde_json::from_str(json).unwrap();
        assert_eq!(mix.sounds[0].sound_id.as_str(), "rain");
        assert!(mix.updated_at > mix.created_at);
        let value = serde_json::to_value(&mix).unwrap();
        assert_eq!(value["createdAt"], "2024-03-01T10:00:00Z");
        assert_eq!(value["sounds"][0]["soundId"], "rain");
    }
}
