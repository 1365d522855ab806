//! Sound catalog: identifiers, metadata, the built-in library and Freesound imports.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod freesound;
pub mod library;

pub use freesound::{FreesoundClient, FreesoundError, SearchParams, SearchResult, SortOrder};
pub use library::{CUSTOM_SOUNDS_KEY, SoundLibrary, default_sounds};

/// Catalog identifier of a sound, e.g. `rain` or `freesound_1234`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(String);

impl SoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SoundId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SoundId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SoundId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SoundId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Catalog grouping used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCategory {
    Nature,
    Ambient,
    White,
    Meditation,
}

impl SoundCategory {
    pub const ALL: [SoundCategory; 4] = [
        SoundCategory::Nature,
        SoundCategory::Ambient,
        SoundCategory::White,
        SoundCategory::Meditation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SoundCategory::Nature => "nature",
            SoundCategory::Ambient => "ambient",
            SoundCategory::White => "white",
            SoundCategory::Meditation => "meditation",
        }
    }

    /// Parse a lower-case category name.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for SoundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a sound on its origin site; Freesound uses numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
    Number(u64),
    Text(String),
}

/// Attribution for sounds imported from an external catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundSource {
    pub id: SourceRef,
    pub url: String,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A playable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sound {
    pub id: SoundId,
    pub name: String,
    pub category: SoundCategory,
    pub description: String,
    /// Root-relative path (`/sounds/...`) or absolute URL of the audio file.
    pub filepath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SoundSource>,
}
