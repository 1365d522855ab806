//! Freesound API client and conversion of results into catalog sounds.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::{Sound, SoundCategory, SoundId, SoundSource, SourceRef};
use crate::http_client;

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://freesound.org/apiv2";
const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
const DESCRIPTION_LIMIT: usize = 120;

const NATURE_TAGS: &[&str] = &["nature", "rain", "water", "forest", "wind", "thunder", "birds"];
const AMBIENT_TAGS: &[&str] = &["ambient", "background", "cafe", "fireplace", "city"];
const WHITE_TAGS: &[&str] = &["noise", "white", "pink", "brown"];
const MEDITATION_TAGS: &[&str] = &["meditation", "zen", "yoga", "bowl", "chant", "om"];

#[derive(Debug, Error)]
pub enum FreesoundError {
    /// Non-success status from the API.
    #[error("Freesound API error: {status} {status_text}")]
    Status { status: u16, status_text: String },
    #[error("Freesound request failed: {0}")]
    Transport(String),
    #[error("Failed to read Freesound response: {0}")]
    Read(#[from] std::io::Error),
    #[error("Invalid Freesound response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid Freesound URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result ordering accepted by the text search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Score,
    DurationDesc,
    DurationAsc,
    CreatedDesc,
    CreatedAsc,
    DownloadsDesc,
    DownloadsAsc,
    RatingDesc,
    RatingAsc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Score => "score",
            SortOrder::DurationDesc => "duration_desc",
            SortOrder::DurationAsc => "duration_asc",
            SortOrder::CreatedDesc => "created_desc",
            SortOrder::CreatedAsc => "created_asc",
            SortOrder::DownloadsDesc => "downloads_desc",
            SortOrder::DownloadsAsc => "downloads_asc",
            SortOrder::RatingDesc => "rating_desc",
            SortOrder::RatingAsc => "rating_asc",
        }
    }
}

/// Text search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub filter: Option<String>,
    pub sort: Option<SortOrder>,
    pub fields: Vec<String>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Query string pairs in request order. Zero pages and sizes are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("query", self.query.clone())];
        if let Some(page) = self.page.filter(|page| *page > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = self.page_size.filter(|size| *size > 0) {
            pairs.push(("page_size", size.to_string()));
        }
        if let Some(filter) = self.filter.as_ref().filter(|filter| !filter.is_empty()) {
            pairs.push(("filter", filter.clone()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        if !self.fields.is_empty() {
            pairs.push(("fields", self.fields.join(",")));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Previews {
    #[serde(rename = "preview-hq-mp3", default)]
    pub hq_mp3: String,
    #[serde(rename = "preview-lq-mp3", default)]
    pub lq_mp3: String,
    #[serde(rename = "preview-hq-ogg", default)]
    pub hq_ogg: String,
    #[serde(rename = "preview-lq-ogg", default)]
    pub lq_ogg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Images {
    #[serde(default)]
    pub waveform_m: String,
    #[serde(default)]
    pub waveform_l: String,
    #[serde(default)]
    pub spectral_m: String,
    #[serde(default)]
    pub spectral_l: String,
}

/// A sound as described by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreesoundSoundInfo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub previews: Previews,
    #[serde(default)]
    pub images: Images,
    /// Only present for OAuth2 sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<FreesoundSoundInfo>,
}

/// Token-authenticated API client.
#[derive(Debug, Clone)]
pub struct FreesoundClient {
    api_key: String,
    client_id: String,
    base_url: String,
}

impl FreesoundClient {
    pub fn new(api_key: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client_id: client_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another API root, e.g. a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn search(&self, params: &SearchParams) -> Result<SearchResult, FreesoundError> {
        let url = self.search_url(params)?;
        debug!(%url, "Freesound search");
        let result: SearchResult = self.get_json(url.as_str())?;
        info!(
            "Freesound search {:?} returned {} of {} results",
            params.query,
            result.results.len(),
            result.count
        );
        Ok(result)
    }

    pub fn sound_info(&self, id: u64) -> Result<FreesoundSoundInfo, FreesoundError> {
        self.get_json(&format!("{}/sounds/{id}/", self.base_url))
    }

    /// Download endpoint; requires OAuth2 rather than token auth.
    pub fn download_url(&self, id: u64) -> String {
        format!("{}/sounds/{id}/download/", self.base_url)
    }

    pub fn authorization_url(&self) -> String {
        format!(
            "{DEFAULT_BASE_URL}/oauth2/authorize/?client_id={}&response_type=code",
            self.client_id
        )
    }

    pub fn search_url(&self, params: &SearchParams) -> Result<Url, FreesoundError> {
        let mut url = Url::parse(&format!("{}/search/text/", self.base_url))?;
        url.query_pairs_mut().extend_pairs(params.query_pairs());
        Ok(url)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FreesoundError> {
        let response = http_client::agent()
            .get(url)
            .set("Authorization", &format!("Token {}", self.api_key))
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, response) => FreesoundError::Status {
                    status,
                    status_text: response.status_text().to_string(),
                },
                other => FreesoundError::Transport(http_client::describe_error(&other)),
            })?;
        let bytes = http_client::read_response_bytes(response, MAX_RESPONSE_BYTES)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Category guessed from tags; the first matching keyword group wins.
pub fn infer_category(tags: &[String]) -> SoundCategory {
    let groups = [
        (NATURE_TAGS, SoundCategory::Nature),
        (AMBIENT_TAGS, SoundCategory::Ambient),
        (WHITE_TAGS, SoundCategory::White),
        (MEDITATION_TAGS, SoundCategory::Meditation),
    ];
    let lowered: Vec<String> = tags.iter().map(|tag| tag.to_lowercase()).collect();
    groups
        .into_iter()
        .find(|(keywords, _)| lowered.iter().any(|tag| keywords.contains(&tag.as_str())))
        .map_or(SoundCategory::Nature, |(_, category)| category)
}

/// Convert an API sound into a catalog entry playable from its HQ preview.
pub fn to_app_sound(info: &FreesoundSoundInfo) -> Sound {
    let mut description: String = info.description.chars().take(DESCRIPTION_LIMIT).collect();
    if info.description.chars().count() > DESCRIPTION_LIMIT {
        description.push_str("...");
    }
    Sound {
        id: SoundId::new(format!("freesound_{}", info.id)),
        name: info.name.clone(),
        category: infer_category(&info.tags),
        description,
        filepath: info.previews.hq_mp3.clone(),
        icon_path: Some(info.images.waveform_m.clone()),
        source: Some(SoundSource {
            id: SourceRef::Number(info.id),
            url: info.url.clone(),
            license: info.license.clone(),
            username: Some(info.username.clone()),
        }),
    }
}
