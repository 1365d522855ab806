//! URL-safe share tokens for mixes.
//!
//! A token is the compact JSON `{"name", "sounds"}` encoded as standard base64
//! with `+` and `/` replaced by `-` and `_` and the padding stripped.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use url::Url;

use super::{SharedMix, SoundMix, SoundSetting};

/// Query parameter carrying a shared mix.
pub const MIX_QUERY_PARAM: &str = "mix";

/// Reasons a share token is rejected.
#[derive(Debug, Error)]
pub enum MixDecodeError {
    #[error("Token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Token payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Token payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Shared mix has no name")]
    MissingName,
    #[error("Shared mix sounds are not a list")]
    SoundsNotList,
    #[error("Shared mix contains an invalid sound entry: {0}")]
    InvalidSound(serde_json::Error),
}

#[derive(Serialize)]
struct Payload<'a> {
    name: &'a str,
    sounds: &'a [SoundSetting],
}

/// Encode a mix's name and sounds as a share token.
pub fn encode(mix: &SoundMix) -> String {
    let payload = Payload {
        name: &mix.name,
        sounds: &mix.sounds,
    };
    match serde_json::to_vec(&payload) {
        Ok(json) => URL_SAFE_NO_PAD.encode(json),
        Err(err) => {
            error!("Failed to serialize mix {:?} for sharing: {err}", mix.name);
            String::new()
        }
    }
}

/// Decode a share token, logging and discarding anything invalid.
pub fn decode(token: &str) -> Option<SharedMix> {
    match try_decode(token) {
        Ok(mix) => Some(mix),
        Err(err) => {
            warn!("Ignoring invalid shared mix: {err}");
            None
        }
    }
}

/// Decode a share token, reporting why it was rejected.
pub fn try_decode(token: &str) -> Result<SharedMix, MixDecodeError> {
    let mut standard: String = token
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while standard.len() % 4 != 0 {
        standard.push('=');
    }
    let bytes = STANDARD.decode(standard.as_bytes())?;
    let text = String::from_utf8(bytes)?;
    let value: Value = serde_json::from_str(&text)?;
    let name = match value.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err(MixDecodeError::MissingName),
    };
    let sounds = match value.get("sounds") {
        Some(sounds @ Value::Array(_)) => sounds.clone(),
        _ => return Err(MixDecodeError::SoundsNotList),
    };
    let sounds: Vec<SoundSetting> =
        serde_json::from_value(sounds).map_err(MixDecodeError::InvalidSound)?;
    Ok(SharedMix { name, sounds })
}

/// `"{origin}?mix={token}"`.
pub fn shareable_url(origin: &str, mix: &SoundMix) -> String {
    format!("{origin}?{MIX_QUERY_PARAM}={}", encode(mix))
}

/// Read and decode the `mix` query parameter, if any.
pub fn extract_from_url(url: &Url) -> Option<SharedMix> {
    let (_, token) = url
        .query_pairs()
        .find(|(key, _)| key == MIX_QUERY_PARAM)?;
    decode(&token)
}

/// The URL without its `mix` parameter, so an import happens once.
pub fn strip_mix_param(url: &Url) -> Url {
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != MIX_QUERY_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut cleaned = url.clone();
    if remaining.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(remaining);
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::MixId;
    use time::OffsetDateTime;

    fn mix(name: &str, sounds: Vec<SoundSetting>) -> SoundMix {
        let now = OffsetDateTime::now_utc();
        SoundMix {
            id: MixId::from("mix_test"),
            name: name.into(),
            sounds,
            created_at: now,
            updated_at: now,
        }
    }

    fn token_for(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    #[test]
    fn tokens_are_url_safe_and_unpadded() {
        // Long enough that standard base64 would emit `+`, `/` or `=`.
        let token = encode(&mix(
            "Storm??>>~~ night",
            vec![SoundSetting::new("thunder", 0.75, true)],
        ));
        assert!(!token.is_empty());
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        let shared = decode(&token).unwrap();
        assert_eq!(shared.name, "Storm??>>~~ night");
        assert_eq!(shared.sounds[0].volume, 0.75);
    }

    #[test]
    fn multi_sound_mixes_round_trip() {
        let cases = [
            mix("a", vec![SoundSetting::new("rain", 0.0, true)]),
            mix(
                "ab",
                vec![
                    SoundSetting::new("rain", 1.0, false),
                    SoundSetting::new("cafe", 0.333, true),
                ],
            ),
            mix(
                "abc",
                vec![
                    SoundSetting::new("ocean", 0.05, true),
                    SoundSetting::new("thunder", 0.333, false),
                    SoundSetting::new("white-noise", 1.0, true),
                ],
            ),
            mix(
                "Nuit d'été ☾ 雨の音",
                vec![
                    SoundSetting::new("forest", 0.5, false),
                    SoundSetting::new("singing-bowl", 0.05, true),
                    SoundSetting::new("om-chant", 0.0, false),
                    SoundSetting::new("brown-noise", 0.75, true),
                ],
            ),
            mix("Deep focus before midnight!", Vec::new()),
        ];
        let mut remainders = std::collections::HashSet::new();
        for case in &cases {
            let token = encode(case);
            assert!(
                !token.contains(['+', '/', '=']),
                "{token} is not URL safe"
            );
            remainders.insert(token.len() % 4);
            let shared = decode(&token).unwrap();
            assert_eq!(shared.name, case.name);
            assert_eq!(shared.sounds, case.sounds);
        }
        assert_eq!(remainders.len(), 3);
    }

    #[test]
    fn token_json_matches_browser_layout() {
        let token = encode(&mix("A", vec![SoundSetting::new("rain", 0.5, true)]));
        let json = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"name":"A","sounds":[{"soundId":"rain","volume":0.5,"enabled":true}]}"#
        );
    }

    #[test]
    fn accepts_padded_standard_alphabet() {
        let json = r#"{"name":"Waves","sounds":[]}"#;
        let padded = STANDARD.encode(json);
        assert!(try_decode(&padded).is_ok());
    }

    #[test]
    fn rejects_missing_or_empty_name() {
        let err = try_decode(&token_for(r#"{"sounds":[]}"#)).unwrap_err();
        assert!(matches!(err, MixDecodeError::MissingName));
        let err = try_decode(&token_for(r#"{"name":"","sounds":[]}"#)).unwrap_err();
        assert!(matches!(err, MixDecodeError::MissingName));
    }

    #[test]
    fn rejects_non_list_sounds() {
        let err = try_decode(&token_for(r#"{"name":"x","sounds":{}}"#)).unwrap_err();
        assert!(matches!(err, MixDecodeError::SoundsNotList));
    }

    #[test]
    fn rejects_malformed_entries_and_garbage() {
        let err = try_decode(&token_for(r#"{"name":"x","sounds":[{"volume":1}]}"#)).unwrap_err();
        assert!(matches!(err, MixDecodeError::InvalidSound(_)));
        assert!(matches!(try_decode("!!!"), Err(MixDecodeError::Base64(_))));
        assert!(matches!(
            try_decode(&token_for("not json")),
            Err(MixDecodeError::Json(_))
        ));
        assert!(decode("").is_none());
    }

    #[test]
    fn url_helpers_extract_and_strip() {
        let shared = mix("Focus", vec![SoundSetting::new("white-noise", 0.4, true)]);
        let link = shareable_url("https://harmoni.app/", &shared);
        assert!(link.starts_with("https://harmoni.app/?mix="));

        let mut url = Url::parse(&link).unwrap();
        url.query_pairs_mut().append_pair("tab", "library");
        let decoded = extract_from_url(&url).unwrap();
        assert_eq!(decoded, shared.to_shared());

        let cleaned = strip_mix_param(&url);
        assert_eq!(cleaned.as_str(), "https://harmoni.app/?tab=library");
        let bare = strip_mix_param(&Url::parse(&link).unwrap());
        assert_eq!(bare.as_str(), "https://harmoni.app/");
        assert!(extract_from_url(&bare).is_none());
    }
}
