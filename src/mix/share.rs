//! Sharing a mix through a native share surface with a clipboard fallback.

use thiserror::Error;
use tracing::{info, warn};

use super::SoundMix;
use super::codec::shareable_url;
pub use crate::clipboard::{Clipboard, ClipboardError};

/// What a share surface is asked to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl SharePayload {
    pub fn for_mix(mix: &SoundMix, url: String) -> Self {
        Self {
            title: format!("Harmoni Mix: {}", mix.name),
            text: format!("Check out my custom sound mix \"{}\" on Harmoni!", mix.name),
            url,
        }
    }
}

#[derive(Debug, Error)]
pub enum ShareError {
    /// The user dismissed the share sheet.
    #[error("Sharing was cancelled")]
    Cancelled,
    #[error("Share failed: {0}")]
    Failed(String),
}

/// A platform share sheet.
pub trait ShareSurface {
    fn share(&mut self, payload: &SharePayload) -> Result<(), ShareError>;
}

/// User-facing result of a share attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareOutcome {
    pub success: bool,
    pub message: String,
    /// The link that was shared or copied.
    pub url: String,
}

impl ShareOutcome {
    fn new(success: bool, message: &str, url: String) -> Self {
        Self {
            success,
            message: message.to_string(),
            url,
        }
    }
}

/// Share `mix` via `surface` when available, otherwise copy its link.
pub fn share(
    mix: &SoundMix,
    origin: &str,
    surface: Option<&mut dyn ShareSurface>,
    clipboard: &mut dyn Clipboard,
) -> ShareOutcome {
    let url = shareable_url(origin, mix);
    if let Some(surface) = surface {
        match surface.share(&SharePayload::for_mix(mix, url.clone())) {
            Ok(()) => {
                info!("Shared mix {:?}", mix.name);
                return ShareOutcome::new(true, "Mix shared successfully!", url);
            }
            Err(ShareError::Cancelled) => {
                return ShareOutcome::new(false, "Sharing was cancelled", url);
            }
            Err(err) => warn!("Share surface failed, falling back to clipboard: {err}"),
        }
    }
    copy_link(clipboard, url)
}

fn copy_link(clipboard: &mut dyn Clipboard, url: String) -> ShareOutcome {
    match clipboard.write_text(&url) {
        Ok(()) => ShareOutcome::new(true, "Shareable link copied to clipboard!", url),
        Err(err) => {
            warn!("Failed to copy share link: {err}");
            ShareOutcome::new(false, "Failed to copy link to clipboard", url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::{MixId, SoundSetting};
    use time::OffsetDateTime;

    struct Surface {
        result: fn() -> Result<(), ShareError>,
        shared: Vec<SharePayload>,
    }

    impl ShareSurface for Surface {
        fn share(&mut self, payload: &SharePayload) -> Result<(), ShareError> {
            self.shared.push(payload.clone());
            (self.result)()
        }
    }

    #[derive(Default)]
    struct MemoryClipboard {
        fail: bool,
        text: Option<String>,
    }

    impl Clipboard for MemoryClipboard {
        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            if self.fail {
                return Err(ClipboardError::Unsupported);
            }
            self.text = Some(text.to_string());
            Ok(())
        }
    }

    fn mix() -> SoundMix {
        let now = OffsetDateTime::now_utc();
        SoundMix {
            id: MixId::generate(),
            name: "Rainy Cafe".into(),
            sounds: vec![SoundSetting::new("rain", 0.5, true)],
            created_at: now,
            updated_at: now,
        }
    }

    fn surface(result: fn() -> Result<(), ShareError>) -> Surface {
        Surface {
            result,
            shared: Vec::new(),
        }
    }

    #[test]
    fn share_surface_success_skips_clipboard() {
        let mut surface = surface(|| Ok(()));
        let mut clipboard = MemoryClipboard::default();
        let outcome = share(&mix(), "https://harmoni.app", Some(&mut surface), &mut clipboard);
        assert!(outcome.success);
        assert_eq!(outcome.message, "Mix shared successfully!");
        assert_eq!(clipboard.text, None);
        let payload = &surface.shared[0];
        assert_eq!(payload.title, "Harmoni Mix: Rainy Cafe");
        assert_eq!(
            payload.text,
            "Check out my custom sound mix \"Rainy Cafe\" on Harmoni!"
        );
        assert!(payload.url.starts_with("https://harmoni.app?mix="));
    }

    #[test]
    fn cancellation_does_not_fall_back() {
        let mut surface = surface(|| Err(ShareError::Cancelled));
        let mut clipboard = MemoryClipboard::default();
        let outcome = share(&mix(), "https://harmoni.app", Some(&mut surface), &mut clipboard);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Sharing was cancelled");
        assert_eq!(clipboard.text, None);
    }

    #[test]
    fn failed_share_copies_link() {
        let mut surface = surface(|| Err(ShareError::Failed("no targets".into())));
        let mut clipboard = MemoryClipboard::default();
        let outcome = share(&mix(), "https://harmoni.app", Some(&mut surface), &mut clipboard);
        assert!(outcome.success);
        assert_eq!(outcome.message, "Shareable link copied to clipboard!");
        assert_eq!(clipboard.text.as_deref(), Some(outcome.url.as_str()));
    }

    #[test]
    fn missing_surface_and_clipboard_reports_failure() {
        let mut clipboard = MemoryClipboard {
            fail: true,
            text: None,
        };
        let outcome = share(&mix(), "https://harmoni.app", None, &mut clipboard);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Failed to copy link to clipboard");
    }
}
