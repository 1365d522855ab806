//! Cached view over the mix store plus the currently applied mix.

use tracing::{info, warn};
use url::Url;

use super::codec::{extract_from_url, strip_mix_param};
use super::store::{KeyValueStore, MixStore, StoreError};
use super::{MixId, SoundMix, SoundSetting};
use crate::audio::{AudioBackend, PlaybackEngine};

/// Replace whatever is playing with the enabled sounds of `sounds`.
pub fn apply_mix<B: AudioBackend>(sounds: &[SoundSetting], engine: &mut PlaybackEngine<B>) {
    engine.stop_all();
    for setting in sounds.iter().filter(|setting| setting.enabled) {
        engine.play(setting.sound_id.as_str(), setting.volume);
    }
}

/// Saved mixes kept in sync with their store.
#[derive(Debug)]
pub struct MixLibrary<S> {
    store: MixStore<S>,
    mixes: Vec<SoundMix>,
    active_mix_id: Option<MixId>,
}

impl<S: KeyValueStore> MixLibrary<S> {
    /// Load the cached list from `store`.
    pub fn new(store: S) -> Self {
        let store = MixStore::new(store);
        let mixes = store.saved_mixes();
        Self {
            store,
            mixes,
            active_mix_id: None,
        }
    }

    pub fn mixes(&self) -> &[SoundMix] {
        &self.mixes
    }

    pub fn get(&self, id: &MixId) -> Option<&SoundMix> {
        self.mixes.iter().find(|mix| &mix.id == id)
    }

    pub fn active_mix_id(&self) -> Option<&MixId> {
        self.active_mix_id.as_ref()
    }

    pub fn active_mix(&self) -> Option<&SoundMix> {
        self.get(self.active_mix_id.as_ref()?)
    }

    pub fn create(&mut self, name: &str, sounds: Vec<SoundSetting>) -> Result<SoundMix, StoreError> {
        let mix = self.store.save_mix(name, sounds)?;
        self.mixes.push(mix.clone());
        Ok(mix)
    }

    pub fn import(&mut self, name: &str, sounds: Vec<SoundSetting>) -> Result<SoundMix, StoreError> {
        let mix = self.store.import_mix(name, sounds)?;
        self.mixes.push(mix.clone());
        Ok(mix)
    }

    pub fn update(
        &mut self,
        id: &MixId,
        name: &str,
        sounds: Vec<SoundSetting>,
    ) -> Result<Option<SoundMix>, StoreError> {
        let updated = self.store.update_mix(id, name, sounds)?;
        if let Some(updated) = &updated
            && let Some(cached) = self.mixes.iter_mut().find(|mix| &mix.id == id)
        {
            *cached = updated.clone();
        }
        Ok(updated)
    }

    /// Delete a mix, clearing the active mix when it was the one removed.
    pub fn delete(&mut self, id: &MixId) -> Result<bool, StoreError> {
        let removed = self.store.delete_mix(id)?;
        if removed {
            self.mixes.retain(|mix| &mix.id != id);
            if self.active_mix_id.as_ref() == Some(id) {
                self.active_mix_id = None;
            }
        }
        Ok(removed)
    }

    /// Play `mix` and mark it active.
    pub fn apply<B: AudioBackend>(&mut self, mix: &SoundMix, engine: &mut PlaybackEngine<B>) {
        apply_mix(&mix.sounds, engine);
        self.active_mix_id = Some(mix.id.clone());
        info!(id = %mix.id, "Applied mix {:?}", mix.name);
    }

    /// Import, apply and activate the mix carried by `url`.
    ///
    /// Returns the stored mix and `url` with the `mix` parameter removed, or
    /// `None` when the URL carries no valid mix.
    pub fn import_from_url<B: AudioBackend>(
        &mut self,
        url: &Url,
        engine: &mut PlaybackEngine<B>,
    ) -> Option<(SoundMix, Url)> {
        let shared = extract_from_url(url)?;
        let name = format!("{} (Shared)", shared.name);
        let mix = match self.import(&name, shared.sounds) {
            Ok(mix) => mix,
            Err(err) => {
                warn!("Failed to store shared mix {name:?}: {err}");
                return None;
            }
        };
        self.apply(&mix, engine);
        Some((mix, strip_mix_param(url)))
    }
}
