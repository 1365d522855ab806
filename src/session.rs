//! A listening session: the catalog, saved mixes, the sleep timer and the
//! engine wired together the way the player UI drives them.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::audio::{AudioBackend, FadeStatus, LoadError, MasterFade, PlaybackEngine, clamp_volume};
use crate::catalog::{Sound, SoundId, SoundLibrary};
use crate::config::AppSettings;
use crate::mix::store::{KeyValueStore, StoreError};
use crate::mix::{
    Clipboard, MixId, MixLibrary, ShareOutcome, ShareSurface, SoundMix, SoundSetting, share,
};
use crate::timer::{SleepTimer, TimerCompletion, TimerError, TimerSignal, TimerTick};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Please enter a name for your mix")]
    EmptyMixName,
    #[error("Please add at least one sound to your mix")]
    NoActiveSounds,
    #[error("No saved mix with id {0}")]
    UnknownMix(MixId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Timer(#[from] TimerError),
}

pub struct Session<B: AudioBackend, S> {
    engine: PlaybackEngine<B>,
    catalog: SoundLibrary<S>,
    mixes: MixLibrary<S>,
    timer: SleepTimer,
    active: Vec<SoundId>,
    /// Remembered per-sound volumes in first-played order.
    volumes: Vec<(SoundId, f32)>,
    fade: Option<MasterFade>,
    default_volume: f32,
    share_origin: String,
}

impl<B: AudioBackend, S: KeyValueStore + Clone> Session<B, S> {
    pub fn new(engine: PlaybackEngine<B>, store: S, settings: &AppSettings) -> Self {
        Self {
            engine,
            catalog: SoundLibrary::new(store.clone()),
            mixes: MixLibrary::new(store),
            timer: SleepTimer::new(settings.timer),
            active: Vec::new(),
            volumes: Vec::new(),
            fade: None,
            default_volume: clamp_volume(settings.default_volume),
            share_origin: settings.share_origin.clone(),
        }
    }
}

impl<B: AudioBackend, S: KeyValueStore> Session<B, S> {
    pub fn engine(&self) -> &PlaybackEngine<B> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PlaybackEngine<B> {
        &mut self.engine
    }

    pub fn catalog(&self) -> &SoundLibrary<S> {
        &self.catalog
    }

    pub fn mixes(&self) -> &MixLibrary<S> {
        &self.mixes
    }

    pub fn timer(&self) -> &SleepTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut SleepTimer {
        &mut self.timer
    }

    /// Sounds the user has switched on, in the order they were started.
    pub fn active_sounds(&self) -> &[SoundId] {
        &self.active
    }

    pub fn remembered_volume(&self, id: &str) -> Option<f32> {
        self.volumes
            .iter()
            .find(|(sound, _)| sound.as_str() == id)
            .map(|(_, volume)| *volume)
    }

    /// A timer-triggered fade is still running.
    pub fn is_fading_out(&self) -> bool {
        self.fade.is_some()
    }

    /// Load every catalog sound into the engine.
    pub fn load_catalog(&mut self) -> Vec<(SoundId, Result<(), LoadError>)> {
        let requests: Vec<(SoundId, String)> = self
            .catalog
            .all()
            .map(|sound| (sound.id.clone(), sound.filepath.clone()))
            .collect();
        let results = self.engine.load_sounds(requests);
        let loaded = results.iter().filter(|(_, result)| result.is_ok()).count();
        info!("Loaded {loaded} of {} catalog sounds", results.len());
        results
    }

    /// Play a catalog sound at its remembered volume.
    pub fn play_sound(&mut self, id: &str) {
        if self.catalog.get(id).is_none() {
            warn!("Ignoring play request for unknown sound {id}");
            return;
        }
        let volume = match self.remembered_volume(id) {
            Some(volume) => volume,
            None => {
                self.remember_volume(id, self.default_volume);
                self.default_volume
            }
        };
        self.engine.play(id, volume);
        self.mark_active(id);
    }

    pub fn stop_sound(&mut self, id: &str) {
        self.engine.stop_sound(id);
        self.active.retain(|sound| sound.as_str() != id);
    }

    pub fn stop_all(&mut self) {
        self.engine.stop_all();
        self.active.clear();
        self.fade = None;
    }

    pub fn change_volume(&mut self, id: &str, volume: f32) {
        let volume = clamp_volume(volume);
        self.engine.set_volume(id, volume, Duration::ZERO);
        self.remember_volume(id, volume);
    }

    pub fn start_timer(&mut self) -> Result<(), SessionError> {
        Ok(self.timer.start()?)
    }

    pub fn pause_timer(&mut self) {
        self.timer.pause();
    }

    pub fn reset_timer(&mut self) {
        self.timer.reset();
    }

    /// Drive the timer by `elapsed` wall time and run due engine work.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerTick> {
        let ticks = self.timer.advance(elapsed);
        for tick in &ticks {
            if let Some(TimerSignal::Completed { fade_out_ms }) = tick.signal {
                self.finish_timer(TimerCompletion::from_fade_ms(fade_out_ms));
            }
        }
        self.engine.poll();
        self.settle_fade();
        ticks
    }

    fn finish_timer(&mut self, completion: TimerCompletion) {
        match completion {
            TimerCompletion::FadeOutAll(fade) => {
                let handle = self.engine.fade_out_all(fade);
                self.fade = Some(handle);
                self.settle_fade();
            }
            TimerCompletion::StopAll => self.stop_all(),
        }
    }

    fn settle_fade(&mut self) {
        let Some(status) = self.fade.as_ref().map(MasterFade::status) else {
            return;
        };
        match status {
            FadeStatus::Pending => {}
            FadeStatus::Completed => {
                self.active.clear();
                self.fade = None;
            }
            FadeStatus::Superseded => {
                let engine = &self.engine;
                self.active.retain(|id| engine.is_playing(id.as_str()));
                self.fade = None;
            }
        }
    }

    /// One setting per remembered volume, enabled when the sound is active.
    pub fn current_sound_settings(&self) -> Vec<SoundSetting> {
        self.volumes
            .iter()
            .map(|(id, volume)| SoundSetting {
                sound_id: id.clone(),
                volume: *volume,
                enabled: self.active.contains(id),
            })
            .collect()
    }

    pub fn save_mix(&mut self, name: &str) -> Result<SoundMix, SessionError> {
        let sounds = self.checked_settings(name)?;
        Ok(self.mixes.create(name, sounds)?)
    }

    pub fn update_mix(&mut self, id: &MixId, name: &str) -> Result<SoundMix, SessionError> {
        let sounds = self.checked_settings(name)?;
        self.mixes
            .update(id, name, sounds)?
            .ok_or_else(|| SessionError::UnknownMix(id.clone()))
    }

    pub fn delete_mix(&mut self, id: &MixId) -> Result<bool, SessionError> {
        Ok(self.mixes.delete(id)?)
    }

    /// Replace the current sounds with a saved mix.
    pub fn apply_mix(&mut self, id: &MixId) -> Result<(), SessionError> {
        let mix = self
            .mixes
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownMix(id.clone()))?;
        self.mixes.apply(&mix, &mut self.engine);
        self.adopt_mix(&mix);
        Ok(())
    }

    /// Import and play the mix carried by a share link.
    ///
    /// Returns the imported mix and the link with its `mix` parameter removed.
    pub fn import_shared(&mut self, url: &Url) -> Option<(SoundMix, Url)> {
        let (mix, cleaned) = self.mixes.import_from_url(url, &mut self.engine)?;
        self.adopt_mix(&mix);
        Some((mix, cleaned))
    }

    /// Share a saved mix.
    pub fn share_mix(
        &self,
        id: &MixId,
        surface: Option<&mut dyn ShareSurface>,
        clipboard: &mut dyn Clipboard,
    ) -> Result<ShareOutcome, SessionError> {
        let mix = self
            .mixes
            .get(id)
            .ok_or_else(|| SessionError::UnknownMix(id.clone()))?;
        Ok(share(mix, &self.share_origin, surface, clipboard))
    }

    /// Register a custom sound and load it; `false` when the id is taken.
    pub fn add_custom_sound(&mut self, sound: Sound) -> bool {
        let id = sound.id.clone();
        let location = sound.filepath.clone();
        if !self.catalog.add_sound(sound) {
            return false;
        }
        if let Err(err) = self.engine.load_sound(id.as_str(), &location) {
            warn!("Custom sound {id} was added but could not be loaded: {err}");
        }
        true
    }

    fn checked_settings(&self, name: &str) -> Result<Vec<SoundSetting>, SessionError> {
        if name.trim().is_empty() {
            return Err(SessionError::EmptyMixName);
        }
        if self.active.is_empty() {
            return Err(SessionError::NoActiveSounds);
        }
        Ok(self.current_sound_settings())
    }

    fn adopt_mix(&mut self, mix: &SoundMix) {
        self.active.clear();
        self.fade = None;
        for setting in &mix.sounds {
            self.remember_volume(setting.sound_id.as_str(), clamp_volume(setting.volume));
            if setting.enabled {
                self.mark_active(setting.sound_id.as_str());
            }
        }
    }

    fn mark_active(&mut self, id: &str) {
        if !self.active.iter().any(|sound| sound.as_str() == id) {
            self.active.push(SoundId::from(id));
        }
    }

    fn remember_volume(&mut self, id: &str, volume: f32) {
        match self.volumes.iter_mut().find(|(sound, _)| sound.as_str() == id) {
            Some((_, remembered)) => *remembered = volume,
            None => self.volumes.push((SoundId::from(id), volume)),
        }
    }
}
