//! Playback engine: one audio graph, a master bus, and one voice per sound.
//!
//! Every voice is `source → gain → master → output`. Analyser taps hang off
//! the master bus. Fades are gain ramps on the graph clock; the work that
//! follows a fade is queued in the [`Scheduler`] and run by [`PlaybackEngine::poll`].

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::fade::{clamp_volume, duration_secs};
use super::graph::{AudioBackend, AudioGraph, GraphError, NodeId};
use super::loader::{self, LoadError};
use super::schedule::{FadeStatus, MasterFade, PendingMasterFade, ScheduledTask, Scheduler};
use crate::catalog::SoundId;

/// Buffer type produced by a backend's graph.
pub type BufferOf<B> = <<B as AudioBackend>::Graph as AudioGraph>::Buffer;

/// Errors raised while bringing up the audio graph.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backend refused to open an output graph.
    #[error("Failed to open audio output: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Building the master bus failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone)]
struct Voice {
    id: SoundId,
    source: NodeId,
    gain: NodeId,
    generation: u64,
}

/// Owns the audio graph and every playing voice.
pub struct PlaybackEngine<B: AudioBackend> {
    backend: B,
    graph: Option<B::Graph>,
    master: Option<NodeId>,
    buffers: std::collections::HashMap<SoundId, BufferOf<B>>,
    voices: Vec<Voice>,
    taps: Vec<NodeId>,
    scheduler: Scheduler,
    master_fade: Option<PendingMasterFade>,
    next_generation: u64,
    sounds_root: Option<PathBuf>,
}

impl<B: AudioBackend> PlaybackEngine<B> {
    /// Create an engine; the graph opens on first use.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            graph: None,
            master: None,
            buffers: Default::default(),
            voices: Vec::new(),
            taps: Vec::new(),
            scheduler: Scheduler::default(),
            master_fade: None,
            next_generation: 0,
            sounds_root: None,
        }
    }

    /// Directory that catalog paths such as `/sounds/nature/rain.mp3` resolve against.
    pub fn set_sounds_root(&mut self, root: Option<PathBuf>) {
        self.sounds_root = root;
    }

    /// Current sounds root, if any.
    pub fn sounds_root(&self) -> Option<&Path> {
        self.sounds_root.as_deref()
    }

    /// Backend the engine opens graphs from.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open the graph and master bus. Repeated calls are no-ops.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.graph.is_some() {
            return Ok(());
        }
        let mut graph = self
            .backend
            .open()
            .map_err(|err| EngineError::Backend(Box::new(err)))?;
        let output = graph.output();
        let master = graph.create_gain(1.0)?;
        if let Err(err) = graph.connect(master, output) {
            graph.close();
            return Err(err.into());
        }
        info!("Audio graph initialized");
        self.graph = Some(graph);
        self.master = Some(master);
        Ok(())
    }

    /// True once [`Self::initialize`] succeeded and until [`Self::dispose`].
    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    /// Fetch, decode and store the sound at `location` under `id`.
    pub fn load_sound(&mut self, id: &str, location: &str) -> Result<(), LoadError> {
        self.initialize()
            .map_err(|err| LoadError::Backend(err.to_string()))?;
        let result = loader::fetch(location, self.sounds_root.as_deref())
            .and_then(|bytes| self.decode_and_store(id, location, &bytes));
        if let Err(err) = &result {
            error!("Failed to load sound {id}: {err}");
        }
        result
    }

    /// Load several sounds; fetches run in parallel, decodes in order.
    pub fn load_sounds<I, S, L>(&mut self, sounds: I) -> Vec<(SoundId, Result<(), LoadError>)>
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<SoundId>,
        L: Into<String>,
    {
        let requests: Vec<(SoundId, String)> = sounds
            .into_iter()
            .map(|(id, location)| (id.into(), location.into()))
            .collect();
        if let Err(err) = self.initialize() {
            let message = err.to_string();
            return requests
                .into_iter()
                .map(|(id, _)| (id, Err(LoadError::Backend(message.clone()))))
                .collect();
        }
        let root = self.sounds_root.clone();
        let fetched: Vec<Result<Vec<u8>, LoadError>> = thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .map(|(_, location)| {
                    let root = root.as_deref();
                    scope.spawn(move || loader::fetch(location, root))
                })
                .collect();
            handles
                .into_iter()
                .zip(&requests)
                .map(|(handle, (_, location))| {
                    handle.join().unwrap_or_else(|_| {
                        Err(LoadError::Http {
                            location: location.clone(),
                            message: "fetch worker panicked".into(),
                        })
                    })
                })
                .collect()
        });
        requests
            .into_iter()
            .zip(fetched)
            .map(|((id, location), bytes)| {
                let result =
                    bytes.and_then(|bytes| self.decode_and_store(id.as_str(), &location, &bytes));
                if let Err(err) = &result {
                    error!("Failed to load sound {id}: {err}");
                }
                (id, result)
            })
            .collect()
    }

    fn decode_and_store(&mut self, id: &str, location: &str, bytes: &[u8]) -> Result<(), LoadError> {
        let Some(graph) = self.graph.as_mut() else {
            return Err(LoadError::Backend("audio graph closed".into()));
        };
        let hint = loader::extension_hint(location);
        let buffer = graph
            .decode(bytes, hint.as_deref())
            .map_err(|source| LoadError::Decode {
                id: SoundId::from(id),
                source,
            })?;
        self.insert_buffer(id, buffer);
        info!("Loaded sound {id} from {location}");
        Ok(())
    }

    /// Store an already decoded buffer, replacing any previous one.
    pub fn insert_buffer(&mut self, id: impl Into<SoundId>, buffer: BufferOf<B>) {
        self.buffers.insert(id.into(), buffer);
    }

    /// Whether a buffer is loaded for `id`.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.buffers.contains_key(id)
    }

    /// Play `id` as a looping voice.
    pub fn play(&mut self, id: &str, volume: f32) {
        self.play_sound(id, volume, true);
    }

    /// Start a voice for `id`, replacing any voice already playing it.
    pub fn play_sound(&mut self, id: &str, volume: f32, looping: bool) {
        if let Err(err) = self.initialize() {
            error!("Cannot play {id}: {err}");
            return;
        }
        let Some(buffer) = self.buffers.get(id).cloned() else {
            warn!("Sound {id} not loaded");
            return;
        };
        self.stop_sound(id);
        self.next_generation += 1;
        let generation = self.next_generation;
        let (Some(graph), Some(master)) = (self.graph.as_mut(), self.master) else {
            return;
        };
        match start_voice(graph, master, &buffer, clamp_volume(volume), looping) {
            Ok((source, gain)) => {
                debug!("Started voice {id} (source {source}, gain {gain})");
                self.voices.push(Voice {
                    id: SoundId::from(id),
                    source,
                    gain,
                    generation,
                });
            }
            Err(err) => error!("Failed to start {id}: {err}"),
        }
    }

    /// Stop and discard the voice for `id`. Unknown ids are ignored.
    pub fn stop_sound(&mut self, id: &str) {
        let Some(index) = self.voice_index(id) else {
            return;
        };
        let voice = self.voices.remove(index);
        if let Some(graph) = self.graph.as_mut() {
            teardown_voice(graph, &voice);
        }
    }

    /// Set the voice gain, immediately or with a linear ramp over `fade`.
    pub fn set_volume(&mut self, id: &str, volume: f32, fade: Duration) {
        let Some(gain) = self.voice(id).map(|voice| voice.gain) else {
            return;
        };
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let target = clamp_volume(volume);
        let result = if fade.is_zero() {
            graph.set_gain(gain, target)
        } else {
            let now = graph.current_time();
            graph.ramp_gain(gain, target, now, now + duration_secs(fade))
        };
        if let Err(err) = result {
            warn!("Failed to set volume of {id}: {err}");
        }
    }

    /// Current gain of the voice for `id`.
    pub fn volume(&self, id: &str) -> Option<f32> {
        let voice = self.voice(id)?;
        self.graph.as_ref()?.gain(voice.gain)
    }

    /// Ramp the voice to silence, then stop it once `fade` elapsed.
    pub fn fade_out_and_stop_sound(&mut self, id: &str, fade: Duration) {
        let Some(voice) = self.voice(id).cloned() else {
            return;
        };
        if fade.is_zero() {
            self.stop_sound(id);
            return;
        }
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let now = graph.current_time();
        let end = now + duration_secs(fade);
        if let Err(err) = graph.ramp_gain(voice.gain, 0.0, now, end) {
            warn!("Failed to fade out {id}: {err}");
        }
        debug!("Stopping {id} at {end:.3}s");
        self.scheduler.schedule(
            end,
            ScheduledTask::StopVoice {
                id: voice.id,
                generation: voice.generation,
            },
        );
    }

    /// Fade the master bus to silence, then stop every voice and restore the bus.
    ///
    /// A pending master fade is superseded. With nothing playing the handle
    /// resolves immediately.
    pub fn fade_out_all(&mut self, fade: Duration) -> MasterFade {
        self.supersede_master_fade();
        if self.voices.is_empty() || fade.is_zero() {
            self.stop_voices();
            self.restore_master_gain();
            return MasterFade::resolved();
        }
        let (Some(graph), Some(master)) = (self.graph.as_mut(), self.master) else {
            return MasterFade::resolved();
        };
        let now = graph.current_time();
        let end = now + duration_secs(fade);
        if let Err(err) = graph.ramp_gain(master, 0.0, now, end) {
            warn!("Failed to fade master bus: {err}");
        }
        let token = self.scheduler.issue_token();
        let handle = MasterFade::pending();
        self.scheduler
            .schedule(end, ScheduledTask::CompleteMasterFade { token });
        self.master_fade = Some(PendingMasterFade {
            token,
            handle: handle.clone(),
        });
        info!("Fading out {} sounds over {:.1}s", self.voices.len(), fade.as_secs_f64());
        handle
    }

    /// Stop every voice and cancel a pending master fade.
    pub fn stop_all(&mut self) {
        self.supersede_master_fade();
        self.stop_voices();
        self.restore_master_gain();
    }

    /// Run scheduled work whose due time passed on the graph clock.
    ///
    /// Returns the number of tasks that ran.
    pub fn poll(&mut self) -> usize {
        let Some(now) = self.graph.as_ref().map(|graph| graph.current_time()) else {
            return 0;
        };
        let due = self.scheduler.take_due(now);
        let count = due.len();
        for task in due {
            match task {
                ScheduledTask::StopVoice { id, generation } => {
                    if self
                        .voice(id.as_str())
                        .is_some_and(|voice| voice.generation == generation)
                    {
                        self.stop_sound(id.as_str());
                    }
                }
                ScheduledTask::CompleteMasterFade { token } => {
                    if self
                        .master_fade
                        .as_ref()
                        .is_some_and(|pending| pending.token == token)
                    {
                        self.complete_master_fade();
                    }
                }
            }
        }
        count
    }

    /// Ids of playing voices in the order they started.
    pub fn active_sounds(&self) -> Vec<SoundId> {
        self.voices.iter().map(|voice| voice.id.clone()).collect()
    }

    /// Whether a voice exists for `id`.
    pub fn is_playing(&self, id: &str) -> bool {
        self.voice_index(id).is_some()
    }

    /// Master bus gain at the current graph time.
    pub fn master_gain(&self) -> Option<f32> {
        self.graph.as_ref()?.gain(self.master?)
    }

    /// Master bus node.
    pub fn master(&self) -> Option<NodeId> {
        self.master
    }

    /// Graph for inspection by visualizers and tests.
    pub fn graph(&self) -> Option<&B::Graph> {
        self.graph.as_ref()
    }

    /// Create an analyser node on the live graph.
    pub fn create_analyzer(&mut self, fft_size: usize) -> Option<NodeId> {
        let graph = self.graph.as_mut()?;
        match graph.create_analyser(fft_size) {
            Ok(node) => Some(node),
            Err(err) => {
                warn!("Failed to create analyser: {err}");
                None
            }
        }
    }

    /// Tap the master bus into `node`. Already connected taps are left alone.
    pub fn connect_analyzer(&mut self, node: NodeId) {
        if self.taps.contains(&node) {
            return;
        }
        let (Some(graph), Some(master)) = (self.graph.as_mut(), self.master) else {
            warn!("Cannot connect analyser {node} before the audio graph is initialized");
            return;
        };
        match graph.connect(master, node) {
            Ok(()) => self.taps.push(node),
            Err(err) => warn!("Failed to connect analyser {node}: {err}"),
        }
    }

    /// Remove the master bus tap into `node`, if present.
    pub fn disconnect_analyzer(&mut self, node: NodeId) {
        let Some(index) = self.taps.iter().position(|tap| *tap == node) else {
            return;
        };
        self.taps.remove(index);
        if let (Some(graph), Some(master)) = (self.graph.as_mut(), self.master)
            && let Err(err) = graph.disconnect(master, node)
        {
            debug!("Ignoring analyser disconnect failure: {err}");
        }
    }

    /// Analyser taps currently wired to the master bus.
    pub fn analyzers(&self) -> &[NodeId] {
        &self.taps
    }

    /// Byte spectrum of an analyser node.
    pub fn frequency_data(&self, node: NodeId) -> Option<Vec<u8>> {
        self.graph.as_ref()?.frequency_data(node)
    }

    /// Tear everything down; the next call that needs audio reopens the graph.
    pub fn dispose(&mut self) {
        self.stop_all();
        for tap in self.taps.clone() {
            self.disconnect_analyzer(tap);
        }
        if let Some(mut graph) = self.graph.take() {
            graph.close();
            info!("Audio graph closed");
        }
        self.master = None;
        self.buffers.clear();
        self.scheduler.clear();
    }

    #[cfg(test)]
    pub(crate) fn voice_nodes(&self, id: &str) -> Option<(NodeId, NodeId)> {
        self.voice(id).map(|voice| (voice.source, voice.gain))
    }

    #[cfg(test)]
    pub(crate) fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    fn voice_index(&self, id: &str) -> Option<usize> {
        self.voices.iter().position(|voice| voice.id.as_str() == id)
    }

    fn voice(&self, id: &str) -> Option<&Voice> {
        self.voices.iter().find(|voice| voice.id.as_str() == id)
    }

    fn stop_voices(&mut self) {
        let voices = std::mem::take(&mut self.voices);
        if let Some(graph) = self.graph.as_mut() {
            for voice in &voices {
                teardown_voice(graph, voice);
            }
        }
    }

    fn supersede_master_fade(&mut self) {
        let Some(pending) = self.master_fade.take() else {
            return;
        };
        self.scheduler.cancel_master_fade(pending.token);
        pending.handle.finish(FadeStatus::Superseded);
        if let (Some(graph), Some(master)) = (self.graph.as_mut(), self.master) {
            let current = graph.gain(master).unwrap_or(1.0);
            if let Err(err) = graph.set_gain(master, current) {
                debug!("Failed to hold master gain: {err}");
            }
        }
        debug!("Superseded pending master fade");
    }

    fn restore_master_gain(&mut self) {
        if let (Some(graph), Some(master)) = (self.graph.as_mut(), self.master)
            && graph.gain(master) != Some(1.0)
            && let Err(err) = graph.set_gain(master, 1.0)
        {
            warn!("Failed to restore master gain: {err}");
        }
    }

    fn complete_master_fade(&mut self) {
        let Some(pending) = self.master_fade.take() else {
            return;
        };
        self.stop_voices();
        self.restore_master_gain();
        pending.handle.finish(FadeStatus::Completed);
        info!("Master fade-out completed");
    }
}

impl<B: AudioBackend> Drop for PlaybackEngine<B> {
    fn drop(&mut self) {
        if self.graph.is_some() {
            self.dispose();
        }
    }
}

fn start_voice<G: AudioGraph>(
    graph: &mut G,
    master: NodeId,
    buffer: &G::Buffer,
    volume: f32,
    looping: bool,
) -> Result<(NodeId, NodeId), GraphError> {
    let source = graph.create_source(buffer, looping)?;
    let gain = match graph.create_gain(volume) {
        Ok(gain) => gain,
        Err(err) => {
            graph.release(source);
            return Err(err);
        }
    };
    let wired = graph
        .connect(source, gain)
        .and_then(|()| graph.connect(gain, master))
        .and_then(|()| graph.start(source));
    if let Err(err) = wired {
        graph.release(source);
        graph.release(gain);
        return Err(err);
    }
    Ok((source, gain))
}

fn teardown_voice<G: AudioGraph>(graph: &mut G, voice: &Voice) {
    if let Err(err) = graph.stop(voice.source) {
        debug!("Ignoring stop failure for {}: {err}", voice.id);
    }
    graph.release(voice.source);
    graph.release(voice.gain);
}
