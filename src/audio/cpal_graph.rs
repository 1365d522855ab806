//! Audio graph rendered by a cpal output stream.
//!
//! Node state lives in [`StreamState`] behind `Arc<Mutex<_>>`; the engine side
//! mutates it through [`CpalGraph`] and the device callback renders one block
//! at a time with [`render_block`]. The graph clock is the number of frames
//! rendered divided by the stream sample rate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::DEFAULT_ANTI_CLIP_FADE;
use super::analyser::AnalyserState;
use super::decoder::{self, DecodedBuffer};
use super::fade::{GainAutomation, fade_frames_for_duration};
use super::graph::{AudioBackend, AudioGraph, GraphError, NodeId, NodeIds};
use super::output::{
    AudioOutputConfig, AudioOutputError, CpalAudioStream, ResolvedOutput, open_output_stream,
};

const MAX_RENDER_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Idle,
    Playing,
    /// Fading to silence over the remaining frames before stopping.
    Stopping { remaining: u32, total: u32 },
    Stopped,
}

#[derive(Debug)]
enum NodeKind {
    Output,
    Gain(GainAutomation),
    Source {
        buffer: DecodedBuffer,
        looping: bool,
        position: f64,
        playback: Playback,
    },
    Analyser(AnalyserState),
}

#[derive(Debug)]
struct RenderNode {
    kind: NodeKind,
    /// Released by the engine; dropped once it no longer produces sound.
    released: bool,
}

/// Node graph shared with the audio callback.
#[derive(Debug)]
pub struct StreamState {
    nodes: HashMap<NodeId, RenderNode>,
    edges: Vec<(NodeId, NodeId)>,
    output: NodeId,
    frames_rendered: u64,
    sample_rate: u32,
    channels: u16,
}

impl StreamState {
    pub(crate) fn new(output: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            output,
            RenderNode {
                kind: NodeKind::Output,
                released: false,
            },
        );
        Self {
            nodes,
            edges: Vec::new(),
            output,
            frames_rendered: 0,
            sample_rate: 44_100,
            channels: 2,
        }
    }

    pub(crate) fn set_format(&mut self, sample_rate: u32, channels: u16) {
        self.sample_rate = sample_rate.max(1);
        self.channels = channels.max(1);
    }

    fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    fn inputs(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(move |(_, to)| *to == node)
            .map(|(from, _)| *from)
    }

    fn live(&self, node: NodeId) -> Result<&RenderNode, GraphError> {
        self.nodes
            .get(&node)
            .filter(|node| !node.released)
            .ok_or(GraphError::UnknownNode(node))
    }

    fn live_mut(&mut self, node: NodeId) -> Result<&mut RenderNode, GraphError> {
        self.nodes
            .get_mut(&node)
            .filter(|node| !node.released)
            .ok_or(GraphError::UnknownNode(node))
    }

    /// Drop released nodes that have gone quiet, along with their edges.
    fn collect_released(&mut self) {
        loop {
            let quiet: Vec<NodeId> = self
                .nodes
                .iter()
                .filter(|(id, node)| node.released && self.is_quiet(**id, node))
                .map(|(id, _)| *id)
                .collect();
            if quiet.is_empty() {
                return;
            }
            for id in quiet {
                self.nodes.remove(&id);
                self.edges.retain(|(from, to)| *from != id && *to != id);
            }
        }
    }

    fn is_quiet(&self, id: NodeId, node: &RenderNode) -> bool {
        match &node.kind {
            NodeKind::Source { playback, .. } => !matches!(playback, Playback::Stopping { .. }),
            _ => self.inputs(id).next().is_none(),
        }
    }
}

/// Render one interleaved block into `data` and advance the graph clock.
pub(crate) fn render_block(state: &mut StreamState, data: &mut [f32]) {
    let channels = state.channels as usize;
    let frames = data.len() / channels;
    let mut cache: HashMap<NodeId, Vec<f32>> = HashMap::new();
    let output = state.output;
    let mixed = render_node(state, output, frames, &mut cache, 0);
    for (sample, value) in data.iter_mut().zip(mixed.iter().chain(std::iter::repeat(&0.0))) {
        *sample = value.clamp(-1.0, 1.0);
    }
    let analysers: Vec<NodeId> = state
        .nodes
        .iter()
        .filter(|(_, node)| matches!(node.kind, NodeKind::Analyser(_)))
        .map(|(id, _)| *id)
        .collect();
    for analyser in analysers {
        render_node(state, analyser, frames, &mut cache, 0);
    }
    state.frames_rendered += frames as u64;
    for node in state.nodes.values_mut() {
        if let NodeKind::Gain(automation) = &mut node.kind {
            automation.settle(state.frames_rendered as f64 / state.sample_rate as f64);
        }
    }
    state.collect_released();
}

fn render_node(
    state: &mut StreamState,
    id: NodeId,
    frames: usize,
    cache: &mut HashMap<NodeId, Vec<f32>>,
    depth: usize,
) -> Vec<f32> {
    if let Some(block) = cache.get(&id) {
        return block.clone();
    }
    let channels = state.channels as usize;
    let mut block = vec![0.0; frames * channels];
    if depth > MAX_RENDER_DEPTH {
        return block;
    }
    let inputs: Vec<NodeId> = state.inputs(id).collect();
    for input in inputs {
        let upstream = render_node(state, input, frames, cache, depth + 1);
        for (sum, sample) in block.iter_mut().zip(upstream) {
            *sum += sample;
        }
    }
    let start = state.frames_rendered;
    let sample_rate = state.sample_rate;
    let Some(node) = state.nodes.get_mut(&id) else {
        return block;
    };
    match &mut node.kind {
        NodeKind::Output => {}
        NodeKind::Gain(automation) => {
            for (frame, samples) in block.chunks_mut(channels).enumerate() {
                let time = (start + frame as u64) as f64 / sample_rate as f64;
                let gain = automation.value_at(time);
                samples.iter_mut().for_each(|sample| *sample *= gain);
            }
        }
        NodeKind::Source {
            buffer,
            looping,
            position,
            playback,
        } => render_source(buffer, *looping, position, playback, &mut block, channels, sample_rate),
        NodeKind::Analyser(analyser) => {
            for samples in block.chunks(channels) {
                analyser.push(samples.iter().sum::<f32>() / channels as f32);
            }
        }
    }
    cache.insert(id, block.clone());
    block
}

fn render_source(
    buffer: &DecodedBuffer,
    looping: bool,
    position: &mut f64,
    playback: &mut Playback,
    block: &mut [f32],
    channels: usize,
    sample_rate: u32,
) {
    let total_frames = buffer.frames();
    if total_frames == 0 {
        *playback = Playback::Stopped;
        return;
    }
    let step = buffer.sample_rate() as f64 / sample_rate as f64;
    for samples in block.chunks_mut(channels) {
        let envelope = match playback {
            Playback::Playing => 1.0,
            Playback::Stopping { remaining, total } => {
                if *remaining == 0 {
                    *playback = Playback::Stopped;
                    return;
                }
                *remaining -= 1;
                *remaining as f32 / *total as f32
            }
            Playback::Idle | Playback::Stopped => return,
        };
        let frame = *position as usize;
        if frame >= total_frames {
            if looping {
                *position %= total_frames as f64;
            } else {
                *playback = Playback::Stopped;
                return;
            }
        }
        let frame = *position as usize;
        for (channel, sample) in samples.iter_mut().enumerate() {
            *sample = buffer.sample(frame, channel) * envelope;
        }
        *position += step;
    }
}

/// Backend opening a cpal output stream per graph.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    config: AudioOutputConfig,
}

impl CpalBackend {
    /// Backend honoring the given output preferences.
    pub fn new(config: AudioOutputConfig) -> Self {
        Self { config }
    }
}

impl AudioBackend for CpalBackend {
    type Graph = CpalGraph;
    type Error = AudioOutputError;

    fn open(&mut self) -> Result<Self::Graph, Self::Error> {
        let mut ids = NodeIds::default();
        let output = ids.allocate();
        let state = Arc::new(Mutex::new(StreamState::new(output)));
        let outcome = open_output_stream(&self.config, state.clone())?;
        Ok(CpalGraph {
            stream: Some(outcome.stream),
            resolved: outcome.resolved,
            state,
            ids,
            output,
        })
    }
}

/// [`AudioGraph`] whose nodes render inside the cpal callback.
pub struct CpalGraph {
    stream: Option<CpalAudioStream>,
    resolved: ResolvedOutput,
    state: Arc<Mutex<StreamState>>,
    ids: NodeIds,
    output: NodeId,
}

impl CpalGraph {
    /// Output parameters in use.
    pub fn resolved_output(&self) -> &ResolvedOutput {
        &self.resolved
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), GraphError> {
        if self.stream.is_some() {
            Ok(())
        } else {
            Err(GraphError::Closed)
        }
    }

    fn insert(&mut self, kind: NodeKind) -> Result<NodeId, GraphError> {
        self.ensure_open()?;
        let id = self.ids.allocate();
        self.lock().nodes.insert(
            id,
            RenderNode {
                kind,
                released: false,
            },
        );
        Ok(id)
    }

    fn with_gain<T>(
        &mut self,
        node: NodeId,
        apply: impl FnOnce(&mut GainAutomation, f64) -> T,
    ) -> Result<T, GraphError> {
        self.ensure_open()?;
        let mut state = self.lock();
        let now = state.now();
        match &mut state.live_mut(node)?.kind {
            NodeKind::Gain(automation) => Ok(apply(automation, now)),
            _ => Err(GraphError::WrongKind(node)),
        }
    }
}

impl AudioGraph for CpalGraph {
    type Buffer = DecodedBuffer;

    fn current_time(&self) -> f64 {
        self.lock().now()
    }

    fn output(&self) -> NodeId {
        self.output
    }

    fn decode(&mut self, bytes: &[u8], hint: Option<&str>) -> Result<Self::Buffer, GraphError> {
        self.ensure_open()?;
        decoder::decode_bytes(bytes, hint).map_err(GraphError::Decode)
    }

    fn create_gain(&mut self, value: f32) -> Result<NodeId, GraphError> {
        self.insert(NodeKind::Gain(GainAutomation::new(value)))
    }

    fn create_source(
        &mut self,
        buffer: &Self::Buffer,
        looping: bool,
    ) -> Result<NodeId, GraphError> {
        self.insert(NodeKind::Source {
            buffer: buffer.clone(),
            looping,
            position: 0.0,
            playback: Playback::Idle,
        })
    }

    fn create_analyser(&mut self, fft_size: usize) -> Result<NodeId, GraphError> {
        self.insert(NodeKind::Analyser(AnalyserState::new(fft_size)))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        let mut state = self.lock();
        if matches!(state.live(from)?.kind, NodeKind::Output) {
            return Err(GraphError::WrongKind(from));
        }
        state.live(to)?;
        if !state.edges.contains(&(from, to)) {
            state.edges.push((from, to));
        }
        Ok(())
    }

    fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        let mut state = self.lock();
        let before = state.edges.len();
        state.edges.retain(|edge| *edge != (from, to));
        if state.edges.len() == before {
            return Err(GraphError::NotConnected { from, to });
        }
        if let Some(RenderNode {
            kind: NodeKind::Analyser(analyser),
            ..
        }) = state.nodes.get_mut(&to)
        {
            analyser.clear();
        }
        Ok(())
    }

    fn gain(&self, node: NodeId) -> Option<f32> {
        let state = self.lock();
        let now = state.now();
        match &state.live(node).ok()?.kind {
            NodeKind::Gain(automation) => Some(automation.value_at(now)),
            _ => None,
        }
    }

    fn set_gain(&mut self, node: NodeId, value: f32) -> Result<(), GraphError> {
        self.with_gain(node, |automation, _| automation.set(value))
    }

    fn ramp_gain(
        &mut self,
        node: NodeId,
        target: f32,
        start_at: f64,
        end_at: f64,
    ) -> Result<(), GraphError> {
        self.with_gain(node, |automation, _| {
            automation.ramp_to(target, start_at, end_at)
        })
    }

    fn start(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        let mut state = self.lock();
        match &mut state.live_mut(node)?.kind {
            NodeKind::Source { playback, .. } => {
                if *playback != Playback::Idle {
                    return Err(GraphError::AlreadyStarted(node));
                }
                *playback = Playback::Playing;
                Ok(())
            }
            _ => Err(GraphError::WrongKind(node)),
        }
    }

    fn stop(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        let mut state = self.lock();
        let sample_rate = state.sample_rate;
        match &mut state.live_mut(node)?.kind {
            NodeKind::Source { playback, .. } => {
                if *playback != Playback::Playing {
                    return Err(GraphError::AlreadyStopped(node));
                }
                let total = fade_frames_for_duration(sample_rate, DEFAULT_ANTI_CLIP_FADE);
                *playback = Playback::Stopping {
                    remaining: total,
                    total,
                };
                Ok(())
            }
            _ => Err(GraphError::WrongKind(node)),
        }
    }

    fn release(&mut self, node: NodeId) {
        if node == self.output {
            return;
        }
        let mut state = self.lock();
        if let Some(entry) = state.nodes.get_mut(&node) {
            entry.released = true;
        }
        state.collect_released();
    }

    fn frequency_data(&self, node: NodeId) -> Option<Vec<u8>> {
        let mut state = self.lock();
        match &mut state.live_mut(node).ok()?.kind {
            NodeKind::Analyser(analyser) => Some(analyser.byte_frequency_data()),
            _ => None,
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.pause();
            debug!("Closed output stream");
        }
        let mut state = self.lock();
        state.nodes.retain(|id, _| *id == self.output);
        state.edges.clear();
    }
}

impl Drop for CpalGraph {
    fn drop(&mut self) {
        self.close();
    }
}
