//! Deterministic in-memory audio graph.
//!
//! Nothing is rendered: the graph records nodes, edges, source state and gain
//! automation, and its clock only moves when [`SimClock::advance`] is called.
//! Integration tests and dry runs drive the engine through it.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::fade::GainAutomation;
use super::graph::{AudioBackend, AudioGraph, GraphError, NodeId, NodeIds};

/// Manually advanced clock shared between a backend and its graphs.
#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<f64>>);

impl SimClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in seconds.
    pub fn now(&self) -> f64 {
        self.0.get()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by.as_secs_f64());
    }
}

/// Raised when a simulated backend is configured to refuse opening.
#[derive(Debug, Error)]
#[error("Simulated audio device unavailable")]
pub struct SimulatedOpenError;

/// Backend producing [`SimulatedGraph`]s that share one [`SimClock`].
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    clock: SimClock,
    unavailable: bool,
    opened: usize,
}

impl SimulatedBackend {
    /// Create a backend with a fresh clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose `open` always fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Clock handle used by every graph this backend opens.
    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// Number of graphs opened so far.
    pub fn opened(&self) -> usize {
        self.opened
    }
}

impl AudioBackend for SimulatedBackend {
    type Graph = SimulatedGraph;
    type Error = SimulatedOpenError;

    fn open(&mut self) -> Result<Self::Graph, Self::Error> {
        if self.unavailable {
            return Err(SimulatedOpenError);
        }
        self.opened += 1;
        Ok(SimulatedGraph::new(self.clock.clone()))
    }
}

/// Decoded stand-in: the encoded payload length and its origin hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBuffer {
    /// Number of encoded bytes that produced this buffer.
    pub len: usize,
    /// Decoder hint supplied when the buffer was created.
    pub hint: Option<Arc<str>>,
}

/// Lifecycle of a simulated source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Created but not started.
    Idle,
    /// Started and audible.
    Playing,
    /// Stopped; cannot restart.
    Stopped,
}

#[derive(Debug, Clone)]
enum SimNode {
    Output,
    Gain(GainAutomation),
    Source {
        buffer: SimBuffer,
        looping: bool,
        state: SourceState,
    },
    Analyser {
        fft_size: usize,
    },
}

/// In-memory [`AudioGraph`] implementation.
#[derive(Debug)]
pub struct SimulatedGraph {
    clock: SimClock,
    ids: NodeIds,
    output: NodeId,
    nodes: BTreeMap<NodeId, SimNode>,
    edges: BTreeSet<(NodeId, NodeId)>,
    closed: bool,
}

impl SimulatedGraph {
    fn new(clock: SimClock) -> Self {
        let mut ids = NodeIds::default();
        let output = ids.allocate();
        let mut nodes = BTreeMap::new();
        nodes.insert(output, SimNode::Output);
        Self {
            clock,
            ids,
            output,
            nodes,
            edges: BTreeSet::new(),
            closed: false,
        }
    }

    /// Whether `from` feeds `to`.
    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.contains(&(from, to))
    }

    /// Downstream nodes of `from`.
    pub fn targets(&self, from: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(src, _)| *src == from)
            .map(|(_, dst)| *dst)
            .collect()
    }

    /// Total edge count.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Live node count, including the output node.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// State of a source node.
    pub fn source_state(&self, node: NodeId) -> Option<SourceState> {
        match self.nodes.get(&node) {
            Some(SimNode::Source { state, .. }) => Some(*state),
            _ => None,
        }
    }

    /// Whether a source node was created with looping enabled.
    pub fn source_loops(&self, node: NodeId) -> Option<bool> {
        match self.nodes.get(&node) {
            Some(SimNode::Source { looping, .. }) => Some(*looping),
            _ => None,
        }
    }

    /// Buffer bound to a source node.
    pub fn source_buffer(&self, node: NodeId) -> Option<&SimBuffer> {
        match self.nodes.get(&node) {
            Some(SimNode::Source { buffer, .. }) => Some(buffer),
            _ => None,
        }
    }

    /// Number of sources currently playing.
    pub fn playing_sources(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| {
                matches!(
                    node,
                    SimNode::Source {
                        state: SourceState::Playing,
                        ..
                    }
                )
            })
            .count()
    }

    /// Gain automation attached to a gain node.
    pub fn automation(&self, node: NodeId) -> Option<GainAutomation> {
        match self.nodes.get(&node) {
            Some(SimNode::Gain(automation)) => Some(*automation),
            _ => None,
        }
    }

    /// Whether [`AudioGraph::close`] ran.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), GraphError> {
        if self.closed {
            Err(GraphError::Closed)
        } else {
            Ok(())
        }
    }

    fn insert(&mut self, node: SimNode) -> Result<NodeId, GraphError> {
        self.ensure_open()?;
        let id = self.ids.allocate();
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn gain_mut(&mut self, node: NodeId) -> Result<&mut GainAutomation, GraphError> {
        match self.nodes.get_mut(&node) {
            Some(SimNode::Gain(automation)) => Ok(automation),
            Some(_) => Err(GraphError::WrongKind(node)),
            None => Err(GraphError::UnknownNode(node)),
        }
    }

    fn source_state_mut(&mut self, node: NodeId) -> Result<&mut SourceState, GraphError> {
        match self.nodes.get_mut(&node) {
            Some(SimNode::Source { state, .. }) => Ok(state),
            Some(_) => Err(GraphError::WrongKind(node)),
            None => Err(GraphError::UnknownNode(node)),
        }
    }

    /// Effective gain of the path from `node` to the output, if one exists.
    fn path_gain(&self, node: NodeId, depth: usize) -> Option<f32> {
        if node == self.output {
            return Some(1.0);
        }
        if depth > 16 {
            return None;
        }
        let own = match self.nodes.get(&node)? {
            SimNode::Gain(automation) => automation.value_at(self.clock.now()),
            SimNode::Source { .. } => 1.0,
            _ => return None,
        };
        self.targets(node)
            .into_iter()
            .filter_map(|target| self.path_gain(target, depth + 1))
            .reduce(f32::max)
            .map(|downstream| own * downstream)
    }

    /// Loudest gain reaching `node` from any playing source.
    fn level_into(&self, node: NodeId) -> f32 {
        self.nodes
            .iter()
            .filter(|(_, kind)| {
                matches!(
                    kind,
                    SimNode::Source {
                        state: SourceState::Playing,
                        ..
                    }
                )
            })
            .filter_map(|(id, _)| self.gain_between(*id, node, 0))
            .fold(0.0, f32::max)
    }

    fn gain_between(&self, from: NodeId, to: NodeId, depth: usize) -> Option<f32> {
        if from == to {
            return Some(1.0);
        }
        if depth > 16 {
            return None;
        }
        let own = match self.nodes.get(&from)? {
            SimNode::Gain(automation) => automation.value_at(self.clock.now()),
            _ => 1.0,
        };
        self.targets(from)
            .into_iter()
            .filter_map(|target| {
                if target == to {
                    return Some(own);
                }
                self.gain_between(target, to, depth + 1)
                    .map(|downstream| own * downstream)
            })
            .reduce(f32::max)
    }

    /// Gain at which a playing source currently reaches the output.
    pub fn audible_gain(&self, source: NodeId) -> Option<f32> {
        match self.source_state(source)? {
            SourceState::Playing => self.path_gain(source, 0),
            _ => None,
        }
    }
}

impl AudioGraph for SimulatedGraph {
    type Buffer = SimBuffer;

    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn output(&self) -> NodeId {
        self.output
    }

    fn decode(&mut self, bytes: &[u8], hint: Option<&str>) -> Result<Self::Buffer, GraphError> {
        self.ensure_open()?;
        if bytes.is_empty() {
            return Err(GraphError::Decode("empty audio payload".into()));
        }
        Ok(SimBuffer {
            len: bytes.len(),
            hint: hint.map(Arc::from),
        })
    }

    fn create_gain(&mut self, value: f32) -> Result<NodeId, GraphError> {
        self.insert(SimNode::Gain(GainAutomation::new(value)))
    }

    fn create_source(
        &mut self,
        buffer: &Self::Buffer,
        looping: bool,
    ) -> Result<NodeId, GraphError> {
        self.insert(SimNode::Source {
            buffer: buffer.clone(),
            looping,
            state: SourceState::Idle,
        })
    }

    fn create_analyser(&mut self, fft_size: usize) -> Result<NodeId, GraphError> {
        self.insert(SimNode::Analyser {
            fft_size: super::analyser::normalized_fft_size(fft_size),
        })
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        for node in [from, to] {
            if !self.nodes.contains_key(&node) {
                return Err(GraphError::UnknownNode(node));
            }
        }
        if matches!(self.nodes.get(&from), Some(SimNode::Output)) {
            return Err(GraphError::WrongKind(from));
        }
        self.edges.insert((from, to));
        Ok(())
    }

    fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        if self.edges.remove(&(from, to)) {
            Ok(())
        } else {
            Err(GraphError::NotConnected { from, to })
        }
    }

    fn gain(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(&node) {
            Some(SimNode::Gain(automation)) => Some(automation.value_at(self.clock.now())),
            _ => None,
        }
    }

    fn set_gain(&mut self, node: NodeId, value: f32) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.gain_mut(node)?.set(value);
        Ok(())
    }

    fn ramp_gain(
        &mut self,
        node: NodeId,
        target: f32,
        start_at: f64,
        end_at: f64,
    ) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.gain_mut(node)?.ramp_to(target, start_at, end_at);
        Ok(())
    }

    fn start(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        let state = self.source_state_mut(node)?;
        if *state != SourceState::Idle {
            return Err(GraphError::AlreadyStarted(node));
        }
        *state = SourceState::Playing;
        Ok(())
    }

    fn stop(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        let state = self.source_state_mut(node)?;
        if *state != SourceState::Playing {
            return Err(GraphError::AlreadyStopped(node));
        }
        *state = SourceState::Stopped;
        Ok(())
    }

    fn release(&mut self, node: NodeId) {
        if node == self.output {
            return;
        }
        self.nodes.remove(&node);
        self.edges.retain(|(from, to)| *from != node && *to != node);
    }

    fn frequency_data(&self, node: NodeId) -> Option<Vec<u8>> {
        let fft_size = match self.nodes.get(&node)? {
            SimNode::Analyser { fft_size } => *fft_size,
            _ => return None,
        };
        let level = self.level_into(node).clamp(0.0, 1.0);
        let byte = (level * 255.0).round() as u8;
        Some(vec![byte; fft_size / 2])
    }

    fn close(&mut self) {
        self.closed = true;
        for node in self.nodes.values_mut() {
            if let SimNode::Source { state, .. } = node
                && *state == SourceState::Playing
            {
                *state = SourceState::Stopped;
            }
        }
    }
}
