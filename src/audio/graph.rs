//! Backend-neutral audio graph capabilities.
//!
//! The playback engine only talks to audio through these traits: nodes are
//! opaque [`NodeId`] handles, gain changes are scheduled against the graph's
//! own clock, and sources are started and stopped explicitly. Real output
//! lives in [`crate::audio::cpal_graph`]; deterministic tests use
//! [`crate::audio::simulated`].

use std::fmt;

use thiserror::Error;

/// Opaque handle to a node owned by an [`AudioGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a raw backend identifier.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw backend identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sequential [`NodeId`] allocator used by backends.
#[derive(Debug, Default)]
pub(crate) struct NodeIds {
    next: u64,
}

impl NodeIds {
    pub(crate) fn allocate(&mut self) -> NodeId {
        self.next += 1;
        NodeId(self.next)
    }
}

/// Errors reported by graph primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The node does not exist (never created or already released).
    #[error("Unknown audio node {0}")]
    UnknownNode(NodeId),
    /// The node is not of the kind required by the operation.
    #[error("Audio node {0} does not support this operation")]
    WrongKind(NodeId),
    /// `start` was called on a source that already started.
    #[error("Audio source {0} was already started")]
    AlreadyStarted(NodeId),
    /// `stop` was called on a source that is not playing.
    #[error("Audio source {0} was already stopped")]
    AlreadyStopped(NodeId),
    /// `disconnect` was called for an edge that does not exist.
    #[error("Audio node {from} is not connected to {to}")]
    NotConnected {
        /// Upstream node.
        from: NodeId,
        /// Downstream node.
        to: NodeId,
    },
    /// The graph was closed.
    #[error("Audio graph is closed")]
    Closed,
    /// Encoded audio could not be turned into a buffer.
    #[error("Audio decode failed: {0}")]
    Decode(String),
}

/// Factory for the process-wide audio graph.
///
/// `open` runs lazily on the first engine call that needs audio, which keeps
/// device acquisition behind an explicit user action.
pub trait AudioBackend {
    /// Graph type produced by this backend.
    type Graph: AudioGraph;
    /// Error returned when the graph cannot be opened.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new graph with a live output node.
    fn open(&mut self) -> Result<Self::Graph, Self::Error>;
}

/// Audio graph primitives used by the playback engine.
pub trait AudioGraph {
    /// Decoded, read-only sample buffer shared by every voice that plays it.
    type Buffer: Clone;

    /// Graph clock in seconds; ramps and delayed work are expressed on it.
    fn current_time(&self) -> f64;

    /// Hardware output node.
    fn output(&self) -> NodeId;

    /// Decode encoded audio bytes into a buffer.
    fn decode(&mut self, bytes: &[u8], hint: Option<&str>) -> Result<Self::Buffer, GraphError>;

    /// Create a gain node with an initial value.
    fn create_gain(&mut self, value: f32) -> Result<NodeId, GraphError>;

    /// Create an unstarted source node bound to `buffer`.
    fn create_source(&mut self, buffer: &Self::Buffer, looping: bool)
    -> Result<NodeId, GraphError>;

    /// Create an analyser node with the given FFT size.
    fn create_analyser(&mut self, fft_size: usize) -> Result<NodeId, GraphError>;

    /// Wire `from` into `to`.
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError>;

    /// Remove the `from` → `to` edge.
    fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError>;

    /// Gain value of `node` at the current graph time.
    fn gain(&self, node: NodeId) -> Option<f32>;

    /// Set a gain immediately, cancelling scheduled automation.
    fn set_gain(&mut self, node: NodeId, value: f32) -> Result<(), GraphError>;

    /// Linearly ramp a gain from its value at `start_at` to `target` at `end_at`.
    fn ramp_gain(
        &mut self,
        node: NodeId,
        target: f32,
        start_at: f64,
        end_at: f64,
    ) -> Result<(), GraphError>;

    /// Start a source immediately.
    fn start(&mut self, node: NodeId) -> Result<(), GraphError>;

    /// Stop a playing source.
    fn stop(&mut self, node: NodeId) -> Result<(), GraphError>;

    /// Drop a node and every edge touching it.
    fn release(&mut self, node: NodeId);

    /// Byte-scaled frequency magnitudes of an analyser node.
    fn frequency_data(&self, node: NodeId) -> Option<Vec<u8>>;

    /// Close the graph and release the output device.
    fn close(&mut self);
}
