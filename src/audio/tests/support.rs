use std::time::Duration;

use super::super::simulated::{SimBuffer, SimClock, SimulatedBackend, SimulatedGraph};
use super::super::{NodeId, PlaybackEngine};

pub(crate) struct Harness {
    pub engine: PlaybackEngine<SimulatedBackend>,
    pub clock: SimClock,
}

impl Harness {
    pub fn new() -> Self {
        let backend = SimulatedBackend::new();
        let clock = backend.clock();
        Self {
            engine: PlaybackEngine::new(backend),
            clock,
        }
    }

    /// Engine initialized with a decoded buffer for each id.
    pub fn with_sounds(ids: &[&str]) -> Self {
        let mut harness = Self::new();
        harness.engine.initialize().expect("initialize engine");
        for id in ids {
            harness.engine.insert_buffer(*id, buffer(id.len()));
        }
        harness
    }

    /// Advance the simulated clock and run due work.
    pub fn advance_ms(&mut self, ms: u64) -> usize {
        self.clock.advance(Duration::from_millis(ms));
        self.engine.poll()
    }

    pub fn graph(&self) -> &SimulatedGraph {
        self.engine.graph().expect("graph open")
    }

    pub fn voice(&self, id: &str) -> (NodeId, NodeId) {
        self.engine.voice_nodes(id).expect("voice exists")
    }
}

pub(crate) fn buffer(len: usize) -> SimBuffer {
    SimBuffer {
        len: len.max(1),
        hint: None,
    }
}

pub(crate) fn approx(actual: Option<f32>, expected: f32) -> bool {
    actual.is_some_and(|value| (value - expected).abs() < 1e-4)
}
