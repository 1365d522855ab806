//! Audio graph, playback engine and output backends.

use std::time::Duration;

pub mod analyser;
pub mod cpal_graph;
pub mod decoder;
pub mod engine;
pub mod graph;
pub mod loader;
pub mod output;
pub mod simulated;

mod device;
mod fade;
mod schedule;

pub use analyser::{AnalyserState, DEFAULT_FFT_SIZE};
pub use cpal_graph::{CpalBackend, CpalGraph};
pub use decoder::DecodedBuffer;
pub use engine::{EngineError, PlaybackEngine};
pub use fade::{GainAutomation, GainRamp, clamp_volume};
pub use graph::{AudioBackend, AudioGraph, GraphError, NodeId};
pub use loader::LoadError;
pub use output::{
    AudioDeviceSummary, AudioHostSummary, AudioOutputConfig, AudioOutputError, ResolvedOutput,
    available_devices, available_hosts,
};
pub use schedule::{FadeStatus, MasterFade};
pub use simulated::{SimClock, SimulatedBackend, SimulatedGraph};

/// Short fade applied when a source stops so the cut does not click.
pub(crate) const DEFAULT_ANTI_CLIP_FADE: Duration = Duration::from_millis(2);
