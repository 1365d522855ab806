use super::super::{AudioGraph, DEFAULT_FFT_SIZE};
use super::support::Harness;

#[test]
fn connect_analyzer_taps_master_once() {
    let mut harness = Harness::with_sounds(&["rain"]);
    let analyser = harness.engine.create_analyzer(DEFAULT_FFT_SIZE).unwrap();
    let master = harness.engine.master().unwrap();
    harness.engine.connect_analyzer(analyser);
    harness.engine.connect_analyzer(analyser);
    assert_eq!(harness.engine.analyzers(), &[analyser]);
    assert!(harness.graph().is_connected(master, analyser));
    assert_eq!(harness.graph().targets(master).len(), 2);
}

#[test]
fn disconnect_analyzer_is_idempotent() {
    let mut harness = Harness::with_sounds(&["rain"]);
    let analyser = harness.engine.create_analyzer(64).unwrap();
    let master = harness.engine.master().unwrap();
    harness.engine.disconnect_analyzer(analyser);
    harness.engine.connect_analyzer(analyser);
    harness.engine.disconnect_analyzer(analyser);
    harness.engine.disconnect_analyzer(analyser);
    assert!(harness.engine.analyzers().is_empty());
    assert!(!harness.graph().is_connected(master, analyser));
}

#[test]
fn analyser_sees_master_output() {
    let mut harness = Harness::with_sounds(&["rain"]);
    let analyser = harness.engine.create_analyzer(DEFAULT_FFT_SIZE).unwrap();
    harness.engine.connect_analyzer(analyser);
    let silent = harness.engine.frequency_data(analyser).unwrap();
    assert_eq!(silent.len(), DEFAULT_FFT_SIZE / 2);
    assert!(silent.iter().all(|bin| *bin == 0));

    harness.engine.play("rain", 1.0);
    let loud = harness.engine.frequency_data(analyser).unwrap();
    assert!(loud.iter().all(|bin| *bin == 255));
}

#[test]
fn analyzer_requires_initialized_graph() {
    let mut harness = Harness::new();
    assert!(harness.engine.create_analyzer(DEFAULT_FFT_SIZE).is_none());
    harness.engine.initialize().unwrap();
    let analyser = harness.engine.create_analyzer(DEFAULT_FFT_SIZE).unwrap();
    assert!(harness.graph().frequency_data(analyser).is_some());
}
