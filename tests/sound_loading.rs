//! Loading catalog sounds from disk into the engine.

mod support;

use harmoni::audio::decoder::decode_bytes;
use harmoni::audio::{LoadError, PlaybackEngine, SimulatedBackend};
use harmoni::catalog::SoundId;
use support::wav::{sine, write_test_wav};
use tempfile::tempdir;

#[test]
fn root_relative_paths_resolve_under_sounds_dir() {
    let dir = tempdir().unwrap();
    write_test_wav(
        &dir.path().join("sounds/nature/rain.wav"),
        8_000,
        &sine(8_000, 440.0, 800),
    );
    let mut engine = PlaybackEngine::new(SimulatedBackend::new());
    engine.set_sounds_root(Some(dir.path().to_path_buf()));

    engine.load_sound("rain", "/sounds/nature/rain.wav").unwrap();
    assert!(engine.is_initialized());
    assert!(engine.is_loaded("rain"));
    engine.play("rain", 0.6);
    assert_eq!(engine.active_sounds(), vec![SoundId::from("rain")]);
}

#[test]
fn missing_files_fail_without_touching_other_sounds() {
    let dir = tempdir().unwrap();
    write_test_wav(&dir.path().join("sounds/white/pink.wav"), 8_000, &[0.1; 64]);
    let mut engine = PlaybackEngine::new(SimulatedBackend::new());
    engine.set_sounds_root(Some(dir.path().to_path_buf()));

    let results = engine.load_sounds([
        ("pink-noise", "/sounds/white/pink.wav"),
        ("thunder", "/sounds/nature/thunder.wav"),
    ]);
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_ok());
    assert!(matches!(results[1].1, Err(LoadError::Fetch { .. })));
    assert!(engine.is_loaded("pink-noise"));
    assert!(!engine.is_loaded("thunder"));
    engine.play("thunder", 0.5);
    assert!(engine.active_sounds().is_empty());
}

#[test]
fn file_urls_are_accepted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bowl.wav");
    write_test_wav(&path, 8_000, &sine(8_000, 220.0, 400));
    let url = url::Url::from_file_path(&path).unwrap();
    let mut engine = PlaybackEngine::new(SimulatedBackend::new());
    engine.load_sound("singing-bowl", url.as_str()).unwrap();
    assert!(engine.is_loaded("singing-bowl"));
}

#[test]
fn unavailable_output_reports_backend_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rain.wav");
    write_test_wav(&path, 8_000, &[0.0; 16]);
    let mut engine = PlaybackEngine::new(SimulatedBackend::unavailable());
    let err = engine
        .load_sound("rain", path.to_str().unwrap())
        .unwrap_err();
    assert!(matches!(err, LoadError::Backend(_)));
}

#[test]
fn wav_files_decode_to_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_test_wav(&path, 16_000, &sine(16_000, 1_000.0, 1_600));
    let bytes = std::fs::read(&path).unwrap();
    let decoded = decode_bytes(&bytes, Some("wav")).unwrap();
    assert_eq!(decoded.sample_rate(), 16_000);
    assert_eq!(decoded.channels(), 1);
    assert_eq!(decoded.frames(), 1_600);
    assert!((decoded.duration().as_secs_f64() - 0.1).abs() < 1e-6);
}
