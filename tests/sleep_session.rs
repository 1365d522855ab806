//! End-to-end listening session: play, save, share, import and fall asleep.

use std::time::Duration;

use harmoni::audio::{PlaybackEngine, SimClock, SimulatedBackend};
use harmoni::clipboard::{Clipboard, ClipboardError};
use harmoni::config::AppSettings;
use harmoni::mix::{JsonFileStore, decode};
use harmoni::session::Session;
use harmoni::timer::TimerSignal;
use tempfile::{TempDir, tempdir};
use url::Url;

struct Recorder(Option<String>);

impl Clipboard for Recorder {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.0 = Some(text.to_string());
        Ok(())
    }
}

fn session(
    settings: &AppSettings,
) -> (Session<SimulatedBackend, JsonFileStore>, SimClock, TempDir) {
    let dir = tempdir().unwrap();
    let sounds = dir.path().join("public");
    for path in [
        "sounds/nature/rain.mp3",
        "sounds/nature/ocean.mp3",
        "sounds/ambient/fireplace.mp3",
    ] {
        let full = sounds.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, b"not really mp3 but the simulated graph does not care").unwrap();
    }
    let backend = SimulatedBackend::new();
    let clock = backend.clock();
    let mut engine = PlaybackEngine::new(backend);
    engine.set_sounds_root(Some(sounds));
    let mut session = Session::new(engine, JsonFileStore::new(dir.path().join("data")), settings);
    let loaded: Vec<String> = session
        .load_catalog()
        .into_iter()
        .filter(|(_, result)| result.is_ok())
        .map(|(id, _)| id.to_string())
        .collect();
    assert_eq!(loaded, vec!["rain", "ocean", "fireplace"]);
    (session, clock, dir)
}

fn run_for(
    session: &mut Session<SimulatedBackend, JsonFileStore>,
    clock: &SimClock,
    secs: u64,
) -> Vec<TimerSignal> {
    let mut signals = Vec::new();
    for _ in 0..secs * 4 {
        clock.advance(Duration::from_millis(250));
        signals.extend(
            session
                .advance(Duration::from_millis(250))
                .into_iter()
                .filter_map(|tick| tick.signal),
        );
    }
    signals
}

#[test]
fn sleep_timer_fades_the_mix_out() {
    let mut settings = AppSettings::default();
    settings.timer.duration_minutes = 1;
    settings.timer.fade_out_seconds = 10;
    let (mut session, clock, _dir) = session(&settings);
    session.play_sound("rain");
    session.play_sound("fireplace");
    session.change_volume("fireplace", 0.8);
    session.start_timer().unwrap();

    let signals = run_for(&mut session, &clock, 50);
    assert_eq!(signals, vec![TimerSignal::FadeStarted]);
    assert_eq!(session.timer().display(), "00:10");

    let signals = run_for(&mut session, &clock, 10);
    assert_eq!(signals, vec![TimerSignal::Completed { fade_out_ms: 10_000 }]);
    assert!(session.is_fading_out());
    let master = session.engine().master_gain().unwrap();
    assert!(master > 0.9);

    run_for(&mut session, &clock, 5);
    let master = session.engine().master_gain().unwrap();
    assert!((master - 0.5).abs() < 0.05);

    run_for(&mut session, &clock, 5);
    assert!(!session.is_fading_out());
    assert!(session.active_sounds().is_empty());
    assert!(session.engine().active_sounds().is_empty());
    assert_eq!(session.engine().master_gain(), Some(1.0));
}

#[test]
fn shared_link_round_trip_between_sessions() {
    let settings = AppSettings::default();
    let (mut alice, _, _alice_dir) = session(&settings);
    alice.play_sound("ocean");
    alice.change_volume("ocean", 0.35);
    alice.play_sound("rain");
    alice.stop_sound("rain");
    let mix = alice.save_mix("Low Tide").unwrap();

    let mut clipboard = Recorder(None);
    let outcome = alice.share_mix(&mix.id, None, &mut clipboard).unwrap();
    assert!(outcome.success);
    let link = clipboard.0.unwrap();
    assert!(link.starts_with("https://harmoni.app?mix="));
    let token = link.split_once("?mix=").unwrap().1;
    let shared = decode(token).unwrap();
    assert_eq!(shared.name, "Low Tide");
    assert_eq!(shared.sounds.len(), 2);

    let (mut bob, _, _bob_dir) = session(&settings);
    let (imported, cleaned) = bob.import_shared(&Url::parse(&link).unwrap()).unwrap();
    assert_eq!(imported.name, "Low Tide (Shared)");
    assert_eq!(cleaned.as_str(), "https://harmoni.app/");
    assert!(bob.engine().is_playing("ocean"));
    assert!(!bob.engine().is_playing("rain"));
    assert_eq!(bob.engine().volume("ocean"), Some(0.35));
    assert_eq!(bob.remembered_volume("rain"), Some(0.5));
}
