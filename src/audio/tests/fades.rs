use std::time::Duration;

use super::super::FadeStatus;
use super::support::{Harness, approx};

#[test]
fn fade_out_and_stop_removes_voice_after_fade() {
    let mut harness = Harness::with_sounds(&["rain"]);
    harness.engine.play("rain", 0.8);
    harness
        .engine
        .fade_out_and_stop_sound("rain", Duration::from_millis(400));
    harness.advance_ms(200);
    assert!(harness.engine.is_playing("rain"));
    assert!(approx(harness.engine.volume("rain"), 0.4));
    assert_eq!(harness.advance_ms(200), 1);
    assert!(!harness.engine.is_playing("rain"));
}

#[test]
fn delayed_stop_spares_a_newer_voice() {
    let mut harness = Harness::with_sounds(&["rain"]);
    harness.engine.play("rain", 0.8);
    harness
        .engine
        .fade_out_and_stop_sound("rain", Duration::from_millis(400));
    harness.advance_ms(100);
    harness.engine.play("rain", 0.6);
    harness.advance_ms(500);
    assert!(harness.engine.is_playing("rain"));
    assert!(approx(harness.engine.volume("rain"), 0.6));
}

#[test]
fn zero_length_fade_stops_immediately() {
    let mut harness = Harness::with_sounds(&["rain"]);
    harness.engine.play("rain", 0.8);
    harness.engine.fade_out_and_stop_sound("rain", Duration::ZERO);
    assert!(!harness.engine.is_playing("rain"));
}

#[test]
fn fade_out_all_completes_after_fade_and_restores_master() {
    let mut harness = Harness::with_sounds(&["rain", "cafe"]);
    harness.engine.play("rain", 0.5);
    harness.engine.play("cafe", 0.7);
    let fade = harness.engine.fade_out_all(Duration::from_millis(1_000));
    assert_eq!(fade.status(), FadeStatus::Pending);

    harness.advance_ms(500);
    assert!(!fade.is_done());
    assert!(approx(harness.engine.master_gain(), 0.5));
    assert_eq!(harness.engine.active_sounds().len(), 2);

    harness.advance_ms(500);
    assert!(fade.is_completed());
    assert!(harness.engine.active_sounds().is_empty());
    assert_eq!(harness.engine.master_gain(), Some(1.0));

    harness.engine.play("rain", 0.9);
    let (source, _) = harness.voice("rain");
    assert!(approx(harness.graph().audible_gain(source), 0.9));
}

#[test]
fn fade_out_all_with_nothing_playing_resolves_immediately() {
    let mut harness = Harness::with_sounds(&["rain"]);
    let fade = harness.engine.fade_out_all(Duration::from_secs(5));
    assert!(fade.is_completed());
    assert_eq!(harness.engine.pending_tasks(), 0);
    assert_eq!(harness.engine.master_gain(), Some(1.0));
}

#[test]
fn newer_master_fade_supersedes_older_one() {
    let mut harness = Harness::with_sounds(&["rain"]);
    harness.engine.play("rain", 1.0);
    let first = harness.engine.fade_out_all(Duration::from_millis(1_000));
    harness.advance_ms(500);
    let second = harness.engine.fade_out_all(Duration::from_millis(2_000));
    assert_eq!(first.status(), FadeStatus::Superseded);

    // The first fade's deadline passes without stopping anything.
    harness.advance_ms(600);
    assert!(harness.engine.is_playing("rain"));
    assert!(!second.is_done());

    // The second ramp started from the level the first one had reached.
    assert!(approx(harness.engine.master_gain(), 0.5 * (1.0 - 600.0 / 2_000.0)));

    harness.advance_ms(1_400);
    assert!(second.is_completed());
    assert!(!harness.engine.is_playing("rain"));
    assert_eq!(first.status(), FadeStatus::Superseded);
}

#[test]
fn stop_all_cancels_pending_master_fade() {
    let mut harness = Harness::with_sounds(&["rain", "ocean"]);
    harness.engine.play("rain", 1.0);
    harness.engine.play("ocean", 1.0);
    let fade = harness.engine.fade_out_all(Duration::from_millis(1_000));
    harness.advance_ms(300);
    harness.engine.stop_all();
    assert_eq!(fade.status(), FadeStatus::Superseded);
    assert!(harness.engine.active_sounds().is_empty());
    assert_eq!(harness.engine.master_gain(), Some(1.0));

    harness.engine.play("rain", 0.4);
    harness.advance_ms(2_000);
    assert!(harness.engine.is_playing("rain"));
    assert_eq!(fade.status(), FadeStatus::Superseded);
}

#[test]
fn stop_all_releases_every_voice() {
    let mut harness = Harness::with_sounds(&["rain", "ocean", "cafe"]);
    for id in ["rain", "ocean", "cafe"] {
        harness.engine.play(id, 0.5);
    }
    harness.engine.stop_all();
    assert!(harness.engine.active_sounds().is_empty());
    assert_eq!(harness.graph().playing_sources(), 0);
    assert_eq!(harness.graph().node_count(), 2);
}

#[test]
fn refade_with_nothing_left_restores_master() {
    let mut harness = Harness::with_sounds(&["rain"]);
    harness.engine.play("rain", 0.8);
    let first = harness.engine.fade_out_all(Duration::from_millis(1_000));
    harness.advance_ms(500);
    harness.engine.stop_sound("rain");

    let second = harness.engine.fade_out_all(Duration::from_millis(1_000));
    assert_eq!(first.status(), FadeStatus::Superseded);
    assert!(second.is_completed());
    assert_eq!(harness.engine.master_gain(), Some(1.0));

    harness.advance_ms(5_000);
    harness.engine.play("rain", 0.8);
    assert_eq!(harness.engine.master_gain(), Some(1.0));
    assert!(approx(harness.engine.volume("rain"), 0.8));
}

#[test]
fn instant_fade_over_a_pending_one_restores_master() {
    let mut harness = Harness::with_sounds(&["rain", "cafe"]);
    harness.engine.play("rain", 0.5);
    harness.engine.play("cafe", 0.5);
    let first = harness.engine.fade_out_all(Duration::from_millis(1_000));
    harness.advance_ms(500);

    let second = harness.engine.fade_out_all(Duration::ZERO);
    assert_eq!(first.status(), FadeStatus::Superseded);
    assert!(second.is_completed());
    assert!(harness.engine.active_sounds().is_empty());
    assert_eq!(harness.engine.master_gain(), Some(1.0));
}
