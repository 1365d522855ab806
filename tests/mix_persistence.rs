//! Mixes, custom sounds and settings persisted under the app directory.

mod support;

use harmoni::app_dirs;
use harmoni::catalog::{Sound, SoundCategory, SoundId, SoundLibrary};
use harmoni::config::{self, AppSettings};
use harmoni::mix::{JsonFileStore, MIXES_KEY, MixLibrary, SoundSetting};
use support::harmoni_env::HarmoniEnvGuard;
use tempfile::tempdir;

fn data_store() -> JsonFileStore {
    JsonFileStore::new(app_dirs::data_dir().unwrap())
}

#[test]
fn mixes_survive_a_restart() {
    let dir = tempdir().unwrap();
    let _env = HarmoniEnvGuard::set_config_home(dir.path().to_path_buf());

    let mut library = MixLibrary::new(data_store());
    let sounds = vec![
        SoundSetting::new("rain", 0.4, true),
        SoundSetting::new("fireplace", 0.7, true),
    ];
    let mix = library.create("Cabin", sounds.clone()).unwrap();
    let other = library.create("Spare", Vec::new()).unwrap();
    assert!(library.delete(&other.id).unwrap());

    let file = dir
        .path()
        .join(app_dirs::APP_DIR_NAME)
        .join("data")
        .join(format!("{MIXES_KEY}.json"));
    assert!(file.is_file());

    let reopened = MixLibrary::new(data_store());
    assert_eq!(reopened.mixes().len(), 1);
    let stored = &reopened.mixes()[0];
    assert_eq!(stored.id, mix.id);
    assert_eq!(stored.sounds, sounds);
    assert_eq!(stored.created_at, mix.created_at);
}

#[test]
fn custom_sounds_are_stored_next_to_mixes() {
    let dir = tempdir().unwrap();
    let _env = HarmoniEnvGuard::set_config_home(dir.path().to_path_buf());

    let mut library = SoundLibrary::new(data_store());
    assert!(library.add_sound(Sound {
        id: SoundId::from("freesound_77"),
        name: "Harbour".into(),
        category: SoundCategory::Ambient,
        description: "Boats and gulls".into(),
        filepath: "https://cdn.freesound.org/previews/0/77-hq.mp3".into(),
        icon_path: None,
        source: None,
    }));

    let reopened = SoundLibrary::new(data_store());
    assert_eq!(reopened.custom_sounds().len(), 1);
    assert_eq!(
        reopened.by_category(Some(SoundCategory::Ambient)).len(),
        3
    );
}

#[test]
fn settings_load_from_config_home() {
    let dir = tempdir().unwrap();
    let _env = HarmoniEnvGuard::set_config_home(dir.path().to_path_buf());

    assert_eq!(config::load_or_default().unwrap(), AppSettings::default());
    let mut settings = AppSettings::default();
    settings.timer.duration_minutes = 90;
    settings.freesound.api_key = "token".into();
    config::save(&settings).unwrap();

    let path = config::config_path().unwrap();
    assert!(path.starts_with(dir.path()));
    let loaded = config::load_or_default().unwrap();
    assert_eq!(loaded.timer.duration_minutes, 90);
    assert!(loaded.freesound.is_configured());
}
