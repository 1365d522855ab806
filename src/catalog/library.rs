//! Built-in sounds plus user additions persisted in the key-value store.

use tracing::{error, info, warn};

use super::{Sound, SoundCategory, SoundId};
use crate::mix::store::KeyValueStore;

/// Storage key holding the JSON array of custom sounds.
pub const CUSTOM_SOUNDS_KEY: &str = "harmoni_custom_sounds";

struct BuiltIn {
    id: &'static str,
    name: &'static str,
    category: SoundCategory,
    description: &'static str,
    filepath: &'static str,
    icon: &'static str,
}

const BUILT_IN: &[BuiltIn] = &[
    BuiltIn {
        id: "rain",
        name: "Rainfall",
        category: SoundCategory::Nature,
        description: "Gentle rain falling on a rooftop",
        filepath: "/sounds/nature/rain.mp3",
        icon: "/icons/rain.svg",
    },
    BuiltIn {
        id: "forest",
        name: "Forest",
        category: SoundCategory::Nature,
        description: "Peaceful forest with birds chirping",
        filepath: "/sounds/nature/forest.mp3",
        icon: "/icons/forest.svg",
    },
    BuiltIn {
        id: "ocean",
        name: "Ocean Waves",
        category: SoundCategory::Nature,
        description: "Waves crashing on the shore",
        filepath: "/sounds/nature/ocean.mp3",
        icon: "/icons/ocean.svg",
    },
    BuiltIn {
        id: "thunder",
        name: "Distant Thunder",
        category: SoundCategory::Nature,
        description: "Rolling thunder in the distance",
        filepath: "/sounds/nature/thunder.mp3",
        icon: "/icons/thunder.svg",
    },
    BuiltIn {
        id: "cafe",
        name: "Café",
        category: SoundCategory::Ambient,
        description: "Quiet café with soft background chatter",
        filepath: "/sounds/ambient/cafe.mp3",
        icon: "/icons/cafe.svg",
    },
    BuiltIn {
        id: "fireplace",
        name: "Fireplace",
        category: SoundCategory::Ambient,
        description: "Crackling fireplace with wood burning",
        filepath: "/sounds/ambient/fireplace.mp3",
        icon: "/icons/fireplace.svg",
    },
    BuiltIn {
        id: "white-noise",
        name: "White Noise",
        category: SoundCategory::White,
        description: "Pure white noise",
        filepath: "/sounds/white/white-noise.mp3",
        icon: "/icons/white-noise.svg",
    },
    BuiltIn {
        id: "brown-noise",
        name: "Brown Noise",
        category: SoundCategory::White,
        description: "Brown noise (deeper than white noise)",
        filepath: "/sounds/white/brown-noise.mp3",
        icon: "/icons/brown-noise.svg",
    },
    BuiltIn {
        id: "pink-noise",
        name: "Pink Noise",
        category: SoundCategory::White,
        description: "Pink noise (balanced frequency)",
        filepath: "/sounds/white/pink-noise.mp3",
        icon: "/icons/pink-noise.svg",
    },
    BuiltIn {
        id: "singing-bowl",
        name: "Singing Bowl",
        category: SoundCategory::Meditation,
        description: "Tibetan singing bowl resonance",
        filepath: "/sounds/meditation/singing-bowl.mp3",
        icon: "/icons/singing-bowl.svg",
    },
    BuiltIn {
        id: "om-chant",
        name: "Om Chant",
        category: SoundCategory::Meditation,
        description: "Deep om chanting",
        filepath: "/sounds/meditation/om-chant.mp3",
        icon: "/icons/om.svg",
    },
];

/// The sounds shipped with the app.
pub fn default_sounds() -> Vec<Sound> {
    BUILT_IN
        .iter()
        .map(|entry| Sound {
            id: SoundId::from(entry.id),
            name: entry.name.to_string(),
            category: entry.category,
            description: entry.description.to_string(),
            filepath: entry.filepath.to_string(),
            icon_path: Some(entry.icon.to_string()),
            source: None,
        })
        .collect()
}

/// Default sounds followed by custom sounds, in insertion order.
pub struct SoundLibrary<S> {
    store: S,
    defaults: Vec<Sound>,
    custom: Vec<Sound>,
}

impl<S: KeyValueStore> SoundLibrary<S> {
    /// Load custom sounds from `store`; unreadable entries are logged and skipped.
    pub fn new(store: S) -> Self {
        let custom = match store.get(CUSTOM_SOUNDS_KEY) {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|err| {
                error!("Error loading custom sounds: {err}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                error!("Error loading custom sounds: {err}");
                Vec::new()
            }
        };
        Self {
            store,
            defaults: default_sounds(),
            custom,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Sound> {
        self.all().find(|sound| sound.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> impl Iterator<Item = &Sound> {
        self.defaults.iter().chain(self.custom.iter())
    }

    pub fn len(&self) -> usize {
        self.defaults.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sounds in `category`, or everything when `None`.
    pub fn by_category(&self, category: Option<SoundCategory>) -> Vec<&Sound> {
        self.all()
            .filter(|sound| category.is_none_or(|category| sound.category == category))
            .collect()
    }

    pub fn custom_sounds(&self) -> &[Sound] {
        &self.custom
    }

    /// Add a custom sound; `false` when the id is already taken.
    pub fn add_sound(&mut self, sound: Sound) -> bool {
        if self.contains(sound.id.as_str()) {
            warn!("Sound with ID {} already exists in the library", sound.id);
            return false;
        }
        info!(id = %sound.id, "Added custom sound {:?}", sound.name);
        self.custom.push(sound);
        self.persist();
        true
    }

    /// Remove a custom sound; built-in sounds cannot be removed.
    pub fn remove_sound(&mut self, id: &str) -> bool {
        let Some(index) = self.custom.iter().position(|sound| sound.id.as_str() == id) else {
            warn!("Cannot remove sound {id} as it is not a custom sound");
            return false;
        };
        self.custom.remove(index);
        self.persist();
        true
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.custom)
            .map_err(|err| err.to_string())
            .and_then(|text| {
                self.store
                    .set(CUSTOM_SOUNDS_KEY, &text)
                    .map_err(|err| err.to_string())
            });
        if let Err(err) = result {
            error!("Error saving custom sounds: {err}");
        }
    }
}
