use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use harmoni::app_dirs::CONFIG_HOME_ENV;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Points `HARMONI_CONFIG_HOME` at a test directory until dropped.
pub struct HarmoniEnvGuard {
    previous: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl HarmoniEnvGuard {
    pub fn set_config_home(path: PathBuf) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::env::var(CONFIG_HOME_ENV).ok();
        // SAFETY: env mutation is serialized by ENV_LOCK.
        unsafe {
            std::env::set_var(CONFIG_HOME_ENV, path);
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for HarmoniEnvGuard {
    fn drop(&mut self) {
        // SAFETY: env mutation is serialized by ENV_LOCK.
        unsafe {
            match self.previous.take() {
                Some(value) => std::env::set_var(CONFIG_HOME_ENV, value),
                None => std::env::remove_var(CONFIG_HOME_ENV),
            }
        }
    }
}
