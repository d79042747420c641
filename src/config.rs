use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::app_dirs::AppDirs;
use crate::sensitivity::Sensitivity;

/// Persisted user preferences. The sensitivity is stored as its label so an
/// unknown value written by another version still loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sensitivity: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from(Sensitivity::default())
    }
}

impl From<Sensitivity> for Config {
    fn from(s: Sensitivity) -> Self {
        Self {
            sensitivity: s.label().to_string(),
        }
    }
}

impl Config {
    /// Resolves the stored label, falling back to medium.
    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity::from_label(&self.sensitivity).unwrap_or_else(|| {
            debug!(label = %self.sensitivity, "unrecognized sensitivity, using default");
            Sensitivity::default()
        })
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// Store at the platform config location, or `./dozewatch_config.json`
    /// when no home directory can be resolved.
    pub fn new() -> Self {
        Self::with_path(
            AppDirs::config_path().unwrap_or_else(|| PathBuf::from("dozewatch_config.json")),
        )
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Config::default(),
        };
        serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
            debug!(path = %self.path.display(), error = %e, "config unreadable, using defaults");
            Config::default()
        })
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        debug!(path = %self.path.display(), sensitivity = %cfg.sensitivity, "config saved");
        Ok(())
    }
}

/// Keeps the config in memory; used when persistence is not wanted.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    cfg: std::sync::Mutex<Config>,
}

impl MemoryConfigStore {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg: std::sync::Mutex::new(cfg),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Config {
        self.cfg.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        let mut guard = self
            .cfg
            .lock()
            .map_err(|_| std::io::Error::other("config lock poisoned"))?;
        *guard = cfg.clone();
        Ok(())
    }
}
