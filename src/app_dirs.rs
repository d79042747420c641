use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "dozewatch";

/// Where dozewatch keeps its preference file and its log.
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    /// `<config_dir>/dozewatch/config.json`
    pub fn config_path() -> Option<PathBuf> {
        Self::project().map(|pd| pd.config_dir().join("config.json"))
    }

    /// XDG-style state dir under `$HOME`, else the platform's local data dir.
    pub fn state_dir() -> Option<PathBuf> {
        match std::env::var_os("HOME") {
            Some(home) if !home.is_empty() => Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME),
            ),
            _ => Self::project().map(|pd| pd.data_local_dir().to_path_buf()),
        }
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join(format!("{}.log", APP_NAME)))
    }
}
