use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "flinch";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// State lives under $HOME/.local/state/flinch when HOME is set
    pub fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            proj_dirs.data_local_dir().to_path_buf()
        } else {
            PathBuf::from(".")
        }
    }

    pub fn rankings_path() -> PathBuf {
        Self::state_dir().join("rankings.json")
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("flinch.log")
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("flinch_config.json"))
    }
}
