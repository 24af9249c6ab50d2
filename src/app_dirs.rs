use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "cogdrill";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Saved presets live here, one JSON file per game
    pub fn config_dir() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(format!(".{APP_NAME}")))
    }

    /// Append-only log of finished interactive sessions
    pub fn history_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME);
            Some(state_dir.join("history.jsonl"))
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|proj_dirs| proj_dirs.data_local_dir().join("history.jsonl"))
        }
    }
}
