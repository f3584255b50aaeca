use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "glint";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    pub fn config_path() -> PathBuf {
        Self::project()
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("glint_config.json"))
    }

    /// The single persisted blob; `None` when the platform has no data dir.
    pub fn garden_path() -> Option<PathBuf> {
        Self::project().map(|pd| pd.data_local_dir().join("garden.json"))
    }
}
