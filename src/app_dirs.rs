use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("sightline"),
            )
        } else {
            ProjectDirs::from("", "", "sightline")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn session_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sessions.csv"))
    }

    pub fn trace_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sightline.log"))
    }
}
