use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Where the interactive game writes its log file; the terminal itself is
    /// occupied by the game screen.
    pub fn log_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("palmseek"),
            )
        } else {
            ProjectDirs::from("", "", "palmseek")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }
}
