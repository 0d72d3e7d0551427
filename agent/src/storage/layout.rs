//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// Where envsense keeps its configuration
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Directory holding captured `i2cdetect` output for offline runs
    pub fn replay_dir(&self) -> PathBuf {
        self.base_dir.join("replay")
    }

    /// Default directory for rolling log files
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // /etc/envsense on Linux, the user's home directory elsewhere
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/envsense");

        #[cfg(not(target_os = "linux"))]
        let base_dir = home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".envsense");

        Self::new(base_dir)
    }
}

#[cfg(not(target_os = "linux"))]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
