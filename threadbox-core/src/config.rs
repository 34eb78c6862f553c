//! Ambient configuration: resolving where the storage engine's database
//! file lives on disk.

use std::path::{Path, PathBuf};

use crate::error::StorageResult;

const DB_FILE_NAME: &str = "threadbox.db";

/// Resolved location of the engine's on-disk state.
#[derive(Debug, Clone)]
pub struct DataPathConfig {
    pub data_dir: PathBuf,
}

impl DataPathConfig {
    /// `override_dir` wins if present; otherwise falls back to
    /// `$HOME/.threadbox/data` (`%USERPROFILE%\.threadbox\data` on Windows).
    pub fn resolve(override_dir: Option<PathBuf>) -> StorageResult<Self> {
        let data_dir = match override_dir {
            Some(dir) => dir,
            None => {
                let home = dirs::home_dir().ok_or_else(|| {
                    crate::error::StorageError::invalid_operation(
                        "could not determine home directory",
                    )
                })?;
                let dir = home.join(".threadbox").join("data");
                tracing::info!(path = %dir.display(), "no --data-path given, using default data directory");
                dir
            }
        };
        Ok(Self { data_dir })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
