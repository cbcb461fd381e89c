//! File system paths for the session keeper.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the session keeper.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for all runtime files (~/.session-keeper)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.session-keeper`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".session-keeper"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.session-keeper).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.session-keeper/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Durable backup database (~/.session-keeper/backup.sqlite).
    pub fn backup_database_file(&self) -> PathBuf {
        self.base_dir.join("backup.sqlite")
    }

    /// Primary session storage directory (~/.session-keeper/session).
    pub fn primary_session_dir(&self) -> PathBuf {
        self.base_dir.join("session")
    }

    /// Get the logs directory (~/.session-keeper/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Structured log file (~/.session-keeper/logs/session-keeper.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("session-keeper.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.primary_session_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
