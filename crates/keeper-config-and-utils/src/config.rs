//! Configuration management for the session keeper.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://random.supabase.co",
};

/// Default Supabase publishable key (can be overridden at compile time via SUPABASE_PUBLISHABLE_KEY env var).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "random-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;
const DEFAULT_BACKUP_RETENTION_DAYS: u32 = 30;
const DEFAULT_ESTABLISH_TIMEOUT_SECS: u64 = 15;

/// Session keeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// Refresh proactively when fewer than this many seconds of access-token
    /// lifetime remain.
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,
    /// Backup records older than this are treated as absent.
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: u32,
    /// Upper bound on adopting a recovered token pair.
    #[serde(default = "default_establish_timeout_secs")]
    pub establish_timeout_secs: u64,
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_refresh_threshold_secs() -> u64 {
    DEFAULT_REFRESH_THRESHOLD_SECS
}

fn default_backup_retention_days() -> u32 {
    DEFAULT_BACKUP_RETENTION_DAYS
}

fn default_establish_timeout_secs() -> u64 {
    DEFAULT_ESTABLISH_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            supabase_url: DEFAULT_SUPABASE_URL.to_string(),
            supabase_publishable_key: DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string(),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            backup_retention_days: DEFAULT_BACKUP_RETENTION_DAYS,
            establish_timeout_secs: DEFAULT_ESTABLISH_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Only the log level can be overridden at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("SESSION_KEEPER_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    fn validate(&self) -> CoreResult<()> {
        if self.backup_retention_days == 0 {
            return Err(CoreError::Config(
                "backup_retention_days must be at least 1".to_string(),
            ));
        }
        if self.establish_timeout_secs == 0 {
            return Err(CoreError::Config(
                "establish_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.supabase_url()?;
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    pub fn backup_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.backup_retention_days))
    }

    pub fn establish_timeout(&self) -> Duration {
        Duration::from_secs(self.establish_timeout_secs)
    }
}
