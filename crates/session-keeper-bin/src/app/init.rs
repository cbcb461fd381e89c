//! Builds the keeper from configuration.

use keeper_config_and_utils::{Clock, Config, Paths, SystemClock};
use keeper_storage::{create_session_store, MemoryStorage, PrimarySessionStore};
use session_backup_store::{BackupPolicy, BackupStore, MemoryBackupStore, SqliteBackupStore};
use session_keeper::{KeeperOptions, SessionKeeper, SupabaseSessionHandle};
use std::sync::Arc;
use tracing::info;

/// The keeper plus the concrete handle, for commands that need Supabase calls.
pub struct App {
    pub keeper: SessionKeeper,
    pub supabase: Arc<SupabaseSessionHandle>,
}

pub fn build(
    config: &Config,
    paths: &Paths,
    ephemeral: bool,
) -> Result<App, Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let policy = BackupPolicy {
        retention: config.backup_retention(),
    };

    let (store, backup): (PrimarySessionStore, Arc<dyn BackupStore>) = if ephemeral {
        info!("Running with in-memory session tiers");
        (
            PrimarySessionStore::new(Box::new(MemoryStorage::new())),
            Arc::new(MemoryBackupStore::new(clock.clone(), policy)),
        )
    } else {
        let backup_path = paths.backup_database_file();
        info!(backup = %backup_path.display(), "Using keychain session tier with SQLite backup");
        (
            create_session_store(paths)?,
            Arc::new(SqliteBackupStore::new(backup_path, clock.clone(), policy)),
        )
    };

    let supabase_url = config.supabase_url()?;
    let supabase = Arc::new(SupabaseSessionHandle::new(
        store,
        supabase_url.as_str(),
        &config.supabase_publishable_key,
        clock.clone(),
    ));

    let keeper = SessionKeeper::new(
        supabase.clone(),
        backup,
        clock,
        KeeperOptions::from(config),
    );

    Ok(App { keeper, supabase })
}
