//! Session Keeper - keeps a signed-in session alive across primary storage loss.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use keeper_config_and_utils::{init_logging, Config, Paths};

/// Session keeper command-line interface.
#[derive(Parser)]
#[command(name = "session-keeper")]
#[command(about = "Persist, restore and refresh a Supabase auth session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (session, backup, logs, config). Defaults to ~/.session-keeper
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Keep both tiers in memory. Nothing survives the process.
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore the session if needed and print its state
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long, env = "SESSION_KEEPER_EMAIL")]
        email: String,
        #[arg(long, env = "SESSION_KEEPER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the session in both tiers
    Logout,
    /// Restore the session, then refresh it on SIGCONT/SIGUSR1 until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    let log_file = paths.log_file();
    init_logging(&config.log_level, Some(&log_file))?;

    let keeper = app::build(&config, &paths, cli.ephemeral)?;

    match cli.command {
        Some(Commands::Status) | None => app::status(&keeper).await?,
        Some(Commands::Login { email, password }) => {
            app::login(&keeper, &email, &password).await?;
        }
        Some(Commands::Logout) => app::logout(&keeper).await?,
        Some(Commands::Watch) => app::watch(&keeper).await?,
    }

    Ok(())
}
