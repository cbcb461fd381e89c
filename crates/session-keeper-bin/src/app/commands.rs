//! Command handlers.

use super::lifecycle_signals;
use super::App;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Restore the session if needed and print where it stands.
pub async fn status(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let restored = app.keeper.ensure_session().await;
    let phase = app.keeper.phase();

    let Some(session) = app.keeper.handle().get_current().await? else {
        println!("Not signed in ({phase:?})");
        return Ok(());
    };

    let remaining = session.remaining_lifetime(Utc::now().timestamp());
    let expires_at = DateTime::<Utc>::from_timestamp(session.expires_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| session.expires_at.to_string());

    println!("Signed in");
    println!("  User:     {}", session.user_id);
    if let Some(email) = &session.email {
        println!("  Email:    {}", email);
    }
    println!("  Expires:  {} ({}s remaining)", expires_at, remaining);
    println!("  Restored: {} ({:?})", restored, phase);
    println!(
        "  Backup:   {}",
        if app.keeper.backup().load().await.is_some() {
            "present"
        } else {
            "absent"
        }
    );
    Ok(())
}

pub async fn login(
    app: &App,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = app.supabase.sign_in_with_password(email, password).await?;
    println!("Signed in as {}", session.email.as_deref().unwrap_or(&session.user_id));
    Ok(())
}

pub async fn logout(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    app.supabase.sign_out().await?;
    println!("Signed out");
    Ok(())
}

/// Restore the session, then refresh it on lifecycle signals until Ctrl-C.
pub async fn watch(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    if app.keeper.ensure_session().await {
        info!("Session available, watching lifecycle signals");
    } else {
        warn!("No session to keep alive yet, watching lifecycle signals anyway");
    }

    let (signal_tx, signal_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let forwarder = lifecycle_signals::forward(signal_tx)?;

    let scheduler = app.keeper.scheduler().clone();
    let runner = tokio::spawn(async move { scheduler.run(signal_rx, shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, exiting...");

    let _ = shutdown_tx.send(());
    forwarder.abort();
    if let Err(e) = runner.await {
        warn!(error = %e, "Lifecycle refresh scheduler task failed");
    }
    Ok(())
}
