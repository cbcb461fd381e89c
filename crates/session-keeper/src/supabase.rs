//! Primary session handle backed by the Supabase auth REST API.
//!
//! The live session is kept in a [`PrimarySessionStore`]. Every change that
//! reaches storage is announced to subscribers through an
//! [`AuthEventEmitter`].

use crate::{
    AuthError, AuthEvent, AuthEventEmitter, AuthResult, AuthStateListener, PrimarySessionHandle,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use keeper_config_and_utils::{Clock, Session};
use keeper_storage::PrimarySessionStore;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifetime assumed for an access token whose `exp` claim cannot be read.
const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Token grant response (refresh and password grants).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<JwtClaims>(&bytes).ok()?.exp
}

/// 5xx responses become transient HTTP errors.
fn server_error(response: &reqwest::Response) -> AuthResult<()> {
    if response.status().is_server_error() {
        response.error_for_status_ref()?;
    }
    Ok(())
}

/// [`PrimarySessionHandle`] over Supabase auth.
pub struct SupabaseSessionHandle {
    store: PrimarySessionStore,
    supabase_url: String,
    supabase_publishable_key: String,
    http_client: Client,
    clock: Arc<dyn Clock>,
    refresh_config: RefreshConfig,
    events: AuthEventEmitter,
}

impl SupabaseSessionHandle {
    pub fn new(
        store: PrimarySessionStore,
        supabase_url: &str,
        supabase_publishable_key: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_refresh_config(
            store,
            supabase_url,
            supabase_publishable_key,
            clock,
            RefreshConfig::default(),
        )
    }

    pub fn with_refresh_config(
        store: PrimarySessionStore,
        supabase_url: &str,
        supabase_publishable_key: &str,
        clock: Arc<dyn Clock>,
        refresh_config: RefreshConfig,
    ) -> Self {
        Self {
            store,
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_publishable_key: supabase_publishable_key.to_string(),
            http_client: Client::new(),
            clock,
            refresh_config,
            events: AuthEventEmitter::new(),
        }
    }

    /// Login with email and password.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let login_url = format!("{}/auth/v1/token?grant_type=password", self.supabase_url);

        debug!(url = %login_url, email = %email, "Attempting email/password login");

        let response = self
            .http_client
            .post(&login_url)
            .header("apikey", &self.supabase_publishable_key)
            .json(&PasswordRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Login failed");
            return Err(AuthError::InvalidCredentials(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let data: TokenResponse = response.json().await?;
        let session = self.session_from_grant(data);
        self.store.set_session(&session)?;

        info!(user_id = %session.user_id, "Login successful");
        self.events.emit(AuthEvent::signed_in(session.clone())).await;
        Ok(session)
    }

    /// Revoke the session server-side (best effort) and forget it locally.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.store.get_session()? {
            let logout_url = format!("{}/auth/v1/logout", self.supabase_url);
            let result = self
                .http_client
                .post(&logout_url)
                .header("apikey", &self.supabase_publishable_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Session revoked server-side");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Server-side logout rejected");
                }
                Err(e) => warn!(error = %e, "Server-side logout failed"),
            }
        }

        self.store.clear_session()?;
        info!("Logged out");
        self.events.emit(AuthEvent::signed_out()).await;
        Ok(())
    }

    /// Verify an access token with `/auth/v1/user`.
    ///
    /// `Ok(None)` means the server rejected the token as unauthorized.
    async fn fetch_user(&self, access_token: &str) -> AuthResult<Option<UserResponse>> {
        let user_url = format!("{}/auth/v1/user", self.supabase_url);

        debug!(url = %user_url, "Verifying access token with Supabase");

        let response = self
            .http_client
            .get(&user_url)
            .header("apikey", &self.supabase_publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        server_error(&response)?;
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Session verification failed");
            return Err(AuthError::SessionInvalid(format!(
                "Server rejected session: HTTP {}: {}",
                status, body
            )));
        }

        Ok(Some(response.json().await?))
    }

    /// Refresh with exponential backoff on transient errors.
    async fn refresh_with_backoff(&self, refresh_token: &str) -> AuthResult<Session> {
        let max_retries = self.refresh_config.max_retries.max(1);

        for attempt in 0..max_retries {
            match self.try_refresh(refresh_token).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_transient() => {
                    if attempt + 1 < max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(error = %e, "Refresh failed with transient error");
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!("Refresh failed after {} attempts", max_retries);
        Err(AuthError::RefreshExhausted(max_retries))
    }

    /// Single attempt to refresh the session.
    async fn try_refresh(&self, refresh_token: &str) -> AuthResult<Session> {
        let refresh_url = format!(
            "{}/auth/v1/token?grant_type=refresh_token",
            self.supabase_url
        );

        debug!(url = %refresh_url, "Refreshing token");

        let response = self
            .http_client
            .post(&refresh_url)
            .header("apikey", &self.supabase_publishable_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        server_error(&response)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Token refresh failed");
            return Err(AuthError::TokenRefresh(format!("HTTP {}: {}", status, body)));
        }

        let data: TokenResponse = response.json().await?;
        Ok(self.session_from_grant(data))
    }

    fn session_from_grant(&self, data: TokenResponse) -> Session {
        let expires_at = data
            .expires_at
            .unwrap_or_else(|| self.clock.now_secs() + data.expires_in);
        Session::new(data.access_token, data.refresh_token, expires_at, data.user.id)
            .with_email(data.user.email)
    }
}

#[async_trait]
impl PrimarySessionHandle for SupabaseSessionHandle {
    async fn get_current(&self) -> AuthResult<Option<Session>> {
        Ok(self.store.get_session()?)
    }

    async fn establish(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(AuthError::SessionInvalid("Incomplete token pair".to_string()));
        }

        if let Some(user) = self.fetch_user(access_token).await? {
            let expires_at = jwt_expiry(access_token)
                .unwrap_or_else(|| self.clock.now_secs() + DEFAULT_ACCESS_TOKEN_LIFETIME_SECS);
            let session = Session::new(access_token, refresh_token, expires_at, user.id)
                .with_email(user.email);
            self.store.set_session(&session)?;

            info!(user_id = %session.user_id, "Session established");
            self.events.emit(AuthEvent::signed_in(session.clone())).await;
            return Ok(session);
        }

        info!("Access token rejected, exchanging refresh token");
        let session = match self.try_refresh(refresh_token).await {
            Ok(session) => session,
            Err(AuthError::TokenRefresh(reason)) => return Err(AuthError::SessionInvalid(reason)),
            Err(e) => return Err(e),
        };
        self.store.set_session(&session)?;

        info!(user_id = %session.user_id, "Session established with refreshed tokens");
        self.events
            .emit(AuthEvent::token_refreshed(session.clone()))
            .await;
        Ok(session)
    }

    fn subscribe(&self, listener: Arc<dyn AuthStateListener>) {
        self.events.subscribe(listener);
    }

    async fn refresh_if_needed(&self) -> AuthResult<()> {
        let Some(current) = self.store.get_session()? else {
            debug!("No session to refresh");
            return Ok(());
        };

        match self.refresh_with_backoff(&current.refresh_token).await {
            Ok(session) => {
                self.store.set_session(&session)?;
                info!(user_id = %session.user_id, "Token refreshed successfully");
                self.events.emit(AuthEvent::token_refreshed(session)).await;
                Ok(())
            }
            Err(e) if matches!(e, AuthError::TokenRefresh(_)) => {
                warn!(user_id = %current.user_id, error = %e, "Refresh token rejected, signing out");
                self.store.clear_session()?;
                self.events.emit(AuthEvent::signed_out()).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
