// SPDX-License-Identifier: MIT OR Apache-2.0
//! OAuth2 client-credentials token manager.
//!
//! Tokens are cached and refreshed five minutes before expiry. The cache
//! sits behind a mutex held across the refresh, so concurrent callers
//! single-flight: one refresh per expiry, everyone else waits for it.

use crate::AdapterError;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Refresh this long before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

struct TokenState {
    token: String,
    expires_at: Instant,
}

/// Cached client-credentials token source.
pub struct OAuthTokenManager {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: Mutex<Option<TokenState>>,
}

impl OAuthTokenManager {
    /// Create a manager for one credential pair.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            state: Mutex::new(None),
        }
    }

    /// A currently-valid access token, refreshing if needed.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Auth`] when the exchange is rejected,
    /// [`AdapterError::Client`] on transport failures.
    pub async fn get_token(&self) -> Result<String, AdapterError> {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.as_ref()
            && Instant::now() + REFRESH_MARGIN < state.expires_at
        {
            return Ok(state.token.clone());
        }
        let state = self.exchange().await?;
        let token = state.token.clone();
        *guard = Some(state);
        Ok(token)
    }

    /// Drop the cached token and fetch a fresh one (after a 401).
    ///
    /// # Errors
    ///
    /// Same as [`get_token`](Self::get_token).
    pub async fn force_refresh(&self) -> Result<String, AdapterError> {
        let mut guard = self.state.lock().await;
        let state = self.exchange().await?;
        let token = state.token.clone();
        *guard = Some(state);
        Ok(token)
    }

    async fn exchange(&self) -> Result<TokenState, AdapterError> {
        debug!(target: "ino.listener", url = %self.token_url, "exchanging client credentials");
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::Client(format!("token exchange transport: {e}")))?;

        let status = resp.status();
        if status.is_client_error() {
            return Err(AdapterError::Auth(format!("token exchange rejected: {status}")));
        }
        if !status.is_success() {
            return Err(AdapterError::Client(format!("token exchange failed: {status}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Client(format!("token exchange decode: {e}")))?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::Auth("missing access_token in response".into()))?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(3600);

        Ok(TokenState {
            token,
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        })
    }
}
