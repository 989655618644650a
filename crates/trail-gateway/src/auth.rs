//! Access-token management for privileged calls.
//!
//! OAuth-style client-credentials flow with refresh-token reuse. The
//! token is cached with its expiry; callers invoke [`AuthProvider::access_token`]
//! before every privileged request and get the cached token back until
//! it needs refreshing.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::AuthProvider;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// REST API base URL, e.g. `https://www.deribit.com/api/v2`.
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Retry ceiling for a single authenticate call.
    pub max_attempts: u32,
    /// Safety margin subtracted from the reported expiry (ms).
    pub expiry_margin_ms: i64,
}

impl AuthConfig {
    pub fn new(api_url: impl Into<String>, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client_id: client_id.into(),
            client_secret: secret.into(),
            max_attempts: 3,
            expiry_margin_ms: 5_000,
        }
    }
}

/// Cached bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub refresh_token: String,
    /// Unix ms after which the token must not be used.
    pub expires_at_ms: i64,
}

impl AccessToken {
    fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }
}

#[derive(Debug, Deserialize)]
struct AuthResult {
    access_token: String,
    refresh_token: String,
    /// Lifetime in seconds.
    expires_in: i64,
}

/// REST implementation of [`AuthProvider`].
pub struct RestAuthProvider {
    http: reqwest::Client,
    config: AuthConfig,
    state: Mutex<Option<AccessToken>>,
}

impl RestAuthProvider {
    pub fn new(http: reqwest::Client, config: AuthConfig) -> Self {
        Self {
            http,
            config,
            state: Mutex::new(None),
        }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> GatewayResult<AccessToken> {
        let url = format!("{}/public/auth", self.config.api_url);
        let response = self.http.get(&url).query(params).send().await?;
        let body = response.text().await?;
        let envelope = crate::envelope::RpcEnvelope::parse(&body)
            .map_err(|e| GatewayError::Decode(format!("auth envelope: {e}")))?;
        let result = envelope
            .check("/public/auth")
            .map_err(|(_, msg)| GatewayError::Rejected { message: msg })?;
        let auth: AuthResult = serde_json::from_value(result)
            .map_err(|e| GatewayError::Decode(format!("auth result: {e}")))?;

        Ok(AccessToken {
            token: auth.access_token,
            refresh_token: auth.refresh_token,
            expires_at_ms: Self::now_ms() + auth.expires_in * 1000 - self.config.expiry_margin_ms,
        })
    }

    async fn grant_refresh(&self, refresh_token: &str) -> GatewayResult<AccessToken> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }

    async fn grant_credentials(&self) -> GatewayResult<AccessToken> {
        self.request_token(&[
            ("grant_type", "client_credentials"),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }
}

#[async_trait]
impl AuthProvider for RestAuthProvider {
    async fn access_token(&self) -> GatewayResult<String> {
        let now = Self::now_ms();

        // Fast path: cached token still valid.
        let cached = self.state.lock().clone();
        if let Some(ref token) = cached {
            if token.is_valid_at(now) {
                return Ok(token.token.clone());
            }
        }

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            // Prefer the refresh grant when we hold an expired token.
            let result = match cached {
                Some(ref expired) if attempt == 1 => {
                    debug!("Refreshing expired access token");
                    match self.grant_refresh(&expired.refresh_token).await {
                        Ok(token) => Ok(token),
                        Err(e) => {
                            warn!(error = %e, "Token refresh failed, requesting a new token");
                            self.grant_credentials().await
                        }
                    }
                }
                _ => self.grant_credentials().await,
            };

            match result {
                Ok(token) => {
                    let bearer = token.token.clone();
                    debug!(expires_at_ms = token.expires_at_ms, "Authentication successful");
                    *self.state.lock() = Some(token);
                    return Ok(bearer);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Authentication attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(GatewayError::Auth {
            attempts: self.config.max_attempts,
            message: last_error,
        })
    }
}
