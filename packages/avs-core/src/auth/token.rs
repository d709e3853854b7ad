//! OAuth2 bearer token acquisition and caching.
//!
//! A thin struct around a `reqwest::Client` that owns the HTTP protocol
//! details, with state (the cached token) kept separately so the caching
//! policy is easy to test without a live HTTP call.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;

use crate::error::TokenError;
use crate::protocol_constants::{TOKEN_ENDPOINT, TOKEN_REFRESH_SKEW_SECS};

/// Credentials needed to refresh an AVS access token, loaded from
/// `config.dict` (`Client_ID`, `Client_Secret`, `refresh_token`).
#[derive(Debug, Clone)]
pub struct RefreshCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// A cached access token and the instant it was acquired at.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    acquired_at: Instant,
    ttl: Duration,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        let skew = Duration::from_secs(TOKEN_REFRESH_SKEW_SECS as u64);
        match self.ttl.checked_sub(skew) {
            Some(usable) => self.acquired_at.elapsed() < usable,
            None => false,
        }
    }
}

/// Acquires and caches the OAuth2 bearer token used for every AVS request.
///
/// `current_token` is the only entry point: callers never see whether a
/// cached token was reused or a refresh happened.
pub struct TokenManager {
    client: Client,
    credentials: RefreshCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    #[must_use]
    pub fn new(client: Client, credentials: RefreshCredentials) -> Self {
        Self {
            client,
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Returns a still-valid cached token, or refreshes via the OAuth2
    /// endpoint and caches the result.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] if the refresh request fails or the token
    /// endpoint returns a non-200 or malformed body. The cache is left
    /// untouched on failure.
    pub async fn current_token(&self) -> Result<String, TokenError> {
        if let Some(token) = self.cached.lock().clone() {
            if token.is_valid() {
                return Ok(token.access_token);
            }
        }

        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, TokenError> {
        let started_at = Instant::now();

        log::info!("[TokenManager] refreshing access token");

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::HttpStatus(status.as_u16(), body));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|_| TokenError::HttpStatus(status.as_u16(), "malformed token response".into()))?;

        let cached = CachedToken {
            access_token: body.access_token.clone(),
            acquired_at: started_at,
            ttl: Duration::from_secs(body.expires_in.max(0) as u64),
        };

        log::debug!(
            "[TokenManager] refreshed token, expires_in={}s",
            body.expires_in
        );

        *self.cached.lock() = Some(cached);
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> RefreshCredentials {
        RefreshCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
        }
    }

    #[test]
    fn cached_token_valid_within_skew_window() {
        let token = CachedToken {
            access_token: "tok".into(),
            acquired_at: Instant::now(),
            ttl: Duration::from_secs(3600),
        };
        assert!(token.is_valid());
    }

    #[test]
    fn cached_token_invalid_past_ttl_minus_skew() {
        let token = CachedToken {
            access_token: "tok".into(),
            acquired_at: Instant::now() - Duration::from_secs(3590),
            ttl: Duration::from_secs(3600),
        };
        // 3600 - 30 skew = 3570s usable window; 3590s elapsed exceeds it.
        assert!(!token.is_valid());
    }

    #[test]
    fn cached_token_invalid_when_ttl_shorter_than_skew() {
        let token = CachedToken {
            access_token: "tok".into(),
            acquired_at: Instant::now(),
            ttl: Duration::from_secs(10),
        };
        assert!(!token.is_valid());
    }

    #[test]
    fn token_manager_starts_with_empty_cache() {
        let manager = TokenManager::new(Client::new(), credentials());
        assert!(manager.cached.lock().is_none());
    }
}
