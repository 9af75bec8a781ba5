// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitTrackee OAuth2 token handling.
//!
//! Handles:
//! - The one-time authorization-code exchange (`setup destination`)
//! - Token refresh when the access token is about to expire
//! - Handing every new token set to a persistence callback

use crate::error::{Result, SyncError};
use crate::models::TokenSet;
use chrono::{Duration, Utc};
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Scopes requested from FitTrackee.
pub const SCOPES: &str = "workouts:read workouts:write profile:read";

/// Redirect URI registered with the FitTrackee OAuth app.
pub const REDIRECT_URI: &str = "https://localhost/";

/// Invoked whenever a refresh produced a new token set. Its only job is to
/// persist the tokens.
pub type TokenUpdateCallback = Box<dyn Fn(&TokenSet) -> Result<()> + Send + Sync>;

/// Low-level OAuth endpoint client for one FitTrackee instance.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    instance_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        http: reqwest::Client,
        instance_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            instance_url,
            client_id,
            client_secret,
        }
    }

    /// URL the user must open to authorize this tool.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}/profile/apps/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.instance_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(REDIRECT_URI),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
    }

    /// Refresh an expired access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self
            .http
            .post(format!("{}/api/oauth/token", self.instance_url))
            .form(form)
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "FitTrackee token request failed");
            return Err(SyncError::Api { status, body });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(format!("Failed to parse token response: {}", e)))?;
        Ok(token.into_token_set())
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<f64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<serde_json::Value>,
}

impl TokenResponse {
    fn into_token_set(self) -> TokenSet {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at as i64,
            (None, Some(secs)) => (Utc::now() + Duration::seconds(secs)).timestamp(),
            (None, None) => Utc::now().timestamp(),
        };
        // FitTrackee sends the scope as a string; some OAuth libraries store a list
        let scope = match self.scope {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        };
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope,
        }
    }
}

/// Generate a random `state` value for the authorization request.
pub fn random_state() -> Result<String> {
    use ring::rand::{SecureRandom, SystemRandom};

    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| SyncError::PreconditionFailed("System RNG unavailable".to_string()))?;
    Ok(hex::encode(bytes))
}

/// Extract the authorization code from the URL the browser was redirected to.
///
/// The `state` parameter must match the one sent in the authorization request.
pub fn code_from_callback(callback_url: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(callback_url.trim())
        .map_err(|e| SyncError::InvalidInput(format!("Invalid callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(SyncError::InvalidInput(format!(
                    "Authorization denied: {}",
                    value
                )))
            }
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(SyncError::InvalidInput(
            "OAuth state mismatch in callback URL".to_string(),
        ));
    }
    code.ok_or_else(|| SyncError::InvalidInput("Callback URL has no code".to_string()))
}

/// Keeps a valid access token, refreshing and persisting as needed.
pub struct TokenManager {
    oauth: OAuthClient,
    tokens: Mutex<TokenSet>,
    on_update: TokenUpdateCallback,
}

impl TokenManager {
    pub fn new(oauth: OAuthClient, tokens: TokenSet, on_update: TokenUpdateCallback) -> Self {
        Self {
            oauth,
            tokens: Mutex::new(tokens),
            on_update,
        }
    }

    /// Get a valid (non-expired) access token.
    pub async fn access_token(&self) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if !tokens.is_expiring(Utc::now(), margin) {
            return Ok(tokens.access_token.clone());
        }

        tracing::info!("FitTrackee access token expired, refreshing");
        let mut fresh = self.oauth.refresh(&tokens.refresh_token).await?;
        if fresh.scope.is_none() {
            fresh.scope = tokens.scope.clone();
        }

        if let Err(e) = (self.on_update)(&fresh) {
            // The new token is still usable for this run
            tracing::warn!(error = %e, "Failed to persist refreshed FitTrackee tokens");
        }

        *tokens = fresh;
        tracing::debug!("FitTrackee token refreshed");
        Ok(tokens.access_token.clone())
    }
}
