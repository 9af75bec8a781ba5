// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FitTrackee OAuth credentials as kept in the credential store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Contents of the credential store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub fittrackee: FittrackeeApp,
    /// Absent until `setup destination` has completed the OAuth flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenSet>,
}

/// FitTrackee instance and OAuth application registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittrackeeApp {
    /// Instance host, e.g. `fittrackee.example.org`
    pub host: String,
    pub client_id: String,
    pub client_secret: String,
}

/// OAuth token set (access/refresh/expiry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as a unix timestamp (seconds)
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenSet {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or_default()
    }

    /// True when the access token expires within `margin` of `now`.
    pub fn is_expiring(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at()
    }
}
