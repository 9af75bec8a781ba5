// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File-backed credential store for the FitTrackee instance and its tokens.

use crate::config::ConfigError;
use crate::models::{Credentials, TokenSet};
use std::path::{Path, PathBuf};

/// Credential file name inside the config directory.
pub const CREDENTIALS_FILE: &str = "fittrackee.toml";

/// Reads and writes [`Credentials`] as TOML.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store located in a config directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Credentials, ConfigError> {
        if !self.exists() {
            return Err(ConfigError::NotFound(self.path.clone()));
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::Io(self.path.clone(), e.to_string()))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(self.path.clone(), e.to_string()))
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(parent.to_path_buf(), e.to_string()))?;
        }
        let raw = toml::to_string_pretty(credentials)
            .map_err(|e| ConfigError::Parse(self.path.clone(), e.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| ConfigError::Io(self.path.clone(), e.to_string()))?;
        restrict_permissions(&self.path);
        Ok(())
    }

    /// Replace the stored token set, keeping the app registration.
    pub fn save_tokens(&self, tokens: &TokenSet) -> Result<(), ConfigError> {
        let mut credentials = self.load()?;
        credentials.tokens = Some(tokens.clone());
        self.save(&credentials)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to restrict credential file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FittrackeeApp;

    fn sample() -> Credentials {
        Credentials {
            fittrackee: FittrackeeApp {
                host: "dev.localhost.tld".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
            },
            tokens: None,
        }
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        assert!(matches!(store.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_save_tokens_keeps_app_registration() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        store.save(&sample()).unwrap();

        let tokens = TokenSet {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_700_000_000,
            token_type: "Bearer".to_string(),
            scope: Some("workouts:read workouts:write profile:read".to_string()),
        };
        store.save_tokens(&tokens).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.fittrackee.host, "dev.localhost.tld");
        assert_eq!(loaded.tokens, Some(tokens));
    }

    #[test]
    fn test_bad_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        std::fs::write(store.path(), "fittrackee = [").unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Parse(_, _))));
    }
}
