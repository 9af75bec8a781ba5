// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error taxonomy shared by the sync engine and its collaborators.

/// Errors raised while synchronizing activities.
///
/// Per-activity failures (`InvalidInput`, `Transport`, `Api`, `Decode`) are
/// caught by the orchestrator and turned into a skip. Precondition failures
/// abort the whole run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Ledger constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Unsupported FitTrackee instance: {0}")]
    UnsupportedInstance(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True for errors that only concern the item being processed.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidInput(_)
                | SyncError::Transport(_)
                | SyncError::Api { .. }
                | SyncError::Decode(_)
                | SyncError::Io(_)
        )
    }

    /// True for errors that must abort the entire sync run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::PreconditionFailed(_) | SyncError::UnsupportedInstance(_)
        )
    }

    /// HTTP status of an API rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SyncError::Decode(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                SyncError::ConstraintViolation(msg.unwrap_or_else(|| err.to_string()))
            }
            other => SyncError::Ledger(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for SyncError {
    fn from(e: crate::config::ConfigError) -> Self {
        SyncError::PreconditionFailed(e.to_string())
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
