// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command implementations behind the CLI.
//!
//! Everything interactive (prompts, reading the OAuth callback) is passed in
//! by the caller so the commands can run unattended in tests.

use crate::config::Config;
use crate::db::{CredentialStore, Ledger};
use crate::error::{Result, SyncError};
use crate::models::{Credentials, FittrackeeApp, TokenSet};
use crate::services::fittrackee::{instance_url, FittrackeeClient};
use crate::services::garmin::GarminClient;
use crate::services::oauth::{code_from_callback, random_state, OAuthClient};
use crate::services::sync::{SyncOptions, SyncOutcome, Synchronizer};
use crate::Context;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Connect to the configured FitTrackee instance.
///
/// Fails with `PreconditionFailed` when the credential store is missing or
/// the instance is unreachable, and `UnsupportedInstance` on a version
/// outside the supported range.
pub async fn connect_destination(ctx: &Context) -> Result<FittrackeeClient> {
    let store = ctx.credential_store();
    if !store.exists() {
        return Err(SyncError::PreconditionFailed(
            "FitTrackee credential store not configured. Run `setup credential-store` first"
                .to_string(),
        ));
    }
    let credentials = store.load()?;

    let http = reqwest::Client::new();
    let base = instance_url(&credentials.fittrackee.host);
    let version = FittrackeeClient::ensure_instance_supported(&http, &base).await?;
    tracing::info!(%version, instance = %base, "FitTrackee instance supported");

    FittrackeeClient::from_credentials(&credentials, store)
}

/// Run one sync pass up to `now`.
pub async fn sync<F>(
    ctx: &Context,
    start_year: Option<i32>,
    interactive: bool,
    now: DateTime<Utc>,
    prompt: F,
) -> SyncOutcome
where
    F: FnOnce() -> Option<i32>,
{
    let options = SyncOptions {
        start_year,
        interactive,
        use_ledger: ctx.config.ledger.enabled,
        track_dir: ctx.config.sync.track_dir.clone(),
    };

    let destination = match connect_destination(ctx).await {
        Ok(destination) => destination,
        Err(e) => {
            tracing::error!(error = %e, "Cannot use FitTrackee");
            return SyncOutcome::aborted(&e);
        }
    };

    let source = match GarminClient::from_token_dir(&ctx.config.garmin_token_dir(&ctx.config_dir)) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "Cannot use Garmin Connect");
            return SyncOutcome::aborted(&e);
        }
    };

    let ledger = match ctx.open_ledger() {
        Ok(ledger) => ledger,
        Err(e) => {
            tracing::error!(error = %e, path = %ctx.config.ledger.path.display(), "Cannot open ledger");
            return SyncOutcome::aborted(&e);
        }
    };

    Synchronizer::new(&source, &destination, ledger.as_ref(), options)
        .run(now, prompt)
        .await
}

/// Result of `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// `--force` was not given
    Refused,
    /// The ledger feature is off
    Disabled,
    /// Number of entries removed
    Cleared(usize),
}

/// Clear the ledger.
pub fn reset(ctx: &Context, force: bool) -> Result<ResetOutcome> {
    if !ctx.config.ledger.enabled {
        return Ok(ResetOutcome::Disabled);
    }
    if !force {
        return Ok(ResetOutcome::Refused);
    }
    let ledger = Ledger::open(&ctx.config.ledger.path)?;
    Ok(ResetOutcome::Cleared(ledger.reset()?))
}

/// Write the credential store (app registration only, no tokens).
pub fn setup_credential_store(ctx: &Context, app: FittrackeeApp, force: bool) -> Result<PathBuf> {
    let store = ctx.credential_store();
    if store.exists() && !force {
        return Err(SyncError::InvalidInput(format!(
            "{} already exists, use --force to overwrite it",
            store.path().display()
        )));
    }
    store.save(&Credentials {
        fittrackee: app,
        tokens: None,
    })?;
    tracing::info!(path = %store.path().display(), "Credential store written");
    Ok(store.path().to_path_buf())
}

/// Authorize this tool against FitTrackee and store the tokens.
///
/// `read_callback` receives the authorization URL and returns the URL the
/// browser was redirected to.
pub async fn setup_destination<F>(ctx: &Context, read_callback: F) -> Result<TokenSet>
where
    F: FnOnce(&str) -> std::io::Result<String>,
{
    let store = ctx.credential_store();
    let credentials = store.load()?;

    let http = reqwest::Client::new();
    let base = instance_url(&credentials.fittrackee.host);
    let version = FittrackeeClient::ensure_instance_supported(&http, &base).await?;
    tracing::info!(%version, "FitTrackee instance supported");

    let oauth = OAuthClient::new(
        http,
        base,
        credentials.fittrackee.client_id.clone(),
        credentials.fittrackee.client_secret.clone(),
    );
    let state = random_state()?;
    let callback = read_callback(&oauth.authorization_url(&state))?;
    let code = code_from_callback(&callback, &state)?;

    let tokens = oauth.exchange_code(&code).await?;
    store.save_tokens(&tokens)?;
    tracing::info!(path = %store.path().display(), "FitTrackee tokens saved");

    log_sports(&store).await;
    Ok(tokens)
}

async fn log_sports(store: &CredentialStore) {
    let client = match store
        .load()
        .map_err(SyncError::from)
        .and_then(|credentials| FittrackeeClient::from_credentials(&credentials, store.clone()))
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot build FitTrackee client");
            return;
        }
    };
    match client.get_sports().await {
        Ok(sports) => {
            let active = sports.iter().filter(|s| s.is_active).count();
            tracing::info!(total = sports.len(), active, "FitTrackee sports available");
        }
        Err(e) => tracing::warn!(error = %e, "Failed to list FitTrackee sports"),
    }
}

/// Write `config.toml`, creating the ledger schema when the ledger is enabled.
pub fn setup_config_tool(
    ctx: &Context,
    use_ledger: bool,
    ledger_path: Option<PathBuf>,
) -> Result<Config> {
    let mut config = ctx.config.clone();
    config.ledger.enabled = use_ledger;
    if let Some(path) = ledger_path {
        config.ledger.path = path;
    }
    config.save(&ctx.config_dir)?;

    if use_ledger {
        let ledger = Ledger::open(&config.ledger.path)?;
        tracing::info!(
            path = %config.ledger.path.display(),
            entries = ledger.count()?,
            "Ledger ready"
        );
    }
    Ok(config)
}
