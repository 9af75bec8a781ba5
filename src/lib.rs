// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Garmin-to-FitTrackee: copy Garmin Connect activities into FitTrackee
//!
//! This crate walks Garmin activities day by day from the newest FitTrackee
//! workout onwards and uploads each missing GPX track as a new workout.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::{Config, ConfigError};
use db::{CredentialStore, Ledger};
use std::path::PathBuf;

/// Resolved configuration shared by every command.
pub struct Context {
    pub config_dir: PathBuf,
    pub config: Config,
}

impl Context {
    /// Load the tool config from the default config directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_dir(config::config_dir()?)
    }

    pub fn from_dir(config_dir: PathBuf) -> Result<Self, ConfigError> {
        let config = Config::load_or_default(&config_dir)?;
        Ok(Self { config_dir, config })
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::in_dir(&self.config_dir)
    }

    /// Open the ledger if it is enabled.
    pub fn open_ledger(&self) -> error::Result<Option<Ledger>> {
        if !self.config.ledger.enabled {
            return Ok(None);
        }
        Ledger::open(&self.config.ledger.path).map(Some)
    }
}
