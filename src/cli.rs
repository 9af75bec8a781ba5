// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "garmin-to-fittrackee")]
#[command(about = "Copy Garmin Connect activities into FitTrackee", version)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload Garmin activities newer than the latest FitTrackee workout
    Sync {
        /// Year to start from when FitTrackee has no workout yet
        #[arg(long = "start-year")]
        start_year: Option<i32>,
        /// Never prompt; abort instead
        #[arg(long = "no-interactive")]
        no_interactive: bool,
    },
    /// Clear the Garmin/FitTrackee ledger
    Reset {
        #[arg(long)]
        force: bool,
    },
    Setup {
        #[command(subcommand)]
        cmd: SetupCmd,
    },
}

#[derive(Subcommand)]
pub enum SetupCmd {
    /// Store the FitTrackee instance and OAuth app registration
    CredentialStore {
        #[arg(long)]
        host: String,
        #[arg(long = "client-id")]
        client_id: String,
        #[arg(long = "client-secret")]
        client_secret: String,
        #[arg(long)]
        force: bool,
    },
    /// Authorize access to FitTrackee
    Destination,
    /// Write the tool configuration
    ConfigTool(ConfigToolArgs),
}

#[derive(Args)]
pub struct ConfigToolArgs {
    #[arg(long = "use-ledger", overrides_with = "no_ledger")]
    pub use_ledger: bool,
    #[arg(long = "no-ledger", overrides_with = "use_ledger")]
    pub no_ledger: bool,
    /// Directory holding the ledger database
    #[arg(long = "ledger-path")]
    pub ledger_path: Option<PathBuf>,
}

impl ConfigToolArgs {
    /// Ledger setting to write; neither flag keeps `current`.
    pub fn ledger_enabled(&self, current: bool) -> bool {
        match (self.use_ledger, self.no_ledger) {
            (true, _) => true,
            (_, true) => false,
            _ => current,
        }
    }
}
