// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin-to-FitTrackee command line tool
//!
//! Copies Garmin Connect activities into a FitTrackee instance, one day of
//! activities at a time.

mod cli;

use anyhow::Context as _;
use clap::Parser;
use cli::{Cli, Command, SetupCmd};
use garmin_to_fittrackee::{
    commands::{self, ResetOutcome},
    config::LogConfig,
    models::FittrackeeApp,
    services::SyncState,
    Context,
};
use std::io::{BufRead, Write};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let ctx = match Context::load() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&ctx.config.log);
    tracing::debug!(config_dir = %ctx.config_dir.display(), "Configuration loaded");

    match run(cli.cmd, &ctx).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cmd: Command, ctx: &Context) -> anyhow::Result<ExitCode> {
    match cmd {
        Command::Sync {
            start_year,
            no_interactive,
        } => {
            let interactive = !no_interactive;
            let outcome =
                commands::sync(ctx, start_year, interactive, chrono::Utc::now(), prompt_start_year)
                    .await;
            let report = &outcome.report;
            tracing::info!(
                windows = report.windows,
                failed_windows = report.failed_windows,
                uploaded = report.uploaded,
                skipped = report.skipped_synced,
                failed = report.failed,
                retained = report.retained_tracks.len(),
                last_cursor = ?report.last_cursor,
                "Sync report"
            );
            if let SyncState::Aborted(reason) = &outcome.state {
                eprintln!("Sync aborted: {}", reason);
            }
            Ok(exit_code(outcome.state.exit_code()))
        }
        Command::Reset { force } => match commands::reset(ctx, force).context("Ledger reset failed")?
        {
            ResetOutcome::Disabled => {
                println!("The ledger is disabled; nothing to reset");
                Ok(ExitCode::FAILURE)
            }
            ResetOutcome::Refused => {
                println!("This deletes every ledger entry. Run again with --force to confirm");
                Ok(ExitCode::FAILURE)
            }
            ResetOutcome::Cleared(removed) => {
                println!("Ledger cleared ({} entries removed)", removed);
                Ok(ExitCode::SUCCESS)
            }
        },
        Command::Setup { cmd } => match cmd {
            SetupCmd::CredentialStore {
                host,
                client_id,
                client_secret,
                force,
            } => {
                let app = FittrackeeApp {
                    host,
                    client_id,
                    client_secret,
                };
                let path = commands::setup_credential_store(ctx, app, force)
                    .context("Cannot write credential store")?;
                println!("Credential store written to {}", path.display());
                Ok(ExitCode::SUCCESS)
            }
            SetupCmd::Destination => {
                commands::setup_destination(ctx, read_callback_url)
                    .await
                    .context("FitTrackee authorization failed")?;
                println!("FitTrackee access configured");
                Ok(ExitCode::SUCCESS)
            }
            SetupCmd::ConfigTool(args) => {
                let use_ledger = args.ledger_enabled(ctx.config.ledger.enabled);
                let config = commands::setup_config_tool(ctx, use_ledger, args.ledger_path)
                    .context("Cannot write tool configuration")?;
                println!(
                    "Configuration written to {} (ledger {})",
                    ctx.config_dir.display(),
                    if config.ledger.enabled { "enabled" } else { "disabled" }
                );
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

fn exit_code(code: i32) -> ExitCode {
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn read_line(prompt: &str) -> std::io::Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_start_year() -> Option<i32> {
    let answer =
        read_line("No workout on FitTrackee. Year to start fetching Garmin activities from: ").ok()?;
    match answer.parse() {
        Ok(year) => Some(year),
        Err(_) => {
            eprintln!("'{}' is not a year", answer);
            None
        }
    }
}

fn read_callback_url(authorization_url: &str) -> std::io::Result<String> {
    println!("Open this URL in a browser and authorize the application:");
    println!("{}", authorization_url);
    read_line("Paste the URL you were redirected to: ")
}

/// Initialize logging: human-readable by default, JSON lines on request.
fn init_logging(log: &LogConfig) {
    let level = log.level.as_str();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let filter = match format!("garmin_to_fittrackee={}", level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
