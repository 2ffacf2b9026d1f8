// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sw-manager - software update strategy CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod auth;
mod client;
mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::strategy::{self, PatchCommand, UpgradeCommand};

use crate::auth::AuthArgs;
use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "sw-manager",
    version,
    about = "Software update orchestration for the NFV infrastructure"
)]
struct Cli {
    #[command(flatten)]
    auth: AuthArgs,

    /// Daemon socket path
    #[arg(long, env = "NFV_SOCKET", global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch Strategy
    #[command(name = "patch-strategy", subcommand)]
    PatchStrategy(PatchCommand),
    /// Upgrade Strategy
    #[command(name = "upgrade-strategy", subcommand)]
    UpgradeStrategy(UpgradeCommand),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging();

    if let Some(message) = cli.auth.missing() {
        println!("{}", message);
        return Ok(ExitCode::SUCCESS);
    }

    let client = DaemonClient::connect(cli.socket)?;

    match cli.command {
        Commands::PatchStrategy(command) => strategy::patch(&client, command).await,
        Commands::UpgradeStrategy(command) => strategy::upgrade(&client, command).await,
    }
}

/// Diagnostics go to stderr, filtered by `NFV_LOG` (default `warn`)
fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("NFV_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
