// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - an iMessage bridge exposing chat.db over HTTP and WebSocket.
//!
//! This is the binary entry point for the Courier service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config::CourierConfig;

mod doctor;
mod serve;
mod status;

/// Courier - an iMessage bridge exposing chat.db over HTTP and WebSocket.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Path to an explicit config file (skips the XDG lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bridge service (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the Courier environment.
    Doctor {
        /// Run additional intensive checks.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Show whether a Courier service is running and reachable.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

/// Load configuration, printing diagnostics and exiting on failure.
fn load_config(path: Option<&PathBuf>) -> CourierConfig {
    let result = match path {
        Some(p) => courier_config::load_and_validate_path(p),
        None => courier_config::load_and_validate(),
    };

    match result {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Doctor { deep, plain }) => {
            doctor::run_doctor(&config, cli.config.as_deref(), deep, plain).await
        }
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Serve) | None => serve::run_serve(config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
