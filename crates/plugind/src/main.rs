// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! plugind - builds, packages and installs platform plugins.
//!
//! This is the binary entry point. Every install and uninstall is followed
//! on the in-process progress bus until it reaches a terminal event.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// plugind - builds, packages and installs platform plugins.
#[derive(Parser, Debug)]
#[command(name = "plugind", version, about, long_about = None)]
struct Cli {
    /// Configuration file replacing the default hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Force debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a plugin.
    Install {
        #[command(subcommand)]
        source: InstallSource,
    },
    /// Uninstall an installed plugin.
    Uninstall { namespace: String, name: String },
    /// List installed plugins.
    List,
    /// Show the metadata of an installed plugin.
    Show { namespace: String, name: String },
    /// List the market catalog with installed versions.
    Market,
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug)]
enum InstallSource {
    /// Install from a git repository.
    Git {
        url: String,
        /// Branch or tag to check out.
        #[arg(long = "ref", default_value = "master")]
        git_ref: String,
    },
    /// Install from the plugin market.
    Market {
        namespace: String,
        name: String,
        /// Version constraint, e.g. `>=1.2,<2`.
        #[arg(long)]
        version: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => plugind_config::load_and_validate_path(path),
        None => plugind_config::load_and_validate(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            plugind_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    if cli.debug {
        config.daemon.debug = true;
    }
    init_tracing(config.daemon.effective_log_level());

    match commands::run(cli.command, config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("plugind: {e}");
            std::process::exit(1);
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plugind={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
