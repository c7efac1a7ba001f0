#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use waypost::{controller::Waypost, dispatch::Disposition};
use waypost_common::logging;
use waypost_routing::resolve;

/// Fail-safe inbound mail router
#[derive(Parser, Debug)]
#[command(name = "waypost")]
#[command(version)]
struct Cli {
    /// Configuration file (overrides WAYPOST_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept messages over HTTP until interrupted (default)
    Serve,
    /// Route a single message read from stdin
    Deliver {
        /// Envelope sender
        #[arg(long)]
        from: String,
        /// Envelope recipient
        #[arg(long)]
        to: String,
    },
    /// Show where a recipient would be routed
    Resolve {
        recipient: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => find_config_file()?,
    };
    let config_content = std::fs::read_to_string(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config from {}: {}",
            config_path.display(),
            e
        )
    })?;
    let waypost = Waypost::from_ron(&config_content)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            waypost.run().await?;
        }
        Command::Deliver { from, to } => {
            logging::init();
            let disposition = waypost.deliver(&from, &to, tokio::io::stdin()).await?;
            if let Disposition::ForwardFailed { .. } | Disposition::NoRoute { .. } = disposition {
                eprintln!("{}", serde_json::to_string(&disposition.summary())?);
            }
        }
        Command::Resolve { recipient } => {
            let Some(route) = resolve(&recipient, &waypost.routing) else {
                eprintln!("No routing rule found for recipient: {recipient}");
                return Ok(ExitCode::FAILURE);
            };
            println!("{} (via {})", route.target, route.selector);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Find the configuration file using the following precedence:
/// 1. `WAYPOST_CONFIG` environment variable
/// 2. ./waypost.config.ron (current working directory)
/// 3. /etc/waypost/waypost.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("WAYPOST_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "WAYPOST_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./waypost.config.ron"),
        PathBuf::from("/etc/waypost/waypost.config.ron"),
    ];

    if let Some(path) = default_paths.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - WAYPOST_CONFIG environment variable\n{paths_tried}"
    )
}
