//! MineSync CLI
//!
//! Keeps Minecraft save games in sync with a MineSync server.
//!
//! # Commands
//!
//! - `sync` - Upload newer local saves, download newer remote saves
//! - `plan` - Show what `sync` would transfer
//! - `paths` - Show where save games are looked for
//! - `serve` - Run the reference server

mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::{FileConfig, Overrides};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Minecraft save-game synchronization.
#[derive(Parser)]
#[command(name = "minesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Save-games directory (detected per platform by default)
    #[arg(global = true, short, long)]
    saves: Option<PathBuf>,

    /// Manifest endpoint address (host:port)
    #[arg(global = true, long)]
    manifest_addr: Option<String>,

    /// Upload endpoint address (host:port)
    #[arg(global = true, long)]
    upload_addr: Option<String>,

    /// Download endpoint address (host:port)
    #[arg(global = true, long)]
    download_addr: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload newer local saves and download newer remote saves
    Sync,

    /// Show what a sync would transfer without transferring
    Plan {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the save-games directory for this platform
    Paths,

    /// Run the reference server
    Serve {
        /// Directory to keep archives in (memory when omitted)
        #[arg(long)]
        storage: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        save_root: cli.saves,
        manifest_addr: cli.manifest_addr,
        upload_addr: cli.upload_addr,
        download_addr: cli.download_addr,
    };

    match cli.command {
        Commands::Sync => {
            commands::sync::run(file.sync_config(&overrides))?;
        }
        Commands::Plan { format } => {
            commands::plan::run(file.sync_config(&overrides), &format)?;
        }
        Commands::Paths => {
            let root = overrides.save_root.as_deref().or(file.save_root.as_deref());
            commands::paths::run(root);
        }
        Commands::Serve { storage } => {
            let config = file.server_config(&overrides, storage)?;
            commands::serve::run(config)?;
        }
        Commands::Version => {
            println!("MineSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
