//! Tasweave CLI - check, play and watch TAS scripts
//!
//! # Commands
//!
//! - `tasweave check <script>` - Build the timeline and print statistics
//! - `tasweave run <script>` - Play the script headless, optionally writing a report
//! - `tasweave checksum <script>` - Print the checksum of a timeline prefix
//! - `tasweave watch <script>` - Rebuild whenever a contributing file changes
//!
//! # Usage
//!
//! ```bash
//! # Validate a route and all files it reads
//! tasweave check route.tas
//!
//! # Play it headless and keep a JSON report
//! tasweave run route.tas --report route.json
//!
//! # Debug logging from the expansion steps
//! tasweave --verbose check route.tas
//! ```
//!
//! Settings come from `tasweave.toml` in the platform config directory,
//! or from `--config <path>`.

mod check;
mod checksum;
mod run;
mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tasweave_core::config::{self, EngineConfig};

/// Tasweave CLI - frame-exact TAS scripts
#[derive(Parser)]
#[command(name = "tasweave")]
#[command(about = "Check, play and watch frame-exact TAS scripts")]
#[command(version)]
struct Cli {
    /// Config file (defaults to tasweave.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log expansion and playback steps
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the timeline and print statistics
    Check(check::CheckArgs),

    /// Play the script headless
    Run(run::RunArgs),

    /// Print the checksum of a timeline prefix
    Checksum(checksum::ChecksumArgs),

    /// Rebuild whenever a contributing file changes
    Watch(watch::WatchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check(args) => check::execute(args, &config),
        Commands::Run(args) => run::execute(args, &config),
        Commands::Checksum(args) => checksum::execute(args, &config),
        Commands::Watch(args) => watch::execute(args, &config),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => config::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(config::load()),
    }
}
