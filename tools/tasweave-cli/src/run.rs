//! Run command - headless playback
//!
//! Plays the script against a recording host, running through every
//! breakpoint, and optionally writes a JSON report of what was applied.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use tasweave_core::HeadlessRunner;
use tasweave_core::config::EngineConfig;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Root script
    pub script: PathBuf,

    /// Write a JSON playback report here
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,
}

/// Execute the run command
pub fn execute(args: RunArgs, config: &EngineConfig) -> Result<()> {
    let mut runner = HeadlessRunner::new(&args.script, config.clone());
    if let Some(max_ticks) = args.max_ticks {
        runner = runner.with_max_ticks(max_ticks);
    }

    let report = runner.run()?;

    println!();
    println!("=== Playback Complete ===");
    println!("State:       {:?}", report.state);
    println!("Frames:      {} / {}", report.frames_played, report.frame_count);
    println!("Breakpoints: {}", report.breakpoints.len());
    println!("Checksum:    {}", report.checksum);

    if let Some(path) = &args.report {
        report.write_to(path)?;
        println!("Report:      {}", path.display());
    }

    Ok(())
}
