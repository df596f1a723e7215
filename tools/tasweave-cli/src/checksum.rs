//! Checksum command - hash a timeline prefix

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use tasweave_core::config::EngineConfig;
use tasweave_core::consistency::checksum;

use crate::check::build_script;

/// Arguments for the checksum command
#[derive(Args)]
pub struct ChecksumArgs {
    /// Root script
    pub script: PathBuf,

    /// Last frame covered (defaults to the whole timeline)
    #[arg(short, long)]
    pub frame: Option<u64>,
}

/// Execute the checksum command
pub fn execute(args: ChecksumArgs, config: &EngineConfig) -> Result<()> {
    let output = build_script(&args.script, config)?;
    let frames = output.timeline.frame_count();

    let frame = args.frame.unwrap_or(frames);
    if frame > frames {
        bail!("Frame {frame} is past the end of the timeline ({frames} frames)");
    }

    println!("{:016x}", checksum(&output.timeline, frame));
    Ok(())
}
