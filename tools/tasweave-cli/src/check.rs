//! Check command - build a script and print what it expands to

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use tasweave_core::config::EngineConfig;
use tasweave_core::consistency::{checksum, format_time};
use tasweave_core::timeline::BuildOutput;
use tasweave_core::{CommandRegistry, TimelineBuilder};

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Root script
    pub script: PathBuf,
}

/// Build `script` with the built-in commands
pub fn build_script(script: &Path, config: &EngineConfig) -> Result<BuildOutput> {
    let registry = Arc::new(CommandRegistry::with_builtins());
    TimelineBuilder::new(script, registry, config)
        .and_then(TimelineBuilder::build)
        .with_context(|| format!("Failed to build script: {}", script.display()))
}

/// Print timeline statistics
pub fn print_summary(output: &BuildOutput, config: &EngineConfig) {
    let timeline = &output.timeline;
    let frames = timeline.frame_count();

    println!("=== {} ===", timeline.root().display());
    println!(
        "Frames:    {} ({})",
        frames,
        format_time(frames, config.playback.tick_rate)
    );
    println!("Inputs:    {}", timeline.inputs().len());
    println!("Commands:  {}", timeline.command_count());
    println!("Markers:   {}", timeline.fast_forwards().len());
    println!("Labels:    {}", timeline.labels().len());
    if timeline.is_restricted() {
        println!("Restricted: EnforceLegal");
    }
    println!("Checksum:  {:016x}", checksum(timeline, frames));
    println!("Files:");
    for file in output.tracker.files() {
        println!("  {}", file.display());
    }
}

/// Execute the check command
pub fn execute(args: CheckArgs, config: &EngineConfig) -> Result<()> {
    let output = build_script(&args.script, config)?;
    print_summary(&output, config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_build_script_reads_included_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("part.tas"), "4,J\n").unwrap();
        let root = dir.path().join("route.tas");
        fs::write(&root, "2,R\nRead, part\n").unwrap();

        let output = build_script(&root, &EngineConfig::default()).unwrap();
        assert_eq!(output.timeline.frame_count(), 6);
        assert_eq!(output.tracker.files().count(), 2);
    }

    #[test]
    fn test_build_script_reports_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("route.tas");
        fs::write(&root, "Teleport, 1, 2\n").unwrap();

        let error = build_script(&root, &EngineConfig::default()).unwrap_err();
        let message = format!("{error:#}");
        assert!(message.contains("Failed to build script"));
        assert!(message.contains("unknown command 'Teleport'"));
    }
}
