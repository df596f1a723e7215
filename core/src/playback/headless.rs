//! Headless playback
//!
//! Runs a script against a recording host without any simulation behind
//! it. Useful for CI and for checking what a script actually feeds the
//! host tick by tick.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Host, PlaybackState, Session, TickInput, TickOutcome};
use crate::command::CommandRegistry;
use crate::config::EngineConfig;

/// Host that records every tick it is given
#[derive(Debug, Default)]
pub struct HeadlessHost {
    ticks: u64,
    loading: bool,
    applied: Vec<TickInput>,
    console: Vec<Vec<String>>,
    aborted: Option<String>,
    has_saved_state: bool,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend to be in a blocking load
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Every tick applied since the last restart, in order
    pub fn applied(&self) -> &[TickInput] {
        &self.applied
    }

    /// Console commands received so far
    pub fn console_commands(&self) -> &[Vec<String>] {
        &self.console
    }

    /// Message of the last abort, if any
    pub fn aborted(&self) -> Option<&str> {
        self.aborted.as_deref()
    }
}

impl Host for HeadlessHost {
    fn is_loading(&self) -> bool {
        self.loading
    }

    fn apply_tick_input(&mut self, input: &TickInput) {
        self.ticks += 1;
        self.applied.push(input.clone());
    }

    fn abort(&mut self, message: &str, _show_dialog: bool, _notice: Option<Duration>) {
        self.aborted = Some(message.to_string());
    }

    fn tick_counter(&self) -> u64 {
        self.ticks
    }

    fn restart(&mut self) {
        self.applied.clear();
    }

    fn run_console(&mut self, args: &[String]) -> Result<()> {
        debug!("console: {}", args.join(" "));
        self.console.push(args.to_vec());
        Ok(())
    }

    fn save_state(&mut self) -> bool {
        self.has_saved_state = true;
        true
    }

    fn load_state(&mut self) -> bool {
        self.has_saved_state
    }
}

/// Consecutive frames that applied identical input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRun {
    pub start_frame: u64,
    pub duration: u64,
    /// Held action letters in canonical order
    pub actions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analog: Option<(f32, f32)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_keys: Vec<String>,
}

/// Result of a headless run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub script: String,
    /// RFC 3339 time the run finished
    pub generated_at: String,
    pub state: PlaybackState,
    pub frame_count: u64,
    pub frames_played: u64,
    /// Timeline checksum as 16 hex digits
    pub checksum: String,
    /// Frames playback paused at and ran through
    pub breakpoints: Vec<u64>,
    pub runs: Vec<ReportRun>,
}

impl PlaybackReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize playback report")
    }

    /// Write the report as pretty JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}

/// Fold applied ticks into runs of identical input
fn collapse(applied: &[TickInput]) -> Vec<ReportRun> {
    let mut runs: Vec<ReportRun> = Vec::new();
    for (frame, input) in applied.iter().enumerate() {
        let actions = input.actions.letters();
        if let Some(last) = runs.last_mut()
            && last.actions == actions
            && last.analog == input.analog
            && last.extra_keys == input.extra_keys
        {
            last.duration += 1;
            continue;
        }
        runs.push(ReportRun {
            start_frame: frame as u64,
            duration: 1,
            actions,
            analog: input.analog,
            extra_keys: input.extra_keys.clone(),
        });
    }
    runs
}

/// Plays a script to the end against a [`HeadlessHost`]
pub struct HeadlessRunner {
    script: PathBuf,
    session: Session,
    host: HeadlessHost,
    max_ticks: u64,
}

impl HeadlessRunner {
    /// Runner for `script` with the built-in commands
    pub fn new(script: &Path, config: EngineConfig) -> Self {
        let registry = Arc::new(CommandRegistry::with_builtins());
        Self {
            script: script.to_path_buf(),
            session: Session::new(script, registry, config),
            host: HeadlessHost::new(),
            max_ticks: u64::MAX,
        }
    }

    /// Give up after this many calls to `tick`
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn host(&self) -> &HeadlessHost {
        &self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Play until finished, running through every breakpoint
    pub fn run(&mut self) -> Result<PlaybackReport> {
        self.session
            .start(&mut self.host)
            .with_context(|| format!("Failed to build script: {}", self.script.display()))?;

        let mut breakpoints = Vec::new();
        let mut calls = 0;
        while calls < self.max_ticks {
            calls += 1;
            match self.session.tick(&mut self.host) {
                TickOutcome::Applied(_) | TickOutcome::Waiting => {}
                TickOutcome::Paused => {
                    breakpoints.push(self.session.cursor().frame);
                    self.session.resume();
                }
                TickOutcome::Finished | TickOutcome::Inactive => break,
            }
            if self.session.state() == PlaybackState::Finished {
                break;
            }
        }

        if let Some(message) = self.host.aborted() {
            bail!("Playback aborted: {message}");
        }

        let report = PlaybackReport {
            script: self.script.display().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            state: self.session.state(),
            frame_count: self.session.timeline().frame_count(),
            frames_played: self.session.cursor().frame,
            checksum: format!("{:016x}", self.session.checksum().unwrap_or_default()),
            breakpoints,
            runs: collapse(self.host.applied()),
        };
        info!(
            "Headless run of {}: {} of {} frames, state {:?}",
            report.script, report.frames_played, report.frame_count, report.state
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Actions;

    fn tick(actions: Actions) -> TickInput {
        TickInput {
            actions,
            ..TickInput::default()
        }
    }

    #[test]
    fn test_collapse_groups_identical_ticks() {
        let applied = vec![
            tick(Actions::RIGHT),
            tick(Actions::RIGHT),
            tick(Actions::RIGHT | Actions::JUMP),
            tick(Actions::empty()),
        ];
        let runs = collapse(&applied);

        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].start_frame, runs[0].duration), (0, 2));
        assert_eq!(runs[0].actions, "R");
        assert_eq!(runs[1].actions, "RJ");
        assert_eq!((runs[2].start_frame, runs[2].actions.as_str()), (3, ""));
    }

    #[test]
    fn test_extra_keys_split_runs() {
        let mut pressed = tick(Actions::JUMP);
        pressed.extra_keys.push("T".to_string());
        let runs = collapse(&[tick(Actions::JUMP), pressed, tick(Actions::JUMP)]);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].extra_keys, vec!["T".to_string()]);
    }
}
