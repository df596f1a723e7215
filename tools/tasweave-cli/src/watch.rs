//! Watch command - rebuild a script whenever a file it reads changes
//!
//! Every file the last successful build read is watched through its
//! parent directory. A change to any of them triggers a full rebuild and
//! a fresh summary; build errors are printed and watching continues.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use tracing::{info, warn};

use tasweave_core::config::EngineConfig;

use crate::check::{build_script, print_summary};

/// Debounce duration for file changes (batches rapid saves)
const DEBOUNCE_DURATION: Duration = Duration::from_millis(100);

/// Arguments for the watch command
#[derive(Args)]
pub struct WatchArgs {
    /// Root script
    pub script: PathBuf,
}

/// Event received from the file watcher
#[derive(Debug)]
pub enum WatchEvent {
    /// Tracked files changed
    FilesChanged(Vec<PathBuf>),
    /// Watch error occurred
    Error(String),
}

/// Watches a fixed set of script files
pub struct ScriptWatcher {
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    /// The debouncer (holds the watcher)
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    tracked: HashSet<PathBuf>,
}

impl ScriptWatcher {
    pub fn new(files: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut debouncer =
            new_debouncer(DEBOUNCE_DURATION, tx).context("Failed to create file watcher")?;

        // Editors often replace files on save, so watch directories, not files
        let dirs: HashSet<&Path> = files.iter().filter_map(|file| file.parent()).collect();
        let watcher = debouncer.watcher();
        for dir in dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch directory: {}", dir.display()))?;
        }

        Ok(Self {
            rx,
            _debouncer: debouncer,
            tracked: files.iter().map(|file| resolve(file)).collect(),
        })
    }

    /// Block until a tracked file changes or the watcher fails
    pub fn wait_for_changes(&self) -> WatchEvent {
        loop {
            match self.rx.recv() {
                Ok(Ok(events)) => {
                    let paths = events
                        .into_iter()
                        .filter(|event| matches!(event.kind, DebouncedEventKind::Any))
                        .map(|event| event.path);
                    let changed = tracked_changes(paths, &self.tracked);
                    if !changed.is_empty() {
                        return WatchEvent::FilesChanged(changed);
                    }
                    // Untracked neighbours in a watched directory
                }
                Ok(Err(e)) => return WatchEvent::Error(format!("Watch error: {e}")),
                Err(e) => return WatchEvent::Error(format!("Channel error: {e}")),
            }
        }
    }
}

/// Canonical form of `path`, also for files that no longer exist
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent().map(Path::canonicalize), path.file_name()) {
        (Some(Ok(parent)), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// The changed paths that belong to the tracked set, deduplicated
fn tracked_changes(
    paths: impl IntoIterator<Item = PathBuf>,
    tracked: &HashSet<PathBuf>,
) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .map(|path| resolve(&path))
        .filter(|path| tracked.contains(path) && seen.insert(path.clone()))
        .collect()
}

/// Build once, print the result, and return the files to watch next
fn rebuild(script: &Path, config: &EngineConfig, previous: Vec<PathBuf>) -> Vec<PathBuf> {
    match build_script(script, config) {
        Ok(output) => {
            print_summary(&output, config);
            output.tracker.files().map(Path::to_path_buf).collect()
        }
        Err(e) => {
            eprintln!("{e:#}");
            // Keep watching what the last good build read
            previous
        }
    }
}

/// Execute the watch command
pub fn execute(args: WatchArgs, config: &EngineConfig) -> Result<()> {
    let script = args.script;
    let mut files = rebuild(&script, config, vec![script.clone()]);

    loop {
        let watcher = ScriptWatcher::new(&files)?;
        info!("Watching {} file(s) for changes", files.len());

        match watcher.wait_for_changes() {
            WatchEvent::FilesChanged(changed) => {
                for path in &changed {
                    info!("Changed: {}", path.display());
                }
                println!();
                files = rebuild(&script, config, files);
            }
            WatchEvent::Error(message) => {
                warn!("{message}");
                bail!("File watcher stopped: {message}");
            }
        }
    }
}
