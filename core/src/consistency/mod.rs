//! Checksums and hot-reload tracking
//!
//! - [`checksum`] hashes a timeline prefix so a save point can be checked
//!   against the current script before it is reused.
//! - [`FileTracker`] remembers what every contributing file looked like
//!   when it was read and reports when any of them changed on disk.

mod metadata;


use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use xxhash_rust::xxh3::{Xxh3, xxh3_64};

use crate::config::Freshness;
use crate::timeline::Timeline;

pub use metadata::{
    MetadataKind, apply_rewrites, file_time_rewrites, format_time, increment_record_counts,
};

/// Hash of everything that determines the timeline up to `prefix`.
///
/// Covers the root path, the literal text of each frame's input line and
/// the text of checksum-participating commands bound to frames
/// `0..=prefix`. Two builds from byte-identical sources agree at every
/// prefix.
pub fn checksum(timeline: &Timeline, prefix: u64) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(timeline.root().to_string_lossy().as_bytes());
    hasher.update(b"\n");

    let inputs = timeline.inputs();
    let frame_count = timeline.frame_count();
    let last = prefix.min(frame_count);
    let mut index = 0;

    for frame in 0..=last {
        for command in timeline.commands_at(frame) {
            if command.spec.calc_checksum {
                hasher.update(command.raw_line.as_bytes());
                hasher.update(b"\n");
            }
        }

        if frame == frame_count {
            break;
        }
        while index + 1 < inputs.len()
            && timeline.start_of(index + 1).is_some_and(|start| start <= frame)
        {
            index += 1;
        }
        if let Some(input) = inputs.get(index) {
            hasher.update(input.text.as_bytes());
            hasher.update(b"\n");
        }
    }

    hasher.digest()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TrackedFile {
    modified: Option<SystemTime>,
    digest: Option<u64>,
}

/// Records the state of every file a build read
#[derive(Debug, Clone, Default)]
pub struct FileTracker {
    freshness: Freshness,
    files: BTreeMap<PathBuf, TrackedFile>,
}

impl FileTracker {
    pub fn new(freshness: Freshness) -> Self {
        Self {
            freshness,
            files: BTreeMap::new(),
        }
    }

    /// Record `path` as read with contents `bytes`
    pub fn record(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let modified = fs::metadata(path)?.modified().ok();
        let digest = match self.freshness {
            Freshness::ModifiedTime => None,
            Freshness::ContentHash => Some(xxh3_64(bytes)),
        };
        self.files
            .insert(path.to_path_buf(), TrackedFile { modified, digest });
        Ok(())
    }

    /// Read `path` and record it
    pub fn track(&mut self, path: &Path) -> io::Result<()> {
        let bytes = fs::read(path)?;
        self.record(path, &bytes)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Tracked files in path order
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Has any tracked file changed since it was recorded?
    pub fn is_stale(&self) -> bool {
        self.files
            .iter()
            .any(|(path, tracked)| self.file_changed(path, tracked))
    }

    /// [`is_stale`](Self::is_stale) for the per-tick check.
    ///
    /// Under content hashing, a file whose modification time moved while
    /// its bytes did not gets the new time recorded, so it is not read
    /// again on every later check.
    pub fn refresh_stale(&mut self) -> bool {
        let freshness = self.freshness;
        let mut stale = false;
        for (path, tracked) in &mut self.files {
            let Ok(modified) = fs::metadata(path).and_then(|meta| meta.modified()) else {
                stale = true;
                continue;
            };
            if tracked.modified == Some(modified) {
                continue;
            }

            match (freshness, tracked.digest) {
                (Freshness::ContentHash, Some(digest)) => match fs::read(path) {
                    Ok(bytes) if xxh3_64(&bytes) == digest => tracked.modified = Some(modified),
                    _ => stale = true,
                },
                _ => stale = true,
            }
        }
        stale
    }

    /// Paths of tracked files that changed
    pub fn stale_files(&self) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|(path, tracked)| self.file_changed(path, tracked))
            .map(|(path, _)| path.as_path())
            .collect()
    }

    fn file_changed(&self, path: &Path, tracked: &TrackedFile) -> bool {
        let Ok(modified) = fs::metadata(path).and_then(|meta| meta.modified()) else {
            return true;
        };
        if tracked.modified == Some(modified) {
            return false;
        }

        match self.freshness {
            Freshness::ModifiedTime => true,
            Freshness::ContentHash => match (tracked.digest, fs::read(path)) {
                (Some(digest), Ok(bytes)) => xxh3_64(&bytes) != digest,
                _ => true,
            },
        }
    }

    /// Rewrite lines of `path` in place.
    ///
    /// `edit` receives the file's lines and returns whether it changed
    /// anything. The new state is recorded right after the write, so the
    /// engine's own edit never reads as an external change; a file that
    /// was already stale before the write stays stale.
    pub fn rewrite(
        &mut self,
        path: &Path,
        edit: impl FnOnce(&mut Vec<String>) -> bool,
    ) -> io::Result<bool> {
        let tracked = self.files.get(path).cloned();
        let was_stale = tracked
            .as_ref()
            .is_some_and(|tracked| self.file_changed(path, tracked));

        let content = fs::read_to_string(path)?;
        let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        if !edit(&mut lines) {
            return Ok(false);
        }

        let mut output = lines.join(newline);
        if content.ends_with('\n') {
            output.push_str(newline);
        }
        fs::write(path, &output)?;

        if tracked.is_some() {
            self.record(path, output.as_bytes())?;
            if was_stale && let Some(entry) = self.files.get_mut(path) {
                entry.modified = None;
                entry.digest = None;
            }
        }
        Ok(true)
    }
}
