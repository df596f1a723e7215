//! Metadata lines the engine rewrites in place

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use super::FileTracker;
use crate::command::LineRewrite;
use crate::script::split_tokens;
use crate::timeline::Timeline;

/// Measurement recorded by a metadata command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    /// Number of edits that changed the run
    RecordCount,
    /// Ticks from start to finish
    FileTime,
    /// Placeholder kept for scripts that carry it
    ChapterTime,
    /// Ticks from start to the command
    MidwayFileTime,
}

/// Format host ticks as `m:ss.fff(ticks)`, or `h:mm:ss.fff(ticks)`
pub fn format_time(ticks: u64, tick_rate: u32) -> String {
    let rate = u64::from(tick_rate.max(1));
    let millis = ticks * 1000 / rate;
    let hours = millis / 3_600_000;
    let minutes = millis / 60_000 % 60;
    let seconds = millis / 1000 % 60;
    let fraction = millis % 1000;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}.{fraction:03}({ticks})")
    } else {
        format!("{minutes}:{seconds:02}.{fraction:03}({ticks})")
    }
}

/// Rewrites setting every `FileTime` line of the root file
pub fn file_time_rewrites(timeline: &Timeline, ticks: u64, tick_rate: u32) -> Vec<LineRewrite> {
    let text = format!("FileTime: {}", format_time(ticks, tick_rate));
    timeline
        .commands()
        .filter(|command| command.metadata_kind() == Some(MetadataKind::FileTime))
        .filter(|command| *command.file == *timeline.root())
        .map(|command| LineRewrite {
            file: Arc::clone(&command.file),
            line: command.file_line,
            display_line: command.display_line,
            text: text.clone(),
        })
        .collect()
}

/// Apply rewrites on disk.
///
/// Returns the replaced lines of the root file keyed by display line, for
/// forwarding to the editor.
pub fn apply_rewrites(
    tracker: &mut FileTracker,
    root: &Path,
    rewrites: &[LineRewrite],
) -> io::Result<BTreeMap<usize, String>> {
    let mut by_file: BTreeMap<&Path, Vec<&LineRewrite>> = BTreeMap::new();
    for rewrite in rewrites {
        by_file.entry(&*rewrite.file).or_default().push(rewrite);
    }

    let mut editor_lines = BTreeMap::new();
    for (file, edits) in by_file {
        tracker.rewrite(file, |lines| {
            let mut changed = false;
            for edit in &edits {
                if let Some(line) = lines.get_mut(edit.line - 1)
                    && *line != edit.text
                {
                    *line = edit.text.clone();
                    changed = true;
                }
            }
            changed
        })?;

        if file == root {
            for edit in edits {
                editor_lines.insert(edit.display_line, edit.text.clone());
            }
        }
    }

    Ok(editor_lines)
}

/// Increment every `RecordCount` line of the root file.
///
/// The current value is read from disk, so repeated increments between
/// rebuilds accumulate.
pub fn increment_record_counts(
    tracker: &mut FileTracker,
    timeline: &Timeline,
) -> io::Result<BTreeMap<usize, String>> {
    let targets: Vec<(usize, usize)> = timeline
        .commands()
        .filter(|command| command.metadata_kind() == Some(MetadataKind::RecordCount))
        .filter(|command| *command.file == *timeline.root())
        .map(|command| (command.file_line, command.display_line))
        .collect();
    if targets.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut editor_lines = BTreeMap::new();
    tracker.rewrite(timeline.root(), |lines| {
        for &(file_line, display_line) in &targets {
            let Some(line) = lines.get_mut(file_line - 1) else {
                continue;
            };
            let count = split_tokens(line)
                .get(1)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(0);
            *line = format!("RecordCount: {}", count + 1);
            editor_lines.insert(display_line, line.clone());
        }
        !editor_lines.is_empty()
    })?;

    Ok(editor_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0, 60), "0:00.000(0)");
        assert_eq!(format_time(60, 60), "0:01.000(60)");
        assert_eq!(format_time(3_723, 60), "1:02.050(3723)");
        assert_eq!(format_time(216_000, 60), "1:00:00.000(216000)");
    }
}
