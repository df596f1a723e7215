//! Resolving `Read` targets and line positions

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::script::is_label;

/// Failure to resolve a file or line position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("couldn't find \"{0}\"")]
    NotFound(String),

    #[error("ambiguous match for \"{target}\": {}", .candidates.join(", "))]
    Ambiguous {
        target: String,
        candidates: Vec<String>,
    },

    #[error("couldn't find label or line \"{0}\"")]
    LineNotFound(String),
}

/// Resolve `target` relative to `base_dir`.
///
/// `extension` is appended when missing. An exact path wins; otherwise
/// directory segments match case-insensitively (`..` climbs) and the file
/// name matches exactly or by a unique case-insensitive prefix, so
/// `Read, 1A` finds `1A - Forsaken City.tas`.
pub fn find_target_file(
    base_dir: &Path,
    target: &str,
    extension: &str,
) -> Result<PathBuf, ResolveError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ResolveError::NotFound(target.to_string()));
    }

    let suffix = format!(".{}", extension.to_lowercase());
    let mut name = target.to_string();
    if !name.to_lowercase().ends_with(&suffix) {
        name.push_str(&suffix);
    }

    let exact = base_dir.join(&name);
    if exact.is_file() {
        return canonical(&exact, target);
    }

    let segments: Vec<&str> = name
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect();
    let Some((file_name, dirs)) = segments.split_last() else {
        return Err(ResolveError::NotFound(target.to_string()));
    };

    let mut dir = if Path::new(&name).is_absolute() {
        PathBuf::from(std::path::MAIN_SEPARATOR_STR)
    } else {
        base_dir.to_path_buf()
    };

    for segment in dirs {
        match *segment {
            "." => {}
            ".." => dir.push(".."),
            segment => {
                let matches = matching_entries(&dir, |entry_name, is_dir| {
                    is_dir && entry_name.eq_ignore_ascii_case(segment)
                });
                dir = single_match(matches, target)?;
            }
        }
    }

    let stem = file_name[..file_name.len() - suffix.len()].to_lowercase();
    let candidates = matching_entries(&dir, |entry_name, is_dir| {
        let lower = entry_name.to_lowercase();
        !is_dir && lower.ends_with(&suffix) && lower.starts_with(&stem)
    });

    let exact: Vec<PathBuf> = candidates
        .iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase() == format!("{stem}{suffix}"))
        })
        .cloned()
        .collect();

    let found = if exact.len() == 1 {
        exact.into_iter().next()
    } else {
        Some(single_match(candidates, target)?)
    };

    match found {
        Some(path) => canonical(&path, target),
        None => Err(ResolveError::NotFound(target.to_string())),
    }
}

fn matching_entries(dir: &Path, accept: impl Fn(&str, bool) -> bool) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| accept(name, is_dir))
        })
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches
}

fn single_match(mut matches: Vec<PathBuf>, target: &str) -> Result<PathBuf, ResolveError> {
    match matches.len() {
        0 => Err(ResolveError::NotFound(target.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(ResolveError::Ambiguous {
            target: target.to_string(),
            candidates: matches
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}

fn canonical(path: &Path, target: &str) -> Result<PathBuf, ResolveError> {
    path.canonicalize()
        .map_err(|_| ResolveError::NotFound(target.to_string()))
}

/// Resolve a line position: a 1-based line number or a `#label` name.
///
/// Returns the 1-based line of the label itself.
pub fn find_line(lines: &[String], position: &str) -> Result<usize, ResolveError> {
    let position = position.trim();
    if let Ok(number) = position.parse::<usize>() {
        return Ok(number.max(1));
    }

    lines
        .iter()
        .position(|line| is_label(line, position))
        .map(|index| index + 1)
        .ok_or_else(|| ResolveError::LineNotFound(position.to_string()))
}
