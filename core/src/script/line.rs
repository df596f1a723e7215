//! Line classification and token splitting

use super::marker::FastForwardMarker;

/// What a single trimmed script line represents
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind<'a> {
    /// Blank line
    Empty,
    /// `// text` or a bare `#`
    Comment,
    /// `#name`, only used as a target for label lookups
    Label(&'a str),
    /// `***` marker line
    FastForward(&'a str),
    /// Alphabetic first character; tokens include the command name
    Command(Vec<&'a str>),
    /// Anything else is parsed as an input frame
    Input,
}

/// Classify one line of script text.
///
/// The line is trimmed first. Classification never consults the command
/// registry; a `Command` whose name is unknown is rejected by the builder.
pub fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    let Some(first) = line.chars().next() else {
        return LineKind::Empty;
    };

    if line.starts_with("//") {
        return LineKind::Comment;
    }

    if let Some(rest) = line.strip_prefix('#') {
        let name = rest.trim();
        return if name.is_empty() {
            LineKind::Comment
        } else {
            LineKind::Label(name)
        };
    }

    if FastForwardMarker::is_marker(line) {
        return LineKind::FastForward(line);
    }

    if first.is_alphabetic() {
        return LineKind::Command(split_tokens(line));
    }

    LineKind::Input
}

/// Split a line into trimmed tokens.
///
/// Whitespace separates tokens when some whitespace run sits between two
/// non-comma characters before the first comma; otherwise commas do.
pub fn split_tokens(line: &str) -> Vec<&str> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    if uses_whitespace_separator(line) {
        line.split_whitespace().collect()
    } else {
        line.split(',').map(str::trim).collect()
    }
}

fn uses_whitespace_separator(line: &str) -> bool {
    let mut seen_non_comma = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ',' {
            return false;
        }
        if c.is_whitespace() {
            if seen_non_comma && chars.peek().is_some_and(|next| *next != ',') {
                return true;
            }
        } else {
            seen_non_comma = true;
        }
    }

    false
}

/// Does `line` declare the label `name`?
///
/// Matches `#name` with optional whitespace after the `#`.
pub fn is_label(line: &str, name: &str) -> bool {
    line.trim()
        .strip_prefix('#')
        .is_some_and(|rest| rest.trim() == name)
}
