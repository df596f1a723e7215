//! Fast-forward marker lines (`***`, `***!`, `***S`, with optional speed)

use super::error::ParseError;

const MARKER_PREFIX: &str = "***";

/// Parsed fast-forward marker, before it is bound to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastForwardMarker {
    /// Explicit speed, if the line carried one
    pub speed: Option<u32>,
    /// `***!`: always pause here, even when later markers remain
    pub force_break: bool,
    /// `***S`: ask the host to save state on arrival
    pub save_state: bool,
}

impl FastForwardMarker {
    /// Does the trimmed line start with the marker prefix?
    pub fn is_marker(line: &str) -> bool {
        line.trim_start().starts_with(MARKER_PREFIX)
    }

    /// Parse a marker line
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(MARKER_PREFIX) else {
            return Err(ParseError::InvalidMarker(line.to_string()));
        };

        let mut marker = Self {
            speed: None,
            force_break: false,
            save_state: false,
        };

        let rest = if let Some(after) = rest.strip_prefix('!') {
            marker.force_break = true;
            after
        } else if let Some(after) = rest.strip_prefix(['S', 's']) {
            marker.save_state = true;
            after
        } else {
            rest
        };

        let speed = rest.trim();
        if !speed.is_empty() {
            let value: u32 = speed
                .parse()
                .map_err(|_| ParseError::InvalidMarker(line.to_string()))?;
            marker.speed = Some(value.max(1));
        }

        Ok(marker)
    }
}

/// A marker bound to a frame in the built timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastForward {
    /// Cumulative frame count at the marker's position
    pub frame: u64,
    /// Speed after applying the configured default
    pub speed: u32,
    pub force_break: bool,
    pub save_state: bool,
    /// Line shown to the editor
    pub display_line: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_speed() {
        let plain = FastForwardMarker::parse("***").unwrap();
        assert_eq!(plain.speed, None);
        assert!(!plain.force_break && !plain.save_state);

        let fast = FastForwardMarker::parse("***8").unwrap();
        assert_eq!(fast.speed, Some(8));

        let spaced = FastForwardMarker::parse("*** 20").unwrap();
        assert_eq!(spaced.speed, Some(20));
    }

    #[test]
    fn test_parse_flags() {
        let force = FastForwardMarker::parse("***!").unwrap();
        assert!(force.force_break);

        let save = FastForwardMarker::parse("***s10").unwrap();
        assert!(save.save_state);
        assert_eq!(save.speed, Some(10));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            FastForwardMarker::parse("***fast"),
            Err(ParseError::InvalidMarker(_))
        ));
    }
}
