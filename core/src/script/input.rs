//! Input-frame lines: `<duration>[,ACTION]*` and the feather sub-syntax

use std::fmt;

use bitflags::bitflags;

use super::error::ParseError;
use super::line::split_tokens;

/// Longest duration a single input line may hold
pub const MAX_DURATION: u32 = 9999;

bitflags! {
    /// Actions held during an input frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Actions: u16 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const JUMP = 1 << 4;
        const JUMP2 = 1 << 5;
        const DASH = 1 << 6;
        const DASH2 = 1 << 7;
        const GRAB = 1 << 8;
        const START = 1 << 9;
        const RESTART = 1 << 10;
        const JOURNAL = 1 << 11;
        const CONFIRM = 1 << 12;
        const FEATHER = 1 << 13;

        const DIRECTIONS = Self::LEFT.bits() | Self::RIGHT.bits() | Self::UP.bits() | Self::DOWN.bits();
    }
}

/// Canonical output order of action letters
const LETTER_ORDER: [(char, Actions); 13] = [
    ('L', Actions::LEFT),
    ('R', Actions::RIGHT),
    ('U', Actions::UP),
    ('D', Actions::DOWN),
    ('J', Actions::JUMP),
    ('K', Actions::JUMP2),
    ('X', Actions::DASH),
    ('C', Actions::DASH2),
    ('G', Actions::GRAB),
    ('S', Actions::START),
    ('Q', Actions::RESTART),
    ('N', Actions::JOURNAL),
    ('O', Actions::CONFIRM),
];

impl Actions {
    /// Look up a single action letter, case-insensitively
    pub fn from_letter(letter: char) -> Option<Actions> {
        let upper = letter.to_ascii_uppercase();
        if upper == 'F' {
            return Some(Actions::FEATHER);
        }
        LETTER_ORDER
            .iter()
            .find(|(c, _)| *c == upper)
            .map(|(_, action)| *action)
    }

    /// Held letters in canonical order, `F` last
    pub fn letters(self) -> String {
        let mut letters: String = LETTER_ORDER
            .iter()
            .filter(|(_, action)| self.contains(*action))
            .map(|(letter, _)| *letter)
            .collect();
        if self.contains(Actions::FEATHER) {
            letters.push('F');
        }
        letters
    }
}

/// Analog direction for feather frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feather {
    /// Degrees clockwise from up, 0..=360
    pub angle: f32,
    /// 0..=1
    pub magnitude: f32,
}

impl Feather {
    pub fn new(angle: f32, magnitude: f32) -> Self {
        Self {
            angle: angle.clamp(0.0, 360.0),
            magnitude: magnitude.clamp(0.0, 1.0),
        }
    }

    /// Unit-circle vector scaled by magnitude, y pointing up
    pub fn vector(&self) -> (f32, f32) {
        let radians = self.angle.to_radians();
        (
            radians.sin() * self.magnitude,
            radians.cos() * self.magnitude,
        )
    }
}

/// Parsed input-frame line
#[derive(Debug, Clone, PartialEq)]
pub struct InputLine {
    pub duration: u32,
    pub actions: Actions,
    pub feather: Option<Feather>,
}

impl InputLine {
    /// Parse an input line such as `  15,R,J` or `5 F 90 0.5`.
    ///
    /// The duration is clamped to `1..=MAX_DURATION`. Letters toggle, so a
    /// repeated letter cancels itself. `F` switches the frame to analog
    /// mode and drops any directional letters.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let tokens = split_tokens(text);
        let mut tokens = tokens.into_iter().peekable();

        let duration = parse_duration(tokens.next().unwrap_or_default())?;
        let mut actions = Actions::empty();
        let mut feather = None;

        while let Some(token) = tokens.next() {
            if token.eq_ignore_ascii_case("F") {
                // An empty token takes the default, like an omitted one
                let angle = match tokens.next_if(|t| !is_letters(t)) {
                    Some(t) if !t.is_empty() => t
                        .parse::<f32>()
                        .map_err(|_| ParseError::InvalidAngle(t.to_string()))?,
                    _ => 0.0,
                };
                let magnitude = match tokens.next_if(|t| !is_letters(t)) {
                    Some(t) if !t.is_empty() => t
                        .parse::<f32>()
                        .map_err(|_| ParseError::InvalidMagnitude(t.to_string()))?,
                    _ => 1.0,
                };
                feather = Some(Feather::new(angle, magnitude));
                actions.insert(Actions::FEATHER);
                continue;
            }

            for letter in token.chars() {
                let action = Actions::from_letter(letter).ok_or(ParseError::UnknownAction(letter))?;
                if action == Actions::FEATHER {
                    feather.get_or_insert(Feather::new(0.0, 1.0));
                    actions.insert(Actions::FEATHER);
                } else {
                    actions.toggle(action);
                }
            }
        }

        if feather.is_some() {
            actions.remove(Actions::DIRECTIONS);
        }

        Ok(Self {
            duration,
            actions,
            feather,
        })
    }
}

fn is_letters(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic())
}

fn parse_duration(token: &str) -> Result<u32, ParseError> {
    let value: i64 = token
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidDuration(token.to_string()))?;
    Ok(value.clamp(1, MAX_DURATION as i64) as u32)
}

impl fmt::Display for InputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}", self.duration)?;
        for (letter, action) in LETTER_ORDER {
            if self.actions.contains(action) {
                write!(f, ",{letter}")?;
            }
        }
        if let Some(feather) = self.feather {
            write!(f, ",F,{}", feather.angle)?;
            if feather.magnitude < 1.0 {
                write!(f, ",{}", feather.magnitude)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_and_letters() {
        let line = InputLine::parse("  15,R,J").unwrap();
        assert_eq!(line.duration, 15);
        assert_eq!(line.actions, Actions::RIGHT | Actions::JUMP);
        assert!(line.feather.is_none());
    }

    #[test]
    fn test_duration_is_clamped() {
        assert_eq!(InputLine::parse("0").unwrap().duration, 1);
        assert_eq!(InputLine::parse("-4").unwrap().duration, 1);
        assert_eq!(InputLine::parse("123456,J").unwrap().duration, MAX_DURATION);
    }

    #[test]
    fn test_duplicate_letters_toggle_off() {
        let line = InputLine::parse("5,J,j,X").unwrap();
        assert_eq!(line.actions, Actions::DASH);

        let packed = InputLine::parse("5,RJR").unwrap();
        assert_eq!(packed.actions, Actions::JUMP);
    }

    #[test]
    fn test_whitespace_separated_input() {
        let line = InputLine::parse("  7 L G").unwrap();
        assert_eq!(line.duration, 7);
        assert_eq!(line.actions, Actions::LEFT | Actions::GRAB);
    }

    #[test]
    fn test_feather_clears_directions() {
        let line = InputLine::parse("3,R,U,F,90,0.5").unwrap();
        assert_eq!(line.actions, Actions::FEATHER);
        let feather = line.feather.unwrap();
        assert_eq!(feather.angle, 90.0);
        assert_eq!(feather.magnitude, 0.5);

        let (x, y) = feather.vector();
        assert!((x - 0.5).abs() < 1e-5);
        assert!(y.abs() < 1e-5);
    }

    #[test]
    fn test_feather_defaults_and_trailing_letters() {
        let line = InputLine::parse("3,F,J").unwrap();
        assert_eq!(line.actions, Actions::FEATHER | Actions::JUMP);
        assert_eq!(line.feather, Some(Feather::new(0.0, 1.0)));
    }

    #[test]
    fn test_feather_empty_parameters_take_defaults() {
        let line = InputLine::parse("5,F,,0.5").unwrap();
        assert_eq!(line.feather, Some(Feather::new(0.0, 0.5)));

        let line = InputLine::parse("5,F,90,,J").unwrap();
        assert_eq!(line.actions, Actions::FEATHER | Actions::JUMP);
        assert_eq!(line.feather, Some(Feather::new(90.0, 1.0)));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            InputLine::parse("ten,J"),
            Err(ParseError::InvalidDuration("ten".to_string()))
        );
        assert_eq!(InputLine::parse("5,J,P"), Err(ParseError::UnknownAction('P')));
        assert_eq!(
            InputLine::parse("5,F,1x"),
            Err(ParseError::InvalidAngle("1x".to_string()))
        );
        assert_eq!(
            InputLine::parse("5,F,90,big"),
            Err(ParseError::UnknownAction('b'))
        );
    }

    #[test]
    fn test_canonical_text() {
        let line = InputLine::parse("5,J,R,X").unwrap();
        assert_eq!(line.to_string(), "   5,R,J,X");

        let feather = InputLine::parse("12,F,45,0.25").unwrap();
        assert_eq!(feather.to_string(), "  12,F,45,0.25");
    }
}
