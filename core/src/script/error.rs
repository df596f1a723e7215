//! Line-level parse errors

use thiserror::Error;

/// Error produced while parsing a single script line
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid frame duration '{0}'")]
    InvalidDuration(String),

    #[error("unknown action '{0}'")]
    UnknownAction(char),

    #[error("invalid feather angle '{0}'")]
    InvalidAngle(String),

    #[error("invalid feather magnitude '{0}'")]
    InvalidMagnitude(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid fast-forward marker '{0}'")]
    InvalidMarker(String),
}
