//! Invocation contexts handed to command handlers

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::playback::Host;
use crate::timeline::{BuildError, TimelineBuilder};

use super::CommandPayload;

/// Result type returned by every command handler
pub type CommandResult = Result<(), CommandError>;

/// Error raised by a command handler
#[derive(Debug, Error)]
pub enum CommandError {
    /// Explicit abort: halts the build or playback immediately
    #[error("{0}")]
    Abort(String),
    /// Ordinary failure: logged, then processing continues
    #[error("{0}")]
    Failed(String),
    /// A nested build (inclusion, loop pass) failed
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl CommandError {
    pub fn abort(message: impl Into<String>) -> Self {
        Self::Abort(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A pending in-place rewrite of one script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRewrite {
    pub file: Arc<Path>,
    /// 1-based line in `file`
    pub line: usize,
    /// Line shown to the editor
    pub display_line: usize,
    pub text: String,
}

/// State available while the timeline is being built
pub struct ParseScope<'a> {
    pub builder: &'a mut TimelineBuilder,
    pub(crate) payload: Option<CommandPayload>,
}

impl ParseScope<'_> {
    /// Attach a typed payload to the command being parsed
    pub fn set_payload(&mut self, payload: CommandPayload) {
        self.payload = Some(payload);
    }
}

/// State available when the cursor reaches a command's frame
pub struct RuntimeScope<'a> {
    pub host: &'a mut dyn Host,
    /// Frame the command is bound to
    pub frame: u64,
    /// Host ticks since playback started
    pub elapsed_ticks: u64,
    /// Host ticks per second
    pub tick_rate: u32,
    pub(crate) extra_keys: &'a mut Vec<String>,
    pub(crate) rewrites: &'a mut Vec<LineRewrite>,
}

impl RuntimeScope<'_> {
    /// Hold an extra key during the upcoming tick
    pub fn press(&mut self, key: &str) {
        if !self.extra_keys.iter().any(|k| k == key) {
            self.extra_keys.push(key.to_string());
        }
    }

    /// Queue an in-place rewrite of a script line
    pub fn rewrite_line(&mut self, rewrite: LineRewrite) {
        self.rewrites.push(rewrite);
    }
}

/// Context a handler is invoked with
pub enum CommandContext<'a> {
    Parse(ParseScope<'a>),
    Runtime(RuntimeScope<'a>),
}

impl<'a> CommandContext<'a> {
    pub(crate) fn parse(builder: &'a mut TimelineBuilder) -> Self {
        Self::Parse(ParseScope {
            builder,
            payload: None,
        })
    }

    /// True while the timeline is being built
    pub fn is_parsing(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Builder under construction, when parsing
    pub fn builder(&mut self) -> Option<&mut TimelineBuilder> {
        match self {
            Self::Parse(scope) => Some(&mut *scope.builder),
            Self::Runtime(_) => None,
        }
    }

    /// Playback scope, when running
    pub fn runtime(&mut self) -> Option<&mut RuntimeScope<'a>> {
        match self {
            Self::Parse(_) => None,
            Self::Runtime(scope) => Some(scope),
        }
    }

    pub(crate) fn into_payload(self) -> Option<CommandPayload> {
        match self {
            Self::Parse(scope) => scope.payload,
            Self::Runtime(_) => None,
        }
    }
}
