//! Command registry and dispatch
//!
//! Every command is declared once as a [`CommandSpec`]: a canonical name,
//! aliases, the timing at which its handler fires, and a [`Handler`] bound
//! to one fixed argument shape. The registry resolves names
//! case-insensitively, aliases included.

pub mod builtin;
mod context;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;
use hashbrown::HashMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::consistency::MetadataKind;

pub use context::{
    CommandContext, CommandError, CommandResult, LineRewrite, ParseScope, RuntimeScope,
};

bitflags! {
    /// When a command's handler fires
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExecuteTiming: u8 {
        /// While the timeline is being built
        const PARSE = 1 << 0;
        /// When the playback cursor reaches the command's frame
        const RUNTIME = 1 << 1;
    }
}

/// Handler bound to one argument shape
#[derive(Clone, Copy)]
pub enum Handler {
    /// `(args)`
    Args(fn(&mut CommandContext<'_>, &[String]) -> CommandResult),
    /// `(args, display line)`
    ArgsLine(fn(&mut CommandContext<'_>, &[String], usize) -> CommandResult),
    /// `(args, file, file line)`
    ArgsFileLine(fn(&mut CommandContext<'_>, &[String], &Path, usize) -> CommandResult),
    /// `(args, raw line text)`
    ArgsRawLine(fn(&mut CommandContext<'_>, &[String], &str) -> CommandResult),
    /// `(owning command)`
    ArgsCommand(fn(&mut CommandContext<'_>, &Command) -> CommandResult),
}

impl Handler {
    /// Invoke the handler with the arguments its shape asks for
    pub fn invoke(&self, ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
        match self {
            Self::Args(f) => f(ctx, &command.args),
            Self::ArgsLine(f) => f(ctx, &command.args, command.display_line),
            Self::ArgsFileLine(f) => f(ctx, &command.args, &command.file, command.file_line),
            Self::ArgsRawLine(f) => f(ctx, &command.args, &command.raw_line),
            Self::ArgsCommand(f) => f(ctx, command),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Args(_) => "args",
            Self::ArgsLine(_) => "args+line",
            Self::ArgsFileLine(_) => "args+file+line",
            Self::ArgsRawLine(_) => "args+raw-line",
            Self::ArgsCommand(_) => "args+command",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", self.shape())
    }
}

/// Declaration of a command
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub timing: ExecuteTiming,
    /// Allowed after `EnforceLegal`
    pub legal_when_restricted: bool,
    /// Contributes its text to the timeline checksum
    pub calc_checksum: bool,
    pub handler: Handler,
}

impl CommandSpec {
    /// Spec with the common defaults: runtime timing, legal, checksummed
    pub fn new(name: &'static str, handler: Handler) -> Self {
        Self {
            name,
            aliases: &[],
            timing: ExecuteTiming::RUNTIME,
            legal_when_restricted: true,
            calc_checksum: true,
            handler,
        }
    }

    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn timing(mut self, timing: ExecuteTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn illegal_when_restricted(mut self) -> Self {
        self.legal_when_restricted = false;
        self
    }

    pub fn without_checksum(mut self) -> Self {
        self.calc_checksum = false;
        self
    }
}

/// Typed data computed at parse time and consumed at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPayload {
    /// Validated key names for `Press`
    Press(SmallVec<[String; 4]>),
    /// Which measurement a metadata line records
    Metadata(MetadataKind),
}

/// A command bound to a frame of the timeline
#[derive(Debug, Clone)]
pub struct Command {
    pub spec: Arc<CommandSpec>,
    /// Argument tokens after the name
    pub args: Vec<String>,
    /// Trimmed source line
    pub raw_line: String,
    /// Frame the command executes at
    pub frame: u64,
    /// Line shown to the editor
    pub display_line: usize,
    /// File the line came from
    pub file: Arc<Path>,
    /// 1-based line within `file`
    pub file_line: usize,
    pub payload: Option<CommandPayload>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn is_runtime(&self) -> bool {
        self.spec.timing.contains(ExecuteTiming::RUNTIME)
    }

    pub fn metadata_kind(&self) -> Option<MetadataKind> {
        match self.payload {
            Some(CommandPayload::Metadata(kind)) => Some(kind),
            _ => None,
        }
    }
}

/// Error registering a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("command name '{0}' is already registered")]
    Duplicate(String),
}

/// Name-indexed set of command specs
#[derive(Debug, Default)]
pub struct CommandRegistry {
    specs: Vec<Arc<CommandSpec>>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in builtin::specs() {
            registry.insert(spec);
        }
        registry
    }

    /// Register a command, rejecting names or aliases already in use
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), RegistryError> {
        if let Some(taken) = std::iter::once(spec.name)
            .chain(spec.aliases.iter().copied())
            .find(|name| self.index.contains_key(&name.to_lowercase()))
        {
            return Err(RegistryError::Duplicate(taken.to_string()));
        }
        self.insert(spec);
        Ok(())
    }

    fn insert(&mut self, spec: CommandSpec) {
        let slot = self.specs.len();
        for name in std::iter::once(spec.name).chain(spec.aliases.iter().copied()) {
            self.index.insert(name.to_lowercase(), slot);
        }
        self.specs.push(Arc::new(spec));
    }

    /// Resolve a name or alias, case-insensitively
    pub fn resolve(&self, name: &str) -> Option<&Arc<CommandSpec>> {
        self.index
            .get(&name.to_lowercase())
            .map(|&slot| &self.specs[slot])
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CommandSpec>> {
        self.specs.iter()
    }
}
