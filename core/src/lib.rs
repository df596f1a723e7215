//! Tasweave Core - frame-exact TAS script engine
//!
//! Turns line-oriented input scripts into a flat, frame-indexed timeline
//! and plays it back one tick at a time against a host simulation.
//!
//! # Architecture
//!
//! - [`script`] - Line classifier: inputs, labels, comments, markers, commands
//! - [`command`] - Command registry and the built-in commands
//! - [`timeline`] - [`TimelineBuilder`] expanding inclusions, loops and
//!   interleaved patterns into a [`Timeline`]
//! - [`playback`] - [`Session`] cursor, fast-forward markers, headless runs
//! - [`consistency`] - Checksums, hot-reload tracking and metadata rewrites
//! - [`config`] - `tasweave.toml` settings

pub mod command;
pub mod config;
pub mod consistency;
pub mod playback;
pub mod script;
pub mod timeline;

pub use command::{
    Command, CommandContext, CommandError, CommandRegistry, CommandResult, CommandSpec,
    ExecuteTiming, Handler,
};
pub use config::{EngineConfig, Freshness};
pub use consistency::{FileTracker, checksum};
pub use playback::{
    EditorLink, EditorPosition, HeadlessHost, HeadlessRunner, Host, PlaybackReport,
    PlaybackState, Session, TickInput, TickOutcome,
};
pub use script::{Actions, Feather, InputLine, ParseError};
pub use timeline::{BuildError, InputFrame, Timeline, TimelineBuilder};
