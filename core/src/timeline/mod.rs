//! Frame-indexed timeline built from script files
//!
//! A [`TimelineBuilder`] expands the root script (and every file it pulls
//! in) into one [`Timeline`]: an append-only arena of [`InputFrame`]s whose
//! frame numbers are the cumulative sum of durations, plus commands and
//! fast-forward markers keyed by the frame they are bound to.

mod builder;
mod context;
mod error;
mod resolve;


use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::Command;
use crate::script::{Actions, FastForward, Feather};

pub use builder::{BuildOutput, DisplayLine, TimelineBuilder};
pub use context::{AutoInputState, IncludeFrame, LoopFrame, ParsingContext};
pub use error::BuildError;
pub use resolve::{ResolveError, find_line, find_target_file};

/// Where a line of script text came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub file: Arc<Path>,
    /// 1-based line number
    pub line: usize,
}

/// N consecutive frames holding the same input state
#[derive(Debug, Clone, PartialEq)]
pub struct InputFrame {
    /// Frames in this slice
    pub duration: u32,
    pub actions: Actions,
    pub feather: Option<Feather>,
    pub origin: Origin,
    /// Line shown to the editor
    pub display_line: usize,
    /// 1-based repetition when produced by `Repeat`, 0 otherwise
    pub repeat_index: u32,
    pub repeat_count: u32,
    /// Frames of the authored line that precede this slice
    pub frame_offset: u32,
    /// Duration of the authored line this slice was cut from
    pub source_duration: u32,
    /// Trimmed source text
    pub text: Arc<str>,
}

/// Expanded script: inputs, commands and fast-forward markers
#[derive(Debug, Clone)]
pub struct Timeline {
    root: PathBuf,
    inputs: Vec<InputFrame>,
    /// Start frame of each input, parallel to `inputs`
    starts: Vec<u64>,
    frame_count: u64,
    commands: BTreeMap<u64, Vec<Command>>,
    fast_forwards: BTreeMap<u64, FastForward>,
    /// Label stops in the root script: frame to display line
    labels: BTreeMap<u64, usize>,
    restricted: bool,
}

impl Timeline {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            inputs: Vec::new(),
            starts: Vec::new(),
            frame_count: 0,
            commands: BTreeMap::new(),
            fast_forwards: BTreeMap::new(),
            labels: BTreeMap::new(),
            restricted: false,
        }
    }

    /// Root script path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Total frames across all inputs
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn inputs(&self) -> &[InputFrame] {
        &self.inputs
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Append an input at the end of the timeline
    pub fn push_input(&mut self, input: InputFrame) {
        self.starts.push(self.frame_count);
        self.frame_count += u64::from(input.duration);
        self.inputs.push(input);
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [InputFrame] {
        &mut self.inputs
    }

    /// First frame covered by the input at `index`
    pub fn start_of(&self, index: usize) -> Option<u64> {
        self.starts.get(index).copied()
    }

    /// Index of the input covering `frame`
    pub fn index_at(&self, frame: u64) -> Option<usize> {
        if frame >= self.frame_count {
            return None;
        }
        Some(self.starts.partition_point(|&start| start <= frame) - 1)
    }

    /// Input covering `frame`
    pub fn input_at(&self, frame: u64) -> Option<&InputFrame> {
        self.index_at(frame).map(|index| &self.inputs[index])
    }

    /// Per-frame view: each input repeated `duration` times
    pub fn frames(&self) -> impl Iterator<Item = &InputFrame> + '_ {
        self.inputs
            .iter()
            .flat_map(|input| std::iter::repeat_n(input, input.duration as usize))
    }

    pub fn add_command(&mut self, command: Command) {
        self.commands.entry(command.frame).or_default().push(command);
    }

    /// Commands bound to `frame`, in source order
    pub fn commands_at(&self, frame: u64) -> &[Command] {
        self.commands.get(&frame).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> + '_ {
        self.commands.values().flatten()
    }

    pub fn command_count(&self) -> usize {
        self.commands.values().map(Vec::len).sum()
    }

    /// Bind a marker to its frame, replacing any marker already there
    pub fn add_fast_forward(&mut self, marker: FastForward) {
        self.fast_forwards.insert(marker.frame, marker);
    }

    pub fn fast_forwards(&self) -> &BTreeMap<u64, FastForward> {
        &self.fast_forwards
    }

    /// Record a label stop at `frame`; the first label at a frame wins
    pub fn add_label(&mut self, frame: u64, display_line: usize) {
        self.labels.entry(frame).or_insert(display_line);
    }

    pub fn labels(&self) -> &BTreeMap<u64, usize> {
        &self.labels
    }

    /// First label stop strictly after `frame`
    pub fn next_label(&self, frame: u64) -> Option<u64> {
        self.labels
            .range(frame.saturating_add(1)..)
            .next()
            .map(|(frame, _)| *frame)
    }

    /// Was `EnforceLegal` seen during the build?
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub(crate) fn set_restricted(&mut self) {
        self.restricted = true;
    }
}
