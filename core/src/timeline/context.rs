//! Per-build parsing state
//!
//! Everything a build needs to remember between lines lives here and is
//! owned by exactly one [`TimelineBuilder`](super::TimelineBuilder), so
//! independent builds never observe each other.

use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;

/// An open `Repeat` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopFrame {
    /// Number of inputs in the timeline when the block opened
    pub start_input: usize,
    pub count: u32,
    /// Line of the `Repeat` command
    pub file_line: usize,
}

/// An open `AutoInput` or `StunPause` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoInputState {
    pub cycle_length: u32,
    /// Primary frames left before the next insertion
    pub cycle_offset: u32,
    /// First line after the `AutoInput` command
    pub pattern_start: usize,
    /// Captured pattern as `(file line, text)`, set by `StartAutoInput`
    pub pattern: Option<Vec<(usize, String)>>,
    /// Pattern frames are being inserted right now
    pub inserting: bool,
    /// Skip the next scheduled insertion
    pub skip_next: bool,
    /// Frames `SkipInput, frames` adds to the cycle once `skip_wait` runs out
    pub skip_frames: u32,
    /// Primary frames still to pass before `skip_frames` applies
    pub skip_wait: u32,
    /// Pattern synthesized by `StunPause` rather than authored
    pub synthesized: bool,
}

impl AutoInputState {
    /// Is the pattern captured and ready to interleave?
    pub fn is_active(&self) -> bool {
        self.pattern.is_some() && !self.inserting
    }

    /// Count one primary frame towards a pending `SkipInput, frames[, wait]`
    pub fn count_skip_wait(&mut self) {
        if self.skip_frames == 0 {
            return;
        }
        if self.skip_wait == 0 {
            self.cycle_offset += self.skip_frames;
            self.skip_frames = 0;
        } else {
            self.skip_wait -= 1;
        }
    }
}

/// One in-progress inclusion, used to detect cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeFrame {
    /// `"<command text>: line <n> of the file <path>"`
    pub descriptor: String,
}

/// Parsing state threaded through one build
#[derive(Debug, Default)]
pub struct ParsingContext {
    pub(crate) loops: HashMap<Arc<Path>, LoopFrame>,
    pub(crate) auto_inputs: HashMap<Arc<Path>, AutoInputState>,
    pub(crate) includes: Vec<IncludeFrame>,
    pub(crate) stop_current_file: bool,
    pub(crate) restricted: bool,
}

impl ParsingContext {
    pub fn loop_in(&self, file: &Path) -> Option<&LoopFrame> {
        self.loops.get(file)
    }

    pub fn auto_input_in(&self, file: &Path) -> Option<&AutoInputState> {
        self.auto_inputs.get(file)
    }

    /// Descriptors of inclusions currently being expanded, outermost first
    pub fn include_chain(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(|frame| frame.descriptor.as_str())
    }
}
