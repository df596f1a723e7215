//! Timeline construction
//!
//! The builder walks script lines one at a time. Inputs are appended to the
//! timeline, commands are bound to the frame count at their position, and
//! PARSE-timed handlers run immediately with mutable access to the builder
//! so they can pull in more lines (inclusion, loop passes, pattern
//! insertion) while the build is in progress.

use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use super::context::{AutoInputState, IncludeFrame, LoopFrame, ParsingContext};
use super::error::BuildError;
use super::{InputFrame, Origin, Timeline};
use crate::command::{
    Command, CommandContext, CommandError, CommandRegistry, ExecuteTiming,
};
use crate::config::EngineConfig;
use crate::consistency::FileTracker;
use crate::script::{FastForward, FastForwardMarker, InputLine, LineKind, ParseError, classify};

/// How display lines are assigned while reading a range of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLine {
    /// Each line displays at its own line number (root file only)
    Follow,
    /// Every line displays at the given line
    Fixed(usize),
}

/// Result of a successful build
#[derive(Debug)]
pub struct BuildOutput {
    pub timeline: Timeline,
    /// State of every file the build read
    pub tracker: FileTracker,
}

/// Expands a root script into a [`Timeline`]
pub struct TimelineBuilder {
    registry: Arc<CommandRegistry>,
    config: EngineConfig,
    root: Arc<Path>,
    timeline: Timeline,
    context: ParsingContext,
    sources: HashMap<Arc<Path>, Arc<[String]>>,
    tracker: FileTracker,
}

impl TimelineBuilder {
    /// Create a builder for the script at `root`
    pub fn new(
        root: &Path,
        registry: Arc<CommandRegistry>,
        config: &EngineConfig,
    ) -> Result<Self, BuildError> {
        let root = root.canonicalize().map_err(|source| BuildError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        Ok(Self {
            registry,
            config: config.clone(),
            timeline: Timeline::new(root.clone()),
            root: Arc::from(root),
            context: ParsingContext::default(),
            sources: HashMap::new(),
            tracker: FileTracker::new(config.reload.freshness),
        })
    }

    /// Build the whole root script
    pub fn build(mut self) -> Result<BuildOutput, BuildError> {
        let root = Arc::clone(&self.root);
        self.read_file(&root, 1, usize::MAX, DisplayLine::Follow)?;

        info!(
            "Built timeline for {}: {} frames, {} inputs, {} commands",
            root.display(),
            self.timeline.frame_count(),
            self.timeline.inputs().len(),
            self.timeline.command_count()
        );

        Ok(BuildOutput {
            timeline: self.timeline,
            tracker: self.tracker,
        })
    }

    pub fn root(&self) -> &Arc<Path> {
        &self.root
    }

    pub fn is_root(&self, file: &Path) -> bool {
        *self.root == *file
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Timeline built so far
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub(crate) fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// Frames built so far
    pub fn frame_count(&self) -> u64 {
        self.timeline.frame_count()
    }

    pub fn context(&self) -> &ParsingContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut ParsingContext {
        &mut self.context
    }

    /// Display mode for re-reading `file`: root lines follow, others stay at `fixed`
    pub fn display_for(&self, file: &Path, fixed: usize) -> DisplayLine {
        if self.is_root(file) {
            DisplayLine::Follow
        } else {
            DisplayLine::Fixed(fixed)
        }
    }

    /// Lines of `path`, read once per build and tracked for hot reload
    pub fn load_source(&mut self, path: &Path) -> Result<(Arc<Path>, Arc<[String]>), BuildError> {
        if let Some((file, lines)) = self.sources.get_key_value(path) {
            return Ok((Arc::clone(file), Arc::clone(lines)));
        }

        let io_error = |source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        };
        let bytes = std::fs::read(path).map_err(io_error)?;
        self.tracker.record(path, &bytes).map_err(io_error)?;

        let content = String::from_utf8_lossy(&bytes);
        let content = content.strip_prefix('\u{feff}').unwrap_or(&*content);
        let lines: Arc<[String]> = content.lines().map(str::to_string).collect();
        let file: Arc<Path> = Arc::from(path);

        debug!("Loaded {} ({} lines)", path.display(), lines.len());
        self.sources.insert(Arc::clone(&file), Arc::clone(&lines));
        Ok((file, lines))
    }

    /// Read lines `first..=last` of `path`, then require its blocks to be closed
    pub fn read_file(
        &mut self,
        path: &Path,
        first: usize,
        last: usize,
        display: DisplayLine,
    ) -> Result<(), BuildError> {
        let (file, lines) = self.load_source(path)?;
        self.read_lines(&file, &lines, first, last, display)?;
        if self.is_root(&file) {
            // Hidden label stop at the end of the root script
            let end = self.timeline.frame_count();
            self.timeline.add_label(end, lines.len().min(last));
        }
        self.ensure_closed(&file)
    }

    /// Read 1-based lines `first..=last` of an already loaded file
    pub fn read_lines(
        &mut self,
        file: &Arc<Path>,
        lines: &[String],
        first: usize,
        last: usize,
        display: DisplayLine,
    ) -> Result<(), BuildError> {
        let last = last.min(lines.len());
        for file_line in first.max(1)..=last {
            let display_line = match display {
                DisplayLine::Follow => file_line,
                DisplayLine::Fixed(line) => line,
            };
            self.read_line(&lines[file_line - 1], file, file_line, display_line)?;

            if self.context.stop_current_file {
                self.context.stop_current_file = false;
                break;
            }
        }
        Ok(())
    }

    /// Classify and apply one line
    pub fn read_line(
        &mut self,
        raw: &str,
        file: &Arc<Path>,
        file_line: usize,
        display_line: usize,
    ) -> Result<(), BuildError> {
        let text = raw.trim();
        let parse_error = |error| BuildError::Parse {
            file: file.to_path_buf(),
            line: file_line,
            error,
        };

        match classify(text) {
            LineKind::Empty | LineKind::Comment => Ok(()),
            LineKind::Label(_) => {
                if self.is_root(file) {
                    self.timeline.add_label(self.timeline.frame_count(), display_line);
                }
                Ok(())
            }
            LineKind::FastForward(marker) => {
                let marker = FastForwardMarker::parse(marker).map_err(parse_error)?;
                self.add_marker(marker, file, display_line);
                Ok(())
            }
            LineKind::Command(tokens) => self.dispatch(&tokens, text, file, file_line, display_line),
            LineKind::Input => {
                let input = InputLine::parse(text).map_err(parse_error)?;
                let origin = Origin {
                    file: Arc::clone(file),
                    line: file_line,
                };
                self.add_input(input, origin, display_line, text)
            }
        }
    }

    fn add_marker(&mut self, marker: FastForwardMarker, file: &Path, display_line: usize) {
        if !self.is_root(file) {
            debug!("Ignoring fast-forward marker in included file {}", file.display());
            return;
        }

        self.timeline.add_fast_forward(FastForward {
            frame: self.timeline.frame_count(),
            speed: marker
                .speed
                .unwrap_or(self.config.playback.default_fast_forward_speed),
            force_break: marker.force_break,
            save_state: marker.save_state,
            display_line,
        });
    }

    fn dispatch(
        &mut self,
        tokens: &[&str],
        text: &str,
        file: &Arc<Path>,
        file_line: usize,
        display_line: usize,
    ) -> Result<(), BuildError> {
        let Some((name, args)) = tokens.split_first() else {
            return Ok(());
        };

        let Some(spec) = self.registry.resolve(name).cloned() else {
            return Err(BuildError::Parse {
                file: file.to_path_buf(),
                line: file_line,
                error: ParseError::UnknownCommand(name.to_string()),
            });
        };

        if self.context.restricted && !spec.legal_when_restricted {
            return Err(BuildError::Aborted {
                file: file.to_path_buf(),
                line: file_line,
                message: format!("{} is not allowed after EnforceLegal", spec.name),
            });
        }

        let mut command = Command {
            spec: Arc::clone(&spec),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            raw_line: text.to_string(),
            frame: self.timeline.frame_count(),
            display_line,
            file: Arc::clone(file),
            file_line,
            payload: None,
        };

        if spec.timing.contains(ExecuteTiming::PARSE) {
            let mut ctx = CommandContext::parse(self);
            let result = spec.handler.invoke(&mut ctx, &command);
            let payload = ctx.into_payload();

            match result {
                Ok(()) => command.payload = payload,
                Err(CommandError::Failed(message)) => {
                    warn!(
                        "{}:{}: {} failed: {}",
                        file.display(),
                        file_line,
                        spec.name,
                        message
                    );
                }
                Err(CommandError::Abort(message)) => {
                    return Err(BuildError::Aborted {
                        file: file.to_path_buf(),
                        line: file_line,
                        message,
                    });
                }
                Err(CommandError::Build(error)) => return Err(error),
            }
        }

        self.timeline.add_command(command);
        Ok(())
    }

    /// Append an input, interleaving the file's auto-input pattern if one is active
    pub fn add_input(
        &mut self,
        input: InputLine,
        origin: Origin,
        display_line: usize,
        text: &str,
    ) -> Result<(), BuildError> {
        let frame = InputFrame {
            duration: input.duration,
            actions: input.actions,
            feather: input.feather,
            origin,
            display_line,
            repeat_index: 0,
            repeat_count: 0,
            frame_offset: 0,
            source_duration: input.duration,
            text: Arc::from(text),
        };

        let file = Arc::clone(&frame.origin.file);
        let interleaving = self
            .context
            .auto_inputs
            .get(&file)
            .is_some_and(AutoInputState::is_active);
        if !interleaving {
            self.timeline.push_input(frame);
            return Ok(());
        }

        let mut consumed = 0;
        let mut slice = 0;
        for tick in 0..frame.duration {
            if self.insertion_due(&file) {
                self.insert_pattern(&file, display_line)?;
            }

            slice += 1;
            if self.count_primary_frame(&file) || tick + 1 == frame.duration {
                self.timeline.push_input(InputFrame {
                    duration: slice,
                    frame_offset: consumed,
                    ..frame.clone()
                });
                consumed += slice;
                slice = 0;
            }
        }
        Ok(())
    }

    /// Apply pending skips and reset the cycle when it ran out; true if the
    /// pattern goes in now
    fn insertion_due(&mut self, file: &Path) -> bool {
        let Some(state) = self.context.auto_inputs.get_mut(file) else {
            return false;
        };
        state.count_skip_wait();
        if state.cycle_offset != 0 {
            return false;
        }

        state.cycle_offset = state.cycle_length;
        if state.skip_next {
            state.skip_next = false;
            debug!("Skipping auto-input insertion in {}", file.display());
            return false;
        }
        true
    }

    /// Count one primary frame; true when this frame completes a cycle
    fn count_primary_frame(&mut self, file: &Path) -> bool {
        let Some(state) = self.context.auto_inputs.get_mut(file) else {
            return false;
        };
        state.cycle_offset = state.cycle_offset.saturating_sub(1);
        state.cycle_offset == 0
    }

    fn insert_pattern(&mut self, file: &Arc<Path>, primary_display: usize) -> Result<(), BuildError> {
        let Some(state) = self.context.auto_inputs.get(file) else {
            return Ok(());
        };
        let Some(pattern) = state.pattern.clone() else {
            return Ok(());
        };
        let follow = !state.synthesized && self.is_root(file);
        if let Some(state) = self.context.auto_inputs.get_mut(file) {
            state.inserting = true;
        }

        let mut result = Ok(());
        for (file_line, text) in &pattern {
            let display_line = if follow { *file_line } else { primary_display };
            result = self.read_line(text, file, *file_line, display_line);
            if result.is_err() {
                break;
            }
        }

        if let Some(state) = self.context.auto_inputs.get_mut(file) {
            state.inserting = false;
        }
        result
    }

    /// Expand `target` lines `first..=last` on behalf of `command`.
    ///
    /// The command's descriptor stays on the inclusion stack while the
    /// target is read, so reaching the same command again is a cycle.
    pub fn include(
        &mut self,
        command: &Command,
        target: &Path,
        first: usize,
        last: usize,
        display: DisplayLine,
    ) -> Result<(), BuildError> {
        let descriptor = describe(command);
        if self
            .context
            .includes
            .iter()
            .any(|frame| frame.descriptor == descriptor)
        {
            return Err(self.recursion_error("Cyclic inclusion detected", command));
        }

        debug!(
            "{} includes {} lines {}..={}",
            command.file.display(),
            target.display(),
            first,
            last
        );
        self.context.includes.push(IncludeFrame { descriptor });
        let result = self.read_file(target, first, last, display);
        self.context.includes.pop();
        result
    }

    /// Recursion error carrying the inclusion chain plus `command`
    pub fn recursion_error(&self, message: &str, command: &Command) -> BuildError {
        let chain = self
            .context
            .include_chain()
            .map(str::to_string)
            .chain(std::iter::once(describe(command)))
            .collect();
        BuildError::Recursion {
            message: message.to_string(),
            chain,
        }
    }

    /// Stop reading the file currently being read once the current line is done
    pub fn stop_current_file(&mut self) {
        self.context.stop_current_file = true;
    }

    pub(crate) fn open_loop(&mut self, file: &Arc<Path>, frame: LoopFrame) {
        self.context.loops.insert(Arc::clone(file), frame);
    }

    pub(crate) fn close_loop(&mut self, file: &Path) -> Option<LoopFrame> {
        self.context.loops.remove(file)
    }

    /// Tag inputs from `from` onward that came from `file` as repetition `index` of `count`
    pub(crate) fn tag_repeat(&mut self, file: &Path, from: usize, index: u32, count: u32) {
        for input in self.timeline.inputs_mut().iter_mut().skip(from) {
            if *input.origin.file == *file {
                input.repeat_index = index;
                input.repeat_count = count;
            }
        }
    }

    fn ensure_closed(&self, file: &Path) -> Result<(), BuildError> {
        if let Some(open) = self.context.loops.get(file) {
            return Err(BuildError::Unclosed {
                file: file.to_path_buf(),
                line: open.file_line,
                directive: "Repeat",
            });
        }
        if let Some(open) = self.context.auto_inputs.get(file) {
            return Err(BuildError::Unclosed {
                file: file.to_path_buf(),
                line: open.pattern_start.saturating_sub(1),
                directive: if open.synthesized {
                    "StunPause"
                } else {
                    "AutoInput"
                },
            });
        }
        Ok(())
    }
}

/// `"<command text>: line <n> of the file <path>"`
fn describe(command: &Command) -> String {
    format!(
        "{}: line {} of the file \"{}\"",
        command.raw_line,
        command.file_line,
        command.file.display()
    )
}
