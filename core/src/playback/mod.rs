//! Lock-step playback of a built timeline
//!
//! A [`Session`] owns the timeline and a cursor into it. The host calls
//! [`Session::tick`] once per simulation tick; each call consumes at most
//! one frame. Fast-forwarding is the host calling `tick` several times per
//! wall-clock frame, at [`Session::playback_speed`].
//!
//! ```text
//! Idle --start--> Playing <--pause/resume--> Paused
//!                    |                          |
//!                    +--> Finished    stop --> Stopped
//! ```

mod fast_forward;
pub mod headless;
mod host;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::command::{CommandContext, CommandError, CommandRegistry, LineRewrite, RuntimeScope};
use crate::config::EngineConfig;
use crate::consistency::{self, FileTracker};
use crate::timeline::{BuildError, BuildOutput, InputFrame, Timeline, TimelineBuilder};

pub use fast_forward::PendingFastForwards;
pub use headless::{HeadlessHost, HeadlessRunner, PlaybackReport, ReportRun};
pub use host::{EditorLink, EditorPosition, Host, TickInput};

/// Playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Finished,
    Stopped,
}

/// What a call to [`Session::tick`] did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not playing
    Inactive,
    /// Host is loading; nothing changed
    Waiting,
    /// Paused, or just paused at a breakpoint
    Paused,
    /// One frame was applied
    Applied(TickInput),
    /// Ran past the last frame
    Finished,
}

/// Position of playback in the timeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Absolute frame played next
    pub frame: u64,
    /// Index of the input covering `frame`
    pub index: usize,
    /// Ticks of that input already played
    pub ticks_into_input: u32,
}

/// Captured host state at a `***S` marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePoint {
    pub frame: u64,
    /// Checksum of the timeline prefix up to `frame`
    pub checksum: u64,
    /// Host ticks played when the state was saved
    pub elapsed_ticks: u64,
}

/// Playback session for one root script
pub struct Session {
    root: PathBuf,
    registry: Arc<CommandRegistry>,
    config: EngineConfig,
    state: PlaybackState,
    timeline: Timeline,
    tracker: FileTracker,
    cursor: Cursor,
    fast_forwards: PendingFastForwards,
    /// Checksum of the whole timeline, set once built
    checksum: Option<u64>,
    save_point: Option<SavePoint>,
    /// Breakpoint already paused at, so resuming plays through it
    break_handled_at: Option<u64>,
    step_requested: bool,
    /// Label stop (or earlier marker) a label fast-forward is heading for
    label_target: Option<u64>,
    /// Frame a step-back replay pauses at
    step_back_target: Option<u64>,
    start_tick: u64,
    editor: Option<Box<dyn EditorLink>>,
}

impl Session {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<CommandRegistry>, config: EngineConfig) -> Self {
        let root = root.into();
        Self {
            timeline: Timeline::new(root.clone()),
            tracker: FileTracker::new(config.reload.freshness),
            root,
            registry,
            config,
            state: PlaybackState::Idle,
            cursor: Cursor::default(),
            fast_forwards: PendingFastForwards::default(),
            checksum: None,
            save_point: None,
            break_handled_at: None,
            step_requested: false,
            label_target: None,
            step_back_target: None,
            start_tick: 0,
            editor: None,
        }
    }

    /// Attach an editor that follows playback
    pub fn with_editor(mut self, editor: Box<dyn EditorLink>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn tracker(&self) -> &FileTracker {
        &self.tracker
    }

    pub fn checksum(&self) -> Option<u64> {
        self.checksum
    }

    pub fn save_point(&self) -> Option<SavePoint> {
        self.save_point
    }

    /// Input played at the cursor
    pub fn current_input(&self) -> Option<&InputFrame> {
        self.timeline.input_at(self.cursor.frame)
    }

    /// Input played on the frame before the cursor
    pub fn previous_input(&self) -> Option<&InputFrame> {
        self.cursor
            .frame
            .checked_sub(1)
            .and_then(|frame| self.timeline.input_at(frame))
    }

    /// Input played on the frame after the cursor
    pub fn next_input(&self) -> Option<&InputFrame> {
        self.timeline.input_at(self.cursor.frame + 1)
    }

    /// Is a fast-forward marker still ahead of the cursor?
    pub fn has_fast_forward(&self) -> bool {
        self.fast_forwards.has_pending(self.cursor.frame)
    }

    /// Speed of the earliest remaining marker, or 1
    pub fn fast_forward_speed(&self) -> u32 {
        self.fast_forwards.speed()
    }

    /// Ticks the host should run per wall-clock frame
    pub fn playback_speed(&self) -> u32 {
        if self.state != PlaybackState::Playing {
            return 1;
        }
        let frame = self.cursor.frame;
        if self.step_back_target.is_some()
            || self.label_target.is_some_and(|target| target > frame)
        {
            self.config.playback.default_fast_forward_speed
        } else if self.has_fast_forward() {
            self.fast_forward_speed()
        } else {
            1
        }
    }

    fn build(&self) -> Result<BuildOutput, BuildError> {
        TimelineBuilder::new(&self.root, Arc::clone(&self.registry), &self.config)?.build()
    }

    fn install(&mut self, output: BuildOutput) {
        self.timeline = output.timeline;
        self.tracker = output.tracker;
        self.fast_forwards = PendingFastForwards::new(self.timeline.fast_forwards());
    }

    /// Build the script and start playing from the top, or from the save
    /// point if it still matches the script
    pub fn start(&mut self, host: &mut dyn Host) -> Result<(), BuildError> {
        let output = match self.build() {
            Ok(output) => output,
            Err(e) => {
                self.abort(host, &e.to_string());
                return Err(e);
            }
        };
        self.install(output);
        self.checksum = Some(consistency::checksum(
            &self.timeline,
            self.timeline.frame_count(),
        ));
        self.cursor = Cursor::default();
        self.break_handled_at = None;
        self.step_requested = false;
        self.label_target = None;
        self.step_back_target = None;
        self.start_tick = host.tick_counter();
        self.state = PlaybackState::Playing;

        self.restore_save_point(host);
        info!(
            "Playing {} ({} frames) from frame {}",
            self.root.display(),
            self.timeline.frame_count(),
            self.cursor.frame
        );
        Ok(())
    }

    fn restore_save_point(&mut self, host: &mut dyn Host) {
        let Some(point) = self.save_point else {
            return;
        };

        let matches = point.frame <= self.timeline.frame_count()
            && consistency::checksum(&self.timeline, point.frame) == point.checksum;
        if !matches {
            warn!(
                "Discarding save point at frame {}: script changed before it",
                point.frame
            );
            self.save_point = None;
            return;
        }
        if !host.load_state() {
            warn!("Discarding save point at frame {}: host could not load it", point.frame);
            self.save_point = None;
            return;
        }

        self.seek(point.frame);
        self.break_handled_at = Some(point.frame);
        self.start_tick = host.tick_counter().saturating_sub(point.elapsed_ticks);
        info!("Resumed from save point at frame {}", point.frame);
    }

    /// Stop playback and drop the timeline
    pub fn stop(&mut self) {
        if matches!(self.state, PlaybackState::Idle | PlaybackState::Stopped) {
            return;
        }
        info!("Playback stopped at frame {}", self.cursor.frame);
        self.state = PlaybackState::Stopped;
        self.reset();
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
            self.step_requested = false;
        }
    }

    /// Play exactly one frame on the next tick, then pause again
    pub fn step(&mut self) {
        if self.state == PlaybackState::Paused {
            self.step_requested = true;
        }
    }

    /// Fast-forward to the next label stop, or to a marker before it.
    ///
    /// Returns the frame playback will pause at, if there is one ahead.
    pub fn fast_forward_to_next_label(&mut self) -> Option<u64> {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return None;
        }

        let frame = self.cursor.frame;
        let label = self.timeline.next_label(frame);
        let marker = self
            .fast_forwards
            .target(frame.saturating_add(1))
            .map(|marker| marker.frame);
        self.label_target = match (label, marker) {
            (Some(label), Some(marker)) => Some(label.min(marker)),
            (label, _) => label,
        };
        self.step_requested = false;
        self.state = PlaybackState::Playing;

        debug!("Fast-forwarding from frame {frame} to {:?}", self.label_target);
        self.label_target
    }

    /// Replay from the top at fast-forward speed and pause `frames` frames
    /// before the current one, never before frame 1.
    ///
    /// The host is restarted and runtime commands fire again on the way.
    pub fn step_back(&mut self, host: &mut dyn Host, frames: u64) -> Result<(), BuildError> {
        if frames == 0 || !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return Ok(());
        }

        let target = self.cursor.frame.saturating_sub(frames).max(1);
        if let Err(e) = self.reload() {
            self.abort(host, &e.to_string());
            return Err(e);
        }

        host.restart();
        self.seek(0);
        self.start_tick = host.tick_counter();
        self.break_handled_at = None;
        self.step_requested = false;
        self.label_target = None;
        self.step_back_target = Some(target);
        self.state = PlaybackState::Playing;
        info!("Stepping back to frame {target}");
        Ok(())
    }

    /// Move the cursor to `frame` without firing any command
    pub fn seek(&mut self, frame: u64) {
        let frame = frame.min(self.timeline.frame_count());
        let (index, ticks_into_input) = match self.timeline.index_at(frame) {
            Some(index) => {
                let start = self.timeline.start_of(index).unwrap_or(frame);
                (index, (frame - start) as u32)
            }
            None => (self.timeline.inputs().len(), 0),
        };
        self.cursor = Cursor {
            frame,
            index,
            ticks_into_input,
        };
        self.fast_forwards = PendingFastForwards::new(self.timeline.fast_forwards());
        self.fast_forwards.consume(frame);
    }

    /// Rebuild from disk and put the cursor back on the same frame.
    ///
    /// Runtime commands already played are not fired again. A rebuild that
    /// changes the checksum bumps the script's `RecordCount` lines.
    pub fn reload(&mut self) -> Result<(), BuildError> {
        let frame = self.cursor.frame;
        let output = self.build()?;
        self.install(output);

        let checksum = consistency::checksum(&self.timeline, self.timeline.frame_count());
        if self.checksum.is_some_and(|previous| previous != checksum) {
            match consistency::increment_record_counts(&mut self.tracker, &self.timeline) {
                Ok(lines) => self.forward_lines(&lines),
                Err(e) => warn!("Failed to update RecordCount: {e}"),
            }
        }
        self.checksum = Some(checksum);
        self.seek(frame);

        info!(
            "Reloaded {} at frame {} of {}",
            self.root.display(),
            self.cursor.frame,
            self.timeline.frame_count()
        );
        Ok(())
    }

    /// Advance playback by at most one frame
    pub fn tick(&mut self, host: &mut dyn Host) -> TickOutcome {
        match self.state {
            PlaybackState::Idle | PlaybackState::Finished | PlaybackState::Stopped => {
                return TickOutcome::Inactive;
            }
            PlaybackState::Paused if !self.step_requested => return TickOutcome::Paused,
            _ => {}
        }

        if !host.is_loading() && self.tracker.refresh_stale() {
            for path in self.tracker.stale_files() {
                debug!("Changed on disk: {}", path.display());
            }
            if let Err(e) = self.reload() {
                self.abort(host, &e.to_string());
                return TickOutcome::Inactive;
            }
        }
        if host.is_loading() {
            return TickOutcome::Waiting;
        }

        let frame = self.cursor.frame;
        if frame >= self.timeline.frame_count() {
            self.finish(host);
            return TickOutcome::Finished;
        }

        if self.state == PlaybackState::Playing
            && self.step_back_target.is_none()
            && self.break_handled_at != Some(frame)
            && (self.fast_forwards.should_break(frame) || self.label_target == Some(frame))
        {
            self.break_handled_at = Some(frame);
            self.label_target = None;
            self.state = PlaybackState::Paused;
            info!("Paused at breakpoint on frame {frame}");
            return TickOutcome::Paused;
        }

        self.capture_save_point(host, frame);

        let mut extra_keys = Vec::new();
        if !self.fire_commands(host, frame, &mut extra_keys) {
            return TickOutcome::Inactive;
        }

        let Some(input) = self.timeline.inputs().get(self.cursor.index) else {
            self.finish(host);
            return TickOutcome::Finished;
        };
        let tick_input = TickInput {
            actions: input.actions,
            analog: input.feather.map(|feather| feather.vector()),
            extra_keys,
        };
        let position = EditorPosition {
            display_line: input.display_line,
            ticks_into_input: input.frame_offset + self.cursor.ticks_into_input + 1,
            total_ticks_for_input: input.source_duration,
            inputs_consumed: self.cursor.index,
        };
        let duration = input.duration;

        host.apply_tick_input(&tick_input);
        if let Some(editor) = self.editor.as_mut() {
            editor.update_position(&position);
        }
        self.advance(duration);

        if self.step_requested {
            self.step_requested = false;
            self.state = PlaybackState::Paused;
        }
        if self
            .step_back_target
            .is_some_and(|target| self.cursor.frame >= target)
        {
            self.step_back_target = None;
            self.break_handled_at = Some(self.cursor.frame);
            self.state = PlaybackState::Paused;
            info!("Stepped back to frame {}", self.cursor.frame);
        }
        if self.cursor.frame >= self.timeline.frame_count() {
            self.finish(host);
        }
        TickOutcome::Applied(tick_input)
    }

    fn advance(&mut self, duration: u32) {
        self.cursor.frame += 1;
        self.cursor.ticks_into_input += 1;
        if self.cursor.ticks_into_input >= duration {
            self.cursor.index += 1;
            self.cursor.ticks_into_input = 0;
        }
        self.fast_forwards.consume(self.cursor.frame);
    }

    fn elapsed_ticks(&self, host: &dyn Host) -> u64 {
        host.tick_counter().saturating_sub(self.start_tick)
    }

    fn capture_save_point(&mut self, host: &mut dyn Host, frame: u64) {
        let wants_save = self
            .fast_forwards
            .get(frame)
            .is_some_and(|marker| marker.save_state);
        let already_saved = self.save_point.is_some_and(|point| point.frame == frame);
        if !wants_save || already_saved {
            return;
        }

        if host.save_state() {
            self.save_point = Some(SavePoint {
                frame,
                checksum: consistency::checksum(&self.timeline, frame),
                elapsed_ticks: self.elapsed_ticks(host),
            });
            info!("Saved state at frame {frame}");
        } else {
            debug!("Host declined to save state at frame {frame}");
        }
    }

    /// Fire the runtime commands bound to `frame`; false if one aborted
    fn fire_commands(&mut self, host: &mut dyn Host, frame: u64, extra_keys: &mut Vec<String>) -> bool {
        let elapsed_ticks = self.elapsed_ticks(host);
        let tick_rate = self.config.playback.tick_rate;
        let restricted = self.timeline.is_restricted();
        let mut rewrites: Vec<LineRewrite> = Vec::new();
        let mut aborted = None;

        for command in self.timeline.commands_at(frame) {
            if !command.is_runtime() {
                continue;
            }
            if restricted && !command.spec.legal_when_restricted {
                warn!(
                    "{}:{}: skipping {}, not allowed after EnforceLegal",
                    command.file.display(),
                    command.file_line,
                    command.name()
                );
                continue;
            }

            let mut ctx = CommandContext::Runtime(RuntimeScope {
                host: &mut *host,
                frame,
                elapsed_ticks,
                tick_rate,
                extra_keys: &mut *extra_keys,
                rewrites: &mut rewrites,
            });
            match command.spec.handler.invoke(&mut ctx, command) {
                Ok(()) => {}
                Err(CommandError::Abort(message)) => {
                    aborted = Some(message);
                    break;
                }
                Err(e) => warn!(
                    "{}:{}: {} failed: {e}",
                    command.file.display(),
                    command.file_line,
                    command.name()
                ),
            }
        }

        if let Some(message) = aborted {
            self.abort(host, &message);
            return false;
        }
        self.apply_rewrites(&rewrites);
        true
    }

    fn apply_rewrites(&mut self, rewrites: &[LineRewrite]) {
        if rewrites.is_empty() {
            return;
        }
        match consistency::apply_rewrites(&mut self.tracker, self.timeline.root(), rewrites) {
            Ok(lines) => self.forward_lines(&lines),
            Err(e) => warn!("Failed to rewrite metadata lines: {e}"),
        }
    }

    fn forward_lines(&mut self, lines: &BTreeMap<usize, String>) {
        if lines.is_empty() {
            return;
        }
        if let Some(editor) = self.editor.as_mut() {
            editor.replace_lines(lines);
        }
    }

    /// Fire trailing commands, write `FileTime` and stop advancing
    fn finish(&mut self, host: &mut dyn Host) {
        let end = self.timeline.frame_count();
        let mut extra_keys = Vec::new();
        if !self.fire_commands(host, end, &mut extra_keys) {
            return;
        }

        let elapsed = self.elapsed_ticks(host);
        let rewrites =
            consistency::file_time_rewrites(&self.timeline, elapsed, self.config.playback.tick_rate);
        self.apply_rewrites(&rewrites);

        self.state = PlaybackState::Finished;
        info!(
            "Playback finished: {} frames in {}",
            end,
            consistency::format_time(elapsed, self.config.playback.tick_rate)
        );
    }

    /// The single abort path: stop, drop the timeline and tell the host
    fn abort(&mut self, host: &mut dyn Host, message: &str) {
        error!("Playback aborted: {message}");
        self.state = PlaybackState::Stopped;
        self.reset();

        let notice = Duration::try_from_secs_f32(self.config.playback.abort_notice_secs)
            .ok()
            .filter(|notice| !notice.is_zero());
        host.abort(message, true, notice);
    }

    fn reset(&mut self) {
        self.timeline = Timeline::new(self.root.clone());
        self.tracker = FileTracker::new(self.config.reload.freshness);
        self.fast_forwards = PendingFastForwards::default();
        self.cursor = Cursor::default();
        self.checksum = None;
        self.break_handled_at = None;
        self.step_requested = false;
        self.label_target = None;
        self.step_back_target = None;
    }
}
