//! Collaborators the playback session drives

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::script::Actions;

/// Everything the host applies for one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickInput {
    pub actions: Actions,
    /// Analog stick vector when the frame is in feather mode
    pub analog: Option<(f32, f32)>,
    /// Extra keys held by `Press` commands, upper-case
    pub extra_keys: Vec<String>,
}

/// The simulation being driven.
///
/// The session calls into the host once per tick and never blocks on it.
pub trait Host {
    /// Is the host busy with a blocking load? Ticks are skipped while true.
    fn is_loading(&self) -> bool {
        false
    }

    /// Apply `input` for exactly one tick
    fn apply_tick_input(&mut self, input: &TickInput);

    /// Halt playback and surface `message`, optionally with a timed notice
    fn abort(&mut self, message: &str, show_dialog: bool, notice: Option<Duration>);

    /// Monotonic tick counter
    fn tick_counter(&self) -> u64;

    /// Playback went back to frame 0 to replay; put the simulation back
    /// in its starting state
    fn restart(&mut self) {}

    /// Run a host console command
    fn run_console(&mut self, args: &[String]) -> Result<()> {
        bail!("host has no console (requested: {})", args.join(" "))
    }

    /// Capture a save point; false if unsupported
    fn save_state(&mut self) -> bool {
        false
    }

    /// Restore the last captured save point; false if there is none
    fn load_state(&mut self) -> bool {
        false
    }
}

/// Where playback is, for live highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditorPosition {
    pub display_line: usize,
    /// Ticks of the authored line played so far, this one included
    pub ticks_into_input: u32,
    /// Duration of the authored line
    pub total_ticks_for_input: u32,
    /// Timeline inputs fully played before this one
    pub inputs_consumed: usize,
}

/// An external editor following playback
pub trait EditorLink {
    fn update_position(&mut self, position: &EditorPosition);

    /// Show new text for lines the engine rewrote, keyed by display line
    fn replace_lines(&mut self, lines: &BTreeMap<usize, String>);
}
