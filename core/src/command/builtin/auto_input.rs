//! `AutoInput` / `StartAutoInput` / `EndAutoInput`, `SkipInput` and `StunPause`
//!
//! ```text
//! AutoInput, 5
//!    1,S           <- pattern, runs once here
//! StartAutoInput
//!   12,R           <- primary, pattern goes in before each 5-frame slice
//! EndAutoInput
//! ```

use std::path::Path;

use super::positive_arg;
use crate::command::{
    Command, CommandContext, CommandError, CommandResult, CommandSpec, ExecuteTiming, Handler,
};
use crate::timeline::AutoInputState;

/// Cycle length of the synthesized stun-pause pattern
const STUN_PAUSE_CYCLE: u32 = 2;

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("AutoInput", Handler::ArgsCommand(auto_input))
            .timing(ExecuteTiming::PARSE),
        CommandSpec::new("StartAutoInput", Handler::ArgsCommand(start_auto_input))
            .timing(ExecuteTiming::PARSE),
        CommandSpec::new("EndAutoInput", Handler::ArgsFileLine(end_auto_input))
            .timing(ExecuteTiming::PARSE),
        CommandSpec::new("SkipInput", Handler::ArgsFileLine(skip_input))
            .aliases(&["SkipAutoInput"])
            .timing(ExecuteTiming::PARSE),
        CommandSpec::new("StunPause", Handler::ArgsCommand(stun_pause))
            .timing(ExecuteTiming::PARSE),
        CommandSpec::new("EndStunPause", Handler::ArgsFileLine(end_stun_pause))
            .timing(ExecuteTiming::PARSE),
    ]
}

fn ensure_not_nested(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    if builder.context().auto_input_in(&command.file).is_some() {
        return Err(builder
            .recursion_error(
                "Only one AutoInput or StunPause block per file is supported",
                command,
            )
            .into());
    }
    Ok(())
}

/// `AutoInput, cycle`
fn auto_input(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    ensure_not_nested(ctx, command)?;
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let Some(cycle_length) = positive_arg(&command.args, 0) else {
        return Err(CommandError::abort(
            "AutoInput requires a cycle length of at least 1",
        ));
    };

    builder.context_mut().auto_inputs.insert(
        command.file.clone(),
        AutoInputState {
            cycle_length,
            cycle_offset: cycle_length,
            pattern_start: command.file_line + 1,
            pattern: None,
            inserting: false,
            skip_next: false,
            skip_frames: 0,
            skip_wait: 0,
            synthesized: false,
        },
    );
    Ok(())
}

/// Capture the lines between `AutoInput` and here as the pattern
fn start_auto_input(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let (_, lines) = builder.load_source(&command.file)?;

    let Some(state) = builder.context_mut().auto_inputs.get_mut(&*command.file) else {
        return Err(CommandError::abort("StartAutoInput without AutoInput"));
    };
    if state.synthesized {
        return Err(CommandError::abort("StartAutoInput inside a StunPause block"));
    }
    if state.pattern.is_some() {
        return Err(CommandError::abort("StartAutoInput appears twice"));
    }

    let pattern = (state.pattern_start..command.file_line)
        .filter_map(|line| lines.get(line - 1).map(|text| (line, text.clone())))
        .collect();
    state.pattern = Some(pattern);
    Ok(())
}

fn end_auto_input(
    ctx: &mut CommandContext<'_>,
    _args: &[String],
    file: &Path,
    _line: usize,
) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let open = builder
        .context()
        .auto_input_in(file)
        .map(|state| (state.synthesized, state.pattern.is_some()));
    match open {
        Some((false, true)) => {
            builder.context_mut().auto_inputs.remove(file);
            Ok(())
        }
        Some((false, false)) => Err(CommandError::abort("EndAutoInput before StartAutoInput")),
        _ => Err(CommandError::abort("EndAutoInput without AutoInput")),
    }
}

/// `SkipInput` skips the next pattern insertion in this file.
/// `SkipInput, frames[, wait]` instead lengthens the running cycle by
/// `frames`, after `wait` more primary frames.
fn skip_input(
    ctx: &mut CommandContext<'_>,
    args: &[String],
    file: &Path,
    line: usize,
) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    if builder.context().auto_input_in(file).is_none() {
        return Err(CommandError::failed(format!(
            "SkipInput on line {line} is outside an AutoInput block"
        )));
    }

    let mut args = args.iter().map(|arg| arg.trim()).filter(|arg| !arg.is_empty());
    let skip = match args.next() {
        None => None,
        Some(frames) => {
            let frames = frames
                .parse::<u32>()
                .ok()
                .filter(|frames| *frames >= 1)
                .ok_or_else(|| {
                    CommandError::abort(format!(
                        "SkipInput frames must be an integer of at least 1, got '{frames}'"
                    ))
                })?;
            let wait = match args.next() {
                None => 0,
                Some(wait) => wait.parse::<u32>().map_err(|_| {
                    CommandError::abort(format!(
                        "SkipInput wait must be a non-negative integer, got '{wait}'"
                    ))
                })?,
            };
            Some((frames, wait))
        }
    };

    if let Some(state) = builder.context_mut().auto_inputs.get_mut(file) {
        match skip {
            None => {
                state.skip_next = true;
                state.skip_frames = 0;
                state.skip_wait = 0;
            }
            Some((frames, wait)) => {
                state.skip_next = false;
                state.skip_frames = frames;
                state.skip_wait = wait;
            }
        }
    }
    Ok(())
}

/// `StunPause`: interleave one advance frame and one paused frame
fn stun_pause(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    ensure_not_nested(ctx, command)?;
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };

    let line = command.file_line;
    builder.context_mut().auto_inputs.insert(
        command.file.clone(),
        AutoInputState {
            cycle_length: STUN_PAUSE_CYCLE,
            cycle_offset: STUN_PAUSE_CYCLE,
            pattern_start: line + 1,
            pattern: Some(vec![(line, "1".to_string()), (line, "1,S".to_string())]),
            inserting: false,
            skip_next: false,
            skip_frames: 0,
            skip_wait: 0,
            synthesized: true,
        },
    );
    Ok(())
}

fn end_stun_pause(
    ctx: &mut CommandContext<'_>,
    _args: &[String],
    file: &Path,
    _line: usize,
) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let synthesized = builder
        .context()
        .auto_input_in(file)
        .is_some_and(|state| state.synthesized);
    if !synthesized {
        return Err(CommandError::abort("EndStunPause without StunPause"));
    }
    builder.context_mut().auto_inputs.remove(file);
    Ok(())
}
