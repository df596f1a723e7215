//! `Repeat` / `EndRepeat`

use super::positive_arg;
use crate::command::{
    Command, CommandContext, CommandError, CommandResult, CommandSpec, ExecuteTiming, Handler,
};
use crate::timeline::LoopFrame;

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("Repeat", Handler::ArgsCommand(repeat)).timing(ExecuteTiming::PARSE),
        CommandSpec::new("EndRepeat", Handler::ArgsCommand(end_repeat))
            .timing(ExecuteTiming::PARSE),
    ]
}

fn repeat(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let Some(count) = positive_arg(&command.args, 0) else {
        return Err(CommandError::abort(
            "Repeat requires a repeat count of at least 1",
        ));
    };

    if builder.context().loop_in(&command.file).is_some() {
        return Err(builder
            .recursion_error("Nested Repeat in the same file is not supported", command)
            .into());
    }

    let frame = LoopFrame {
        start_input: builder.timeline().inputs().len(),
        count,
        file_line: command.file_line,
    };
    builder.open_loop(&command.file, frame);
    Ok(())
}

/// Tag the pass that just ran as repetition 1, then re-read the body
/// `count - 1` more times
fn end_repeat(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let Some(open) = builder.close_loop(&command.file) else {
        return Err(CommandError::abort("EndRepeat without a matching Repeat"));
    };

    builder.tag_repeat(&command.file, open.start_input, 1, open.count);

    let (file, lines) = builder.load_source(&command.file)?;
    let display = builder.display_for(&file, command.display_line);
    for index in 2..=open.count {
        let from = builder.timeline().inputs().len();
        builder.read_lines(
            &file,
            &lines,
            open.file_line + 1,
            command.file_line.saturating_sub(1),
            display,
        )?;
        builder.tag_repeat(&file, from, index, open.count);
    }

    Ok(())
}
