//! `Read` and `Play`

use std::path::Path;
use std::sync::Arc;

use crate::command::{
    Command, CommandContext, CommandError, CommandResult, CommandSpec, ExecuteTiming, Handler,
};
use crate::script::InputLine;
use crate::timeline::{
    BuildError, DisplayLine, Origin, ResolveError, find_line, find_target_file,
};

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("Read", Handler::ArgsCommand(read)).timing(ExecuteTiming::PARSE),
        CommandSpec::new("Play", Handler::ArgsCommand(play)).timing(ExecuteTiming::PARSE),
    ]
}

fn resolve_error(command: &Command, error: ResolveError) -> CommandError {
    CommandError::Build(BuildError::Resolve {
        file: command.file.to_path_buf(),
        line: command.file_line,
        error,
    })
}

/// `Read, file[, start[, end]]`
///
/// Start and end are line numbers or label names; both are inclusive.
fn read(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let Some(target) = command.args.first() else {
        return Err(CommandError::abort("Read requires a file name"));
    };

    let base = command.file.parent().unwrap_or(Path::new("."));
    let path = find_target_file(base, target, &builder.config().script.extension)
        .map_err(|error| resolve_error(command, error))?;

    if *path == *command.file {
        return Err(builder
            .recursion_error("A file cannot read itself", command)
            .into());
    }

    let (_, lines) = builder.load_source(&path)?;
    let first = match command.args.get(1) {
        Some(position) => find_line(&lines, position).map_err(|e| resolve_error(command, e))?,
        None => 1,
    };
    let last = match command.args.get(2) {
        Some(position) => find_line(&lines, position).map_err(|e| resolve_error(command, e))?,
        None => usize::MAX,
    };

    builder.include(
        command,
        &path,
        first,
        last,
        DisplayLine::Fixed(command.display_line),
    )?;
    Ok(())
}

/// `Play, label[, wait]`
///
/// Optionally waits, then reads the current file from `label` to its end
/// and skips whatever follows the `Play` line.
fn play(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    let Some(builder) = ctx.builder() else {
        return Ok(());
    };
    let Some(label) = command.args.first() else {
        return Err(CommandError::abort("Play requires a label"));
    };

    let (file, lines) = builder.load_source(&command.file)?;
    let first = find_line(&lines, label).map_err(|e| resolve_error(command, e))?;

    if let Some(wait) = command.args.get(1) {
        let input = InputLine::parse(wait).map_err(|error| BuildError::Parse {
            file: command.file.to_path_buf(),
            line: command.file_line,
            error,
        })?;
        let origin = Origin {
            file: Arc::clone(&file),
            line: command.file_line,
        };
        builder.add_input(input, origin, command.display_line, wait)?;
    }

    let display = builder.display_for(&file, command.display_line);
    builder.include(command, &file, first, usize::MAX, display)?;
    builder.stop_current_file();
    Ok(())
}
