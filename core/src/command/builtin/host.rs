//! Commands that talk to the host: `EnforceLegal`, `Press`, `Console`

use smallvec::SmallVec;

use crate::command::{
    Command, CommandContext, CommandError, CommandPayload, CommandResult, CommandSpec,
    ExecuteTiming, Handler,
};

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("EnforceLegal", Handler::Args(enforce_legal))
            .timing(ExecuteTiming::PARSE),
        CommandSpec::new("Press", Handler::ArgsCommand(press))
            .timing(ExecuteTiming::PARSE | ExecuteTiming::RUNTIME),
        CommandSpec::new("Console", Handler::Args(console)).illegal_when_restricted(),
    ]
}

/// Restrict the rest of the build to commands legal in a verified run
fn enforce_legal(ctx: &mut CommandContext<'_>, _args: &[String]) -> CommandResult {
    if let Some(builder) = ctx.builder() {
        builder.context_mut().restricted = true;
        builder.timeline_mut().set_restricted();
    }
    Ok(())
}

/// Key names are validated and upper-cased once at parse time
fn press(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    match ctx {
        CommandContext::Parse(scope) => {
            let mut keys = SmallVec::new();
            for key in &command.args {
                if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(CommandError::abort(format!("'{key}' is not a valid key")));
                }
                keys.push(key.to_ascii_uppercase());
            }
            if keys.is_empty() {
                return Err(CommandError::abort("Press requires at least one key"));
            }
            scope.set_payload(CommandPayload::Press(keys));
            Ok(())
        }
        CommandContext::Runtime(scope) => {
            if let Some(CommandPayload::Press(keys)) = &command.payload {
                for key in keys {
                    scope.press(key);
                }
            }
            Ok(())
        }
    }
}

fn console(ctx: &mut CommandContext<'_>, args: &[String]) -> CommandResult {
    let Some(scope) = ctx.runtime() else {
        return Ok(());
    };
    scope
        .host
        .run_console(args)
        .map_err(|e| CommandError::failed(format!("Console {}: {e:#}", args.join(" "))))
}
