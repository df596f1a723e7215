//! Metadata lines: `RecordCount`, `FileTime`, `ChapterTime`, `MidwayFileTime`
//!
//! None of these contribute to the checksum, since the engine rewrites
//! their text itself.

use std::sync::Arc;

use crate::command::{
    Command, CommandContext, CommandPayload, CommandResult, CommandSpec, ExecuteTiming, Handler,
    LineRewrite,
};
use crate::consistency::{MetadataKind, format_time};

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("RecordCount", Handler::Args(record_count))
            .aliases(&["RecordCount:"])
            .timing(ExecuteTiming::PARSE)
            .without_checksum(),
        CommandSpec::new("FileTime", Handler::Args(file_time))
            .aliases(&["FileTime:"])
            .timing(ExecuteTiming::PARSE)
            .without_checksum(),
        CommandSpec::new("ChapterTime", Handler::Args(chapter_time))
            .aliases(&["ChapterTime:"])
            .timing(ExecuteTiming::PARSE)
            .without_checksum(),
        CommandSpec::new("MidwayFileTime", Handler::ArgsCommand(midway_file_time))
            .aliases(&["MidwayFileTime:"])
            .timing(ExecuteTiming::PARSE | ExecuteTiming::RUNTIME)
            .without_checksum(),
    ]
}

fn mark(ctx: &mut CommandContext<'_>, kind: MetadataKind) -> CommandResult {
    if let CommandContext::Parse(scope) = ctx {
        scope.set_payload(CommandPayload::Metadata(kind));
    }
    Ok(())
}

fn record_count(ctx: &mut CommandContext<'_>, _args: &[String]) -> CommandResult {
    mark(ctx, MetadataKind::RecordCount)
}

fn file_time(ctx: &mut CommandContext<'_>, _args: &[String]) -> CommandResult {
    mark(ctx, MetadataKind::FileTime)
}

fn chapter_time(ctx: &mut CommandContext<'_>, _args: &[String]) -> CommandResult {
    mark(ctx, MetadataKind::ChapterTime)
}

/// Record the time elapsed since playback started
fn midway_file_time(ctx: &mut CommandContext<'_>, command: &Command) -> CommandResult {
    if ctx.is_parsing() {
        return mark(ctx, MetadataKind::MidwayFileTime);
    }
    let Some(scope) = ctx.runtime() else {
        return Ok(());
    };

    let text = format!(
        "MidwayFileTime: {}",
        format_time(scope.elapsed_ticks, scope.tick_rate)
    );
    scope.rewrite_line(LineRewrite {
        file: Arc::clone(&command.file),
        line: command.file_line,
        display_line: command.display_line,
        text,
    });
    Ok(())
}
