//! Built-in commands
//!
//! | Command | Timing | Purpose |
//! |---|---|---|
//! | `Read, file[, start[, end]]` | parse | include lines of another file |
//! | `Play, label[, wait]` | parse | jump to a label in the current file |
//! | `Repeat, count` / `EndRepeat` | parse | unroll a block |
//! | `AutoInput, cycle` / `StartAutoInput` / `EndAutoInput` | parse | interleave a pattern |
//! | `SkipInput[, frames[, wait]]` | parse | skip an insertion or stretch the cycle |
//! | `StunPause` / `EndStunPause` | parse | interleave advance-then-pause |
//! | `EnforceLegal` | parse | reject commands not legal in a restricted run |
//! | `Press, key...` | parse + runtime | hold extra keys for one tick |
//! | `Console, args...` | runtime | forward to the host console |
//! | `RecordCount`, `FileTime`, `ChapterTime` | parse | metadata placeholders |
//! | `MidwayFileTime` | parse + runtime | record elapsed time when reached |

mod auto_input;
mod host;
mod metadata;
mod read;
mod repeat;

use super::CommandSpec;

/// Every built-in command spec
pub fn specs() -> Vec<CommandSpec> {
    let mut specs = Vec::new();
    specs.extend(read::specs());
    specs.extend(repeat::specs());
    specs.extend(auto_input::specs());
    specs.extend(host::specs());
    specs.extend(metadata::specs());
    specs
}

/// Parse a positive integer argument
fn positive_arg(args: &[String], index: usize) -> Option<u32> {
    args.get(index)
        .and_then(|arg| arg.trim().parse::<u32>().ok())
        .filter(|value| *value >= 1)
}
