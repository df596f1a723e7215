use std::path::PathBuf;

use thiserror::Error;

use super::resolve::ResolveError;
use crate::script::ParseError;

/// Error that aborts a timeline build
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {error}", .file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        #[source]
        error: ParseError,
    },

    #[error("{}:{line}: {message}", .file.display())]
    Aborted {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{message}\n{}", .chain.join("\n"))]
    Recursion { message: String, chain: Vec<String> },

    #[error("{}:{line}: {error}", .file.display())]
    Resolve {
        file: PathBuf,
        line: usize,
        #[source]
        error: ResolveError,
    },

    #[error("{}:{line}: {directive} is never closed", .file.display())]
    Unclosed {
        file: PathBuf,
        line: usize,
        directive: &'static str,
    },
}
