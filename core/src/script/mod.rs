//! Script text format
//!
//! Line-oriented grammar of a TAS script:
//!
//! ```text
//! // comment
//! #label
//! Read, other, start, end
//!   15,R,J
//!    5,F,90,0.5
//! ***8
//! ```

mod error;
mod input;
mod line;
mod marker;

pub use error::ParseError;
pub use input::{Actions, Feather, InputLine, MAX_DURATION};
pub use line::{LineKind, classify, is_label, split_tokens};
pub use marker::{FastForward, FastForwardMarker};
