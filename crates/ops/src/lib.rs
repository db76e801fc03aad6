//! Operation batch processing: normalization, content rendering, and
//! application to the shared text register.
//!
//! Operations arrive with positions computed against the *pre-edit* buffer.
//! Applying them in descending-position order keeps every later operation's
//! offsets valid; that ordering is a correctness invariant of this crate,
//! not an optimization (see [`normalize`]).

#![warn(missing_docs)]

pub mod apply;
pub mod content;
pub mod lines;
pub mod normalize;

pub use apply::{ApplyError, BatchOutcome, PrimitiveEdit, apply_batch, to_primitive};
pub use content::{parse_markdown, render_markdown};
pub use lines::apply_batch_lines;
pub use normalize::normalize;
