#![deny(missing_docs)]
//! Richmark core: markdown parsing, the generic mdast tree, its serializer and
//! the shortcode extension.

/// Code fence detection utilities.
pub mod code_fence;
/// Core error types and the nesting guard.
pub mod error;
/// Generic mdast tree and lowering from markdown-rs.
pub mod mdast;
/// Markdown parsing over markdown-rs.
pub mod parse;
/// Generic mdast to markdown serializer.
pub mod serialize;
/// Shortcode preprocessing, folding and rewriting.
pub mod shortcode;

pub use error::{DEFAULT_MAX_DEPTH, DepthGuard, RichmarkError, SourceLocation};
pub use mdast::{Node, from_markdown};
pub use parse::{ParseOptions, parse_mdast};
pub use serialize::{SerializeOptions, Unsafe, UnsafePosition, to_markdown};
pub use shortcode::{Placement, Preprocessed, ShortcodePattern, literal_guards, preprocess, rewrite};

pub use code_fence::{FencePhase, FenceState, LineOutcome, advance_fence_state};
