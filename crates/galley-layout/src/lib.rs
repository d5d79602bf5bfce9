//! Layout engine for a Java pretty-printer.
//!
//! An upstream translator lowers the AST into an immutable document tree
//! ([`doc::Doc`]): tokens, candidate breaks, and levels that either fit on
//! one line or break along their interior breaks. This crate decides every
//! break and emits the final text:
//!
//! - [`compute_breaks`] searches for the layout with the fewest lines
//!   under the column budget, recording flat/broken decisions in an
//!   immutable [`State`].
//! - [`Writer`] replays the accepted state over the tree and emits
//!   `(text, source-range)` chunks, routing comment tokens through an
//!   injected [`CommentReflower`].
//!
//! The search is deterministic and does no I/O; trees are immutable, so
//! concurrent invocations on distinct documents are safe. [`format`] wires
//! both passes together.

pub mod comment;
pub mod doc;
pub mod layout;
pub mod obs;
pub mod state;
pub mod writer;

pub use comment::{CommentReflower, GreedyReflower, PassthroughReflower};
pub use layout::{compute_breaks, MAX_BRANCHING_COEFFICIENT};
pub use obs::Obs;
pub use state::State;
pub use writer::{OutputSink, StringSink, Writer};

use thiserror::Error;

/// Rendering configuration for the engine.
#[derive(Debug, Clone, Copy)]
pub struct LayoutConfig {
    /// Hard column budget for the formatted output.
    pub max_width: usize,
    /// Line terminator used by [`StringSink`].
    pub newline: &'static str,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_width: 100,
            newline: "\n",
        }
    }
}

/// The engine's single failure mode: the upstream translator produced a
/// tree the search cannot lay out. Everything else is a layout decision,
/// not an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("internal error: malformed document tree: {reason}")]
    MalformedTree { reason: &'static str },
}

/// Lays out `doc` and writes it to `sink`. Returns the accepted state.
pub fn format(
    doc: &doc::Doc,
    config: &LayoutConfig,
    reflower: &dyn CommentReflower,
    sink: &mut dyn OutputSink,
) -> Result<State, LayoutError> {
    let mut obs = Obs::disabled();
    let state = layout::compute_breaks(doc, config, State::new(), &mut obs)?;
    Writer::new(config, &state, reflower, sink).write(doc);
    Ok(state)
}

/// [`format`] into a fresh [`StringSink`], returning the rendered text.
pub fn format_to_string(
    doc: &doc::Doc,
    config: &LayoutConfig,
    reflower: &dyn CommentReflower,
) -> Result<String, LayoutError> {
    let mut sink = StringSink::with_newline(config.newline);
    format(doc, config, reflower, &mut sink)?;
    Ok(sink.into_text())
}
