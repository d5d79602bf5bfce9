//! The comment-reflow seam between the engine and its caller.
//!
//! The engine never inspects comment bodies itself: comment tokens are
//! handed to a [`CommentReflower`] during the write pass, together with
//! the column they start at and the column budget. The full formatter
//! injects its own implementation; [`GreedyReflower`] is the one shipped
//! for standalone use and tests.

use galley_core::{visual_width, SmolStr};

/// Reformats comment text during the write pass.
///
/// Implementations must be pure: identical inputs produce identical
/// output, or the engine's determinism guarantee is lost.
pub trait CommentReflower {
    /// Rewrites `text` for emission at `start_col` under `max_width`.
    ///
    /// Continuation lines, if any, are the implementation's to indent;
    /// the returned string is emitted verbatim.
    fn reformat(&self, text: &str, start_col: usize, max_width: usize) -> String;
}

/// Leaves every comment untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReflower;

impl CommentReflower for PassthroughReflower {
    fn reformat(&self, text: &str, _start_col: usize, _max_width: usize) -> String {
        text.to_owned()
    }
}

/// Wraps long `//` comments at the column budget, breaking only on
/// whitespace.
///
/// Continuation lines repeat the `//` marker at the comment's start
/// column. Comments whose body begins with the protected prefix are left
/// intact, as are block comments.
#[derive(Debug, Clone)]
pub struct GreedyReflower {
    protected_prefix: SmolStr,
}

impl GreedyReflower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the marker that exempts a comment from wrapping.
    pub fn with_protected_prefix(prefix: impl Into<SmolStr>) -> Self {
        Self {
            protected_prefix: prefix.into(),
        }
    }
}

impl Default for GreedyReflower {
    fn default() -> Self {
        Self {
            protected_prefix: SmolStr::new_static("MOE:"),
        }
    }
}

impl CommentReflower for GreedyReflower {
    fn reformat(&self, text: &str, start_col: usize, max_width: usize) -> String {
        let trimmed = text.trim_end_matches(['\r', '\n']);
        let Some(body) = trimmed.strip_prefix("//") else {
            // Block comments pass through untouched.
            return trimmed.to_owned();
        };
        if body.trim_start().starts_with(self.protected_prefix.as_str()) {
            return trimmed.to_owned();
        }
        if start_col + visual_width(trimmed) <= max_width {
            return trimmed.to_owned();
        }

        let continuation = format!("\n{}", " ".repeat(start_col));
        let mut out = String::from("//");
        let mut line_width = 2usize;
        for word in body.split_whitespace() {
            let width = visual_width(word);
            if line_width > 2 && start_col + line_width + 1 + width > max_width {
                out.push_str(&continuation);
                out.push_str("//");
                line_width = 2;
            }
            out.push(' ');
            out.push_str(word);
            line_width += 1 + width;
        }
        out
    }
}
