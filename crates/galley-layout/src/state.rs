//! The immutable layout state threaded through the search.
//!
//! A [`State`] is a small value: scalars plus two copy-on-write decision
//! maps behind `Rc`. Straight-line search updates mutate in place (the
//! refcount is 1); cloning at an exploration branch point shares the maps
//! until one side writes. Rejected states are simply dropped.

use std::collections::HashMap;
use std::rc::Rc;

use crate::doc::{BreakId, LevelId};

/// Layout committed for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelDecision {
    /// The level renders on one line.
    Flat,
    /// The level renders along its interior break decisions.
    Broken,
}

/// Layout committed for a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    /// The break stays on the line; the writer emits the flat replacement.
    Flat,
    /// The break was taken; the writer emits a newline and this indent.
    Taken { indent: usize },
}

/// The state of one layout hypothesis.
///
/// Functionally updated: every `with_*` consumes the state and returns the
/// successor. `num_lines` is the optimization metric the search minimizes.
#[derive(Debug, Clone)]
pub struct State {
    column: usize,
    indent: usize,
    num_lines: usize,
    must_break: bool,
    branching_coefficient: u32,
    levels: Rc<HashMap<LevelId, LevelDecision>>,
    breaks: Rc<HashMap<BreakId, BreakDecision>>,
}

impl State {
    /// The initial state at the document root: column 0, indent 0, no
    /// lines emitted.
    pub fn new() -> Self {
        Self {
            column: 0,
            indent: 0,
            num_lines: 0,
            must_break: false,
            branching_coefficient: 0,
            levels: Rc::new(HashMap::new()),
            breaks: Rc::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    #[inline]
    pub fn indent(&self) -> usize {
        self.indent
    }

    #[inline]
    pub fn num_lines(&self) -> usize {
        self.num_lines
    }

    #[inline]
    pub fn must_break(&self) -> bool {
        self.must_break
    }

    #[inline]
    pub fn branching_coefficient(&self) -> u32 {
        self.branching_coefficient
    }

    pub fn level_decision(&self, id: LevelId) -> Option<LevelDecision> {
        self.levels.get(&id).copied()
    }

    pub fn break_decision(&self, id: BreakId) -> Option<BreakDecision> {
        self.breaks.get(&id).copied()
    }

    /// Advance the emission column by `width` columns on the current line.
    #[must_use]
    pub fn advance(mut self, width: usize) -> Self {
        self.column += width;
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// The indent after applying a level's or break's signed delta.
    #[must_use]
    pub fn indented_by(self, delta: i32) -> Self {
        let indent = apply_delta(self.indent, delta);
        self.with_indent(indent)
    }

    #[must_use]
    pub fn with_must_break(mut self, must_break: bool) -> Self {
        self.must_break = must_break;
        self
    }

    /// Start a fresh line at `indent`; bumps the line metric.
    #[must_use]
    pub fn after_line_break(mut self, indent: usize) -> Self {
        self.num_lines += 1;
        self.column = indent;
        self
    }

    /// Consume one unit of the nondeterministic-branching budget.
    #[must_use]
    pub fn increment_branching(mut self) -> Self {
        self.branching_coefficient += 1;
        self
    }

    #[must_use]
    pub fn record_level(mut self, id: LevelId, decision: LevelDecision) -> Self {
        Rc::make_mut(&mut self.levels).insert(id, decision);
        self
    }

    #[must_use]
    pub fn record_break(mut self, id: BreakId, decision: BreakDecision) -> Self {
        Rc::make_mut(&mut self.breaks).insert(id, decision);
        self
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// `base + delta`, clamped at zero.
pub(crate) fn apply_delta(base: usize, delta: i32) -> usize {
    if delta >= 0 {
        base.saturating_add(delta as usize)
    } else {
        base.saturating_sub(delta.unsigned_abs() as usize)
    }
}
