//! The layout search.
//!
//! `compute_breaks` walks the document tree and decides, for every level,
//! whether it lays out flat or breaks, minimizing the number of emitted
//! lines under the column budget. The search is pure: it threads an
//! immutable [`State`] through the tree and records decisions in it; the
//! writer replays them in a second pass.

use galley_core::Width;

use crate::doc::{
    level_width_until_break, starts_with_break, Break, BreakBehaviour, Doc, FillMode,
    LastLevelBreakability, Level, PartialInlineability, StartsWith,
};
use crate::obs::{Obs, ObsNode};
use crate::state::{apply_delta, BreakDecision, LevelDecision, State};
use crate::{LayoutConfig, LayoutError};

/// Cap on the nondeterministic alternatives explored on a search path.
/// Beyond it only the primary break-normally branch is taken, which keeps
/// pathological chains from blowing up while leaving realistic input
/// untouched.
pub const MAX_BRANCHING_COEFFICIENT: u32 = 20;

const BREAK_NORMALLY: &str = "break normally";
const BREAK_LAST_INNER_LEVEL: &str = "break last inner level";
const INLINE_PREFIX: &str = "inline prefix";

/// Runs the layout search over `doc` starting from `state`.
///
/// On success the returned state carries a flat/broken decision for every
/// level and break the writer will visit.
pub fn compute_breaks(
    doc: &Doc,
    config: &LayoutConfig,
    state: State,
    obs: &mut Obs,
) -> Result<State, LayoutError> {
    let mut search = Search {
        max_width: config.max_width,
        obs,
    };
    let root = search.obs.root();
    let result = search.compute_breaks(doc, root, state)?;
    if search.obs.is_recording() {
        tracing::trace!(
            target: "galley::layout",
            explorations = %search.obs.dump(),
            "layout search finished"
        );
    }
    Ok(result)
}

struct Search<'o> {
    max_width: usize,
    obs: &'o mut Obs,
}

impl Search<'_> {
    fn compute_breaks(
        &mut self,
        doc: &Doc,
        parent: ObsNode,
        state: State,
    ) -> Result<State, LayoutError> {
        match doc {
            Doc::Token(tok) => Ok(state.advance(tok.width())),
            Doc::Space => Ok(state.advance(1)),
            Doc::Tombstone => Ok(state),
            Doc::Break(br) => {
                let broken = br.is_forced() || state.must_break();
                Ok(self.apply_break(br, state, broken))
            }
            Doc::Level(level) => self.compute_level(level, parent, state),
        }
    }

    fn compute_level(
        &mut self,
        level: &Level,
        parent: ObsNode,
        state: State,
    ) -> Result<State, LayoutError> {
        if let Some(flat) = self.try_fit_flat(level, &state) {
            return Ok(flat);
        }

        match level.open_op().break_behaviour {
            BreakBehaviour::BreakThisLevel => self.break_normally(level, parent, state),
            BreakBehaviour::PreferBreakingLastInnerLevel {
                keep_indent_when_inlined,
            } => {
                let state = state.increment_branching();
                let node_a = self.obs.explore(parent, BREAK_NORMALLY, level, &state);
                let broken = self.break_normally(level, node_a, state.clone())?;
                self.obs.finish(node_a, &broken);

                if state.branching_coefficient() < MAX_BRANCHING_COEFFICIENT {
                    let node_b = self
                        .obs
                        .explore(parent, BREAK_LAST_INNER_LEVEL, level, &state);
                    if let Some(inlined) = self.try_break_last_level(
                        level,
                        node_b,
                        state,
                        true,
                        keep_indent_when_inlined,
                    )? {
                        self.obs.finish(node_b, &inlined);
                        if inlined.num_lines() < broken.num_lines() {
                            self.obs.mark_accepted(node_b);
                            return Ok(inlined);
                        }
                    }
                }
                self.obs.mark_accepted(node_a);
                Ok(broken)
            }
            BreakBehaviour::BreakOnlyIfInnerLevelsThenFitOnOneLine {
                keep_indent_when_inlined,
            } => {
                let node_a = self.obs.explore(parent, BREAK_NORMALLY, level, &state);
                let broken = self.break_normally(level, node_a, state.clone())?;
                self.obs.finish(node_a, &broken);

                if any_inner_level_broken(level, &broken) {
                    let node_b = self.obs.explore(parent, INLINE_PREFIX, level, &state);
                    if let Some(inlined) =
                        self.try_inline_prefix(level, node_b, state, keep_indent_when_inlined)?
                    {
                        self.obs.finish(node_b, &inlined);
                        self.obs.mark_accepted(node_b);
                        return Ok(inlined);
                    }
                }
                self.obs.mark_accepted(node_a);
                Ok(broken)
            }
        }
    }

    /// Lays the level out on the current line, or returns `None` when it
    /// cannot fit. Not fitting is a decision, never an error.
    fn try_fit_flat(&self, level: &Level, state: &State) -> Option<State> {
        let width = level.width().columns()?;
        if state.must_break() && level.has_break() {
            // Flat layout would swallow the break the flag is waiting for.
            return None;
        }
        if state.column() + width > self.max_width {
            return None;
        }
        if let Some(limit) = level.open_op().column_limit_before_last_break {
            if let Some(before) = level.width_before_last_limited_break() {
                let before = before.columns()?;
                if state.column() + before > limit {
                    return None;
                }
            }
        }
        Some(
            state
                .clone()
                .record_level(level.id(), LevelDecision::Flat)
                .advance(width),
        )
    }

    fn break_normally(
        &mut self,
        level: &Level,
        node: ObsNode,
        state: State,
    ) -> Result<State, LayoutError> {
        let outer_indent = state.indent();
        let inner = state
            .record_level(level.id(), LevelDecision::Broken)
            .indented_by(level.open_op().plus_indent);
        let done = self.compute_broken(level, node, inner)?;
        Ok(done.with_indent(outer_indent))
    }

    fn compute_broken(
        &mut self,
        level: &Level,
        node: ObsNode,
        state: State,
    ) -> Result<State, LayoutError> {
        let sb = level.splits_breaks();
        let mut state = self.compute_split(level, node, sb.splits[0].clone(), state)?;
        for (idx, &break_idx) in sb.breaks.iter().enumerate() {
            let Doc::Break(br) = &level.children()[break_idx] else {
                unreachable!("splits_breaks indexes only breaks");
            };
            let split = sb.splits[idx + 1].clone();
            let should_break = br.fill() == FillMode::Unified
                || state.must_break()
                || br.is_forced()
                || !self.split_fits(level, split.clone(), br, &state);
            state = self.apply_break(br, state, should_break);
            state = self.compute_split(level, node, split, state)?;
        }
        Ok(state)
    }

    /// Whether `split` would fit on the current line after a flat break.
    fn split_fits(
        &self,
        level: &Level,
        split: std::ops::Range<usize>,
        br: &Break,
        state: &State,
    ) -> bool {
        let Some(break_width) = br.width().columns() else {
            return false;
        };
        let split_width: Width = level.children()[split].iter().map(Doc::width).sum();
        split_width.fits_in(
            self.max_width
                .saturating_sub(state.column() + break_width),
        )
    }

    fn compute_split(
        &mut self,
        level: &Level,
        node: ObsNode,
        split: std::ops::Range<usize>,
        mut state: State,
    ) -> Result<State, LayoutError> {
        for child in &level.children()[split] {
            state = self.compute_breaks(child, node, state)?;
        }
        if state.column() > self.max_width {
            // The split overflowed; force the break that follows it.
            state = state.with_must_break(true);
        }
        Ok(state)
    }

    fn apply_break(&self, br: &Break, state: State, broken: bool) -> State {
        if broken {
            let indent = apply_delta(state.indent(), br.plus_indent());
            state
                .record_break(br.id(), BreakDecision::Taken { indent })
                .with_must_break(false)
                .after_line_break(indent)
        } else {
            let width = br.width().columns().unwrap_or(0);
            state
                .record_break(br.id(), BreakDecision::Flat)
                .advance(width)
        }
    }

    /// Lays the level's prefix flat on the current line and breaks only
    /// inside its last child. `None` when the chain does not apply.
    fn try_break_last_level(
        &mut self,
        level: &Level,
        node: ObsNode,
        state: State,
        is_simple_inlining: bool,
        keep_indent_when_inlined: bool,
    ) -> Result<Option<State>, LayoutError> {
        if state.must_break() {
            return Ok(None);
        }
        let Some((Doc::Level(last), prefix)) = level.children().split_last() else {
            return Ok(None);
        };
        if last.open_op().breakability_if_last_level == LastLevelBreakability::Abort {
            return Ok(None);
        }
        let prefix_width: Width = prefix.iter().map(Doc::width).sum();
        if !prefix_width.fits_in(self.max_width.saturating_sub(state.column())) {
            return Ok(None);
        }

        let is_simple_inlining = is_simple_inlining && level.open_op().is_simple;
        let start_lines = state.num_lines();
        let mut st = state.record_level(level.id(), LevelDecision::Broken);
        for child in prefix {
            st = match child {
                Doc::Break(br) => {
                    if br.is_forced() || st.must_break() {
                        return Ok(None);
                    }
                    self.apply_break(br, st, false)
                }
                other => self.compute_breaks(other, node, st)?,
            };
        }
        if st.num_lines() != start_lines {
            // A nested column limit forced a break inside the prefix.
            return Ok(None);
        }

        let outer_indent = st.indent();
        let st = if keep_indent_when_inlined {
            st.indented_by(level.open_op().plus_indent)
        } else {
            st
        };
        let result = self.break_last_child(last, node, st, is_simple_inlining)?;
        Ok(result.map(|s| s.with_indent(outer_indent)))
    }

    fn break_last_child(
        &mut self,
        last: &Level,
        node: ObsNode,
        state: State,
        is_simple_inlining: bool,
    ) -> Result<Option<State>, LayoutError> {
        match last.open_op().breakability_if_last_level {
            LastLevelBreakability::Abort => Ok(None),
            LastLevelBreakability::AcceptInlineChain => {
                self.accept_inline_chain(last, node, state)
            }
            LastLevelBreakability::AcceptInlineChainIfSimpleOtherwiseCheckInner => {
                if is_simple_inlining {
                    self.accept_inline_chain(last, node, state)
                } else {
                    self.check_inner(last, node, state, is_simple_inlining)
                }
            }
            LastLevelBreakability::CheckInner => {
                self.check_inner(last, node, state, is_simple_inlining)
            }
        }
    }

    fn accept_inline_chain(
        &mut self,
        last: &Level,
        node: ObsNode,
        state: State,
    ) -> Result<Option<State>, LayoutError> {
        // There has to be column room for the last level's pre-break
        // prefix; a level with no break at all cannot anchor the chain.
        let room = self.max_width.saturating_sub(state.column());
        if !level_width_until_break(last, room).is_finite() {
            return Ok(None);
        }
        self.compute_level(last, node, state).map(Some)
    }

    fn check_inner(
        &mut self,
        last: &Level,
        node: ObsNode,
        state: State,
        is_simple_inlining: bool,
    ) -> Result<Option<State>, LayoutError> {
        match last.open_op().break_behaviour {
            BreakBehaviour::PreferBreakingLastInnerLevel {
                keep_indent_when_inlined,
            } => self.try_break_last_level(
                last,
                node,
                state,
                is_simple_inlining,
                keep_indent_when_inlined,
            ),
            _ => Err(LayoutError::MalformedTree {
                reason: "check-inner requires a last level that prefers breaking its last inner level",
            }),
        }
    }

    /// Lays the level out flat except for breaks inside its inner levels.
    /// `None` when no inner level can host the prefix.
    fn try_inline_prefix(
        &mut self,
        level: &Level,
        node: ObsNode,
        state: State,
        keep_indent_when_inlined: bool,
    ) -> Result<Option<State>, LayoutError> {
        if state.must_break() {
            return Ok(None);
        }
        let children = level.children();
        let Some(target) = children.iter().rposition(|child| {
            matches!(child, Doc::Level(_)) && starts_with_break(child) != StartsWith::Empty
        }) else {
            return Ok(None);
        };
        let Doc::Level(target_level) = &children[target] else {
            unreachable!("rposition matched a level");
        };
        if target_level.open_op().partial_inlineability == PartialInlineability::NotAllowed {
            return Ok(None);
        }

        let leading: Width = children[..target].iter().map(Doc::width).sum();
        let prefix = leading + level_width_until_break(target_level, self.max_width);
        if !prefix.fits_in(self.max_width.saturating_sub(state.indent())) {
            return Ok(None);
        }

        let outer_indent = state.indent();
        let mut st = state
            .record_level(level.id(), LevelDecision::Broken)
            .indented_by(if keep_indent_when_inlined {
                level.open_op().plus_indent
            } else {
                0
            });
        for child in children {
            st = match child {
                Doc::Break(br) => {
                    if br.is_forced() || st.must_break() {
                        return Ok(None);
                    }
                    self.apply_break(br, st, false)
                }
                other => self.compute_breaks(other, node, st)?,
            };
        }
        Ok(Some(st.with_indent(outer_indent)))
    }
}

/// Whether any level strictly inside `level` was laid out broken in
/// `state`.
fn any_inner_level_broken(level: &Level, state: &State) -> bool {
    fn walk(docs: &[Doc], state: &State) -> bool {
        docs.iter().any(|doc| match doc {
            Doc::Level(inner) => {
                state.level_decision(inner.id()) == Some(LevelDecision::Broken)
                    || walk(inner.children(), state)
            }
            _ => false,
        })
    }
    walk(level.children(), state)
}
