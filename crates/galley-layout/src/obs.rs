//! Exploration bookkeeping for the layout search.
//!
//! Every alternative the search tries is recorded as a node in a tree, so
//! a rejected branch can be inspected after the fact and the accepted one
//! replayed by the writer. Correctness does not depend on the recording: a
//! disabled observer hands back its parent handle and records nothing.

use std::fmt::Write as _;

use crate::doc::Level;
use crate::state::State;

/// Handle to a node in the exploration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObsNode(usize);

#[derive(Debug)]
struct Node {
    label: &'static str,
    level_name: Option<String>,
    start_lines: usize,
    start_column: usize,
    end: Option<(usize, usize)>,
    accepted: bool,
    children: Vec<usize>,
}

/// Records the exploration tree of one layout search.
#[derive(Debug)]
pub struct Obs {
    nodes: Vec<Node>,
}

impl Obs {
    /// An observer that records nothing.
    pub fn disabled() -> Self {
        Self { nodes: Vec::new() }
    }

    /// An observer that records every exploration under a synthetic root.
    pub fn recording() -> Self {
        Self {
            nodes: vec![Node {
                label: "root",
                level_name: None,
                start_lines: 0,
                start_column: 0,
                end: None,
                accepted: true,
                children: Vec::new(),
            }],
        }
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// The handle explorations at the document root hang off.
    pub fn root(&self) -> ObsNode {
        ObsNode(0)
    }

    /// Opens a child node under `parent` for one explored alternative.
    pub fn explore(
        &mut self,
        parent: ObsNode,
        label: &'static str,
        level: &Level,
        state: &State,
    ) -> ObsNode {
        if !self.is_recording() {
            return parent;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            label,
            level_name: level.open_op().debug_name.as_ref().map(|n| n.to_string()),
            start_lines: state.num_lines(),
            start_column: state.column(),
            end: None,
            accepted: false,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        ObsNode(id)
    }

    /// Records the state an exploration finished with. Explorations that
    /// failed (produced no layout) are left open-ended.
    pub fn finish(&mut self, node: ObsNode, state: &State) {
        if !self.is_recording() {
            return;
        }
        self.nodes[node.0].end = Some((state.num_lines(), state.column()));
    }

    /// Designates `node` as the branch the writer will follow; its
    /// siblings are dead.
    pub fn mark_accepted(&mut self, node: ObsNode) {
        if !self.is_recording() {
            return;
        }
        self.nodes[node.0].accepted = true;
        tracing::trace!(
            target: "galley::layout",
            label = self.nodes[node.0].label,
            "accepted exploration"
        );
    }

    /// Number of alternatives explored, excluding the synthetic root.
    pub fn exploration_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Number of explorations with `label` on the most-nested path, for
    /// asserting search bounds.
    pub fn max_label_depth(&self, label: &str) -> usize {
        if !self.is_recording() {
            return 0;
        }
        self.depth_below(0, label)
    }

    fn depth_below(&self, node: usize, label: &str) -> usize {
        let own = usize::from(self.nodes[node].label == label && node != 0);
        let below = self.nodes[node]
            .children
            .iter()
            .map(|&child| self.depth_below(child, label))
            .max()
            .unwrap_or(0);
        own + below
    }

    /// Renders the exploration tree as an indented listing for post-mortem
    /// inspection.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if self.is_recording() {
            self.dump_node(0, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, node: usize, depth: usize, out: &mut String) {
        let n = &self.nodes[node];
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(n.label);
        if let Some(name) = &n.level_name {
            let _ = write!(out, " [{name}]");
        }
        match n.end {
            Some((lines, column)) => {
                let _ = write!(
                    out,
                    " lines {} -> {}, col {} -> {}",
                    n.start_lines, lines, n.start_column, column
                );
            }
            None if node != 0 => out.push_str(" (no layout)"),
            None => {}
        }
        if n.accepted && node != 0 {
            out.push_str(" *");
        }
        out.push('\n');
        for &child in &n.children {
            self.dump_node(child, depth + 1, out);
        }
    }
}
