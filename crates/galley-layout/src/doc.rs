//! The immutable document tree the layout search runs over.
//!
//! An upstream translator lowers an AST into this tree: [`Token`]s carry
//! source text, [`Break`]s mark candidate line breaks, and [`Level`]s group
//! children that either lay out flat on one line or break along their
//! interior breaks. A [`Level`]'s [`OpenOp`] configures how the search may
//! break it.
//!
//! Nodes cache their flat width and source range at construction; the
//! split/break partitioning of a level is memoized on first use. All search
//! state lives outside the tree, keyed by the stable ids handed out here.

use std::cell::OnceCell;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use galley_core::{visual_width, SmolStr, TextRange, Width};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

fn next_node_id() -> u32 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Stable identity of a [`Level`], used to key layout decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelId(u32);

/// Stable identity of a [`Break`], used to key layout decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BreakId(u32);

/// How the writer treats a token's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Ordinary source text, emitted verbatim.
    Plain,
    /// A `//` comment, routed through the comment reflower on write.
    LineComment,
    /// A `/* ... */` comment, routed through the comment reflower on write.
    BlockComment,
}

/// A literal piece of source text.
#[derive(Debug, Clone)]
pub struct Token {
    text: SmolStr,
    kind: TokenKind,
    range: Option<TextRange>,
    width: usize,
}

impl Token {
    pub fn new(text: impl Into<SmolStr>, kind: TokenKind, range: Option<TextRange>) -> Self {
        let text = text.into();
        let width = visual_width(&text);
        Self {
            text,
            kind,
            range,
            width,
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    #[inline]
    pub fn range(&self) -> Option<TextRange> {
        self.range
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// How sibling breaks inside a broken level coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Breaks together with every other unified break of the level.
    Unified,
    /// Breaks on its own, only when the following split does not fit
    /// (fill layout).
    Independent,
    /// Always breaks. Poisons the flat width of every enclosing level.
    Forced,
}

/// A candidate line break between sibling docs.
#[derive(Debug)]
pub struct Break {
    id: BreakId,
    fill: FillMode,
    flat: SmolStr,
    plus_indent: i32,
    has_column_limit: bool,
}

impl Break {
    pub fn new(fill: FillMode, flat: impl Into<SmolStr>, plus_indent: i32) -> Self {
        Self {
            id: BreakId(next_node_id()),
            fill,
            flat: flat.into(),
            plus_indent,
            has_column_limit: false,
        }
    }

    /// Marks this break as the one a level's
    /// [`column_limit_before_last_break`](OpenOp::column_limit_before_last_break)
    /// applies to.
    pub fn with_column_limit(mut self) -> Self {
        self.has_column_limit = true;
        self
    }

    #[inline]
    pub fn id(&self) -> BreakId {
        self.id
    }

    #[inline]
    pub fn fill(&self) -> FillMode {
        self.fill
    }

    /// The replacement emitted when the break stays on the line.
    #[inline]
    pub fn flat(&self) -> &str {
        &self.flat
    }

    #[inline]
    pub fn plus_indent(&self) -> i32 {
        self.plus_indent
    }

    #[inline]
    pub fn has_column_limit(&self) -> bool {
        self.has_column_limit
    }

    #[inline]
    pub fn is_forced(&self) -> bool {
        matches!(self.fill, FillMode::Forced)
    }

    #[inline]
    pub fn width(&self) -> Width {
        if self.is_forced() {
            Width::INF
        } else {
            Width::of(visual_width(&self.flat))
        }
    }
}

/// How the search lays out a level that does not fit flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakBehaviour {
    /// Break unconditionally.
    BreakThisLevel,
    /// Try breaking only the last inner level; accept that layout when it
    /// produces fewer lines than a normal break.
    PreferBreakingLastInnerLevel { keep_indent_when_inlined: bool },
    /// If some inner level is broken anyway, attempt to inline this
    /// level's prefix up to the last non-empty inner level.
    BreakOnlyIfInnerLevelsThenFitOnOneLine { keep_indent_when_inlined: bool },
}

/// Consulted when a level is the last child of its parent during an inline
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastLevelBreakability {
    /// The inline attempt fails.
    Abort,
    /// Recurse into this level's own last-level inlining. Only valid on
    /// levels that prefer breaking their last inner level.
    CheckInner,
    /// Inline this level, breaking along its interior breaks.
    AcceptInlineChain,
    /// [`AcceptInlineChain`](Self::AcceptInlineChain) while the inlining
    /// chain is simple, [`CheckInner`](Self::CheckInner) otherwise.
    AcceptInlineChainIfSimpleOtherwiseCheckInner,
}

/// Whether a level's prefix may share a line with preceding siblings while
/// the rest of the level breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialInlineability {
    Allowed,
    NotAllowed,
}

/// Immutable configuration attached to a [`Level`] at construction.
#[derive(Debug, Clone)]
pub struct OpenOp {
    /// Additional indent applied while the level is broken.
    pub plus_indent: i32,
    pub break_behaviour: BreakBehaviour,
    pub breakability_if_last_level: LastLevelBreakability,
    pub partial_inlineability: PartialInlineability,
    /// Tighter column cap for the position before the level's last
    /// column-limited break.
    pub column_limit_before_last_break: Option<usize>,
    /// A level is simple when its structure permits chained inlining.
    pub is_simple: bool,
    pub debug_name: Option<SmolStr>,
}

impl Default for OpenOp {
    fn default() -> Self {
        Self {
            plus_indent: 0,
            break_behaviour: BreakBehaviour::BreakThisLevel,
            breakability_if_last_level: LastLevelBreakability::Abort,
            partial_inlineability: PartialInlineability::Allowed,
            column_limit_before_last_break: None,
            is_simple: true,
            debug_name: None,
        }
    }
}

impl OpenOp {
    pub fn new(plus_indent: i32) -> Self {
        Self {
            plus_indent,
            ..Self::default()
        }
    }

    pub fn with_break_behaviour(mut self, behaviour: BreakBehaviour) -> Self {
        self.break_behaviour = behaviour;
        self
    }

    pub fn with_breakability(mut self, breakability: LastLevelBreakability) -> Self {
        self.breakability_if_last_level = breakability;
        self
    }

    pub fn with_partial_inlineability(mut self, inlineability: PartialInlineability) -> Self {
        self.partial_inlineability = inlineability;
        self
    }

    pub fn with_column_limit_before_last_break(mut self, limit: usize) -> Self {
        self.column_limit_before_last_break = Some(limit);
        self
    }

    pub fn simple(mut self, is_simple: bool) -> Self {
        self.is_simple = is_simple;
        self
    }

    pub fn named(mut self, name: impl Into<SmolStr>) -> Self {
        self.debug_name = Some(name.into());
        self
    }
}

/// Partitioning of a level's children into maximal break-free runs and the
/// breaks separating them. `k` breaks yield `k + 1` splits, some possibly
/// empty.
#[derive(Debug, Clone)]
pub(crate) struct SplitsBreaks {
    /// Child-index range of each split.
    pub(crate) splits: Vec<Range<usize>>,
    /// Child index of each separating break.
    pub(crate) breaks: Vec<usize>,
}

/// A grouping doc that either lays out flat on one line or breaks along
/// its interior [`Break`]s.
#[derive(Debug)]
pub struct Level {
    id: LevelId,
    open_op: OpenOp,
    children: Vec<Doc>,
    width: Width,
    range: Option<TextRange>,
    has_break: bool,
    splits: OnceCell<SplitsBreaks>,
    flat_text: OnceCell<String>,
}

impl Level {
    pub fn new(open_op: OpenOp, children: Vec<Doc>) -> Self {
        let width = children.iter().map(Doc::width).sum();
        let range = union_range(&children);
        let has_break = children
            .iter()
            .any(|child| matches!(child, Doc::Break(_)) || child.has_break());
        Self {
            id: LevelId(next_node_id()),
            open_op,
            children,
            width,
            range,
            has_break,
            splits: OnceCell::new(),
            flat_text: OnceCell::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> LevelId {
        self.id
    }

    #[inline]
    pub fn open_op(&self) -> &OpenOp {
        &self.open_op
    }

    #[inline]
    pub fn children(&self) -> &[Doc] {
        &self.children
    }

    #[inline]
    pub fn width(&self) -> Width {
        self.width
    }

    #[inline]
    pub fn range(&self) -> Option<TextRange> {
        self.range
    }

    /// Whether the level contains a break anywhere in its subtree.
    #[inline]
    pub fn has_break(&self) -> bool {
        self.has_break
    }

    pub(crate) fn splits_breaks(&self) -> &SplitsBreaks {
        self.splits.get_or_init(|| {
            let mut splits = Vec::new();
            let mut breaks = Vec::new();
            let mut start = 0usize;
            for (idx, child) in self.children.iter().enumerate() {
                if matches!(child, Doc::Break(_)) {
                    splits.push(start..idx);
                    breaks.push(idx);
                    start = idx + 1;
                }
            }
            splits.push(start..self.children.len());
            SplitsBreaks { splits, breaks }
        })
    }

    /// The rendering of this level with every break flat. Only meaningful
    /// when [`width`](Self::width) is finite.
    pub(crate) fn flat_text(&self) -> &str {
        self.flat_text.get_or_init(|| {
            let mut out = String::new();
            push_flat(&mut out, &self.children);
            out
        })
    }

    /// Flat width from the level's start up to (excluding) its last break
    /// carrying the column-limit flag, or `None` when no break carries it.
    pub(crate) fn width_before_last_limited_break(&self) -> Option<Width> {
        let last = self
            .children
            .iter()
            .rposition(|child| matches!(child, Doc::Break(b) if b.has_column_limit()))?;
        Some(self.children[..last].iter().map(Doc::width).sum())
    }
}

fn push_flat(out: &mut String, docs: &[Doc]) {
    for doc in docs {
        match doc {
            Doc::Token(tok) => out.push_str(tok.text()),
            Doc::Space => out.push(' '),
            Doc::Tombstone => {}
            Doc::Break(br) => out.push_str(br.flat()),
            Doc::Level(level) => push_flat(out, level.children()),
        }
    }
}

fn union_range(docs: &[Doc]) -> Option<TextRange> {
    let mut result: Option<TextRange> = None;
    for doc in docs {
        let Some(range) = doc.range() else { continue };
        result = Some(match result {
            Some(acc) => acc.cover(range),
            None => range,
        });
    }
    result
}

/// A node in the document tree.
#[derive(Debug)]
pub enum Doc {
    Token(Token),
    Space,
    Break(Break),
    Level(Level),
    /// A node removed by an upstream pass; renders nothing.
    Tombstone,
}

impl Doc {
    pub fn token(text: impl Into<SmolStr>, range: Option<TextRange>) -> Self {
        Doc::Token(Token::new(text, TokenKind::Plain, range))
    }

    pub fn line_comment(text: impl Into<SmolStr>, range: Option<TextRange>) -> Self {
        Doc::Token(Token::new(text, TokenKind::LineComment, range))
    }

    pub fn block_comment(text: impl Into<SmolStr>, range: Option<TextRange>) -> Self {
        Doc::Token(Token::new(text, TokenKind::BlockComment, range))
    }

    pub fn space() -> Self {
        Doc::Space
    }

    pub fn tombstone() -> Self {
        Doc::Tombstone
    }

    pub fn br(fill: FillMode, flat: impl Into<SmolStr>, plus_indent: i32) -> Self {
        Doc::Break(Break::new(fill, flat, plus_indent))
    }

    /// An unconditional line break.
    pub fn forced_newline() -> Self {
        Self::br(FillMode::Forced, "", 0)
    }

    pub fn level(open_op: OpenOp, children: Vec<Doc>) -> Self {
        Doc::Level(Level::new(open_op, children))
    }

    /// The cached flat width of this node.
    pub fn width(&self) -> Width {
        match self {
            Doc::Token(tok) => Width::of(tok.width()),
            Doc::Space => Width::of(1),
            Doc::Break(br) => br.width(),
            Doc::Level(level) => level.width(),
            Doc::Tombstone => Width::ZERO,
        }
    }

    /// The cached source range of this node.
    pub fn range(&self) -> Option<TextRange> {
        match self {
            Doc::Token(tok) => tok.range(),
            Doc::Level(level) => level.range(),
            Doc::Space | Doc::Break(_) | Doc::Tombstone => None,
        }
    }

    fn has_break(&self) -> bool {
        match self {
            Doc::Break(_) => true,
            Doc::Level(level) => level.has_break(),
            Doc::Token(_) | Doc::Space | Doc::Tombstone => false,
        }
    }
}

/// Result of the starts-with-break analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartsWith {
    /// The doc renders no text at all.
    Empty,
    /// The first rendered element is a break.
    Yes,
    /// The first rendered element is text.
    No,
}

/// Whether `doc` begins with a break, begins with text, or renders
/// nothing.
pub fn starts_with_break(doc: &Doc) -> StartsWith {
    match doc {
        Doc::Break(_) => StartsWith::Yes,
        Doc::Token(_) | Doc::Space => StartsWith::No,
        Doc::Tombstone => StartsWith::Empty,
        Doc::Level(level) => {
            for child in level.children() {
                match starts_with_break(child) {
                    StartsWith::Empty => continue,
                    other => return other,
                }
            }
            StartsWith::Empty
        }
    }
}

/// Width from the start of `doc` up to its first break, or [`Width::INF`]
/// when there is no break or the prefix exceeds `budget`.
pub fn width_until_break(doc: &Doc, budget: usize) -> Width {
    finish_prefix(prefix_width(doc), budget)
}

/// [`width_until_break`] over a level's children.
pub(crate) fn level_width_until_break(level: &Level, budget: usize) -> Width {
    finish_prefix(level_prefix_width(level), budget)
}

fn finish_prefix(prefix: Prefix, budget: usize) -> Width {
    match prefix {
        Prefix::UpToBreak(width) if width.fits_in(budget) => width,
        _ => Width::INF,
    }
}

enum Prefix {
    /// A break was found after this much width.
    UpToBreak(Width),
    /// No break; the whole doc is this wide.
    NoBreak(Width),
}

fn prefix_width(doc: &Doc) -> Prefix {
    match doc {
        Doc::Break(_) => Prefix::UpToBreak(Width::ZERO),
        Doc::Level(level) => level_prefix_width(level),
        other => Prefix::NoBreak(other.width()),
    }
}

fn level_prefix_width(level: &Level) -> Prefix {
    let mut acc = Width::ZERO;
    for child in level.children() {
        match prefix_width(child) {
            Prefix::UpToBreak(width) => return Prefix::UpToBreak(acc + width),
            Prefix::NoBreak(width) => acc = acc + width,
        }
    }
    Prefix::NoBreak(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_core::TextSize;
    use pretty_assertions::assert_eq;

    fn plain(text: &str) -> Doc {
        Doc::token(text, None)
    }

    #[test]
    fn forced_break_poisons_level_width() {
        let flat = Doc::level(
            OpenOp::default(),
            vec![plain("a"), Doc::br(FillMode::Unified, " ", 0), plain("b")],
        );
        assert_eq!(flat.width(), Width::of(3));

        let forced = Doc::level(
            OpenOp::default(),
            vec![plain("a"), Doc::forced_newline(), plain("b")],
        );
        assert_eq!(forced.width(), Width::INF);

        let outer = Doc::level(OpenOp::default(), vec![plain("x"), forced]);
        assert_eq!(outer.width(), Width::INF);
    }

    #[test]
    fn splits_breaks_partitions_children() {
        let level = Level::new(
            OpenOp::default(),
            vec![
                Doc::br(FillMode::Unified, "", 0),
                plain("a"),
                plain("b"),
                Doc::br(FillMode::Unified, " ", 0),
                plain("c"),
            ],
        );
        let sb = level.splits_breaks();
        assert_eq!(sb.breaks, vec![0, 3]);
        assert_eq!(sb.splits, vec![0..0, 1..3, 4..5]);
    }

    #[test]
    fn flat_text_uses_break_replacements() {
        let level = Level::new(
            OpenOp::default(),
            vec![
                plain("f("),
                plain("a,"),
                Doc::br(FillMode::Independent, " ", 4),
                plain("b"),
                Doc::space(),
                Doc::tombstone(),
                plain(")"),
            ],
        );
        assert_eq!(level.flat_text(), "f(a, b )");
    }

    #[test]
    fn starts_with_break_sees_through_empty_levels() {
        let empty = Doc::level(OpenOp::default(), vec![]);
        assert_eq!(starts_with_break(&empty), StartsWith::Empty);

        let nested = Doc::level(
            OpenOp::default(),
            vec![
                Doc::level(OpenOp::default(), vec![Doc::Tombstone]),
                Doc::br(FillMode::Unified, " ", 0),
                plain("x"),
            ],
        );
        assert_eq!(starts_with_break(&nested), StartsWith::Yes);

        assert_eq!(starts_with_break(&plain("x")), StartsWith::No);
    }

    #[test]
    fn width_until_break_stops_at_first_break() {
        let level = Doc::level(
            OpenOp::default(),
            vec![
                plain("abc"),
                Doc::level(
                    OpenOp::default(),
                    vec![plain("de"), Doc::br(FillMode::Unified, " ", 0), plain("f")],
                ),
                plain("ghi"),
            ],
        );
        assert_eq!(width_until_break(&level, 100), Width::of(5));
        assert_eq!(width_until_break(&level, 4), Width::INF);
    }

    #[test]
    fn width_until_break_without_break_is_infinite() {
        let level = Doc::level(OpenOp::default(), vec![plain("abc"), plain("d")]);
        assert_eq!(width_until_break(&level, 100), Width::INF);
    }

    #[test]
    fn column_limit_prefix_width() {
        let level = Level::new(
            OpenOp::default().with_column_limit_before_last_break(40),
            vec![
                plain("args"),
                Doc::br(FillMode::Unified, " ", 0),
                plain("->"),
                Doc::Break(Break::new(FillMode::Unified, " ", 0).with_column_limit()),
                plain("body"),
            ],
        );
        assert_eq!(level.width_before_last_limited_break(), Some(Width::of(7)));
    }

    #[test]
    fn union_range_covers_children() {
        let range = |start: u32, end: u32| {
            TextRange::new(TextSize::from(start), TextSize::from(end))
        };
        let level = Doc::level(
            OpenOp::default(),
            vec![
                Doc::token("a", Some(range(10, 11))),
                Doc::space(),
                Doc::token("b", Some(range(14, 15))),
            ],
        );
        assert_eq!(level.range(), Some(range(10, 15)));
    }
}
