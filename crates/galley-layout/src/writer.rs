//! The write pass.
//!
//! Given the state the search accepted, walk the tree a second time and
//! emit the final text as `(text, source-range)` chunks. The writer is the
//! only component that produces output; the search never does I/O.

use galley_core::{visual_width, TextRange};

use crate::comment::CommentReflower;
use crate::doc::{Break, Doc, Level, Token};
use crate::state::{BreakDecision, LevelDecision, State};
use crate::LayoutConfig;

/// Receives the formatted output.
pub trait OutputSink {
    /// Append `text`, attributed to `range` when it originated in source.
    fn append(&mut self, text: &str, range: Option<TextRange>);
    /// Terminate the current line.
    fn newline(&mut self);
    /// Emit `n` columns of indentation at the start of a line.
    fn indent(&mut self, n: usize);
}

/// Collects output into a `String` plus the raw chunk list.
///
/// The rendered text never carries trailing whitespace before a line
/// terminator; the chunk list is the unprocessed stream.
#[derive(Debug)]
pub struct StringSink {
    text: String,
    chunks: Vec<(String, Option<TextRange>)>,
    newline: &'static str,
}

impl StringSink {
    pub fn new() -> Self {
        Self::with_newline("\n")
    }

    pub fn with_newline(newline: &'static str) -> Self {
        Self {
            text: String::new(),
            chunks: Vec::new(),
            newline,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn chunks(&self) -> &[(String, Option<TextRange>)] {
        &self.chunks
    }
}

impl Default for StringSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for StringSink {
    fn append(&mut self, text: &str, range: Option<TextRange>) {
        if text.is_empty() {
            return;
        }
        self.text.push_str(text);
        self.chunks.push((text.to_owned(), range));
    }

    fn newline(&mut self) {
        while matches!(self.text.as_bytes().last(), Some(b' ' | b'\t')) {
            self.text.pop();
        }
        self.text.push_str(self.newline);
    }

    fn indent(&mut self, n: usize) {
        self.text.extend(std::iter::repeat_n(' ', n));
    }
}

/// Replays the layout decisions over the tree and emits the final text.
pub struct Writer<'a> {
    config: &'a LayoutConfig,
    state: &'a State,
    reflower: &'a dyn CommentReflower,
    sink: &'a mut dyn OutputSink,
    column: usize,
    pending_indent: Option<usize>,
    line_has_content: bool,
}

impl<'a> Writer<'a> {
    pub fn new(
        config: &'a LayoutConfig,
        state: &'a State,
        reflower: &'a dyn CommentReflower,
        sink: &'a mut dyn OutputSink,
    ) -> Self {
        Self {
            config,
            state,
            reflower,
            sink,
            column: 0,
            pending_indent: None,
            line_has_content: false,
        }
    }

    /// Writes the whole document. Non-empty output ends with a newline.
    pub fn write(mut self, doc: &Doc) {
        self.write_doc(doc);
        if self.line_has_content {
            self.sink.newline();
        }
    }

    fn write_doc(&mut self, doc: &Doc) {
        match doc {
            Doc::Token(tok) => self.write_token(tok),
            Doc::Space => self.emit(" ", None),
            Doc::Tombstone => {}
            Doc::Break(br) => self.write_break(br),
            Doc::Level(level) => self.write_level(level),
        }
    }

    fn write_level(&mut self, level: &Level) {
        match self.state.level_decision(level.id()) {
            Some(LevelDecision::Broken) => {
                for child in level.children() {
                    self.write_doc(child);
                }
            }
            // Levels inside a flat ancestor carry no decision of their
            // own; the ancestor's flat text covers them.
            Some(LevelDecision::Flat) | None => self.emit(level.flat_text(), level.range()),
        }
    }

    fn write_break(&mut self, br: &Break) {
        match self.state.break_decision(br.id()) {
            Some(BreakDecision::Taken { indent }) => {
                self.sink.newline();
                self.pending_indent = Some(indent);
                self.column = indent;
                self.line_has_content = false;
            }
            Some(BreakDecision::Flat) | None => self.emit(br.flat(), None),
        }
    }

    fn write_token(&mut self, tok: &Token) {
        if tok.is_comment() {
            let text = self
                .reflower
                .reformat(tok.text(), self.column, self.config.max_width);
            self.emit(&text, tok.range());
        } else {
            self.emit(tok.text(), tok.range());
        }
    }

    /// Emits `text`, which may span lines when the reflower wrapped a
    /// comment.
    fn emit(&mut self, text: &str, range: Option<TextRange>) {
        if text.is_empty() {
            return;
        }
        if let Some(indent) = self.pending_indent.take() {
            self.sink.indent(indent);
        }
        self.sink.append(text, range);
        match text.rsplit_once('\n') {
            Some((_, tail)) => self.column = visual_width(tail),
            None => self.column += visual_width(text),
        }
        self.line_has_content = true;
    }
}
