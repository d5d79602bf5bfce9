//! End-to-end layout scenarios over translator-shaped document trees.

use galley_layout::doc::{
    BreakBehaviour, Doc, FillMode, LastLevelBreakability, OpenOp,
};
use galley_layout::{
    format, format_to_string, GreedyReflower, LayoutConfig, PassthroughReflower, StringSink,
};
use galley_core::{TextRange, TextSize};
use insta::assert_snapshot;
use pretty_assertions::assert_eq;

fn tok(text: &str) -> Doc {
    Doc::token(text, None)
}

fn cfg(max_width: usize) -> LayoutConfig {
    LayoutConfig {
        max_width,
        ..LayoutConfig::default()
    }
}

fn render(doc: &Doc, max_width: usize) -> String {
    format_to_string(doc, &cfg(max_width), &PassthroughReflower).unwrap()
}

/// `header {` plus an indented body block plus `}`, the way the
/// translator lowers braced declarations and statements.
fn braced(header: Vec<Doc>, body: Vec<Doc>) -> Doc {
    let mut children = header;
    children.push(Doc::space());
    children.push(tok("{"));
    if body.is_empty() {
        children.push(Doc::level(OpenOp::new(2), vec![]));
    } else {
        let mut inner = Vec::new();
        for item in body {
            inner.push(Doc::forced_newline());
            inner.push(item);
        }
        children.push(Doc::level(OpenOp::new(2), inner));
        children.push(Doc::forced_newline());
    }
    children.push(tok("}"));
    Doc::level(OpenOp::default(), children)
}

/// `callee(a, b, c);` with fill-style argument wrapping.
fn call_stmt(callee: &str, args: &[&str], plus_indent: i32) -> Doc {
    let mut arg_children = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            arg_children.push(tok(","));
            arg_children.push(Doc::br(FillMode::Independent, " ", 0));
        }
        arg_children.push(tok(arg));
    }
    Doc::level(
        OpenOp::default(),
        vec![
            tok(callee),
            tok("("),
            Doc::level(OpenOp::new(plus_indent), arg_children),
            tok(")"),
            tok(";"),
        ],
    )
}

fn nested_call_class() -> Doc {
    let stmt = call_stmt(
        "f",
        &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
        4,
    );
    let while_block = braced(vec![tok("while"), Doc::space(), tok("(true)")], vec![stmt]);
    let method = braced(vec![tok("void"), Doc::space(), tok("b()")], vec![while_block]);
    braced(vec![tok("class"), Doc::space(), tok("A")], vec![method])
}

#[test]
fn nested_braces_with_fitting_call_stay_flat() {
    assert_snapshot!(render(&nested_call_class(), 100), @r###"
    class A {
      void b() {
        while (true) {
          f(a, b, c, d, e, f, g, h, i, j);
        }
      }
    }
    "###);
}

#[test]
fn narrow_budget_wraps_call_arguments_onto_continuation_line() {
    assert_snapshot!(render(&nested_call_class(), 30), @r###"
    class A {
      void b() {
        while (true) {
          f(a, b, c, d, e, f, g,
              h, i, j);
        }
      }
    }
    "###);
}

#[test]
fn empty_class_body_is_accepted_as_flat() {
    let class = braced(vec![tok("class"), Doc::space(), tok("T")], vec![]);
    assert_eq!(render(&class, 100), "class T {}\n");
}

#[test]
fn class_with_empty_method_breaks_only_the_outer_body() {
    let method = braced(vec![tok("Y()")], vec![]);
    let class = braced(vec![tok("class"), Doc::space(), tok("X")], vec![method]);
    assert_eq!(render(&class, 100), "class X {\n  Y() {}\n}\n");
}

#[test]
fn method_chain_inlines_prefix_and_breaks_final_call() {
    let mut args = Vec::new();
    for (idx, arg) in ["request", "timeout", "retries"].iter().enumerate() {
        if idx > 0 {
            args.push(tok(","));
            args.push(Doc::br(FillMode::Independent, " ", 0));
        }
        args.push(tok(arg));
    }
    let tail = Doc::level(
        OpenOp::default().with_breakability(LastLevelBreakability::AcceptInlineChain),
        vec![
            tok(".send("),
            Doc::br(FillMode::Unified, "", 8),
            Doc::level(OpenOp::default(), args),
            tok(")"),
        ],
    );
    let chain = Doc::level(
        OpenOp::new(4).with_break_behaviour(BreakBehaviour::PreferBreakingLastInnerLevel {
            keep_indent_when_inlined: true,
        }),
        vec![
            tok("client"),
            Doc::br(FillMode::Unified, "", 0),
            tok(".connect()"),
            Doc::br(FillMode::Unified, "", 0),
            tok(".validate()"),
            Doc::br(FillMode::Unified, "", 0),
            tail,
        ],
    );

    assert_eq!(
        render(&chain, 45),
        "client.connect().validate().send(\n            request, timeout, retries)\n"
    );
}

#[test]
fn check_inner_recurses_through_nested_chains() {
    let fetch = Doc::level(
        OpenOp::default().with_breakability(LastLevelBreakability::AcceptInlineChain),
        vec![
            tok(".at("),
            Doc::br(FillMode::Unified, "", 4),
            tok("key"),
            tok(")"),
        ],
    );
    let inner_chain = Doc::level(
        OpenOp::new(4)
            .with_break_behaviour(BreakBehaviour::PreferBreakingLastInnerLevel {
                keep_indent_when_inlined: true,
            })
            .with_breakability(LastLevelBreakability::CheckInner),
        vec![
            tok(".reg()"),
            Doc::br(FillMode::Unified, "", 0),
            tok(".get()"),
            Doc::br(FillMode::Unified, "", 0),
            fetch,
        ],
    );
    let chain = Doc::level(
        OpenOp::new(4).with_break_behaviour(BreakBehaviour::PreferBreakingLastInnerLevel {
            keep_indent_when_inlined: false,
        }),
        vec![
            tok("svc"),
            Doc::br(FillMode::Unified, "", 0),
            tok(".locate()"),
            Doc::br(FillMode::Unified, "", 0),
            inner_chain,
        ],
    );

    assert_eq!(
        render(&chain, 30),
        "svc.locate().reg().get().at(\n        key)\n"
    );
}

#[test]
fn oversized_single_token_overflows_without_breaking() {
    let long = "x".repeat(50);
    let doc = Doc::level(
        OpenOp::default(),
        vec![
            tok(&long),
            Doc::br(FillMode::Independent, " ", 0),
            tok("y;"),
        ],
    );

    let out = render(&doc, 30);
    assert_eq!(out, format!("{long}\ny;\n"));
}

#[test]
fn trailing_line_comment_is_reflowed_at_its_start_column() {
    let doc = Doc::level(
        OpenOp::default(),
        vec![
            tok("int x = 1;"),
            Doc::space(),
            Doc::line_comment("// tally of widgets observed so far", None),
        ],
    );

    let out = format_to_string(&doc, &cfg(30), &GreedyReflower::new()).unwrap();
    assert_eq!(
        out,
        "int x = 1; // tally of widgets\n           // observed so far\n"
    );
}

#[test]
fn protected_comment_survives_a_narrow_budget() {
    let text = "// MOE: generated identifier table, do not rewrap";
    let doc = Doc::level(
        OpenOp::default(),
        vec![Doc::line_comment(text, None)],
    );
    let out = format_to_string(&doc, &cfg(20), &GreedyReflower::new()).unwrap();
    assert_eq!(out, format!("{text}\n"));
}

#[test]
fn chunk_ranges_are_monotone() {
    let range = |start: u32, end: u32| TextRange::new(TextSize::from(start), TextSize::from(end));
    let stmt = Doc::level(
        OpenOp::default(),
        vec![
            Doc::token("first", Some(range(0, 5))),
            Doc::br(FillMode::Independent, " ", 0),
            Doc::token("second", Some(range(6, 12))),
            Doc::forced_newline(),
            Doc::token("third", Some(range(13, 18))),
        ],
    );

    let mut sink = StringSink::new();
    format(&stmt, &cfg(100), &PassthroughReflower, &mut sink).unwrap();

    let starts: Vec<u32> = sink
        .chunks()
        .iter()
        .filter_map(|(_, range)| range.map(|r| r.start().into()))
        .collect();
    let mut sorted = starts.clone();
    sorted.sort_unstable();
    assert_eq!(starts, sorted);
    assert_eq!(sink.text(), "first second\nthird\n");
}

#[test]
fn formatting_is_deterministic() {
    let doc = nested_call_class();
    let once = render(&doc, 30);
    let twice = render(&doc, 30);
    assert_eq!(once, twice);
}
