//! Open/close pairing across the nesting state machines.

use marq_parser::{AtomType, DocCompiler, ParsedDoc};
use proptest::prelude::*;

fn parse(source: &str) -> ParsedDoc {
    DocCompiler::default()
        .parse_str(source)
        .expect("parse succeeds")
}

fn closing(left: AtomType) -> Option<AtomType> {
    Some(match left {
        AtomType::AbstractLeft => AtomType::AbstractRight,
        AtomType::BriefLeft => AtomType::BriefRight,
        AtomType::CaptionLeft => AtomType::CaptionRight,
        AtomType::DivLeft => AtomType::DivRight,
        AtomType::FootnoteLeft => AtomType::FootnoteRight,
        AtomType::FormattingLeft => AtomType::FormattingRight,
        AtomType::ImportantLeft => AtomType::ImportantRight,
        AtomType::LegaleseLeft => AtomType::LegaleseRight,
        AtomType::ListLeft => AtomType::ListRight,
        AtomType::ListItemLeft => AtomType::ListItemRight,
        AtomType::ListTagLeft => AtomType::ListTagRight,
        AtomType::NoteLeft => AtomType::NoteRight,
        AtomType::ParaLeft => AtomType::ParaRight,
        AtomType::QuotationLeft => AtomType::QuotationRight,
        AtomType::SectionLeft => AtomType::SectionRight,
        AtomType::SectionHeadingLeft => AtomType::SectionHeadingRight,
        AtomType::SidebarLeft => AtomType::SidebarRight,
        AtomType::TableLeft => AtomType::TableRight,
        AtomType::TableHeaderLeft => AtomType::TableHeaderRight,
        AtomType::TableRowLeft => AtomType::TableRowRight,
        AtomType::TableItemLeft => AtomType::TableItemRight,
        _ => return None,
    })
}

fn is_right(atype: AtomType) -> bool {
    matches!(
        atype,
        AtomType::AbstractRight
            | AtomType::BriefRight
            | AtomType::CaptionRight
            | AtomType::DivRight
            | AtomType::FootnoteRight
            | AtomType::FormattingRight
            | AtomType::ImportantRight
            | AtomType::LegaleseRight
            | AtomType::ListRight
            | AtomType::ListItemRight
            | AtomType::ListTagRight
            | AtomType::NoteRight
            | AtomType::ParaRight
            | AtomType::QuotationRight
            | AtomType::SectionRight
            | AtomType::SectionHeadingRight
            | AtomType::SidebarRight
            | AtomType::TableRight
            | AtomType::TableHeaderRight
            | AtomType::TableRowRight
            | AtomType::TableItemRight
    )
}

/// Every `*Left` atom must be closed by its own `*Right` in LIFO order.
fn assert_balanced(doc: &ParsedDoc) {
    let mut stack = Vec::new();
    for atom in doc.body.atoms() {
        if let Some(right) = closing(atom.atype()) {
            stack.push(right);
        } else if is_right(atom.atype()) {
            assert_eq!(
                stack.pop(),
                Some(atom.atype()),
                "out-of-order close: {:?}",
                atom.atype()
            );
        }
    }
    assert!(stack.is_empty(), "unclosed atoms: {stack:?}");
}

#[test]
fn table_with_nested_list_is_balanced() {
    // headers and rows close implicitly at the next \row or \endtable
    let doc = parse(
        "\\table\n\\header \\li Heading\n\\row \\li \\list \\li nested \\endlist\n\\endtable",
    );
    assert_balanced(&doc);
    assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics.items());
}

#[test]
fn formatting_spans_close_in_lifo_order() {
    let doc = parse("\\b{bold \\i{both}} plain");
    assert_balanced(&doc);
    let formats: Vec<(AtomType, &str)> = doc
        .body
        .atoms()
        .iter()
        .filter(|a| {
            matches!(
                a.atype(),
                AtomType::FormattingLeft | AtomType::FormattingRight
            )
        })
        .map(|a| (a.atype(), a.string()))
        .collect();
    assert_eq!(
        formats,
        vec![
            (AtomType::FormattingLeft, "bold"),
            (AtomType::FormattingLeft, "italic"),
            (AtomType::FormattingRight, "italic"),
            (AtomType::FormattingRight, "bold"),
        ]
    );
}

#[test]
fn quotation_inside_sidebar_is_allowed() {
    let doc = parse("\\sidebar \\quotation wise words \\endquotation \\endsidebar");
    assert_balanced(&doc);
    assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics.items());
}

#[test]
fn unclosed_table_closes_its_row_and_itself() {
    let doc = parse("\\table\n\\row \\li cell\n");
    assert_balanced(&doc);
    assert!(doc.diagnostics.mentions("endtable"));
    assert_eq!(
        doc.body.atoms().last().map(|a| a.atype()),
        Some(AtomType::TableRight)
    );
}

#[test]
fn unclosed_command_is_auto_closed_with_a_warning() {
    let doc = parse("\\quotation never closed");
    assert_balanced(&doc);
    assert!(doc.diagnostics.mentions("endquotation"));
    assert!(doc
        .body
        .atoms()
        .iter()
        .any(|a| a.atype() == AtomType::QuotationRight));
}

#[test]
fn mismatched_close_recovers() {
    let doc = parse("\\quotation text \\endlist more \\endquotation");
    assert_balanced(&doc);
    assert!(!doc.diagnostics.is_empty());
}

#[test]
fn footnote_rejects_nested_block_commands() {
    let doc = parse("\\footnote \\table \\endtable \\endfootnote");
    assert!(!doc.diagnostics.is_empty());
    assert_balanced(&doc);
}

proptest! {
    #[test]
    fn nested_lists_always_balance(depth in 1usize..5) {
        let mut source = String::new();
        for _ in 0..depth {
            source.push_str("\\list \\li ");
        }
        source.push('x');
        for _ in 0..depth {
            source.push_str(" \\endlist");
        }

        let doc = parse(&source);
        assert_balanced(&doc);
        prop_assert!(doc.diagnostics.is_empty());
    }
}
