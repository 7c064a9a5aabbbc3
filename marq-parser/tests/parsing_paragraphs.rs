//! Paragraph formation and word classification.

use marq_parser::{AtomType, DocCompiler, ParsedDoc};
use proptest::prelude::*;

fn parse(source: &str) -> ParsedDoc {
    DocCompiler::default()
        .parse_str(source)
        .expect("parse succeeds")
}

fn types(doc: &ParsedDoc) -> Vec<AtomType> {
    doc.body.atoms().iter().map(|a| a.atype()).collect()
}

#[test]
fn prose_collapses_to_one_string_run() {
    let doc = parse("some words,\n  more   words.");
    assert_eq!(
        types(&doc),
        vec![AtomType::ParaLeft, AtomType::String, AtomType::ParaRight]
    );
    assert_eq!(doc.body.atoms()[1].string(), "some words, more words.");
    assert!(doc.diagnostics.is_empty());
}

#[test]
fn blank_line_starts_a_new_paragraph() {
    let doc = parse("one\n\ntwo");
    assert_eq!(
        types(&doc),
        vec![
            AtomType::ParaLeft,
            AtomType::String,
            AtomType::ParaRight,
            AtomType::ParaLeft,
            AtomType::String,
            AtomType::ParaRight,
        ]
    );
    assert_eq!(doc.body.atoms()[1].string(), "one");
    assert_eq!(doc.body.atoms()[4].string(), "two");
}

#[test]
fn code_like_words_become_auto_links() {
    let doc = parse("call QWidget now");
    assert_eq!(
        types(&doc),
        vec![
            AtomType::ParaLeft,
            AtomType::String,
            AtomType::AutoLink,
            AtomType::String,
            AtomType::ParaRight,
        ]
    );
    assert_eq!(doc.body.atoms()[2].string(), "QWidget");

    let doc = parse("see show() and a_name and Ns::member");
    let links: Vec<&str> = doc
        .body
        .atoms()
        .iter()
        .filter(|a| a.atype() == AtomType::AutoLink)
        .map(|a| a.string())
        .collect();
    assert_eq!(links, vec!["show()", "a_name", "Ns::member"]);
}

#[test]
fn ordinary_capitalized_words_stay_prose() {
    let doc = parse("The Word is fine");
    assert_eq!(
        types(&doc),
        vec![AtomType::ParaLeft, AtomType::String, AtomType::ParaRight]
    );
}

#[test]
fn escaped_punctuation_is_literal() {
    let doc = parse(r"braces \{ and \} and a stray \\");
    assert_eq!(doc.body.to_plain_string(), r"braces { and } and a stray \");
}

#[test]
fn brief_is_recoverable_as_a_sub_range() {
    let doc = parse("\\brief Short description.\n\nLong form follows.");
    let brief = doc.brief().expect("brief present");
    assert_eq!(marq_parser::plain_string(brief), "Short description.");
}

proptest! {
    // whitespace-separated lowercase prose always yields exactly one
    // collapsed String run
    #[test]
    fn prose_only_input_is_one_string_run(
        words in proptest::collection::vec("[a-z]{1,8}", 1..12),
        seps in proptest::collection::vec(prop_oneof![
            Just(" "),
            Just("  "),
            Just("\n"),
            Just(" \n "),
        ], 0..12),
    ) {
        let mut source = String::new();
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                source.push_str(seps.get(i - 1).copied().unwrap_or(" "));
            }
            source.push_str(word);
        }

        let doc = parse(&source);
        prop_assert_eq!(
            types(&doc),
            vec![AtomType::ParaLeft, AtomType::String, AtomType::ParaRight]
        );
        prop_assert_eq!(doc.body.atoms()[1].string(), words.join(" "));
    }
}
