//! List styles, item markers, and implicit value lists.

use marq_parser::{AtomType, DocCompiler, ParsedDoc};
use rstest::rstest;

fn parse(source: &str) -> ParsedDoc {
    DocCompiler::default()
        .parse_str(source)
        .expect("parse succeeds")
}

fn item_numbers(doc: &ParsedDoc) -> Vec<String> {
    doc.body
        .atoms()
        .iter()
        .filter(|a| a.atype() == AtomType::ListItemNumber)
        .map(|a| a.string().to_string())
        .collect()
}

#[test]
fn list_without_hint_is_bullet() {
    let doc = parse("\\list \\li one \\li two \\endlist");
    let list_left = doc
        .body
        .atoms()
        .iter()
        .find(|a| a.atype() == AtomType::ListLeft)
        .expect("list opened");
    assert_eq!(list_left.string(), "bullet");
}

#[rstest]
#[case("1", &["1", "2", "3"])]
#[case("A", &["A", "B", "C"])]
#[case("a", &["a", "b", "c"])]
#[case("I", &["I", "II", "III"])]
#[case("i", &["i", "ii", "iii"])]
fn item_markers_follow_the_style_hint(#[case] hint: &str, #[case] expected: &[&str]) {
    let doc = parse(&format!(
        "\\list {hint} \\li one \\li two \\li three \\endlist"
    ));
    assert_eq!(item_numbers(&doc), expected);
}

#[test]
fn numeric_hint_can_set_the_start() {
    let doc = parse("\\list 4 \\li a \\li b \\endlist");
    assert_eq!(item_numbers(&doc), vec!["4", "5"]);
}

#[test]
fn value_items_open_an_implicit_value_list() {
    let doc = parse("\\value Red the color red\n\\value Green the color green");
    assert_eq!(doc.enum_item_list, vec!["Red", "Green"]);

    let atypes: Vec<AtomType> = doc.body.atoms().iter().map(|a| a.atype()).collect();
    assert_eq!(atypes.first(), Some(&AtomType::ListLeft));
    assert_eq!(doc.body.atoms()[0].string(), "value");
    assert_eq!(atypes.last(), Some(&AtomType::ListRight));
    assert_eq!(
        atypes
            .iter()
            .filter(|t| **t == AtomType::ListTagLeft)
            .count(),
        2
    );
}

#[test]
fn omitted_values_are_tracked_without_atoms() {
    let doc = parse("\\value Red shown\n\\omitvalue Internal");
    assert_eq!(doc.enum_item_list, vec!["Red", "Internal"]);
    assert_eq!(doc.omit_enum_item_list, vec!["Internal"]);
}

#[test]
fn li_outside_any_list_warns() {
    let doc = parse("\\li stray");
    assert!(!doc.diagnostics.is_empty());
}

#[test]
fn items_carry_their_list_style() {
    let doc = parse("\\list I \\li x \\endlist");
    let item = doc
        .body
        .atoms()
        .iter()
        .find(|a| a.atype() == AtomType::ListItemLeft)
        .expect("item opened");
    assert_eq!(item.string(), "upperroman");
}
