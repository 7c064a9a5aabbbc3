//! Macro expansion: default-body splicing and per-format variants.

use marq_parser::marq::macros::encode_placeholders;
use marq_parser::{
    AtomType, CommandTable, DocCompiler, Macro, MacroTable, MarkerRegistry, ParsedDoc,
    ParserSettings,
};
use std::collections::BTreeMap;

fn compiler(macros: MacroTable) -> DocCompiler {
    DocCompiler::new(
        CommandTable::builtin(),
        macros,
        MarkerRegistry::with_defaults(),
        ParserSettings::default(),
    )
}

fn default_macro(def: &str) -> Macro {
    let encoded = encode_placeholders(def);
    let num_params = marq_parser::marq::macros::count_params(&encoded);
    Macro {
        default_def: Some(encoded),
        default_def_position: None,
        other_defs: BTreeMap::new(),
        num_params,
    }
}

fn parse_with(macros: MacroTable, source: &str) -> ParsedDoc {
    compiler(macros)
        .parse_str(source)
        .expect("parse succeeds")
}

#[test]
fn default_body_splices_into_the_input() {
    let mut macros = MacroTable::new();
    macros.insert("greeting", default_macro("hello there"));

    let doc = parse_with(macros, "a \\greeting b");
    assert_eq!(doc.body.to_plain_string(), "a hello there b");
    assert!(doc.diagnostics.is_empty());
}

#[test]
fn substitution_is_positional_and_lossless() {
    let mut macros = MacroTable::new();
    macros.insert("pair", default_macro(r"[\1|\2|\1]"));

    let doc = parse_with(macros, "\\pair {x} {y}");
    assert_eq!(doc.body.to_plain_string(), "[x|y|x]");
    assert!(doc.diagnostics.is_empty());
}

#[test]
fn spliced_body_is_reparsed_as_markup() {
    let mut macros = MacroTable::new();
    macros.insert("strong", default_macro(r"\b{\1}"));

    let doc = parse_with(macros, "\\strong {loud} word");
    let formats: Vec<&str> = doc
        .body
        .atoms()
        .iter()
        .filter(|a| a.atype() == AtomType::FormattingLeft)
        .map(|a| a.string())
        .collect();
    assert_eq!(formats, vec!["bold"]);
    assert_eq!(doc.body.to_plain_string(), "loud word");
}

#[test]
fn variants_expand_to_format_conditional_chains() {
    let mut other_defs = BTreeMap::new();
    other_defs.insert("DITAXML".to_string(), "<ph>*</ph>".to_string());
    other_defs.insert("HTML".to_string(), "<sup>*</sup>".to_string());
    let mut macros = MacroTable::new();
    macros.insert(
        "asterisk",
        Macro {
            default_def: None,
            default_def_position: None,
            other_defs,
            num_params: 0,
        },
    );

    let doc = parse_with(macros, "\\asterisk");
    let shape: Vec<(AtomType, &str)> = doc
        .body
        .atoms()
        .iter()
        .map(|a| (a.atype(), a.string()))
        .collect();
    assert_eq!(
        shape,
        vec![
            (AtomType::FormatIf, "DITAXML"),
            (AtomType::RawString, "<ph>*</ph>"),
            (AtomType::FormatElse, ""),
            (AtomType::FormatIf, "HTML"),
            (AtomType::RawString, "<sup>*</sup>"),
            (AtomType::FormatEndif, ""),
            (AtomType::FormatEndif, ""),
        ]
    );
}

#[test]
fn default_alongside_variants_warns_and_is_ignored() {
    let mut other_defs = BTreeMap::new();
    other_defs.insert("HTML".to_string(), "<i>x</i>".to_string());
    let mut macros = MacroTable::new();
    macros.insert(
        "mixed",
        Macro {
            default_def: Some("plain x".to_string()),
            default_def_position: None,
            other_defs,
            num_params: 0,
        },
    );

    let doc = parse_with(macros, "\\mixed");
    assert!(doc.diagnostics.mentions("cannot have both"));
    // the default body was not spliced
    assert!(!doc.body.to_plain_string().contains("plain x"));
}

#[test]
fn too_few_arguments_warns_and_expands_partially() {
    let mut macros = MacroTable::new();
    macros.insert("pair", default_macro(r"[\1|\2]"));

    let doc = parse_with(macros, "\\pair {only}\n\nnext");
    assert!(doc.diagnostics.mentions("too few arguments"));
    assert!(doc.body.to_plain_string().contains("[only|]"));
}

#[test]
fn single_parameter_macro_takes_an_unbraced_argument() {
    let mut macros = MacroTable::new();
    macros.insert("emph", default_macro(r"<\1>"));

    let doc = parse_with(macros, "\\emph word after");
    assert_eq!(doc.body.to_plain_string(), "<word> after");
}
