//! End-to-end format selection: macro variants parsed by marq-parser and
//! resolved against a backend at render time.

use marq_babel::formats::{DitaXmlBackend, PlainTextBackend};
use marq_babel::{Backend, BackendRegistry, Interpreter, UnhandledFormatPolicy};
use marq_parser::{
    CommandTable, DocCompiler, Macro, MacroTable, MarkerRegistry, ParsedDoc, ParserSettings,
    Position,
};
use rstest::rstest;
use std::collections::BTreeMap;

fn compiler_with_variant_macro() -> DocCompiler {
    let mut other_defs = BTreeMap::new();
    other_defs.insert("HTML".to_string(), "<sup>*</sup>".to_string());
    other_defs.insert("DITAXML".to_string(), "<ph>*</ph>".to_string());

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

    DocCompiler::new(
        CommandTable::builtin(),
        macros,
        MarkerRegistry::with_defaults(),
        ParserSettings::default(),
    )
}

fn parse(source: &str) -> ParsedDoc {
    compiler_with_variant_macro().parse_str(source).unwrap()
}

fn render(doc: &ParsedDoc, backend: &mut dyn Backend) -> String {
    let markers = MarkerRegistry::with_defaults();
    Interpreter::new()
        .render(
            &doc.body,
            backend,
            markers.marker_for_language(""),
            &Position::none(),
        )
        .output
}

#[test]
fn ditaxml_backend_picks_its_own_variant() {
    let doc = parse("footnote\\asterisk here");
    let mut backend = DitaXmlBackend::new();
    let output = render(&doc, &mut backend);
    assert!(output.contains("<ph>*</ph>"));
    assert!(!output.contains("<sup>*</sup>"));
}

#[test]
fn unmatched_backend_gets_exactly_one_fallback() {
    let doc = parse("footnote\\asterisk here");
    let mut backend = PlainTextBackend::new();

    let markers = MarkerRegistry::with_defaults();
    let rendered = Interpreter::with_policy(UnhandledFormatPolicy::Warning).render(
        &doc.body,
        &mut backend,
        markers.marker_for_language(""),
        &Position::none(),
    );
    assert_eq!(rendered.output.matches("<Missing PlainText>").count(), 1);
    assert_eq!(rendered.diagnostics.len(), 1);
    assert!(rendered.diagnostics.mentions("PlainText"));
}

#[test]
fn raw_block_renders_only_under_its_format() {
    let compiler = DocCompiler::default();
    let doc = compiler
        .parse_str("\\raw HTML\n<table class=\"x\"/>\n\\endraw")
        .unwrap();

    struct HtmlEcho;
    impl Backend for HtmlEcho {
        fn format(&self) -> &str {
            "HTML"
        }
        fn render_atom(
            &mut self,
            atoms: &[marq_parser::Atom],
            index: usize,
            _marker: &dyn marq_parser::CodeMarker,
            out: &mut String,
        ) -> usize {
            if atoms[index].atype() == marq_parser::AtomType::RawString {
                out.push_str(atoms[index].string());
            }
            0
        }
    }

    let markers = MarkerRegistry::with_defaults();
    let mut html = HtmlEcho;
    let html_out = Interpreter::new()
        .render(
            &doc.body,
            &mut html,
            markers.marker_for_language(""),
            &Position::none(),
        )
        .output;
    assert!(html_out.contains("<table class=\"x\"/>"));

    // a raw block for another format is skipped without a fallback; its
    // empty else branch counts as handled
    let mut dita = DitaXmlBackend::new();
    let dita_out = render(&doc, &mut dita);
    assert!(!dita_out.contains("<table class=\"x\"/>"));
    assert_eq!(dita_out, "");
}

#[rstest]
#[case("DITAXML")]
#[case("ditaxml")]
#[case("DitaXml")]
fn registry_selects_backend_by_name(#[case] name: &str) {
    let mut registry = BackendRegistry::with_defaults();
    let doc = parse("footnote\\asterisk here");
    let markers = MarkerRegistry::with_defaults();
    let rendered = registry
        .render(
            name,
            &doc.body,
            markers.marker_for_language(""),
            &Position::none(),
        )
        .unwrap();
    assert!(rendered.output.contains("<ph>*</ph>"));
}
