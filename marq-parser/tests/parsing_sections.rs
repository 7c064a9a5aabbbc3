//! Section nesting, the table of contents, and implicit closing.

use marq_parser::{AtomType, DocCompiler, ParsedDoc};

fn parse(source: &str) -> ParsedDoc {
    DocCompiler::default()
        .parse_str(source)
        .expect("parse succeeds")
}

#[test]
fn sections_nest_and_close_implicitly_at_end() {
    let doc = parse("\\section1 A\n\\section2 B\n\\section2 C\n");

    let levels: Vec<i32> = doc.table_of_contents.iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![1, 2, 2]);

    // opening C closed B; A and C stay open until end of input
    let atypes: Vec<AtomType> = doc.body.atoms().iter().map(|a| a.atype()).collect();
    let n = atypes.len();
    assert_eq!(&atypes[n - 2..], &[AtomType::SectionRight, AtomType::SectionRight]);
    assert_eq!(
        atypes
            .iter()
            .filter(|t| **t == AtomType::SectionRight)
            .count(),
        3
    );
}

#[test]
fn toc_entries_point_at_their_section_atoms() {
    let doc = parse("\\section1 Alpha\nbody text\n");
    assert_eq!(doc.table_of_contents.len(), 1);
    let entry = &doc.table_of_contents[0];
    assert_eq!(
        doc.body.atoms()[entry.atom_index].atype(),
        AtomType::SectionLeft
    );
    assert_eq!(doc.body.atoms()[entry.atom_index].string(), "1");
}

#[test]
fn section_heading_is_a_single_line() {
    let doc = parse("\\section1 The Heading\nFirst paragraph.\n");
    let heading = doc
        .body
        .sub_text(
            AtomType::SectionHeadingLeft,
            AtomType::SectionHeadingRight,
            false,
        )
        .expect("heading present");
    assert_eq!(marq_parser::plain_string(heading), "The Heading");

    // the body line is an ordinary paragraph inside the section
    let atypes: Vec<AtomType> = doc.body.atoms().iter().map(|a| a.atype()).collect();
    assert!(atypes.contains(&AtomType::ParaLeft));
}

#[test]
fn explicit_endsection_pops_the_stack() {
    let doc = parse("\\section1 A\ntext\n\\endsection1\nafter\n");
    let atypes: Vec<AtomType> = doc.body.atoms().iter().map(|a| a.atype()).collect();
    // the section closed before the trailing paragraph, so nothing is left
    // to auto-close
    let last_right = atypes
        .iter()
        .rposition(|t| *t == AtomType::SectionRight)
        .expect("section closed");
    assert!(atypes[last_right + 1..].contains(&AtomType::ParaLeft));
    assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics.items());
}

#[test]
fn opening_a_shallower_section_closes_deeper_ones() {
    let doc = parse("\\section1 A\n\\section2 B\n\\section1 C\n");
    let levels: Vec<i32> = doc.table_of_contents.iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![1, 2, 1]);

    // before C's SectionLeft both B (level 2) and A (level 1) were closed
    let atoms = doc.body.atoms();
    let c_index = doc.table_of_contents[2].atom_index;
    let closed_before_c = atoms[..c_index]
        .iter()
        .filter(|a| a.atype() == AtomType::SectionRight)
        .count();
    assert_eq!(closed_before_c, 2);
}

#[test]
fn unexpected_endsection_warns() {
    let doc = parse("\\endsection1 oops");
    assert!(!doc.diagnostics.is_empty());
}
