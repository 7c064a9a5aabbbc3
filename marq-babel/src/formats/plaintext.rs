//! Plain-text backend.
//!
//! Drops all structure except paragraph and item breaks. Mostly useful for
//! tests and for diffable golden output; it is also the demonstration that a
//! backend needs nothing beyond the single-atom contract.

use crate::backend::Backend;
use marq_parser::{Atom, AtomType, CodeMarker};

#[derive(Debug, Default)]
pub struct PlainTextBackend;

impl PlainTextBackend {
    pub fn new() -> PlainTextBackend {
        PlainTextBackend
    }
}

impl Backend for PlainTextBackend {
    fn format(&self) -> &str {
        "PlainText"
    }

    fn description(&self) -> &str {
        "Unformatted text"
    }

    fn render_atom(
        &mut self,
        atoms: &[Atom],
        index: usize,
        _marker: &dyn CodeMarker,
        out: &mut String,
    ) -> usize {
        let atom = &atoms[index];
        let mut skip_ahead = 0;
        match atom.atype() {
            AtomType::String
            | AtomType::RawString
            | AtomType::AutoLink
            | AtomType::C => out.push_str(atom.string()),
            AtomType::Code | AtomType::CodeBad | AtomType::CodeOld | AtomType::CodeNew => {
                out.push('\n');
                out.push_str(atom.string());
                out.push('\n');
            }
            AtomType::ParaRight
            | AtomType::BriefRight
            | AtomType::SectionHeadingRight => out.push_str("\n\n"),
            AtomType::ListItemNumber => {
                out.push_str(atom.string());
                out.push_str(". ");
            }
            AtomType::ListTagRight => out.push_str(": "),
            AtomType::ListItemRight | AtomType::TableRowRight => out.push('\n'),
            AtomType::TableItemRight => out.push('\t'),
            AtomType::Br | AtomType::Hr => out.push('\n'),
            AtomType::Image | AtomType::InlineImage => {
                if let Some(next) = atoms.get(index + 1) {
                    if next.atype() == AtomType::ImageText {
                        skip_ahead = 1;
                    }
                }
                out.push('[');
                out.push_str(atom.string());
                out.push(']');
            }
            AtomType::UnhandledFormat => {
                out.push_str(&format!("<Missing {}>", atom.string()));
            }
            AtomType::UnknownCommand => {
                out.push('\\');
                out.push_str(atom.string());
            }
            _ => {}
        }
        skip_ahead
    }
}
