//! The atom interpreter: walks a finished atom sequence and drives a backend.
//!
//! The only atoms the interpreter understands itself are the
//! FormatIf/FormatElse/FormatEndif triples produced by macro format variants
//! and `\raw` blocks. A guarded branch is generated only when the enclosing
//! context is enabled AND the active backend handles the branch's format
//! name; the else branch inverts the format test. When a whole chain ends
//! without having emitted anything while enabled, one `UnhandledFormat` atom
//! is synthesized and rendered so the backend always produces something for
//! the construct.
//!
//! Everything else is delegated to `Backend::render_atom`, which reports how
//! many further atoms it consumed.
//!
//! Well-formed FormatIf/Else/Endif nesting is a parser invariant; the
//! interpreter does not re-validate it.

use crate::backend::Backend;
use marq_parser::{Atom, AtomType, CodeMarker, Diagnostics, Position, Text};
use serde::Serialize;

/// What to do when a FormatIf/Else/Endif chain emits nothing for the active
/// backend. The fallback atom is synthesized either way; the policy only
/// decides whether a diagnostic is raised alongside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnhandledFormatPolicy {
    #[default]
    Warning,
    Silent,
}

/// Output of one render run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Rendered {
    pub output: String,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    unhandled_format: UnhandledFormatPolicy,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::default()
    }

    pub fn with_policy(unhandled_format: UnhandledFormatPolicy) -> Interpreter {
        Interpreter { unhandled_format }
    }

    /// Renders a whole atom sequence. `at` attributes any diagnostics raised
    /// during the run, normally the position the comment came from.
    pub fn render(
        &self,
        text: &Text,
        backend: &mut dyn Backend,
        marker: &dyn CodeMarker,
        at: &Position,
    ) -> Rendered {
        let mut rendered = Rendered::default();
        backend.begin(&mut rendered.output);
        let mut num_atoms = 0usize;
        self.generate_atom_list(
            text.atoms(),
            0,
            backend,
            marker,
            true,
            &mut num_atoms,
            &mut rendered,
            at,
        );
        backend.end(&mut rendered.output);
        rendered
    }

    /// The recursive walk. Returns the index of the first atom it did not
    /// consume: `atoms.len()` at end of input, or the index of the
    /// `FormatElse`/`FormatEndif` that closes the branch being walked.
    /// `num_atoms` counts atoms actually handed to the backend, which is how
    /// an empty chain is detected.
    #[allow(clippy::too_many_arguments)]
    fn generate_atom_list(
        &self,
        atoms: &[Atom],
        mut index: usize,
        backend: &mut dyn Backend,
        marker: &dyn CodeMarker,
        generate: bool,
        num_atoms: &mut usize,
        rendered: &mut Rendered,
        at: &Position,
    ) -> usize {
        while index < atoms.len() {
            match atoms[index].atype() {
                AtomType::FormatIf => {
                    let num_atoms_before = *num_atoms;
                    let right_format = backend.handles_format(atoms[index].string());
                    index = self.generate_atom_list(
                        atoms,
                        index + 1,
                        backend,
                        marker,
                        generate && right_format,
                        num_atoms,
                        rendered,
                        at,
                    );
                    if index >= atoms.len() {
                        return atoms.len();
                    }

                    if atoms[index].atype() == AtomType::FormatElse {
                        *num_atoms += 1;
                        index = self.generate_atom_list(
                            atoms,
                            index + 1,
                            backend,
                            marker,
                            generate && !right_format,
                            num_atoms,
                            rendered,
                            at,
                        );
                        if index >= atoms.len() {
                            return atoms.len();
                        }
                    }

                    if atoms[index].atype() == AtomType::FormatEndif {
                        if generate && num_atoms_before == *num_atoms {
                            let format = backend.format().to_string();
                            if self.unhandled_format == UnhandledFormatPolicy::Warning {
                                rendered.diagnostics.warning(
                                    at.clone(),
                                    format!("output format '{}' not handled", format),
                                );
                            }
                            let fallback = [Atom::with_string(AtomType::UnhandledFormat, format)];
                            backend.render_atom(&fallback, 0, marker, &mut rendered.output);
                            *num_atoms += 1;
                        }
                        index += 1;
                    }
                }
                AtomType::FormatElse | AtomType::FormatEndif => return index,
                _ => {
                    let mut n = 1;
                    if generate {
                        n += backend.render_atom(atoms, index, marker, &mut rendered.output);
                        *num_atoms += n;
                    }
                    index += n;
                }
            }
        }
        atoms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marq_parser::MarkerRegistry;

    /// Records which atom payloads it was asked to render, one token per
    /// call, tagging the fallback.
    struct TraceBackend {
        name: &'static str,
    }

    impl Backend for TraceBackend {
        fn format(&self) -> &str {
            self.name
        }

        fn render_atom(
            &mut self,
            atoms: &[Atom],
            index: usize,
            _marker: &dyn CodeMarker,
            out: &mut String,
        ) -> usize {
            let atom = &atoms[index];
            if atom.atype() == AtomType::UnhandledFormat {
                out.push_str("[unhandled]");
            } else {
                out.push_str(atom.string());
            }
            0
        }
    }

    fn variant_chain() -> Text {
        // \if HTML A \else \if DITAXML B \endif \endif, as the parser lays
        // out a two-variant macro
        Text::from(vec![
            Atom::with_string(AtomType::FormatIf, "HTML"),
            Atom::with_string(AtomType::RawString, "A"),
            Atom::new(AtomType::FormatElse),
            Atom::with_string(AtomType::FormatIf, "DITAXML"),
            Atom::with_string(AtomType::RawString, "B"),
            Atom::new(AtomType::FormatEndif),
            Atom::new(AtomType::FormatEndif),
        ])
    }

    fn render_with(name: &'static str, policy: UnhandledFormatPolicy) -> Rendered {
        let markers = MarkerRegistry::with_defaults();
        let marker = markers.marker_for_language("");
        let mut backend = TraceBackend { name };
        Interpreter::with_policy(policy).render(
            &variant_chain(),
            &mut backend,
            marker,
            &Position::none(),
        )
    }

    #[test]
    fn matching_branch_renders_and_other_is_skipped() {
        let rendered = render_with("DITAXML", UnhandledFormatPolicy::Warning);
        assert_eq!(rendered.output, "B");
        assert!(rendered.diagnostics.is_empty());
    }

    #[test]
    fn first_branch_wins_for_its_own_format() {
        let rendered = render_with("HTML", UnhandledFormatPolicy::Warning);
        assert_eq!(rendered.output, "A");
        assert!(rendered.diagnostics.is_empty());
    }

    #[test]
    fn unmatched_chain_synthesizes_one_fallback() {
        let rendered = render_with("TROFF", UnhandledFormatPolicy::Warning);
        assert_eq!(rendered.output, "[unhandled]");
        assert_eq!(rendered.diagnostics.len(), 1);
        assert!(rendered.diagnostics.mentions("TROFF"));
    }

    #[test]
    fn silent_policy_still_emits_the_fallback() {
        let rendered = render_with("TROFF", UnhandledFormatPolicy::Silent);
        assert_eq!(rendered.output, "[unhandled]");
        assert!(rendered.diagnostics.is_empty());
    }

    #[test]
    fn unmatched_variant_chain_emits_exactly_one_fallback() {
        // the fallback fires at the innermost endif; the else bookkeeping
        // keeps the enclosing chain from firing a second one
        let rendered = render_with("TROFF", UnhandledFormatPolicy::Warning);
        assert_eq!(rendered.output.matches("[unhandled]").count(), 1);
    }

    #[test]
    fn chain_inside_foreign_branch_renders_nothing() {
        // the whole chain sits inside a branch guarded by another format, so
        // nothing is generated and no fallback is synthesized for it
        let mut atoms = vec![Atom::with_string(AtomType::FormatIf, "HTML")];
        atoms.extend(variant_chain().atoms().iter().cloned());
        atoms.push(Atom::new(AtomType::FormatEndif));
        let text = Text::from(atoms);

        let markers = MarkerRegistry::with_defaults();
        let marker = markers.marker_for_language("");
        let mut backend = TraceBackend { name: "TROFF" };
        let rendered =
            Interpreter::new().render(&text, &mut backend, marker, &Position::none());
        assert_eq!(rendered.output, "");
        assert!(rendered.diagnostics.is_empty());
    }

    #[test]
    fn plain_atoms_pass_straight_through() {
        let mut text = Text::new();
        text.append(Atom::with_string(AtomType::String, "hello"));
        text.append(Atom::with_string(AtomType::String, " world"));

        let markers = MarkerRegistry::with_defaults();
        let marker = markers.marker_for_language("");
        let mut backend = TraceBackend { name: "HTML" };
        let rendered =
            Interpreter::new().render(&text, &mut backend, marker, &Position::none());
        assert_eq!(rendered.output, "hello world");
    }
}
