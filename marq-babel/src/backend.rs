//! Backend trait definition.
//!
//! A backend renders one atom at a time into an output buffer. The
//! interpreter owns the walk order and the FormatIf/Else/Endif resolution;
//! the backend owns the output vocabulary and whatever per-document state it
//! needs (tag stacks, pending link targets). Backends are selected once per
//! run and passed explicitly, never resolved through ambient state.

use marq_parser::{Atom, CodeMarker};

pub trait Backend: Send + Sync {
    /// The format name this backend answers to, e.g. `"DITAXML"`. Macro
    /// format variants and `\raw` blocks are matched against this name.
    fn format(&self) -> &str;

    /// Optional description of this backend.
    fn description(&self) -> &str {
        ""
    }

    /// Whether this backend handles the given format name. The comparison is
    /// case-insensitive; a backend may override this to claim aliases.
    fn handles_format(&self, name: &str) -> bool {
        self.format().eq_ignore_ascii_case(name)
    }

    /// Called once before the first atom of a document.
    fn begin(&mut self, _out: &mut String) {}

    /// Renders `atoms[index]` into `out` and returns how many FURTHER atoms
    /// were consumed beyond the current one. Most atoms consume zero; a
    /// logically multi-atom construct such as an image followed by its
    /// caption looks ahead and reports the extra consumption so the
    /// interpreter advances past both.
    fn render_atom(
        &mut self,
        atoms: &[Atom],
        index: usize,
        marker: &dyn CodeMarker,
        out: &mut String,
    ) -> usize;

    /// Called once after the last atom of a document.
    fn end(&mut self, _out: &mut String) {}
}
