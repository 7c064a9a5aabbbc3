//! # marq-parser
//!
//! The compiler front end for the marq documentation markup: a ~100-command
//! backslash language embedded in free-form comment text, compiled into a
//! flat sequence of typed atoms.
//!
//! The crate is organized leaves-first:
//!
//!   src/marq/commands       the closed command set and its name table
//!   src/marq/atoms          the Atom/Text model the parser produces
//!   src/marq/location       source positions across include/macro splices
//!   src/marq/diagnostics    collected warnings, never printed here
//!   src/marq/lists          list style + counter state
//!   src/marq/macros         user macro table and placeholder handling
//!   src/marq/markers        per-language code markers and their registry
//!   src/marq/parsing        the char-by-char doc parser itself
//!
//! The command table, macro table and marker registry are built once from
//! configuration and shared read-only across parse calls; all per-comment
//! state lives inside one `parse` invocation.

pub mod marq;

pub use marq::atoms::{plain_string, Atom, AtomType, Text};
pub use marq::commands::{Cmd, CommandTable, TableError};
pub use marq::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use marq::location::{Location, Position};
pub use marq::macros::{Macro, MacroTable};
pub use marq::markers::{CodeMarker, MarkerRegistry};
pub use marq::parsing::{
    ArgLoc, DocCompiler, ParseError, ParsedDoc, ParserSettings, TargetRef, TocEntry, Topic,
};
