//! Collected parse diagnostics.
//!
//! Warnings never abort a parse; they accumulate here, each attached to the
//! position where it fired, and the caller decides what to do with them. A
//! broken comment still yields the best atom sequence obtainable.

use crate::marq::location::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub position: Position,
    /// Secondary detail, e.g. a nearest-name suggestion.
    pub note: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: {}", self.position, kind, self.message)?;
        if let Some(note) = &self.note {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn warning(&mut self, position: Position, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            position,
            note: None,
        });
    }

    pub fn warning_with_note(
        &mut self,
        position: Position,
        message: impl Into<String>,
        note: impl Into<String>,
    ) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            position,
            note: Some(note.into()),
        });
    }

    pub fn error(&mut self, position: Position, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            position,
            note: None,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// True if any collected diagnostic mentions `needle`; test helper used
    /// across the integration suites.
    pub fn mentions(&self, needle: &str) -> bool {
        self.items.iter().any(|d| {
            d.message.contains(needle)
                || d.note.as_deref().map_or(false, |n| n.contains(needle))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position_and_note() {
        let mut diags = Diagnostics::new();
        diags.warning_with_note(
            Position::start_of("doc.marq"),
            "unknown command '\\zzqx'",
            "maybe you meant '\\l'?",
        );
        let rendered = diags.items()[0].to_string();
        assert!(rendered.starts_with("doc.marq:1:1: warning:"));
        assert!(rendered.contains("maybe you meant"));
    }
}
