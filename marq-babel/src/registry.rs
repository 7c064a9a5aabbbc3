//! Backend registry for discovery and selection.
//!
//! Backends register under their format name; lookup falls back to each
//! backend's own `handles_format` so `"ditaxml"` finds the `"DITAXML"`
//! backend. The registry owns its backends; rendering borrows one mutably
//! for the duration of a document.

use crate::backend::Backend;
use crate::error::RenderError;
use crate::formats::{DitaXmlBackend, PlainTextBackend};
use crate::interpreter::{Interpreter, Rendered};
use marq_parser::{CodeMarker, Position, Text};
use std::collections::HashMap;

pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn Backend>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        BackendRegistry {
            backends: HashMap::new(),
        }
    }

    /// Registry with the built-in backends.
    pub fn with_defaults() -> Self {
        let mut registry = BackendRegistry::new();
        registry.register(DitaXmlBackend::new());
        registry.register(PlainTextBackend::new());
        registry
    }

    /// Register a backend
    ///
    /// If a backend with the same format name already exists, it will be
    /// replaced.
    pub fn register<B: Backend + 'static>(&mut self, backend: B) {
        self.backends
            .insert(backend.format().to_string(), Box::new(backend));
    }

    /// Get a backend by format name
    pub fn get(&self, name: &str) -> Result<&dyn Backend, RenderError> {
        if let Some(backend) = self.backends.get(name) {
            return Ok(backend.as_ref());
        }
        self.backends
            .values()
            .map(Box::as_ref)
            .find(|b| b.handles_format(name))
            .ok_or_else(|| RenderError::BackendNotFound(name.to_string()))
    }

    /// Get a backend by format name, mutably, for rendering
    pub fn get_mut(&mut self, name: &str) -> Result<&mut dyn Backend, RenderError> {
        let key = if self.backends.contains_key(name) {
            name.to_string()
        } else {
            self.backends
                .values()
                .map(Box::as_ref)
                .find(|b| b.handles_format(name))
                .map(|b| b.format().to_string())
                .ok_or_else(|| RenderError::BackendNotFound(name.to_string()))?
        };
        match self.backends.get_mut(&key) {
            Some(backend) => Ok(backend.as_mut()),
            None => Err(RenderError::BackendNotFound(name.to_string())),
        }
    }

    /// Check if a format has a registered backend
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// List all registered format names, sorted
    pub fn list_formats(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Render an atom sequence with the named backend and the default
    /// interpreter policy.
    pub fn render(
        &mut self,
        name: &str,
        text: &Text,
        marker: &dyn CodeMarker,
        at: &Position,
    ) -> Result<Rendered, RenderError> {
        let backend = self.get_mut(name)?;
        Ok(Interpreter::new().render(text, backend, marker, at))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        BackendRegistry::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marq_parser::{Atom, AtomType};

    struct NullBackend;

    impl Backend for NullBackend {
        fn format(&self) -> &str {
            "NULL"
        }

        fn render_atom(
            &mut self,
            _atoms: &[Atom],
            _index: usize,
            _marker: &dyn CodeMarker,
            _out: &mut String,
        ) -> usize {
            0
        }
    }

    #[test]
    fn test_registry_empty() {
        let registry = BackendRegistry::new();
        assert!(registry.list_formats().is_empty());
        assert!(!registry.has("DITAXML"));
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = BackendRegistry::new();
        registry.register(NullBackend);
        assert!(registry.has("NULL"));
        assert_eq!(registry.get("NULL").unwrap().format(), "NULL");
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let mut registry = BackendRegistry::new();
        registry.register(NullBackend);
        assert!(registry.has("null"));
        assert_eq!(registry.get_mut("Null").unwrap().format(), "NULL");
    }

    #[test]
    fn test_registry_unknown_format_errors() {
        let registry = BackendRegistry::new();
        match registry.get("TROFF") {
            Err(RenderError::BackendNotFound(name)) => assert_eq!(name, "TROFF"),
            Ok(_) => panic!("expected BackendNotFound"),
        }
    }

    #[test]
    fn test_registry_defaults_are_sorted() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.list_formats(), vec!["DITAXML", "PlainText"]);
    }

    #[test]
    fn test_registry_render_convenience() {
        let mut registry = BackendRegistry::with_defaults();
        let markers = marq_parser::MarkerRegistry::with_defaults();
        let mut text = Text::new();
        text.append(Atom::with_string(AtomType::String, "hi"));
        let rendered = registry
            .render(
                "PlainText",
                &text,
                markers.marker_for_language(""),
                &Position::none(),
            )
            .unwrap();
        assert_eq!(rendered.output.trim(), "hi");
    }
}
