//! Code markers: pluggable per-source-language helpers.
//!
//! A marker claims one language and is consulted twice: the parser asks it
//! to mark up `\code` / `\c` blocks, and the generator asks it for symbol
//! synopsis lines. The registry is an explicit object built at run start
//! from configuration; markers are registered explicitly, never through
//! global constructor side effects.
//!
//! Selection prefers the configured default language's marker when it also
//! matches, then the first registered match, then the plain fallback.

use crate::marq::atoms::AtomType;

pub trait CodeMarker: Send + Sync {
    /// Canonical language name, e.g. `"Cpp"`.
    fn language(&self) -> &str;

    fn recognizes_language(&self, lang: &str) -> bool;

    /// File extension without the dot.
    fn recognizes_extension(&self, ext: &str) -> bool;

    /// Heuristic: does this code sample look like the marker's language?
    fn recognizes_code(&self, code: &str) -> bool;

    /// Marks up a code sample for rendering. The concrete markup vocabulary
    /// is backend territory; the default is a passthrough.
    fn marked_up_code(&self, code: &str) -> String {
        code.to_string()
    }

    /// Synopsis line for a documented symbol name.
    fn synopsis(&self, name: &str) -> String {
        name.to_string()
    }

    /// Atom type used when code marked by this marker is appended.
    fn atom_type(&self) -> AtomType {
        AtomType::Code
    }
}

/// Fallback marker: claims everything, marks up nothing.
#[derive(Debug, Default)]
pub struct PlainCodeMarker;

impl CodeMarker for PlainCodeMarker {
    fn language(&self) -> &str {
        ""
    }

    fn recognizes_language(&self, _lang: &str) -> bool {
        true
    }

    fn recognizes_extension(&self, _ext: &str) -> bool {
        true
    }

    fn recognizes_code(&self, _code: &str) -> bool {
        true
    }
}

/// C++ marker. The markup is a passthrough (tag vocabulary is out of
/// scope); what matters is the claim, so `\code` blocks in C++ comments and
/// `.cpp`/`.h` quote files resolve to one marker consistently.
#[derive(Debug, Default)]
pub struct CppCodeMarker;

const CPP_EXTENSIONS: &[&str] = &["c", "c++", "cc", "cpp", "cxx", "h", "h++", "hpp", "hxx"];

impl CodeMarker for CppCodeMarker {
    fn language(&self) -> &str {
        "Cpp"
    }

    fn recognizes_language(&self, lang: &str) -> bool {
        lang == "Cpp" || lang == "C++" || lang == "C"
    }

    fn recognizes_extension(&self, ext: &str) -> bool {
        CPP_EXTENSIONS.contains(&ext)
    }

    fn recognizes_code(&self, code: &str) -> bool {
        code.contains("::") || code.contains(';') || code.contains("#include")
    }

    fn synopsis(&self, name: &str) -> String {
        if name.contains("::") && !name.ends_with(')') {
            format!("{}()", name)
        } else {
            name.to_string()
        }
    }
}

/// The process-wide marker list. `fallback` answers when nothing matches.
pub struct MarkerRegistry {
    markers: Vec<Box<dyn CodeMarker>>,
    fallback: PlainCodeMarker,
    default_language: String,
}

impl MarkerRegistry {
    pub fn new() -> MarkerRegistry {
        MarkerRegistry {
            markers: Vec::new(),
            fallback: PlainCodeMarker,
            default_language: String::new(),
        }
    }

    /// Registry with the built-in markers, defaulting to C++.
    pub fn with_defaults() -> MarkerRegistry {
        let mut registry = MarkerRegistry::new();
        registry.register(Box::new(CppCodeMarker));
        registry.set_default_language("Cpp");
        registry
    }

    pub fn register(&mut self, marker: Box<dyn CodeMarker>) {
        self.markers.push(marker);
    }

    pub fn set_default_language(&mut self, lang: impl Into<String>) {
        self.default_language = lang.into();
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    fn default_marker(&self) -> Option<&dyn CodeMarker> {
        self.markers
            .iter()
            .map(Box::as_ref)
            .find(|m| m.recognizes_language(&self.default_language))
    }

    pub fn marker_for_language(&self, lang: &str) -> &dyn CodeMarker {
        self.markers
            .iter()
            .map(Box::as_ref)
            .find(|m| m.recognizes_language(lang))
            .unwrap_or(&self.fallback)
    }

    pub fn marker_for_file_name(&self, file_name: &str) -> &dyn CodeMarker {
        let ext = file_name.rsplit('.').next().unwrap_or("");
        if let Some(default) = self.default_marker() {
            if default.recognizes_extension(ext) {
                return default;
            }
        }
        self.markers
            .iter()
            .map(Box::as_ref)
            .find(|m| m.recognizes_extension(ext))
            .unwrap_or(&self.fallback)
    }

    pub fn marker_for_code(&self, code: &str) -> &dyn CodeMarker {
        if let Some(default) = self.default_marker() {
            if default.recognizes_code(code) {
                return default;
            }
        }
        self.markers
            .iter()
            .map(Box::as_ref)
            .find(|m| m.recognizes_code(code))
            .unwrap_or(&self.fallback)
    }
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        MarkerRegistry::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpp_code_prefers_cpp_marker() {
        let registry = MarkerRegistry::with_defaults();
        let marker = registry.marker_for_code("QString::count()");
        assert_eq!(marker.language(), "Cpp");
    }

    #[test]
    fn unknown_extension_falls_back_to_plain() {
        let registry = MarkerRegistry::with_defaults();
        let marker = registry.marker_for_file_name("sample.weird");
        assert_eq!(marker.language(), "");
    }

    #[test]
    fn default_language_wins_when_it_matches() {
        struct ShMarker;
        impl CodeMarker for ShMarker {
            fn language(&self) -> &str {
                "Sh"
            }
            fn recognizes_language(&self, lang: &str) -> bool {
                lang == "Sh"
            }
            fn recognizes_extension(&self, ext: &str) -> bool {
                ext == "sh"
            }
            fn recognizes_code(&self, code: &str) -> bool {
                code.starts_with("#!")
            }
        }

        let mut registry = MarkerRegistry::new();
        registry.register(Box::new(ShMarker));
        registry.register(Box::new(CppCodeMarker));
        registry.set_default_language("Sh");

        // both markers would claim ".h" is unknown to Sh; a cpp header still
        // resolves to the cpp marker, but sh code prefers the default
        assert_eq!(registry.marker_for_file_name("x.h").language(), "Cpp");
        assert_eq!(registry.marker_for_code("#!/bin/sh").language(), "Sh");
    }

    #[test]
    fn empty_registry_always_answers() {
        let registry = MarkerRegistry::new();
        assert_eq!(registry.marker_for_language("Cpp").language(), "");
    }
}
