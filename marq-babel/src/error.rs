//! Error type for backend selection and rendering.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// No registered backend answers to the requested format name.
    BackendNotFound(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::BackendNotFound(name) => write!(f, "Backend '{name}' not found"),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_missing_backend() {
        let err = RenderError::BackendNotFound("HTML".to_string());
        assert_eq!(err.to_string(), "Backend 'HTML' not found");
    }
}
