//! Rendering for parsed marq documents.
//!
//! `marq-parser` compiles a doc comment into a flat atom sequence; this crate
//! turns that sequence into concrete output text. The pieces:
//!
//! - `Backend` trait: the single-atom render contract every output format
//!   implements ([./backend.rs])
//! - `Interpreter`: walks an atom sequence, resolves FormatIf/Else/Endif
//!   branches against the active backend, and delegates everything else to
//!   `Backend::render_atom` ([./interpreter.rs])
//! - `BackendRegistry`: discovery and selection of backends by format name
//!   ([./registry.rs])
//! - Concrete backends under `formats/`: a DITA-flavored XML emitter and a
//!   plain-text emitter
//!
//! The file structure:
//!     .
//!     ├── error.rs
//!     ├── backend.rs              # Backend trait definition
//!     ├── interpreter.rs          # FormatIf resolution + dispatch loop
//!     ├── registry.rs             # BackendRegistry for discovery and selection
//!     ├── formats
//!     │   ├── ditaxml.rs
//!     │   ├── plaintext.rs
//!     │   └── mod.rs
//!     └── lib.rs
//!
//! This is a pure lib: it powers whatever shell sits above it and writes to
//! an output buffer, never to stdout or the filesystem. Diagnostics raised
//! while rendering (currently only the unhandled-format fallback) are
//! collected into the returned `Rendered`, not printed.

pub mod backend;
pub mod error;
pub mod formats;
pub mod interpreter;
pub mod registry;

pub use backend::Backend;
pub use error::RenderError;
pub use interpreter::{Interpreter, Rendered, UnhandledFormatPolicy};
pub use registry::BackendRegistry;
