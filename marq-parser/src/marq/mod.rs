//! Main module for the marq parser library

pub mod atoms;
pub mod commands;
pub mod diagnostics;
pub mod edit_distance;
pub mod lists;
pub mod location;
pub mod macros;
pub mod markers;
pub mod parsing;
