//! User-defined macros.
//!
//! A macro has an optional default body and any number of per-format
//! variants. Parameter placeholders are stored as the control characters
//! U+0001..U+0008; the configuration loader turns the written `\1`..`\8`
//! spellings into those codes, and a macro's parameter count is the highest
//! placeholder any of its bodies mentions.
//!
//! Argument capture happens in the parser (arguments follow the call site);
//! this module owns the body representation: splitting a body into literal
//! and placeholder segments, and whole-string substitution for default
//! bodies that are spliced back into the input stream.

use crate::marq::location::Position;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Highest placeholder a macro body may use.
pub const MAX_PARAMS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub default_def: Option<String>,
    /// Where the default body was defined, for diagnostics raised when the
    /// macro is used.
    pub default_def_position: Option<Position>,
    /// Format name -> body, e.g. `"HTML" -> "<sup>*</sup>"`.
    pub other_defs: BTreeMap<String, String>,
    pub num_params: usize,
}

/// The process-wide macro table, populated once from configuration.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    map: HashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> MacroTable {
        MacroTable::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, m: Macro) {
        self.map.insert(name.into(), m);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// One piece of a macro body: literal text, or the index (1-based) of the
/// parameter to substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroSegment {
    Raw(String),
    Param(usize),
}

/// Returns the number of parameters a body requires: the highest placeholder
/// code it contains.
pub fn count_params(def: &str) -> usize {
    def.chars()
        .filter_map(|c| {
            let code = c as usize;
            (1..=MAX_PARAMS).contains(&code).then_some(code)
        })
        .max()
        .unwrap_or(0)
}

/// Rewrites the written `\1`..`\8` placeholder spellings into control
/// characters. Any other backslash sequence is left alone; the parser sees
/// it as ordinary markup when the body is replayed.
pub fn encode_placeholders(spelling: &str) -> String {
    let mut out = String::with_capacity(spelling.len());
    let mut chars = spelling.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(d @ '1'..='8') => {
                    let code = *d as u32 - '0' as u32;
                    out.push(char::from_u32(code).unwrap_or('\u{1}'));
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a body into literal and placeholder segments. Placeholders above
/// `num_params` are kept as literal characters, matching how the parser
/// replays out-of-range codes.
pub fn split_segments(def: &str, num_params: usize) -> Vec<MacroSegment> {
    let mut segments = Vec::new();
    let mut raw = String::new();
    for c in def.chars() {
        let code = c as usize;
        if (1..=num_params.min(MAX_PARAMS)).contains(&code) {
            if !raw.is_empty() {
                segments.push(MacroSegment::Raw(std::mem::take(&mut raw)));
            }
            segments.push(MacroSegment::Param(code));
        } else {
            raw.push(c);
        }
    }
    if !raw.is_empty() {
        segments.push(MacroSegment::Raw(raw));
    }
    segments
}

/// Substitutes captured arguments positionally into a body, producing the
/// flat string spliced into the input stream for default-body expansion.
pub fn substitute_to_string(def: &str, args: &[String], num_params: usize) -> String {
    let mut out = String::with_capacity(def.len());
    for segment in split_segments(def, num_params) {
        match segment {
            MacroSegment::Raw(text) => out.push_str(&text),
            MacroSegment::Param(i) => {
                if let Some(arg) = args.get(i - 1) {
                    out.push_str(arg);
                }
            }
        }
    }
    out
}
