//! Source positions, including positions inside include and macro splices.
//!
//! A `Location` is a stack of file positions: splicing an include file (or a
//! macro body defined elsewhere) pushes a new frame, and the parser pops it
//! once the spliced region is fully consumed, so diagnostics inside the
//! splice point at the included file while the outer frame stays frozen.
//! Positions are advanced lazily, by replaying consumed characters only when
//! a diagnostic actually needs one.

use serde::{Deserialize, Serialize};
use std::fmt;

const TAB_STOP: usize = 8;

/// One resolved file/line/column triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start_of(file: impl Into<String>) -> Position {
        Position {
            file: file.into(),
            line: 1,
            column: 1,
        }
    }

    /// Placeholder for text with no file attached (tests, config strings).
    pub fn none() -> Position {
        Position {
            file: String::new(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "<input>:{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// A stack of positions; the top frame is where the parser currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    stack: Vec<Position>,
}

impl Location {
    pub fn new(file: impl Into<String>) -> Location {
        Location {
            stack: vec![Position::start_of(file)],
        }
    }

    pub fn push(&mut self, file: impl Into<String>) {
        self.stack.push(Position::start_of(file));
    }

    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Splice nesting depth; 1 for an unspliced source.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn position(&self) -> Position {
        self.stack.last().cloned().unwrap_or_else(Position::none)
    }

    pub fn file_path(&self) -> &str {
        self.stack.last().map(|p| p.file.as_str()).unwrap_or("")
    }

    /// Advances the top frame over one consumed character.
    pub fn advance(&mut self, ch: char) {
        let top = match self.stack.last_mut() {
            Some(top) => top,
            None => return,
        };
        match ch {
            '\n' => {
                top.line += 1;
                top.column = 1;
            }
            '\t' => {
                top.column = ((top.column / TAB_STOP) + 1) * TAB_STOP + 1;
            }
            _ => top.column += 1,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location {
            stack: vec![Position::none()],
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.position().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines_and_columns() {
        let mut loc = Location::new("doc.marq");
        for ch in "ab\ncd".chars() {
            loc.advance(ch);
        }
        let pos = loc.position();
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn push_and_pop_frame_for_splices() {
        let mut loc = Location::new("outer.marq");
        loc.advance('x');
        loc.push("inner.marq");
        assert_eq!(loc.depth(), 2);
        loc.advance('\n');
        assert_eq!(loc.position().line, 2);
        assert_eq!(loc.file_path(), "inner.marq");
        loc.pop();
        assert_eq!(loc.file_path(), "outer.marq");
        assert_eq!(loc.position().column, 2);
    }

    #[test]
    fn pop_never_removes_the_last_frame() {
        let mut loc = Location::new("only.marq");
        loc.pop();
        assert_eq!(loc.depth(), 1);
    }
}
