//! Source positions.
//!
//! The grammar front-end is an external collaborator; module ASTs arrive
//! over the JSON bridge carrying 1-based line/column positions from the
//! original source. A `Span` is that position, attached to AST nodes and
//! threaded into diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 1-based line/column position in an Lx source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }

    /// Byte offset of this position within `source`, for label rendering.
    ///
    /// Returns `None` when the position is past the end of the text.
    pub fn offset_in(&self, source: &str) -> Option<usize> {
        let mut line = 1u32;
        let mut offset = 0usize;
        for raw_line in source.split_inclusive('\n') {
            if line == self.line {
                let col = (self.column.max(1) - 1) as usize;
                return Some(offset + col.min(raw_line.len()));
            }
            offset += raw_line.len();
            line += 1;
        }
        None
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_display() {
        assert_eq!(Span::new(3, 7).to_string(), "3:7");
    }

    #[test]
    fn offset_in_source() {
        let src = "ab\ncdef\ng";
        assert_eq!(Span::new(1, 1).offset_in(src), Some(0));
        assert_eq!(Span::new(2, 3).offset_in(src), Some(5));
        assert_eq!(Span::new(3, 1).offset_in(src), Some(8));
        assert_eq!(Span::new(9, 1).offset_in(src), None);
    }
}
