//! Diagnostic records.
//!
//! Every phase of the toolchain reports problems as [`Diagnostic`] values.
//! The loader aborts on the first one; the type checker accumulates a list;
//! the interpreter converts runtime failures at the CLI boundary. The JSON
//! shape is `{message, file?, line?, column?}`.

use std::fmt;

use serde::Serialize;

use crate::span::Span;

/// A single diagnostic: a message with optional file and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Diagnostic {
    /// Create a diagnostic with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.line = Some(span.line);
        self.column = Some(span.column);
        self
    }

    pub fn with_optional_span(self, span: Option<Span>) -> Self {
        match span {
            Some(s) => self.with_span(s),
            None => self,
        }
    }

    /// The span, if both line and column are present.
    pub fn span(&self) -> Option<Span> {
        match (self.line, self.column) {
            (Some(l), Some(c)) => Some(Span::new(l, c)),
            _ => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => {
                write!(f, "{}:{}:{}: {}", file, line, col, self.message)
            }
            (Some(file), _, _) => write!(f, "{}: {}", file, self.message),
            (None, Some(line), Some(col)) => {
                write!(f, "{}:{}: {}", line, col, self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_position() {
        let d = Diagnostic::new("unknown type `Foo`")
            .with_file("app/main.lx")
            .with_span(Span::new(4, 9));
        assert_eq!(d.to_string(), "app/main.lx:4:9: unknown type `Foo`");
    }

    #[test]
    fn display_bare() {
        assert_eq!(Diagnostic::new("cyclic import").to_string(), "cyclic import");
    }

    #[test]
    fn json_shape_omits_missing_fields() {
        let d = Diagnostic::new("oops");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json, serde_json::json!({"message": "oops"}));

        let d = Diagnostic::new("oops").with_file("m.lx").with_span(Span::new(1, 2));
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "oops", "file": "m.lx", "line": 1, "column": 2})
        );
    }
}
