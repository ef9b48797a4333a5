//! Runtime errors.
//!
//! The interpreter raises on the first failure and propagates it with `?`
//! to the nearest control boundary: an async group, an actor supervisor,
//! or the CLI. The boundary converts it to a diagnostic.

use std::fmt;

use lx_common::{Diagnostic, Span};

/// A runtime failure with an optional source position.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub span: Option<Span>,
}

/// The closed set of runtime failure kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    /// A general failure described by its message.
    Message(String),
    /// A contract clause evaluated to false.
    ContractViolation {
        fn_name: String,
        /// `"requires"` or `"ensures"`.
        clause: &'static str,
        index: usize,
    },
    /// No match arm accepted the scrutinee.
    NonExhaustiveMatch,
    IndexOutOfBounds { index: i64, len: usize },
    DivisionByZero,
    /// A hole was evaluated.
    Hole,
    /// A message was sent to a stopped actor.
    ActorStopped { id: u64 },
    /// An assertion builtin failed.
    AssertionFailed { detail: String },
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, span: Option<Span>) -> Self {
        RuntimeError { kind, span }
    }

    pub fn msg(message: impl Into<String>) -> Self {
        RuntimeError { kind: RuntimeErrorKind::Message(message.into()), span: None }
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        if self.span.is_none() {
            self.span = span;
        }
        self
    }

    pub fn to_diagnostic(&self, file: Option<&str>) -> Diagnostic {
        let mut d = Diagnostic::new(self.to_string());
        if let Some(f) = file {
            d = d.with_file(f);
        }
        d.with_optional_span(self.span)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RuntimeErrorKind::Message(m) => write!(f, "{}", m),
            RuntimeErrorKind::ContractViolation { fn_name, clause, index } => {
                write!(
                    f,
                    "contract violation: `{}` clause {} of `{}` does not hold",
                    clause,
                    index + 1,
                    fn_name
                )
            }
            RuntimeErrorKind::NonExhaustiveMatch => write!(f, "non-exhaustive match"),
            RuntimeErrorKind::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds for list of length {}", index, len)
            }
            RuntimeErrorKind::DivisionByZero => write!(f, "division by zero"),
            RuntimeErrorKind::Hole => write!(f, "evaluated a hole"),
            RuntimeErrorKind::ActorStopped { id } => {
                write!(f, "actor {} is stopped", id)
            }
            RuntimeErrorKind::AssertionFailed { detail } => {
                write!(f, "assertion failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

/// The interpreter's result type.
pub type RResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violation_message() {
        let err = RuntimeError::new(
            RuntimeErrorKind::ContractViolation {
                fn_name: "median".into(),
                clause: "requires",
                index: 0,
            },
            None,
        );
        assert_eq!(
            err.to_string(),
            "contract violation: `requires` clause 1 of `median` does not hold"
        );
    }

    #[test]
    fn span_is_kept_once_set() {
        let err = RuntimeError::msg("boom").with_span(Some(Span::new(2, 3)));
        let err = err.with_span(Some(Span::new(9, 9)));
        assert_eq!(err.span, Some(Span::new(2, 3)));
    }
}
