//! Match patterns.
//!
//! Patterns are wildcard, variable-bind, or constructor with named
//! sub-patterns (arbitrarily nested).

use serde::{Deserialize, Serialize};

use lx_common::Span;

/// A pattern with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(flatten)]
    pub kind: PatternKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Pattern {
    pub fn new(kind: PatternKind) -> Self {
        Pattern { kind, span: None }
    }

    /// Whether this pattern matches every value of its type.
    pub fn is_irrefutable(&self) -> bool {
        matches!(self.kind, PatternKind::Wildcard | PatternKind::Bind { .. })
    }

    /// Collect every name bound by this pattern, in binding order.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match &self.kind {
            PatternKind::Wildcard => {}
            PatternKind::Bind { name } => out.push(name.clone()),
            PatternKind::Ctor { fields, .. } => {
                for f in fields {
                    f.pattern.bound_names(out);
                }
            }
        }
    }
}

/// The closed set of pattern forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pat", rename_all = "snake_case")]
pub enum PatternKind {
    /// `_` — matches anything, binds nothing.
    Wildcard,
    /// A name — matches anything, binds the value.
    Bind { name: String },
    /// `Ctor { field: sub, … }` — matches a constructor value.
    Ctor {
        name: String,
        #[serde(default)]
        fields: Vec<FieldPat>,
    },
}

/// A named sub-pattern inside a constructor pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPat {
    pub name: String,
    pub pattern: Pattern,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_names_nested() {
        let p = Pattern::new(PatternKind::Ctor {
            name: "Some".into(),
            fields: vec![FieldPat {
                name: "value".into(),
                pattern: Pattern::new(PatternKind::Ctor {
                    name: "Pair".into(),
                    fields: vec![
                        FieldPat {
                            name: "a".into(),
                            pattern: Pattern::new(PatternKind::Bind { name: "x".into() }),
                        },
                        FieldPat {
                            name: "b".into(),
                            pattern: Pattern::new(PatternKind::Wildcard),
                        },
                    ],
                }),
            }],
        });
        let mut names = Vec::new();
        p.bound_names(&mut names);
        assert_eq!(names, vec!["x".to_string()]);
    }

    #[test]
    fn irrefutable() {
        assert!(Pattern::new(PatternKind::Wildcard).is_irrefutable());
        assert!(Pattern::new(PatternKind::Bind { name: "v".into() }).is_irrefutable());
        assert!(!Pattern::new(PatternKind::Ctor { name: "None".into(), fields: vec![] })
            .is_irrefutable());
    }
}
