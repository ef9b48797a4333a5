//! Surface type expressions.
//!
//! These are the types written in source (and carried over the JSON
//! bridge); the type checker converts them to its internal representation.

use serde::{Deserialize, Serialize};

use lx_common::Span;

/// A type expression with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeExpr {
    #[serde(flatten)]
    pub kind: TypeExprKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind) -> Self {
        TypeExpr { kind, span: None }
    }

    /// Shorthand for a bare named type with no arguments.
    pub fn name(name: impl Into<String>) -> Self {
        TypeExpr::new(TypeExprKind::Name { name: name.into(), args: vec![] })
    }
}

/// The closed set of type-expression forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeExprKind {
    /// A named type, possibly applied: `Int`, `List<Int>`, `ActorRef<Msg>`,
    /// a type parameter, or a user type resolved through the symbol table.
    Name {
        name: String,
        #[serde(default)]
        args: Vec<TypeExpr>,
    },
    /// `T?` sugar — equivalent to `Option<T>`.
    Optional { inner: Box<TypeExpr> },
    /// A function type, used for function-valued parameters.
    Fn {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
}
