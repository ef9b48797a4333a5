//! Expressions, statements, and blocks.
//!
//! Expressions and statements are structs wrapping a tagged kind plus an
//! optional span, so the JSON bridge stays flat:
//! `{"expr": "binary", "op": "+", ..., "span": {...}}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use lx_common::Span;

use crate::pat::Pattern;
use crate::ty::TypeExpr;

/// A sequence of statements. The value of a block is the value of its last
/// expression statement, or Unit.
pub type Block = Vec<Stmt>;

/// An expression with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, span: None }
    }

    pub fn with_span(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span: Some(span) }
    }
}

/// The closed set of expression forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    Int { value: i64 },
    Bool { value: bool },
    Str { value: String },
    /// A bare or dotted name reference.
    Var { name: String },
    List { items: Vec<Expr> },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A call. The callee is a (possibly dotted) name: a builtin, a user
    /// function, an actor operation (`Counter.spawn`, `Counter.Incr`), or
    /// an actor send (`ref.send`).
    Call { callee: String, args: Vec<Arg> },
    /// Record or variant construction: `Name { f: e, … }`.
    Record { name: String, fields: Vec<FieldInit> },
    Field { target: Box<Expr>, name: String },
    Index { target: Box<Expr>, index: Box<Expr> },
    /// If-expression. Both branches are required when the value is used;
    /// a missing else yields Unit.
    If {
        cond: Box<Expr>,
        then_branch: Block,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<Block>,
    },
    Match {
        scrutinee: Box<Expr>,
        cases: Vec<MatchCase>,
    },
    /// A typed placeholder. Always an error at check time and at runtime.
    Hole,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinOp {
    /// Arithmetic: Int × Int → Int.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    /// Comparison: Int × Int → Bool.
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    /// Equality: T × T → Bool.
    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }

    /// Logical: Bool × Bool → Bool.
    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{}", s)
    }
}

/// A call argument, positional or named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: Expr,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Arg { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Arg { name: Some(name.into()), value }
    }
}

/// A record-construction field initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
}

/// One arm of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub body: Block,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A statement with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(flatten)]
    pub kind: StmtKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt { kind, span: None }
    }
}

/// The closed set of statement forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    Let {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ty: Option<TypeExpr>,
        value: Expr,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    Expr { value: Expr },
    Match {
        scrutinee: Expr,
        cases: Vec<MatchCase>,
    },
    /// `async_group { … }` — runs its body, then round-robins the tasks
    /// registered by nested `async` statements. Requires `Concurrent`.
    AsyncGroup { body: Block },
    /// `async { … }` — registers a task in the enclosing group.
    Async { body: Block },
}
