//! AST for the Lx language.
//!
//! The grammar front-end is an external collaborator: it produces a
//! [`Module`] tree, and this crate defines that tree as closed tagged
//! unions with serde derives so a JSON-encoded module is accepted in place
//! of source text. Every node carries an optional [`lx_common::Span`].
//!
//! # Architecture
//!
//! - [`item`]: modules, imports, and top-level declarations
//! - [`expr`]: expressions, statements, and blocks
//! - [`pat`]: match patterns
//! - [`ty`]: surface type expressions
//! - [`align`]: positional/named call-argument alignment (used by both the
//!   type checker and the interpreter)

pub mod align;
pub mod expr;
pub mod item;
pub mod pat;
pub mod ty;

pub use expr::{Arg, BinOp, Block, Expr, ExprKind, FieldInit, MatchCase, Stmt, StmtKind};
pub use item::{
    ActorDecl, ContractDecl, Decl, EffectDecl, FnDecl, Handler, Import, Module, Param,
    PropertyDecl, PropertyParam, RecordDecl, SchemaDecl, SchemaField, StateField, SumDecl,
    TestDecl, TypeAliasDecl, Variant,
};
pub use pat::{FieldPat, Pattern, PatternKind};
pub use ty::{TypeExpr, TypeExprKind};

/// The name of the synthetic supervision event delivered to a parent actor
/// when one of its children fails. Handlers may be declared for it; its
/// payload is `{child: ActorRef, reason: String}`.
pub const CHILD_FAILED: &str = "__child_failed";
