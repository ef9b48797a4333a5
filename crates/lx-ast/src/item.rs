//! Modules, imports, and top-level declarations.
//!
//! A [`Module`] is the unit the loader works with: a dotted name, a list of
//! imports, and an ordered list of declarations. Declarations form a closed
//! tagged union ([`Decl`]); the JSON bridge tags them with a `"decl"` key.

use serde::{Deserialize, Serialize};

use lx_common::Span;

use crate::expr::{Block, Expr};
use crate::ty::TypeExpr;

/// A parsed Lx module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Dotted module name, e.g. `"app.geometry"`.
    pub name: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub decls: Vec<Decl>,
    /// Module doc comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Original source text, when the front-end chooses to embed it.
    /// Used only for diagnostic rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Module {
    /// Last segment of the dotted module name.
    pub fn tail_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Qualify a declaration name with this module's name.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.name, name)
    }
}

/// An import of another module, optionally aliased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Dotted path of the imported module, e.g. `"app.geometry"`.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Import {
    /// Last segment of the imported module path.
    pub fn tail_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decl", rename_all = "snake_case")]
pub enum Decl {
    Fn(FnDecl),
    Alias(TypeAliasDecl),
    Record(RecordDecl),
    Sum(SumDecl),
    Effect(EffectDecl),
    Schema(SchemaDecl),
    Contract(ContractDecl),
    Test(TestDecl),
    Property(PropertyDecl),
    Actor(ActorDecl),
}

impl Decl {
    /// The declared name (for contracts, the target function's name).
    pub fn name(&self) -> &str {
        match self {
            Decl::Fn(d) => &d.name,
            Decl::Alias(d) => &d.name,
            Decl::Record(d) => &d.name,
            Decl::Sum(d) => &d.name,
            Decl::Effect(d) => &d.name,
            Decl::Schema(d) => &d.name,
            Decl::Contract(d) => &d.fn_name,
            Decl::Test(d) => &d.name,
            Decl::Property(d) => &d.name,
            Decl::Actor(d) => &d.name,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Decl::Fn(d) => d.span,
            Decl::Alias(d) => d.span,
            Decl::Record(d) => d.span,
            Decl::Sum(d) => d.span,
            Decl::Effect(d) => d.span,
            Decl::Schema(d) => d.span,
            Decl::Contract(d) => d.span,
            Decl::Test(d) => d.span,
            Decl::Property(d) => d.span,
            Decl::Actor(d) => d.span,
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            Decl::Fn(d) => d.doc.as_deref(),
            Decl::Alias(d) => d.doc.as_deref(),
            Decl::Record(d) => d.doc.as_deref(),
            Decl::Sum(d) => d.doc.as_deref(),
            Decl::Schema(d) => d.doc.as_deref(),
            Decl::Test(d) => d.doc.as_deref(),
            Decl::Property(d) => d.doc.as_deref(),
            Decl::Actor(d) => d.doc.as_deref(),
            Decl::Effect(_) | Decl::Contract(_) => None,
        }
    }
}

/// A named, typed parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDecl {
    pub name: String,
    /// Explicit type parameters, ordered and unique. Rigid at this
    /// definition site, fresh at every use site.
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    /// Declared effect names. Must cover callees and syntactic constructs.
    #[serde(default)]
    pub effects: Vec<String>,
    pub body: Block,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A type alias: `alias Pair<T> = List<T>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    pub target: TypeExpr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A record type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDecl {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A tagged-union (sum type) declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumDecl {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    pub variants: Vec<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A named constructor of a sum type, with ordered named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// Declares an effect name usable in function effect sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A versioned schema. Synthesizes a record type `Name@version` unless a
/// record of that qualified name is declared manually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDecl {
    pub name: String,
    pub version: u32,
    pub fields: Vec<SchemaField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl SchemaDecl {
    /// The versioned name, e.g. `"User@2"`.
    pub fn versioned_name(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// A schema field; `optional` fields become `Option<T>` in the
/// synthesized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub ty: TypeExpr,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// Pre/post-conditions attached to a function by name.
///
/// `requires` clauses see the parameters; `ensures` clauses additionally
/// see the implicit `result` binding. All clauses must be pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDecl {
    pub fn_name: String,
    /// Parameter names, repeated here for a shape check against the target.
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub requires: Vec<Expr>,
    #[serde(default)]
    pub ensures: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A unit test. The body must produce Unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDecl {
    pub name: String,
    pub body: Block,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A property test over generated inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<PropertyParam>,
    pub body: Block,
    /// Iteration count override (default 50).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A property parameter with an optional rejection predicate.
///
/// Predicates may reference parameters bound earlier in the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyParam {
    pub name: String,
    pub ty: TypeExpr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// An actor: init parameters, state fields, and message handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub state: Vec<StateField>,
    pub handlers: Vec<Handler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl ActorDecl {
    pub fn handler(&self, message: &str) -> Option<&Handler> {
        self.handlers.iter().find(|h| h.message == message)
    }
}

/// A state field with its initializer, evaluated at spawn time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateField {
    pub name: String,
    pub ty: TypeExpr,
    pub init: Expr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A message handler: fires when a message built with `message`'s
/// constructor is delivered. Must declare the `Concurrent` effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    /// Message constructor name this handler accepts.
    pub message: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    #[serde(default)]
    pub effects: Vec<String>,
    pub body: Block,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}
