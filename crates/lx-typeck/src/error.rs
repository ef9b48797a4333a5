//! Type errors.
//!
//! Every unification carries a context string describing where the
//! constraint came from; errors keep that context plus the source span, so
//! the CLI can say "argument `xs` of `list.len`: expected List<Int>, found
//! Int" at the right position. Errors are accumulated, never thrown.

use std::fmt;

use lx_common::{Diagnostic, Span};

use crate::ty::Ty;

/// A type error found during checking.
#[derive(Clone, Debug)]
pub enum TypeError {
    /// Two types that should be equal are not.
    Mismatch {
        expected: Ty,
        found: Ty,
        context: String,
        span: Option<Span>,
    },
    /// Function or constructor applied to the wrong number of types/args.
    ArityMismatch {
        expected: usize,
        found: usize,
        context: String,
        span: Option<Span>,
    },
    /// A rigid type parameter would have to equal something other than
    /// itself.
    RigidMismatch {
        label: String,
        found: Ty,
        context: String,
        span: Option<Span>,
    },
    /// Occurs check failure: a variable appears inside its own solution.
    InfiniteType {
        ty: Ty,
        context: String,
        span: Option<Span>,
    },
    UnknownVariable { name: String, span: Option<Span> },
    UnknownFunction { name: String, span: Option<Span> },
    UnknownType { name: String, span: Option<Span> },
    UnknownConstructor { name: String, span: Option<Span> },
    /// A bare constructor name is defined by more than one sum type.
    AmbiguousConstructor {
        name: String,
        candidates: Vec<String>,
        span: Option<Span>,
    },
    /// A type constructor applied to the wrong number of arguments.
    TypeArity {
        name: String,
        expected: usize,
        found: usize,
        span: Option<Span>,
    },
    /// An argument-alignment issue at a call site.
    CallArg {
        callee: String,
        issue: String,
        span: Option<Span>,
    },
    /// The caller does not declare an effect its callee needs.
    MissingEffect {
        callee: String,
        effect: String,
        span: Option<Span>,
    },
    /// A declared effect name is not in the known effect set.
    UndeclaredEffect { name: String, span: Option<Span> },
    /// A function reference passed where a pure function is required.
    ImpureArgument {
        callee: String,
        fn_name: String,
        effects: Vec<String>,
        span: Option<Span>,
    },
    /// The pure-argument builtins take a bare function name, nothing else.
    NotAFunctionReference { callee: String, span: Option<Span> },
    /// Match over a sum type does not cover every variant.
    NonExhaustiveMatch {
        ty: String,
        missing: Vec<String>,
        span: Option<Span>,
    },
    /// Match arms mix constructors of different sum types (and no
    /// wildcard arm is present).
    MixedMatchPatterns { span: Option<Span> },
    /// A hole reached the checker.
    Hole { span: Option<Span> },
    UnknownField {
        owner: String,
        field: String,
        span: Option<Span>,
    },
    MissingField {
        owner: String,
        field: String,
        span: Option<Span>,
    },
    DuplicateField {
        owner: String,
        field: String,
        span: Option<Span>,
    },
    /// Field access on something that is not a record or variant.
    NoFields { ty: Ty, span: Option<Span> },
    /// Contract parameter list does not match the target function's.
    ContractParams {
        fn_name: String,
        detail: String,
        span: Option<Span>,
    },
    /// A contract clause calls something effectful.
    ContractImpure {
        fn_name: String,
        callee: String,
        span: Option<Span>,
    },
    /// A contract clause contains a hole.
    ContractHole { fn_name: String, span: Option<Span> },
    /// A contract names a function that does not exist.
    ContractUnknownFn { fn_name: String, span: Option<Span> },
    /// An actor handler failed validation.
    HandlerInvalid {
        actor: String,
        message: String,
        detail: String,
        span: Option<Span>,
    },
    /// Actor handlers reference constructors of different sum types.
    ActorMessageUnion {
        actor: String,
        detail: String,
        span: Option<Span>,
    },
    /// Schema version must be a positive integer.
    SchemaVersion {
        name: String,
        version: u32,
        span: Option<Span>,
    },
    /// A `spec:` doc block failed validation.
    DocSpec {
        decl: String,
        detail: String,
        span: Option<Span>,
    },
    /// A declaration repeats a type parameter name.
    DuplicateTypeParam {
        decl: String,
        name: String,
        span: Option<Span>,
    },
}

impl TypeError {
    pub fn span(&self) -> Option<Span> {
        match self {
            TypeError::Mismatch { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::RigidMismatch { span, .. }
            | TypeError::InfiniteType { span, .. }
            | TypeError::UnknownVariable { span, .. }
            | TypeError::UnknownFunction { span, .. }
            | TypeError::UnknownType { span, .. }
            | TypeError::UnknownConstructor { span, .. }
            | TypeError::AmbiguousConstructor { span, .. }
            | TypeError::TypeArity { span, .. }
            | TypeError::CallArg { span, .. }
            | TypeError::MissingEffect { span, .. }
            | TypeError::UndeclaredEffect { span, .. }
            | TypeError::ImpureArgument { span, .. }
            | TypeError::NotAFunctionReference { span, .. }
            | TypeError::NonExhaustiveMatch { span, .. }
            | TypeError::MixedMatchPatterns { span }
            | TypeError::Hole { span }
            | TypeError::UnknownField { span, .. }
            | TypeError::MissingField { span, .. }
            | TypeError::DuplicateField { span, .. }
            | TypeError::NoFields { span, .. }
            | TypeError::ContractParams { span, .. }
            | TypeError::ContractImpure { span, .. }
            | TypeError::ContractHole { span, .. }
            | TypeError::ContractUnknownFn { span, .. }
            | TypeError::HandlerInvalid { span, .. }
            | TypeError::ActorMessageUnion { span, .. }
            | TypeError::SchemaVersion { span, .. }
            | TypeError::DocSpec { span, .. }
            | TypeError::DuplicateTypeParam { span, .. } => *span,
        }
    }

    /// Convert to the CLI-facing diagnostic record.
    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        Diagnostic::new(self.to_string())
            .with_file(file)
            .with_optional_span(self.span())
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch { expected, found, context, .. } => {
                write!(f, "{}: expected `{}`, found `{}`", context, expected, found)
            }
            TypeError::ArityMismatch { expected, found, context, .. } => {
                write!(f, "{}: expected {} arguments, found {}", context, expected, found)
            }
            TypeError::RigidMismatch { label, found, context, .. } => {
                write!(
                    f,
                    "{}: type parameter `{}` cannot be `{}`",
                    context, label, found
                )
            }
            TypeError::InfiniteType { ty, context, .. } => {
                write!(f, "{}: infinite type `{}`", context, ty)
            }
            TypeError::UnknownVariable { name, .. } => {
                write!(f, "unknown variable `{}`", name)
            }
            TypeError::UnknownFunction { name, .. } => {
                write!(f, "unknown function `{}`", name)
            }
            TypeError::UnknownType { name, .. } => {
                write!(f, "unknown type `{}`", name)
            }
            TypeError::UnknownConstructor { name, .. } => {
                write!(f, "unknown constructor `{}`", name)
            }
            TypeError::AmbiguousConstructor { name, candidates, .. } => {
                write!(
                    f,
                    "ambiguous constructor `{}`: defined by [{}]",
                    name,
                    candidates.join(", ")
                )
            }
            TypeError::TypeArity { name, expected, found, .. } => {
                write!(
                    f,
                    "type `{}` expects {} type arguments, found {}",
                    name, expected, found
                )
            }
            TypeError::CallArg { callee, issue, .. } => {
                write!(f, "in call to `{}`: {}", callee, issue)
            }
            TypeError::MissingEffect { callee, effect, .. } => {
                write!(
                    f,
                    "calling `{}` requires effect `{}` which the caller does not declare",
                    callee, effect
                )
            }
            TypeError::UndeclaredEffect { name, .. } => {
                write!(f, "effect `{}` is not declared", name)
            }
            TypeError::ImpureArgument { callee, fn_name, effects, .. } => {
                write!(
                    f,
                    "`{}` passed to `{}` must be pure but declares effects [{}]",
                    fn_name,
                    callee,
                    effects.join(", ")
                )
            }
            TypeError::NotAFunctionReference { callee, .. } => {
                write!(
                    f,
                    "`{}` requires a bare function name as its function argument",
                    callee
                )
            }
            TypeError::NonExhaustiveMatch { ty, missing, .. } => {
                write!(
                    f,
                    "non-exhaustive match on `{}`: missing cases for {}",
                    ty,
                    missing.join(", ")
                )
            }
            TypeError::MixedMatchPatterns { .. } => {
                write!(f, "match patterns must be constructors of one sum type")
            }
            TypeError::Hole { .. } => write!(f, "unfilled hole"),
            TypeError::UnknownField { owner, field, .. } => {
                write!(f, "`{}` has no field `{}`", owner, field)
            }
            TypeError::MissingField { owner, field, .. } => {
                write!(f, "missing field `{}` in `{}`", field, owner)
            }
            TypeError::DuplicateField { owner, field, .. } => {
                write!(f, "field `{}` of `{}` supplied more than once", field, owner)
            }
            TypeError::NoFields { ty, .. } => {
                write!(f, "type `{}` has no fields", ty)
            }
            TypeError::ContractParams { fn_name, detail, .. } => {
                write!(f, "contract for `{}`: {}", fn_name, detail)
            }
            TypeError::ContractImpure { fn_name, callee, .. } => {
                write!(
                    f,
                    "contract for `{}` calls effectful `{}`; contract clauses must be pure",
                    fn_name, callee
                )
            }
            TypeError::ContractHole { fn_name, .. } => {
                write!(f, "contract for `{}` contains a hole", fn_name)
            }
            TypeError::ContractUnknownFn { fn_name, .. } => {
                write!(f, "contract names unknown function `{}`", fn_name)
            }
            TypeError::HandlerInvalid { actor, message, detail, .. } => {
                write!(f, "handler `{}` of actor `{}`: {}", message, actor, detail)
            }
            TypeError::ActorMessageUnion { actor, detail, .. } => {
                write!(f, "actor `{}`: {}", actor, detail)
            }
            TypeError::SchemaVersion { name, version, .. } => {
                write!(
                    f,
                    "schema `{}` version must be a positive integer, found {}",
                    name, version
                )
            }
            TypeError::DocSpec { decl, detail, .. } => {
                write!(f, "doc spec on `{}`: {}", decl, detail)
            }
            TypeError::DuplicateTypeParam { decl, name, .. } => {
                write!(f, "`{}` repeats type parameter `{}`", decl, name)
            }
        }
    }
}
