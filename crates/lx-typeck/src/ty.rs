//! Type representation for the Lx type system.
//!
//! Defines the core `Ty` enum, type variables, and polymorphic schemes for
//! builtin signatures. These form the foundation of Hindley-Milner
//! inference; the `ena` crate handles the union-find mechanics.

use std::fmt;

/// A type variable, identified by a `u32` index into the unification table.
///
/// Whether a variable is rigid (an explicit type parameter, unifiable only
/// with itself) is tracked by the inference context, not the variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyVar(pub u32);

/// An Lx type.
///
/// - `Var`: an inference variable (resolved by unification)
/// - `Con`: a constructor applied to arguments -- `Int`, `List<Int>`,
///   `Option<T>`, `ActorRef<Msg>`, or a user type by qualified name
/// - `Fun`: a function type `(params) -> return`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Var(TyVar),
    Con { name: String, args: Vec<Ty> },
    Fun(Vec<Ty>, Box<Ty>),
}

impl Ty {
    pub fn int() -> Ty {
        Ty::con("Int")
    }

    pub fn bool() -> Ty {
        Ty::con("Bool")
    }

    pub fn string() -> Ty {
        Ty::con("String")
    }

    pub fn unit() -> Ty {
        Ty::con("Unit")
    }

    /// A nullary constructor.
    pub fn con(name: impl Into<String>) -> Ty {
        Ty::Con { name: name.into(), args: vec![] }
    }

    /// A constructor applied to arguments.
    pub fn app(name: impl Into<String>, args: Vec<Ty>) -> Ty {
        Ty::Con { name: name.into(), args }
    }

    pub fn list(inner: Ty) -> Ty {
        Ty::app("List", vec![inner])
    }

    pub fn option(inner: Ty) -> Ty {
        Ty::app("Option", vec![inner])
    }

    /// `ActorRef<Msg>` -- names an actor whose handlers accept `Msg`.
    pub fn actor_ref(msg: Ty) -> Ty {
        Ty::app("ActorRef", vec![msg])
    }

    pub fn pair(first: Ty, second: Ty) -> Ty {
        Ty::app("Pair", vec![first, second])
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fun(params, Box::new(ret))
    }

    /// Whether this is the given nullary constructor.
    pub fn is_con(&self, name: &str) -> bool {
        matches!(self, Ty::Con { name: n, args } if n == name && args.is_empty())
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Con { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Fun(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
        }
    }
}

/// A polymorphic type scheme for builtin signatures.
///
/// Quantified variables use small local ids (0, 1, ...) that are replaced
/// with fresh inference variables at every call site; they never index the
/// unification table directly.
#[derive(Clone, Debug)]
pub struct Scheme {
    pub vars: Vec<TyVar>,
    pub ty: Ty,
}

impl Scheme {
    /// A monomorphic scheme.
    pub fn mono(ty: Ty) -> Self {
        Scheme { vars: Vec::new(), ty }
    }

    /// Quantify over the first `n` local variable ids.
    pub fn poly(n: u32, ty: Ty) -> Self {
        Scheme { vars: (0..n).map(TyVar).collect(), ty }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}
