//! The Lx type checker: Hindley-Milner inference with effect tracking.
//!
//! Checks a loaded program in two passes. Pass 1 collects function
//! signatures (including synthetic actor signatures), the known effect
//! set, and the variant-constructor map; pass 2 checks every declaration
//! body: expressions, effect subsetting, match exhaustiveness, contracts,
//! properties, schemas, actor handlers, and doc specs. Errors accumulate
//! into a diagnostic list; nothing throws.
//!
//! # Architecture
//!
//! - [`ty`]: core type representation (`Ty`, `TyVar`, `Scheme`)
//! - [`unify`]: unification with occurs check and rigid variables
//! - [`convert`]: surface type expressions to internal types
//! - [`env`]: value environment with scope stack
//! - [`builtins`]: the builtin signature catalog (arity, parameter names,
//!   effects, schemes)
//! - [`exhaustive`]: match coverage checking
//! - [`docspec`]: `spec:` doc-comment validation
//! - [`check`]: the two-pass checker itself
//! - [`error`]: type error variants with context and spans

pub mod builtins;
pub mod check;
pub mod convert;
pub mod docspec;
pub mod env;
pub mod error;
pub mod exhaustive;
pub mod ty;
pub mod unify;

pub use check::check_program;
pub use error::TypeError;
pub use ty::{Scheme, Ty, TyVar};
pub use unify::InferCtx;
