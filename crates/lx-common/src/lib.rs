//! Shared types for the Lx toolchain.
//!
//! This crate holds the pieces every other crate depends on:
//!
//! - [`span`]: source positions carried by AST nodes and diagnostics
//! - [`diag`]: the diagnostic record reported by every phase
//! - [`rng`]: the deterministic xorshift32 generator used for seeded
//!   property runs and scheduler reproducibility

pub mod diag;
pub mod rng;
pub mod span;

pub use diag::Diagnostic;
pub use rng::XorShift32;
pub use span::Span;
