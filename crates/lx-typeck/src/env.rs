//! Type environment with scope stack.
//!
//! Maps variable names to types. Entering a function body, match arm, or
//! branch pushes a frame; leaving pops it. Lookup searches innermost-out.

use rustc_hash::FxHashMap;

use crate::ty::Ty;

/// A stack of scopes mapping names to types.
pub struct TypeEnv {
    scopes: Vec<FxHashMap<String, Ty>>,
}

impl TypeEnv {
    /// A new environment with one empty scope.
    pub fn new() -> Self {
        TypeEnv {
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// # Panics
    ///
    /// Panics if only the outermost scope remains.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the outermost scope");
        self.scopes.pop();
    }

    /// Bind a name in the current scope.
    pub fn insert(&mut self, name: impl Into<String>, ty: Ty) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.into(), ty);
    }

    /// Look up a name, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Ty> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}
