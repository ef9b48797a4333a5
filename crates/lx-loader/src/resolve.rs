//! Identifier resolution.
//!
//! Maps bare and dotted names to fully qualified `module.Name` under the
//! current module's imports and aliases. The result is idempotent: feeding
//! a resolved name back in returns it unchanged. Callers report "unknown"
//! when an unresolvable name comes back as-is and is not a builtin.

use lx_ast::Module;

use crate::symbols::SymbolTable;

/// Resolve `ident` in the context of `module` against `symbols`.
///
/// Dotted names: the head segment is matched against import aliases, then
/// against the last segment of each imported module's path; otherwise the
/// name is treated as already qualified. Bare names: the current module is
/// tried first, then each import in order. Unmatched names are returned
/// unchanged.
pub fn resolve_identifier(ident: &str, module: &Module, symbols: &SymbolTable) -> String {
    match ident.split_once('.') {
        Some((head, rest)) => {
            for import in &module.imports {
                if import.alias.as_deref() == Some(head) {
                    let candidate = format!("{}.{}", import.path, rest);
                    if symbols.contains_qualified(&candidate) {
                        return candidate;
                    }
                }
            }
            for import in &module.imports {
                if import.alias.is_none() && import.tail_name() == head {
                    let candidate = format!("{}.{}", import.path, rest);
                    if symbols.contains_qualified(&candidate) {
                        return candidate;
                    }
                }
            }
            // Already qualified (or unknown; the caller decides).
            ident.to_string()
        }
        None => {
            let local = module.qualify(ident);
            if symbols.contains_qualified(&local) {
                return local;
            }
            for import in &module.imports {
                let candidate = format!("{}.{}", import.path, ident);
                if symbols.contains_qualified(&candidate) {
                    return candidate;
                }
            }
            ident.to_string()
        }
    }
}
