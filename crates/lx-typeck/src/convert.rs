//! Conversion from surface type expressions to internal types.
//!
//! Type parameters are looked up in a [`TypeScope`] (rigid vars at a
//! definition site, flexible vars at a use site). Builtin scalars are
//! interned; `List`/`Option`/`ActorRef` demand one argument; user types
//! resolve through the symbol table, with aliases expanded in place.

use rustc_hash::FxHashMap;

use lx_ast::{Module, TypeExpr, TypeExprKind};
use lx_loader::{resolve_identifier, SymbolTable, TypeDef};

use crate::error::TypeError;
use crate::ty::Ty;
use crate::unify::InferCtx;

/// Alias expansion bound; past this the alias is assumed self-referential.
const MAX_ALIAS_DEPTH: u32 = 32;

/// Maps type parameter names to the variables standing in for them.
#[derive(Debug, Default, Clone)]
pub struct TypeScope {
    map: FxHashMap<String, Ty>,
}

impl TypeScope {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A scope binding each type parameter to a rigid variable
    /// (definition sites).
    pub fn rigid(ctx: &mut InferCtx, params: &[String]) -> Self {
        let mut scope = Self::empty();
        for p in params {
            let var = ctx.fresh_rigid(p);
            scope.map.insert(p.clone(), var);
        }
        scope
    }

    /// A scope binding each type parameter to a fresh flexible variable
    /// (use sites).
    pub fn flexible(ctx: &mut InferCtx, params: &[String]) -> Self {
        let mut scope = Self::empty();
        for p in params {
            let var = ctx.fresh_var();
            scope.map.insert(p.clone(), var);
        }
        scope
    }

    /// A scope binding type parameters to given types (alias expansion,
    /// field-type substitution).
    pub fn bound(params: &[String], args: &[Ty]) -> Self {
        let mut scope = Self::empty();
        for (p, a) in params.iter().zip(args.iter()) {
            scope.map.insert(p.clone(), a.clone());
        }
        scope
    }

    pub fn get(&self, name: &str) -> Option<&Ty> {
        self.map.get(name)
    }

    /// Bound variables in binding order (for synthetic signatures).
    pub fn var_for(&self, name: &str) -> Option<Ty> {
        self.map.get(name).cloned()
    }
}

/// Convert a type expression in the context of `module`.
pub fn convert_type_expr(
    ctx: &mut InferCtx,
    te: &TypeExpr,
    scope: &TypeScope,
    module: &Module,
    symbols: &SymbolTable,
) -> Ty {
    convert_inner(ctx, te, scope, None, module, symbols, 0)
}

/// Convert a type expression whose names may belong to `owner` (the
/// qualified module that declared the surrounding type), falling back to
/// the current module's imports. Used for alias targets and field types.
pub fn convert_with_owner(
    ctx: &mut InferCtx,
    te: &TypeExpr,
    scope: &TypeScope,
    owner: Option<&str>,
    module: &Module,
    symbols: &SymbolTable,
) -> Ty {
    convert_inner(ctx, te, scope, owner, module, symbols, 0)
}

fn convert_inner(
    ctx: &mut InferCtx,
    te: &TypeExpr,
    scope: &TypeScope,
    owner: Option<&str>,
    module: &Module,
    symbols: &SymbolTable,
    depth: u32,
) -> Ty {
    match &te.kind {
        TypeExprKind::Optional { inner } => {
            let inner = convert_inner(ctx, inner, scope, owner, module, symbols, depth);
            Ty::option(inner)
        }
        TypeExprKind::Fn { params, ret } => {
            let params = params
                .iter()
                .map(|p| convert_inner(ctx, p, scope, owner, module, symbols, depth))
                .collect();
            let ret = convert_inner(ctx, ret, scope, owner, module, symbols, depth);
            Ty::fun(params, ret)
        }
        TypeExprKind::Name { name, args } => {
            convert_name(ctx, te, name, args, scope, owner, module, symbols, depth)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn convert_name(
    ctx: &mut InferCtx,
    te: &TypeExpr,
    name: &str,
    args: &[TypeExpr],
    scope: &TypeScope,
    owner: Option<&str>,
    module: &Module,
    symbols: &SymbolTable,
    depth: u32,
) -> Ty {
    // Type parameters shadow everything and take no arguments.
    if let Some(bound) = scope.get(name) {
        if !args.is_empty() {
            ctx.record(TypeError::TypeArity {
                name: name.to_string(),
                expected: 0,
                found: args.len(),
                span: te.span,
            });
        }
        return bound.clone();
    }

    let arity = |ctx: &mut InferCtx, expected: usize| -> bool {
        if args.len() != expected {
            ctx.record(TypeError::TypeArity {
                name: name.to_string(),
                expected,
                found: args.len(),
                span: te.span,
            });
            return false;
        }
        true
    };

    match name {
        "Int" | "Bool" | "String" | "Unit" => {
            if !arity(ctx, 0) {
                return ctx.fresh_var();
            }
            Ty::con(name)
        }
        "List" | "Option" | "ActorRef" => {
            if !arity(ctx, 1) {
                return ctx.fresh_var();
            }
            let inner = convert_inner(ctx, &args[0], scope, owner, module, symbols, depth);
            Ty::app(name, vec![inner])
        }
        "Pair" => {
            if !arity(ctx, 2) {
                return ctx.fresh_var();
            }
            let first = convert_inner(ctx, &args[0], scope, owner, module, symbols, depth);
            let second = convert_inner(ctx, &args[1], scope, owner, module, symbols, depth);
            Ty::pair(first, second)
        }
        _ => {
            let Some(qualified) = resolve_type_name(name, owner, module, symbols) else {
                ctx.record(TypeError::UnknownType {
                    name: name.to_string(),
                    span: te.span,
                });
                return ctx.fresh_var();
            };
            let def = symbols.types.get(&qualified).cloned().expect("resolved name is indexed");
            if args.len() != def.type_params().len() {
                ctx.record(TypeError::TypeArity {
                    name: qualified,
                    expected: def.type_params().len(),
                    found: args.len(),
                    span: te.span,
                });
                return ctx.fresh_var();
            }
            let converted: Vec<Ty> = args
                .iter()
                .map(|a| convert_inner(ctx, a, scope, owner, module, symbols, depth))
                .collect();
            match def {
                TypeDef::Alias(alias) => {
                    if depth >= MAX_ALIAS_DEPTH {
                        ctx.record(TypeError::UnknownType {
                            name: format!("{} (alias expansion too deep)", qualified),
                            span: te.span,
                        });
                        return ctx.fresh_var();
                    }
                    let inner_scope = TypeScope::bound(&alias.type_params, &converted);
                    let alias_owner = owning_module(&qualified);
                    convert_inner(
                        ctx,
                        &alias.target,
                        &inner_scope,
                        alias_owner.as_deref(),
                        module,
                        symbols,
                        depth + 1,
                    )
                }
                TypeDef::Record(_) | TypeDef::Sum(_) => Ty::Con {
                    name: qualified,
                    args: converted,
                },
            }
        }
    }
}

/// Resolve a type name: as already-qualified, relative to the owning
/// module, then through the current module's imports.
fn resolve_type_name(
    name: &str,
    owner: Option<&str>,
    module: &Module,
    symbols: &SymbolTable,
) -> Option<String> {
    if symbols.types.contains_key(name) {
        return Some(name.to_string());
    }
    if let Some(owner) = owner {
        let qualified = format!("{}.{}", owner, name);
        if symbols.types.contains_key(&qualified) {
            return Some(qualified);
        }
    }
    let resolved = resolve_identifier(name, module, symbols);
    if symbols.types.contains_key(&resolved) {
        return Some(resolved);
    }
    None
}

/// The module part of a qualified declaration name.
pub fn owning_module(qualified: &str) -> Option<String> {
    qualified.rsplit_once('.').map(|(module, _)| module.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lx_ast::{Decl, RecordDecl, SumDecl, TypeAliasDecl, Variant};

    fn module_with(decls: Vec<Decl>) -> (Module, SymbolTable) {
        let module = Module {
            name: "app".into(),
            imports: vec![],
            decls,
            doc: None,
            source: None,
        };
        let mut symbols = SymbolTable::new();
        symbols.index_module(&module, "app.lx").unwrap();
        (module, symbols)
    }

    fn name(n: &str, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::new(TypeExprKind::Name { name: n.into(), args })
    }

    #[test]
    fn scalars_and_containers() {
        let (module, symbols) = module_with(vec![]);
        let mut ctx = InferCtx::new();
        let scope = TypeScope::empty();

        let t = convert_type_expr(&mut ctx, &name("Int", vec![]), &scope, &module, &symbols);
        assert_eq!(t, Ty::int());

        let t = convert_type_expr(
            &mut ctx,
            &name("List", vec![name("String", vec![])]),
            &scope,
            &module,
            &symbols,
        );
        assert_eq!(t, Ty::list(Ty::string()));
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn optional_sugar_is_option() {
        let (module, symbols) = module_with(vec![]);
        let mut ctx = InferCtx::new();
        let te = TypeExpr::new(TypeExprKind::Optional {
            inner: Box::new(name("Int", vec![])),
        });
        let t = convert_type_expr(&mut ctx, &te, &TypeScope::empty(), &module, &symbols);
        assert_eq!(t, Ty::option(Ty::int()));
    }

    #[test]
    fn list_arity_is_checked() {
        let (module, symbols) = module_with(vec![]);
        let mut ctx = InferCtx::new();
        convert_type_expr(&mut ctx, &name("List", vec![]), &TypeScope::empty(), &module, &symbols);
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].to_string().contains("expects 1 type arguments"));
    }

    #[test]
    fn user_record_becomes_qualified_con() {
        let (module, symbols) = module_with(vec![Decl::Record(RecordDecl {
            name: "Point".into(),
            type_params: vec![],
            fields: vec![],
            doc: None,
            span: None,
        })]);
        let mut ctx = InferCtx::new();
        let t = convert_type_expr(&mut ctx, &name("Point", vec![]), &TypeScope::empty(), &module, &symbols);
        assert_eq!(t, Ty::con("app.Point"));
    }

    #[test]
    fn alias_expands_with_substitution() {
        let (module, symbols) = module_with(vec![Decl::Alias(TypeAliasDecl {
            name: "Row".into(),
            type_params: vec!["T".into()],
            target: name("List", vec![name("T", vec![])]),
            doc: None,
            span: None,
        })]);
        let mut ctx = InferCtx::new();
        let t = convert_type_expr(
            &mut ctx,
            &name("Row", vec![name("Int", vec![])]),
            &TypeScope::empty(),
            &module,
            &symbols,
        );
        assert_eq!(t, Ty::list(Ty::int()));
    }

    #[test]
    fn self_referential_alias_is_reported() {
        let (module, symbols) = module_with(vec![Decl::Alias(TypeAliasDecl {
            name: "Loop".into(),
            type_params: vec![],
            target: name("Loop", vec![]),
            doc: None,
            span: None,
        })]);
        let mut ctx = InferCtx::new();
        convert_type_expr(&mut ctx, &name("Loop", vec![]), &TypeScope::empty(), &module, &symbols);
        assert!(!ctx.errors.is_empty());
    }

    #[test]
    fn type_params_shadow_types() {
        let (module, symbols) = module_with(vec![Decl::Sum(SumDecl {
            name: "T".into(),
            type_params: vec![],
            variants: vec![Variant { name: "V".into(), fields: vec![], span: None }],
            doc: None,
            span: None,
        })]);
        let mut ctx = InferCtx::new();
        let scope = TypeScope::rigid(&mut ctx, &["T".to_string()]);
        let t = convert_type_expr(&mut ctx, &name("T", vec![]), &scope, &module, &symbols);
        assert!(matches!(t, Ty::Var(_)), "type param should win: {}", t);
    }

    #[test]
    fn unknown_type_yields_fresh_var_and_error() {
        let (module, symbols) = module_with(vec![]);
        let mut ctx = InferCtx::new();
        let t = convert_type_expr(&mut ctx, &name("Ghost", vec![]), &TypeScope::empty(), &module, &symbols);
        assert!(matches!(t, Ty::Var(_)));
        assert!(ctx.errors[0].to_string().contains("unknown type `Ghost`"));
    }
}
