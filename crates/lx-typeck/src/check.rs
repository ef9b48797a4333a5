//! The two-pass type checker.
//!
//! Pass 1 collects function signatures, synthetic actor signatures, the
//! known effect set, and the variant-constructor map. Pass 2 checks every
//! declaration body. Errors never abort: they accumulate per declaration
//! and come back as a list of diagnostics.

use std::collections::BTreeSet;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use lx_ast::{
    ActorDecl, Arg, BinOp, Block, ContractDecl, Decl, Expr, ExprKind, FnDecl, Handler, MatchCase,
    Module, Param, Pattern, PatternKind, PropertyDecl, RecordDecl, SchemaDecl, Stmt, StmtKind,
    SumDecl, TypeExpr, Variant, CHILD_FAILED,
};
use lx_ast::align::align_args;
use lx_common::{Diagnostic, Span};
use lx_loader::{resolve_identifier, Program, SymbolTable, TypeDef};

use crate::builtins;
use crate::convert::{convert_type_expr, convert_with_owner, owning_module, TypeScope};
use crate::docspec;
use crate::env::TypeEnv;
use crate::error::TypeError;
use crate::exhaustive::{check_coverage, Coverage};
use crate::ty::Ty;
use crate::unify::InferCtx;

/// Type-check every module of a loaded program. Returns all diagnostics,
/// in module order; an empty list means the program is well-typed.
pub fn check_program(program: &Program) -> Vec<Diagnostic> {
    let (checker, mut diagnostics) = Checker::new(program);
    diagnostics.extend(checker.check_bodies());
    diagnostics
}

/// A function signature entry: the declaration plus its defining module
/// (type names in the signature resolve relative to the latter).
struct FnEntry {
    decl: Rc<FnDecl>,
    module_idx: usize,
}

/// An actor entry with its computed message union (the qualified sum type
/// all handler message constructors belong to).
struct ActorEntry {
    decl: Rc<ActorDecl>,
    module_idx: usize,
    msg_union: Option<String>,
}

/// Everything a constructor lookup needs to know.
struct VariantInfo {
    /// Qualified parent sum name (or `Option`).
    parent: String,
    parent_params: Vec<String>,
    fields: Vec<Param>,
    /// All variant names of the parent, for exhaustiveness.
    variants: Vec<String>,
    /// Module owning the parent type, for field-type resolution.
    owner_module: Option<String>,
}

enum VariantLookup {
    Found(VariantInfo),
    Unknown,
    Ambiguous(Vec<String>),
}

pub struct Checker<'a> {
    program: &'a Program,
    fn_sigs: FxHashMap<String, FnEntry>,
    actors: FxHashMap<String, ActorEntry>,
    known_effects: FxHashSet<String>,
    /// Bare constructor name -> qualified sum types defining it.
    variant_owners: FxHashMap<String, Vec<String>>,
    /// The builtin `Option<T>` sum, so `Some`/`None` work everywhere.
    option_decl: Rc<SumDecl>,
    /// The builtin `Pair<A, B>` record produced by `list.zip`/`enumerate`.
    pair_decl: Rc<RecordDecl>,
}

impl<'a> Checker<'a> {
    /// Pass 1: collect signatures and indexes. Returns the checker plus
    /// any pass-1 diagnostics (actor message-union problems).
    pub fn new(program: &'a Program) -> (Self, Vec<Diagnostic>) {
        let mut checker = Checker {
            program,
            fn_sigs: FxHashMap::default(),
            actors: FxHashMap::default(),
            known_effects: builtins::BASELINE_EFFECTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            variant_owners: FxHashMap::default(),
            option_decl: Rc::new(builtin_option_decl()),
            pair_decl: Rc::new(builtin_pair_decl()),
        };
        checker
            .variant_owners
            .insert("Some".into(), vec!["Option".into()]);
        checker
            .variant_owners
            .insert("None".into(), vec!["Option".into()]);

        for (idx, loaded) in program.modules.iter().enumerate() {
            let module = &loaded.module;
            for decl in &module.decls {
                match decl {
                    Decl::Fn(d) => {
                        checker.fn_sigs.insert(
                            module.qualify(&d.name),
                            FnEntry { decl: Rc::new(d.clone()), module_idx: idx },
                        );
                    }
                    Decl::Sum(d) => {
                        let qualified = module.qualify(&d.name);
                        for variant in &d.variants {
                            checker
                                .variant_owners
                                .entry(variant.name.clone())
                                .or_default()
                                .push(qualified.clone());
                        }
                    }
                    Decl::Effect(d) => {
                        checker.known_effects.insert(d.name.clone());
                    }
                    Decl::Actor(d) => {
                        checker.actors.insert(
                            module.qualify(&d.name),
                            ActorEntry {
                                decl: Rc::new(d.clone()),
                                module_idx: idx,
                                msg_union: None,
                            },
                        );
                    }
                    _ => {}
                }
            }
        }

        let diagnostics = checker.compute_actor_unions();
        (checker, diagnostics)
    }

    fn symbols(&self) -> &SymbolTable {
        &self.program.symbols
    }

    fn module_at(&self, idx: usize) -> &Module {
        &self.program.modules[idx].module
    }

    fn file_at(&self, idx: usize) -> String {
        self.program.modules[idx].path.display().to_string()
    }

    /// Resolve each actor's message union from its handlers.
    fn compute_actor_unions(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let names: Vec<String> = self.actors.keys().cloned().collect();
        for name in names {
            let (decl, module_idx) = {
                let entry = &self.actors[&name];
                (Rc::clone(&entry.decl), entry.module_idx)
            };
            let file = self.file_at(module_idx);
            let mut union: Option<String> = None;
            let mut failed = false;

            let handlers: Vec<&Handler> = decl
                .handlers
                .iter()
                .filter(|h| h.message != CHILD_FAILED)
                .collect();
            if handlers.is_empty() {
                diagnostics.push(
                    TypeError::ActorMessageUnion {
                        actor: name.clone(),
                        detail: "declares no message handlers".into(),
                        span: decl.span,
                    }
                    .to_diagnostic(&file),
                );
                failed = true;
            }
            for handler in handlers {
                let parent = match self.variant_lookup(&handler.message) {
                    VariantLookup::Found(info) => info,
                    VariantLookup::Unknown => {
                        diagnostics.push(
                            TypeError::ActorMessageUnion {
                                actor: name.clone(),
                                detail: format!(
                                    "unknown message constructor `{}`",
                                    handler.message
                                ),
                                span: handler.span,
                            }
                            .to_diagnostic(&file),
                        );
                        failed = true;
                        continue;
                    }
                    VariantLookup::Ambiguous(candidates) => {
                        diagnostics.push(
                            TypeError::AmbiguousConstructor {
                                name: handler.message.clone(),
                                candidates,
                                span: handler.span,
                            }
                            .to_diagnostic(&file),
                        );
                        failed = true;
                        continue;
                    }
                };
                if !parent.parent_params.is_empty() {
                    diagnostics.push(
                        TypeError::ActorMessageUnion {
                            actor: name.clone(),
                            detail: format!(
                                "message type `{}` cannot be generic",
                                parent.parent
                            ),
                            span: handler.span,
                        }
                        .to_diagnostic(&file),
                    );
                    failed = true;
                    continue;
                }
                match &union {
                    None => union = Some(parent.parent),
                    Some(existing) if *existing != parent.parent => {
                        diagnostics.push(
                            TypeError::ActorMessageUnion {
                                actor: name.clone(),
                                detail: format!(
                                    "handlers mix message types `{}` and `{}`",
                                    existing, parent.parent
                                ),
                                span: handler.span,
                            }
                            .to_diagnostic(&file),
                        );
                        failed = true;
                    }
                    Some(_) => {}
                }
            }

            if !failed {
                self.actors.get_mut(&name).expect("actor was indexed").msg_union = union;
            }
        }
        diagnostics
    }

    /// Look up a bare constructor name.
    fn variant_lookup(&self, name: &str) -> VariantLookup {
        let Some(owners) = self.variant_owners.get(name) else {
            return VariantLookup::Unknown;
        };
        if owners.len() > 1 {
            return VariantLookup::Ambiguous(owners.clone());
        }
        let parent = &owners[0];
        if parent == "Option" {
            let d = &self.option_decl;
            let variant = d.variants.iter().find(|v| v.name == name).expect("Option variant");
            return VariantLookup::Found(VariantInfo {
                parent: "Option".into(),
                parent_params: d.type_params.clone(),
                fields: variant.fields.clone(),
                variants: d.variants.iter().map(|v| v.name.clone()).collect(),
                owner_module: None,
            });
        }
        let Some(TypeDef::Sum(sum)) = self.symbols().types.get(parent) else {
            return VariantLookup::Unknown;
        };
        let variant = sum
            .variants
            .iter()
            .find(|v| v.name == name)
            .expect("owner sum defines the variant");
        VariantLookup::Found(VariantInfo {
            parent: parent.clone(),
            parent_params: sum.type_params.clone(),
            fields: variant.fields.clone(),
            variants: sum.variants.iter().map(|v| v.name.clone()).collect(),
            owner_module: owning_module(parent),
        })
    }

    /// Look up a record type for construction or field access.
    fn record_lookup(&self, name: &str, module: &Module) -> Option<(String, Rc<RecordDecl>)> {
        if name == "Pair" {
            return Some(("Pair".into(), Rc::clone(&self.pair_decl)));
        }
        let resolved = if self.symbols().types.contains_key(name) {
            name.to_string()
        } else {
            resolve_identifier(name, module, self.symbols())
        };
        match self.symbols().types.get(&resolved) {
            Some(TypeDef::Record(r)) => Some((resolved, Rc::clone(r))),
            _ => None,
        }
    }

    /// Pass 2: check every declaration body.
    pub fn check_bodies(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (idx, loaded) in self.program.modules.iter().enumerate() {
            let module = &loaded.module;
            let file = loaded.path.display().to_string();
            for decl in &module.decls {
                let errors = self.check_decl(decl, module, idx);
                diagnostics.extend(errors.iter().map(|e| e.to_diagnostic(&file)));
                self.check_doc_spec(decl, &mut diagnostics, &file);
            }
        }
        diagnostics
    }

    fn check_decl(&self, decl: &Decl, module: &Module, module_idx: usize) -> Vec<TypeError> {
        match decl {
            Decl::Fn(d) => self.check_fn(d, module, module_idx),
            Decl::Contract(d) => self.check_contract(d, module, module_idx),
            Decl::Test(d) => self.check_test_body(&d.body, module, module_idx),
            Decl::Property(d) => self.check_property(d, module, module_idx),
            Decl::Schema(d) => self.check_schema(d, module),
            Decl::Record(d) => self.check_record_decl(d, module),
            Decl::Sum(d) => self.check_sum_decl(d, module),
            Decl::Alias(d) => {
                let mut ctx = InferCtx::new();
                check_unique_type_params(&mut ctx, &d.name, &d.type_params, d.span);
                let scope = TypeScope::rigid(&mut ctx, &d.type_params);
                convert_type_expr(&mut ctx, &d.target, &scope, module, self.symbols());
                ctx.errors
            }
            Decl::Actor(d) => self.check_actor(d, module, module_idx),
            Decl::Effect(_) => Vec::new(),
        }
    }

    // ── Functions ───────────────────────────────────────────────────────

    fn check_fn(&self, decl: &FnDecl, module: &Module, module_idx: usize) -> Vec<TypeError> {
        let mut ctx = InferCtx::new();
        check_unique_type_params(&mut ctx, &decl.name, &decl.type_params, decl.span);
        let scope = TypeScope::rigid(&mut ctx, &decl.type_params);

        let mut env = TypeEnv::new();
        for param in &decl.params {
            let ty = convert_type_expr(&mut ctx, &param.ty, &scope, module, self.symbols());
            env.insert(param.name.clone(), ty);
        }
        let expected_return =
            convert_type_expr(&mut ctx, &decl.return_type, &scope, module, self.symbols());

        let effects = self.effect_set(&decl.effects, decl.span, &mut ctx);

        let mut body = BodyCtx {
            checker: self,
            ctx,
            env,
            scope,
            module,
            module_idx,
            expected_return,
            effects,
        };
        body.check_fn_body(&decl.body, &format!("body of `{}`", decl.name), decl.span);
        body.ctx.errors
    }

    /// Validate declared effect names and build the effect set.
    fn effect_set(
        &self,
        declared: &[String],
        span: Option<Span>,
        ctx: &mut InferCtx,
    ) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for name in declared {
            if !self.known_effects.contains(name) {
                ctx.record(TypeError::UndeclaredEffect { name: name.clone(), span });
            }
            set.insert(name.clone());
        }
        set
    }

    /// Tests and properties may exercise anything, so their bodies check
    /// under the full known effect set.
    fn all_effects(&self) -> BTreeSet<String> {
        self.known_effects.iter().cloned().collect()
    }

    fn check_test_body(&self, body_block: &Block, module: &Module, module_idx: usize) -> Vec<TypeError> {
        let mut body = BodyCtx {
            checker: self,
            ctx: InferCtx::new(),
            env: TypeEnv::new(),
            scope: TypeScope::empty(),
            module,
            module_idx,
            expected_return: Ty::unit(),
            effects: self.all_effects(),
        };
        let ty = body.check_block(body_block);
        let _ = body
            .ctx
            .unify(ty, Ty::unit(), "test body must produce Unit", None);
        body.ctx.errors
    }

    fn check_property(&self, decl: &PropertyDecl, module: &Module, module_idx: usize) -> Vec<TypeError> {
        let mut body = BodyCtx {
            checker: self,
            ctx: InferCtx::new(),
            env: TypeEnv::new(),
            scope: TypeScope::empty(),
            module,
            module_idx,
            expected_return: Ty::unit(),
            effects: self.all_effects(),
        };
        for param in &decl.params {
            let ty = convert_type_expr(
                &mut body.ctx,
                &param.ty,
                &TypeScope::empty(),
                module,
                self.symbols(),
            );
            body.env.insert(param.name.clone(), ty);
            if let Some(predicate) = &param.predicate {
                let pred_ty = body.check_expr(predicate);
                let _ = body.ctx.unify(
                    pred_ty,
                    Ty::bool(),
                    &format!("predicate of `{}`", param.name),
                    predicate.span,
                );
            }
        }
        let ty = body.check_block(&decl.body);
        let _ = body
            .ctx
            .unify(ty, Ty::unit(), "property body must produce Unit", None);
        body.ctx.errors
    }

    fn check_schema(&self, decl: &SchemaDecl, module: &Module) -> Vec<TypeError> {
        let mut ctx = InferCtx::new();
        if decl.version == 0 {
            ctx.record(TypeError::SchemaVersion {
                name: decl.name.clone(),
                version: decl.version,
                span: decl.span,
            });
        }
        for field in &decl.fields {
            convert_type_expr(&mut ctx, &field.ty, &TypeScope::empty(), module, self.symbols());
        }
        ctx.errors
    }

    fn check_record_decl(&self, decl: &RecordDecl, module: &Module) -> Vec<TypeError> {
        let mut ctx = InferCtx::new();
        check_unique_type_params(&mut ctx, &decl.name, &decl.type_params, decl.span);
        let scope = TypeScope::rigid(&mut ctx, &decl.type_params);
        for field in &decl.fields {
            convert_type_expr(&mut ctx, &field.ty, &scope, module, self.symbols());
        }
        ctx.errors
    }

    fn check_sum_decl(&self, decl: &SumDecl, module: &Module) -> Vec<TypeError> {
        let mut ctx = InferCtx::new();
        check_unique_type_params(&mut ctx, &decl.name, &decl.type_params, decl.span);
        let scope = TypeScope::rigid(&mut ctx, &decl.type_params);
        for variant in &decl.variants {
            for field in &variant.fields {
                convert_type_expr(&mut ctx, &field.ty, &scope, module, self.symbols());
            }
        }
        ctx.errors
    }

    // ── Contracts ───────────────────────────────────────────────────────

    fn check_contract(&self, decl: &ContractDecl, module: &Module, module_idx: usize) -> Vec<TypeError> {
        let mut ctx = InferCtx::new();

        let resolved = resolve_identifier(&decl.fn_name, module, self.symbols());
        let Some(entry) = self.fn_sigs.get(&resolved) else {
            ctx.record(TypeError::ContractUnknownFn {
                fn_name: decl.fn_name.clone(),
                span: decl.span,
            });
            return ctx.errors;
        };
        let target = &entry.decl;

        let target_names: Vec<&str> = target.params.iter().map(|p| p.name.as_str()).collect();
        let contract_names: Vec<&str> = decl.params.iter().map(String::as_str).collect();
        if target_names != contract_names {
            ctx.record(TypeError::ContractParams {
                fn_name: decl.fn_name.clone(),
                detail: format!(
                    "parameters [{}] do not match the function's [{}]",
                    contract_names.join(", "),
                    target_names.join(", ")
                ),
                span: decl.span,
            });
        }

        // Clause environments see the target's parameters; `ensures`
        // additionally sees `result`.
        let scope = TypeScope::rigid(&mut ctx, &target.type_params);
        let target_module = self.module_at(entry.module_idx);
        let mut env = TypeEnv::new();
        for param in &target.params {
            let ty = convert_type_expr(&mut ctx, &param.ty, &scope, target_module, self.symbols());
            env.insert(param.name.clone(), ty);
        }
        let result_ty =
            convert_type_expr(&mut ctx, &target.return_type, &scope, target_module, self.symbols());

        let mut body = BodyCtx {
            checker: self,
            ctx,
            env,
            scope,
            module,
            module_idx,
            expected_return: Ty::bool(),
            effects: BTreeSet::new(),
        };

        for clause in &decl.requires {
            self.check_contract_clause(&mut body, clause, &decl.fn_name, "requires");
        }
        body.env.push_scope();
        body.env.insert("result", result_ty);
        for clause in &decl.ensures {
            self.check_contract_clause(&mut body, clause, &decl.fn_name, "ensures");
        }
        body.env.pop_scope();
        body.ctx.errors
    }

    fn check_contract_clause(
        &self,
        body: &mut BodyCtx<'_, 'a>,
        clause: &Expr,
        fn_name: &str,
        kind: &str,
    ) {
        let mut purity_errors = Vec::new();
        self.contract_purity_walk(clause, fn_name, body.module, &mut purity_errors);
        for err in purity_errors {
            body.ctx.record(err);
        }
        let ty = body.check_expr(clause);
        let _ = body.ctx.unify(
            ty,
            Ty::bool(),
            &format!("`{}` clause of contract for `{}`", kind, fn_name),
            clause.span,
        );
    }

    /// Reject calls to anything effectful (and holes) inside a contract
    /// clause.
    fn contract_purity_walk(
        &self,
        expr: &Expr,
        fn_name: &str,
        module: &Module,
        errors: &mut Vec<TypeError>,
    ) {
        match &expr.kind {
            ExprKind::Hole => {
                errors.push(TypeError::ContractHole {
                    fn_name: fn_name.to_string(),
                    span: expr.span,
                });
            }
            ExprKind::Call { callee, args } => {
                let impure = if let Some(sig) = builtins::lookup(callee) {
                    !sig.effects.is_empty()
                } else if callee.ends_with(".send") {
                    true
                } else if let Some((head, _)) = callee.rsplit_once('.') {
                    let resolved = resolve_identifier(head, module, self.symbols());
                    self.actors.contains_key(&resolved)
                } else {
                    let resolved = resolve_identifier(callee, module, self.symbols());
                    self.fn_sigs
                        .get(&resolved)
                        .map(|entry| !entry.decl.effects.is_empty())
                        .unwrap_or(false)
                };
                if impure {
                    errors.push(TypeError::ContractImpure {
                        fn_name: fn_name.to_string(),
                        callee: callee.clone(),
                        span: expr.span,
                    });
                }
                for arg in args {
                    self.contract_purity_walk(&arg.value, fn_name, module, errors);
                }
            }
            ExprKind::List { items } => {
                for item in items {
                    self.contract_purity_walk(item, fn_name, module, errors);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.contract_purity_walk(lhs, fn_name, module, errors);
                self.contract_purity_walk(rhs, fn_name, module, errors);
            }
            ExprKind::Record { fields, .. } => {
                for field in fields {
                    self.contract_purity_walk(&field.value, fn_name, module, errors);
                }
            }
            ExprKind::Field { target, .. } => {
                self.contract_purity_walk(target, fn_name, module, errors);
            }
            ExprKind::Index { target, index } => {
                self.contract_purity_walk(target, fn_name, module, errors);
                self.contract_purity_walk(index, fn_name, module, errors);
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                self.contract_purity_walk(cond, fn_name, module, errors);
                for block in [Some(then_branch), else_branch.as_ref()].into_iter().flatten() {
                    for stmt in block {
                        self.contract_purity_walk_stmt(stmt, fn_name, module, errors);
                    }
                }
            }
            ExprKind::Match { scrutinee, cases } => {
                self.contract_purity_walk(scrutinee, fn_name, module, errors);
                for case in cases {
                    for stmt in &case.body {
                        self.contract_purity_walk_stmt(stmt, fn_name, module, errors);
                    }
                }
            }
            ExprKind::Int { .. }
            | ExprKind::Bool { .. }
            | ExprKind::Str { .. }
            | ExprKind::Var { .. } => {}
        }
    }

    fn contract_purity_walk_stmt(
        &self,
        stmt: &Stmt,
        fn_name: &str,
        module: &Module,
        errors: &mut Vec<TypeError>,
    ) {
        match &stmt.kind {
            StmtKind::Let { value, .. } => {
                self.contract_purity_walk(value, fn_name, module, errors)
            }
            StmtKind::Return { value } => {
                if let Some(v) = value {
                    self.contract_purity_walk(v, fn_name, module, errors);
                }
            }
            StmtKind::Expr { value } => self.contract_purity_walk(value, fn_name, module, errors),
            StmtKind::Match { scrutinee, cases } => {
                self.contract_purity_walk(scrutinee, fn_name, module, errors);
                for case in cases {
                    for s in &case.body {
                        self.contract_purity_walk_stmt(s, fn_name, module, errors);
                    }
                }
            }
            StmtKind::AsyncGroup { body } | StmtKind::Async { body } => {
                // Async constructs are Concurrent by construction.
                errors.push(TypeError::ContractImpure {
                    fn_name: fn_name.to_string(),
                    callee: "async".to_string(),
                    span: stmt.span,
                });
                for s in body {
                    self.contract_purity_walk_stmt(s, fn_name, module, errors);
                }
            }
        }
    }

    // ── Actors ──────────────────────────────────────────────────────────

    fn check_actor(&self, decl: &ActorDecl, module: &Module, module_idx: usize) -> Vec<TypeError> {
        let mut errors = Vec::new();
        let qualified = module.qualify(&decl.name);
        let union = self.actors.get(&qualified).and_then(|e| e.msg_union.clone());

        // Init params and state fields form the actor's private
        // environment; state initializers see the init params.
        let mut ctx = InferCtx::new();
        let mut actor_env = TypeEnv::new();
        for param in &decl.params {
            let ty = convert_type_expr(&mut ctx, &param.ty, &TypeScope::empty(), module, self.symbols());
            actor_env.insert(param.name.clone(), ty);
        }
        let mut state_tys: Vec<(String, Ty)> = Vec::new();
        {
            let mut body = BodyCtx {
                checker: self,
                ctx,
                env: actor_env,
                scope: TypeScope::empty(),
                module,
                module_idx,
                expected_return: Ty::unit(),
                effects: BTreeSet::new(),
            };
            for field in &decl.state {
                let declared = convert_type_expr(
                    &mut body.ctx,
                    &field.ty,
                    &TypeScope::empty(),
                    module,
                    self.symbols(),
                );
                let init_ty = body.check_expr(&field.init);
                let _ = body.ctx.unify(
                    init_ty,
                    declared.clone(),
                    &format!("initializer of state field `{}`", field.name),
                    field.span,
                );
                state_tys.push((field.name.clone(), declared));
            }
            errors.extend(body.ctx.errors);
        }

        for handler in &decl.handlers {
            errors.extend(self.check_handler(decl, handler, &union, &state_tys, module, module_idx));
        }
        errors
    }

    fn check_handler(
        &self,
        actor: &ActorDecl,
        handler: &Handler,
        union: &Option<String>,
        state_tys: &[(String, Ty)],
        module: &Module,
        module_idx: usize,
    ) -> Vec<TypeError> {
        let mut ctx = InferCtx::new();
        let effects = self.effect_set(&handler.effects, handler.span, &mut ctx);
        if !effects.contains("Concurrent") {
            ctx.record(TypeError::HandlerInvalid {
                actor: actor.name.clone(),
                message: handler.message.clone(),
                detail: "must declare the `Concurrent` effect".into(),
                span: handler.span,
            });
        }

        let mut env = TypeEnv::new();
        for param in &actor.params {
            let ty = convert_type_expr(&mut ctx, &param.ty, &TypeScope::empty(), module, self.symbols());
            env.insert(param.name.clone(), ty);
        }
        for (name, ty) in state_tys {
            env.insert(name.clone(), ty.clone());
        }

        self.check_handler_params(actor, handler, union, module, &mut ctx, &mut env);

        let expected_return = convert_type_expr(
            &mut ctx,
            &handler.return_type,
            &TypeScope::empty(),
            module,
            self.symbols(),
        );
        let mut body = BodyCtx {
            checker: self,
            ctx,
            env,
            scope: TypeScope::empty(),
            module,
            module_idx,
            expected_return,
            effects,
        };
        body.check_fn_body(
            &handler.body,
            &format!("body of handler `{}`", handler.message),
            handler.span,
        );
        body.ctx.errors
    }

    /// A handler binds either the whole message as one parameter, or
    /// exactly the message constructor's field set.
    fn check_handler_params(
        &self,
        actor: &ActorDecl,
        handler: &Handler,
        union: &Option<String>,
        module: &Module,
        ctx: &mut InferCtx,
        env: &mut TypeEnv,
    ) {
        if handler.message == CHILD_FAILED {
            // Synthetic supervision event: (child: ActorRef<M>, reason: String).
            let names: Vec<&str> = handler.params.iter().map(|p| p.name.as_str()).collect();
            if names != ["child", "reason"] {
                ctx.record(TypeError::HandlerInvalid {
                    actor: actor.name.clone(),
                    message: handler.message.clone(),
                    detail: "parameters must be (child, reason)".into(),
                    span: handler.span,
                });
            }
            for param in &handler.params {
                let ty = convert_type_expr(ctx, &param.ty, &TypeScope::empty(), module, self.symbols());
                let expected = match param.name.as_str() {
                    "child" => {
                        let m = ctx.fresh_var();
                        Ty::actor_ref(m)
                    }
                    _ => Ty::string(),
                };
                let _ = ctx.unify(
                    ty.clone(),
                    expected,
                    &format!("handler parameter `{}`", param.name),
                    param.span,
                );
                env.insert(param.name.clone(), ty);
            }
            return;
        }

        let info = match self.variant_lookup(&handler.message) {
            VariantLookup::Found(info) => info,
            // Already reported while computing the message union.
            VariantLookup::Unknown | VariantLookup::Ambiguous(_) => {
                for param in &handler.params {
                    let ty = convert_type_expr(ctx, &param.ty, &TypeScope::empty(), module, self.symbols());
                    env.insert(param.name.clone(), ty);
                }
                return;
            }
        };
        let parent_ty = Ty::con(union.clone().unwrap_or(info.parent.clone()));

        // (a) Whole-message binding: one parameter typed as the parent sum.
        if handler.params.len() == 1 {
            let param = &handler.params[0];
            let ty = convert_type_expr(ctx, &param.ty, &TypeScope::empty(), module, self.symbols());
            let resolved = ctx.resolve(ty.clone());
            if resolved == parent_ty {
                env.insert(param.name.clone(), ty);
                return;
            }
        }

        // (b) Field binding: names exactly the constructor's field set.
        let param_names: BTreeSet<&str> = handler.params.iter().map(|p| p.name.as_str()).collect();
        let field_names: BTreeSet<&str> = info.fields.iter().map(|f| f.name.as_str()).collect();
        if param_names != field_names {
            ctx.record(TypeError::HandlerInvalid {
                actor: actor.name.clone(),
                message: handler.message.clone(),
                detail: format!(
                    "parameters must bind the whole message as `{}` or exactly the fields [{}]",
                    parent_ty,
                    info.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
                ),
                span: handler.span,
            });
        }
        for param in &handler.params {
            let ty = convert_type_expr(ctx, &param.ty, &TypeScope::empty(), module, self.symbols());
            if let Some(field) = info.fields.iter().find(|f| f.name == param.name) {
                let field_ty = convert_with_owner(
                    ctx,
                    &field.ty,
                    &TypeScope::empty(),
                    info.owner_module.as_deref(),
                    module,
                    self.symbols(),
                );
                let _ = ctx.unify(
                    ty.clone(),
                    field_ty,
                    &format!("handler parameter `{}`", param.name),
                    param.span,
                );
            }
            env.insert(param.name.clone(), ty);
        }
    }

    // ── Doc specs ───────────────────────────────────────────────────────

    fn check_doc_spec(&self, decl: &Decl, diagnostics: &mut Vec<Diagnostic>, file: &str) {
        let Some(doc) = decl.doc() else { return };
        let Some(parsed) = docspec::parse_doc_spec(doc) else { return };
        let qualified = decl.name().to_string();
        match parsed {
            Err(reason) => diagnostics.push(
                TypeError::DocSpec { decl: qualified, detail: reason, span: decl.span() }
                    .to_diagnostic(file),
            ),
            Ok(spec) => {
                let actual: Vec<String> = match decl {
                    Decl::Fn(d) => d.params.iter().map(|p| p.name.clone()).collect(),
                    Decl::Record(d) => d.fields.iter().map(|f| f.name.clone()).collect(),
                    Decl::Schema(d) => d.fields.iter().map(|f| f.name.clone()).collect(),
                    Decl::Actor(d) => d.params.iter().map(|p| p.name.clone()).collect(),
                    Decl::Property(d) => d.params.iter().map(|p| p.name.clone()).collect(),
                    _ => Vec::new(),
                };
                for problem in docspec::validate_params(&spec, &actual) {
                    diagnostics.push(
                        TypeError::DocSpec {
                            decl: qualified.clone(),
                            detail: problem,
                            span: decl.span(),
                        }
                        .to_diagnostic(file),
                    );
                }
            }
        }
    }
}

fn check_unique_type_params(
    ctx: &mut InferCtx,
    decl_name: &str,
    type_params: &[String],
    span: Option<Span>,
) {
    let mut seen = FxHashSet::default();
    for param in type_params {
        if !seen.insert(param.as_str()) {
            ctx.record(TypeError::DuplicateTypeParam {
                decl: decl_name.to_string(),
                name: param.clone(),
                span,
            });
        }
    }
}

/// The builtin `Option<T>` sum type.
fn builtin_option_decl() -> SumDecl {
    SumDecl {
        name: "Option".into(),
        type_params: vec!["T".into()],
        variants: vec![
            Variant {
                name: "Some".into(),
                fields: vec![Param { name: "value".into(), ty: TypeExpr::name("T"), span: None }],
                span: None,
            },
            Variant { name: "None".into(), fields: vec![], span: None },
        ],
        doc: None,
        span: None,
    }
}

/// The builtin `Pair<A, B>` record produced by `list.zip`/`list.enumerate`.
fn builtin_pair_decl() -> RecordDecl {
    RecordDecl {
        name: "Pair".into(),
        type_params: vec!["A".into(), "B".into()],
        fields: vec![
            Param { name: "first".into(), ty: TypeExpr::name("A"), span: None },
            Param { name: "second".into(), ty: TypeExpr::name("B"), span: None },
        ],
        doc: None,
        span: None,
    }
}

// ── Body checking ───────────────────────────────────────────────────────

/// Per-declaration checking state: the inference context, the value
/// environment, the enclosing type-parameter scope, and the declared
/// effect set.
struct BodyCtx<'c, 'a> {
    checker: &'c Checker<'a>,
    ctx: InferCtx,
    env: TypeEnv,
    scope: TypeScope,
    module: &'c Module,
    #[allow(dead_code)]
    module_idx: usize,
    expected_return: Ty,
    effects: BTreeSet<String>,
}

impl<'c, 'a> BodyCtx<'c, 'a> {
    fn symbols(&self) -> &SymbolTable {
        self.checker.symbols()
    }

    /// The type of a block: its last expression statement, or Unit.
    fn check_block(&mut self, block: &Block) -> Ty {
        let mut last = Ty::unit();
        for stmt in block {
            last = self.check_stmt(stmt);
        }
        last
    }

    /// Check a function-shaped body. `return` statements unify inside
    /// `check_stmt`; a trailing expression statement is the implicit
    /// return value and must match the declared return type.
    fn check_fn_body(&mut self, block: &Block, context: &str, span: Option<Span>) {
        let ty = self.check_block(block);
        let ends_with_expr =
            matches!(block.last().map(|s| &s.kind), Some(StmtKind::Expr { .. }));
        if ends_with_expr {
            let expected = self.expected_return.clone();
            let _ = self.ctx.unify(ty, expected, context, span);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Ty {
        match &stmt.kind {
            StmtKind::Let { name, ty, value } => {
                let value_ty = self.check_expr(value);
                let bound = match ty {
                    Some(annotation) => {
                        let annotated = convert_type_expr(
                            &mut self.ctx,
                            annotation,
                            &self.scope,
                            self.module,
                            self.checker.symbols(),
                        );
                        let _ = self.ctx.unify(
                            value_ty,
                            annotated.clone(),
                            &format!("let binding `{}`", name),
                            stmt.span,
                        );
                        annotated
                    }
                    None => value_ty,
                };
                self.env.insert(name.clone(), bound);
                Ty::unit()
            }
            StmtKind::Return { value } => {
                let ty = match value {
                    Some(v) => self.check_expr(v),
                    None => Ty::unit(),
                };
                let expected = self.expected_return.clone();
                let _ = self.ctx.unify(ty, expected, "return value", stmt.span);
                Ty::unit()
            }
            StmtKind::Expr { value } => self.check_expr(value),
            StmtKind::Match { scrutinee, cases } => {
                let scrutinee_ty = self.check_expr(scrutinee);
                for case in cases {
                    self.env.push_scope();
                    self.check_pattern(&case.pattern, scrutinee_ty.clone());
                    self.check_block(&case.body);
                    self.env.pop_scope();
                }
                self.check_match_coverage(cases, stmt.span);
                Ty::unit()
            }
            StmtKind::AsyncGroup { body } => {
                self.require_effect("async_group", "Concurrent", stmt.span);
                self.check_block(body);
                Ty::unit()
            }
            StmtKind::Async { body } => {
                self.require_effect("async", "Concurrent", stmt.span);
                self.check_block(body);
                Ty::unit()
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::Int { .. } => Ty::int(),
            ExprKind::Bool { .. } => Ty::bool(),
            ExprKind::Str { .. } => Ty::string(),
            ExprKind::Var { name } => self.check_var(name, expr.span),
            ExprKind::List { items } => {
                let elem = self.ctx.fresh_var();
                for item in items {
                    let item_ty = self.check_expr(item);
                    let _ = self
                        .ctx
                        .unify(item_ty, elem.clone(), "list elements", item.span);
                }
                Ty::list(elem)
            }
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs, expr.span),
            ExprKind::Call { callee, args } => self.check_call(callee, args, expr.span),
            ExprKind::Record { name, fields } => self.check_record_expr(name, fields, expr.span),
            ExprKind::Field { target, name } => self.check_field(target, name, expr.span),
            ExprKind::Index { target, index } => {
                let target_ty = self.check_expr(target);
                let elem = self.ctx.fresh_var();
                let _ = self.ctx.unify(
                    target_ty,
                    Ty::list(elem.clone()),
                    "index target",
                    target.span,
                );
                let index_ty = self.check_expr(index);
                let _ = self.ctx.unify(index_ty, Ty::int(), "list index", index.span);
                elem
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                let cond_ty = self.check_expr(cond);
                let _ = self.ctx.unify(cond_ty, Ty::bool(), "if condition", cond.span);
                self.env.push_scope();
                let then_ty = self.check_block(then_branch);
                self.env.pop_scope();
                match else_branch {
                    Some(else_block) => {
                        self.env.push_scope();
                        let else_ty = self.check_block(else_block);
                        self.env.pop_scope();
                        let _ = self.ctx.unify(
                            then_ty.clone(),
                            else_ty,
                            "if branches",
                            expr.span,
                        );
                        then_ty
                    }
                    None => Ty::unit(),
                }
            }
            ExprKind::Match { scrutinee, cases } => self.check_match(scrutinee, cases, expr.span),
            ExprKind::Hole => {
                self.ctx.record(TypeError::Hole { span: expr.span });
                self.ctx.fresh_var()
            }
        }
    }

    fn check_var(&mut self, name: &str, span: Option<Span>) -> Ty {
        if let Some(ty) = self.env.lookup(name) {
            return ty.clone();
        }
        // A bare function reference used as a value.
        let resolved = resolve_identifier(name, self.module, self.symbols());
        if let Some(entry) = self.checker.fn_sigs.get(&resolved) {
            let decl = Rc::clone(&entry.decl);
            let defining = self.checker.module_at(entry.module_idx);
            let use_scope = TypeScope::flexible(&mut self.ctx, &decl.type_params);
            let params: Vec<Ty> = decl
                .params
                .iter()
                .map(|p| convert_type_expr(&mut self.ctx, &p.ty, &use_scope, defining, self.checker.symbols()))
                .collect();
            let ret = convert_type_expr(
                &mut self.ctx,
                &decl.return_type,
                &use_scope,
                defining,
                self.checker.symbols(),
            );
            // Referencing an effectful function pulls its effects into the
            // caller's obligation.
            for effect in &decl.effects {
                if !self.effects.contains(effect) {
                    self.ctx.record(TypeError::MissingEffect {
                        callee: name.to_string(),
                        effect: effect.clone(),
                        span,
                    });
                }
            }
            return Ty::fun(params, ret);
        }
        self.ctx.record(TypeError::UnknownVariable {
            name: name.to_string(),
            span,
        });
        self.ctx.fresh_var()
    }

    fn check_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, span: Option<Span>) -> Ty {
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.check_expr(rhs);
        let context = format!("operands of `{}`", op);
        if op.is_arithmetic() {
            let _ = self.ctx.unify(lhs_ty, Ty::int(), &context, lhs.span);
            let _ = self.ctx.unify(rhs_ty, Ty::int(), &context, rhs.span);
            Ty::int()
        } else if op.is_comparison() {
            let _ = self.ctx.unify(lhs_ty, Ty::int(), &context, lhs.span);
            let _ = self.ctx.unify(rhs_ty, Ty::int(), &context, rhs.span);
            Ty::bool()
        } else if op.is_logical() {
            let _ = self.ctx.unify(lhs_ty, Ty::bool(), &context, lhs.span);
            let _ = self.ctx.unify(rhs_ty, Ty::bool(), &context, rhs.span);
            Ty::bool()
        } else {
            // Equality: both sides unify with each other.
            let _ = self.ctx.unify(lhs_ty, rhs_ty, &context, span);
            Ty::bool()
        }
    }

    fn require_effect(&mut self, callee: &str, effect: &str, span: Option<Span>) {
        if !self.effects.contains(effect) {
            self.ctx.record(TypeError::MissingEffect {
                callee: callee.to_string(),
                effect: effect.to_string(),
                span,
            });
        }
    }

    // ── Calls ───────────────────────────────────────────────────────────

    fn check_call(&mut self, callee: &str, args: &[Arg], span: Option<Span>) -> Ty {
        // 1. Actor send: `<ref>.send(msg)` where `<ref>` is a local.
        if let Some(head) = callee.strip_suffix(".send") {
            if let Some(ref_ty) = self.env.lookup(head).cloned() {
                return self.check_send(callee, &ref_ty, args, span);
            }
        }

        // 2. Actor spawn / direct handler invocation.
        if let Some((head, method)) = callee.rsplit_once('.') {
            let resolved = resolve_identifier(head, self.module, self.symbols());
            if self.checker.actors.contains_key(&resolved) {
                return self.check_actor_call(callee, &resolved, method, args, span);
            }
        }

        // 3. Builtins by exact name.
        if let Some(sig) = builtins::lookup(callee) {
            return self.check_builtin_call(&sig, args, span);
        }

        // 4. User functions.
        let resolved = resolve_identifier(callee, self.module, self.symbols());
        if let Some(entry) = self.checker.fn_sigs.get(&resolved) {
            let decl = Rc::clone(&entry.decl);
            let module_idx = entry.module_idx;
            return self.check_user_call(callee, &decl, module_idx, args, span);
        }

        self.ctx.record(TypeError::UnknownFunction {
            name: callee.to_string(),
            span,
        });
        // Still check argument expressions for nested errors.
        for arg in args {
            self.check_expr(&arg.value);
        }
        self.ctx.fresh_var()
    }

    fn check_send(
        &mut self,
        callee: &str,
        ref_ty: &Ty,
        args: &[Arg],
        span: Option<Span>,
    ) -> Ty {
        self.require_effect(callee, "Concurrent", span);
        let msg = self.ctx.fresh_var();
        let _ = self.ctx.unify(
            ref_ty.clone(),
            Ty::actor_ref(msg.clone()),
            "actor send target",
            span,
        );
        let alignment = align_args(&["message"], args);
        for issue in &alignment.issues {
            self.ctx.record(TypeError::CallArg {
                callee: callee.to_string(),
                issue: issue.to_string(),
                span,
            });
        }
        if let Some(Some(arg_idx)) = alignment.slots.first() {
            let arg = &args[*arg_idx];
            let arg_ty = self.check_expr(&arg.value);
            let _ = self.ctx.unify(
                arg_ty,
                msg,
                &format!("message argument of `{}`", callee),
                arg.value.span,
            );
        }
        Ty::unit()
    }

    fn check_builtin_call(
        &mut self,
        sig: &builtins::BuiltinSig,
        args: &[Arg],
        span: Option<Span>,
    ) -> Ty {
        let alignment = align_args(sig.params, args);
        for issue in &alignment.issues {
            self.ctx.record(TypeError::CallArg {
                callee: sig.name.to_string(),
                issue: issue.to_string(),
                span,
            });
        }
        for effect in sig.effects {
            self.require_effect(sig.name, effect, span);
        }

        let instantiated = self.ctx.instantiate(&sig.scheme);
        let Ty::Fun(param_tys, ret) = instantiated else {
            unreachable!("builtin schemes are function types");
        };

        for (slot, filled) in alignment.slots.iter().enumerate() {
            let Some(arg_idx) = filled else { continue };
            let arg = &args[*arg_idx];
            let arg_ty = self.check_expr(&arg.value);
            let _ = self.ctx.unify(
                arg_ty,
                param_tys[slot].clone(),
                &format!("argument `{}` of `{}`", sig.params[slot], sig.name),
                arg.value.span,
            );
        }
        // Arguments that aligned nowhere still get their subexpressions
        // checked.
        for (idx, arg) in args.iter().enumerate() {
            if !alignment.slots.contains(&Some(idx)) {
                self.check_expr(&arg.value);
            }
        }

        if builtins::is_pure_argument_builtin(sig.name) {
            self.check_pure_fn_arguments(sig, &alignment.slots, args, span);
        }

        *ret
    }

    /// The parallel builtins take a bare name of a declared pure function
    /// as their function argument.
    fn check_pure_fn_arguments(
        &mut self,
        sig: &builtins::BuiltinSig,
        slots: &[Option<usize>],
        args: &[Arg],
        span: Option<Span>,
    ) {
        for (slot, param_ty) in fn_typed_params(&sig.scheme.ty).into_iter().enumerate() {
            if !param_ty {
                continue;
            }
            let Some(Some(arg_idx)) = slots.get(slot) else { continue };
            let arg = &args[*arg_idx];
            let ExprKind::Var { name } = &arg.value.kind else {
                self.ctx.record(TypeError::NotAFunctionReference {
                    callee: sig.name.to_string(),
                    span: arg.value.span.or(span),
                });
                continue;
            };
            let resolved = resolve_identifier(name, self.module, self.symbols());
            let Some(entry) = self.checker.fn_sigs.get(&resolved) else {
                // Unknown function is reported by the Var check.
                continue;
            };
            if !entry.decl.effects.is_empty() {
                self.ctx.record(TypeError::ImpureArgument {
                    callee: sig.name.to_string(),
                    fn_name: name.clone(),
                    effects: entry.decl.effects.clone(),
                    span: arg.value.span.or(span),
                });
            }
        }
    }

    fn check_actor_call(
        &mut self,
        callee: &str,
        actor_qualified: &str,
        method: &str,
        args: &[Arg],
        span: Option<Span>,
    ) -> Ty {
        let entry = &self.checker.actors[actor_qualified];
        let decl = Rc::clone(&entry.decl);
        let union_ty = entry
            .msg_union
            .clone()
            .map(Ty::con)
            .unwrap_or_else(|| self.ctx.fresh_var());
        let defining = self.checker.module_at(entry.module_idx);

        if method == "spawn" {
            self.require_effect(callee, "Concurrent", span);
            let param_names: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
            let alignment = align_args(&param_names, args);
            for issue in &alignment.issues {
                self.ctx.record(TypeError::CallArg {
                    callee: callee.to_string(),
                    issue: issue.to_string(),
                    span,
                });
            }
            for (slot, filled) in alignment.slots.iter().enumerate() {
                let Some(arg_idx) = filled else { continue };
                let arg = &args[*arg_idx];
                let arg_ty = self.check_expr(&arg.value);
                let param_ty = convert_type_expr(
                    &mut self.ctx,
                    &decl.params[slot].ty,
                    &TypeScope::empty(),
                    defining,
                    self.checker.symbols(),
                );
                let _ = self.ctx.unify(
                    arg_ty,
                    param_ty,
                    &format!("argument `{}` of `{}`", decl.params[slot].name, callee),
                    arg.value.span,
                );
            }
            return Ty::actor_ref(union_ty);
        }

        if let Some(handler) = decl.handler(method) {
            return self.check_handler_call(callee, actor_qualified, handler, union_ty, args, span);
        }

        self.ctx.record(TypeError::UnknownFunction {
            name: callee.to_string(),
            span,
        });
        for arg in args {
            self.check_expr(&arg.value);
        }
        self.ctx.fresh_var()
    }

    /// Direct handler invocation: `Actor.Msg(actorRef, …fields)`.
    fn check_handler_call(
        &mut self,
        callee: &str,
        actor_qualified: &str,
        handler: &Handler,
        union_ty: Ty,
        args: &[Arg],
        span: Option<Span>,
    ) -> Ty {
        let entry = &self.checker.actors[actor_qualified];
        let defining_idx = entry.module_idx;
        let defining = self.checker.module_at(defining_idx);

        let effects = handler.effects.clone();
        for effect in &effects {
            self.require_effect(callee, effect, span);
        }

        // Parameter list of the synthetic signature: the receiving actor,
        // then the message constructor's fields.
        let (field_params, owner): (Vec<Param>, Option<String>) =
            if handler.message == CHILD_FAILED {
                let child = Param {
                    name: "child".into(),
                    ty: TypeExpr::name("Unit"),
                    span: None,
                };
                let reason = Param {
                    name: "reason".into(),
                    ty: TypeExpr::name("String"),
                    span: None,
                };
                (vec![child, reason], None)
            } else {
                match self.checker.variant_lookup(&handler.message) {
                    VariantLookup::Found(info) => (info.fields, info.owner_module),
                    _ => (Vec::new(), None),
                }
            };

        let mut param_names: Vec<&str> = vec!["actor"];
        param_names.extend(field_params.iter().map(|f| f.name.as_str()));
        let alignment = align_args(&param_names, args);
        for issue in &alignment.issues {
            self.ctx.record(TypeError::CallArg {
                callee: callee.to_string(),
                issue: issue.to_string(),
                span,
            });
        }

        for (slot, filled) in alignment.slots.iter().enumerate() {
            let Some(arg_idx) = filled else { continue };
            let arg = &args[*arg_idx];
            let arg_ty = self.check_expr(&arg.value);
            let expected = if slot == 0 {
                Ty::actor_ref(union_ty.clone())
            } else {
                let field = &field_params[slot - 1];
                if handler.message == CHILD_FAILED && field.name == "child" {
                    let m = self.ctx.fresh_var();
                    Ty::actor_ref(m)
                } else {
                    convert_with_owner(
                        &mut self.ctx,
                        &field.ty,
                        &TypeScope::empty(),
                        owner.as_deref(),
                        defining,
                        self.checker.symbols(),
                    )
                }
            };
            let _ = self.ctx.unify(
                arg_ty,
                expected,
                &format!("argument `{}` of `{}`", param_names[slot], callee),
                arg.value.span,
            );
        }

        convert_type_expr(
            &mut self.ctx,
            &handler.return_type,
            &TypeScope::empty(),
            defining,
            self.checker.symbols(),
        )
    }

    fn check_user_call(
        &mut self,
        callee: &str,
        decl: &FnDecl,
        module_idx: usize,
        args: &[Arg],
        span: Option<Span>,
    ) -> Ty {
        let defining = self.checker.module_at(module_idx);
        let param_names: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
        let alignment = align_args(&param_names, args);
        for issue in &alignment.issues {
            self.ctx.record(TypeError::CallArg {
                callee: callee.to_string(),
                issue: issue.to_string(),
                span,
            });
        }

        for effect in &decl.effects {
            self.require_effect(callee, effect, span);
        }

        // Fresh type arguments at every use site.
        let use_scope = TypeScope::flexible(&mut self.ctx, &decl.type_params);
        for (slot, filled) in alignment.slots.iter().enumerate() {
            let Some(arg_idx) = filled else { continue };
            let arg = &args[*arg_idx];
            let arg_ty = self.check_expr(&arg.value);
            let param_ty = convert_type_expr(
                &mut self.ctx,
                &decl.params[slot].ty,
                &use_scope,
                defining,
                self.checker.symbols(),
            );
            let _ = self.ctx.unify(
                arg_ty,
                param_ty,
                &format!("argument `{}` of `{}`", decl.params[slot].name, callee),
                arg.value.span,
            );
        }
        for (idx, arg) in args.iter().enumerate() {
            if !alignment.slots.contains(&Some(idx)) {
                self.check_expr(&arg.value);
            }
        }

        convert_type_expr(
            &mut self.ctx,
            &decl.return_type,
            &use_scope,
            defining,
            self.checker.symbols(),
        )
    }

    // ── Records, fields, matches ────────────────────────────────────────

    fn check_record_expr(
        &mut self,
        name: &str,
        fields: &[lx_ast::FieldInit],
        span: Option<Span>,
    ) -> Ty {
        // A record type name, or a variant constructor.
        if let Some((qualified, record)) = self.checker.record_lookup(name, self.module) {
            let args: Vec<Ty> = record.type_params.iter().map(|_| self.ctx.fresh_var()).collect();
            let scope = TypeScope::bound(&record.type_params, &args);
            let owner = owning_module(&qualified);
            self.check_field_inits(name, &record.fields, fields, &scope, owner.as_deref(), span);
            return Ty::Con { name: qualified, args };
        }

        match self.checker.variant_lookup(name) {
            VariantLookup::Found(info) => {
                let args: Vec<Ty> =
                    info.parent_params.iter().map(|_| self.ctx.fresh_var()).collect();
                let scope = TypeScope::bound(&info.parent_params, &args);
                self.check_field_inits(
                    name,
                    &info.fields,
                    fields,
                    &scope,
                    info.owner_module.as_deref(),
                    span,
                );
                Ty::Con { name: info.parent, args }
            }
            VariantLookup::Ambiguous(candidates) => {
                self.ctx.record(TypeError::AmbiguousConstructor {
                    name: name.to_string(),
                    candidates,
                    span,
                });
                self.ctx.fresh_var()
            }
            VariantLookup::Unknown => {
                self.ctx.record(TypeError::UnknownConstructor {
                    name: name.to_string(),
                    span,
                });
                for field in fields {
                    self.check_expr(&field.value);
                }
                self.ctx.fresh_var()
            }
        }
    }

    /// Every declared field supplied exactly once, with a matching type.
    fn check_field_inits(
        &mut self,
        owner_name: &str,
        declared: &[Param],
        supplied: &[lx_ast::FieldInit],
        scope: &TypeScope,
        owner_module: Option<&str>,
        span: Option<Span>,
    ) {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for init in supplied {
            if !seen.insert(init.name.as_str()) {
                self.ctx.record(TypeError::DuplicateField {
                    owner: owner_name.to_string(),
                    field: init.name.clone(),
                    span: init.value.span.or(span),
                });
                self.check_expr(&init.value);
                continue;
            }
            let Some(field) = declared.iter().find(|f| f.name == init.name) else {
                self.ctx.record(TypeError::UnknownField {
                    owner: owner_name.to_string(),
                    field: init.name.clone(),
                    span: init.value.span.or(span),
                });
                self.check_expr(&init.value);
                continue;
            };
            let value_ty = self.check_expr(&init.value);
            let field_ty = convert_with_owner(
                &mut self.ctx,
                &field.ty,
                scope,
                owner_module,
                self.module,
                self.checker.symbols(),
            );
            let _ = self.ctx.unify(
                value_ty,
                field_ty,
                &format!("field `{}` of `{}`", init.name, owner_name),
                init.value.span,
            );
        }
        for field in declared {
            if !seen.contains(field.name.as_str()) {
                self.ctx.record(TypeError::MissingField {
                    owner: owner_name.to_string(),
                    field: field.name.clone(),
                    span,
                });
            }
        }
    }

    fn check_field(&mut self, target: &Expr, name: &str, span: Option<Span>) -> Ty {
        let target_ty = self.check_expr(target);
        let resolved = self.ctx.resolve(target_ty);
        let Ty::Con { name: ty_name, args } = &resolved else {
            let rendered = self.ctx.rendered(&resolved);
            self.ctx.record(TypeError::NoFields { ty: rendered, span });
            return self.ctx.fresh_var();
        };

        // Records (and the builtin Pair) carry a single field set.
        let record = if ty_name == "Pair" {
            Some(("Pair".to_string(), Rc::clone(&self.checker.pair_decl)))
        } else {
            match self.symbols().types.get(ty_name) {
                Some(TypeDef::Record(r)) => Some((ty_name.clone(), Rc::clone(r))),
                _ => None,
            }
        };
        if let Some((qualified, record)) = record {
            let Some(field) = record.fields.iter().find(|f| f.name == name) else {
                self.ctx.record(TypeError::UnknownField {
                    owner: qualified,
                    field: name.to_string(),
                    span,
                });
                return self.ctx.fresh_var();
            };
            // Field type with the constructor's type arguments substituted in.
            let scope = TypeScope::bound(&record.type_params, args);
            let owner = owning_module(&qualified);
            return convert_with_owner(
                &mut self.ctx,
                &field.ty,
                &scope,
                owner.as_deref(),
                self.module,
                self.checker.symbols(),
            );
        }

        // Sum types: the value is some variant of the sum, so the field
        // resolves against the variants that declare it.
        let sum = if ty_name == "Option" {
            Some(("Option".to_string(), Rc::clone(&self.checker.option_decl)))
        } else {
            match self.symbols().types.get(ty_name) {
                Some(TypeDef::Sum(s)) => Some((ty_name.clone(), Rc::clone(s))),
                _ => None,
            }
        };
        if let Some((qualified, sum)) = sum {
            let declaring: Vec<&Param> = sum
                .variants
                .iter()
                .flat_map(|v| v.fields.iter())
                .filter(|f| f.name == name)
                .collect();
            if declaring.is_empty() {
                self.ctx.record(TypeError::UnknownField {
                    owner: qualified,
                    field: name.to_string(),
                    span,
                });
                return self.ctx.fresh_var();
            }
            let scope = TypeScope::bound(&sum.type_params, args);
            let owner = owning_module(&qualified);
            let result = convert_with_owner(
                &mut self.ctx,
                &declaring[0].ty,
                &scope,
                owner.as_deref(),
                self.module,
                self.checker.symbols(),
            );
            // Several variants may declare the field; their types must
            // agree for the access to have one type.
            for field in &declaring[1..] {
                let ty = convert_with_owner(
                    &mut self.ctx,
                    &field.ty,
                    &scope,
                    owner.as_deref(),
                    self.module,
                    self.checker.symbols(),
                );
                let _ = self.ctx.unify(
                    ty,
                    result.clone(),
                    &format!("field `{}` across variants of `{}`", name, qualified),
                    span,
                );
            }
            return result;
        }

        let rendered = self.ctx.rendered(&resolved);
        self.ctx.record(TypeError::NoFields { ty: rendered, span });
        self.ctx.fresh_var()
    }

    fn check_match(&mut self, scrutinee: &Expr, cases: &[MatchCase], span: Option<Span>) -> Ty {
        let scrutinee_ty = self.check_expr(scrutinee);

        let mut result: Option<Ty> = None;
        let mut all_return = !cases.is_empty();
        for case in cases {
            self.env.push_scope();
            self.check_pattern(&case.pattern, scrutinee_ty.clone());
            let arm_ty = self.check_block(&case.body);
            self.env.pop_scope();

            let arm_returns = matches!(
                case.body.last().map(|s| &s.kind),
                Some(StmtKind::Return { .. })
            );
            if arm_returns {
                continue;
            }
            all_return = false;
            match &result {
                None => result = Some(arm_ty),
                Some(existing) => {
                    let _ = self.ctx.unify(
                        arm_ty,
                        existing.clone(),
                        "match arms",
                        case.span.or(span),
                    );
                }
            }
        }

        self.check_match_coverage(cases, span);

        if all_return {
            self.expected_return.clone()
        } else {
            result.unwrap_or_else(|| self.ctx.fresh_var())
        }
    }

    fn check_match_coverage(&mut self, cases: &[MatchCase], span: Option<Span>) {
        let patterns: Vec<&Pattern> = cases.iter().map(|c| &c.pattern).collect();
        let checker = self.checker;
        let resolve = |name: &str| -> Option<(String, Vec<String>)> {
            match checker.variant_lookup(name) {
                VariantLookup::Found(info) => Some((info.parent, info.variants)),
                _ => None,
            }
        };
        match check_coverage(&patterns, &resolve) {
            Coverage::Exhaustive => {}
            Coverage::Missing { ty, missing } => {
                self.ctx.record(TypeError::NonExhaustiveMatch { ty, missing, span });
            }
            Coverage::Mixed => {
                self.ctx.record(TypeError::MixedMatchPatterns { span });
            }
        }
    }

    fn check_pattern(&mut self, pattern: &Pattern, expected: Ty) {
        match &pattern.kind {
            PatternKind::Wildcard => {}
            PatternKind::Bind { name } => {
                self.env.insert(name.clone(), expected);
            }
            PatternKind::Ctor { name, fields } => {
                let info = match self.checker.variant_lookup(name) {
                    VariantLookup::Found(info) => info,
                    VariantLookup::Ambiguous(candidates) => {
                        self.ctx.record(TypeError::AmbiguousConstructor {
                            name: name.clone(),
                            candidates,
                            span: pattern.span,
                        });
                        return;
                    }
                    VariantLookup::Unknown => {
                        // A record pattern, or truly unknown.
                        if let Some((qualified, record)) =
                            self.checker.record_lookup(name, self.module)
                        {
                            let args: Vec<Ty> = record
                                .type_params
                                .iter()
                                .map(|_| self.ctx.fresh_var())
                                .collect();
                            let _ = self.ctx.unify(
                                expected,
                                Ty::Con { name: qualified.clone(), args: args.clone() },
                                "pattern",
                                pattern.span,
                            );
                            let scope = TypeScope::bound(&record.type_params, &args);
                            let owner = owning_module(&qualified);
                            self.check_field_patterns(
                                name,
                                &record.fields,
                                fields,
                                &scope,
                                owner.as_deref(),
                                pattern.span,
                            );
                            return;
                        }
                        self.ctx.record(TypeError::UnknownConstructor {
                            name: name.clone(),
                            span: pattern.span,
                        });
                        return;
                    }
                };

                let args: Vec<Ty> =
                    info.parent_params.iter().map(|_| self.ctx.fresh_var()).collect();
                let _ = self.ctx.unify(
                    expected,
                    Ty::Con { name: info.parent.clone(), args: args.clone() },
                    "pattern",
                    pattern.span,
                );
                let scope = TypeScope::bound(&info.parent_params, &args);
                self.check_field_patterns(
                    name,
                    &info.fields,
                    fields,
                    &scope,
                    info.owner_module.as_deref(),
                    pattern.span,
                );
            }
        }
    }

    /// Sub-patterns bind against their field's type; omitted fields are
    /// implicitly wildcards.
    fn check_field_patterns(
        &mut self,
        ctor: &str,
        declared: &[Param],
        sub_patterns: &[lx_ast::FieldPat],
        scope: &TypeScope,
        owner_module: Option<&str>,
        span: Option<Span>,
    ) {
        for sub in sub_patterns {
            let Some(field) = declared.iter().find(|f| f.name == sub.name) else {
                self.ctx.record(TypeError::UnknownField {
                    owner: ctor.to_string(),
                    field: sub.name.clone(),
                    span: sub.pattern.span.or(span),
                });
                continue;
            };
            let field_ty = convert_with_owner(
                &mut self.ctx,
                &field.ty,
                scope,
                owner_module,
                self.module,
                self.checker.symbols(),
            );
            self.check_pattern(&sub.pattern, field_ty);
        }
    }
}

/// Which parameters of a builtin scheme are function-typed.
fn fn_typed_params(scheme_ty: &Ty) -> Vec<bool> {
    match scheme_ty {
        Ty::Fun(params, _) => params.iter().map(|p| matches!(p, Ty::Fun(..))).collect(),
        _ => Vec::new(),
    }
}
