//! Unification engine.
//!
//! Implements structural unification over `Ty` using `ena`'s union-find
//! table: occurs check before binding, rigid variables that unify only with
//! themselves, and error accumulation. Resolution performs path compression
//! through the table.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use lx_common::Span;

use crate::error::TypeError;
use crate::ty::{Scheme, Ty, TyVar};

/// The inference context: owns the unification table, rigid-variable
/// metadata, and the accumulated errors for one declaration body.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
    /// Labels of rigid variables (explicit type parameters), keyed by the
    /// variable that was created for them.
    rigid: FxHashMap<TyVar, String>,
    /// Type errors accumulated during checking.
    pub errors: Vec<TypeError>,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            rigid: FxHashMap::default(),
            errors: Vec::new(),
        }
    }

    // ── Variable creation ───────────────────────────────────────────────

    /// A fresh flexible variable.
    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.table.new_key(None))
    }

    /// A fresh rigid variable for an explicit type parameter.
    pub fn fresh_rigid(&mut self, label: &str) -> Ty {
        let var = self.table.new_key(None);
        self.rigid.insert(var, label.to_string());
        Ty::Var(var)
    }

    fn rigid_label(&self, var: TyVar) -> Option<&str> {
        self.rigid.get(&var).map(String::as_str)
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// Follow union-find indirection, normalizing unbound variables to
    /// their root key so unified-but-unbound vars compare equal.
    pub fn resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                None => Ty::Var(self.table.find(v)),
            },
            Ty::Con { name, args } => {
                let args = args.into_iter().map(|a| self.resolve(a)).collect();
                Ty::Con { name, args }
            }
            Ty::Fun(params, ret) => {
                let params = params.into_iter().map(|p| self.resolve(p)).collect();
                let ret = Box::new(self.resolve(*ret));
                Ty::Fun(params, ret)
            }
        }
    }

    /// Render a type for error messages: resolve, then replace rigid
    /// variables with their source labels.
    pub fn rendered(&mut self, ty: &Ty) -> Ty {
        let resolved = self.resolve(ty.clone());
        self.label_rigids(resolved)
    }

    fn label_rigids(&self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.rigid_label(v) {
                Some(label) => Ty::con(label),
                None => Ty::Var(v),
            },
            Ty::Con { name, args } => Ty::Con {
                name,
                args: args.into_iter().map(|a| self.label_rigids(a)).collect(),
            },
            Ty::Fun(params, ret) => Ty::Fun(
                params.into_iter().map(|p| self.label_rigids(p)).collect(),
                Box::new(self.label_rigids(*ret)),
            ),
        }
    }

    // ── Occurs check ────────────────────────────────────────────────────

    /// Whether `var` occurs anywhere within `ty` (following bindings).
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if self.table.find(*v) == self.table.find(var) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Con { args, .. } => args.iter().any(|a| {
                let a = a.clone();
                self.occurs_in(var, &a)
            }),
            Ty::Fun(params, ret) => {
                params.iter().any(|p| {
                    let p = p.clone();
                    self.occurs_in(var, &p)
                }) || {
                    let r = (**ret).clone();
                    self.occurs_in(var, &r)
                }
            }
        }
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two types. `context` describes where the constraint came
    /// from and `span` is its source position; both flow into any error,
    /// which is also pushed onto `self.errors`.
    pub fn unify(
        &mut self,
        a: Ty,
        b: Ty,
        context: &str,
        span: Option<Span>,
    ) -> Result<(), TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (a, b) {
            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) => {
                match (self.rigid_label(v1).is_some(), self.rigid_label(v2).is_some()) {
                    // Two distinct rigid parameters never unify.
                    (true, true) => {
                        let label = self.rigid_label(v1).unwrap_or_default().to_string();
                        let found = self.rendered(&Ty::Var(v2));
                        Err(self.record(TypeError::RigidMismatch {
                            label,
                            found,
                            context: context.to_string(),
                            span,
                        }))
                    }
                    // Bind the flexible one to the rigid one, keeping the
                    // rigid var as the representative.
                    (true, false) => {
                        self.table
                            .unify_var_value(v2, Some(Ty::Var(v1)))
                            .expect("binding an unbound var cannot conflict");
                        Ok(())
                    }
                    (false, true) => {
                        self.table
                            .unify_var_value(v1, Some(Ty::Var(v2)))
                            .expect("binding an unbound var cannot conflict");
                        Ok(())
                    }
                    (false, false) => {
                        self.table
                            .unify_var_var(v1, v2)
                            .expect("unifying two unbound vars cannot conflict");
                        Ok(())
                    }
                }
            }

            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if let Some(label) = self.rigid_label(v) {
                    let label = label.to_string();
                    let found = self.rendered(&ty);
                    return Err(self.record(TypeError::RigidMismatch {
                        label,
                        found,
                        context: context.to_string(),
                        span,
                    }));
                }
                if self.occurs_in(v, &ty) {
                    let rendered = self.rendered(&ty);
                    return Err(self.record(TypeError::InfiniteType {
                        ty: rendered,
                        context: context.to_string(),
                        span,
                    }));
                }
                self.table
                    .unify_var_value(v, Some(ty))
                    .expect("binding after occurs check cannot conflict");
                Ok(())
            }

            (Ty::Con { name: n1, args: a1 }, Ty::Con { name: n2, args: a2 }) => {
                if n1 != n2 || a1.len() != a2.len() {
                    let expected = self.rendered(&Ty::Con { name: n1, args: a1 });
                    let found = self.rendered(&Ty::Con { name: n2, args: a2 });
                    return Err(self.record(TypeError::Mismatch {
                        expected,
                        found,
                        context: context.to_string(),
                        span,
                    }));
                }
                for (x, y) in a1.into_iter().zip(a2.into_iter()) {
                    self.unify(x, y, context, span)?;
                }
                Ok(())
            }

            (Ty::Fun(p1, r1), Ty::Fun(p2, r2)) => {
                if p1.len() != p2.len() {
                    return Err(self.record(TypeError::ArityMismatch {
                        expected: p1.len(),
                        found: p2.len(),
                        context: context.to_string(),
                        span,
                    }));
                }
                for (x, y) in p1.into_iter().zip(p2.into_iter()) {
                    self.unify(x, y, context, span)?;
                }
                self.unify(*r1, *r2, context, span)
            }

            (a, b) => {
                let expected = self.rendered(&a);
                let found = self.rendered(&b);
                Err(self.record(TypeError::Mismatch {
                    expected,
                    found,
                    context: context.to_string(),
                    span,
                }))
            }
        }
    }

    /// Push an error and hand back a clone for the `Result` channel.
    pub fn record(&mut self, err: TypeError) -> TypeError {
        self.errors.push(err.clone());
        err
    }

    // ── Instantiation ───────────────────────────────────────────────────

    /// Instantiate a builtin scheme: replace each quantified local var
    /// with a fresh inference variable. Scheme var ids never touch the
    /// table, so substitution is purely structural.
    pub fn instantiate(&mut self, scheme: &Scheme) -> Ty {
        if scheme.vars.is_empty() {
            return scheme.ty.clone();
        }
        let subst: FxHashMap<TyVar, Ty> = scheme
            .vars
            .iter()
            .map(|v| (*v, self.fresh_var()))
            .collect();
        substitute(&scheme.ty, &subst)
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural substitution of variables (no table access).
pub fn substitute(ty: &Ty, subst: &FxHashMap<TyVar, Ty>) -> Ty {
    match ty {
        Ty::Var(v) => subst.get(v).cloned().unwrap_or_else(|| ty.clone()),
        Ty::Con { name, args } => Ty::Con {
            name: name.clone(),
            args: args.iter().map(|a| substitute(a, subst)).collect(),
        },
        Ty::Fun(params, ret) => Ty::Fun(
            params.iter().map(|p| substitute(p, subst)).collect(),
            Box::new(substitute(ret, subst)),
        ),
    }
}
