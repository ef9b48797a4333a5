//! The property engine.
//!
//! Runs each property for N iterations (default 50), generating a value
//! for every parameter from its type. Parameters bind sequentially, so a
//! later predicate can reference earlier bindings; predicates reject by
//! resampling up to a fixed attempt cap. Failures report the property
//! name, the 1-based iteration, a JSON snapshot of the bound environment,
//! and the cause. There is no shrinking.

use std::fmt;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value as Json};

use lx_ast::{PropertyDecl, TypeExpr, TypeExprKind};
use lx_loader::{resolve_identifier, TypeDef};

use crate::env::Env;
use crate::error::{RResult, RuntimeError};
use crate::eval::Flow;
use crate::json::value_to_json;
use crate::value::Value;
use crate::Interp;

/// Nesting depth past which generation returns type-directed defaults.
const DEPTH_CAP: u32 = 4;
/// Resampling bound for per-parameter predicates.
const MAX_PREDICATE_ATTEMPTS: u32 = 100;
/// Iterations when the declaration does not override.
pub const DEFAULT_ITERATIONS: u32 = 50;

/// A failed property run.
#[derive(Debug, Clone)]
pub struct PropertyFailure {
    pub property: String,
    /// 1-based iteration number.
    pub iteration: u32,
    /// JSON snapshot of the bindings at failure time.
    pub bindings: Json,
    pub cause: String,
}

impl fmt::Display for PropertyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "property `{}` failed at iteration {}: {} (bindings: {})",
            self.property, self.iteration, self.cause, self.bindings
        )
    }
}

impl<'p> Interp<'p> {
    /// Run one property declaration from the entry module.
    pub fn run_property(&mut self, decl: &PropertyDecl) -> Result<(), PropertyFailure> {
        let iterations = decl.iterations.unwrap_or(DEFAULT_ITERATIONS);
        let m = self.entry_idx();

        for iteration in 1..=iterations {
            let env = Env::root();
            for param in &decl.params {
                match self.generate_param(param, &env, m) {
                    Ok(value) => env.define(param.name.clone(), value),
                    Err(cause) => {
                        return Err(self.failure(decl, iteration, &env, cause.to_string()))
                    }
                }
            }
            let outcome = self.eval_block(&decl.body, &env, m);
            match outcome {
                Ok(Flow::Value(_)) | Ok(Flow::Return(_)) => {}
                Err(cause) => {
                    return Err(self.failure(decl, iteration, &env, cause.to_string()))
                }
            }
        }
        Ok(())
    }

    fn failure(
        &self,
        decl: &PropertyDecl,
        iteration: u32,
        env: &Env,
        cause: String,
    ) -> PropertyFailure {
        let mut map = Map::new();
        for (name, value) in env.flattened() {
            let json = value_to_json(&value)
                .unwrap_or_else(|_| Json::String(value.to_string()));
            map.insert(name, json);
        }
        PropertyFailure {
            property: decl.name.clone(),
            iteration,
            bindings: Json::Object(map),
            cause,
        }
    }

    /// Generate one parameter, resampling against its predicate.
    fn generate_param(
        &mut self,
        param: &lx_ast::PropertyParam,
        env: &Env,
        m: usize,
    ) -> RResult<Value> {
        let Some(predicate) = &param.predicate else {
            return self.generate(&param.ty, None, m, 0);
        };
        for _ in 0..MAX_PREDICATE_ATTEMPTS {
            let candidate = self.generate(&param.ty, None, m, 0)?;
            let probe = env.child();
            probe.define(param.name.clone(), candidate.clone());
            let holds = self.eval_expr_value(predicate, &probe, m)?;
            if holds == Value::Bool(true) {
                return Ok(candidate);
            }
        }
        Err(RuntimeError::msg(format!(
            "predicate for `{}` not satisfied after {} attempts",
            param.name, MAX_PREDICATE_ATTEMPTS
        )))
    }

    // ── Typed generation ────────────────────────────────────────────────

    fn generate(
        &mut self,
        ty: &TypeExpr,
        owner: Option<&str>,
        m: usize,
        depth: u32,
    ) -> RResult<Value> {
        match &ty.kind {
            TypeExprKind::Optional { inner } => self.generate_option(inner, owner, m, depth),
            TypeExprKind::Fn { .. } => {
                Err(RuntimeError::msg("cannot generate a function value"))
            }
            TypeExprKind::Name { name, args } => match name.as_str() {
                "Int" => Ok(Value::Int(self.rt.rng.int_in(-20, 20))),
                "Bool" => Ok(Value::Bool(self.rt.rng.flip())),
                "String" => {
                    let len = self.rt.rng.next_below(6);
                    let s: String = (0..len)
                        .map(|_| (b'a' + self.rt.rng.next_below(26) as u8) as char)
                        .collect();
                    Ok(Value::Str(s))
                }
                "Unit" => Ok(Value::Unit),
                "List" => {
                    let inner = args.first().ok_or_else(|| {
                        RuntimeError::msg("List needs a type argument")
                    })?;
                    let len = if depth >= DEPTH_CAP {
                        0
                    } else {
                        self.rt.rng.next_below(4)
                    };
                    let mut items = Vec::with_capacity(len as usize);
                    for _ in 0..len {
                        items.push(self.generate(inner, owner, m, depth + 1)?);
                    }
                    Ok(Value::List(items))
                }
                "Option" => {
                    let inner = args.first().ok_or_else(|| {
                        RuntimeError::msg("Option needs a type argument")
                    })?;
                    self.generate_option(inner, owner, m, depth)
                }
                "Pair" => {
                    let first = self.generate(&args[0], owner, m, depth + 1)?;
                    let second = self.generate(&args[1], owner, m, depth + 1)?;
                    Ok(Value::pair(first, second))
                }
                "ActorRef" => Err(RuntimeError::msg("cannot generate an actor reference")),
                _ => self.generate_user_type(ty, name, args, owner, m, depth),
            },
        }
    }

    fn generate_option(
        &mut self,
        inner: &TypeExpr,
        owner: Option<&str>,
        m: usize,
        depth: u32,
    ) -> RResult<Value> {
        if depth >= DEPTH_CAP || self.rt.rng.chance(30) {
            return Ok(Value::none());
        }
        let value = self.generate(inner, owner, m, depth + 1)?;
        Ok(Value::some(value))
    }

    fn generate_user_type(
        &mut self,
        ty: &TypeExpr,
        name: &str,
        args: &[TypeExpr],
        owner: Option<&str>,
        m: usize,
        depth: u32,
    ) -> RResult<Value> {
        let Some(qualified) = self.resolve_type_name(name, owner, m) else {
            return Err(RuntimeError::msg(format!("cannot generate unknown type `{}`", name)));
        };
        let def = self.program.symbols.types.get(&qualified).cloned().expect("resolved");
        let next_owner = qualified.rsplit_once('.').map(|(module, _)| module.to_string());

        match def {
            TypeDef::Alias(alias) => {
                let target = substitute_type_params(&alias.target, &alias.type_params, args);
                self.generate(&target, next_owner.as_deref(), m, depth)
            }
            TypeDef::Record(record) => {
                let mut fields = Vec::with_capacity(record.fields.len());
                for field in &record.fields {
                    let field_ty =
                        substitute_type_params(&field.ty, &record.type_params, args);
                    let value = if depth >= DEPTH_CAP {
                        self.default_value(&field_ty, next_owner.as_deref(), m)?
                    } else {
                        self.generate(&field_ty, next_owner.as_deref(), m, depth + 1)?
                    };
                    fields.push((field.name.clone(), value));
                }
                Ok(Value::ctor(record.name.clone(), fields))
            }
            TypeDef::Sum(sum) => {
                if sum.variants.is_empty() {
                    return Err(RuntimeError::msg(format!(
                        "cannot generate a value of uninhabited type `{}`",
                        qualified
                    )));
                }
                let variant = if depth >= DEPTH_CAP {
                    // Prefer a zero-field variant at the cap.
                    sum.variants
                        .iter()
                        .find(|v| v.fields.is_empty())
                        .unwrap_or(&sum.variants[0])
                } else {
                    let idx = self.rt.rng.next_below(sum.variants.len() as u32) as usize;
                    &sum.variants[idx]
                };
                let variant = variant.clone();
                let mut fields = Vec::with_capacity(variant.fields.len());
                for field in &variant.fields {
                    let field_ty = substitute_type_params(&field.ty, &sum.type_params, args);
                    let value = if depth >= DEPTH_CAP {
                        self.default_value(&field_ty, next_owner.as_deref(), m)?
                    } else {
                        self.generate(&field_ty, next_owner.as_deref(), m, depth + 1)?
                    };
                    fields.push((field.name.clone(), value));
                }
                Ok(Value::ctor(variant.name, fields))
            }
        }
    }

    /// The type-directed default used past the depth cap.
    fn default_value(&mut self, ty: &TypeExpr, owner: Option<&str>, m: usize) -> RResult<Value> {
        match &ty.kind {
            TypeExprKind::Optional { .. } => Ok(Value::none()),
            TypeExprKind::Fn { .. } => {
                Err(RuntimeError::msg("cannot default a function value"))
            }
            TypeExprKind::Name { name, args } => match name.as_str() {
                "Int" => Ok(Value::Int(0)),
                "Bool" => Ok(Value::Bool(false)),
                "String" => Ok(Value::Str(String::new())),
                "Unit" => Ok(Value::Unit),
                "List" => Ok(Value::List(Vec::new())),
                "Option" => Ok(Value::none()),
                "Pair" => {
                    let first = self.default_value(&args[0], owner, m)?;
                    let second = self.default_value(&args[1], owner, m)?;
                    Ok(Value::pair(first, second))
                }
                "ActorRef" => Err(RuntimeError::msg("cannot default an actor reference")),
                _ => {
                    let Some(qualified) = self.resolve_type_name(name, owner, m) else {
                        return Err(RuntimeError::msg(format!(
                            "cannot default unknown type `{}`",
                            name
                        )));
                    };
                    let def =
                        self.program.symbols.types.get(&qualified).cloned().expect("resolved");
                    let next_owner =
                        qualified.rsplit_once('.').map(|(module, _)| module.to_string());
                    match def {
                        TypeDef::Alias(alias) => {
                            let target = substitute_type_params(
                                &alias.target,
                                &alias.type_params,
                                args,
                            );
                            self.default_value(&target, next_owner.as_deref(), m)
                        }
                        TypeDef::Record(record) => {
                            let mut fields = Vec::with_capacity(record.fields.len());
                            for field in &record.fields {
                                let field_ty = substitute_type_params(
                                    &field.ty,
                                    &record.type_params,
                                    args,
                                );
                                fields.push((
                                    field.name.clone(),
                                    self.default_value(&field_ty, next_owner.as_deref(), m)?,
                                ));
                            }
                            Ok(Value::ctor(record.name.clone(), fields))
                        }
                        TypeDef::Sum(sum) => {
                            if sum.variants.is_empty() {
                                return Err(RuntimeError::msg(format!(
                                    "cannot default a value of uninhabited type `{}`",
                                    qualified
                                )));
                            }
                            let variant = sum
                                .variants
                                .iter()
                                .find(|v| v.fields.is_empty())
                                .unwrap_or(&sum.variants[0])
                                .clone();
                            let mut fields = Vec::with_capacity(variant.fields.len());
                            for field in &variant.fields {
                                let field_ty = substitute_type_params(
                                    &field.ty,
                                    &sum.type_params,
                                    args,
                                );
                                fields.push((
                                    field.name.clone(),
                                    self.default_value(&field_ty, next_owner.as_deref(), m)?,
                                ));
                            }
                            Ok(Value::ctor(variant.name, fields))
                        }
                    }
                }
            },
        }
    }

    /// Resolve a type name the way the checker's converter does: as
    /// already-qualified, relative to the owning module, then through the
    /// current module's imports.
    fn resolve_type_name(&self, name: &str, owner: Option<&str>, m: usize) -> Option<String> {
        let symbols = &self.program.symbols;
        if symbols.types.contains_key(name) {
            return Some(name.to_string());
        }
        if let Some(owner) = owner {
            let qualified = format!("{}.{}", owner, name);
            if symbols.types.contains_key(&qualified) {
                return Some(qualified);
            }
        }
        let resolved = resolve_identifier(name, self.module_at(m), symbols);
        if symbols.types.contains_key(&resolved) {
            return Some(resolved);
        }
        None
    }
}

/// Substitute type parameters by name in a surface type expression.
fn substitute_type_params(
    ty: &TypeExpr,
    params: &[String],
    args: &[TypeExpr],
) -> TypeExpr {
    let mapping: FxHashMap<&str, &TypeExpr> = params
        .iter()
        .map(String::as_str)
        .zip(args.iter())
        .collect();
    substitute_inner(ty, &mapping)
}

fn substitute_inner(ty: &TypeExpr, mapping: &FxHashMap<&str, &TypeExpr>) -> TypeExpr {
    match &ty.kind {
        TypeExprKind::Name { name, args } => {
            if args.is_empty() {
                if let Some(replacement) = mapping.get(name.as_str()) {
                    return (*replacement).clone();
                }
            }
            TypeExpr {
                kind: TypeExprKind::Name {
                    name: name.clone(),
                    args: args.iter().map(|a| substitute_inner(a, mapping)).collect(),
                },
                span: ty.span,
            }
        }
        TypeExprKind::Optional { inner } => TypeExpr {
            kind: TypeExprKind::Optional {
                inner: Box::new(substitute_inner(inner, mapping)),
            },
            span: ty.span,
        },
        TypeExprKind::Fn { params, ret } => TypeExpr {
            kind: TypeExprKind::Fn {
                params: params.iter().map(|p| substitute_inner(p, mapping)).collect(),
                ret: Box::new(substitute_inner(ret, mapping)),
            },
            span: ty.span,
        },
    }
}
