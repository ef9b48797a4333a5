//! The statement/expression evaluator.
//!
//! Statements yield either a value or an early return ([`Flow`]); a block
//! stops at the first return, otherwise its value is the last statement's
//! value (Unit by default). Calls dispatch through a discriminator: actor
//! send, actor spawn/handler, builtin by exact name, then user functions
//! with contract enforcement.
//!
//! Both operands of every binary operator evaluate before the operator
//! applies; `&&`/`||` deliberately do not short-circuit, matching the
//! type checker's symmetric treatment.

use std::rc::Rc;

use lx_ast::{Arg, BinOp, Block, Expr, ExprKind, MatchCase, Pattern, PatternKind, Stmt, StmtKind};
use lx_ast::align::align_args;
use lx_common::Span;
use lx_loader::resolve_identifier;

use crate::env::Env;
use crate::error::{RResult, RuntimeError, RuntimeErrorKind};
use crate::runtime::{SchedulerMode, TraceStep};
use crate::value::Value;
use crate::Interp;

/// The result of evaluating a statement or block: a plain value, or an
/// early `return` propagating outward.
#[derive(Debug, Clone)]
pub enum Flow {
    Value(Value),
    Return(Value),
}

impl Flow {
    /// The carried value, collapsing the return distinction. Used at
    /// function boundaries where both mean "this is the result".
    pub fn into_value(self) -> Value {
        match self {
            Flow::Value(v) | Flow::Return(v) => v,
        }
    }
}

/// Argument evaluation outcome: the slot-ordered values, or an early
/// return escaping from inside an argument expression.
pub(crate) enum ArgsFlow {
    Values(Vec<Value>),
    Return(Value),
}

/// Unwrap a `Flow`, propagating an early return to the caller.
macro_rules! value_of {
    ($flow:expr) => {
        match $flow? {
            Flow::Return(v) => return Ok(Flow::Return(v)),
            Flow::Value(v) => v,
        }
    };
}

/// Unwrap an `ArgsFlow`, propagating an early return to the caller.
macro_rules! args_of {
    ($flow:expr) => {
        match $flow? {
            ArgsFlow::Return(v) => return Ok(Flow::Return(v)),
            ArgsFlow::Values(vs) => vs,
        }
    };
}

impl<'p> Interp<'p> {
    // ── Blocks and statements ───────────────────────────────────────────

    /// Evaluate statements in order. Stops at the first `return`. In
    /// immediate scheduler mode, pending actor deliveries drain after
    /// each statement.
    pub(crate) fn eval_block(&mut self, block: &Block, env: &Env, m: usize) -> RResult<Flow> {
        let mut last = Value::Unit;
        for stmt in block {
            match self.eval_stmt(stmt, env, m)? {
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Value(v) => last = v,
            }
            self.drain_if_immediate()?;
        }
        Ok(Flow::Value(last))
    }

    pub(crate) fn drain_if_immediate(&mut self) -> RResult<()> {
        if self.rt.options.scheduler == SchedulerMode::Immediate && !self.rt.pending.is_empty() {
            self.drain_deliveries()?;
        }
        Ok(())
    }

    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt, env: &Env, m: usize) -> RResult<Flow> {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                let v = value_of!(self.eval_expr(value, env, m));
                env.define(name.clone(), v);
                Ok(Flow::Value(Value::Unit))
            }
            StmtKind::Return { value } => {
                let v = match value {
                    Some(e) => value_of!(self.eval_expr(e, env, m)),
                    None => Value::Unit,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::Expr { value } => self.eval_expr(value, env, m),
            StmtKind::Match { scrutinee, cases } => {
                let value = value_of!(self.eval_expr(scrutinee, env, m));
                match self.eval_match_arms(&value, cases, env, m, stmt.span)? {
                    Flow::Return(v) => Ok(Flow::Return(v)),
                    Flow::Value(_) => Ok(Flow::Value(Value::Unit)),
                }
            }
            StmtKind::AsyncGroup { body } => self.run_async_group(body, env, m, stmt.span),
            StmtKind::Async { .. } => Err(RuntimeError::msg(
                "`async` outside of an `async_group`",
            )
            .with_span(stmt.span)),
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &Env, m: usize) -> RResult<Flow> {
        let value = match &expr.kind {
            ExprKind::Int { value } => Value::Int(*value),
            ExprKind::Bool { value } => Value::Bool(*value),
            ExprKind::Str { value } => Value::Str(value.clone()),
            ExprKind::Var { name } => self.eval_var(name, env, m, expr.span)?,
            ExprKind::List { items } => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(value_of!(self.eval_expr(item, env, m)));
                }
                Value::List(out)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = value_of!(self.eval_expr(lhs, env, m));
                let right = value_of!(self.eval_expr(rhs, env, m));
                self.apply_binary(*op, left, right, expr.span)?
            }
            ExprKind::Call { callee, args } => {
                return self.eval_call(callee, args, env, m, expr.span)
            }
            ExprKind::Record { name, fields } => {
                let mut out = Vec::with_capacity(fields.len());
                for field in fields {
                    let v = value_of!(self.eval_expr(&field.value, env, m));
                    out.push((field.name.clone(), v));
                }
                let bare = name.rsplit('.').next().unwrap_or(name);
                Value::ctor(bare, out)
            }
            ExprKind::Field { target, name } => {
                let value = value_of!(self.eval_expr(target, env, m));
                match value.field(name) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(RuntimeError::msg(format!(
                            "{} has no field `{}`",
                            value.type_word(),
                            name
                        ))
                        .with_span(expr.span))
                    }
                }
            }
            ExprKind::Index { target, index } => {
                let list = value_of!(self.eval_expr(target, env, m));
                let idx = value_of!(self.eval_expr(index, env, m));
                let Value::List(items) = list else {
                    return Err(RuntimeError::msg(format!(
                        "cannot index into {}",
                        list.type_word()
                    ))
                    .with_span(expr.span));
                };
                let Value::Int(i) = idx else {
                    return Err(RuntimeError::msg("list index must be Int").with_span(expr.span));
                };
                if i < 0 || i as usize >= items.len() {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::IndexOutOfBounds { index: i, len: items.len() },
                        expr.span,
                    ));
                }
                items[i as usize].clone()
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                let condition = value_of!(self.eval_expr(cond, env, m));
                let Value::Bool(b) = condition else {
                    return Err(RuntimeError::msg(format!(
                        "if condition must be Bool, found {}",
                        condition.type_word()
                    ))
                    .with_span(cond.span));
                };
                // Branches run in a snapshot of the caller's environment.
                let branch_env = env.fork();
                if b {
                    value_of!(self.eval_block(then_branch, &branch_env, m))
                } else {
                    match else_branch {
                        Some(block) => value_of!(self.eval_block(block, &branch_env, m)),
                        None => Value::Unit,
                    }
                }
            }
            ExprKind::Match { scrutinee, cases } => {
                let value = value_of!(self.eval_expr(scrutinee, env, m));
                value_of!(self.eval_match_arms(&value, cases, env, m, expr.span))
            }
            ExprKind::Hole => {
                return Err(RuntimeError::new(RuntimeErrorKind::Hole, expr.span))
            }
        };
        Ok(Flow::Value(value))
    }

    /// Evaluate an expression that cannot legally early-return (contract
    /// clauses, predicates, state initializers).
    pub(crate) fn eval_expr_value(&mut self, expr: &Expr, env: &Env, m: usize) -> RResult<Value> {
        match self.eval_expr(expr, env, m)? {
            Flow::Value(v) => Ok(v),
            Flow::Return(_) => {
                Err(RuntimeError::msg("`return` is not allowed here").with_span(expr.span))
            }
        }
    }

    fn eval_var(&mut self, name: &str, env: &Env, m: usize, span: Option<Span>) -> RResult<Value> {
        if let Some(value) = env.get(name) {
            return Ok(value);
        }
        let resolved = resolve_identifier(name, self.module_at(m), &self.program.symbols);
        if self.fn_lookup(&resolved).is_some() {
            return Ok(Value::Fn { name: resolved });
        }
        Err(RuntimeError::msg(format!("unbound variable `{}`", name)).with_span(span))
    }

    fn apply_binary(
        &mut self,
        op: BinOp,
        left: Value,
        right: Value,
        span: Option<Span>,
    ) -> RResult<Value> {
        use BinOp::*;
        match op {
            Add | Sub | Mul | Div | Lt | Le | Gt | Ge => {
                let (Value::Int(a), Value::Int(b)) = (&left, &right) else {
                    return Err(RuntimeError::msg(format!(
                        "operator `{}` needs Int operands, found {} and {}",
                        op,
                        left.type_word(),
                        right.type_word()
                    ))
                    .with_span(span));
                };
                let (a, b) = (*a, *b);
                Ok(match op {
                    Add => Value::Int(a.wrapping_add(b)),
                    Sub => Value::Int(a.wrapping_sub(b)),
                    Mul => Value::Int(a.wrapping_mul(b)),
                    Div => {
                        if b == 0 {
                            return Err(RuntimeError::new(
                                RuntimeErrorKind::DivisionByZero,
                                span,
                            ));
                        }
                        Value::Int(floor_div(a, b))
                    }
                    Lt => Value::Bool(a < b),
                    Le => Value::Bool(a <= b),
                    Gt => Value::Bool(a > b),
                    Ge => Value::Bool(a >= b),
                    _ => unreachable!(),
                })
            }
            And | Or => {
                let (Value::Bool(a), Value::Bool(b)) = (&left, &right) else {
                    return Err(RuntimeError::msg(format!(
                        "operator `{}` needs Bool operands, found {} and {}",
                        op,
                        left.type_word(),
                        right.type_word()
                    ))
                    .with_span(span));
                };
                Ok(Value::Bool(if op == And { *a && *b } else { *a || *b }))
            }
            Eq => Ok(Value::Bool(left == right)),
            Ne => Ok(Value::Bool(left != right)),
        }
    }

    // ── Pattern matching ────────────────────────────────────────────────

    /// The first matching arm wins; no arm is a runtime error.
    fn eval_match_arms(
        &mut self,
        scrutinee: &Value,
        cases: &[MatchCase],
        env: &Env,
        m: usize,
        span: Option<Span>,
    ) -> RResult<Flow> {
        for case in cases {
            let arm_env = env.child();
            if bind_pattern(&case.pattern, scrutinee, &arm_env) {
                return self.eval_block(&case.body, &arm_env, m);
            }
        }
        Err(RuntimeError::new(RuntimeErrorKind::NonExhaustiveMatch, span))
    }

    // ── Calls ───────────────────────────────────────────────────────────

    fn eval_call(
        &mut self,
        callee: &str,
        args: &[Arg],
        env: &Env,
        m: usize,
        span: Option<Span>,
    ) -> RResult<Flow> {
        // 1. Actor send: `<ref>.send(msg)`.
        if let Some(head) = callee.strip_suffix(".send") {
            if let Some(Value::ActorRef(target)) = env.get(head) {
                let values = args_of!(self.eval_aligned_args(callee, &["message"], args, env, m, span));
                let message = values.into_iter().next().expect("send takes one argument");
                let result = self.send_message(target, message).map_err(|e| e.with_span(span))?;
                return Ok(Flow::Value(result));
            }
        }

        // 2. Actor spawn and direct handler invocation.
        if let Some((head, method)) = callee.rsplit_once('.') {
            let resolved = resolve_identifier(head, self.module_at(m), &self.program.symbols);
            if let Some((decl, actor_m)) = self.actor_lookup(&resolved) {
                return self.eval_actor_call(callee, &resolved, &decl, actor_m, method, args, env, m, span);
            }
        }

        // 3. Builtins by exact callee name.
        if let Some(sig) = lx_typeck::builtins::lookup(callee) {
            let values = args_of!(self.eval_aligned_args(callee, sig.params, args, env, m, span));
            let result = self.call_builtin(callee, values, span)?;
            return Ok(Flow::Value(result));
        }

        // 4. User functions.
        let resolved = resolve_identifier(callee, self.module_at(m), &self.program.symbols);
        if let Some((decl, _)) = self.fn_lookup(&resolved) {
            let param_names: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
            let values = args_of!(self.eval_aligned_args(callee, &param_names, args, env, m, span));
            let result = self.call_user_function(&resolved, values, span)?;
            return Ok(Flow::Value(result));
        }

        Err(RuntimeError::msg(format!("unknown function `{}`", callee)).with_span(span))
    }

    /// Evaluate call arguments left-to-right as written, then place them
    /// into parameter slots. The first alignment issue raises.
    fn eval_aligned_args(
        &mut self,
        callee: &str,
        params: &[&str],
        args: &[Arg],
        env: &Env,
        m: usize,
        span: Option<Span>,
    ) -> RResult<ArgsFlow> {
        let alignment = align_args(params, args);
        if let Some(issue) = alignment.issues.first() {
            return Err(
                RuntimeError::msg(format!("in call to `{}`: {}", callee, issue)).with_span(span)
            );
        }
        let mut evaluated: Vec<Option<Value>> = Vec::with_capacity(args.len());
        for arg in args {
            match self.eval_expr(&arg.value, env, m)? {
                Flow::Return(v) => return Ok(ArgsFlow::Return(v)),
                Flow::Value(v) => evaluated.push(Some(v)),
            }
        }
        let mut out = Vec::with_capacity(params.len());
        for slot in &alignment.slots {
            let idx = slot.expect("clean alignment fills every slot");
            out.push(evaluated[idx].take().expect("each argument fills one slot"));
        }
        Ok(ArgsFlow::Values(out))
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_actor_call(
        &mut self,
        callee: &str,
        actor_qualified: &str,
        decl: &Rc<lx_ast::ActorDecl>,
        actor_m: usize,
        method: &str,
        args: &[Arg],
        env: &Env,
        m: usize,
        span: Option<Span>,
    ) -> RResult<Flow> {
        if method == "spawn" {
            let param_names: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
            let values = args_of!(self.eval_aligned_args(callee, &param_names, args, env, m, span));
            let spawned = self
                .spawn_actor(actor_qualified, decl, actor_m, values)
                .map_err(|e| e.with_span(span))?;
            return Ok(Flow::Value(spawned));
        }

        let Some(handler) = decl.handler(method) else {
            return Err(RuntimeError::msg(format!(
                "actor `{}` has no operation `{}`",
                actor_qualified, method
            ))
            .with_span(span));
        };

        // Synthetic signature: (actor, ...message fields).
        let field_names: Vec<String> = if method == lx_ast::CHILD_FAILED {
            vec!["child".into(), "reason".into()]
        } else {
            self.variant_field_names(method)
                .map(|names| names.to_vec())
                .unwrap_or_default()
        };
        let mut params: Vec<&str> = vec!["actor"];
        params.extend(field_names.iter().map(String::as_str));
        let values = args_of!(self.eval_aligned_args(callee, &params, args, env, m, span));

        let mut values = values.into_iter();
        let target = values.next().expect("actor slot is always present");
        let Value::ActorRef(target) = target else {
            return Err(RuntimeError::msg(format!(
                "first argument of `{}` must be an actor reference",
                callee
            ))
            .with_span(span));
        };
        let message = Value::ctor(
            handler.message.clone(),
            field_names.into_iter().zip(values).collect(),
        );
        let result = self
            .dispatch_message(target, message)
            .map_err(|e| e.with_span(span))?;
        Ok(Flow::Value(result))
    }

    // ── User function calls & contracts ─────────────────────────────────

    /// Call a user function with slot-ordered argument values: bind a
    /// fresh environment, enforce `requires`, evaluate the body, enforce
    /// `ensures` with `result` bound, and trace if enabled.
    pub(crate) fn call_user_function(
        &mut self,
        qualified: &str,
        values: Vec<Value>,
        span: Option<Span>,
    ) -> RResult<Value> {
        let Some((decl, fn_m)) = self.fn_lookup(qualified) else {
            return Err(
                RuntimeError::msg(format!("unknown function `{}`", qualified)).with_span(span)
            );
        };

        let env = Env::root();
        let bindings: Vec<(String, String)> = if self.rt.options.trace {
            decl.params
                .iter()
                .zip(values.iter())
                .map(|(p, v)| (p.name.clone(), v.to_string()))
                .collect()
        } else {
            Vec::new()
        };
        for (param, value) in decl.params.iter().zip(values) {
            env.define(param.name.clone(), value);
        }

        let contract = self.program.symbols.contracts.get(qualified).cloned();
        if let Some(contract) = &contract {
            for (index, clause) in contract.requires.iter().enumerate() {
                let holds = self.eval_expr_value(clause, &env, fn_m)?;
                if holds != Value::Bool(true) {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ContractViolation {
                            fn_name: qualified.to_string(),
                            clause: "requires",
                            index,
                        },
                        span.or(clause.span),
                    ));
                }
            }
        }

        let depth = self.rt.trace_depth;
        self.rt.trace_depth += 1;
        let outcome = self.eval_block(&decl.body, &env, fn_m);
        self.rt.trace_depth = depth;
        let result = outcome?.into_value();

        if let Some(contract) = &contract {
            let ensures_env = env.child();
            ensures_env.define("result", result.clone());
            for (index, clause) in contract.ensures.iter().enumerate() {
                let holds = self.eval_expr_value(clause, &ensures_env, fn_m)?;
                if holds != Value::Bool(true) {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ContractViolation {
                            fn_name: qualified.to_string(),
                            clause: "ensures",
                            index,
                        },
                        span.or(clause.span),
                    ));
                }
            }
        }

        if self.rt.options.trace {
            self.rt.trace.push(TraceStep {
                kind: "call",
                depth,
                call: qualified.to_string(),
                bindings,
                result: result.to_string(),
            });
        }
        Ok(result)
    }

    /// Call a function value (a bare-name reference) with positional
    /// arguments. Used by higher-order builtins.
    pub(crate) fn call_function_value(
        &mut self,
        callable: &Value,
        args: Vec<Value>,
        span: Option<Span>,
    ) -> RResult<Value> {
        match callable {
            Value::Fn { name } => self.call_user_function(name, args, span),
            other => Err(RuntimeError::msg(format!(
                "expected a function, found {}",
                other.type_word()
            ))
            .with_span(span)),
        }
    }
}

/// Floor division (rounds toward negative infinity).
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Try to match a value against a pattern, binding into `env`.
/// Returns whether the pattern matched; on failure, `env` may hold
/// partial bindings (the caller discards the arm environment).
pub(crate) fn bind_pattern(pattern: &Pattern, value: &Value, env: &Env) -> bool {
    match &pattern.kind {
        PatternKind::Wildcard => true,
        PatternKind::Bind { name } => {
            env.define(name.clone(), value.clone());
            true
        }
        PatternKind::Ctor { name, fields } => {
            let Value::Ctor { name: value_name, .. } = value else {
                return false;
            };
            if value_name != name {
                return false;
            }
            for sub in fields {
                let Some(field_value) = value.field(&sub.name) else {
                    return false;
                };
                let field_value = field_value.clone();
                if !bind_pattern(&sub.pattern, &field_value, env) {
                    return false;
                }
            }
            true
        }
    }
}
