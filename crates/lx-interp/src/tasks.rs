//! The async-group scheduler.
//!
//! `async_group { … }` runs its non-`async` statements synchronously
//! (they may return early from the enclosing function), registering each
//! `async { … }` block as a task sharing the group's environment. After
//! the body, tasks run round-robin, one statement per turn, until all
//! complete. A failing task cancels its siblings and re-raises; `return`
//! inside a task is fatal.

use lx_ast::{Block, Stmt, StmtKind};
use lx_common::Span;

use crate::env::Env;
use crate::error::{RResult, RuntimeError};
use crate::eval::Flow;
use crate::value::Value;
use crate::Interp;

/// One registered task: a shared environment handle, the statement list,
/// and a cursor. Tasks are tuples driven by an explicit loop, not
/// coroutines.
struct Task<'b> {
    env: Env,
    stmts: &'b Block,
    index: usize,
    done: bool,
    cancelled: bool,
}

impl<'p> Interp<'p> {
    pub(crate) fn run_async_group(
        &mut self,
        body: &Block,
        env: &Env,
        m: usize,
        span: Option<Span>,
    ) -> RResult<Flow> {
        let mut tasks: Vec<Task<'_>> = Vec::new();

        // Synchronous phase: run the body, registering async blocks.
        for stmt in body {
            if let StmtKind::Async { body: task_body } = &stmt.kind {
                tasks.push(Task {
                    env: env.clone(),
                    stmts: task_body,
                    index: 0,
                    done: task_body.is_empty(),
                    cancelled: false,
                });
                continue;
            }
            match self.eval_stmt(stmt, env, m)? {
                // Early return abandons the group, registered tasks included.
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Value(_) => {}
            }
            self.drain_if_immediate()?;
        }

        // Round-robin phase: one statement per task per turn.
        while tasks.iter().any(|t| !t.done) {
            for i in 0..tasks.len() {
                if tasks[i].done || tasks[i].cancelled {
                    continue;
                }
                let stmt: &Stmt = &tasks[i].stmts[tasks[i].index];
                let stmt_span = stmt.span;
                let task_env = tasks[i].env.clone();
                let step = self.eval_stmt(stmt, &task_env, m);
                match step {
                    Ok(Flow::Value(_)) => {
                        tasks[i].index += 1;
                        if tasks[i].index == tasks[i].stmts.len() {
                            tasks[i].done = true;
                        }
                    }
                    Ok(Flow::Return(_)) => {
                        cancel_siblings(&mut tasks, i);
                        return Err(RuntimeError::msg(
                            "`return` inside an async task",
                        )
                        .with_span(stmt_span.or(span)));
                    }
                    Err(failure) => {
                        cancel_siblings(&mut tasks, i);
                        return Err(failure);
                    }
                }
                if let Err(failure) = self.drain_if_immediate() {
                    cancel_siblings(&mut tasks, i);
                    return Err(failure);
                }
            }
        }

        Ok(Flow::Value(Value::Unit))
    }
}

/// Mark every unfinished sibling cancelled and complete.
fn cancel_siblings(tasks: &mut [Task<'_>], failed: usize) {
    for (i, task) in tasks.iter_mut().enumerate() {
        if i != failed && !task.done {
            task.cancelled = true;
            task.done = true;
        }
    }
    tasks[failed].done = true;
}
