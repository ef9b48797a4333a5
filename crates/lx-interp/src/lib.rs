//! The Lx tree-walking interpreter.
//!
//! Evaluates a loaded (and ideally type-checked) program: expressions and
//! statements, contract enforcement, the actor runtime with supervision,
//! the async-group scheduler, the property engine, and the test runner.
//! The interpreter raises on the first runtime error per call, surfacing
//! it to the nearest group or supervisor boundary.
//!
//! # Architecture
//!
//! - [`value`]: the runtime value union
//! - [`env`]: shared-frame evaluation environments
//! - [`eval`]: the statement/expression evaluator and call dispatch
//! - [`actor`]: actor registry, mailboxes, supervision
//! - [`tasks`]: round-robin async-group scheduling
//! - [`props`]: typed generators and the property engine
//! - [`runner`]: test/property collection and outcomes
//! - [`builtins`]: implementations of the builtin catalog
//! - [`json`]: the value <-> JSON codec
//! - [`runtime`]: the explicit shared-state bundle (registry, queues,
//!   logs, RNG)

pub mod actor;
pub mod builtins;
pub mod env;
pub mod error;
pub mod eval;
pub mod json;
pub mod props;
pub mod runner;
pub mod runtime;
pub mod value;

use std::rc::Rc;

use rustc_hash::FxHashMap;

use lx_ast::{ActorDecl, Decl, FnDecl, Module};
use lx_loader::{resolve_identifier, Program};

use crate::env::Env;
use crate::error::{RResult, RuntimeError};
use crate::eval::Flow;
use crate::value::Value;

pub use crate::runner::{run_tests, OutcomeKind, TestOutcome};
pub use crate::runtime::{OutputFormat, Runtime, RuntimeOptions, SchedulerMode};

mod tasks;

/// The interpreter: a loaded program plus all mutable runtime state.
pub struct Interp<'p> {
    pub program: &'p Program,
    pub rt: Runtime,
    /// Qualified function name -> declaration and defining module.
    fn_index: FxHashMap<String, (Rc<FnDecl>, usize)>,
    /// Qualified actor name -> declaration and defining module.
    actor_index: FxHashMap<String, (Rc<ActorDecl>, usize)>,
    /// Bare variant name -> ordered field names (for building message
    /// values on direct handler calls).
    variant_fields: FxHashMap<String, Vec<String>>,
    entry_idx: usize,
}

impl<'p> Interp<'p> {
    pub fn new(program: &'p Program, options: RuntimeOptions) -> Self {
        let mut fn_index = FxHashMap::default();
        let mut actor_index = FxHashMap::default();
        let mut variant_fields: FxHashMap<String, Vec<String>> = FxHashMap::default();

        for (idx, loaded) in program.modules.iter().enumerate() {
            let module = &loaded.module;
            for decl in &module.decls {
                match decl {
                    Decl::Fn(d) => {
                        fn_index.insert(module.qualify(&d.name), (Rc::new(d.clone()), idx));
                    }
                    Decl::Actor(d) => {
                        actor_index.insert(module.qualify(&d.name), (Rc::new(d.clone()), idx));
                    }
                    Decl::Sum(d) => {
                        for variant in &d.variants {
                            variant_fields.entry(variant.name.clone()).or_insert_with(|| {
                                variant.fields.iter().map(|f| f.name.clone()).collect()
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        let entry_idx = program.modules.len().saturating_sub(1);
        Interp {
            program,
            rt: Runtime::new(options),
            fn_index,
            actor_index,
            variant_fields,
            entry_idx,
        }
    }

    /// The module the toolchain was invoked on (last in topological
    /// order).
    pub fn entry_module(&self) -> &Module {
        &self.program.modules[self.entry_idx].module
    }

    pub(crate) fn module_at(&self, idx: usize) -> &Module {
        &self.program.modules[idx].module
    }

    pub(crate) fn entry_idx(&self) -> usize {
        self.entry_idx
    }

    pub(crate) fn fn_lookup(&self, qualified: &str) -> Option<(Rc<FnDecl>, usize)> {
        self.fn_index
            .get(qualified)
            .map(|(decl, idx)| (Rc::clone(decl), *idx))
    }

    pub(crate) fn actor_lookup(&self, qualified: &str) -> Option<(Rc<ActorDecl>, usize)> {
        self.actor_index
            .get(qualified)
            .map(|(decl, idx)| (Rc::clone(decl), *idx))
    }

    pub(crate) fn variant_field_names(&self, ctor: &str) -> Option<&[String]> {
        self.variant_fields.get(ctor).map(Vec::as_slice)
    }

    /// Invoke a function by (possibly unqualified) name with already
    /// evaluated arguments. The name resolves relative to the entry
    /// module. Used by the CLI's `run` subcommand.
    pub fn run_function(&mut self, name: &str, args: Vec<Value>) -> RResult<Value> {
        let entry = self.entry_module();
        let resolved = resolve_identifier(name, entry, &self.program.symbols);
        let Some((decl, _)) = self.fn_lookup(&resolved) else {
            return Err(RuntimeError::msg(format!("unknown function `{}`", name)));
        };
        if decl.params.len() != args.len() {
            return Err(RuntimeError::msg(format!(
                "`{}` expects {} arguments, got {}",
                name,
                decl.params.len(),
                args.len()
            )));
        }
        self.call_user_function(&resolved, args, None)
    }

    /// Evaluate a block in a fresh environment of the entry module.
    /// Drives tests and properties.
    pub(crate) fn eval_entry_block(&mut self, block: &lx_ast::Block, env: &Env) -> RResult<Flow> {
        let idx = self.entry_idx;
        self.eval_block(block, env, idx)
    }
}
