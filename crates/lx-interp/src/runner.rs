//! The test runner.
//!
//! Collects every test and property of the primary (entry) module and
//! runs them sequentially; a failure never stops the remaining ones.
//! Each outcome records its kind, name, and error message if any.

use serde::Serialize;

use lx_ast::Decl;

use crate::env::Env;
use crate::eval::Flow;
use crate::value::Value;
use crate::Interp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Test,
    Property,
}

/// The result of one test or property run.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub kind: OutcomeKind,
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    fn pass(kind: OutcomeKind, name: &str) -> Self {
        TestOutcome { kind, name: name.to_string(), success: true, error: None }
    }

    fn fail(kind: OutcomeKind, name: &str, error: String) -> Self {
        TestOutcome { kind, name: name.to_string(), success: false, error: Some(error) }
    }
}

/// Run every test and property declared in the entry module, in
/// declaration order.
pub fn run_tests(interp: &mut Interp<'_>) -> Vec<TestOutcome> {
    let decls: Vec<Decl> = interp.entry_module().decls.clone();
    let mut outcomes = Vec::new();

    for decl in &decls {
        match decl {
            Decl::Test(test) => {
                let env = Env::root();
                let outcome = match interp.eval_entry_block(&test.body, &env) {
                    Ok(Flow::Value(Value::Unit)) => OutcomeResult::Pass,
                    Ok(Flow::Return(Value::Unit)) => OutcomeResult::Pass,
                    Ok(Flow::Value(other)) | Ok(Flow::Return(other)) => {
                        OutcomeResult::Fail(format!("test returned a non-unit value: {}", other))
                    }
                    Err(e) => OutcomeResult::Fail(e.to_string()),
                };
                outcomes.push(match outcome {
                    OutcomeResult::Pass => TestOutcome::pass(OutcomeKind::Test, &test.name),
                    OutcomeResult::Fail(error) => {
                        TestOutcome::fail(OutcomeKind::Test, &test.name, error)
                    }
                });
            }
            Decl::Property(property) => {
                let outcome = match interp.run_property(property) {
                    Ok(()) => TestOutcome::pass(OutcomeKind::Property, &property.name),
                    Err(failure) => {
                        TestOutcome::fail(OutcomeKind::Property, &property.name, failure.to_string())
                    }
                };
                outcomes.push(outcome);
            }
            _ => {}
        }
    }
    outcomes
}

enum OutcomeResult {
    Pass,
    Fail(String),
}
