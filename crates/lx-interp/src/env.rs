//! Evaluation environments.
//!
//! An environment is a chain of scope frames. Function calls start a
//! fresh root containing only parameters; match arms extend with a child
//! frame; if-branches run in a forked copy so their bindings do not leak;
//! async tasks share the registration-time environment by reference
//! (cloning an `Env` clones the handle, not the frames).

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::value::Value;

/// A shared handle to a scope frame chain.
#[derive(Debug, Clone)]
pub struct Env(Rc<RefCell<Frame>>);

#[derive(Debug)]
struct Frame {
    vars: FxHashMap<String, Value>,
    parent: Option<Env>,
}

impl Env {
    /// A fresh root environment.
    pub fn root() -> Env {
        Env(Rc::new(RefCell::new(Frame {
            vars: FxHashMap::default(),
            parent: None,
        })))
    }

    /// A new child frame on top of this environment.
    pub fn child(&self) -> Env {
        Env(Rc::new(RefCell::new(Frame {
            vars: FxHashMap::default(),
            parent: Some(self.clone()),
        })))
    }

    /// A snapshot copy: same visible bindings, new frames throughout, so
    /// definitions in the copy never reach the original.
    pub fn fork(&self) -> Env {
        let frame = self.0.borrow();
        Env(Rc::new(RefCell::new(Frame {
            vars: frame.vars.clone(),
            parent: frame.parent.as_ref().map(|p| p.fork()),
        })))
    }

    /// Bind a name in the current frame.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    /// Look up a name, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.0.borrow();
        if let Some(value) = frame.vars.get(name) {
            return Some(value.clone());
        }
        frame.parent.as_ref().and_then(|p| p.get(name))
    }

    /// All visible bindings, outermost first (inner shadows outer).
    /// Used for property failure snapshots.
    pub fn flattened(&self) -> Vec<(String, Value)> {
        let mut layers = Vec::new();
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let frame = env.0.borrow();
            layers.push(
                frame
                    .vars
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>(),
            );
            current = frame.parent.clone();
        }
        let mut out: Vec<(String, Value)> = Vec::new();
        for layer in layers.into_iter().rev() {
            for (name, value) in layer {
                if let Some(slot) = out.iter_mut().find(|(n, _)| *n == name) {
                    slot.1 = value;
                } else {
                    out.push((name, value));
                }
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
