//! Actor runtime and supervision.
//!
//! The registry exclusively owns every actor instance; supervisors hold
//! child ids, never references. Sends enqueue on the target's FIFO
//! mailbox plus the global pending queue; handler dispatch builds an
//! environment from init params, state fields, and message bindings. A
//! handler failure stops the actor (cascading to its descendants) and
//! routes a `__child_failed` event to the nearest supervisor that
//! declares a handler for it; with none, the failure propagates to the
//! caller of `send`/`step`/`flush`.

use std::collections::VecDeque;
use std::rc::Rc;

use lx_ast::{ActorDecl, CHILD_FAILED};

use crate::env::Env;
use crate::error::{RResult, RuntimeError, RuntimeErrorKind};
use crate::eval::Flow;
use crate::value::Value;
use crate::Interp;

/// One live (or stopped) actor. Owned by the registry.
pub struct ActorInstance {
    pub id: u64,
    /// Qualified declaration name, for error messages.
    pub name: String,
    pub decl: Rc<ActorDecl>,
    pub module_idx: usize,
    /// Private environment: init params and state fields.
    pub env: Env,
    /// Weak handle to the spawning actor.
    pub supervisor: Option<u64>,
    pub children: Vec<u64>,
    pub mailbox: VecDeque<Value>,
    pub stopped: bool,
}

impl<'p> Interp<'p> {
    /// Spawn an actor: evaluate init arguments and state initializers,
    /// record the current actor as supervisor, register, return the ref.
    pub(crate) fn spawn_actor(
        &mut self,
        qualified: &str,
        decl: &Rc<ActorDecl>,
        module_idx: usize,
        init_values: Vec<Value>,
    ) -> RResult<Value> {
        let env = Env::root();
        for (param, value) in decl.params.iter().zip(init_values) {
            env.define(param.name.clone(), value);
        }
        // State initializers run in order; each sees the params and the
        // fields before it.
        for field in &decl.state {
            let value = self.eval_expr_value(&field.init, &env, module_idx)?;
            env.define(field.name.clone(), value);
        }

        let id = self.rt.alloc_actor_id();
        let supervisor = self.rt.current_actor;
        self.rt.actors.insert(
            id,
            ActorInstance {
                id,
                name: qualified.to_string(),
                decl: Rc::clone(decl),
                module_idx,
                env,
                supervisor,
                children: Vec::new(),
                mailbox: VecDeque::new(),
                stopped: false,
            },
        );
        if let Some(sup) = supervisor {
            if let Some(parent) = self.rt.actors.get_mut(&sup) {
                parent.children.push(id);
            }
        }
        Ok(Value::ActorRef(id))
    }

    /// Enqueue a message on an actor's mailbox. In immediate mode the
    /// queue drains at the next statement boundary; in deterministic mode
    /// it waits for `Concurrent.flush`/`step`.
    pub(crate) fn send_message(&mut self, target: u64, message: Value) -> RResult<Value> {
        let Some(instance) = self.rt.actors.get_mut(&target) else {
            return Err(RuntimeError::msg(format!("unknown actor {}", target)));
        };
        if instance.stopped {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ActorStopped { id: target },
                None,
            ));
        }
        let Value::Ctor { name, .. } = &message else {
            return Err(RuntimeError::msg(format!(
                "message must be a constructor value, found {}",
                message.type_word()
            )));
        };
        if instance.decl.handler(name).is_none() {
            return Err(RuntimeError::msg(format!(
                "actor `{}` has no handler for message `{}`",
                instance.name, name
            )));
        }
        instance.mailbox.push_back(message);
        self.rt.pending.push_back(target);
        Ok(Value::Unit)
    }

    /// Drain one pending delivery. Returns whether one was dispatched.
    pub(crate) fn process_one_delivery(&mut self) -> RResult<bool> {
        loop {
            let Some(id) = self.rt.pending.pop_front() else {
                return Ok(false);
            };
            let Some(instance) = self.rt.actors.get_mut(&id) else {
                continue;
            };
            if instance.stopped {
                continue;
            }
            let Some(message) = instance.mailbox.pop_front() else {
                continue;
            };
            self.dispatch_message(id, message)?;
            return Ok(true);
        }
    }

    /// Drain every pending delivery; returns the count dispatched.
    pub(crate) fn drain_deliveries(&mut self) -> RResult<i64> {
        let mut count = 0i64;
        while self.process_one_delivery()? {
            count += 1;
        }
        Ok(count)
    }

    /// Dispatch one message: bind, evaluate the handler body, and route
    /// failures to supervision. Returns the handler's value.
    pub(crate) fn dispatch_message(&mut self, id: u64, message: Value) -> RResult<Value> {
        let (decl, module_idx, actor_env) = {
            let Some(instance) = self.rt.actors.get(&id) else {
                return Err(RuntimeError::msg(format!("unknown actor {}", id)));
            };
            if instance.stopped {
                return Err(RuntimeError::new(
                    RuntimeErrorKind::ActorStopped { id },
                    None,
                ));
            }
            (Rc::clone(&instance.decl), instance.module_idx, instance.env.clone())
        };

        let Value::Ctor { name, fields } = &message else {
            return Err(RuntimeError::msg("message must be a constructor value"));
        };
        let Some(handler) = decl.handler(name) else {
            return Err(RuntimeError::msg(format!(
                "actor `{}` cannot route message `{}`",
                id, name
            )));
        };

        let handler_env = actor_env.child();
        let param_names: Vec<&str> = handler.params.iter().map(|p| p.name.as_str()).collect();
        let field_names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        let binds_fields = {
            let mut p: Vec<&str> = param_names.clone();
            let mut f: Vec<&str> = field_names.clone();
            p.sort_unstable();
            f.sort_unstable();
            p == f
        };
        if binds_fields {
            for param in &handler.params {
                let value = message
                    .field(&param.name)
                    .cloned()
                    .expect("field set equality checked");
                handler_env.define(param.name.clone(), value);
            }
        } else if handler.params.len() == 1 {
            handler_env.define(handler.params[0].name.clone(), message.clone());
        } else if !handler.params.is_empty() {
            return Err(RuntimeError::msg(format!(
                "handler `{}` parameters do not match message `{}`",
                handler.message, name
            )));
        }

        let previous_actor = self.rt.current_actor.replace(id);
        let outcome = self.eval_block(&handler.body, &handler_env, module_idx);
        self.rt.current_actor = previous_actor;

        match outcome {
            Ok(Flow::Value(v)) | Ok(Flow::Return(v)) => Ok(v),
            Err(failure) => self.handle_actor_failure(id, failure),
        }
    }

    /// A handler failed: stop the actor (and its descendants), then route
    /// a `__child_failed` event to the nearest supervisor declaring a
    /// handler for it. With no such supervisor the failure re-raises.
    fn handle_actor_failure(&mut self, id: u64, failure: RuntimeError) -> RResult<Value> {
        let supervisor = self.rt.actors.get(&id).and_then(|a| a.supervisor);
        self.stop_actor_tree(id);

        let mut candidate = supervisor;
        while let Some(sup_id) = candidate {
            let Some(sup) = self.rt.actors.get(&sup_id) else { break };
            if !sup.stopped && sup.decl.handler(CHILD_FAILED).is_some() {
                let event = Value::ctor(
                    CHILD_FAILED,
                    vec![
                        ("child".into(), Value::ActorRef(id)),
                        ("reason".into(), Value::Str(failure.to_string())),
                    ],
                );
                let sup = self.rt.actors.get_mut(&sup_id).expect("checked above");
                sup.mailbox.push_back(event);
                self.rt.pending.push_back(sup_id);
                return Ok(Value::Unit);
            }
            candidate = sup.supervisor;
        }
        Err(failure)
    }

    /// Stop an actor and all its descendants; purge their pending
    /// deliveries and mailboxes. Returns whether the actor existed.
    pub(crate) fn stop_actor_tree(&mut self, id: u64) -> bool {
        if !self.rt.actors.contains_key(&id) {
            return false;
        }
        let mut queue = vec![id];
        let mut stopped = Vec::new();
        while let Some(current) = queue.pop() {
            if let Some(instance) = self.rt.actors.get_mut(&current) {
                if instance.stopped {
                    continue;
                }
                instance.stopped = true;
                instance.mailbox.clear();
                queue.extend(instance.children.iter().copied());
                stopped.push(current);
            }
        }
        self.rt.pending.retain(|pending_id| !stopped.contains(pending_id));
        true
    }
}
