//! The Runtime: explicit, shared mutable state of one execution session.
//!
//! Owns the actor registry, the pending-delivery queue, the structured
//! log collector, the call-trace buffer, and the seeded RNG. There are no
//! hidden globals; everything is threaded through this struct.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value as Json;

use lx_common::XorShift32;

use crate::actor::ActorInstance;

/// How actor deliveries are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerMode {
    /// Pending deliveries drain as soon as the current statement
    /// completes.
    #[default]
    Immediate,
    /// Deliveries queue up and drain only on `Concurrent.flush`/`step`,
    /// in insertion order. Reproducible given a seed.
    Deterministic,
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Formatted lines on stdout.
    #[default]
    Text,
    /// Structured records appended to the runtime's collector.
    Json,
}

/// Host-selected execution options.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub scheduler: SchedulerMode,
    pub format: OutputFormat,
    /// Seed for the deterministic RNG; `None` seeds from the host clock.
    pub seed: Option<u32>,
    /// Record a step for every user function call.
    pub trace: bool,
}

/// A structured log record: `{kind:"log", ts, level, label, payload}`.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub kind: &'static str,
    pub ts: u64,
    pub level: &'static str,
    pub label: String,
    pub payload: Json,
}

/// One recorded user-function call.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub kind: &'static str,
    pub depth: u32,
    pub call: String,
    /// Parameter name and rendered value, in parameter order.
    pub bindings: Vec<(String, String)>,
    pub result: String,
}

/// All mutable execution state.
pub struct Runtime {
    pub options: RuntimeOptions,
    pub rng: XorShift32,
    /// The actor registry: exclusive owner of every instance.
    pub actors: FxHashMap<u64, ActorInstance>,
    /// Actor ids with a pending mailbox delivery, in insertion order.
    pub pending: VecDeque<u64>,
    /// Structured log collector (JSON mode).
    pub logs: Vec<LogRecord>,
    /// Call-trace buffer (`--trace`).
    pub trace: Vec<TraceStep>,
    pub trace_depth: u32,
    /// The actor whose handler is currently executing; spawns record it
    /// as the supervisor.
    pub current_actor: Option<u64>,
    next_actor_id: u64,
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => XorShift32::new(seed),
            None => XorShift32::from_clock(),
        };
        Runtime {
            options,
            rng,
            actors: FxHashMap::default(),
            pending: VecDeque::new(),
            logs: Vec::new(),
            trace: Vec::new(),
            trace_depth: 0,
            current_actor: None,
            next_actor_id: 1,
        }
    }

    /// Allocate the next actor id (monotonically increasing).
    pub fn alloc_actor_id(&mut self) -> u64 {
        let id = self.next_actor_id;
        self.next_actor_id += 1;
        id
    }

    /// Milliseconds since the Unix epoch, for log timestamps.
    pub fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Emit a log record: collect it in JSON mode, print it in text mode.
    pub fn emit_log(&mut self, level: &'static str, label: &str, payload: Json) {
        match self.options.format {
            OutputFormat::Json => {
                self.logs.push(LogRecord {
                    kind: "log",
                    ts: Self::now_ms(),
                    level,
                    label: label.to_string(),
                    payload,
                });
            }
            OutputFormat::Text => {
                println!("[{}] {} {}", level.to_uppercase(), label, payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_ids_are_monotonic() {
        let mut rt = Runtime::new(RuntimeOptions::default());
        let a = rt.alloc_actor_id();
        let b = rt.alloc_actor_id();
        assert!(b > a);
    }

    #[test]
    fn seeded_runtime_is_reproducible() {
        let mut a = Runtime::new(RuntimeOptions { seed: Some(42), ..Default::default() });
        let mut b = Runtime::new(RuntimeOptions { seed: Some(42), ..Default::default() });
        for _ in 0..16 {
            assert_eq!(a.rng.next_u32(), b.rng.next_u32());
        }
    }

    #[test]
    fn json_mode_collects_logs() {
        let mut rt = Runtime::new(RuntimeOptions {
            format: OutputFormat::Json,
            ..Default::default()
        });
        rt.emit_log("debug", "tick", serde_json::json!({"n": 1}));
        assert_eq!(rt.logs.len(), 1);
        assert_eq!(rt.logs[0].kind, "log");
        assert_eq!(rt.logs[0].level, "debug");
        assert_eq!(rt.logs[0].label, "tick");
    }
}
