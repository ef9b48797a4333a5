//! Builtin implementations.
//!
//! Dispatched by exact callee name after arguments have been aligned and
//! evaluated. Signatures (arity, parameter names, effects, schemes) live
//! in the type checker's catalog; this module is the runtime half.
//! String operations are codepoint-based; string equality elsewhere stays
//! byte-exact.

use lx_common::Span;

use crate::error::{RResult, RuntimeError, RuntimeErrorKind};
use crate::json;
use crate::value::Value;
use crate::Interp;

impl<'p> Interp<'p> {
    /// Execute a builtin with slot-ordered argument values.
    pub(crate) fn call_builtin(
        &mut self,
        name: &str,
        mut args: Vec<Value>,
        span: Option<Span>,
    ) -> RResult<Value> {
        Ok(match name {
            // ── Lists ───────────────────────────────────────────────────
            "list.len" => Value::Int(as_list(&args[0], span)?.len() as i64),
            "list.append" => {
                let item = args.pop().expect("arity checked");
                let mut xs = into_list(args.pop().expect("arity checked"), span)?;
                xs.push(item);
                Value::List(xs)
            }
            "list.concat" => {
                let ys = into_list(args.pop().expect("arity checked"), span)?;
                let mut xs = into_list(args.pop().expect("arity checked"), span)?;
                xs.extend(ys);
                Value::List(xs)
            }
            "list.head" => {
                let xs = as_list(&args[0], span)?;
                match xs.first() {
                    Some(v) => Value::some(v.clone()),
                    None => Value::none(),
                }
            }
            "list.tail" => {
                let xs = as_list(&args[0], span)?;
                Value::List(xs.iter().skip(1).cloned().collect())
            }
            "list.take" => {
                let n = as_int(&args[1], span)?.max(0) as usize;
                let xs = as_list(&args[0], span)?;
                Value::List(xs.iter().take(n).cloned().collect())
            }
            "list.drop" => {
                let n = as_int(&args[1], span)?.max(0) as usize;
                let xs = as_list(&args[0], span)?;
                Value::List(xs.iter().skip(n).cloned().collect())
            }
            "list.reverse" => {
                let mut xs = into_list(args.swap_remove(0), span)?;
                xs.reverse();
                Value::List(xs)
            }
            "list.contains" => {
                let item = &args[1];
                Value::Bool(as_list(&args[0], span)?.contains(item))
            }
            "list.find" => {
                let f = args.pop().expect("arity checked");
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                let mut found = Value::none();
                for item in xs {
                    let keep = self.call_function_value(&f, vec![item.clone()], span)?;
                    if keep == Value::Bool(true) {
                        found = Value::some(item);
                        break;
                    }
                }
                found
            }
            "list.map" | "parallel_map" => {
                let f = args.pop().expect("arity checked");
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                let mut out = Vec::with_capacity(xs.len());
                for item in xs {
                    out.push(self.call_function_value(&f, vec![item], span)?);
                }
                Value::List(out)
            }
            "list.filter" => {
                let f = args.pop().expect("arity checked");
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                let mut out = Vec::new();
                for item in xs {
                    let keep = self.call_function_value(&f, vec![item.clone()], span)?;
                    if keep == Value::Bool(true) {
                        out.push(item);
                    }
                }
                Value::List(out)
            }
            "list.fold" | "parallel_fold" => {
                let f = args.pop().expect("arity checked");
                let mut acc = args.pop().expect("arity checked");
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                for item in xs {
                    acc = self.call_function_value(&f, vec![acc, item], span)?;
                }
                acc
            }
            "list.flat_map" => {
                let f = args.pop().expect("arity checked");
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                let mut out = Vec::new();
                for item in xs {
                    let mapped = self.call_function_value(&f, vec![item], span)?;
                    out.extend(into_list(mapped, span)?);
                }
                Value::List(out)
            }
            "list.zip" => {
                let ys = into_list(args.pop().expect("arity checked"), span)?;
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                Value::List(
                    xs.into_iter()
                        .zip(ys)
                        .map(|(a, b)| Value::pair(a, b))
                        .collect(),
                )
            }
            "list.enumerate" => {
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                Value::List(
                    xs.into_iter()
                        .enumerate()
                        .map(|(i, v)| Value::pair(Value::Int(i as i64), v))
                        .collect(),
                )
            }
            "parallel_for_each" => {
                let f = args.pop().expect("arity checked");
                let xs = into_list(args.pop().expect("arity checked"), span)?;
                for item in xs {
                    self.call_function_value(&f, vec![item], span)?;
                }
                Value::Unit
            }

            // ── Strings ─────────────────────────────────────────────────
            "str.concat" => {
                let b = into_str(args.pop().expect("arity checked"), span)?;
                let mut a = into_str(args.pop().expect("arity checked"), span)?;
                a.push_str(&b);
                Value::Str(a)
            }
            "str.split" => {
                let sep = into_str(args.pop().expect("arity checked"), span)?;
                let text = into_str(args.pop().expect("arity checked"), span)?;
                Value::List(
                    text.split(&sep as &str)
                        .map(|part| Value::Str(part.to_string()))
                        .collect(),
                )
            }
            "str.join" => {
                let sep = into_str(args.pop().expect("arity checked"), span)?;
                let parts = into_list(args.pop().expect("arity checked"), span)?;
                let mut strings = Vec::with_capacity(parts.len());
                for part in parts {
                    strings.push(into_str(part, span)?);
                }
                Value::Str(strings.join(&sep))
            }
            "str.contains" => {
                let needle = as_str(&args[1], span)?;
                Value::Bool(as_str(&args[0], span)?.contains(needle))
            }
            "str.starts_with" => {
                let prefix = as_str(&args[1], span)?;
                Value::Bool(as_str(&args[0], span)?.starts_with(prefix))
            }
            "str.ends_with" => {
                let suffix = as_str(&args[1], span)?;
                Value::Bool(as_str(&args[0], span)?.ends_with(suffix))
            }
            "str.trim" => Value::Str(as_str(&args[0], span)?.trim().to_string()),
            "str.to_upper" => Value::Str(as_str(&args[0], span)?.to_uppercase()),
            "str.to_lower" => Value::Str(as_str(&args[0], span)?.to_lowercase()),
            "str.replace" => {
                let to = into_str(args.pop().expect("arity checked"), span)?;
                let from = into_str(args.pop().expect("arity checked"), span)?;
                let text = into_str(args.pop().expect("arity checked"), span)?;
                Value::Str(text.replace(&from as &str, &to))
            }
            "str.index_of" => {
                let needle = as_str(&args[1], span)?;
                let text = as_str(&args[0], span)?;
                match text.find(needle) {
                    // Byte offset -> codepoint index.
                    Some(byte) => Value::Int(text[..byte].chars().count() as i64),
                    None => Value::Int(-1),
                }
            }
            "str.len" => Value::Int(as_str(&args[0], span)?.chars().count() as i64),
            "str.slice" => {
                let end = as_int(&args[2], span)?.max(0) as usize;
                let start = as_int(&args[1], span)?.max(0) as usize;
                let text = as_str(&args[0], span)?;
                Value::Str(
                    text.chars()
                        .skip(start)
                        .take(end.saturating_sub(start))
                        .collect(),
                )
            }
            "str.at" => {
                let idx = as_int(&args[1], span)?;
                let text = as_str(&args[0], span)?;
                let len = text.chars().count();
                if idx < 0 || idx as usize >= len {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::IndexOutOfBounds { index: idx, len },
                        span,
                    ));
                }
                Value::Str(text.chars().nth(idx as usize).expect("bounds checked").to_string())
            }

            // ── Math ────────────────────────────────────────────────────
            "math.abs" => Value::Int(as_int(&args[0], span)?.wrapping_abs()),
            "math.min" => Value::Int(as_int(&args[0], span)?.min(as_int(&args[1], span)?)),
            "math.max" => Value::Int(as_int(&args[0], span)?.max(as_int(&args[1], span)?)),

            // ── JSON ────────────────────────────────────────────────────
            "json.encode" => Value::Str(json::encode(&args[0]).map_err(|e| e.with_span(span))?),
            "json.decode" => {
                let text = as_str(&args[0], span)?;
                json::decode(text).map_err(|e| e.with_span(span))?
            }

            // ── Logging ─────────────────────────────────────────────────
            "Log.debug" | "Log.trace" => {
                let payload = args.pop().expect("arity checked");
                let label = into_str(args.pop().expect("arity checked"), span)?;
                let level = if name == "Log.debug" { "debug" } else { "trace" };
                let payload_json =
                    json::value_to_json(&payload).unwrap_or_else(|_| serde_json::json!(payload.to_string()));
                self.rt.emit_log(level, &label, payload_json);
                Value::Unit
            }

            // ── Scheduler ops ───────────────────────────────────────────
            "Concurrent.flush" => Value::Int(self.drain_deliveries()?),
            "Concurrent.step" => Value::Bool(self.process_one_delivery()?),
            "Concurrent.stop" => {
                let Value::ActorRef(id) = args[0] else {
                    return Err(
                        RuntimeError::msg("Concurrent.stop takes an actor reference").with_span(span)
                    );
                };
                Value::Bool(self.stop_actor_tree(id))
            }

            // ── Unary operators ─────────────────────────────────────────
            "__negate" => Value::Int(as_int(&args[0], span)?.wrapping_neg()),
            "__not" => Value::Bool(!as_bool(&args[0], span)?),

            // ── Assertions ──────────────────────────────────────────────
            "assert" => {
                if !as_bool(&args[0], span)? {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::AssertionFailed { detail: "condition is false".into() },
                        span,
                    ));
                }
                Value::Unit
            }
            "test.assert_equal" => {
                let expected = args.pop().expect("arity checked");
                let actual = args.pop().expect("arity checked");
                if actual != expected {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::AssertionFailed {
                            detail: format!("{} != {}", actual, expected),
                        },
                        span,
                    ));
                }
                Value::Unit
            }

            // ── Host I/O ────────────────────────────────────────────────
            "io.read_file" => {
                let path = as_str(&args[0], span)?;
                Value::Str(std::fs::read_to_string(path).map_err(|e| io_err(path, e, span))?)
            }
            "io.write_file" => {
                let contents = as_str(&args[1], span)?;
                let path = as_str(&args[0], span)?;
                std::fs::write(path, contents).map_err(|e| io_err(path, e, span))?;
                Value::Unit
            }
            "io.append_file" => {
                use std::io::Write;
                let contents = as_str(&args[1], span)?;
                let path = as_str(&args[0], span)?;
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| io_err(path, e, span))?;
                file.write_all(contents.as_bytes()).map_err(|e| io_err(path, e, span))?;
                Value::Unit
            }
            "io.delete_file" => {
                let path = as_str(&args[0], span)?;
                Value::Bool(std::fs::remove_file(path).is_ok())
            }
            "io.file_exists" => {
                let path = as_str(&args[0], span)?;
                Value::Bool(std::path::Path::new(path).is_file())
            }
            "io.read_lines" => {
                let path = as_str(&args[0], span)?;
                let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e, span))?;
                Value::List(text.lines().map(|l| Value::Str(l.to_string())).collect())
            }
            "sys.args" => Value::List(
                std::env::args().skip(1).map(Value::Str).collect(),
            ),
            "sys.env" => {
                let key = as_str(&args[0], span)?;
                match std::env::var(key) {
                    Ok(v) => Value::some(Value::Str(v)),
                    Err(_) => Value::none(),
                }
            }
            "sys.cwd" => Value::Str(
                std::env::current_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            "time.now_ms" => Value::Int(crate::runtime::Runtime::now_ms() as i64),
            "random.int" => {
                let hi = as_int(&args[1], span)?;
                let lo = as_int(&args[0], span)?;
                if lo > hi {
                    return Err(
                        RuntimeError::msg("random.int: low bound above high bound").with_span(span)
                    );
                }
                Value::Int(self.rt.rng.int_in(lo, hi))
            }

            other => {
                return Err(RuntimeError::msg(format!(
                    "builtin `{}` is not implemented",
                    other
                ))
                .with_span(span))
            }
        })
    }
}

fn io_err(path: &str, e: std::io::Error, span: Option<Span>) -> RuntimeError {
    RuntimeError::msg(format!("io error on `{}`: {}", path, e)).with_span(span)
}

fn as_int(value: &Value, span: Option<Span>) -> RResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(RuntimeError::msg(format!("expected Int, found {}", other.type_word()))
            .with_span(span)),
    }
}

fn as_bool(value: &Value, span: Option<Span>) -> RResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(RuntimeError::msg(format!("expected Bool, found {}", other.type_word()))
            .with_span(span)),
    }
}

fn as_str<'v>(value: &'v Value, span: Option<Span>) -> RResult<&'v str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::msg(format!("expected String, found {}", other.type_word()))
            .with_span(span)),
    }
}

fn into_str(value: Value, span: Option<Span>) -> RResult<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::msg(format!("expected String, found {}", other.type_word()))
            .with_span(span)),
    }
}

fn as_list<'v>(value: &'v Value, span: Option<Span>) -> RResult<&'v [Value]> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(RuntimeError::msg(format!("expected List, found {}", other.type_word()))
            .with_span(span)),
    }
}

fn into_list(value: Value, span: Option<Span>) -> RResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(RuntimeError::msg(format!("expected List, found {}", other.type_word()))
            .with_span(span)),
    }
}
