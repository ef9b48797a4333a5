//! Builtin signature catalog.
//!
//! Every builtin is registered with its arity, parameter names (used by
//! argument alignment), effect set, and a mono- or polymorphic type scheme
//! instantiated freshly at each call site. The implementations live in the
//! interpreter crate; this catalog is the single source of truth both
//! sides dispatch on.
//!
//! Scheme variables use small local ids (`a` = 0, `b` = 1) that are
//! substituted structurally during instantiation and never index the
//! unification table.

use crate::ty::{Scheme, Ty, TyVar};

/// The effect names every module knows without declaring them.
pub const BASELINE_EFFECTS: &[&str] = &["Concurrent", "Log", "Io"];

/// Builtins whose function-reference argument must be a bare name of a
/// declared pure function.
pub const PURE_ARGUMENT_BUILTINS: &[&str] = &["parallel_map", "parallel_fold", "parallel_for_each"];

/// The signature of one builtin.
#[derive(Clone, Debug)]
pub struct BuiltinSig {
    pub name: &'static str,
    /// Parameter names, in order, for call-argument alignment.
    pub params: &'static [&'static str],
    /// Effects the caller must declare.
    pub effects: &'static [&'static str],
    pub scheme: Scheme,
}

impl BuiltinSig {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

fn a() -> Ty {
    Ty::Var(TyVar(0))
}

fn b() -> Ty {
    Ty::Var(TyVar(1))
}

fn sig(
    name: &'static str,
    params: &'static [&'static str],
    effects: &'static [&'static str],
    scheme: Scheme,
) -> BuiltinSig {
    BuiltinSig { name, params, effects, scheme }
}

/// Look up a builtin by its exact callee name.
///
/// Returns `None` for anything else, including `<ref>.send`, which is
/// dispatched structurally rather than by name.
pub fn lookup(name: &str) -> Option<BuiltinSig> {
    let s = match name {
        // ── Lists (pure) ────────────────────────────────────────────────
        "list.len" => sig(
            "list.len", &["xs"], &[], Scheme::poly(1, Ty::fun(vec![Ty::list(a())], Ty::int()))),
        "list.append" => sig(
            "list.append",
            &["xs", "item"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a()), a()], Ty::list(a()))),
        ),
        "list.concat" => sig(
            "list.concat",
            &["xs", "ys"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a()), Ty::list(a())], Ty::list(a()))),
        ),
        "list.head" => sig(
            "list.head",
            &["xs"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a())], Ty::option(a()))),
        ),
        "list.tail" => sig(
            "list.tail",
            &["xs"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a())], Ty::list(a()))),
        ),
        "list.take" => sig(
            "list.take",
            &["xs", "count"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a()), Ty::int()], Ty::list(a()))),
        ),
        "list.drop" => sig(
            "list.drop",
            &["xs", "count"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a()), Ty::int()], Ty::list(a()))),
        ),
        "list.reverse" => sig(
            "list.reverse",
            &["xs"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a())], Ty::list(a()))),
        ),
        "list.contains" => sig(
            "list.contains",
            &["xs", "item"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::list(a()), a()], Ty::bool())),
        ),
        "list.find" => sig(
            "list.find",
            &["xs", "predicate"],
            &[],
            Scheme::poly(
                1,
                Ty::fun(
                    vec![Ty::list(a()), Ty::fun(vec![a()], Ty::bool())],
                    Ty::option(a()),
                ),
            ),
        ),
        "list.map" => sig(
            "list.map",
            &["xs", "transform"],
            &[],
            Scheme::poly(
                2,
                Ty::fun(vec![Ty::list(a()), Ty::fun(vec![a()], b())], Ty::list(b())),
            ),
        ),
        "list.filter" => sig(
            "list.filter",
            &["xs", "predicate"],
            &[],
            Scheme::poly(
                1,
                Ty::fun(
                    vec![Ty::list(a()), Ty::fun(vec![a()], Ty::bool())],
                    Ty::list(a()),
                ),
            ),
        ),
        "list.fold" => sig(
            "list.fold",
            &["xs", "init", "combine"],
            &[],
            Scheme::poly(
                2,
                Ty::fun(
                    vec![Ty::list(a()), b(), Ty::fun(vec![b(), a()], b())],
                    b(),
                ),
            ),
        ),
        "list.flat_map" => sig(
            "list.flat_map",
            &["xs", "transform"],
            &[],
            Scheme::poly(
                2,
                Ty::fun(
                    vec![Ty::list(a()), Ty::fun(vec![a()], Ty::list(b()))],
                    Ty::list(b()),
                ),
            ),
        ),
        "list.zip" => sig(
            "list.zip",
            &["xs", "ys"],
            &[],
            Scheme::poly(
                2,
                Ty::fun(
                    vec![Ty::list(a()), Ty::list(b())],
                    Ty::list(Ty::pair(a(), b())),
                ),
            ),
        ),
        "list.enumerate" => sig(
            "list.enumerate",
            &["xs"],
            &[],
            Scheme::poly(
                1,
                Ty::fun(vec![Ty::list(a())], Ty::list(Ty::pair(Ty::int(), a()))),
            ),
        ),

        // ── Strings (pure) ──────────────────────────────────────────────
        "str.concat" => sig(
            "str.concat",
            &["left", "right"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::string())),
        ),
        "str.split" => sig(
            "str.split",
            &["text", "separator"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::list(Ty::string()))),
        ),
        "str.join" => sig(
            "str.join",
            &["parts", "separator"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::list(Ty::string()), Ty::string()], Ty::string())),
        ),
        "str.contains" => sig(
            "str.contains",
            &["text", "needle"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::bool())),
        ),
        "str.starts_with" => sig(
            "str.starts_with",
            &["text", "prefix"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::bool())),
        ),
        "str.ends_with" => sig(
            "str.ends_with",
            &["text", "suffix"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::bool())),
        ),
        "str.trim" => sig(
            "str.trim",
            &["text"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::string())),
        ),
        "str.to_upper" => sig(
            "str.to_upper",
            &["text"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::string())),
        ),
        "str.to_lower" => sig(
            "str.to_lower",
            &["text"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::string())),
        ),
        "str.replace" => sig(
            "str.replace",
            &["text", "from", "to"],
            &[],
            Scheme::mono(Ty::fun(
                vec![Ty::string(), Ty::string(), Ty::string()],
                Ty::string(),
            )),
        ),
        "str.index_of" => sig(
            "str.index_of",
            &["text", "needle"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::int())),
        ),
        "str.len" => sig(
            "str.len",
            &["text"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::int())),
        ),
        "str.slice" => sig(
            "str.slice",
            &["text", "start", "end"],
            &[],
            Scheme::mono(Ty::fun(
                vec![Ty::string(), Ty::int(), Ty::int()],
                Ty::string(),
            )),
        ),
        "str.at" => sig(
            "str.at",
            &["text", "index"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::int()], Ty::string())),
        ),

        // ── Math (pure) ─────────────────────────────────────────────────
        "math.abs" => sig(
            "math.abs",
            &["value"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::int()], Ty::int())),
        ),
        "math.min" => sig(
            "math.min",
            &["left", "right"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::int(), Ty::int()], Ty::int())),
        ),
        "math.max" => sig(
            "math.max",
            &["left", "right"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::int(), Ty::int()], Ty::int())),
        ),

        // ── JSON (pure) ─────────────────────────────────────────────────
        "json.encode" => sig(
            "json.encode",
            &["value"],
            &[],
            Scheme::poly(1, Ty::fun(vec![a()], Ty::string())),
        ),
        "json.decode" => sig(
            "json.decode",
            &["text"],
            &[],
            Scheme::poly(1, Ty::fun(vec![Ty::string()], a())),
        ),

        // ── Logging [Log] ───────────────────────────────────────────────
        "Log.debug" => sig(
            "Log.debug",
            &["label", "payload"],
            &["Log"],
            Scheme::poly(1, Ty::fun(vec![Ty::string(), a()], Ty::unit())),
        ),
        "Log.trace" => sig(
            "Log.trace",
            &["label", "payload"],
            &["Log"],
            Scheme::poly(1, Ty::fun(vec![Ty::string(), a()], Ty::unit())),
        ),

        // ── Scheduler ops [Concurrent] ──────────────────────────────────
        "Concurrent.flush" => sig(
            "Concurrent.flush",
            &[],
            &["Concurrent"],
            Scheme::mono(Ty::fun(vec![], Ty::int())),
        ),
        "Concurrent.step" => sig(
            "Concurrent.step",
            &[],
            &["Concurrent"],
            Scheme::mono(Ty::fun(vec![], Ty::bool())),
        ),
        "Concurrent.stop" => sig(
            "Concurrent.stop",
            &["actor"],
            &["Concurrent"],
            Scheme::poly(1, Ty::fun(vec![Ty::actor_ref(a())], Ty::bool())),
        ),

        // ── Parallel (pure, pure function arguments) ────────────────────
        "parallel_map" => sig(
            "parallel_map",
            &["xs", "transform"],
            &[],
            Scheme::poly(
                2,
                Ty::fun(vec![Ty::list(a()), Ty::fun(vec![a()], b())], Ty::list(b())),
            ),
        ),
        "parallel_fold" => sig(
            "parallel_fold",
            &["xs", "init", "combine"],
            &[],
            Scheme::poly(
                2,
                Ty::fun(
                    vec![Ty::list(a()), b(), Ty::fun(vec![b(), a()], b())],
                    b(),
                ),
            ),
        ),
        "parallel_for_each" => sig(
            "parallel_for_each",
            &["xs", "action"],
            &[],
            Scheme::poly(
                1,
                Ty::fun(
                    vec![Ty::list(a()), Ty::fun(vec![a()], Ty::unit())],
                    Ty::unit(),
                ),
            ),
        ),

        // ── Unary operators (pure) ──────────────────────────────────────
        "__negate" => sig(
            "__negate",
            &["value"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::int()], Ty::int())),
        ),
        "__not" => sig(
            "__not",
            &["value"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::bool()], Ty::bool())),
        ),

        // ── Assertions (pure) ───────────────────────────────────────────
        "assert" => sig(
            "assert",
            &["condition"],
            &[],
            Scheme::mono(Ty::fun(vec![Ty::bool()], Ty::unit())),
        ),
        "test.assert_equal" => sig(
            "test.assert_equal",
            &["actual", "expected"],
            &[],
            Scheme::poly(1, Ty::fun(vec![a(), a()], Ty::unit())),
        ),

        // ── Host I/O [Io] ───────────────────────────────────────────────
        "io.read_file" => sig(
            "io.read_file",
            &["path"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::string())),
        ),
        "io.write_file" => sig(
            "io.write_file",
            &["path", "contents"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::unit())),
        ),
        "io.append_file" => sig(
            "io.append_file",
            &["path", "contents"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::string(), Ty::string()], Ty::unit())),
        ),
        "io.delete_file" => sig(
            "io.delete_file",
            &["path"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::bool())),
        ),
        "io.file_exists" => sig(
            "io.file_exists",
            &["path"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::bool())),
        ),
        "io.read_lines" => sig(
            "io.read_lines",
            &["path"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::list(Ty::string()))),
        ),
        "sys.args" => sig(
            "sys.args", &[], &["Io"], Scheme::mono(Ty::fun(vec![], Ty::list(Ty::string())))),
        "sys.env" => sig(
            "sys.env",
            &["name"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::string()], Ty::option(Ty::string()))),
        ),
        "sys.cwd" => sig(
            "sys.cwd", &[], &["Io"], Scheme::mono(Ty::fun(vec![], Ty::string()))),
        "time.now_ms" => sig(
            "time.now_ms", &[], &["Io"], Scheme::mono(Ty::fun(vec![], Ty::int()))),
        "random.int" => sig(
            "random.int",
            &["low", "high"],
            &["Io"],
            Scheme::mono(Ty::fun(vec![Ty::int(), Ty::int()], Ty::int())),
        ),

        _ => return None,
    };
    Some(s)
}

/// Whether a callee name requires bare-name pure function arguments.
pub fn is_pure_argument_builtin(name: &str) -> bool {
    PURE_ARGUMENT_BUILTINS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_builtin() {
        let s = lookup("list.map").unwrap();
        assert_eq!(s.params, &["xs", "transform"]);
        assert!(s.effects.is_empty());
        assert_eq!(s.scheme.vars.len(), 2);
    }

    #[test]
    fn lookup_unknown_is_none() {
        assert!(lookup("list.scan").is_none());
        assert!(lookup("send").is_none());
    }

    #[test]
    fn effectful_builtins_carry_effects() {
        assert_eq!(lookup("Log.debug").unwrap().effects, &["Log"]);
        assert_eq!(lookup("Concurrent.flush").unwrap().effects, &["Concurrent"]);
        assert_eq!(lookup("io.read_file").unwrap().effects, &["Io"]);
    }

    #[test]
    fn pure_argument_builtins_are_flagged() {
        assert!(is_pure_argument_builtin("parallel_map"));
        assert!(is_pure_argument_builtin("parallel_fold"));
        assert!(is_pure_argument_builtin("parallel_for_each"));
        assert!(!is_pure_argument_builtin("list.map"));
    }

    #[test]
    fn zip_produces_pairs() {
        let s = lookup("list.zip").unwrap();
        let Ty::Fun(_, ret) = &s.scheme.ty else { panic!("zip is a function") };
        assert_eq!(ret.to_string(), "List<Pair<?0, ?1>>");
    }
}
