//! Runtime values.
//!
//! A closed union mirroring the type system's ground types. Constructor
//! fields are kept sorted by name so structural equality and the JSON
//! codec are order-independent and deterministic.

use std::fmt;

/// An Lx runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
    List(Vec<Value>),
    /// A record or variant value. Fields are sorted by name.
    Ctor { name: String, fields: Vec<(String, Value)> },
    /// Names an actor by id; does not own it.
    ActorRef(u64),
    /// A reference to a user function by qualified name.
    Fn { name: String },
}

impl Value {
    /// Build a constructor value, sorting fields by name.
    pub fn ctor(name: impl Into<String>, mut fields: Vec<(String, Value)>) -> Value {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        Value::Ctor { name: name.into(), fields }
    }

    /// `Some { value }`.
    pub fn some(value: Value) -> Value {
        Value::ctor("Some", vec![("value".into(), value)])
    }

    /// `None`.
    pub fn none() -> Value {
        Value::ctor("None", vec![])
    }

    /// `Pair { first, second }` (produced by `list.zip`/`list.enumerate`).
    pub fn pair(first: Value, second: Value) -> Value {
        Value::ctor("Pair", vec![("first".into(), first), ("second".into(), second)])
    }

    /// Field of a constructor value, by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Ctor { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Short type word for error messages.
    pub fn type_word(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "String",
            Value::Unit => "Unit",
            Value::List(_) => "List",
            Value::Ctor { .. } => "constructor",
            Value::ActorRef(_) => "ActorRef",
            Value::Fn { .. } => "function",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Unit => write!(f, "()"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Ctor { name, fields } => {
                write!(f, "{}", name)?;
                if !fields.is_empty() {
                    write!(f, " {{ ")?;
                    for (i, (field, value)) in fields.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}: {}", field, value)?;
                    }
                    write!(f, " }}")?;
                }
                Ok(())
            }
            Value::ActorRef(id) => write!(f, "<actor {}>", id),
            Value::Fn { name } => write!(f, "<fn {}>", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctor_fields_are_sorted() {
        let a = Value::ctor("P", vec![("y".into(), Value::Int(2)), ("x".into(), Value::Int(1))]);
        let b = Value::ctor("P", vec![("x".into(), Value::Int(1)), ("y".into(), Value::Int(2))]);
        assert_eq!(a, b);
    }

    #[test]
    fn deep_structural_equality() {
        let a = Value::List(vec![Value::some(Value::Int(1)), Value::none()]);
        let b = Value::List(vec![Value::some(Value::Int(1)), Value::none()]);
        assert_eq!(a, b);
        let c = Value::List(vec![Value::some(Value::Int(2)), Value::none()]);
        assert_ne!(a, c);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Unit.to_string(), "()");
        assert_eq!(Value::Str("hi".into()).to_string(), "\"hi\"");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(
            Value::some(Value::Int(1)).to_string(),
            "Some { value: 1 }"
        );
        assert_eq!(Value::none().to_string(), "None");
    }

    #[test]
    fn field_lookup() {
        let p = Value::pair(Value::Int(1), Value::Str("a".into()));
        assert_eq!(p.field("first"), Some(&Value::Int(1)));
        assert_eq!(p.field("missing"), None);
    }
}
