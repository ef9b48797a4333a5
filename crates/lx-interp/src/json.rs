//! Value <-> JSON codec.
//!
//! Int -> number, Bool -> boolean, String -> string, Unit -> null,
//! List -> array, Ctor -> single-key object `{ "Name": { field: value } }`.
//! Decoding inverts the shape: a single-key object whose value is an
//! object becomes a constructor. Used by `json.encode`/`json.decode`,
//! structured log payloads, and property failure snapshots.

use serde_json::{json, Map, Value as Json};

use crate::error::RuntimeError;
use crate::value::Value;

/// Encode a value as JSON. Actor and function references have no JSON
/// representation.
pub fn value_to_json(value: &Value) -> Result<Json, RuntimeError> {
    Ok(match value {
        Value::Int(n) => json!(n),
        Value::Bool(b) => json!(b),
        Value::Str(s) => json!(s),
        Value::Unit => Json::Null,
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_to_json(item)?);
            }
            Json::Array(out)
        }
        Value::Ctor { name, fields } => {
            let mut inner = Map::new();
            for (field, v) in fields {
                inner.insert(field.clone(), value_to_json(v)?);
            }
            let mut outer = Map::new();
            outer.insert(name.clone(), Json::Object(inner));
            Json::Object(outer)
        }
        Value::ActorRef(_) => {
            return Err(RuntimeError::msg("cannot encode an actor reference as JSON"))
        }
        Value::Fn { .. } => {
            return Err(RuntimeError::msg("cannot encode a function reference as JSON"))
        }
    })
}

/// Decode JSON into a value, inverting [`value_to_json`].
pub fn json_to_value(json: &Json) -> Result<Value, RuntimeError> {
    Ok(match json {
        Json::Null => Value::Unit,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => return Err(RuntimeError::msg(format!("non-integer number {}", n))),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(json_to_value(item)?);
            }
            Value::List(out)
        }
        Json::Object(map) => {
            // The constructor shape is a single-key object whose value is
            // an object of fields.
            if map.len() == 1 {
                let (name, inner) = map.iter().next().expect("len checked");
                if let Json::Object(fields) = inner {
                    let mut out = Vec::with_capacity(fields.len());
                    for (field, v) in fields {
                        out.push((field.clone(), json_to_value(v)?));
                    }
                    return Ok(Value::ctor(name.clone(), out));
                }
            }
            return Err(RuntimeError::msg(
                "JSON object is not a constructor shape ({\"Name\": {..}})",
            ));
        }
    })
}

/// Encode to a compact JSON string.
pub fn encode(value: &Value) -> Result<String, RuntimeError> {
    let json = value_to_json(value)?;
    Ok(json.to_string())
}

/// Decode from a JSON string.
pub fn decode(text: &str) -> Result<Value, RuntimeError> {
    let json: Json = serde_json::from_str(text)
        .map_err(|e| RuntimeError::msg(format!("invalid JSON: {}", e)))?;
    json_to_value(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        for v in [
            Value::Int(-42),
            Value::Bool(true),
            Value::Str("hi".into()),
            Value::Unit,
        ] {
            assert_eq!(decode(&encode(&v).unwrap()).unwrap(), v);
        }
    }

    #[test]
    fn ctor_shape() {
        let v = Value::ctor(
            "Incr",
            vec![("amount".into(), Value::Int(2))],
        );
        assert_eq!(encode(&v).unwrap(), r#"{"Incr":{"amount":2}}"#);
        assert_eq!(decode(r#"{"Incr":{"amount":2}}"#).unwrap(), v);
    }

    #[test]
    fn nested_values_round_trip() {
        let v = Value::List(vec![
            Value::some(Value::List(vec![Value::Int(1), Value::Int(2)])),
            Value::none(),
        ]);
        assert_eq!(decode(&encode(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn unit_is_null() {
        assert_eq!(encode(&Value::Unit).unwrap(), "null");
        assert_eq!(decode("null").unwrap(), Value::Unit);
    }

    #[test]
    fn actor_ref_does_not_encode() {
        assert!(encode(&Value::ActorRef(1)).is_err());
    }

    #[test]
    fn multi_key_object_is_rejected() {
        assert!(decode(r#"{"a": 1, "b": 2}"#).is_err());
    }
}
