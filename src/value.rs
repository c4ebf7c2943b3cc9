//! Structured values produced and consumed by the codec, and their JSON
//! bridge.
//!
//! Struct values keep declaration order, which `serde_json`'s
//! `preserve_order` feature carries through to the textual form.

use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::errors::ValueError;

/// A decoded value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(BigInt),
    /// Fixed-point fields decode to floats.
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Struct fields in declaration order.
    Map(Vec<(String, Value)>),
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(vs: Vec<V>) -> Self {
        Value::List(vs.into_iter().map(Into::into).collect())
    }
}

/// Converts a value tree to its JSON form.
pub fn to_json(v: &Value) -> Result<serde_json::Value, ValueError> {
    match v {
        Value::Int(i) => {
            // i64/u64 cover the common case; wider integers go through the
            // arbitrary-precision number parser.
            let number = if let Some(n) = i.to_i64() {
                serde_json::Number::from(n)
            } else if let Some(n) = i.to_u64() {
                serde_json::Number::from(n)
            } else {
                serde_json::from_str(&i.to_string())
                    .map_err(|_| ValueError::SchemaMismatch(format!("unrepresentable number {}", i)))?
            };
            Ok(serde_json::Value::Number(number))
        }
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .ok_or_else(|| ValueError::SchemaMismatch(format!("non-finite number {}", x))),
        Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
        Value::List(vs) => Ok(serde_json::Value::Array(
            vs.iter().map(to_json).collect::<Result<_, _>>()?,
        )),
        Value::Map(kvs) => {
            let mut map = serde_json::Map::new();
            for (k, v) in kvs {
                map.insert(k.clone(), to_json(v)?);
            }
            Ok(serde_json::Value::Object(map))
        }
    }
}

/// Converts a JSON document to a value tree. Shape checks against a type
/// happen in the codec; this only rejects JSON with no value form at all.
pub fn from_json(j: &serde_json::Value) -> Result<Value, ValueError> {
    match j {
        serde_json::Value::Number(n) => {
            if let Ok(i) = BigInt::from_str(&n.to_string()) {
                Ok(Value::Int(i))
            } else {
                n.as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| ValueError::SchemaMismatch(format!("bad number {}", n)))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_json::Value::Array(a) => Ok(Value::List(
            a.iter().map(from_json).collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(o) => Ok(Value::Map(
            o.iter()
                .map(|(k, v)| Ok((k.clone(), from_json(v)?)))
                .collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Bool(_) | serde_json::Value::Null => Err(ValueError::SchemaMismatch(
            format!("no field form for {}", j),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_order() {
        let v = Value::Map(vec![
            ("zebra".to_string(), Value::from(1u64)),
            ("aardvark".to_string(), Value::from(2u64)),
        ]);
        let s = serde_json::to_string(&to_json(&v).unwrap()).unwrap();
        assert_eq!(s, r#"{"zebra":1,"aardvark":2}"#);
    }

    #[test]
    fn test_wide_int_round_trips() {
        let big: BigInt = BigInt::from(1u8) << 100u32;
        let j = to_json(&Value::Int(big.clone())).unwrap();
        assert_eq!(from_json(&j).unwrap(), Value::Int(big));
    }

    #[test]
    fn test_null_rejected() {
        assert!(matches!(
            from_json(&serde_json::Value::Null),
            Err(ValueError::SchemaMismatch(_))
        ));
    }
}
