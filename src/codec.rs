//! The encode/decode kernel between raw windows and structured values.
//!
//! A leaf read is `(raw >> offset) & mask(width)` plus the leaf's decoding
//! rule (sign reduction, enum lookup, byte extraction). Encoding is pure:
//! it produces the new window content without touching any cell, so a
//! caller can commit it with a single masked write and failed writes leave
//! the cell untouched.
//!
//! Both directions are type-driven and window-relative; recursion into
//! struct and array children shifts by the child's relative offset.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

use crate::errors::ValueError;
use crate::raw::{bit_len, mask, read_window};
use crate::types::{BType, EnumTable, Kind};
use crate::value::Value;

/// Decodes the `ty`-shaped window `win` (already shifted down to bit 0).
pub fn decode(ty: &BType, win: &BigUint) -> Result<Value, ValueError> {
    match ty.kind() {
        Kind::UInt { labels, .. } => Ok(match labels.as_ref().and_then(|t| t.label(win)) {
            Some(label) => Value::Str(label.to_string()),
            // Codes outside the table pass through as integers.
            None => Value::Int(BigInt::from(win.clone())),
        }),
        Kind::SInt { width } => Ok(Value::Int(sign_reduce(win, *width))),
        Kind::Fixed {
            width,
            precision,
            base,
        } => {
            let stored = sign_reduce(win, *width);
            let divisor = BigInt::from(*base).pow(*precision);
            Ok(Value::Float(ratio_f64(&stored, &divisor)))
        }
        Kind::Utf8 { bytes } => {
            let mut buf = window_bytes(win, *bytes);
            if let Some(nul) = buf.iter().position(|&b| b == 0) {
                buf.truncate(nul);
            }
            String::from_utf8(buf)
                .map(Value::Str)
                .map_err(|_| ValueError::InvalidEncoding)
        }
        Kind::Struct { fields } => {
            let mut out = Vec::with_capacity(fields.len());
            let mut z = 0;
            for (name, fty) in fields {
                let child = read_window(win, z, fty.width());
                out.push((name.clone(), decode(fty, &child)?));
                z += fty.width();
            }
            Ok(Value::Map(out))
        }
        Kind::Array { elem, dim } => {
            let mut out = Vec::with_capacity(*dim);
            for k in 0..*dim {
                let child = read_window(win, k * elem.width(), elem.width());
                out.push(decode(elem, &child)?);
            }
            Ok(Value::List(out))
        }
        Kind::Custom { codec, .. } => Ok(codec.decode(win)),
    }
}

/// Encodes `v` into a `ty`-shaped window. `base` is the current window
/// content; struct fields and array elements absent from `v` keep their
/// base bits.
pub fn encode(ty: &BType, v: &Value, base: &BigUint) -> Result<BigUint, ValueError> {
    // A bare integer replaces any window wholesale, width-checked.
    if let Value::Int(n) = v {
        if !ty.is_leaf() {
            return uint_bits(n, ty.width());
        }
    }

    match ty.kind() {
        Kind::UInt { width, labels } => encode_uint(v, *width, labels.as_ref()),
        Kind::SInt { width } => match v {
            Value::Int(n) => sint_bits(n, *width),
            _ => Err(mismatch(ty, v)),
        },
        Kind::Fixed {
            width,
            precision,
            base: b,
        } => {
            let x = match v {
                Value::Float(x) => *x,
                Value::Int(n) => n.to_f64().unwrap_or(f64::INFINITY),
                _ => return Err(mismatch(ty, v)),
            };
            let divisor = BigInt::from(*b).pow(*precision);
            let scaled = x * divisor.to_f64().unwrap_or(f64::INFINITY);
            // Truncation toward zero, matching integer division.
            let stored = BigInt::from_f64(scaled.trunc())
                .ok_or(ValueError::Overflow { width: *width })?;
            sint_bits(&stored, *width)
        }
        Kind::Utf8 { bytes } => match v {
            Value::Str(s) => {
                let raw = s.as_bytes();
                if raw.len() > *bytes {
                    return Err(ValueError::Overflow { width: ty.width() });
                }
                let mut win = BigUint::zero();
                for (i, &b) in raw.iter().enumerate() {
                    win |= BigUint::from(b) << (8 * (*bytes - 1 - i));
                }
                Ok(win)
            }
            Value::Int(n) => uint_bits(n, ty.width()),
            _ => Err(mismatch(ty, v)),
        },
        Kind::Struct { fields } => match v {
            Value::Map(kvs) => {
                let mut win = base.clone();
                for (key, val) in kvs {
                    let mut z = 0;
                    let mut found = None;
                    for (name, fty) in fields {
                        if name == key {
                            found = Some((z, fty));
                            break;
                        }
                        z += fty.width();
                    }
                    let (z, fty) = found
                        .ok_or_else(|| ValueError::SchemaMismatch(format!("unknown key '{}'", key)))?;
                    let child_base = read_window(&win, z, fty.width());
                    let child = encode(fty, val, &child_base)?;
                    win = crate::raw::write_window(&win, z, fty.width(), &child);
                }
                Ok(win)
            }
            _ => Err(mismatch(ty, v)),
        },
        Kind::Array { elem, dim } => match v {
            Value::List(vs) => {
                if vs.len() > *dim {
                    return Err(ValueError::SchemaMismatch(format!(
                        "{} elements into an array of {}",
                        vs.len(),
                        dim
                    )));
                }
                let mut win = base.clone();
                for (k, val) in vs.iter().enumerate() {
                    let z = k * elem.width();
                    let child_base = read_window(&win, z, elem.width());
                    let child = encode(elem, val, &child_base)?;
                    win = crate::raw::write_window(&win, z, elem.width(), &child);
                }
                Ok(win)
            }
            _ => Err(mismatch(ty, v)),
        },
        Kind::Custom { name, width, codec } => {
            let win = codec.encode(v)?;
            if bit_len(&win) > *width {
                return Err(ValueError::InvalidType(name.clone()));
            }
            Ok(win)
        }
    }
}

/// Type-aware JSON projection: custom leaves go through their registered
/// jsonifier, composites recurse, everything else uses the standard value
/// mapping.
pub fn json_value(ty: &BType, v: &Value) -> Result<serde_json::Value, ValueError> {
    match (ty.kind(), v) {
        (Kind::Custom { codec, .. }, _) => codec.jsonify(v),
        (Kind::Struct { fields }, Value::Map(kvs)) => {
            let mut map = serde_json::Map::new();
            for ((_, fty), (key, val)) in fields.iter().zip(kvs) {
                map.insert(key.clone(), json_value(fty, val)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        (Kind::Array { elem, .. }, Value::List(vs)) => Ok(serde_json::Value::Array(
            vs.iter()
                .map(|x| json_value(elem, x))
                .collect::<Result<_, _>>()?,
        )),
        _ => crate::value::to_json(v),
    }
}

fn encode_uint(v: &Value, width: usize, labels: Option<&EnumTable>) -> Result<BigUint, ValueError> {
    match v {
        Value::Int(n) => uint_bits(n, width),
        Value::Str(s) => {
            if let Some(code) = labels.and_then(|t| t.code(s)) {
                return Ok(code.clone());
            }
            // Numeric strings pass through the integer path, so "3" writes
            // the code 3 even when the table lacks it.
            match s.parse::<BigInt>() {
                Ok(n) => uint_bits(&n, width),
                Err(_) => Err(ValueError::UnknownLabel(s.clone())),
            }
        }
        _ => Err(ValueError::SchemaMismatch(format!(
            "expected integer or label, got {:?}",
            v
        ))),
    }
}

/// Checks `0 <= n < 2^width` and returns the window bits.
fn uint_bits(n: &BigInt, width: usize) -> Result<BigUint, ValueError> {
    match n.to_biguint() {
        Some(u) if bit_len(&u) <= width => Ok(u),
        _ => Err(ValueError::Overflow { width }),
    }
}

/// Checks `-2^(width-1) <= n < 2^(width-1)` and returns the
/// two's-complement window bits.
fn sint_bits(n: &BigInt, width: usize) -> Result<BigUint, ValueError> {
    let half = BigInt::from(1) << (width - 1);
    if n < &-half.clone() || n >= &half {
        return Err(ValueError::Overflow { width });
    }
    let stored = if n.sign() == Sign::Minus {
        n + (BigInt::from(1) << width)
    } else {
        n.clone()
    };
    Ok(stored
        .to_biguint()
        .unwrap_or_default())
}

/// Two's-complement reduction: a set high bit subtracts `2^width`.
fn sign_reduce(win: &BigUint, width: usize) -> BigInt {
    let signed = BigInt::from(win.clone());
    if win.bit(width as u64 - 1) {
        signed - (BigInt::from(1) << width)
    } else {
        signed
    }
}

/// Extracts the window as big-endian bytes: string byte 0 sits at the
/// highest byte position.
fn window_bytes(win: &BigUint, nbytes: usize) -> Vec<u8> {
    let byte_mask = mask(8);
    (0..nbytes)
        .map(|i| {
            ((win >> (8 * (nbytes - 1 - i))) & byte_mask.clone())
                .to_u8()
                .unwrap_or(0)
        })
        .collect()
}

fn mismatch(ty: &BType, v: &Value) -> ValueError {
    ValueError::SchemaMismatch(format!("cannot write {:?} into {}", v, ty))
}

/// `a / b` as f64, tolerating magnitudes beyond u64.
fn ratio_f64(a: &BigInt, b: &BigInt) -> f64 {
    let fa = a.to_f64().unwrap_or(if a.is_negative() {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    });
    let fb = b.to_f64().unwrap_or(f64::INFINITY);
    fa / fb
}
