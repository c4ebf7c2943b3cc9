//! Caller-scoped registry for custom leaf types.
//!
//! A custom type supplies the codec quadruple (width, encode, decode,
//! jsonify) and must honor the round-trip law over its window. The
//! registry is an ordinary value passed around by the caller, never a
//! process-wide singleton, so custom types stay testable in isolation.

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigUint;

use crate::errors::{BuildError, ValueError};
use crate::types::{self, BType};
use crate::value::{self, Value};

/// Codec for a registered leaf type. The window handed to [decode] and
/// returned by [encode] is already shifted down to bit 0; an encode
/// result wider than the declared width surfaces as
/// [ValueError::InvalidType] at write time.
///
/// [decode]: CustomCodec::decode
/// [encode]: CustomCodec::encode
pub trait CustomCodec {
    fn decode(&self, win: &BigUint) -> Value;

    fn encode(&self, v: &Value) -> Result<BigUint, ValueError>;

    /// JSON form of a decoded value; defaults to the standard mapping.
    fn jsonify(&self, v: &Value) -> Result<serde_json::Value, ValueError> {
        value::to_json(v)
    }
}

/// A named collection of custom types.
#[derive(Default)]
pub struct Registry {
    types: HashMap<String, BType>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registers a custom leaf type and returns its descriptor. Zero
    /// widths fail with [BuildError::InvalidWidth], reused names with
    /// [BuildError::DuplicateName].
    pub fn register(
        &mut self,
        name: &str,
        width: usize,
        codec: Arc<dyn CustomCodec>,
    ) -> Result<BType, BuildError> {
        if self.types.contains_key(name) {
            return Err(BuildError::DuplicateName(name.to_string()));
        }
        let ty = types::custom(name, width, codec)?;
        self.types.insert(name.to_string(), ty.clone());
        Ok(ty)
    }

    pub fn get(&self, name: &str) -> Option<&BType> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::instantiate;
    use crate::types::{structure, uint};
    use num_bigint::BigInt;
    use num_traits::One;

    /// Gray-coded unsigned integer, the classic custom leaf.
    struct Gray {
        width: usize,
    }

    impl CustomCodec for Gray {
        fn decode(&self, win: &BigUint) -> Value {
            let mut v = win.clone();
            let mut shift = 1usize;
            while shift < self.width {
                v = &v ^ (&v >> shift);
                shift <<= 1;
            }
            Value::Int(BigInt::from(v))
        }

        fn encode(&self, v: &Value) -> Result<BigUint, ValueError> {
            match v {
                Value::Int(n) => {
                    let u = n.to_biguint().ok_or(ValueError::Overflow { width: self.width })?;
                    if crate::raw::bit_len(&u) > self.width {
                        return Err(ValueError::Overflow { width: self.width });
                    }
                    Ok(&u ^ (&u >> 1usize))
                }
                _ => Err(ValueError::SchemaMismatch("expected integer".to_string())),
            }
        }
    }

    #[test]
    fn test_register_and_round_trip() {
        let mut reg = Registry::new();
        let gray = reg
            .register("gray", 4, Arc::new(Gray { width: 4 }))
            .unwrap();

        let t = structure([("g", gray), ("pad", uint(4).unwrap())]).unwrap();
        let root = instantiate(&t).bind(0u64);
        let g = root.field("g").unwrap();

        for n in 0u64..16 {
            g.set_value(n).unwrap();
            assert_eq!(g, n);
        }
        // 5 -> gray 7
        g.set_value(5u64).unwrap();
        assert_eq!(g.raw(), BigUint::from(7u32));
    }

    #[test]
    fn test_duplicate_name() {
        let mut reg = Registry::new();
        reg.register("gray", 4, Arc::new(Gray { width: 4 })).unwrap();
        assert_eq!(
            reg.register("gray", 8, Arc::new(Gray { width: 8 }))
                .unwrap_err(),
            BuildError::DuplicateName("gray".to_string())
        );
    }

    #[test]
    fn test_lying_width_is_invalid_type() {
        struct Wide;

        impl CustomCodec for Wide {
            fn decode(&self, win: &BigUint) -> Value {
                Value::Int(BigInt::from(win.clone()))
            }

            fn encode(&self, _: &Value) -> Result<BigUint, ValueError> {
                // Declares 4 bits, produces 9.
                Ok(BigUint::one() << 8)
            }
        }

        let mut reg = Registry::new();
        let ty = reg.register("wide", 4, Arc::new(Wide)).unwrap();
        let root = instantiate(&structure([("w", ty)]).unwrap()).bind(0u64);
        assert_eq!(
            root.field("w").unwrap().set_value(0u64).unwrap_err(),
            ValueError::InvalidType("wide".to_string())
        );
    }
}
