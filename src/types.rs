//! The layout-type algebra: primitive and compound descriptors that
//! compute the bit width and codec rule of every field.
//!
//! Types are immutable value objects. Equality and hashing are structural
//! on the payload, so interning is legal but never required.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use num_bigint::BigUint;

use crate::errors::BuildError;
use crate::extension::CustomCodec;
use crate::raw::bit_len;

/// Forward and reverse label/code maps for an enumerated unsigned field.
/// The two maps are total inverses on their supports by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EnumTable {
    forward: BTreeMap<String, BigUint>,
    reverse: BTreeMap<BigUint, String>,
}

impl EnumTable {
    /// Builds a table from `(label, code)` pairs. Duplicate labels or
    /// duplicate codes fail with [BuildError::InvalidType].
    pub fn new<L, C>(pairs: impl IntoIterator<Item = (L, C)>) -> Result<Self, BuildError>
    where
        L: Into<String>,
        C: Into<BigUint>,
    {
        let mut forward = BTreeMap::new();
        let mut reverse = BTreeMap::new();

        for (label, code) in pairs {
            let label = label.into();
            let code = code.into();

            if reverse.insert(code.clone(), label.clone()).is_some() {
                return Err(BuildError::InvalidType(format!(
                    "enum code {} mapped twice",
                    code
                )));
            }
            if forward.insert(label.clone(), code).is_some() {
                return Err(BuildError::InvalidType(format!(
                    "enum label '{}' mapped twice",
                    label
                )));
            }
        }

        Ok(EnumTable { forward, reverse })
    }

    /// Builds the `0..n` table from a label list.
    pub fn from_labels<L: Into<String>>(
        labels: impl IntoIterator<Item = L>,
    ) -> Result<Self, BuildError> {
        Self::new(
            labels
                .into_iter()
                .enumerate()
                .map(|(i, l)| (l, BigUint::from(i))),
        )
    }

    pub fn code(&self, label: &str) -> Option<&BigUint> {
        self.forward.get(label)
    }

    pub fn label(&self, code: &BigUint) -> Option<&str> {
        self.reverse.get(code).map(String::as_str)
    }

    /// Largest mapped code, used to validate the table against a width.
    pub fn max_code(&self) -> Option<&BigUint> {
        self.reverse.keys().next_back()
    }
}

/// Kind-specific payload of a [BType].
pub enum Kind {
    UInt {
        width: usize,
        labels: Option<EnumTable>,
    },
    SInt {
        width: usize,
    },
    /// Fixed point stored as a signed integer scaled by `base^precision`.
    Fixed {
        width: usize,
        precision: u32,
        base: u32,
    },
    /// UTF-8 text window; byte 0 of the string sits at the highest byte.
    Utf8 {
        bytes: usize,
    },
    Struct {
        fields: Vec<(String, BType)>,
    },
    Array {
        elem: BType,
        dim: usize,
    },
    Custom {
        name: String,
        width: usize,
        codec: Arc<dyn CustomCodec>,
    },
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::UInt { width, labels } => f
                .debug_struct("UInt")
                .field("width", width)
                .field("labels", labels)
                .finish(),
            Kind::SInt { width } => f.debug_struct("SInt").field("width", width).finish(),
            Kind::Fixed {
                width,
                precision,
                base,
            } => f
                .debug_struct("Fixed")
                .field("width", width)
                .field("precision", precision)
                .field("base", base)
                .finish(),
            Kind::Utf8 { bytes } => f.debug_struct("Utf8").field("bytes", bytes).finish(),
            Kind::Struct { fields } => f.debug_struct("Struct").field("fields", fields).finish(),
            Kind::Array { elem, dim } => f
                .debug_struct("Array")
                .field("elem", elem)
                .field("dim", dim)
                .finish(),
            Kind::Custom { name, width, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("width", width)
                .finish(),
        }
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Kind::UInt { width: a, labels: la },
                Kind::UInt { width: b, labels: lb },
            ) => a == b && la == lb,
            (Kind::SInt { width: a }, Kind::SInt { width: b }) => a == b,
            (
                Kind::Fixed { width: a, precision: pa, base: ba },
                Kind::Fixed { width: b, precision: pb, base: bb },
            ) => a == b && pa == pb && ba == bb,
            (Kind::Utf8 { bytes: a }, Kind::Utf8 { bytes: b }) => a == b,
            (Kind::Struct { fields: a }, Kind::Struct { fields: b }) => a == b,
            (
                Kind::Array { elem: a, dim: da },
                Kind::Array { elem: b, dim: db },
            ) => a == b && da == db,
            // Codec closures are opaque; a custom type's identity is its
            // registered name and width.
            (
                Kind::Custom { name: a, width: wa, .. },
                Kind::Custom { name: b, width: wb, .. },
            ) => a == b && wa == wb,
            _ => false,
        }
    }
}

impl Eq for Kind {}

impl Hash for Kind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Kind::UInt { width, labels } => {
                0u8.hash(state);
                width.hash(state);
                labels.hash(state);
            }
            Kind::SInt { width } => {
                1u8.hash(state);
                width.hash(state);
            }
            Kind::Fixed {
                width,
                precision,
                base,
            } => {
                2u8.hash(state);
                width.hash(state);
                precision.hash(state);
                base.hash(state);
            }
            Kind::Utf8 { bytes } => {
                3u8.hash(state);
                bytes.hash(state);
            }
            Kind::Struct { fields } => {
                4u8.hash(state);
                fields.hash(state);
            }
            Kind::Array { elem, dim } => {
                5u8.hash(state);
                elem.hash(state);
                dim.hash(state);
            }
            Kind::Custom { name, width, .. } => {
                6u8.hash(state);
                name.hash(state);
                width.hash(state);
            }
        }
    }
}

/// A layout type: computed bit width plus a shared kind payload.
/// Cheap to clone; shared by any number of field trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BType {
    width: usize,
    kind: Arc<Kind>,
}

impl BType {
    fn new(width: usize, kind: Kind) -> Self {
        BType {
            width,
            kind: Arc::new(kind),
        }
    }

    /// Total width in bits.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Array sugar: `t.repeat(n)` is `array(t, n)`.
    pub fn repeat(&self, dim: usize) -> BType {
        array(self.clone(), dim)
    }

    /// True for types the codec reads and writes as one window.
    pub fn is_leaf(&self) -> bool {
        !matches!(*self.kind, Kind::Struct { .. } | Kind::Array { .. })
    }
}

impl fmt::Display for BType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            Kind::UInt { width, .. } => write!(f, "uint({})", width),
            Kind::SInt { width } => write!(f, "sint({})", width),
            Kind::Fixed {
                width,
                precision,
                base,
            } => write!(f, "fixed({}, {}, {})", width, precision, base),
            Kind::Utf8 { bytes } => write!(f, "utf8({})", bytes),
            Kind::Struct { fields } => {
                write!(f, "struct([")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "(\"{}\", {})", name, ty)?;
                }
                write!(f, "])")
            }
            Kind::Array { elem, dim } => write!(f, "{}[{}]", elem, dim),
            Kind::Custom { name, width, .. } => write!(f, "{}({})", name, width),
        }
    }
}

/// Unsigned integer of `width` bits.
pub fn uint(width: usize) -> Result<BType, BuildError> {
    if width == 0 {
        return Err(BuildError::InvalidWidth);
    }
    Ok(BType::new(width, Kind::UInt { width, labels: None }))
}

/// Unsigned integer with an enum table. Every mapped code must fit in
/// `width` bits.
pub fn uint_enum(width: usize, labels: EnumTable) -> Result<BType, BuildError> {
    if width == 0 {
        return Err(BuildError::InvalidWidth);
    }
    if let Some(max) = labels.max_code() {
        if bit_len(max) > width {
            return Err(BuildError::InvalidType(format!(
                "enum code {} does not fit in {} bits",
                max, width
            )));
        }
    }
    Ok(BType::new(
        width,
        Kind::UInt {
            width,
            labels: Some(labels),
        },
    ))
}

/// Two's-complement signed integer of `width` bits.
pub fn sint(width: usize) -> Result<BType, BuildError> {
    if width == 0 {
        return Err(BuildError::InvalidWidth);
    }
    Ok(BType::new(width, Kind::SInt { width }))
}

/// Fixed point: a signed `width`-bit integer decoded as
/// `stored / base^precision`.
pub fn fixed(width: usize, precision: u32, base: u32) -> Result<BType, BuildError> {
    if width == 0 {
        return Err(BuildError::InvalidWidth);
    }
    if base < 2 {
        return Err(BuildError::InvalidType(format!(
            "fixed-point base must be at least 2, got {}",
            base
        )));
    }
    Ok(BType::new(
        width,
        Kind::Fixed {
            width,
            precision,
            base,
        },
    ))
}

/// Decimal fixed point: `decimal(16, 2)` stores hundredths in 16 bits.
pub fn decimal(width: usize, precision: u32) -> Result<BType, BuildError> {
    fixed(width, precision, 10)
}

/// UTF-8 text window of `byte_length` bytes (`8 * byte_length` bits).
pub fn utf8(byte_length: usize) -> Result<BType, BuildError> {
    if byte_length == 0 {
        return Err(BuildError::InvalidWidth);
    }
    Ok(BType::new(8 * byte_length, Kind::Utf8 { bytes: byte_length }))
}

/// Ordered struct of named fields. Width is the sum of field widths;
/// the first declared field occupies the low-order bits.
pub fn structure<N: Into<String>>(
    fields: impl IntoIterator<Item = (N, BType)>,
) -> Result<BType, BuildError> {
    let fields: Vec<(String, BType)> = fields
        .into_iter()
        .map(|(n, t)| (n.into(), t))
        .collect();

    let mut seen = std::collections::HashSet::new();
    for (name, _) in &fields {
        if name.ends_with('_') {
            return Err(BuildError::ReservedName(name.clone()));
        }
        if !is_identifier(name) {
            return Err(BuildError::InvalidType(format!(
                "field name '{}' is not an identifier",
                name
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(BuildError::DuplicateName(name.clone()));
        }
    }

    let width = fields.iter().map(|(_, t)| t.width()).sum();
    Ok(BType::new(width, Kind::Struct { fields }))
}

/// Fixed-length array of `dim` elements. `dim` may be zero.
pub fn array(elem: BType, dim: usize) -> BType {
    BType::new(elem.width() * dim, Kind::Array { elem, dim })
}

/// Custom leaf type backed by a registered codec. Prefer going through
/// [crate::extension::Registry] so names stay unique per caller scope.
pub fn custom(
    name: impl Into<String>,
    width: usize,
    codec: Arc<dyn CustomCodec>,
) -> Result<BType, BuildError> {
    if width == 0 {
        return Err(BuildError::InvalidWidth);
    }
    Ok(BType::new(
        width,
        Kind::Custom {
            name: name.into(),
            width,
            codec,
        },
    ))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_width_rejected() {
        assert_eq!(uint(0), Err(BuildError::InvalidWidth));
        assert_eq!(sint(0), Err(BuildError::InvalidWidth));
        assert_eq!(utf8(0), Err(BuildError::InvalidWidth));
    }

    #[test]
    fn test_struct_width_is_sum() {
        let t = structure([("a", uint(5).unwrap()), ("b", uint(13).unwrap())]).unwrap();
        assert_eq!(t.width(), 18);
    }

    #[test]
    fn test_array_width() {
        let t = uint(6).unwrap().repeat(4);
        assert_eq!(t.width(), 24);
        assert_eq!(array(uint(6).unwrap(), 0).width(), 0);
    }

    #[test]
    fn test_duplicate_name() {
        let err = structure([("a", uint(1).unwrap()), ("a", uint(2).unwrap())]).unwrap_err();
        assert_eq!(err, BuildError::DuplicateName("a".to_string()));
    }

    #[test]
    fn test_reserved_name() {
        let err = structure([("size_", uint(1).unwrap())]).unwrap_err();
        assert_eq!(err, BuildError::ReservedName("size_".to_string()));
    }

    #[test]
    fn test_enum_code_must_fit() {
        let table = EnumTable::new([("big", 4u32)]).unwrap();
        assert!(matches!(
            uint_enum(2, table),
            Err(BuildError::InvalidType(_))
        ));
    }

    #[test]
    fn test_enum_table_inverse() {
        let table = EnumTable::from_labels(["dead", "pining", "resting"]).unwrap();
        assert_eq!(table.code("pining"), Some(&BigUint::from(1u32)));
        assert_eq!(table.label(&BigUint::from(2u32)), Some("resting"));
        assert_eq!(table.label(&BigUint::from(3u32)), None);
    }

    #[test]
    fn test_enum_duplicate_code() {
        assert!(EnumTable::new([("a", 1u32), ("b", 1u32)]).is_err());
    }

    #[test]
    fn test_structural_equality() {
        let a = structure([("x", uint(3).unwrap())]).unwrap();
        let b = structure([("x", uint(3).unwrap())]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, structure([("x", uint(4).unwrap())]).unwrap());
    }

    #[test]
    fn test_display() {
        let t = structure([
            ("a", uint(3).unwrap()),
            ("b", sint(4).unwrap().repeat(2)),
        ])
        .unwrap();
        assert_eq!(
            t.to_string(),
            "struct([(\"a\", uint(3)), (\"b\", sint(4)[2])])"
        );
    }
}
