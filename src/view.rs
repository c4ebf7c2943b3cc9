//! Bound field views: a field node paired with a shared raw cell.
//!
//! Every read reprojects the live cell, so sibling views observe each
//! other's writes immediately and nothing is cached across mutations.
//! Writes are transactional: the new window is encoded first and
//! committed with one masked store, so a failed write leaves the cell
//! unchanged.
//!
//! A `Bound` is the data-mode twin of the symbolic [crate::expr::Expr];
//! both reference the same field nodes and [Bound::expr] crosses over.

use std::sync::Arc;

use num_bigint::{BigInt, BigUint};

use crate::codec;
use crate::errors::{PathError, ValueError};
use crate::expr::Expr;
use crate::layout::FieldNode;
use crate::raw::{self, RawCell};
use crate::types::{BType, Kind};
use crate::value::{self, Value};

/// A field bound to a raw-integer cell.
#[derive(Debug, Clone)]
pub struct Bound {
    node: Arc<FieldNode>,
    cell: RawCell,
}

impl Bound {
    pub(crate) fn new(node: Arc<FieldNode>, cell: RawCell) -> Self {
        Bound { node, cell }
    }

    pub fn node(&self) -> &Arc<FieldNode> {
        &self.node
    }

    pub fn btype(&self) -> &BType {
        self.node.btype()
    }

    /// Width in bits.
    pub fn size(&self) -> usize {
        self.node.width()
    }

    /// Absolute bit offset within the interface.
    pub fn offset(&self) -> usize {
        self.node.offset()
    }

    pub fn path(&self) -> &str {
        self.node.path()
    }

    /// Array dimension, if this view is an array.
    pub fn dim(&self) -> Option<usize> {
        self.node.dim()
    }

    /// The raw window projection `(cell >> offset) & mask(width)`.
    pub fn raw(&self) -> BigUint {
        raw::read_window(&self.cell.get(), self.node.offset(), self.node.width())
    }

    /// Replaces the raw window. Values with bits beyond the field width
    /// fail with [ValueError::Overflow].
    pub fn set_raw(&self, n: impl Into<BigUint>) -> Result<(), ValueError> {
        let n = n.into();
        if raw::bit_len(&n) > self.node.width() {
            return Err(ValueError::Overflow {
                width: self.node.width(),
            });
        }
        self.commit(&n);
        Ok(())
    }

    /// The decoded structured value.
    pub fn value(&self) -> Result<Value, ValueError> {
        codec::decode(self.node.btype(), &self.raw())
    }

    /// Writes a structured value through the recursive encoder. Struct
    /// keys absent from a map keep their current bits.
    pub fn set_value(&self, v: impl Into<Value>) -> Result<(), ValueError> {
        let base = self.raw();
        let win = codec::encode(self.node.btype(), &v.into(), &base)?;
        self.commit(&win);
        Ok(())
    }

    /// The decoded value as a JSON document.
    pub fn json(&self) -> Result<String, ValueError> {
        let j = codec::json_value(self.node.btype(), &self.value()?)?;
        serde_json::to_string(&j).map_err(|e| ValueError::SchemaMismatch(e.to_string()))
    }

    /// Parses a JSON document and writes it. Unknown struct keys fail
    /// with [ValueError::SchemaMismatch].
    pub fn set_json(&self, s: &str) -> Result<(), ValueError> {
        let j: serde_json::Value =
            serde_json::from_str(s).map_err(|e| ValueError::SchemaMismatch(e.to_string()))?;
        self.set_value(value::from_json(&j)?)
    }

    /// Zero-padded binary string of the raw window, no prefix.
    pub fn bin(&self) -> String {
        let s = self.raw().to_str_radix(2);
        format!("{:0>width$}", s, width = self.node.width())
    }

    /// Reads a binary string; `0b` prefixes and `u`/`l` suffixes are
    /// accepted and overflow truncates, as the permissive input form.
    pub fn set_bin(&self, s: &str) -> Result<(), ValueError> {
        let digits = strip_int_literal(s, &["0b", "0B"], false)
            .filter(|d| d.bytes().all(|b| b == b'0' || b == b'1'))
            .ok_or_else(|| ValueError::SchemaMismatch(format!("expected binary string, got \"{}\"", s)))?;
        let n = BigUint::parse_bytes(digits.as_bytes(), 2)
            .ok_or_else(|| ValueError::SchemaMismatch(format!("expected binary string, got \"{}\"", s)))?;
        self.commit(&n);
        Ok(())
    }

    /// Zero-padded hex string of the raw window, no prefix.
    pub fn hex(&self) -> String {
        let s = self.raw().to_str_radix(16);
        format!("{:0>width$}", s, width = (self.node.width() + 3) / 4)
    }

    /// Reads a hex string with the same permissive syntax as [Bound::set_bin]
    /// (plus the trailing `h` form); overflow truncates.
    pub fn set_hex(&self, s: &str) -> Result<(), ValueError> {
        let digits = strip_int_literal(s, &["0x", "0X"], true)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| ValueError::SchemaMismatch(format!("expected hex string, got \"{}\"", s)))?;
        let n = BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| ValueError::SchemaMismatch(format!("expected hex string, got \"{}\"", s)))?;
        self.commit(&n);
        Ok(())
    }

    /// Struct child view.
    pub fn field(&self, name: &str) -> Result<Bound, PathError> {
        Ok(Bound::new(self.node.child(name)?.clone(), self.cell.clone()))
    }

    /// Array element view.
    pub fn at(&self, k: usize) -> Result<Bound, PathError> {
        Ok(Bound::new(self.node.at(k)?.clone(), self.cell.clone()))
    }

    /// Parsed-path navigation: `view.get("a.b[3].c")`.
    pub fn get(&self, path: &str) -> Result<Bound, PathError> {
        Ok(Bound::new(self.node.get(path)?, self.cell.clone()))
    }

    /// Child views in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Bound> + '_ {
        self.node
            .children()
            .iter()
            .map(|c| Bound::new(c.clone(), self.cell.clone()))
    }

    /// The symbolic twin of this view, for expression building.
    pub fn expr(&self) -> Expr {
        Expr::reference(self.node.clone())
    }

    /// Masked write of the window into the shared cell.
    fn commit(&self, win: &BigUint) {
        let whole = self.cell.get();
        self.cell.set(raw::write_window(
            &whole,
            self.node.offset(),
            self.node.width(),
            win,
        ));
    }

    /// Integer reading of the window for duck-typed comparisons: signed
    /// fields sign-reduce, everything else compares its raw code.
    fn int_value(&self) -> Option<BigInt> {
        match self.node.btype().kind() {
            Kind::Struct { .. } | Kind::Array { .. } | Kind::Utf8 { .. } | Kind::Fixed { .. } => {
                None
            }
            Kind::SInt { .. } | Kind::Custom { .. } => match self.value() {
                Ok(Value::Int(i)) => Some(i),
                _ => None,
            },
            _ => Some(BigInt::from(self.raw())),
        }
    }
}

/// Strips whitespace, an optional radix prefix, and the permissive
/// `u`/`l`/`h` integer-literal suffixes. Returns the digit payload.
fn strip_int_literal<'a>(s: &'a str, prefixes: &[&str], hex_suffix: bool) -> Option<&'a str> {
    let mut t = s.trim();
    for p in prefixes {
        if let Some(rest) = t.strip_prefix(p) {
            t = rest;
            break;
        }
    }
    if hex_suffix {
        if let Some(rest) = t.strip_suffix(|c| c == 'h' || c == 'H') {
            return non_empty(rest);
        }
    }
    for suffix in ["ull", "ULL", "uLL", "Ull", "ul", "UL", "uL", "Ul", "ll", "LL", "l", "L"] {
        if let Some(rest) = t.strip_suffix(suffix) {
            return non_empty(rest);
        }
    }
    non_empty(t)
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl Bound {
    /// Integer form used by duck-typed arithmetic: signed and custom
    /// leaves decode, everything else contributes its raw window.
    fn arith_int(&self) -> BigInt {
        self.int_value()
            .unwrap_or_else(|| BigInt::from(self.raw()))
    }
}

macro_rules! impl_bound_arith {
    ($trait:ident, $method:ident) => {
        impl<R: Into<BigInt>> std::ops::$trait<R> for &Bound {
            type Output = BigInt;

            fn $method(self, rhs: R) -> BigInt {
                std::ops::$trait::$method(self.arith_int(), rhs.into())
            }
        }
    };
}

impl_bound_arith!(Add, add);
impl_bound_arith!(Sub, sub);
impl_bound_arith!(Mul, mul);
impl_bound_arith!(BitAnd, bitand);
impl_bound_arith!(BitOr, bitor);
impl_bound_arith!(BitXor, bitxor);

impl PartialEq for Bound {
    fn eq(&self, other: &Self) -> bool {
        self.raw() == other.raw()
    }
}

impl PartialEq<u64> for Bound {
    fn eq(&self, other: &u64) -> bool {
        self.int_value() == Some(BigInt::from(*other))
    }
}

impl PartialEq<i64> for Bound {
    fn eq(&self, other: &i64) -> bool {
        self.int_value() == Some(BigInt::from(*other))
    }
}

impl PartialEq<&str> for Bound {
    fn eq(&self, other: &&str) -> bool {
        matches!(self.value(), Ok(Value::Str(s)) if s == *other)
    }
}

impl PartialEq<f64> for Bound {
    fn eq(&self, other: &f64) -> bool {
        matches!(self.value(), Ok(Value::Float(x)) if x == *other)
    }
}

impl PartialEq<Value> for Bound {
    fn eq(&self, other: &Value) -> bool {
        matches!(self.value(), Ok(v) if v == *other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::instantiate;
    use crate::types::{structure, uint, uint_enum, EnumTable};

    fn pair() -> Bound {
        let t = structure([("a", uint(5).unwrap()), ("b", uint(13).unwrap())]).unwrap();
        instantiate(&t).bind(0u64)
    }

    #[test]
    fn test_sibling_views_coherent() {
        let root = pair();
        let a = root.field("a").unwrap();
        let b = root.field("b").unwrap();

        a.set_value(11u64).unwrap();
        b.set_value(5461u64).unwrap();

        assert_eq!(root.raw(), BigUint::from((5461u64 << 5) | 11));
        assert_eq!(a, 11u64);
        assert_eq!(b, 5461u64);
    }

    #[test]
    fn test_failed_write_leaves_cell() {
        let root = pair();
        root.set_raw(0x2aaaau64).unwrap();
        let before = root.raw();

        let a = root.field("a").unwrap();
        assert!(a.set_value(32u64).is_err());
        assert_eq!(root.raw(), before);
    }

    #[test]
    fn test_enum_comparisons() {
        let t = structure([(
            "status",
            uint_enum(2, EnumTable::from_labels(["dead", "pining", "resting"]).unwrap()).unwrap(),
        )])
        .unwrap();
        let root = instantiate(&t).bind(0u64);
        let status = root.field("status").unwrap();

        status.set_value("pining").unwrap();
        assert_eq!(status, "pining");
        assert_eq!(status, 1u64);
    }

    #[test]
    fn test_json_round_trip() {
        let root = pair();
        root.set_json(r#"{"a": 3, "b": 77}"#).unwrap();
        assert_eq!(root.json().unwrap(), r#"{"a":3,"b":77}"#);
        assert_eq!(root.raw(), BigUint::from((77u64 << 5) | 3));
    }

    #[test]
    fn test_json_unknown_key() {
        let root = pair();
        assert!(matches!(
            root.set_json(r#"{"zz": 0}"#),
            Err(ValueError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_hex_bin_accessors() {
        let t = uint(35).unwrap();
        let x = instantiate(&t).bind(0u64);

        x.set_hex("f1234567f").unwrap();
        // Truncated to 35 bits.
        assert_eq!(x.raw(), BigUint::from(0x71234567fu64));
        assert_eq!(x.bin(), "11100010010001101000101011001111111");
        assert_eq!(x.hex(), "71234567f");

        x.set_hex("0xfL").unwrap();
        assert_eq!(x, 15u64);

        x.set_bin("0B111L").unwrap();
        assert_eq!(x.bin(), "00000000000000000000000000000000111");
    }

    #[test]
    fn test_bad_hex_rejected() {
        let x = instantiate(&uint(8).unwrap()).bind(0u64);
        assert!(x.set_hex("hello!").is_err());
        assert!(x.set_bin("0b102").is_err());
    }

    #[test]
    fn test_set_raw_checks_width() {
        let root = pair();
        assert!(root.set_raw(1u64 << 18).is_err());
        assert!(root.set_raw((1u64 << 18) - 1).is_ok());
    }

    #[test]
    fn test_view_arithmetic() {
        let root = pair();
        let a = root.field("a").unwrap();
        a.set_value(11u64).unwrap();

        assert_eq!(&a + 2, BigInt::from(13));
        assert_eq!(&a * 3, BigInt::from(33));
        assert_eq!(&a & 0b1001, BigInt::from(0b1001));
    }

    #[test]
    fn test_introspection() {
        let root = pair();
        let b = root.field("b").unwrap();
        assert_eq!(b.size(), 13);
        assert_eq!(b.offset(), 5);
        assert_eq!(b.path(), "b");
        assert_eq!(root.size(), 18);
    }
}
