//! Symbolic expressions over field references and constants.
//!
//! An [Expr] is built from the symbolic twin of a bound view: navigation
//! refines a reference, operators build `Binop`/`Unop` nodes, and a string
//! constant compared against an enum leaf is replaced by its code at build
//! time, so lowering never sees an unresolved label.
//!
//! The pipeline is `Symbolic -> Lowered -> Rendered`; this module is the
//! symbolic stage, [crate::ir] the other two. All transitions are pure.

use std::ops;
use std::sync::Arc;

use num_bigint::BigInt;

use crate::errors::{ExprError, PathError};
use crate::layout::FieldNode;
use crate::path::{self, Seg};
use crate::types::Kind;

/// Constant operand: integer or enum-label string.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(BigInt),
    Str(String),
}

/// Binary operators, rendered with C-family tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binop {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Binop {
    /// Source token for the renderer's operator table.
    pub fn token(self) -> &'static str {
        match self {
            Binop::Add => "+",
            Binop::Sub => "-",
            Binop::Mul => "*",
            Binop::Div => "/",
            Binop::Rem => "%",
            Binop::Shl => "<<",
            Binop::Shr => ">>",
            Binop::And => "&",
            Binop::Or => "|",
            Binop::Xor => "^",
            Binop::Eq => "==",
            Binop::Ne => "!=",
            Binop::Lt => "<",
            Binop::Le => "<=",
            Binop::Gt => ">",
            Binop::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unop {
    Neg,
    Not,
}

impl Unop {
    pub fn token(self) -> &'static str {
        match self {
            Unop::Neg => "-",
            Unop::Not => "~",
        }
    }
}

/// A symbolic expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A field reference, carrying its offset and width.
    Ref(Arc<FieldNode>),
    Const(Lit),
    Unop(Unop, Box<Expr>),
    Binop(Binop, Box<Expr>, Box<Expr>),
    /// Struct navigation on a reference; validated when built.
    Member(Box<Expr>, String),
    /// Array navigation on a reference; validated when built.
    Index(Box<Expr>, usize),
}

impl Expr {
    pub fn reference(node: Arc<FieldNode>) -> Expr {
        Expr::Ref(node)
    }

    /// Struct member access. Fails now if the field does not exist, so a
    /// built expression always resolves.
    pub fn member(self, name: &str) -> Result<Expr, PathError> {
        let node = self.node().ok_or(PathError::NotComposite)?;
        node.child(name)?;
        Ok(Expr::Member(Box::new(self), name.to_string()))
    }

    /// Array element access, validated like [Expr::member].
    pub fn index(self, k: usize) -> Result<Expr, PathError> {
        let node = self.node().ok_or(PathError::NotComposite)?;
        node.at(k)?;
        Ok(Expr::Index(Box::new(self), k))
    }

    /// Textual-path navigation: `e.get("page[2]")`.
    pub fn get(self, path_str: &str) -> Result<Expr, PathError> {
        let mut e = self;
        for seg in path::parse(path_str)? {
            e = match seg {
                Seg::Name(n) => e.member(&n)?,
                Seg::Index(k) => e.index(k)?,
            };
        }
        Ok(e)
    }

    /// The field node this expression refers to, if it is a (possibly
    /// navigated) reference.
    pub fn node(&self) -> Option<Arc<FieldNode>> {
        match self {
            Expr::Ref(n) => Some(n.clone()),
            Expr::Member(e, name) => e.node()?.child(name).ok().cloned(),
            Expr::Index(e, k) => e.node()?.at(*k).ok().cloned(),
            _ => None,
        }
    }

    pub fn eq(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        compare(Binop::Eq, self, rhs.into())
    }

    pub fn ne(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        compare(Binop::Ne, self, rhs.into())
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        compare(Binop::Lt, self, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        compare(Binop::Le, self, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        compare(Binop::Gt, self, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        compare(Binop::Ge, self, rhs.into())
    }
}

/// Builds a comparison, resolving label constants against enum leaves.
fn compare(op: Binop, lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
    let rhs = resolve_label(&lhs, rhs)?;
    let lhs = resolve_label(&rhs, lhs)?;
    Ok(Expr::Binop(op, Box::new(lhs), Box::new(rhs)))
}

/// If `other` names an enum leaf and `e` is a string constant, replaces
/// `e` by the label's code. Unknown labels fail immediately.
fn resolve_label(other: &Expr, e: Expr) -> Result<Expr, ExprError> {
    match e {
        Expr::Const(Lit::Str(label)) => {
            if let Some(node) = other.node() {
                if let Kind::UInt {
                    labels: Some(table),
                    ..
                } = node.btype().kind()
                {
                    let code = table
                        .code(&label)
                        .ok_or_else(|| ExprError::UnknownLabel(label.clone()))?;
                    return Ok(Expr::Const(Lit::Int(BigInt::from(code.clone()))));
                }
            }
            Ok(Expr::Const(Lit::Str(label)))
        }
        e => Ok(e),
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Const(Lit::Int(BigInt::from(n)))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Const(Lit::Int(BigInt::from(n)))
    }
}

impl From<u64> for Expr {
    fn from(n: u64) -> Self {
        Expr::Const(Lit::Int(BigInt::from(n)))
    }
}

impl From<BigInt> for Expr {
    fn from(n: BigInt) -> Self {
        Expr::Const(Lit::Int(n))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Const(Lit::Str(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Const(Lit::Str(s))
    }
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> ops::$trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::Binop($op, Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

impl_binop!(Add, add, Binop::Add);
impl_binop!(Sub, sub, Binop::Sub);
impl_binop!(Mul, mul, Binop::Mul);
impl_binop!(Div, div, Binop::Div);
impl_binop!(Rem, rem, Binop::Rem);
impl_binop!(Shl, shl, Binop::Shl);
impl_binop!(Shr, shr, Binop::Shr);
impl_binop!(BitAnd, bitand, Binop::And);
impl_binop!(BitOr, bitor, Binop::Or);
impl_binop!(BitXor, bitxor, Binop::Xor);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unop(Unop::Neg, Box::new(self))
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unop(Unop::Not, Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::instantiate;
    use crate::types::{structure, uint, uint_enum, EnumTable};

    fn quest() -> crate::layout::Interface {
        let status = uint_enum(
            2,
            EnumTable::from_labels(["dead", "pining", "resting"]).unwrap(),
        )
        .unwrap();
        instantiate(
            &structure([("holy", uint(1).unwrap()), ("status", status)]).unwrap(),
        )
    }

    #[test]
    fn test_navigation_refines() {
        let iface = quest();
        let e = iface.expr().member("status").unwrap();
        let node = e.node().unwrap();
        assert_eq!(node.offset(), 1);
        assert_eq!(node.width(), 2);
    }

    #[test]
    fn test_navigation_validated_at_build() {
        let iface = quest();
        assert_eq!(
            iface.expr().member("grail").unwrap_err(),
            PathError::NoSuchField("grail".to_string())
        );
    }

    #[test]
    fn test_label_resolution() {
        let iface = quest();
        let e = iface
            .expr()
            .member("status")
            .unwrap()
            .eq("resting")
            .unwrap();
        let Expr::Binop(Binop::Eq, _, rhs) = e else {
            panic!("expected comparison");
        };
        let Expr::Const(Lit::Int(code)) = *rhs else {
            panic!("label should resolve to its code");
        };
        assert_eq!(code, BigInt::from(2));
    }

    #[test]
    fn test_unknown_label_fails_at_build() {
        let iface = quest();
        let err = iface
            .expr()
            .member("status")
            .unwrap()
            .eq("ex")
            .unwrap_err();
        assert_eq!(err, ExprError::UnknownLabel("ex".to_string()));
    }

    #[test]
    fn test_operators_build_nodes() {
        let iface = quest();
        let holy = iface.expr().member("holy").unwrap();
        let e = (holy << 3u64) + 1u64;
        assert!(matches!(e, Expr::Binop(Binop::Add, _, _)));
    }
}
