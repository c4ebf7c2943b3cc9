//! Lowering symbolic expressions to a pure shift-and IR, and rendering
//! the IR as portable source text.
//!
//! Every field reference with offset `o` and width `w` reduces to
//! `(x >> o) & mask(w)` over the raw-integer symbol `x`. With a word
//! width `W`, the symbol becomes `x[k]` with `k = o / W` and the offset
//! `o mod W`; a field straddling a word boundary reads both words. Signed
//! fields wrap the read in `((v ^ sign_bit) - sign_bit)`.
//!
//! The rendered text is valid in the common C-family subset. Every binary
//! operation below the root is parenthesized, so no consumer-side
//! precedence assumptions are needed; masks print as hex, everything else
//! as decimal.

use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;

use crate::errors::ExprError;
use crate::expr::{Binop, Expr, Lit, Unop};
use crate::layout::FieldNode;
use crate::raw::mask;
use crate::types::Kind;

/// The lowered expression form: bitwise arithmetic over the raw symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Ir {
    /// The whole raw integer, `x`.
    Sym,
    /// Word `k` of the raw integer, `x[k]`.
    Word(usize),
    /// Decimal literal.
    Int(BigInt),
    /// Hex literal, used for masks and sign bits.
    Hex(BigUint),
    Bin(Binop, Box<Ir>, Box<Ir>),
    Un(Unop, Box<Ir>),
}

fn bin(op: Binop, l: Ir, r: Ir) -> Ir {
    Ir::Bin(op, Box::new(l), Box::new(r))
}

/// Lowers a symbolic expression. `word_width` of `None` keeps the single
/// unbounded symbol; `Some(w)` switches to the word-indexed form.
pub fn lower(expr: &Expr, word_width: Option<usize>) -> Result<Ir, ExprError> {
    match expr {
        Expr::Ref(_) | Expr::Member(..) | Expr::Index(..) => {
            // Navigation chains were validated at build time.
            let node = expr.node().ok_or(ExprError::NotLowerable)?;
            lower_ref(&node, word_width)
        }
        Expr::Const(Lit::Int(i)) => Ok(Ir::Int(i.clone())),
        // A surviving string constant was never matched against an enum.
        Expr::Const(Lit::Str(_)) => Err(ExprError::NotLowerable),
        Expr::Binop(op, l, r) => Ok(bin(
            *op,
            lower(l, word_width)?,
            lower(r, word_width)?,
        )),
        Expr::Unop(op, e) => Ok(Ir::Un(*op, Box::new(lower(e, word_width)?))),
    }
}

fn lower_ref(node: &FieldNode, word_width: Option<usize>) -> Result<Ir, ExprError> {
    let unsigned = shift_and(node.offset(), node.width(), word_width)?;
    match node.btype().kind() {
        Kind::SInt { width } => {
            let sign_bit = BigUint::from(1u32) << (width - 1);
            Ok(bin(
                Binop::Sub,
                bin(Binop::Xor, unsigned, Ir::Hex(sign_bit.clone())),
                Ir::Hex(sign_bit),
            ))
        }
        // Fixed point decodes to a ratio, utf8 and custom leaves to
        // non-integers; none has a closed integer form.
        Kind::Fixed { .. } | Kind::Utf8 { .. } | Kind::Custom { .. } => {
            Err(ExprError::NotLowerable)
        }
        _ => Ok(unsigned),
    }
}

/// `(x >> offset) & mask(width)`, in whole-symbol or word-indexed form.
fn shift_and(offset: usize, width: usize, word_width: Option<usize>) -> Result<Ir, ExprError> {
    let Some(word) = word_width else {
        return Ok(bin(
            Binop::And,
            shr(Ir::Sym, offset),
            Ir::Hex(mask(width)),
        ));
    };

    if width > word {
        return Err(ExprError::FieldExceedsWord { width, word });
    }

    let j = offset / word;
    let k = offset % word;

    if k + width <= word {
        return Ok(bin(Binop::And, shr(Ir::Word(j), k), Ir::Hex(mask(width))));
    }

    // Straddles the boundary: low bits from word j, the rest from j + 1.
    let low = word - k;
    let high = width - low;
    Ok(bin(
        Binop::Or,
        bin(Binop::And, shr(Ir::Word(j), k), Ir::Hex(mask(low))),
        bin(
            Binop::Shl,
            bin(Binop::And, Ir::Word(j + 1), Ir::Hex(mask(high))),
            Ir::Int(BigInt::from(low)),
        ),
    ))
}

fn shr(e: Ir, offset: usize) -> Ir {
    if offset == 0 {
        e
    } else {
        bin(Binop::Shr, e, Ir::Int(BigInt::from(offset)))
    }
}

/// Serializes the IR. The root binary operation is bare; every nested one
/// is parenthesized.
pub fn render(ir: &Ir) -> String {
    render_node(ir, true)
}

fn render_node(ir: &Ir, root: bool) -> String {
    match ir {
        Ir::Sym => "x".to_string(),
        Ir::Word(k) => format!("x[{}]", k),
        Ir::Int(i) => i.to_string(),
        Ir::Hex(u) => format!("0x{:x}", u),
        Ir::Bin(op, l, r) => {
            let body = format!(
                "{} {} {}",
                render_node(l, false),
                op.token(),
                render_node(r, false)
            );
            if root {
                body
            } else {
                format!("({})", body)
            }
        }
        Ir::Un(op, e) => format!("{}{}", op.token(), render_node(e, false)),
    }
}

/// Reference evaluator for lowered expressions: plugs `raw` in for the
/// symbol and computes the integer result (comparisons give 0 or 1).
/// Returns `None` on division by zero or an oversized shift count.
pub fn eval(ir: &Ir, raw: &BigUint, word_width: Option<usize>) -> Option<BigInt> {
    use num_traits::Zero;

    match ir {
        Ir::Sym => Some(BigInt::from(raw.clone())),
        Ir::Word(k) => {
            let w = word_width?;
            Some(BigInt::from((raw >> (k * w)) & mask(w)))
        }
        Ir::Int(i) => Some(i.clone()),
        Ir::Hex(u) => Some(BigInt::from(u.clone())),
        Ir::Bin(op, l, r) => {
            let a = eval(l, raw, word_width)?;
            let b = eval(r, raw, word_width)?;
            let flag = |c: bool| Some(BigInt::from(c as u8));
            match op {
                Binop::Add => Some(a + b),
                Binop::Sub => Some(a - b),
                Binop::Mul => Some(a * b),
                Binop::Div => (!b.is_zero()).then(|| a / b),
                Binop::Rem => (!b.is_zero()).then(|| a % b),
                Binop::Shl => Some(a << b.to_usize()?),
                Binop::Shr => Some(a >> b.to_usize()?),
                Binop::And => Some(a & b),
                Binop::Or => Some(a | b),
                Binop::Xor => Some(a ^ b),
                Binop::Eq => flag(a == b),
                Binop::Ne => flag(a != b),
                Binop::Lt => flag(a < b),
                Binop::Le => flag(a <= b),
                Binop::Gt => flag(a > b),
                Binop::Ge => flag(a >= b),
            }
        }
        Ir::Un(op, e) => {
            let v = eval(e, raw, word_width)?;
            match op {
                Unop::Neg => Some(-v),
                // Bitwise complement in unbounded two's complement.
                Unop::Not => Some(-(v + BigInt::from(1))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::instantiate;
    use crate::types::{sint, structure, uint, uint_enum, utf8, EnumTable};

    fn seven() -> crate::layout::Interface {
        // b occupies the low 4 bits, a the next 3.
        instantiate(
            &structure([("b", uint(4).unwrap()), ("a", uint(3).unwrap())]).unwrap(),
        )
    }

    #[test]
    fn test_field_renders_shift_and() {
        let iface = seven();
        let a = iface.expr().member("a").unwrap();
        let b = iface.expr().member("b").unwrap();
        assert_eq!(render(&lower(&a, None).unwrap()), "(x >> 4) & 0x7");
        assert_eq!(render(&lower(&b, None).unwrap()), "x & 0xf");
    }

    #[test]
    fn test_product_expression() {
        let iface = seven();
        let ab = iface.expr().member("a").unwrap() * iface.expr().member("b").unwrap();
        assert_eq!(
            render(&lower(&ab, None).unwrap()),
            "((x >> 4) & 0x7) * (x & 0xf)"
        );
    }

    #[test]
    fn test_signed_adjustment() {
        let iface = instantiate(&structure([("v", sint(4).unwrap())]).unwrap());
        let e = iface.expr().member("v").unwrap();
        assert_eq!(
            render(&lower(&e, None).unwrap()),
            "((x & 0xf) ^ 0x8) - 0x8"
        );
    }

    #[test]
    fn test_word_indexed_form() {
        let iface = instantiate(
            &structure([("skip", uint(40).unwrap()), ("f", uint(6).unwrap())]).unwrap(),
        );
        let e = iface.expr().member("f").unwrap();
        assert_eq!(
            render(&lower(&e, Some(32)).unwrap()),
            "(x[1] >> 8) & 0x3f"
        );
    }

    #[test]
    fn test_word_straddle() {
        // Field at offset 28, width 8, over 32-bit words: 4 low bits in
        // word 0, 4 high bits in word 1.
        let iface = instantiate(
            &structure([("skip", uint(28).unwrap()), ("f", uint(8).unwrap())]).unwrap(),
        );
        let e = iface.expr().member("f").unwrap();
        let ir = lower(&e, Some(32)).unwrap();
        assert_eq!(
            render(&ir),
            "((x[0] >> 28) & 0xf) | ((x[1] & 0xf) << 4)"
        );

        // Cross-check against the unbounded form over a sample raw.
        let raw = BigUint::from(0xa5u64 << 28);
        let whole = lower(&e, None).unwrap();
        assert_eq!(
            eval(&ir, &raw, Some(32)),
            eval(&whole, &raw, None)
        );
        assert_eq!(eval(&whole, &raw, None), Some(BigInt::from(0xa5)));
    }

    #[test]
    fn test_field_wider_than_word() {
        let iface = instantiate(&structure([("f", uint(48).unwrap())]).unwrap());
        let e = iface.expr().member("f").unwrap();
        assert_eq!(
            lower(&e, Some(32)).unwrap_err(),
            ExprError::FieldExceedsWord {
                width: 48,
                word: 32
            }
        );
    }

    #[test]
    fn test_enum_comparison_lowers_to_integers() {
        let status = uint_enum(
            2,
            EnumTable::from_labels(["dead", "pining", "resting"]).unwrap(),
        )
        .unwrap();
        let iface = instantiate(&structure([("status", status)]).unwrap());
        let e = iface
            .expr()
            .member("status")
            .unwrap()
            .eq("resting")
            .unwrap();
        assert_eq!(render(&lower(&e, None).unwrap()), "(x & 0x3) == 2");
    }

    #[test]
    fn test_utf8_not_lowerable() {
        let iface = instantiate(&structure([("name", utf8(4).unwrap())]).unwrap());
        let e = iface.expr().member("name").unwrap();
        assert_eq!(lower(&e, None).unwrap_err(), ExprError::NotLowerable);
    }

    #[test]
    fn test_unary_render() {
        let iface = seven();
        let e = !(iface.expr().member("b").unwrap());
        assert_eq!(render(&lower(&e, None).unwrap()), "~(x & 0xf)");
    }
}
