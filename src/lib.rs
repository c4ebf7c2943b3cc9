//! # bitlens
//!
//! A library for modeling arbitrary, bit-aligned binary interfaces:
//! packed register layouts, HDL interface records, and wire formats with
//! non-byte-aligned fields.
//!
//! Describe a layout by composing types, instantiate it into a field tree
//! with fixed bit offsets, bind the tree to an unbounded raw integer, and
//! read or write any field through a view. A leaf access reduces to a
//! single shift-and over the raw value. Symbolic expressions over the same
//! fields lower to a bitwise IR and render as portable C-family source.
//!
//! ## Example
//!
//! ```
//! use bitlens::layout::instantiate;
//! use bitlens::types::{structure, uint, uint_enum, EnumTable};
//!
//! let status = uint_enum(
//!     2,
//!     EnumTable::from_labels(["dead", "pining", "resting"]).unwrap(),
//! )
//! .unwrap();
//! let parrot = structure([
//!     ("status", status),
//!     ("rgb", uint(5).unwrap().repeat(3)),
//! ])
//! .unwrap();
//!
//! let view = instantiate(&parrot).bind(0u64);
//! view.set_json(r#"{"status": "resting", "rgb": [1, 2, 3]}"#).unwrap();
//!
//! assert_eq!(view.get("status").unwrap(), "resting");
//! assert_eq!(view.get("rgb[1]").unwrap(), 2u64);
//!
//! // The same navigation, compiled to a closed-form expression:
//! use bitlens::ir::{lower, render};
//! let e = view.expr().get("rgb[1]").unwrap();
//! assert_eq!(render(&lower(&e, None).unwrap()), "(x >> 7) & 0x1f");
//! ```

pub mod codec;
pub mod errors;
pub mod expr;
pub mod extension;
pub mod ir;
pub mod layout;
pub mod path;
pub mod raw;
pub mod serde;
pub mod types;
pub mod value;
pub mod view;
