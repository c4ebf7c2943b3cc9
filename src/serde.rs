//! JSON-deserializable layout descriptions.
//!
//! These types describe the *shape* of a packed interface. They are
//! intended to be loaded from JSON (for example a layout file shipped
//! with your application) and then converted into core [BType]s.
//!
//! Custom leaf types carry codec functions and therefore have no textual
//! form; register them programmatically instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::BuildError;
use crate::types::{self, BType, EnumTable};

/// Description of a single layout type.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum TypeDef {
    /// Unsigned integer, optionally with a label table.
    UInt {
        /// Width in bits.
        width: usize,
        /// Optional mapping from labels to codes.
        #[serde(default)]
        labels: Option<BTreeMap<String, u64>>,
    },
    /// Two's-complement signed integer.
    SInt { width: usize },
    /// Fixed point stored as `value * base^precision`.
    Fixed {
        width: usize,
        precision: u32,
        base: u32,
    },
    /// UTF-8 text window.
    Utf8 {
        /// Capacity in bytes.
        bytes: usize,
    },
    /// Ordered struct; the first field occupies the low-order bits.
    Struct { fields: Vec<FieldDef> },
    /// Fixed-length array with a constant element stride.
    Array { elem: Box<TypeDef>, dim: usize },
}

/// A named struct member.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    /// Field name; becomes the key in decoded maps.
    pub name: String,
    /// The member's own layout type.
    pub ty: TypeDef,
}

impl TryFrom<&TypeDef> for BType {
    type Error = BuildError;

    fn try_from(def: &TypeDef) -> Result<Self, Self::Error> {
        match def {
            TypeDef::UInt {
                width,
                labels: None,
            } => types::uint(*width),
            TypeDef::UInt {
                width,
                labels: Some(labels),
            } => {
                let table = EnumTable::new(labels.iter().map(|(l, &c)| (l.clone(), c)))?;
                types::uint_enum(*width, table)
            }
            TypeDef::SInt { width } => types::sint(*width),
            TypeDef::Fixed {
                width,
                precision,
                base,
            } => types::fixed(*width, *precision, *base),
            TypeDef::Utf8 { bytes } => types::utf8(*bytes),
            TypeDef::Struct { fields } => {
                let fields: Vec<(String, BType)> = fields
                    .iter()
                    .map(|f| Ok((f.name.clone(), BType::try_from(&f.ty)?)))
                    .collect::<Result<_, BuildError>>()?;
                types::structure(fields)
            }
            TypeDef::Array { elem, dim } => {
                Ok(types::array(BType::try_from(elem.as_ref())?, *dim))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::instantiate;

    #[test]
    fn test_struct_def_from_json() {
        let doc = r#"{
            "type": "Struct",
            "fields": [
                {"name": "hdr", "ty": {"type": "UInt", "width": 5}},
                {"name": "page", "ty": {"type": "Array",
                    "elem": {"type": "UInt", "width": 6}, "dim": 4}}
            ]
        }"#;

        let def: TypeDef = serde_json::from_str(doc).unwrap();
        let ty = BType::try_from(&def).unwrap();
        assert_eq!(ty.width(), 29);

        let iface = instantiate(&ty);
        assert_eq!(iface.root().get("page[2]").unwrap().offset(), 17);
    }

    #[test]
    fn test_enum_def() {
        let doc = r#"{
            "type": "UInt", "width": 2,
            "labels": {"dead": 0, "pining": 1, "resting": 2}
        }"#;

        let def: TypeDef = serde_json::from_str(doc).unwrap();
        let ty = BType::try_from(&def).unwrap();

        let view = instantiate(&ty).bind(1u64);
        assert_eq!(view, "pining");
    }

    #[test]
    fn test_bad_def_fails_like_the_constructor() {
        let def: TypeDef = serde_json::from_str(r#"{"type": "UInt", "width": 0}"#).unwrap();
        assert_eq!(BType::try_from(&def).unwrap_err(), BuildError::InvalidWidth);
    }

    #[test]
    fn test_round_trips_through_serde() {
        let def = TypeDef::Struct {
            fields: vec![FieldDef {
                name: "x".to_string(),
                ty: TypeDef::SInt { width: 4 },
            }],
        };
        let text = serde_json::to_string(&def).unwrap();
        let back: TypeDef = serde_json::from_str(&text).unwrap();
        assert_eq!(
            BType::try_from(&back).unwrap(),
            BType::try_from(&def).unwrap()
        );
    }
}
