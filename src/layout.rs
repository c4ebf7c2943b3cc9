//! Field-tree construction: a type instantiated into named nodes with
//! absolute bit offsets.
//!
//! The tree is built once per interface by a pre-order walk and is
//! immutable afterwards. Struct children are laid out in declaration
//! order starting at the parent's offset, first field in the low-order
//! bits; array element `k` sits at `parent.offset + k * elem.width`.

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigUint;

use crate::errors::PathError;
use crate::path::{self, Seg};
use crate::raw::RawCell;
use crate::types::{BType, Kind};
use crate::view::Bound;

/// One named, offset-annotated node of an interface.
#[derive(Debug)]
pub struct FieldNode {
    name: String,
    path: String,
    ty: BType,
    offset: usize,
    children: Vec<Arc<FieldNode>>,
    /// Struct-only name lookup; empty for arrays and leaves.
    index: HashMap<String, usize>,
}

impl FieldNode {
    fn build(name: String, path: String, ty: BType, offset: usize) -> Arc<FieldNode> {
        let mut children = Vec::new();
        let mut index = HashMap::new();

        match ty.kind() {
            Kind::Struct { fields } => {
                let mut z = offset;
                for (i, (fname, ftype)) in fields.iter().enumerate() {
                    let cpath = if path.is_empty() {
                        fname.clone()
                    } else {
                        format!("{}.{}", path, fname)
                    };
                    children.push(FieldNode::build(fname.clone(), cpath, ftype.clone(), z));
                    index.insert(fname.clone(), i);
                    z += ftype.width();
                }
            }
            Kind::Array { elem, dim } => {
                for k in 0..*dim {
                    let cname = format!("[{}]", k);
                    let cpath = format!("{}{}", path, cname);
                    children.push(FieldNode::build(
                        cname,
                        cpath,
                        elem.clone(),
                        offset + k * elem.width(),
                    ));
                }
            }
            _ => {}
        }

        Arc::new(FieldNode {
            name,
            path,
            ty,
            offset,
            children,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted/bracketed path from the interface root, empty at the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn btype(&self) -> &BType {
        &self.ty
    }

    /// Absolute bit offset from interface bit 0.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn width(&self) -> usize {
        self.ty.width()
    }

    pub fn children(&self) -> &[Arc<FieldNode>] {
        &self.children
    }

    /// Array dimension, if this node is an array.
    pub fn dim(&self) -> Option<usize> {
        match self.ty.kind() {
            Kind::Array { dim, .. } => Some(*dim),
            _ => None,
        }
    }

    /// Struct child lookup by name.
    pub fn child(&self, name: &str) -> Result<&Arc<FieldNode>, PathError> {
        match self.ty.kind() {
            Kind::Struct { .. } => self
                .index
                .get(name)
                .map(|&i| &self.children[i])
                .ok_or_else(|| PathError::NoSuchField(name.to_string())),
            Kind::Array { .. } => Err(PathError::NoSuchField(name.to_string())),
            _ => Err(PathError::NotComposite),
        }
    }

    /// Array element lookup by index.
    pub fn at(&self, k: usize) -> Result<&Arc<FieldNode>, PathError> {
        match self.ty.kind() {
            Kind::Array { dim, .. } => self.children.get(k).ok_or(PathError::IndexOutOfRange {
                index: k,
                dim: *dim,
            }),
            Kind::Struct { .. } => Err(PathError::IndexOutOfRange {
                index: k,
                dim: self.children.len(),
            }),
            _ => Err(PathError::NotComposite),
        }
    }

    /// Walks a parsed path from this node.
    pub fn resolve(self: &Arc<Self>, segs: &[Seg]) -> Result<Arc<FieldNode>, PathError> {
        let mut node = self.clone();
        for seg in segs {
            node = match seg {
                Seg::Name(n) => node.child(n)?.clone(),
                Seg::Index(k) => node.at(*k)?.clone(),
            };
        }
        Ok(node)
    }

    /// Walks a textual path like `"a.b[3].c"` from this node.
    pub fn get(self: &Arc<Self>, path_str: &str) -> Result<Arc<FieldNode>, PathError> {
        self.resolve(&path::parse(path_str)?)
    }
}

/// A top-level field tree: the root node at offset 0.
#[derive(Debug, Clone)]
pub struct Interface {
    root: Arc<FieldNode>,
}

impl Interface {
    pub fn root(&self) -> &Arc<FieldNode> {
        &self.root
    }

    pub fn width(&self) -> usize {
        self.root.width()
    }

    /// Binds this interface to a fresh raw cell holding `n`.
    pub fn bind(&self, n: impl Into<BigUint>) -> Bound {
        Bound::new(self.root.clone(), RawCell::new(n.into()))
    }

    /// Binds this interface to an existing shared cell.
    pub fn bind_cell(&self, cell: RawCell) -> Bound {
        Bound::new(self.root.clone(), cell)
    }

    /// The symbolic root reference, for expression building.
    pub fn expr(&self) -> crate::expr::Expr {
        crate::expr::Expr::reference(self.root.clone())
    }
}

/// Allocates the field tree for a type. Offsets are fixed here and never
/// change afterwards.
pub fn instantiate(ty: &BType) -> Interface {
    Interface {
        root: FieldNode::build(String::new(), String::new(), ty.clone(), 0),
    }
}
