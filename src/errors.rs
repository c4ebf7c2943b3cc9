use thiserror::Error;

/// Errors raised while constructing types or building a field tree.
/// These are fatal at the construction call site.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("field width must be positive")]
    InvalidWidth,
    #[error("inconsistent type payload: {0}")]
    InvalidType(String),
    #[error("duplicate field name '{0}'")]
    DuplicateName(String),
    #[error("field name '{0}' ends with the reserved trailing marker")]
    ReservedName(String),
}

/// Errors raised by value reads and writes through a bound view.
/// A failed write leaves the bound cell unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("value does not fit in a {width}-bit field")]
    Overflow { width: usize },
    #[error("undefined enum label '{0}'")]
    UnknownLabel(String),
    #[error("value does not match the target type: {0}")]
    SchemaMismatch(String),
    #[error("malformed UTF-8 in field window")]
    InvalidEncoding,
    #[error("custom type '{0}' produced a value wider than its declared width")]
    InvalidType(String),
}

/// Errors raised while navigating a field tree by name, index, or path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("no field named '{0}'")]
    NoSuchField(String),
    #[error("index {index} out of range for dimension {dim}")]
    IndexOutOfRange { index: usize, dim: usize },
    #[error("field is not a struct or array")]
    NotComposite,
    #[error("malformed field path '{0}'")]
    BadPath(String),
}

/// Errors raised while building or lowering symbolic expressions.
/// Lowered expressions are always renderable; everything fails early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("undefined enum label '{0}'")]
    UnknownLabel(String),
    #[error("expression references a field with no integer form")]
    NotLowerable,
    #[error("field of width {width} exceeds word width {word}")]
    FieldExceedsWord { width: usize, word: usize },
}
