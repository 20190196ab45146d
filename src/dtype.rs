use itertools::Itertools;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Scalar element types understood by the compiler.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DtypeTag {
    // Floats
    Float16,
    Float32,
    Float64,

    // Integers
    Int8,
    Int16,
    Int32,
    Int64,

    // Unsigned integers
    Uint8,
    Uint16,
    Uint32,
    Uint64,

    Bool,
}

pub const FLOAT_TYPES: &[DtypeTag] = &[DtypeTag::Float16, DtypeTag::Float32, DtypeTag::Float64];

pub const INT_TYPES: &[DtypeTag] = &[
    DtypeTag::Int8,
    DtypeTag::Int16,
    DtypeTag::Int32,
    DtypeTag::Int64,
];

pub const UINT_TYPES: &[DtypeTag] = &[
    DtypeTag::Uint8,
    DtypeTag::Uint16,
    DtypeTag::Uint32,
    DtypeTag::Uint64,
];

/// Every tag except Bool.
pub const NUMBER_TYPES: &[DtypeTag] = &[
    DtypeTag::Float16,
    DtypeTag::Float32,
    DtypeTag::Float64,
    DtypeTag::Int8,
    DtypeTag::Int16,
    DtypeTag::Int32,
    DtypeTag::Int64,
    DtypeTag::Uint8,
    DtypeTag::Uint16,
    DtypeTag::Uint32,
    DtypeTag::Uint64,
];

/// Tags accepted for gather/scatter index tensors.
pub const INDEX_TYPES: &[DtypeTag] = &[
    DtypeTag::Int16,
    DtypeTag::Int32,
    DtypeTag::Int64,
    DtypeTag::Uint16,
    DtypeTag::Uint32,
    DtypeTag::Uint64,
];

impl DtypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            DtypeTag::Float16 => "float16",
            DtypeTag::Float32 => "float32",
            DtypeTag::Float64 => "float64",
            DtypeTag::Int8 => "int8",
            DtypeTag::Int16 => "int16",
            DtypeTag::Int32 => "int32",
            DtypeTag::Int64 => "int64",
            DtypeTag::Uint8 => "uint8",
            DtypeTag::Uint16 => "uint16",
            DtypeTag::Uint32 => "uint32",
            DtypeTag::Uint64 => "uint64",
            DtypeTag::Bool => "bool",
        }
    }
}

impl Display for DtypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub fn display_set(set: &[DtypeTag]) -> String {
    set.iter().map(|d| d.name()).join(", ")
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DtypeError {
    #[error("{op}: dtype of {param} should be one of [{allowed}], but got {actual}")]
    NotAllowed {
        op: String,
        param: String,
        allowed: String,
        actual: DtypeTag,
    },

    #[error("{op}: dtype of {param} is {actual}, but {reference} has dtype {expected}; they should be the same")]
    Mismatch {
        op: String,
        param: String,
        actual: DtypeTag,
        reference: String,
        expected: DtypeTag,
    },
}
