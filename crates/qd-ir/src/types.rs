//! Scalar and pointer types that appear as a statement's result type.

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The data type carried by a `place` SNode leaf, or produced by a
/// statement's evaluation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum DataType {
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    /// A pointer into a device buffer, tagged with the pointee's type.
    Ptr(Box<DataType>),
}

impl DataType {
    pub fn ptr_to(inner: DataType) -> Self {
        DataType::Ptr(Box::new(inner))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
            DataType::Ptr(_) => 8,
        }
    }
}

/// A statement's result type, or the absence of one (statements executed
/// purely for side effect, such as stores or branches).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ResultType {
    None,
    Value(DataType),
}

impl ResultType {
    pub fn is_none(&self) -> bool {
        matches!(self, ResultType::None)
    }
}
