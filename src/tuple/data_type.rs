use std::fmt;

use crate::common::{INT_SIZE, STRING_LENGTH_PREFIX};

/// Field kinds supported by the storage layer.
/// Every kind has a fixed serialized width so tuples fit fixed-size slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer: 4 bytes, little-endian
    Int,

    /// String of at most n bytes.
    /// Stored as: length (4 bytes, little-endian) + data, zero-padded to n bytes
    Str(u16),
}

impl DataType {
    /// Returns the serialized width of a field of this type in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            DataType::Int => INT_SIZE,
            DataType::Str(n) => STRING_LENGTH_PREFIX + *n as usize,
        }
    }

    /// Returns true if values of the two types can be ordered against each other.
    pub fn is_comparable_with(&self, other: &DataType) -> bool {
        matches!(
            (self, other),
            (DataType::Int, DataType::Int) | (DataType::Str(_), DataType::Str(_))
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Str(n) => write!(f, "STRING({})", n),
        }
    }
}
