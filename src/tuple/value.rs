use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut};

use super::DataType;

/// A typed field value. Each variant corresponds to a DataType.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Str(String),
}

impl Value {
    /// Returns true if this value can be stored in a column of the given type.
    pub fn conforms_to(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Int(_), DataType::Int) => true,
            (Value::Str(s), DataType::Str(n)) => s.len() <= *n as usize,
            _ => false,
        }
    }

    /// Writes the value using exactly `data_type.byte_len()` bytes.
    /// Returns false (writing nothing) if the value does not conform.
    pub fn write_to<B: BufMut>(&self, data_type: &DataType, buf: &mut B) -> bool {
        if !self.conforms_to(data_type) {
            return false;
        }
        match (self, data_type) {
            (Value::Int(v), DataType::Int) => buf.put_i32_le(*v),
            (Value::Str(s), DataType::Str(n)) => {
                let bytes = s.as_bytes();
                buf.put_u32_le(bytes.len() as u32);
                buf.put_slice(bytes);
                buf.put_bytes(0, *n as usize - bytes.len());
            }
            _ => unreachable!("conformance checked above"),
        }
        true
    }

    /// Reads a value of the given type, consuming exactly `data_type.byte_len()` bytes.
    /// Returns None if the buffer is too short or the bytes are not a valid value.
    pub fn read_from<B: Buf>(data_type: &DataType, buf: &mut B) -> Option<Self> {
        if buf.remaining() < data_type.byte_len() {
            return None;
        }
        match data_type {
            DataType::Int => Some(Value::Int(buf.get_i32_le())),
            DataType::Str(n) => {
                let n = *n as usize;
                let len = buf.get_u32_le() as usize;
                if len > n {
                    return None;
                }
                let mut data = vec![0u8; n];
                buf.copy_to_slice(&mut data);
                data.truncate(len);
                String::from_utf8(data).ok().map(Value::Str)
            }
        }
    }

    /// Compares two values for ordering.
    /// Returns None if the values are of different kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
