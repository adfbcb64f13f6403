use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use super::{Schema, Value};
use crate::common::{KilnError, RecordId, Result};

/// Represents a single row in a table.
///
/// A tuple holds one value per schema column and, once it has been placed on
/// a page, the record locator of the slot that stores it.
///
/// ## Tuple Binary Format
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | field 0   | field 1   | ... | field n-1 |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// Every field occupies exactly `DataType::byte_len()` bytes, so the whole
/// tuple is always `Schema::tuple_size()` bytes and fits a fixed page slot.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple, checking every value against its column.
    /// Every tuple conforms to its schema, so serialization cannot fail.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(KilnError::SchemaMismatch(format!(
                "expected {} values, got {}",
                schema.column_count(),
                values.len()
            )));
        }
        for (value, column) in values.iter().zip(schema.columns()) {
            if !value.conforms_to(column.data_type()) {
                return Err(KilnError::SchemaMismatch(format!(
                    "value {} does not fit column {} of type {}",
                    value,
                    column.name(),
                    column.data_type()
                )));
            }
        }
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the locator of the slot holding this tuple, if it is stored on a page.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Serializes the tuple into exactly `schema.tuple_size()` bytes.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        for (value, column) in self.values.iter().zip(self.schema.columns()) {
            let written = value.write_to(column.data_type(), buf);
            debug_assert!(written, "tuples conform to their schema by construction");
        }
    }

    /// Deserializes one tuple, consuming exactly `schema.tuple_size()` bytes.
    /// Returns None if the bytes do not hold a valid tuple.
    pub fn read_from<B: Buf>(schema: Arc<Schema>, buf: &mut B) -> Option<Self> {
        if buf.remaining() < schema.tuple_size() {
            return None;
        }
        let values = schema
            .columns()
            .map(|c| Value::read_from(c.data_type(), buf))
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Concatenates two tuples under a pre-merged schema, left values first.
    /// The result is not stored anywhere, so it carries no record locator.
    pub fn merge(schema: Arc<Schema>, left: &Tuple, right: &Tuple) -> Tuple {
        debug_assert_eq!(schema.column_count(), left.len() + right.len());
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend_from_slice(&left.values);
        values.extend_from_slice(&right.values);
        Tuple {
            schema,
            values,
            record_id: None,
        }
    }
}

/// Equality compares contents only; where a tuple is stored does not matter.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl TupleBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: Vec::with_capacity(count),
        }
    }

    /// Appends the value for the next column.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn build(self) -> Result<Tuple> {
        Tuple::new(self.schema, self.values)
    }
}
