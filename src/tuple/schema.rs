use std::collections::HashMap;
use std::sync::Arc;

use super::DataType;

/// Represents a single column in a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the serialized width of this column in bytes.
    pub fn byte_len(&self) -> usize {
        self.data_type.byte_len()
    }
}

/// The ordered column list of a table or of an operator's output.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,

    /// Map from column name to the first column carrying it
    name_to_index: HashMap<String, usize>,

    /// Serialized width of one tuple
    tuple_size: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::new();
        for (i, col) in columns.iter().enumerate() {
            // Join output keeps duplicate names; lookups resolve to the leftmost one.
            name_to_index.entry(col.name.clone()).or_insert(i);
        }
        let tuple_size = columns.iter().map(Column::byte_len).sum();

        Self {
            columns,
            name_to_index,
            tuple_size,
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the serialized size of one tuple in bytes.
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Concatenates two schemas, left columns first.
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let columns = left
            .columns
            .iter()
            .chain(right.columns.iter())
            .cloned()
            .collect();
        Schema::new(columns)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Builder for constructing schemas fluently.
#[derive(Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}
