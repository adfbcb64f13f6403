//! Table registry: maps table names and ids to open table files.
//!
//! The catalog is an ordinary object owned by whoever sets up the database
//! and passed to the components that need it; there is no global instance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::common::{KilnError, Result, TableId};
use crate::storage::disk::TableFile;
use crate::tuple::Schema;

struct TableEntry {
    name: String,
    file: Arc<TableFile>,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<TableId, TableEntry>,
    name_to_id: HashMap<String, TableId>,
    next_table_id: u32,
}

/// Registry of the tables of one database. Every table shares the catalog's page size.
pub struct Catalog {
    page_size: usize,
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            inner: RwLock::new(CatalogInner::default()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Opens (creating if needed) the table file at `path` and registers it under `name`.
    pub fn open_table<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        schema: Arc<Schema>,
    ) -> Result<Arc<TableFile>> {
        let mut inner = self.inner.write();
        if inner.name_to_id.contains_key(name) {
            return Err(KilnError::TableAlreadyExists(name.to_string()));
        }

        let table_id = TableId::new(inner.next_table_id);
        let file = Arc::new(TableFile::open(table_id, path, schema, self.page_size)?);
        inner.next_table_id += 1;

        info!(
            table = name,
            table_id = table_id.as_u32(),
            pages = file.num_pages(),
            "opened table"
        );

        inner.name_to_id.insert(name.to_string(), table_id);
        inner.tables.insert(
            table_id,
            TableEntry {
                name: name.to_string(),
                file: Arc::clone(&file),
            },
        );

        Ok(file)
    }

    pub fn table_file(&self, table_id: TableId) -> Result<Arc<TableFile>> {
        self.inner
            .read()
            .tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(KilnError::TableNotFound(table_id))
    }

    pub fn schema(&self, table_id: TableId) -> Result<Arc<Schema>> {
        self.table_file(table_id).map(|file| file.schema().clone())
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.inner.read().name_to_id.get(name).copied()
    }

    pub fn table_name(&self, table_id: TableId) -> Option<String> {
        self.inner
            .read()
            .tables
            .get(&table_id)
            .map(|entry| entry.name.clone())
    }

    /// Returns the ids of all registered tables in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.inner.read().tables.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::DataType;
    use tempfile::tempdir;

    #[test]
    fn test_catalog_assigns_sequential_ids() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new(256);
        let schema = Schema::builder().column("a", DataType::Int).build_arc();

        let t0 = catalog
            .open_table("t0", dir.path().join("t0.dat"), schema.clone())
            .unwrap();
        let t1 = catalog
            .open_table("t1", dir.path().join("t1.dat"), schema.clone())
            .unwrap();

        assert_eq!(t0.table_id(), TableId::new(0));
        assert_eq!(t1.table_id(), TableId::new(1));
        assert_eq!(catalog.table_id("t1"), Some(TableId::new(1)));
        assert_eq!(catalog.table_name(TableId::new(0)).as_deref(), Some("t0"));
        assert_eq!(catalog.table_ids(), vec![TableId::new(0), TableId::new(1)]);
        assert_eq!(*catalog.schema(TableId::new(1)).unwrap(), *schema);
    }

    #[test]
    fn test_catalog_rejects_duplicates_and_unknown_ids() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new(256);
        let schema = Schema::builder().column("a", DataType::Int).build_arc();

        catalog
            .open_table("t", dir.path().join("t.dat"), schema.clone())
            .unwrap();
        assert!(matches!(
            catalog.open_table("t", dir.path().join("other.dat"), schema),
            Err(KilnError::TableAlreadyExists(_))
        ));
        assert!(matches!(
            catalog.table_file(TableId::new(7)),
            Err(KilnError::TableNotFound(_))
        ));
    }
}
