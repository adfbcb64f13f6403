use std::sync::Arc;
use std::vec;

use super::TableFile;
use crate::buffer::BufferPool;
use crate::common::{KilnError, PageId, Result};
use crate::execution::TupleStream;
use crate::tuple::{Schema, Tuple};

struct Cursor {
    next_page: u32,
    tuples: vec::IntoIter<Tuple>,
}

/// Streams the tuples of a table in ascending (page, slot) order.
///
/// Pages are fetched through the buffer pool one at a time; the tuples of
/// the current page are copied out so no page lock is held between calls.
/// The page count is re-read at every page boundary, so pages appended
/// while iterating are visited.
pub struct TableIterator {
    file: Arc<TableFile>,
    pool: Arc<BufferPool>,
    cursor: Option<Cursor>,
}

impl TableIterator {
    pub fn new(file: Arc<TableFile>, pool: Arc<BufferPool>) -> Self {
        Self {
            file,
            pool,
            cursor: None,
        }
    }

    pub fn table_file(&self) -> &Arc<TableFile> {
        &self.file
    }

    fn fresh_cursor() -> Cursor {
        Cursor {
            next_page: 0,
            tuples: Vec::new().into_iter(),
        }
    }
}

impl TupleStream for TableIterator {
    fn schema(&self) -> &Arc<Schema> {
        self.file.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.cursor = Some(Self::fresh_cursor());
        Ok(())
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        let cursor = self.cursor.as_mut().ok_or(KilnError::NoSuchElement)?;

        loop {
            if let Some(tuple) = cursor.tuples.next() {
                return Ok(Some(tuple));
            }
            if cursor.next_page >= self.file.num_pages() {
                return Ok(None);
            }

            let page_id = PageId::new(self.file.table_id(), cursor.next_page);
            let page = self.pool.get_page(page_id)?;
            let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
            cursor.tuples = tuples.into_iter();
            cursor.next_page += 1;
        }
    }

    fn rewind(&mut self) -> Result<()> {
        if self.cursor.is_none() {
            return Err(KilnError::NoSuchElement);
        }
        self.cursor = Some(Self::fresh_cursor());
        Ok(())
    }

    fn close(&mut self) {
        self.cursor = None;
    }
}
