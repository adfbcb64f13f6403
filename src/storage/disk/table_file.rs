use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::TableIterator;
use crate::buffer::BufferPool;
use crate::common::{KilnError, PageId, Result, TableId};
use crate::storage::page::{empty_page_bytes, HeapPage, PageLayout};
use crate::tuple::{Schema, Tuple};

/// TableFile stores one table as a flat sequence of equal-size heap pages.
///
/// Page n occupies bytes [n * page_size, (n + 1) * page_size) of the file;
/// there is no header or footer. Raw page I/O goes straight to disk, while
/// tuple-level operations go through the buffer pool so every caller sees
/// the same cached pages.
pub struct TableFile {
    table_id: TableId,
    path: PathBuf,
    file: Mutex<File>,
    layout: Arc<PageLayout>,
    /// Number of pages currently in the file
    num_pages: AtomicU32,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl TableFile {
    /// Opens the table file at `path`, creating it if it doesn't exist.
    /// A trailing partial page, if any, is ignored.
    pub fn open<P: AsRef<Path>>(
        table_id: TableId,
        path: P,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> Result<Self> {
        let layout = Arc::new(PageLayout::new(schema, page_size)?);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / page_size as u64) as u32;

        Ok(Self {
            table_id,
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(file),
            layout,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.layout.schema()
    }

    pub fn layout(&self) -> &Arc<PageLayout> {
        &self.layout
    }

    pub fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Acquire)
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Reads and decodes page `page_no` directly from disk.
    /// A short read surfaces as an I/O error; nothing is retried.
    pub fn read_page(&self, page_no: u32) -> Result<HeapPage> {
        let page_id = PageId::new(self.table_id, page_no);
        let mut data = vec![0u8; self.page_size()];

        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(page_id.file_offset(self.page_size())))?;
            file.read_exact(&mut data)?;
        }
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        debug!(%page_id, "read page");

        HeapPage::decode(page_id, Arc::clone(&self.layout), &data)
    }

    /// Encodes the page and writes it at its offset in the file.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.page_id();
        debug_assert_eq!(page_id.table_id, self.table_id);
        let data = page.encode();

        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(page_id.file_offset(self.page_size())))?;
            file.write_all(&data)?;
            file.flush()?;
            self.num_pages.fetch_max(page_id.page_no + 1, Ordering::AcqRel);
        }
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        debug!(%page_id, "wrote page");

        Ok(())
    }

    /// Grows the file by one all-zero page and returns its id.
    pub fn append_empty_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let page_id = PageId::new(self.table_id, self.num_pages());

        file.seek(SeekFrom::Start(page_id.file_offset(self.page_size())))?;
        file.write_all(&empty_page_bytes(self.page_size()))?;
        file.flush()?;
        self.num_pages.store(page_id.page_no + 1, Ordering::Release);
        self.num_writes.fetch_add(1, Ordering::Relaxed);

        debug!(%page_id, "extended table file");
        Ok(page_id)
    }

    /// Inserts the tuple into the first page with a free slot, appending a
    /// new page when every existing page is full. Returns the pages modified.
    pub fn insert_tuple(&self, pool: &BufferPool, tuple: &mut Tuple) -> Result<Vec<PageId>> {
        if **tuple.schema() != **self.schema() {
            return Err(KilnError::SchemaMismatch(format!(
                "tuple {} does not match the schema of table {}",
                tuple, self.table_id
            )));
        }

        for page_no in 0..self.num_pages() {
            let page_id = PageId::new(self.table_id, page_no);
            let page = pool.get_page(page_id)?;
            let mut page = page.write();
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                page.mark_dirty(true);
                return Ok(vec![page_id]);
            }
        }

        // a failure after the append must not leave the file longer
        let page_id = self.append_empty_page()?;
        let placed = pool.get_page(page_id).and_then(|page| {
            let mut page = page.write();
            page.insert_tuple(tuple)?;
            page.mark_dirty(true);
            Ok(())
        });
        if let Err(e) = placed {
            pool.discard_page(page_id);
            if let Err(undo) = self.undo_append(page_id) {
                warn!(%page_id, error = %undo, "failed to shrink table file after insert error");
            }
            return Err(e);
        }

        Ok(vec![page_id])
    }

    /// Removes the page added by `append_empty_page`, provided it is still
    /// the last page of the file.
    fn undo_append(&self, page_id: PageId) -> Result<()> {
        let file = self.file.lock();
        if self.num_pages() != page_id.page_no + 1 {
            return Ok(());
        }

        file.set_len(page_id.file_offset(self.page_size()))?;
        self.num_pages.store(page_id.page_no, Ordering::Release);
        debug!(%page_id, "shrank table file");
        Ok(())
    }

    /// Deletes the tuple from the page its record id names.
    pub fn delete_tuple(&self, pool: &BufferPool, tuple: &mut Tuple) -> Result<PageId> {
        let record_id = tuple.record_id().ok_or(KilnError::UnplacedTuple)?;
        let page_id = record_id.page_id;

        if page_id.table_id != self.table_id {
            return Err(KilnError::TupleNotOnPage { page_id });
        }
        if page_id.page_no >= self.num_pages() {
            return Err(KilnError::TupleNotFound(page_id));
        }

        let page = pool.get_page(page_id)?;
        let mut page = page.write();
        page.delete_tuple(tuple)?;
        page.mark_dirty(true);

        Ok(page_id)
    }

    /// Returns a stream over every tuple in (page, slot) order, read through the pool.
    pub fn iter(self: &Arc<Self>, pool: &Arc<BufferPool>) -> TableIterator {
        TableIterator::new(Arc::clone(self), Arc::clone(pool))
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::HeapPage;
    use crate::tuple::{DataType, TupleBuilder};
    use tempfile::NamedTempFile;

    fn open_test_file(temp: &NamedTempFile) -> TableFile {
        let schema = Schema::builder().column("a", DataType::Int).build_arc();
        TableFile::open(TableId::new(0), temp.path(), schema, 64).unwrap()
    }

    #[test]
    fn test_table_file_new_is_empty() {
        let temp = NamedTempFile::new().unwrap();
        let file = open_test_file(&temp);
        assert_eq!(file.num_pages(), 0);
        assert!(file.read_page(0).is_err());
    }

    #[test]
    fn test_table_file_write_then_read() {
        let temp = NamedTempFile::new().unwrap();
        let file = open_test_file(&temp);

        let mut page = HeapPage::new_empty(PageId::new(TableId::new(0), 2), file.layout().clone());
        let mut t = TupleBuilder::new(file.schema().clone())
            .value(99)
            .build()
            .unwrap();
        page.insert_tuple(&mut t).unwrap();
        file.write_page(&page).unwrap();

        // writing page 2 extends the file over pages 0 and 1 as well
        assert_eq!(file.num_pages(), 3);
        assert_eq!(file.read_page(2).unwrap(), page);
        assert_eq!(file.read_page(0).unwrap().tuple_count(), 0);
        assert_eq!(temp.as_file().metadata().unwrap().len(), 3 * 64);
    }

    #[test]
    fn test_table_file_ignores_partial_trailing_page() {
        let temp = NamedTempFile::new().unwrap();
        temp.as_file().set_len(64 + 10).unwrap();
        let file = open_test_file(&temp);
        assert_eq!(file.num_pages(), 1);
    }

    #[test]
    fn test_table_file_append_empty_page() {
        let temp = NamedTempFile::new().unwrap();
        let file = open_test_file(&temp);
        let pid = file.append_empty_page().unwrap();
        assert_eq!(pid.page_no, 0);
        assert_eq!(file.num_pages(), 1);
        assert_eq!(file.read_page(0).unwrap().encode(), empty_page_bytes(64));
    }
}
