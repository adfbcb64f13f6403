use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::LruCache;
use crate::catalog::Catalog;
use crate::common::{KilnError, PageId, Result, TableId};
use crate::storage::page::HeapPage;
use crate::tuple::Tuple;

/// Shared handle to a cached page.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// BufferPool caches decoded heap pages of every table in the catalog.
///
/// Pages are kept in an LRU cache of fixed capacity. A miss reads the page
/// through the table file that owns it; when the cache is full, the least
/// recently used page nobody holds is evicted, written back first if it is
/// dirty, so no change is lost on eviction.
///
/// The pool is shared between threads. A page handle returned by `get_page`
/// pins the page until it is dropped. Locks are always taken in the order
/// cache mutex, page lock, file mutex, so callers must drop any page guard
/// before calling back into the pool.
pub struct BufferPool {
    cache: Mutex<LruCache<PageId, PageRef>>,
    catalog: Arc<Catalog>,
}

impl BufferPool {
    /// Creates a pool holding at most `capacity` pages.
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> Result<Self> {
        Ok(Self {
            cache: Mutex::new(LruCache::new(capacity)?),
            catalog,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().capacity()
    }

    /// Number of pages currently cached.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Returns true if the page is cached, without touching recency.
    pub fn holds_page(&self, page_id: PageId) -> bool {
        self.cache.lock().contains_key(&page_id)
    }

    /// Returns the page, reading it from its table file on a miss.
    ///
    /// A returned handle pins the page: while any caller still holds it, the
    /// page is never chosen as an eviction victim, so changes made through it
    /// stay in the cache until they are written back. The lookup, the read
    /// and the insertion happen under one lock. If every cached page is
    /// pinned the call fails with `BufferPoolFull`. If the dirty victim
    /// cannot be written back, the cache is left as it was and the error is
    /// returned.
    pub fn get_page(&self, page_id: PageId) -> Result<PageRef> {
        let mut cache = self.cache.lock();
        if let Some(page) = cache.get(&page_id) {
            return Ok(Arc::clone(page));
        }

        let victim_id = if cache.len() >= cache.capacity() {
            let victim = cache
                .peek_lru_where(|_, page| Arc::strong_count(page) == 1)
                .map(|(&victim_id, _)| victim_id);
            Some(victim.ok_or(KilnError::BufferPoolFull)?)
        } else {
            None
        };

        let file = self.catalog.table_file(page_id.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(page_id.page_no)?));

        if let Some(victim_id) = victim_id {
            if let Some(victim) = cache.peek(&victim_id) {
                if let Err(e) = self.write_back(victim_id, victim) {
                    warn!(%victim_id, error = %e, "failed to write back eviction victim");
                    return Err(e);
                }
            }
            cache.remove(&victim_id);
            debug!(evicted = %victim_id, loaded = %page_id, "evicted page");
        }
        cache.put(page_id, Arc::clone(&page));

        Ok(page)
    }

    /// Number of handles to the page held outside the pool, or `None` if the
    /// page is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<usize> {
        self.cache
            .lock()
            .peek(&page_id)
            .map(|page| Arc::strong_count(page) - 1)
    }

    /// Writes the page to disk if it is cached. Returns false if it is not.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let cache = self.cache.lock();
        match cache.peek(&page_id) {
            Some(page) => {
                self.write_back(page_id, page)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Writes every dirty cached page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let cache = self.cache.lock();
        for (&page_id, page) in cache.iter() {
            self.write_back(page_id, page)?;
        }
        Ok(())
    }

    /// Drops the page from the cache without writing it back.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        self.cache.lock().remove(&page_id).is_some()
    }

    /// Inserts the tuple into the given table. Returns the pages modified.
    pub fn insert_tuple(&self, table_id: TableId, tuple: &mut Tuple) -> Result<Vec<PageId>> {
        let file = self.catalog.table_file(table_id)?;
        file.insert_tuple(self, tuple)
    }

    /// Deletes the tuple from the table its record id names.
    pub fn delete_tuple(&self, tuple: &mut Tuple) -> Result<PageId> {
        let record_id = tuple.record_id().ok_or(KilnError::UnplacedTuple)?;
        let file = self.catalog.table_file(record_id.page_id.table_id)?;
        file.delete_tuple(self, tuple)
    }

    /// Writes a dirty page through its table file, then clears the dirty
    /// flag and re-captures the before-image.
    fn write_back(&self, page_id: PageId, page: &PageRef) -> Result<()> {
        let mut page = page.write();
        if !page.is_dirty() {
            return Ok(());
        }

        let file = self.catalog.table_file(page_id.table_id)?;
        file.write_page(&page)?;
        page.mark_dirty(false);
        page.set_before_image();

        Ok(())
    }
}
