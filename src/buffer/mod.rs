mod buffer_pool;
mod lru_cache;

pub use buffer_pool::{BufferPool, PageRef};
pub use lru_cache::{Iter, LruCache};
