mod heap_page;

pub use heap_page::{empty_page_bytes, HeapPage, PageLayout};
