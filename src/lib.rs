//! Kiln - a teaching relational storage engine in Rust
//!
//! Tables live in flat files of fixed-size heap pages. Pages are cached by an
//! LRU buffer pool, scanned as pull-based tuple streams, joined with a
//! memory-bounded sort-merge join, and summarised by equal-width histograms
//! for cost estimation.
//!
//! # Architecture
//!
//! - **Tuples** (`tuple`): field types, values, schemas and fixed-width tuples
//!
//! - **Storage Layer** (`storage`): On-disk layout
//!   - `HeapPage`: bitmap-addressed fixed-size slots within a page
//!   - `TableFile`: one table as a sequence of heap pages
//!   - `TableIterator`: ascending (page, slot) scan through the buffer pool
//!
//! - **Buffer Pool** (`buffer`): Page caching
//!   - `LruCache`: generic O(1) LRU map that hands back evicted entries
//!   - `BufferPool`: caches decoded pages and writes dirty victims back
//!
//! - **Catalog** (`catalog`): table name and id registry
//!
//! - **Execution** (`execution`): `TupleStream`, predicates, `Join` and
//!   `Aggregate`
//!
//! - **Statistics** (`stats`): `IntHistogram`, `StringHistogram`, `TableStats`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln::buffer::BufferPool;
//! use kiln::catalog::Catalog;
//! use kiln::common::DEFAULT_STRING_LEN;
//! use kiln::execution::TupleStream;
//! use kiln::tuple::{DataType, Schema, TupleBuilder};
//!
//! let catalog = Arc::new(Catalog::new(4096));
//! let schema = Schema::builder()
//!     .column("id", DataType::Int)
//!     .column("name", DataType::Str(DEFAULT_STRING_LEN))
//!     .build_arc();
//! let table = catalog.open_table("users", "users.dat", schema.clone()).unwrap();
//! let pool = Arc::new(BufferPool::new(16, catalog).unwrap());
//!
//! let mut tuple = TupleBuilder::new(schema).value(1).value("Alice").build().unwrap();
//! pool.insert_tuple(table.table_id(), &mut tuple).unwrap();
//! pool.flush_all_pages().unwrap();
//!
//! let mut scan = table.iter(&pool);
//! scan.open().unwrap();
//! while let Some(t) = scan.next_tuple().unwrap() {
//!     println!("{}", t);
//! }
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod stats;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{KilnConfig, KilnError, PageId, RecordId, Result, SlotId, TableId};
