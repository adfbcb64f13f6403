mod table_file;
mod table_iterator;

pub use table_file::TableFile;
pub use table_iterator::TableIterator;
