use super::error::{KilnError, Result};

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity (number of cached pages)
pub const DEFAULT_BUFFER_POOL_PAGES: usize = 50;

/// Default memory budget for one side of a join, in bytes
pub const DEFAULT_JOIN_MEMORY_BUDGET: usize = 131072;

/// Default number of histogram buckets per field
pub const DEFAULT_HISTOGRAM_BUCKETS: usize = 100;

/// Default cost charged for reading one page during a scan
pub const DEFAULT_IO_COST_PER_PAGE: f64 = 1000.0;

/// Serialized width of an integer field
pub const INT_SIZE: usize = 4;

/// Length prefix in front of every string field
pub const STRING_LENGTH_PREFIX: usize = 4;

/// Default maximum length of a string column
pub const DEFAULT_STRING_LEN: u16 = 32;

/// Runtime knobs shared by the storage, join and statistics layers.
///
/// The page size must stay identical across every table opened by one
/// catalog; changing it invalidates existing table files.
#[derive(Debug, Clone, PartialEq)]
pub struct KilnConfig {
    pub page_size: usize,
    pub buffer_pool_pages: usize,
    pub join_memory_budget: usize,
    pub histogram_buckets: usize,
    pub io_cost_per_page: f64,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_BUFFER_POOL_PAGES,
            join_memory_budget: DEFAULT_JOIN_MEMORY_BUDGET,
            histogram_buckets: DEFAULT_HISTOGRAM_BUCKETS,
            io_cost_per_page: DEFAULT_IO_COST_PER_PAGE,
        }
    }
}

impl KilnConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn with_join_memory_budget(mut self, bytes: usize) -> Self {
        self.join_memory_budget = bytes;
        self
    }

    pub fn with_histogram_buckets(mut self, buckets: usize) -> Self {
        self.histogram_buckets = buckets;
        self
    }

    pub fn with_io_cost_per_page(mut self, cost: f64) -> Self {
        self.io_cost_per_page = cost;
        self
    }

    /// Rejects settings no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(KilnError::InvalidConfiguration(
                "page size must be positive".into(),
            ));
        }
        if self.buffer_pool_pages == 0 {
            return Err(KilnError::InvalidCapacity(0));
        }
        if self.join_memory_budget == 0 {
            return Err(KilnError::InvalidConfiguration(
                "join memory budget must be positive".into(),
            ));
        }
        if self.histogram_buckets == 0 {
            return Err(KilnError::InvalidConfiguration(
                "histogram bucket count must be positive".into(),
            ));
        }
        if !(self.io_cost_per_page >= 0.0) {
            return Err(KilnError::InvalidConfiguration(format!(
                "io cost per page must be non-negative, got {}",
                self.io_cost_per_page
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = KilnConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(KilnConfig::default().with_page_size(0).validate().is_err());
        assert!(matches!(
            KilnConfig::default().with_buffer_pool_pages(0).validate(),
            Err(KilnError::InvalidCapacity(0))
        ));
        assert!(KilnConfig::default()
            .with_join_memory_budget(0)
            .validate()
            .is_err());
        assert!(KilnConfig::default()
            .with_io_cost_per_page(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_default_string_column_fits_default_page() {
        use crate::tuple::DataType;
        let width = DataType::Str(DEFAULT_STRING_LEN).byte_len();
        assert_eq!(width, STRING_LENGTH_PREFIX + DEFAULT_STRING_LEN as usize);
        assert!(INT_SIZE + width < DEFAULT_PAGE_SIZE);
    }
}
