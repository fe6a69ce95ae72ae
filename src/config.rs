use crate::common::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE};

/// Sizes which stay fixed for the lifetime of the heap files and the page cache built from them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Size in bytes of every page of a heap file
    pub page_size: usize,
    /// How many pages the buffer pool holds at most
    pub pool_size: usize,
}

impl StorageConfig {
    pub fn new(page_size: usize, pool_size: usize) -> Self {
        Self {
            page_size,
            pool_size,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}
