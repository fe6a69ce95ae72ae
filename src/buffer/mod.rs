use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, Permissions, TransactionId};
use crate::error::Result;
use crate::storage::heap::page::HeapPage;
use crate::storage::Page;

pub mod buffer_pool;
mod clock_replacer;

type PoolPos = usize;

/// A shared handle to a decoded page.
/// Every holder of a handle for the same cached page sees the same in-memory page.
#[derive(Clone, Debug)]
pub struct PageRef(Arc<RwLock<HeapPage>>);

impl PageRef {
    pub fn new(page: HeapPage) -> Self {
        Self(Arc::new(RwLock::new(page)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, HeapPage> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, HeapPage> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> PageId {
        self.read().id()
    }

    /// Returns whether both handles point to the same in-memory page
    pub fn same_page(&self, other: &PageRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of handles to this page which are currently alive
    fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

/// Mediates every access to existing pages of a table.
///
/// The cache decides which pages stay in memory and when modified pages are written back.
/// Callers must only modify a page they fetched with `Permissions::ReadWrite`.
pub trait PageCache: Send + Sync {
    fn fetch(
        &self,
        txn: TransactionId,
        page_id: PageId,
        permissions: Permissions,
    ) -> Result<PageRef>;
}
