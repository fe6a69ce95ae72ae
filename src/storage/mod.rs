use std::sync::Arc;

use crate::buffer::{PageCache, PageRef};
use crate::common::{PageId, PageNo, TableId, TransactionId};
use crate::error::Result;
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

use self::heap::page::HeapPage;
use self::heap::scan::HeapScan;

pub(crate) mod common;
pub mod heap;
pub mod store;

pub use self::common::DecodeError;

/// The part of a page the page cache and recovery need to know about.
pub trait Page {
    fn id(&self) -> PageId;

    /// Returns the transaction which last modified this page, or None if the page is clean
    fn is_dirty(&self) -> Option<TransactionId>;

    /// Marks this page as modified by txn. Marking it as not dirty forgets the transaction.
    fn mark_dirty(&mut self, dirty: bool, txn: TransactionId);

    /// Serializes the page into exactly one page worth of bytes
    fn page_data(&self) -> Vec<u8>;

    /// Returns the page as it was when it was loaded or last checkpointed
    fn before_image(&self) -> Result<Self>
    where
        Self: Sized;

    /// Makes the current content the new before image
    fn set_before_image(&mut self);
}

/// A table stored as a sequence of pages.
///
/// Heap files are the only kind of table today. Callers should only rely on this trait.
pub trait DbFile: Send + Sync {
    fn table_id(&self) -> TableId;

    fn schema(&self) -> &Arc<Schema>;

    /// Number of pages, derived from the size of the backing store
    fn page_count(&self) -> Result<PageNo>;

    /// Reads a page directly from the backing store, bypassing any cache
    fn read_page(&self, page_id: PageId) -> Result<HeapPage>;

    /// Writes a page directly to the backing store
    fn write_page(&self, page: &HeapPage) -> Result<()>;

    /// Inserts a tuple and returns the pages which were modified.
    /// On success the tuple carries the record id of its new location.
    fn insert_tuple(
        &self,
        cache: &dyn PageCache,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>>;

    /// Deletes a tuple and returns the pages which were modified.
    /// On success the record id of the tuple is cleared.
    fn delete_tuple(
        &self,
        cache: &dyn PageCache,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>>;

    fn scan<'a>(&'a self, cache: &'a dyn PageCache, txn: TransactionId) -> HeapScan<'a>;
}
