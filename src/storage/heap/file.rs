use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{debug, trace};

use super::page::{HeapPage, PageLayout};
use super::scan::HeapScan;
use crate::buffer::{PageCache, PageRef};
use crate::common::{PageId, PageNo, Permissions, TableId, TransactionId};
use crate::error::{Result, StorageError};
use crate::storage::store::BackingStore;
use crate::storage::{DbFile, Page};
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

/// Derives the id of a table from the identity of its backing store,
/// so reopening the same store always yields the same id.
pub fn table_id_for(identity: &str) -> TableId {
    let mut hasher = DefaultHasher::new();
    identity.hash(&mut hasher);
    hasher.finish() as TableId
}

/// A table stored as an unordered collection of fixed size pages in a backing store.
/// Page n occupies the bytes `[n * page_size, (n + 1) * page_size)`.
pub struct HeapFile {
    store: Arc<dyn BackingStore>,
    schema: Arc<Schema>,
    layout: PageLayout,
    table_id: TableId,
}

impl HeapFile {
    /// Opens a heap file on top of the store.
    /// Fails if a tuple of the schema does not fit into a page of page_size bytes.
    pub fn open(
        store: Arc<dyn BackingStore>,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> Result<Self> {
        let layout = PageLayout::new(page_size, schema.tuple_size())?;
        let table_id = table_id_for(store.identity());
        debug!(
            table_id,
            store = store.identity(),
            page_size,
            slots_per_page = layout.slot_count(),
            "Opened heap file"
        );

        Ok(Self {
            store,
            schema,
            layout,
            table_id,
        })
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    fn offset(&self, page_no: PageNo) -> u64 {
        page_no as u64 * self.layout.page_size() as u64
    }

    fn check_table(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id() != self.table_id {
            return Err(StorageError::NotFound(format!(
                "Page {page_id} does not belong to table {}",
                self.table_id
            )));
        }
        Ok(())
    }

    /// Appends a new page holding only the given tuple.
    /// The page is written straight to the store since no cache can know about it yet.
    fn allocate_page(&self, txn: TransactionId, tuple: &mut Tuple) -> Result<PageRef> {
        // computing the new page number and writing the page have to happen atomically,
        // otherwise concurrent inserts could allocate the same page
        let _extension = self.store.extension_lock();
        let page_no = self.page_count()?;
        let page_id = PageId::new(self.table_id, page_no);

        let mut page = HeapPage::new(
            page_id,
            Arc::clone(&self.schema),
            self.layout,
            &HeapPage::empty_page_data(self.layout.page_size()),
        )?;
        page.insert_tuple(tuple)?;
        page.mark_dirty(true, txn);
        if let Err(e) = self.write_page(&page) {
            tuple.set_record_id(None);
            return Err(e);
        }
        debug!(%page_id, %txn, "Allocated new page");

        Ok(PageRef::new(page))
    }
}

impl DbFile for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn page_count(&self) -> Result<PageNo> {
        let page_size = self.layout.page_size() as u64;
        let len = self.store.len()?;
        // a partially written last page still counts as a page
        Ok(((len + page_size - 1) / page_size) as PageNo)
    }

    fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        self.check_table(page_id)?;
        let mut data = HeapPage::empty_page_data(self.layout.page_size());
        self.store.read_at(self.offset(page_id.page_no()), &mut data)?;
        trace!(%page_id, "Read page");

        HeapPage::new(page_id, Arc::clone(&self.schema), self.layout, &data)
    }

    fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.id();
        self.check_table(page_id)?;
        self.store
            .write_at(self.offset(page_id.page_no()), &page.page_data())?;
        trace!(%page_id, "Wrote page");
        Ok(())
    }

    fn insert_tuple(
        &self,
        cache: &dyn PageCache,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        if **tuple.schema() != *self.schema {
            return Err(StorageError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }

        for page_no in 0..self.page_count()? {
            let page_id = PageId::new(self.table_id, page_no);
            let page_ref = cache.fetch(txn, page_id, Permissions::ReadWrite)?;
            {
                let mut page = page_ref.write();
                if page.empty_slot_count() == 0 {
                    continue;
                }
                let record_id = page.insert_tuple(tuple)?;
                page.mark_dirty(true, txn);
                trace!(%record_id, %txn, "Inserted tuple");
            }
            return Ok(vec![page_ref]);
        }

        Ok(vec![self.allocate_page(txn, tuple)?])
    }

    fn delete_tuple(
        &self,
        cache: &dyn PageCache,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotPlaced)?;
        let page_id = record_id.page_id();
        if page_id.table_id() != self.table_id {
            return Err(StorageError::SlotNotOwned {
                record_id,
                page_id: PageId::new(self.table_id, page_id.page_no()),
            });
        }

        let page_ref = cache.fetch(txn, page_id, Permissions::ReadWrite)?;
        {
            let mut page = page_ref.write();
            page.delete_tuple(tuple)?;
            page.mark_dirty(true, txn);
        }
        trace!(%record_id, %txn, "Deleted tuple");

        Ok(vec![page_ref])
    }

    fn scan<'a>(&'a self, cache: &'a dyn PageCache, txn: TransactionId) -> HeapScan<'a> {
        HeapScan::new(self, cache, txn)
    }
}
