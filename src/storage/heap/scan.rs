use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::buffer::PageCache;
use crate::common::{PageId, Permissions, TransactionId};
use crate::error::Result;
use crate::storage::DbFile;
use crate::tuple::Tuple;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanState {
    Unopened,
    Open,
    Exhausted,
    Closed,
}

/// A forward only cursor over the live tuples of a table,
/// yielding them ordered by page number and then by slot.
///
/// Opening the cursor copies every tuple of the table into a buffer, so no page stays
/// pinned while the cursor is consumed. Before `open` and after `close` the cursor yields nothing.
pub struct HeapScan<'a> {
    file: &'a dyn DbFile,
    cache: &'a dyn PageCache,
    txn: TransactionId,
    buffer: VecDeque<Tuple>,
    state: ScanState,
}

impl<'a> HeapScan<'a> {
    pub fn new(file: &'a dyn DbFile, cache: &'a dyn PageCache, txn: TransactionId) -> Self {
        Self {
            file,
            cache,
            txn,
            buffer: VecDeque::new(),
            state: ScanState::Unopened,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Reads every page of the table through the cache and buffers its tuples.
    /// If reading any page fails, the cursor is left closed.
    pub fn open(&mut self) -> Result<()> {
        self.buffer.clear();
        if let Err(e) = self.fill_buffer() {
            warn!(table_id = self.file.table_id(), error = %e, "Could not open scan");
            self.close();
            return Err(e);
        }
        debug!(
            table_id = self.file.table_id(),
            tuples = self.buffer.len(),
            "Opened scan"
        );
        self.update_state();
        Ok(())
    }

    fn fill_buffer(&mut self) -> Result<()> {
        let table_id = self.file.table_id();
        for page_no in 0..self.file.page_count()? {
            let page_id = PageId::new(table_id, page_no);
            let page_ref = self.cache.fetch(self.txn, page_id, Permissions::ReadOnly)?;
            let page = page_ref.read();
            self.buffer.extend(page.iter().cloned());
        }
        Ok(())
    }

    fn update_state(&mut self) {
        self.state = if self.buffer.is_empty() {
            ScanState::Exhausted
        } else {
            ScanState::Open
        };
    }

    pub fn has_next(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Starts over from the first page, picking up changes made since the cursor was opened.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.buffer.clear();
        self.state = ScanState::Closed;
    }
}

impl<'a> Iterator for HeapScan<'a> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        let tuple = self.buffer.pop_front();
        if self.state == ScanState::Open && self.buffer.is_empty() {
            self.state = ScanState::Exhausted;
        }
        tuple
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.buffer.len(), Some(self.buffer.len()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;

    use super::ScanState;
    use crate::buffer::buffer_pool::BufferPool;
    use crate::catalog::Catalog;
    use crate::common::TransactionId;
    use crate::error::StorageError;
    use crate::storage::heap::file::HeapFile;
    use crate::storage::store::{BackingStore, MemoryStore};
    use crate::storage::DbFile;
    use crate::tuple::schema::{Schema, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    // three integers per page
    const PAGE_SIZE: usize = 13;

    fn setup(store: Arc<MemoryStore>) -> Result<(Arc<HeapFile>, BufferPool)> {
        let schema = Arc::new(Schema::from_types(&[TypeId::Integer]));
        let file = Arc::new(HeapFile::open(store, schema, PAGE_SIZE)?);
        assert_eq!(file.layout().slot_count(), 3);
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(file.clone(), "numbers");
        Ok((file, BufferPool::new(catalog, 4)))
    }

    fn insert_numbers(
        file: &HeapFile,
        buffer_pool: &BufferPool,
        values: &[i32],
    ) -> Result<Vec<Tuple>> {
        let txn = TransactionId::next();
        let mut tuples = Vec::new();
        for value in values {
            let mut tuple = Tuple::with_values(Arc::clone(file.schema()), vec![(*value).into()])?;
            file.insert_tuple(buffer_pool, txn, &mut tuple)?;
            tuples.push(tuple);
        }
        Ok(tuples)
    }

    fn numbers(tuples: impl Iterator<Item = Tuple>) -> Vec<i32> {
        tuples
            .map(|tuple| tuple.get(0).unwrap().and_then(Value::as_i32).unwrap())
            .collect()
    }

    #[test]
    fn yields_tuples_in_page_and_slot_order() -> Result<()> {
        let (file, buffer_pool) = setup(Arc::new(MemoryStore::new("numbers")))?;
        let tuples = insert_numbers(&file, &buffer_pool, &[1, 2, 3, 4, 5, 6, 7])?;
        let mut second = tuples[1].clone();
        file.delete_tuple(&buffer_pool, TransactionId::next(), &mut second)?;

        let mut scan = file.scan(&buffer_pool, TransactionId::next());
        assert_eq!(scan.state(), ScanState::Unopened);
        assert!(!scan.has_next());
        scan.open()?;
        assert_eq!(scan.state(), ScanState::Open);
        assert_eq!(scan.size_hint(), (6, Some(6)));

        let first = scan.next().unwrap();
        assert_eq!(first.record_id(), tuples[0].record_id());
        assert_eq!(numbers(scan.by_ref()), vec![3, 4, 5, 6, 7]);
        assert_eq!(scan.state(), ScanState::Exhausted);
        assert!(!scan.has_next());
        assert!(scan.next().is_none());
        Ok(())
    }

    #[test]
    fn unopened_and_closed_scans_are_empty() -> Result<()> {
        let (file, buffer_pool) = setup(Arc::new(MemoryStore::new("numbers")))?;
        insert_numbers(&file, &buffer_pool, &[1, 2])?;

        let mut scan = file.scan(&buffer_pool, TransactionId::next());
        assert!(scan.next().is_none());

        scan.open()?;
        assert!(scan.has_next());
        scan.close();
        assert_eq!(scan.state(), ScanState::Closed);
        assert!(!scan.has_next());
        assert!(scan.next().is_none());
        Ok(())
    }

    #[test]
    fn empty_table_is_exhausted_right_away() -> Result<()> {
        let (file, buffer_pool) = setup(Arc::new(MemoryStore::new("numbers")))?;
        let mut scan = file.scan(&buffer_pool, TransactionId::next());
        scan.open()?;
        assert_eq!(scan.state(), ScanState::Exhausted);
        assert!(scan.next().is_none());
        Ok(())
    }

    #[test]
    fn rewind_sees_the_current_table() -> Result<()> {
        let (file, buffer_pool) = setup(Arc::new(MemoryStore::new("numbers")))?;
        insert_numbers(&file, &buffer_pool, &[1, 2, 3, 4])?;

        let mut scan = file.scan(&buffer_pool, TransactionId::next());
        scan.open()?;
        assert_eq!(numbers(scan.by_ref()), vec![1, 2, 3, 4]);

        scan.rewind()?;
        assert_eq!(numbers(scan.by_ref()), vec![1, 2, 3, 4]);

        insert_numbers(&file, &buffer_pool, &[5])?;
        // the buffer was filled before the insert
        scan.rewind()?;
        insert_numbers(&file, &buffer_pool, &[6])?;
        assert_eq!(numbers(scan.by_ref()), vec![1, 2, 3, 4, 5]);

        scan.rewind()?;
        assert_eq!(numbers(scan), vec![1, 2, 3, 4, 5, 6]);
        Ok(())
    }

    #[test]
    fn failed_open_closes_the_scan() -> Result<()> {
        let store = Arc::new(MemoryStore::new("numbers"));
        let (file, buffer_pool) = setup(store.clone())?;
        insert_numbers(&file, &buffer_pool, &[1, 2, 3])?;
        buffer_pool.flush_all_pages()?;

        // a truncated second page
        store.write_at(PAGE_SIZE as u64, &[0b0000_0001, 0, 0])?;
        assert_eq!(file.page_count()?, 2);

        let mut scan = file.scan(&buffer_pool, TransactionId::next());
        let result = scan.open();
        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(scan.state(), ScanState::Closed);
        assert!(scan.next().is_none());
        Ok(())
    }
}
