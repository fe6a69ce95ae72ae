use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use super::clock_replacer::ClockReplacer;
use super::{PageCache, PageRef, PoolPos};
use crate::catalog::Catalog;
use crate::common::{PageId, Permissions, TransactionId};
use crate::error::{Result, StorageError};
use crate::storage::Page;

struct PoolState {
    frames: Vec<Option<PageRef>>,
    page_id_to_pool_pos: HashMap<PageId, PoolPos>,
    clock_replacer: ClockReplacer,
}

/// A page can only leave the pool if nobody holds it and no running transaction modified it.
fn can_evict(frame: &Option<PageRef>) -> bool {
    match frame {
        // the pool itself holds one handle
        Some(page) => page.holders() == 1 && page.read().is_dirty().is_none(),
        None => true,
    }
}

impl PoolState {
    fn cached_pages(&self) -> impl Iterator<Item = &PageRef> {
        self.frames.iter().flatten()
    }
}

/// A page cache with a fixed number of frames.
///
/// Pages are read through the `DbFile` registered in the catalog for their table.
/// A page is pinned as long as a `PageRef` handed out for it is alive. When a frame is needed,
/// an unpinned clean page is chosen by the clock policy. Dirty pages stay in the pool until
/// their transaction completes, so an abort can always restore them.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    state: Mutex<PoolState>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, pool_size: usize) -> Self {
        let state = PoolState {
            frames: vec![None; pool_size],
            page_id_to_pool_pos: HashMap::new(),
            clock_replacer: ClockReplacer::new(pool_size),
        };

        Self {
            catalog,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether the page is currently held in memory
    pub fn holds_page(&self, page_id: PageId) -> bool {
        self.state().page_id_to_pool_pos.contains_key(&page_id)
    }

    /// Writes a cached page to disk if it is dirty and marks it as clean
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let state = self.state();
        if let Some(&pool_pos) = state.page_id_to_pool_pos.get(&page_id) {
            if let Some(page) = &state.frames[pool_pos] {
                self.write_back(page)?;
            }
        }
        Ok(())
    }

    /// Writes every dirty cached page to disk
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state();
        for page in state.cached_pages() {
            self.write_back(page)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it back
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state();
        if let Some(pool_pos) = state.page_id_to_pool_pos.remove(&page_id) {
            state.frames[pool_pos] = None;
            debug!(%page_id, "Discarded page");
        }
    }

    /// Finishes the work of a transaction on the cached pages.
    /// On commit the pages it modified are written to disk and become the new before images,
    /// on abort they are restored from their before images.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        let state = self.state();
        for page_ref in state.cached_pages() {
            let mut page = page_ref.write();
            if page.is_dirty() != Some(txn) {
                continue;
            }
            if commit {
                let file = self.catalog.file(page.id().table_id())?;
                file.write_page(&page)?;
                page.mark_dirty(false, txn);
                page.set_before_image();
            } else {
                *page = page.before_image()?;
            }
        }
        debug!(%txn, commit, "Completed transaction");
        Ok(())
    }

    fn write_back(&self, page_ref: &PageRef) -> Result<()> {
        let mut page = page_ref.write();
        if let Some(txn) = page.is_dirty() {
            let file = self.catalog.file(page.id().table_id())?;
            file.write_page(&page)?;
            page.mark_dirty(false, txn);
            debug!(page_id = %page.id(), "Flushed page");
        }
        Ok(())
    }

    /// Returns a frame which can take a new page, evicting a page if needed
    fn free_frame(&self, state: &mut PoolState) -> Result<PoolPos> {
        if let Some(pool_pos) = state.frames.iter().position(|frame| frame.is_none()) {
            return Ok(pool_pos);
        }

        let pool_pos = {
            let PoolState {
                frames,
                clock_replacer,
                ..
            } = &mut *state;
            clock_replacer.find_victim(|pool_pos| !can_evict(&frames[pool_pos]))
        };
        let Some(pool_pos) = pool_pos else {
            warn!("Every page in the buffer pool is pinned or dirty");
            return Err(StorageError::BufferPoolFull);
        };

        if let Some(victim) = state.frames[pool_pos].take() {
            let page_id = victim.id();
            state.page_id_to_pool_pos.remove(&page_id);
            debug!(%page_id, "Evicted page");
        }
        Ok(pool_pos)
    }
}

impl PageCache for BufferPool {
    fn fetch(
        &self,
        txn: TransactionId,
        page_id: PageId,
        permissions: Permissions,
    ) -> Result<PageRef> {
        let mut state = self.state();
        trace!(%txn, %page_id, ?permissions, "Fetching page");

        if let Some(&pool_pos) = state.page_id_to_pool_pos.get(&page_id) {
            state.clock_replacer.touch(pool_pos);
            if let Some(page) = &state.frames[pool_pos] {
                return Ok(page.clone());
            }
        }

        let pool_pos = self.free_frame(&mut state)?;
        let file = self.catalog.file(page_id.table_id())?;
        let page = PageRef::new(file.read_page(page_id)?);

        state.frames[pool_pos] = Some(page.clone());
        state.page_id_to_pool_pos.insert(page_id, pool_pos);
        state.clock_replacer.touch(pool_pos);

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;

    use super::BufferPool;
    use crate::buffer::PageCache;
    use crate::catalog::Catalog;
    use crate::common::{PageId, Permissions, TransactionId};
    use crate::error::StorageError;
    use crate::storage::heap::file::HeapFile;
    use crate::storage::store::{BackingStore, MemoryStore};
    use crate::storage::{DbFile, Page};
    use crate::tuple::schema::{Schema, TypeId};
    use crate::tuple::Tuple;

    const PAGE_SIZE: usize = 64;

    fn setup(pages: usize, pool_size: usize) -> Result<(Arc<HeapFile>, BufferPool)> {
        let store = Arc::new(MemoryStore::new("numbers"));
        store.write_at(0, &vec![0u8; pages * PAGE_SIZE])?;
        let schema = Arc::new(Schema::from_types(&[TypeId::Integer]));
        let file = Arc::new(HeapFile::open(store, schema, PAGE_SIZE)?);

        let catalog = Arc::new(Catalog::new());
        catalog.add_table(file.clone(), "numbers");
        let buffer_pool = BufferPool::new(catalog, pool_size);
        Ok((file, buffer_pool))
    }

    fn number(file: &HeapFile, val: i32) -> Tuple {
        Tuple::with_values(Arc::clone(file.schema()), vec![val.into()]).unwrap()
    }

    #[test]
    fn repeated_fetches_return_same_page() -> Result<()> {
        let (file, buffer_pool) = setup(2, 2)?;
        let txn = TransactionId::next();
        let page_id = PageId::new(file.table_id(), 1);

        let first = buffer_pool.fetch(txn, page_id, Permissions::ReadWrite)?;
        let second = buffer_pool.fetch(txn, page_id, Permissions::ReadOnly)?;
        assert!(first.same_page(&second));

        first.write().insert_tuple(&mut number(&file, 5))?;
        assert_eq!(second.read().iter().count(), 1);
        Ok(())
    }

    #[test]
    fn pinned_pages_are_not_evicted() -> Result<()> {
        let (file, buffer_pool) = setup(3, 1)?;
        let txn = TransactionId::next();
        let table_id = file.table_id();

        let page0 = buffer_pool.fetch(txn, PageId::new(table_id, 0), Permissions::ReadOnly)?;
        let result = buffer_pool.fetch(txn, PageId::new(table_id, 1), Permissions::ReadOnly);
        assert!(
            matches!(result, Err(StorageError::BufferPoolFull)),
            "A buffer pool with pool size 1 should not be able to hold 2 pages."
        );

        drop(page0);
        let page1 = buffer_pool.fetch(txn, PageId::new(table_id, 1), Permissions::ReadOnly)?;
        assert_eq!(page1.id(), PageId::new(table_id, 1));
        assert!(!buffer_pool.holds_page(PageId::new(table_id, 0)));
        Ok(())
    }

    #[test]
    fn dirty_pages_are_not_evicted() -> Result<()> {
        let (file, buffer_pool) = setup(2, 1)?;
        let txn = TransactionId::next();
        let table_id = file.table_id();

        let page0 = buffer_pool.fetch(txn, PageId::new(table_id, 0), Permissions::ReadWrite)?;
        {
            let mut page = page0.write();
            page.insert_tuple(&mut number(&file, 42))?;
            page.mark_dirty(true, txn);
        }
        drop(page0);

        // page 0 is unpinned but still belongs to a running transaction
        let result = buffer_pool.fetch(txn, PageId::new(table_id, 1), Permissions::ReadOnly);
        assert!(matches!(result, Err(StorageError::BufferPoolFull)));
        assert!(buffer_pool.holds_page(PageId::new(table_id, 0)));
        assert_eq!(file.read_page(PageId::new(table_id, 0))?.iter().count(), 0);

        // once committed, the page is clean and can make room for page 1
        buffer_pool.transaction_complete(txn, true)?;
        let _page1 = buffer_pool.fetch(txn, PageId::new(table_id, 1), Permissions::ReadOnly)?;
        assert!(!buffer_pool.holds_page(PageId::new(table_id, 0)));
        let on_disk = file.read_page(PageId::new(table_id, 0))?;
        assert_eq!(on_disk.iter().count(), 1);
        Ok(())
    }

    #[test]
    fn aborted_changes_never_reach_the_store() -> Result<()> {
        let (file, buffer_pool) = setup(2, 1)?;
        let table_id = file.table_id();
        let page0 = PageId::new(table_id, 0);

        let aborting = TransactionId::next();
        let modified = file.insert_tuple(&buffer_pool, aborting, &mut number(&file, 7))?;
        assert_eq!(modified[0].id(), page0);
        drop(modified);

        let result = buffer_pool.fetch(aborting, PageId::new(table_id, 1), Permissions::ReadWrite);
        assert!(matches!(result, Err(StorageError::BufferPoolFull)));

        buffer_pool.transaction_complete(aborting, false)?;
        let page1 = PageId::new(table_id, 1);
        let _page1 = buffer_pool.fetch(aborting, page1, Permissions::ReadOnly)?;
        assert!(!buffer_pool.holds_page(page0));
        assert_eq!(file.read_page(page0)?.iter().count(), 0);
        Ok(())
    }

    #[test]
    fn flush_marks_pages_clean() -> Result<()> {
        let (file, buffer_pool) = setup(1, 2)?;
        let txn = TransactionId::next();
        let page_id = PageId::new(file.table_id(), 0);

        let page = buffer_pool.fetch(txn, page_id, Permissions::ReadWrite)?;
        page.write().insert_tuple(&mut number(&file, 1))?;
        page.write().mark_dirty(true, txn);

        buffer_pool.flush_page(page_id)?;
        assert_eq!(page.read().is_dirty(), None);
        assert_eq!(file.read_page(page_id)?.iter().count(), 1);

        page.write().insert_tuple(&mut number(&file, 2))?;
        page.write().mark_dirty(true, txn);
        buffer_pool.flush_all_pages()?;
        assert_eq!(file.read_page(page_id)?.iter().count(), 2);
        Ok(())
    }

    #[test]
    fn discarded_pages_are_reloaded_from_disk() -> Result<()> {
        let (file, buffer_pool) = setup(1, 2)?;
        let txn = TransactionId::next();
        let page_id = PageId::new(file.table_id(), 0);

        let page = buffer_pool.fetch(txn, page_id, Permissions::ReadWrite)?;
        page.write().insert_tuple(&mut number(&file, 1))?;
        page.write().mark_dirty(true, txn);
        drop(page);

        buffer_pool.discard_page(page_id);
        assert!(!buffer_pool.holds_page(page_id));
        let page = buffer_pool.fetch(txn, page_id, Permissions::ReadOnly)?;
        assert_eq!(page.read().iter().count(), 0);
        Ok(())
    }

    #[test]
    fn abort_restores_before_image() -> Result<()> {
        let (file, buffer_pool) = setup(1, 2)?;
        let page_id = PageId::new(file.table_id(), 0);

        let committing = TransactionId::next();
        let mut inserted = number(&file, 1);
        file.insert_tuple(&buffer_pool, committing, &mut inserted)?;
        buffer_pool.transaction_complete(committing, true)?;
        assert_eq!(file.read_page(page_id)?.iter().count(), 1);

        let aborting = TransactionId::next();
        file.insert_tuple(&buffer_pool, aborting, &mut number(&file, 2))?;
        file.delete_tuple(&buffer_pool, aborting, &mut inserted)?;
        buffer_pool.transaction_complete(aborting, false)?;

        let page = buffer_pool.fetch(aborting, page_id, Permissions::ReadOnly)?;
        let page = page.read();
        assert_eq!(page.is_dirty(), None);
        let values = page
            .iter()
            .map(|tuple| tuple.to_string())
            .collect::<Vec<_>>();
        assert_eq!(values, vec!["1"]);
        assert_eq!(page.page_data(), file.read_page(page_id)?.page_data());
        Ok(())
    }

    #[test]
    fn unknown_tables_are_errors() -> Result<()> {
        let (_file, buffer_pool) = setup(1, 2)?;
        let result = buffer_pool.fetch(
            TransactionId::next(),
            PageId::new(0xdead, 0),
            Permissions::ReadOnly,
        );
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        Ok(())
    }
}
