use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

pub type TableId = u32;
pub type PageNo = u32;
pub type Slot = u32;

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_POOL_SIZE: usize = 50;

/// Identifies a page: the table it belongs to and its position in the table's file,
/// where page number n is the n-th page from the start of the file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PageId {
    table_id: TableId,
    page_no: PageNo,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn page_no(&self) -> PageNo {
        self.page_no
    }
}

impl Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// The owner of page modifications,
/// handed out by whoever runs transactions on top of the storage engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Returns a transaction id which has not been handed out before in this process.
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}
