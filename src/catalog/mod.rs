use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::common::TableId;
use crate::error::{Result, StorageError};
use crate::storage::DbFile;
use crate::tuple::schema::Schema;

/// Resolves the schema of a table, e.g. when decoding one of its pages.
pub trait SchemaRegistry {
    fn schema_for(&self, table_id: TableId) -> Result<Arc<Schema>>;
}

struct TableEntry {
    name: String,
    file: Arc<dyn DbFile>,
}

/// Keeps track of all tables, their names and the files holding their data.
pub struct Catalog {
    tables: DashMap<TableId, TableEntry>,
    table_name_to_id: DashMap<String, TableId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            table_name_to_id: DashMap::new(),
        }
    }

    /// Registers a table under a name.
    /// A table previously registered with the same name or the same id is replaced.
    pub fn add_table(&self, file: Arc<dyn DbFile>, table_name: &str) {
        let table_id = file.table_id();

        match self.table_name_to_id.entry(table_name.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let previous_id = occupied.insert(table_id);
                if previous_id != table_id {
                    self.tables.remove(&previous_id);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(table_id);
            }
        };

        let entry = TableEntry {
            name: table_name.to_owned(),
            file,
        };
        if let Some(previous) = self.tables.insert(table_id, entry) {
            if previous.name != table_name {
                self.table_name_to_id.remove(&previous.name);
            }
        }
        debug!(table_id, table_name, "Registered table");
    }

    pub fn table_id(&self, table_name: &str) -> Result<TableId> {
        self.table_name_to_id
            .get(table_name)
            .map(|kv| *kv.value())
            .ok_or_else(|| StorageError::NotFound(format!("No table named {table_name}")))
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.tables
            .get(&table_id)
            .map(|kv| kv.value().name.clone())
            .ok_or_else(|| unknown_table(table_id))
    }

    pub fn file(&self, table_id: TableId) -> Result<Arc<dyn DbFile>> {
        self.tables
            .get(&table_id)
            .map(|kv| Arc::clone(&kv.value().file))
            .ok_or_else(|| unknown_table(table_id))
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut tables = self
            .table_name_to_id
            .iter()
            .map(|kv| kv.key().to_owned())
            .collect::<Vec<_>>();
        tables.sort();
        tables
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|kv| *kv.key()).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry for Catalog {
    fn schema_for(&self, table_id: TableId) -> Result<Arc<Schema>> {
        self.tables
            .get(&table_id)
            .map(|kv| Arc::clone(kv.value().file.schema()))
            .ok_or_else(|| unknown_table(table_id))
    }
}

fn unknown_table(table_id: TableId) -> StorageError {
    StorageError::NotFound(format!("No table with id {table_id}"))
}
