use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::prelude::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::{IoContext, Result, StorageError};

/// A byte addressable resource which holds the pages of one table.
pub trait BackingStore: Send + Sync {
    /// A name which stays the same for every store opened on the same resource
    fn identity(&self) -> &str;

    /// Current length in bytes
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fills the whole buffer with the bytes starting at offset.
    /// Returns an error if there are not enough bytes.
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    /// Writes all bytes at offset, growing the store if needed.
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Lock which has to be held while computing where the store ends and writing past it.
    fn extension_lock(&self) -> MutexGuard<'_, ()>;
}

/// Stores a table in a single file using positional reads and writes.
pub struct FileStore {
    path: PathBuf,
    identity: String,
    file: File,
    extension: Mutex<()>,
}

impl FileStore {
    /// Opens the file at path for reading and writing, creating it if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .io_context(|| format!("Could not open data file {}", path.display()))?;
        let path = path
            .canonicalize()
            .io_context(|| format!("Could not resolve path of data file {}", path.display()))?;

        Ok(Self {
            identity: path.display().to_string(),
            path,
            file,
            extension: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BackingStore for FileStore {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn len(&self) -> Result<u64> {
        let metadata = self
            .file
            .metadata()
            .io_context(|| format!("Could not read size of {}", self.identity))?;
        Ok(metadata.len())
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buffer, offset).io_context(|| {
            format!(
                "Could not read {} bytes at offset {} from {}",
                buffer.len(),
                offset,
                self.identity
            )
        })
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.write_all_at(data, offset).io_context(|| {
            format!(
                "Failed to write data at offset {} to {}",
                offset, self.identity
            )
        })?;
        self.file.sync_all().io_context(|| {
            format!(
                "Failed to sync data when writing at offset {} to {}",
                offset, self.identity
            )
        })
    }

    fn extension_lock(&self) -> MutexGuard<'_, ()> {
        self.extension.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a table in memory. Used for tests and temporary tables.
pub struct MemoryStore {
    name: String,
    data: RwLock<Vec<u8>>,
    extension: Mutex<()>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_data(name, Vec::new())
    }

    pub fn with_data(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(data),
            extension: Mutex::new(()),
        }
    }
}

impl BackingStore for MemoryStore {
    fn identity(&self) -> &str {
        &self.name
    }

    fn len(&self) -> Result<u64> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.len() as u64)
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let start = offset as usize;
        let end = start + buffer.len();
        if end > data.len() {
            return Err(StorageError::Io {
                context: format!(
                    "Could not read {} bytes at offset {} from {}",
                    buffer.len(),
                    offset,
                    self.name
                ),
                source: ErrorKind::UnexpectedEof.into(),
            });
        }
        buffer.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn extension_lock(&self) -> MutexGuard<'_, ()> {
        self.extension.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
