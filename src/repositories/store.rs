use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::models::{StoreError, StoreResult};

/// Durable key-value byte storage for the cart. Reads and writes are
/// synchronous; callers treat it like browser local storage.
pub trait CartStore: Send + Sync {
    /// Read the bytes stored under a key, `None` if nothing was written yet
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the bytes stored under a key
    fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;
}

/// Process-local store. Contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryCartStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.records.lock().map_err(|e| StoreError::Unavailable {
            message: e.to_string(),
        })
    }
}

impl CartStore for InMemoryCartStore {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        self.lock()?.insert(key.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store keeping one file per key inside a directory
pub struct FileCartStore {
    dir: PathBuf,
}

impl FileCartStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a storage key onto a file name inside the store directory.
    /// ASCII alphanumerics and `-` are kept; every other byte becomes `_XX`
    /// (upper-case hex), so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("_{:02X}", byte));
            }
        }
        self.dir.join(format!("{}.json", name))
    }
}

impl CartStore for FileCartStore {
    #[instrument(skip(self), fields(store.dir = %self.dir.display()))]
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored cart found");
                Ok(None)
            }
            Err(e) => Err(StoreError::from(e)),
        }
    }

    #[instrument(skip(self, bytes), fields(store.dir = %self.dir.display(), bytes = bytes.len()))]
    fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, &path)) {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(error = %cleanup, "Failed to remove temporary cart file");
                }
            }
            return Err(StoreError::from(e));
        }

        debug!("Cart written to {}", path.display());
        Ok(())
    }
}
