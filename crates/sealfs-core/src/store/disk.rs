//! File-per-chunk store rooted at a local directory.
//!
//! Blob names are the hex encoding of the identity, so the layout is
//! inspectable with ordinary shell tools. Usage is measured once when the
//! store opens and kept current under a lock.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{DriveError, Result};
use crate::id::ObjectId;
use crate::store::ChunkStore;

/// A [`ChunkStore`] keeping each blob as a file under a root directory.
pub struct DiskChunkStore {
    root: PathBuf,
    usage: Mutex<u64>,
    max_usage: u64,
}

impl DiskChunkStore {
    /// Open (or create) a store rooted at `root` with the given budget.
    pub fn open(root: impl Into<PathBuf>, max_usage: u64) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|err| DriveError::IoFailure(format!("create store root: {err}")))?;
        let mut usage = 0u64;
        let entries = fs::read_dir(&root)
            .map_err(|err| DriveError::IoFailure(format!("scan store root: {err}")))?;
        for entry in entries {
            let entry =
                entry.map_err(|err| DriveError::IoFailure(format!("scan store root: {err}")))?;
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    usage += metadata.len();
                }
            }
        }
        debug!(root = %root.display(), usage, max_usage, "opened disk chunk store");
        Ok(DiskChunkStore {
            root,
            usage: Mutex::new(usage),
            max_usage,
        })
    }

    fn blob_path(&self, name: &ObjectId) -> PathBuf {
        self.root.join(name.to_hex())
    }
}

impl ChunkStore for DiskChunkStore {
    fn put(&self, name: &ObjectId, data: &[u8]) -> Result<()> {
        let path = self.blob_path(name);
        let mut usage = self.usage.lock();
        let replaced = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        let projected = *usage - replaced + data.len() as u64;
        if projected > self.max_usage {
            return Err(DriveError::CapacityExceeded);
        }
        fs::write(&path, data)
            .map_err(|err| DriveError::IoFailure(format!("write chunk: {err}")))?;
        *usage = projected;
        Ok(())
    }

    fn get(&self, name: &ObjectId) -> Result<Vec<u8>> {
        match fs::read(self.blob_path(name)) {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(DriveError::NotFound(format!("chunk {name}")))
            }
            Err(err) => Err(DriveError::IoFailure(format!("read chunk: {err}"))),
        }
    }

    fn delete(&self, name: &ObjectId) -> Result<()> {
        let path = self.blob_path(name);
        let mut usage = self.usage.lock();
        let size = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        match fs::remove_file(&path) {
            Ok(()) => {
                *usage -= size;
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(DriveError::NotFound(format!("chunk {name}")))
            }
            Err(err) => Err(DriveError::IoFailure(format!("delete chunk: {err}"))),
        }
    }

    fn max_disk_usage(&self) -> u64 {
        self.max_usage
    }

    fn current_disk_usage(&self) -> u64 {
        *self.usage.lock()
    }
}
