//! In-memory chunk store, the substrate for unit and integration tests.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{DriveError, Result};
use crate::id::ObjectId;
use crate::store::ChunkStore;

struct Inner {
    blobs: HashMap<ObjectId, Vec<u8>>,
    usage: u64,
}

/// A [`ChunkStore`] holding everything in a process-local map.
pub struct MemoryChunkStore {
    inner: RwLock<Inner>,
    max_usage: u64,
}

impl MemoryChunkStore {
    pub fn new(max_usage: u64) -> Self {
        MemoryChunkStore {
            inner: RwLock::new(Inner {
                blobs: HashMap::new(),
                usage: 0,
            }),
            max_usage,
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().blobs.is_empty()
    }
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        // 1 GiB is comfortably more than any test exercises.
        MemoryChunkStore::new(1 << 30)
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put(&self, name: &ObjectId, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        let replaced = inner.blobs.get(name).map(|blob| blob.len() as u64).unwrap_or(0);
        let projected = inner.usage - replaced + data.len() as u64;
        if projected > self.max_usage {
            return Err(DriveError::CapacityExceeded);
        }
        inner.blobs.insert(*name, data.to_vec());
        inner.usage = projected;
        Ok(())
    }

    fn get(&self, name: &ObjectId) -> Result<Vec<u8>> {
        self.inner
            .read()
            .blobs
            .get(name)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(format!("chunk {name}")))
    }

    fn delete(&self, name: &ObjectId) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.blobs.remove(name) {
            Some(blob) => {
                inner.usage -= blob.len() as u64;
                Ok(())
            }
            None => Err(DriveError::NotFound(format!("chunk {name}"))),
        }
    }

    fn max_disk_usage(&self) -> u64 {
        self.max_usage
    }

    fn current_disk_usage(&self) -> u64 {
        self.inner.read().usage
    }
}
