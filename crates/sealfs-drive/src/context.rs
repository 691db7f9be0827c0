//! Per-open-file state and the handle tables behind the shim's opaque
//! user-context pointers.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;

use sealfs_core::encrypt::SelfEncryptor;
use sealfs_core::id::DirectoryId;
use sealfs_core::MetaData;

/// Transient state for one open file or directory handle.
///
/// Created on `create`/`open`, destroyed on `close`. For files the context
/// owns the self-encryptor over a cloned data map, so truncation and
/// rewrites never touch the persisted parent-listing copy until the close
/// path re-serializes it.
pub struct FileContext {
    /// Working copy of the entry's metadata.
    pub meta: MetaData,
    /// Present for files once content is reachable; directories carry none.
    pub encryptor: Option<SelfEncryptor>,
    /// Set by any mutating operation; drives the close-path flush.
    pub content_changed: bool,
    /// Captured at open time.
    pub grandparent_id: Option<DirectoryId>,
    /// Captured at open time.
    pub parent_id: Option<DirectoryId>,
}

impl FileContext {
    /// Context for a freshly created entry. New files start dirty so an
    /// empty create still persists on close.
    pub fn create(name: impl Into<String>, is_directory: bool) -> Self {
        FileContext {
            meta: MetaData::new(name, is_directory),
            encryptor: None,
            content_changed: !is_directory,
            grandparent_id: None,
            parent_id: None,
        }
    }

    /// Context wrapping an existing entry's metadata.
    pub fn open(meta: MetaData) -> Self {
        FileContext {
            meta,
            encryptor: None,
            content_changed: false,
            grandparent_id: None,
            parent_id: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.meta.is_directory()
    }
}

/// Thread-safe table handing out `u64` handles for host user-contexts.
///
/// The drive keeps the authoritative owning structure here and passes only
/// the identifiers across the shim boundary.
pub struct HandleTable<T> {
    entries: DashMap<u64, T>,
    next_id: AtomicU64,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        HandleTable {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a value and return its new handle.
    pub fn insert(&self, value: T) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(id, value);
        id
    }

    pub fn get_mut(&self, id: u64) -> Option<RefMut<'_, u64, T>> {
        self.entries.get_mut(&id)
    }

    /// Remove a handle and return its value.
    pub fn remove(&self, id: u64) -> Option<T> {
        self.entries.remove(&id).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        HandleTable::new()
    }
}
