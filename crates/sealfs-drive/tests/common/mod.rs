//! Shared harness for the drive integration suites.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sealfs_core::store::{ChunkStore, MemoryChunkStore};
use sealfs_core::UserCredentials;
use sealfs_drive::{Drive, DriveConfig, HostShim, ShimConfig, ShimError};

/// A scriptable in-process host shim.
///
/// By default every call succeeds; tests can make unmount refuse a number
/// of times, or refuse until forced, to exercise the retry loop.
#[derive(Default)]
pub struct TestShim {
    pub unmount_refusals: AtomicU32,
    pub refuse_until_forced: AtomicBool,
    pub forced_unmounts: AtomicU32,
    pub renames: Mutex<Vec<(String, String)>>,
    pub mounting_points: Mutex<Vec<PathBuf>>,
}

impl TestShim {
    pub fn refusing(refusals: u32) -> Self {
        let shim = TestShim::default();
        shim.unmount_refusals.store(refusals, Ordering::Relaxed);
        shim
    }

    pub fn stubborn() -> Self {
        let shim = TestShim::default();
        shim.refuse_until_forced.store(true, Ordering::Relaxed);
        shim
    }
}

impl HostShim for TestShim {
    fn configure(&self, config: &ShimConfig) -> Result<(), ShimError> {
        assert!(config.serialized_callbacks);
        Ok(())
    }

    fn create_storage(&self) -> Result<(), ShimError> {
        Ok(())
    }

    fn mount_media(&self, _timeout: Duration) -> Result<(), ShimError> {
        Ok(())
    }

    fn add_mounting_point(&self, mount_point: &Path) -> Result<(), ShimError> {
        self.mounting_points
            .lock()
            .unwrap()
            .push(mount_point.to_path_buf());
        Ok(())
    }

    fn delete_mounting_points(&self) -> Result<(), ShimError> {
        self.mounting_points.lock().unwrap().clear();
        Ok(())
    }

    fn unmount_media(&self, force: bool) -> Result<(), ShimError> {
        if force {
            self.forced_unmounts.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        if self.refuse_until_forced.load(Ordering::Relaxed) {
            return Err(ShimError::MountFailed("busy".into()));
        }
        let remaining = self.unmount_refusals.load(Ordering::Relaxed);
        if remaining > 0 {
            self.unmount_refusals.store(remaining - 1, Ordering::Relaxed);
            return Err(ShimError::MountFailed("busy".into()));
        }
        Ok(())
    }

    fn delete_storage(&self) -> Result<(), ShimError> {
        Ok(())
    }

    fn sector_size(&self) -> u16 {
        512
    }

    fn max_path_length(&self) -> u32 {
        32 * 1024
    }

    fn notify_rename(&self, from: &str, to: &str) {
        self.renames
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string()));
    }
}

pub fn credentials() -> UserCredentials {
    UserCredentials::new("keyword", "1234", "password")
}

/// Everything a drive test needs in one place.
pub struct Harness {
    pub store: Arc<MemoryChunkStore>,
    pub shim: Arc<TestShim>,
    pub drive: Drive,
}

impl Harness {
    /// Bootstrap a fresh drive over an in-memory store.
    pub fn new() -> Self {
        Harness::with_shim_and_store(
            Arc::new(TestShim::default()),
            Arc::new(MemoryChunkStore::default()),
        )
    }

    pub fn with_shim(shim: Arc<TestShim>) -> Self {
        Harness::with_shim_and_store(shim, Arc::new(MemoryChunkStore::default()))
    }

    pub fn with_shim_and_store(shim: Arc<TestShim>, store: Arc<MemoryChunkStore>) -> Self {
        std::env::set_var("SEALFS_FAST_KDF", "1");
        let chunk_store: Arc<dyn ChunkStore> = store.clone();
        let mut config = DriveConfig::new("/tmp/sealfs-test", "TestDrive");
        config.unmount_deadline = Duration::from_millis(400);
        let drive = Drive::new(chunk_store, shim.clone(), config, &credentials())
            .expect("bootstrap failed");
        Harness { store, shim, drive }
    }

    /// Create a file, write `content`, and close the handle.
    pub fn write_file(&self, path: &str, content: &[u8]) {
        let handle = self.drive.create(path, 0).expect("create failed");
        if !content.is_empty() {
            self.drive
                .write(path, handle, content, 0)
                .expect("write failed");
        }
        self.drive.close(path, handle).expect("close failed");
    }

    /// Open a file, read it fully, and close the handle.
    pub fn read_file(&self, path: &str) -> Vec<u8> {
        let handle = self.drive.open(path).expect("open failed");
        let size = self.drive.get_file_info(path).expect("stat failed").end_of_file;
        let mut content = vec![0u8; size as usize];
        let read = self
            .drive
            .read(path, handle, &mut content, 0)
            .expect("read failed");
        content.truncate(read);
        self.drive.close(path, handle).expect("close failed");
        content
    }

    /// Create a directory entry.
    pub fn make_directory(&self, path: &str) {
        let handle = self
            .drive
            .create(path, sealfs_core::meta_data::attr::DIRECTORY)
            .expect("mkdir failed");
        self.drive.close(path, handle).expect("close failed");
    }

    /// Collect every name an unmasked enumeration yields.
    pub fn enumerate_all(&self, directory: &str) -> Vec<String> {
        let mut names = Vec::new();
        let mut context = None;
        let mut restart = true;
        loop {
            let (id, entry) = self
                .drive
                .enumerate(directory, context, "*", restart)
                .expect("enumerate failed");
            restart = false;
            context = Some(id);
            match entry {
                Some(info) => names.push(info.name),
                None => break,
            }
        }
        if let Some(id) = context {
            self.drive.close_enumeration(id);
        }
        names
    }
}
