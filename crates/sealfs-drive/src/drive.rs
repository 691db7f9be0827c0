//! The drive: mount lifecycle plus the host callback surface.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use sealfs_core::encrypt::{DataMap, SelfEncryptor};
use sealfs_core::handler::DirectoryHandler;
use sealfs_core::meta_data::attr;
use sealfs_core::path as drive_path;
use sealfs_core::store::ChunkStore;
use sealfs_core::{DriveError, MetaData, ObjectId, Result, UserCredentials};

use crate::context::{FileContext, HandleTable};
use crate::enumeration::{matches_mask, DirectoryEnumerationContext};
use crate::shim::{HostShim, ShimConfig, ShimError};

/// Fixed volume identifier reported to the host.
pub const VOLUME_ID: u32 = 0x5EA1_F001;

/// How long a cooperative mount request may block.
const MOUNT_TIMEOUT: Duration = Duration::from_secs(30);
/// Back-off between unmount retries.
const UNMOUNT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// How long `wait_until_mounted` waits before giving up.
const WAIT_MOUNTED_TIMEOUT: Duration = Duration::from_secs(10);

/// Mount configuration for one drive instance.
///
/// A drive is one mounted volume; multiple volumes are multiple instances.
#[derive(Clone, Debug)]
pub struct DriveConfig {
    pub mount_dir: PathBuf,
    pub drive_name: String,
    /// Cooperative unmount window before switching to force.
    pub unmount_deadline: Duration,
}

impl DriveConfig {
    pub fn new(mount_dir: impl Into<PathBuf>, drive_name: impl Into<String>) -> Self {
        DriveConfig {
            mount_dir: mount_dir.into(),
            drive_name: drive_name.into(),
            unmount_deadline: Duration::from_secs(3),
        }
    }
}

/// Lifecycle of the mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveStage {
    Uninitialised,
    Initialised,
    Mounted,
    Unmounted,
    Cleaned,
}

/// The entry attributes a lookup or enumeration step hands to the host.
#[derive(Clone, Debug, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub creation_time: SystemTime,
    pub last_access_time: SystemTime,
    pub last_write_time: SystemTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub attributes: u32,
}

impl From<&MetaData> for FileInfo {
    fn from(meta: &MetaData) -> Self {
        FileInfo {
            name: meta.name.clone(),
            creation_time: meta.creation_time,
            last_access_time: meta.last_access_time,
            last_write_time: meta.last_write_time,
            end_of_file: meta.end_of_file,
            allocation_size: meta.allocation_size,
            attributes: meta.attributes,
        }
    }
}

/// Volume statistics, in host sector units.
#[derive(Clone, Copy, Debug)]
pub struct VolumeInfo {
    pub total_sectors: u64,
    pub free_sectors: u64,
    pub sector_size: u16,
}

/// Attribute overrides for `set_file_attributes`; zero / `None` fields are
/// left untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeUpdate {
    pub attributes: u32,
    pub creation_time: Option<SystemTime>,
    pub last_access_time: Option<SystemTime>,
    pub last_write_time: Option<SystemTime>,
}

/// A mounted encrypted drive.
///
/// Dispatches host callbacks into the directory handler and the per-file
/// self-encryptors. Callbacks arrive serialized (the drive requests that of
/// its shim at init); the auxiliary surface takes `api_lock` because other
/// in-process users call it off the callback thread.
pub struct Drive {
    handler: DirectoryHandler,
    store: Arc<dyn ChunkStore>,
    shim: Arc<dyn HostShim>,
    config: DriveConfig,
    stage: Mutex<DriveStage>,
    stage_changed: Condvar,
    files: HandleTable<FileContext>,
    enumerations: HandleTable<DirectoryEnumerationContext>,
    api_lock: Mutex<()>,
    max_path_length: AtomicU32,
}

impl Drive {
    /// Bootstrap the storage engine under `credentials` and wrap it in an
    /// unmounted drive.
    pub fn new(
        store: Arc<dyn ChunkStore>,
        shim: Arc<dyn HostShim>,
        config: DriveConfig,
        credentials: &UserCredentials,
    ) -> Result<Self> {
        let handler = DirectoryHandler::new(store.clone(), credentials)?;
        Ok(Drive {
            handler,
            store,
            shim,
            config,
            stage: Mutex::new(DriveStage::Uninitialised),
            stage_changed: Condvar::new(),
            files: HandleTable::new(),
            enumerations: HandleTable::new(),
            api_lock: Mutex::new(()),
            max_path_length: AtomicU32::new(0),
        })
    }

    /// The underlying directory handler, for in-process integrations that
    /// need direct listing access.
    pub fn directory_handler(&self) -> &DirectoryHandler {
        &self.handler
    }

    pub fn unique_user_id(&self) -> &ObjectId {
        self.handler.unique_user_id()
    }

    pub fn root_parent_id(&self) -> &ObjectId {
        self.handler.root_parent_id()
    }

    pub fn max_space(&self) -> u64 {
        self.store.max_disk_usage()
    }

    pub fn used_space(&self) -> u64 {
        self.store.current_disk_usage()
    }

    pub fn open_file_count(&self) -> usize {
        self.files.len()
    }

    pub fn max_path_length(&self) -> u32 {
        self.max_path_length.load(Ordering::Relaxed)
    }

    // ----- mount lifecycle ---------------------------------------------

    pub fn stage(&self) -> DriveStage {
        *self.stage.lock()
    }

    /// One-shot host configuration: register callbacks, set cache policy,
    /// register the storage as a disk.
    pub fn init(&self) -> Result<()> {
        {
            let stage = self.stage.lock();
            if *stage != DriveStage::Uninitialised {
                return Err(DriveError::InvalidParameter(format!(
                    "init from stage {stage:?}"
                )));
            }
        }
        self.shim.configure(&ShimConfig::default()).map_err(shim_io)?;
        self.shim.create_storage().map_err(shim_io)?;
        self.max_path_length
            .store(self.shim.max_path_length(), Ordering::Relaxed);
        *self.stage.lock() = DriveStage::Initialised;
        info!(drive = %self.config.drive_name, "drive initialised");
        Ok(())
    }

    /// Mount the media and surface it at the configured mounting point.
    pub fn mount(&self) -> Result<()> {
        {
            let stage = self.stage.lock();
            if *stage != DriveStage::Initialised {
                return Err(DriveError::InvalidParameter(format!(
                    "mount from stage {stage:?}"
                )));
            }
        }
        self.shim.mount_media(MOUNT_TIMEOUT).map_err(shim_io)?;
        self.shim
            .add_mounting_point(&self.config.mount_dir)
            .map_err(shim_io)?;
        self.set_mount_state(true);
        info!(mount_dir = %self.config.mount_dir.display(), "drive mounted");
        Ok(())
    }

    /// Unmount: cooperative with retries until the deadline, forced after.
    ///
    /// Host errors during the window are tolerated and retried with a
    /// 100 ms back-off.
    pub fn unmount(&self) {
        let started = Instant::now();
        while self.stage() == DriveStage::Mounted {
            let force = started.elapsed() >= self.config.unmount_deadline;
            if let Err(err) = self.shim.delete_mounting_points() {
                warn!(%err, "failed to delete mounting points");
            }
            match self.shim.unmount_media(force) {
                Ok(()) => self.set_mount_state(false),
                Err(err) => {
                    debug!(%err, force, "unmount refused, retrying");
                    std::thread::sleep(UNMOUNT_RETRY_INTERVAL);
                }
            }
        }
    }

    /// Drop the storage registration with the host.
    pub fn clean(&self) -> Result<()> {
        {
            let stage = self.stage.lock();
            if *stage == DriveStage::Cleaned {
                return Ok(());
            }
        }
        self.shim.delete_storage().map_err(shim_io)?;
        *self.stage.lock() = DriveStage::Cleaned;
        Ok(())
    }

    /// Signal from the host (or from this drive) that mount state changed.
    pub fn set_mount_state(&self, mounted: bool) {
        let mut stage = self.stage.lock();
        *stage = if mounted {
            DriveStage::Mounted
        } else {
            DriveStage::Unmounted
        };
        self.stage_changed.notify_all();
    }

    /// The host ejected the media.
    pub fn on_eject(&self) {
        self.set_mount_state(false);
    }

    /// Block until mounted; gives up after ten seconds.
    pub fn wait_until_mounted(&self) -> bool {
        let deadline = Instant::now() + WAIT_MOUNTED_TIMEOUT;
        let mut stage = self.stage.lock();
        while *stage != DriveStage::Mounted {
            if self
                .stage_changed
                .wait_until(&mut stage, deadline)
                .timed_out()
            {
                return *stage == DriveStage::Mounted;
            }
        }
        true
    }

    /// Block until unmounted. Does not time out.
    pub fn wait_until_unmounted(&self) {
        let mut stage = self.stage.lock();
        while *stage != DriveStage::Unmounted {
            self.stage_changed.wait(&mut stage);
        }
    }

    // ----- volume callbacks --------------------------------------------

    pub fn volume_info(&self) -> VolumeInfo {
        let sector_size = self.shim.sector_size().max(1);
        VolumeInfo {
            total_sectors: self.max_space() / u64::from(sector_size),
            free_sectors: (self.max_space() - self.used_space().min(self.max_space()))
                / u64::from(sector_size),
            sector_size,
        }
    }

    pub fn volume_label(&self) -> String {
        self.config.drive_name.clone()
    }

    pub fn volume_id(&self) -> u32 {
        VOLUME_ID
    }

    // ----- file callbacks ----------------------------------------------

    /// Create a file or directory and install its per-handle context.
    pub fn create(&self, relative: &str, attributes: u32) -> Result<u64> {
        let name = drive_path::file_name(relative)?;
        if drive_path::excluded_filename(name) {
            return Err(DriveError::InvalidParameter(format!(
                "name {name} is reserved"
            )));
        }
        let is_directory = attributes & attr::DIRECTORY != 0;
        let mut context = FileContext::create(name, is_directory);
        if attributes != 0 {
            context.meta.attributes = attributes;
        }

        let (grandparent_id, parent_id) = self.handler.add_element(relative, &context.meta)?;
        context.grandparent_id = Some(grandparent_id);
        context.parent_id = Some(parent_id);

        if !is_directory {
            let data_map = context.meta.data_map.clone().unwrap_or_default();
            context.encryptor = Some(SelfEncryptor::new(data_map, self.store.clone())?);
        }
        debug!(path = relative, is_directory, "created");
        Ok(self.files.insert(context))
    }

    /// Open an existing entry and install its per-handle context.
    ///
    /// The data map is cloned before the encryptor attaches, so mutations
    /// stay private to this handle until close re-serializes the parent.
    pub fn open(&self, relative: &str) -> Result<u64> {
        let (meta, grandparent_id, parent_id) = self.handler.get_meta_data(relative)?;
        let mut context = FileContext::open(meta);
        context.grandparent_id = Some(grandparent_id);
        context.parent_id = Some(parent_id);

        if !context.is_directory() {
            let data_map = context
                .meta
                .data_map
                .clone()
                .ok_or_else(|| DriveError::InvalidParameter(format!("{relative} has no content")))?;
            context.encryptor = Some(SelfEncryptor::new(data_map, self.store.clone())?);
        }
        Ok(self.files.insert(context))
    }

    /// Close a handle: reconcile sizes, flush if dirty, refresh the parent
    /// listing.
    pub fn close(&self, relative: &str, handle: u64) -> Result<()> {
        let mut context = self
            .files
            .remove(handle)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown handle {handle}")))?;
        if context.is_directory() {
            return Ok(());
        }
        context.meta.reconcile_sizes();
        if let Some(encryptor) = context.encryptor.as_mut() {
            encryptor.flush()?;
            if context.content_changed {
                context.meta.data_map = Some(encryptor.data_map().clone());
                self.update_parent(&context, relative)?;
            }
        }
        Ok(())
    }

    /// Resolve an entry for the host. Hidden entries are never exposed.
    pub fn get_file_info(&self, relative: &str) -> Result<FileInfo> {
        let name = drive_path::file_name(relative)?;
        if drive_path::is_hidden_name(name) {
            return Err(DriveError::InvalidParameter(format!(
                "{name} is in the reserved namespace"
            )));
        }
        let (mut meta, _, _) = self.handler.get_meta_data(relative)?;
        meta.reconcile_sizes();
        Ok(FileInfo::from(&meta))
    }

    /// One step of a directory scan.
    ///
    /// On restart (or the first call) the listing is resolved fresh and the
    /// cursor rewound. `mask == "*"` returns the next entry; any other mask
    /// advances until a name matches it. Hidden entries are skipped.
    /// Returns the enumeration handle and the found entry, if any.
    pub fn enumerate(
        &self,
        directory: &str,
        context: Option<u64>,
        mask: &str,
        restart: bool,
    ) -> Result<(u64, Option<FileInfo>)> {
        let exact_match = mask != "*";

        let context = match context {
            Some(id) if restart => {
                drop(self.enumerations.remove(id));
                None
            }
            other => other,
        };
        let id = match context {
            Some(id) => id,
            None => {
                let listing = self.handler.get_from_path(directory)?;
                self.enumerations
                    .insert(DirectoryEnumerationContext::new(listing))
            }
        };

        let mut entry = self
            .enumerations
            .get_mut(id)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown enumeration {id}")))?;

        let found = loop {
            match entry.directory.listing.get_child_and_increment_itr() {
                None => break None,
                Some(meta) if meta.is_hidden() => continue,
                Some(meta) => {
                    if !exact_match || matches_mask(mask, &meta.name) {
                        break Some(FileInfo::from(&meta));
                    }
                }
            }
        };
        entry.exact_match = exact_match;
        Ok((id, found))
    }

    /// Release an enumeration context.
    pub fn close_enumeration(&self, context: u64) {
        drop(self.enumerations.remove(context));
    }

    /// Shrink or grow a file's allocation.
    pub fn set_allocation_size(&self, relative: &str, handle: u64, size: u64) -> Result<()> {
        let mut entry = self
            .files
            .get_mut(handle)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown handle {handle}")))?;
        let context = &mut *entry;
        if context.meta.allocation_size == size {
            return Ok(());
        }
        self.check_capacity(size.saturating_sub(context.meta.allocation_size), relative)?;
        self.truncate_file(context, size)?;
        context.meta.allocation_size = size;
        if context.meta.end_of_file > size {
            context.meta.end_of_file = size;
        }
        if let Some(encryptor) = context.encryptor.as_mut() {
            encryptor.flush()?;
            context.meta.data_map = Some(encryptor.data_map().clone());
        }
        Ok(())
    }

    /// Move the logical end of a file.
    pub fn set_end_of_file(&self, relative: &str, handle: u64, size: u64) -> Result<()> {
        let mut entry = self
            .files
            .get_mut(handle)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown handle {handle}")))?;
        let context = &mut *entry;
        self.check_capacity(size.saturating_sub(context.meta.allocation_size), relative)?;
        self.truncate_file(context, size)?;
        context.meta.end_of_file = size;
        context.meta.allocation_size = size;
        if let Some(encryptor) = context.encryptor.as_mut() {
            encryptor.flush()?;
            context.meta.data_map = Some(encryptor.data_map().clone());
        }
        Ok(())
    }

    /// Overwrite attributes and timestamps; zero / absent values are kept.
    pub fn set_file_attributes(
        &self,
        relative: &str,
        handle: u64,
        update: &AttributeUpdate,
    ) -> Result<()> {
        let mut context = self
            .files
            .get_mut(handle)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown handle {handle}")))?;
        if update.attributes != 0 {
            context.meta.attributes = update.attributes;
        }
        if let Some(time) = update.creation_time {
            context.meta.creation_time = time;
        }
        if let Some(time) = update.last_access_time {
            context.meta.last_access_time = time;
        }
        if let Some(time) = update.last_write_time {
            context.meta.last_write_time = time;
        }
        context.content_changed = true;
        debug!(path = relative, "attributes updated");
        Ok(())
    }

    /// Whether delete may proceed: files always, directories only empty.
    pub fn can_file_be_deleted(&self, relative: &str) -> Result<bool> {
        self.handler.can_delete(relative)
    }

    /// Remove an entry; a deleted file's chunks are released.
    pub fn delete(&self, relative: &str) -> Result<()> {
        self.remove_file(relative)
    }

    /// Rename or move an entry; returns the space reclaimed from any
    /// displaced target.
    pub fn rename_or_move(&self, from: &str, to: &str) -> Result<u64> {
        let (mut meta, _, _) = self.handler.get_meta_data(from)?;
        let reclaimed = self.handler.rename_element(from, to, &mut meta)?;
        self.shim.notify_rename(from, to);
        Ok(reclaimed)
    }

    /// Read through the handle's encryptor; the count is clamped to the
    /// file's end-of-file. Stamps last-access time.
    pub fn read(&self, relative: &str, handle: u64, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut entry = self
            .files
            .get_mut(handle)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown handle {handle}")))?;
        let context = &mut *entry;
        let end_of_file = context.meta.end_of_file;
        let encryptor = context
            .encryptor
            .as_ref()
            .ok_or_else(|| DriveError::InvalidParameter(format!("{relative} is not readable")))?;
        let copied = encryptor.read(buf, offset)?;
        let clamped = (copied as u64).min(end_of_file.saturating_sub(offset)) as usize;

        context.meta.last_access_time = SystemTime::now();
        context.content_changed = true;
        Ok(clamped)
    }

    /// Write through the handle's encryptor, growing the recorded sizes and
    /// stamping last-write time.
    pub fn write(&self, relative: &str, handle: u64, data: &[u8], offset: u64) -> Result<usize> {
        let mut entry = self
            .files
            .get_mut(handle)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown handle {handle}")))?;
        let context = &mut *entry;
        let grown_end = offset.checked_add(data.len() as u64).ok_or_else(|| {
            DriveError::InvalidParameter(format!("write past representable size: {offset}"))
        })?;
        if grown_end > context.meta.end_of_file {
            self.check_capacity(grown_end - context.meta.end_of_file, relative)?;
        }
        let encryptor = context
            .encryptor
            .as_mut()
            .ok_or_else(|| DriveError::InvalidParameter(format!("{relative} is not writable")))?;
        encryptor.write(data, offset)?;

        if grown_end > context.meta.end_of_file {
            context.meta.end_of_file = grown_end;
        }
        if context.meta.allocation_size < context.meta.end_of_file {
            context.meta.allocation_size = context.meta.end_of_file;
        }
        context.meta.last_write_time = SystemTime::now();
        context.meta.status_change_time = context.meta.last_write_time;
        context.content_changed = true;
        Ok(data.len())
    }

    /// True iff the directory at `relative` has no children.
    pub fn is_directory_empty(&self, relative: &str) -> Result<bool> {
        Ok(self.handler.get_from_path(relative)?.listing.is_empty())
    }

    /// Flush a handle's pending writes; if dirty, refresh the parent
    /// listing as well.
    pub fn flush(&self, relative: &str, handle: u64) -> Result<()> {
        let mut entry = self
            .files
            .get_mut(handle)
            .ok_or_else(|| DriveError::InvalidParameter(format!("unknown handle {handle}")))?;
        let context = &mut *entry;
        let mut refreshed = None;
        if let Some(encryptor) = context.encryptor.as_mut() {
            encryptor.flush()?;
            if context.content_changed {
                context.meta.data_map = Some(encryptor.data_map().clone());
                refreshed = Some(context.meta.clone());
            }
        }
        drop(entry);
        if let Some(meta) = refreshed {
            self.handler
                .update_parent_directory_listing(drive_path::parent(relative), meta)?;
        }
        Ok(())
    }

    // ----- auxiliary surface -------------------------------------------
    //
    // Not host callbacks: other users of the drive call these off the
    // callback thread, hence the lock.

    /// Serialized data map of the file at `relative`, for transfer to
    /// another drive.
    pub fn get_data_map(&self, relative: &str) -> Result<Vec<u8>> {
        let _guard = self.api_lock.lock();
        self.read_data_map(relative)
    }

    /// Same as [`get_data_map`](Drive::get_data_map) for hidden files.
    pub fn get_data_map_hidden(&self, relative: &str) -> Result<Vec<u8>> {
        let _guard = self.api_lock.lock();
        self.read_data_map(relative)
    }

    /// Materialize a file at `relative` from a serialized data map
    /// received from another drive. The entry gets fresh attributes; sizes
    /// come from the materialized stream.
    pub fn insert_data_map(&self, relative: &str, serialised_data_map: &[u8]) -> Result<()> {
        let _guard = self.api_lock.lock();
        info!(path = relative, "insert data map");
        if relative.is_empty() {
            return Err(DriveError::InvalidParameter("empty path".into()));
        }
        let data_map = DataMap::parse(serialised_data_map)?;
        let name = drive_path::file_name(relative)?;
        if drive_path::excluded_filename(name) {
            return Err(DriveError::InvalidParameter(format!(
                "name {name} is reserved"
            )));
        }
        let mut meta = MetaData::new(name, false);
        let encryptor = SelfEncryptor::new(data_map.clone(), self.store.clone())?;
        meta.end_of_file = encryptor.size();
        meta.allocation_size = encryptor.size();
        meta.data_map = Some(data_map);
        self.handler.add_element(relative, &meta)?;
        Ok(())
    }

    /// Read a whole hidden file.
    pub fn read_hidden_file(&self, relative: &str) -> Result<Vec<u8>> {
        let _guard = self.api_lock.lock();
        self.require_hidden(relative)?;
        let (meta, _, _) = self.handler.get_meta_data(relative)?;
        let data_map = meta
            .data_map
            .ok_or_else(|| DriveError::InvalidParameter(format!("{relative} is a directory")))?;
        let encryptor = SelfEncryptor::new(data_map, self.store.clone())?;
        let mut content = vec![0u8; encryptor.size() as usize];
        let read = encryptor.read(&mut content, 0)?;
        content.truncate(read);
        Ok(content)
    }

    /// Create or overwrite a whole hidden file.
    pub fn write_hidden_file(
        &self,
        relative: &str,
        content: &[u8],
        overwrite_existing: bool,
    ) -> Result<()> {
        let _guard = self.api_lock.lock();
        self.require_hidden(relative)?;

        let mut meta = match self.handler.get_meta_data(relative) {
            Ok((existing, _, _)) => {
                if !overwrite_existing {
                    return Err(DriveError::AlreadyExists(relative.into()));
                }
                existing
            }
            Err(err) if err.is_not_found() => {
                let fresh = MetaData::new(drive_path::file_name(relative)?, false);
                self.handler.add_element(relative, &fresh)?;
                fresh
            }
            Err(err) => return Err(err),
        };

        let data_map = meta
            .data_map
            .clone()
            .ok_or_else(|| DriveError::InvalidParameter(format!("{relative} is a directory")))?;
        let mut encryptor = SelfEncryptor::new(data_map, self.store.clone())?;
        if encryptor.size() > content.len() as u64 {
            encryptor.truncate(content.len() as u64)?;
        }
        encryptor.write(content, 0)?;
        encryptor.flush()?;

        meta.data_map = Some(encryptor.data_map().clone());
        meta.end_of_file = content.len() as u64;
        meta.allocation_size = content.len() as u64;
        meta.update_last_write_time();
        self.handler
            .update_parent_directory_listing(drive_path::parent(relative), meta)
    }

    /// Remove a hidden file and release its chunks.
    pub fn delete_hidden_file(&self, relative: &str) -> Result<()> {
        let _guard = self.api_lock.lock();
        self.require_hidden(relative)?;
        self.remove_file(relative)
    }

    /// Names of the hidden files directly under `relative`.
    pub fn search_hidden_files(&self, relative: &str) -> Result<Vec<String>> {
        let _guard = self.api_lock.lock();
        Ok(self
            .handler
            .get_from_path(relative)?
            .listing
            .hidden_child_names())
    }

    /// The notes attached to an entry, in order.
    pub fn get_notes(&self, relative: &str) -> Result<Vec<String>> {
        let _guard = self.api_lock.lock();
        let (meta, _, _) = self.handler.get_meta_data(relative)?;
        Ok(meta.notes)
    }

    /// Append one note to an entry.
    pub fn add_note(&self, relative: &str, note: impl Into<String>) -> Result<()> {
        let _guard = self.api_lock.lock();
        let (mut meta, _, _) = self.handler.get_meta_data(relative)?;
        meta.notes.push(note.into());
        self.handler
            .update_parent_directory_listing(drive_path::parent(relative), meta)
    }

    // ----- internals ----------------------------------------------------

    fn read_data_map(&self, relative: &str) -> Result<Vec<u8>> {
        if relative.is_empty() {
            return Err(DriveError::InvalidParameter("empty path".into()));
        }
        let (meta, _, _) = self.handler.get_meta_data(relative)?;
        let data_map = meta
            .data_map
            .ok_or_else(|| DriveError::InvalidParameter(format!("{relative} is a directory")))?;
        data_map.serialise()
    }

    fn remove_file(&self, relative: &str) -> Result<()> {
        let meta = self.handler.delete_element(relative)?;
        if let Some(data_map) = meta.data_map {
            let mut encryptor = SelfEncryptor::new(data_map, self.store.clone())?;
            encryptor.delete_all_chunks()?;
        }
        Ok(())
    }

    fn update_parent(&self, context: &FileContext, relative: &str) -> Result<()> {
        self.handler
            .update_parent_directory_listing(drive_path::parent(relative), context.meta.clone())
    }

    /// Ensure the handle has an encryptor, then truncate through it.
    fn truncate_file(&self, context: &mut FileContext, size: u64) -> Result<()> {
        if context.encryptor.is_none() {
            let data_map = context
                .meta
                .data_map
                .clone()
                .ok_or_else(|| DriveError::InvalidParameter("not a file".into()))?;
            context.encryptor = Some(SelfEncryptor::new(data_map, self.store.clone())?);
        }
        if let Some(encryptor) = context.encryptor.as_mut() {
            encryptor.truncate(size)?;
        }
        context.content_changed = true;
        Ok(())
    }

    fn check_capacity(&self, additional: u64, relative: &str) -> Result<()> {
        if additional > 0 && self.used_space() + additional > self.max_space() {
            warn!(path = relative, additional, "chunk store budget exhausted");
            return Err(DriveError::CapacityExceeded);
        }
        Ok(())
    }

    fn require_hidden(&self, relative: &str) -> Result<()> {
        if relative.is_empty() || !drive_path::is_hidden_name(drive_path::file_name(relative)?) {
            return Err(DriveError::InvalidParameter(format!(
                "{relative} is not in the hidden namespace"
            )));
        }
        Ok(())
    }
}

fn shim_io(err: ShimError) -> DriveError {
    DriveError::IoFailure(err.to_string())
}
