//! Binds directory listings to the chunk store and owns the bootstrap.

use std::sync::Arc;
use std::time::SystemTime;

use ring::signature::Ed25519KeyPair;
use tracing::{debug, info, warn};

use crate::encrypt::{decrypt_data_map, encrypt_data_map, DataMap, OwnerDirectory, SelfEncryptor};
use crate::error::{DriveError, Result};
use crate::id::DirectoryId;
use crate::id::ObjectId;
use crate::listing::{DirectoryData, DirectoryListing};
use crate::meta_data::{collate, MetaData};
use crate::path;
use crate::session::{self, Session, UserCredentials};
use crate::store::ChunkStore;

/// Loads, stores and mutates directory listings, and walks the path
/// hierarchy from the bootstrap root chain.
///
/// Construction performs the bootstrap: the deterministic MID key is probed
/// and either a fresh session is minted and sealed (first run) or the
/// existing one is recovered under the supplied password (subsequent runs).
///
/// The handler carries no interior locking; callers rely on the host's
/// serialized-callback guarantee.
pub struct DirectoryHandler {
    store: Arc<dyn ChunkStore>,
    session: Session,
    owner_key: Ed25519KeyPair,
}

impl DirectoryHandler {
    pub fn new(store: Arc<dyn ChunkStore>, credentials: &UserCredentials) -> Result<Self> {
        let mid_key = session::mid_key(credentials);
        match store.get(&mid_key) {
            Ok(mid_blob) => Self::recover(store, credentials, &mid_blob),
            Err(err) if err.is_not_found() => Self::first_run(store, credentials, &mid_key),
            Err(err) => Err(err),
        }
    }

    /// First mount ever for these secrets: mint and persist everything.
    fn first_run(
        store: Arc<dyn ChunkStore>,
        credentials: &UserCredentials,
        mid_key: &ObjectId,
    ) -> Result<Self> {
        info!("no session found for these credentials, creating a fresh drive");
        let session = Session::create()?;
        let owner_key = session.owner_key()?;

        let tmid_name = ObjectId::random();
        let sealed_session = session::seal_session(&session, credentials)?;
        let tmid_key = session::tmid_key(credentials, &tmid_name);
        store
            .put(&tmid_key, &sealed_session)
            .map_err(uninitialised_on_capacity)?;
        let pointer = session::encrypt_tmid_pointer(credentials, &tmid_name)?;
        store
            .put(mid_key, &pointer)
            .map_err(uninitialised_on_capacity)?;

        let handler = DirectoryHandler {
            store,
            session,
            owner_key,
        };

        let root_meta = MetaData::new(path::ROOT_SENTINEL, true);
        let root_id = root_meta
            .directory_id
            .ok_or_else(|| DriveError::Uninitialised("root entry lacks an identity".into()))?;

        let mut root_parent = DirectoryData::new(
            *handler.session.unique_user_id(),
            DirectoryListing::new(*handler.session.root_parent_id()),
        );
        root_parent.listing.add_child(root_meta)?;
        let root = DirectoryData::new(
            *handler.session.root_parent_id(),
            DirectoryListing::new(root_id),
        );

        handler
            .put_to_storage(&root_parent)
            .map_err(uninitialised_on_capacity)?;
        handler
            .put_to_storage(&root)
            .map_err(uninitialised_on_capacity)?;
        Ok(handler)
    }

    /// Subsequent mount: recover the session through the MID/TMID chain.
    fn recover(
        store: Arc<dyn ChunkStore>,
        credentials: &UserCredentials,
        mid_blob: &[u8],
    ) -> Result<Self> {
        let tmid_name = session::decrypt_tmid_pointer(credentials, mid_blob)?;
        let tmid_key = session::tmid_key(credentials, &tmid_name);
        let sealed_session = store
            .get(&tmid_key)
            .map_err(|_| DriveError::InvalidCredentials)?;
        let session = session::unseal_session(&sealed_session, credentials)?;
        let owner_key = session.owner_key()?;
        debug!(user = %session.unique_user_id(), "session recovered");
        Ok(DirectoryHandler {
            store,
            session,
            owner_key,
        })
    }

    pub fn unique_user_id(&self) -> &ObjectId {
        self.session.unique_user_id()
    }

    pub fn root_parent_id(&self) -> &ObjectId {
        self.session.root_parent_id()
    }

    pub fn store(&self) -> Arc<dyn ChunkStore> {
        self.store.clone()
    }

    /// Walk `relative` from the root chain to its directory listing.
    ///
    /// The empty path resolves to the synthetic root-parent listing; `/` is
    /// the drive root.
    pub fn get_from_path(&self, relative: &str) -> Result<DirectoryData> {
        let mut directory =
            self.retrieve_from_storage(self.session.unique_user_id(), self.session.root_parent_id())?;
        for segment in path::segments(relative) {
            let child = directory.listing.get_child(segment)?;
            let child_id = child.directory_id.ok_or_else(|| {
                DriveError::InvalidParameter(format!("{segment} is not a directory"))
            })?;
            directory = self.retrieve_from_storage(directory.listing.directory_id(), &child_id)?;
        }
        Ok(directory)
    }

    /// Resolve an entry's metadata plus the ids of its parent and that
    /// parent's parent.
    pub fn get_meta_data(
        &self,
        relative: &str,
    ) -> Result<(MetaData, DirectoryId, DirectoryId)> {
        let parent = self.get_from_path(path::parent(relative))?;
        let meta = parent.listing.get_child(path::file_name(relative)?)?.clone();
        Ok((meta, parent.parent_id, *parent.listing.directory_id()))
    }

    /// Add a file or directory entry under its parent listing.
    ///
    /// For directories a fresh empty listing is persisted first, so a later
    /// failure only requires dropping the in-memory child insertion (and
    /// removing the just-stored listing) to roll back. Returns the
    /// grandparent and parent directory ids.
    pub fn add_element(
        &self,
        relative: &str,
        meta: &MetaData,
    ) -> Result<(DirectoryId, DirectoryId)> {
        let (mut grandparent, mut parent, mut parent_meta) =
            self.parent_and_grandparent(relative)?;

        parent.listing.add_child(meta.clone())?;

        if let Some(child_id) = meta.directory_id {
            let fresh = DirectoryData::new(
                *parent.listing.directory_id(),
                DirectoryListing::new(child_id),
            );
            self.put_to_storage(&fresh)?;
        }

        parent_meta.update_last_write_time();
        if meta.is_directory() {
            parent_meta.nlink += 1;
        }
        grandparent.listing.update_child(parent_meta, true)?;

        if let Err(err) = self.put_to_storage(&parent) {
            // The in-memory insertion dies with this call; only the fresh
            // child listing needs explicit removal.
            if let Some(child_id) = meta.directory_id {
                let _ = self.delete_stored(parent.listing.directory_id(), &child_id);
            }
            return Err(err);
        }
        self.put_to_storage(&grandparent)?;

        Ok((
            *grandparent.listing.directory_id(),
            *parent.listing.directory_id(),
        ))
    }

    /// Remove an entry, deleting its stored listing first if it is a
    /// directory, and return its metadata so the caller can release file
    /// chunks.
    pub fn delete_element(&self, relative: &str) -> Result<MetaData> {
        let (mut grandparent, mut parent, mut parent_meta) =
            self.parent_and_grandparent(relative)?;
        let name = path::file_name(relative)?;
        let meta = parent.listing.get_child(name)?.clone();

        if let Some(child_id) = meta.directory_id {
            self.delete_stored(parent.listing.directory_id(), &child_id)?;
        }

        parent.listing.remove_child(name)?;
        parent_meta.update_last_write_time();
        if meta.is_directory() {
            parent_meta.nlink = parent_meta.nlink.saturating_sub(1);
        }
        if let Err(err) = grandparent.listing.update_child(parent_meta, true) {
            warn!(%err, "parent entry missing from grandparent during delete");
        }

        self.put_to_storage(&parent)?;
        self.put_to_storage(&grandparent)?;
        Ok(meta)
    }

    /// Rename or move an entry. Any displaced target is removed and its
    /// allocated size returned as reclaimed space.
    pub fn rename_element(
        &self,
        old_relative: &str,
        new_relative: &str,
        meta: &mut MetaData,
    ) -> Result<u64> {
        if old_relative == new_relative {
            return Ok(0);
        }
        if collate(path::parent(old_relative)) == collate(path::parent(new_relative)) {
            self.rename_same_parent(old_relative, new_relative, meta)
        } else {
            self.rename_different_parent(old_relative, new_relative, meta)
        }
    }

    /// Reload a parent listing, replace one child's metadata, persist.
    pub fn update_parent_directory_listing(
        &self,
        parent_path: &str,
        meta: MetaData,
    ) -> Result<()> {
        let mut parent = self.get_from_path(parent_path)?;
        parent.listing.update_child(meta, true)?;
        self.put_to_storage(&parent)
    }

    /// True iff the entry is a file, or a directory whose listing is empty.
    pub fn can_delete(&self, relative: &str) -> Result<bool> {
        let parent = self.get_from_path(path::parent(relative))?;
        let meta = parent.listing.get_child(path::file_name(relative)?)?;
        if !meta.is_directory() {
            return Ok(true);
        }
        let directory = self.get_from_path(relative)?;
        Ok(directory.listing.is_empty())
    }

    fn rename_same_parent(
        &self,
        old_relative: &str,
        new_relative: &str,
        meta: &mut MetaData,
    ) -> Result<u64> {
        let (mut grandparent, mut parent, mut parent_meta) =
            self.parent_and_grandparent(old_relative)?;
        let old_name = path::file_name(old_relative)?;
        let new_name = path::file_name(new_relative)?;

        let previous_write = meta.last_write_time;
        let previous_change = meta.status_change_time;
        meta.update_last_write_time();

        let mut reclaimed = 0;
        if collate(old_name) == collate(new_name) {
            // Case-only rename; the "existing target" is the entry itself.
            parent.listing.remove_child(old_name)?;
            meta.name = new_name.to_string();
            parent.listing.add_child(meta.clone())?;
        } else if !parent.listing.has_child(new_name) {
            parent.listing.remove_child(old_name)?;
            meta.name = new_name.to_string();
            parent.listing.add_child(meta.clone())?;
        } else {
            let target = match parent.listing.get_child(new_name) {
                Ok(target) => target.clone(),
                Err(err) => {
                    meta.last_write_time = previous_write;
                    meta.status_change_time = previous_change;
                    return Err(err);
                }
            };
            reclaimed = target.allocated_size();
            self.release_displaced_target(parent.listing.directory_id(), &target)?;
            parent.listing.remove_child(new_name)?;
            parent.listing.remove_child(old_name)?;
            meta.name = new_name.to_string();
            parent.listing.add_child(meta.clone())?;
        }

        parent_meta.last_write_time = meta.last_write_time;
        parent_meta.status_change_time = meta.status_change_time;
        self.put_to_storage(&parent)?;

        if let Err(err) = grandparent.listing.update_child(parent_meta, true) {
            warn!(%err, "parent entry missing from grandparent during rename");
        }
        self.put_to_storage(&grandparent)?;
        Ok(reclaimed)
    }

    fn rename_different_parent(
        &self,
        old_relative: &str,
        new_relative: &str,
        meta: &mut MetaData,
    ) -> Result<u64> {
        let previous_write = meta.last_write_time;
        let previous_change = meta.status_change_time;
        meta.update_last_write_time();

        // A moved directory's envelope is bound to its parent, so the
        // listing is deleted and re-stored under the new parent id before
        // either parent listing changes.
        if meta.is_directory() {
            let directory = self.get_from_path(old_relative)?;
            let new_parent = self.get_from_path(path::parent(new_relative))?;
            self.delete_stored(&directory.parent_id, directory.listing.directory_id())?;
            let rebound = DirectoryData::new(
                *new_parent.listing.directory_id(),
                directory.listing,
            );
            self.put_to_storage(&rebound)?;
        }

        // The two parents (and their grandparents) can alias one another
        // when the move crosses levels of one subtree, so each step reloads
        // the current listing state rather than holding four stale copies.
        let mut old_parent = self.get_from_path(path::parent(old_relative))?;
        old_parent.listing.remove_child(path::file_name(old_relative)?)?;
        self.put_to_storage(&old_parent)?;

        let mut new_parent = self.get_from_path(path::parent(new_relative))?;
        let new_name = path::file_name(new_relative)?;
        let mut reclaimed = 0;
        if new_parent.listing.has_child(new_name) {
            let target = match new_parent.listing.get_child(new_name) {
                Ok(target) => target.clone(),
                Err(err) => {
                    meta.last_write_time = previous_write;
                    meta.status_change_time = previous_change;
                    return Err(err);
                }
            };
            reclaimed = target.allocated_size();
            self.release_displaced_target(new_parent.listing.directory_id(), &target)?;
            new_parent.listing.remove_child(new_name)?;
        }
        meta.name = new_name.to_string();
        new_parent.listing.add_child(meta.clone())?;
        self.put_to_storage(&new_parent)?;

        let nlink_delta = if meta.is_directory() { -1 } else { 0 };
        self.stamp_parent_entry(path::parent(old_relative), meta.last_write_time, nlink_delta);
        let nlink_delta = if meta.is_directory() { 1 } else { 0 };
        self.stamp_parent_entry(path::parent(new_relative), meta.last_write_time, nlink_delta);

        Ok(reclaimed)
    }

    /// Refresh a directory's own entry (timestamps, link count) in its
    /// parent listing. Best effort; a failure here never fails the rename.
    fn stamp_parent_entry(&self, parent_path: &str, when: SystemTime, nlink_delta: i32) {
        let result = (|| -> Result<()> {
            let mut grandparent = self.get_from_path(path::parent(parent_path))?;
            let name = path::file_name(parent_path)?;
            let mut entry = grandparent.listing.get_child(name)?.clone();
            entry.last_write_time = when;
            entry.status_change_time = when;
            if nlink_delta > 0 {
                entry.nlink = entry.nlink.saturating_add(nlink_delta as u32);
            } else {
                entry.nlink = entry.nlink.saturating_sub(nlink_delta.unsigned_abs());
            }
            grandparent.listing.update_child(entry, true)?;
            self.put_to_storage(&grandparent)
        })();
        if let Err(err) = result {
            warn!(parent = parent_path, %err, "failed to refresh parent entry after rename");
        }
    }

    /// A displaced rename target must not leave orphans behind: directory
    /// listings and file chunks are released before the entry is dropped.
    fn release_displaced_target(
        &self,
        parent_id: &DirectoryId,
        target: &MetaData,
    ) -> Result<()> {
        if let Some(dir_id) = target.directory_id {
            self.delete_stored(parent_id, &dir_id)?;
        } else if let Some(data_map) = target.data_map.clone() {
            let mut encryptor = SelfEncryptor::new(data_map, self.store.clone())?;
            encryptor.delete_all_chunks()?;
        }
        Ok(())
    }

    fn parent_and_grandparent(
        &self,
        relative: &str,
    ) -> Result<(DirectoryData, DirectoryData, MetaData)> {
        let parent_path = path::parent(relative);
        let grandparent = self.get_from_path(path::parent(parent_path))?;
        let parent_name = path::file_name(parent_path)?;
        let parent_meta = grandparent.listing.get_child(parent_name)?.clone();
        if !parent_meta.is_directory() {
            return Err(DriveError::InvalidParameter(format!(
                "{parent_path} is not a directory"
            )));
        }
        let parent = self.get_from_path(parent_path)?;
        Ok((grandparent, parent, parent_meta))
    }

    /// Load a listing: fetch its envelope, verify the owner signature,
    /// decrypt the data map at this tree position, and read the serialized
    /// listing back through a self-encryptor.
    pub fn retrieve_from_storage(
        &self,
        parent_id: &DirectoryId,
        directory_id: &DirectoryId,
    ) -> Result<DirectoryData> {
        let blob = self.store.get(directory_id)?;
        let envelope = OwnerDirectory::parse(&blob)?;
        let encrypted = envelope.verify_and_open(self.session.owner_public_key())?;
        let data_map = decrypt_data_map(parent_id, directory_id, &encrypted)?;

        let encryptor = SelfEncryptor::new(data_map, self.store.clone())?;
        let mut serialized = vec![0u8; encryptor.size() as usize];
        let read = encryptor.read(&mut serialized, 0)?;
        if read != serialized.len() {
            return Err(DriveError::IoFailure(format!(
                "short read of listing {directory_id}"
            )));
        }
        let listing = DirectoryListing::parse(&serialized, directory_id)?;
        Ok(DirectoryData::new(*parent_id, listing))
    }

    /// Persist a listing: serialize, self-encrypt, seal the data map at
    /// this tree position, sign, and put under the listing's own id.
    ///
    /// Chunks of the previous serialization that the new one no longer
    /// references are released afterwards.
    pub fn put_to_storage(&self, directory: &DirectoryData) -> Result<()> {
        let directory_id = *directory.listing.directory_id();
        let stale_map = self.stored_data_map(&directory.parent_id, &directory_id);

        let serialized = directory.listing.serialise()?;
        let mut encryptor = SelfEncryptor::new(DataMap::default(), self.store.clone())?;
        encryptor.write(&serialized, 0)?;
        encryptor.flush()?;

        let encrypted = encrypt_data_map(&directory.parent_id, &directory_id, encryptor.data_map())?;
        let envelope = OwnerDirectory::seal(encrypted, &self.owner_key);
        self.store.put(&directory_id, &envelope.serialise()?)?;

        if let Some(stale) = stale_map {
            for chunk in &stale.chunks {
                let still_used = encryptor
                    .data_map()
                    .chunks
                    .iter()
                    .any(|fresh| fresh.name == chunk.name);
                if !still_used {
                    if let Err(err) = self.store.delete(&chunk.name) {
                        if !err.is_not_found() {
                            warn!(%err, "failed to release stale listing chunk");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Delete a stored listing: release every chunk it occupies, then drop
    /// its envelope.
    pub fn delete_stored(
        &self,
        parent_id: &DirectoryId,
        directory_id: &DirectoryId,
    ) -> Result<()> {
        let blob = self.store.get(directory_id)?;
        let envelope = OwnerDirectory::parse(&blob)?;
        let encrypted = envelope.verify_and_open(self.session.owner_public_key())?;
        let data_map = decrypt_data_map(parent_id, directory_id, &encrypted)?;
        let mut encryptor = SelfEncryptor::new(data_map, self.store.clone())?;
        encryptor.delete_all_chunks()?;
        self.store.delete(directory_id)
    }

    /// The previous data map stored for a listing, if one exists and still
    /// decrypts at this position.
    fn stored_data_map(
        &self,
        parent_id: &DirectoryId,
        directory_id: &DirectoryId,
    ) -> Option<DataMap> {
        let blob = self.store.get(directory_id).ok()?;
        let envelope = OwnerDirectory::parse(&blob).ok()?;
        let encrypted = envelope
            .verify_and_open(self.session.owner_public_key())
            .ok()?;
        decrypt_data_map(parent_id, directory_id, &encrypted).ok()
    }
}

fn uninitialised_on_capacity(err: DriveError) -> DriveError {
    match err {
        DriveError::CapacityExceeded => {
            DriveError::Uninitialised("chunk store full during bootstrap".into())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryChunkStore;

    fn setup() -> (Arc<MemoryChunkStore>, UserCredentials) {
        std::env::set_var("SEALFS_FAST_KDF", "1");
        (
            Arc::new(MemoryChunkStore::default()),
            UserCredentials::new("keyword", "1234", "password"),
        )
    }

    fn handler(store: &Arc<MemoryChunkStore>, credentials: &UserCredentials) -> DirectoryHandler {
        let store: Arc<dyn ChunkStore> = store.clone();
        DirectoryHandler::new(store, credentials).unwrap()
    }

    #[test]
    fn first_run_creates_bootstrap_blobs() {
        let (store, credentials) = setup();
        assert!(store.is_empty());
        let built = handler(&store, &credentials);

        // MID, TMID, root-parent envelope, root envelope.
        assert_eq!(store.len(), 4);
        assert!(store.has(&session::mid_key(&credentials)));
        assert!(store.has(built.root_parent_id()));
    }

    #[test]
    fn second_run_recovers_the_same_identities() {
        let (store, credentials) = setup();
        let first = handler(&store, &credentials);
        let blobs_after_first = store.len();

        let second = handler(&store, &credentials);
        assert_eq!(first.unique_user_id(), second.unique_user_id());
        assert_eq!(first.root_parent_id(), second.root_parent_id());
        assert_eq!(store.len(), blobs_after_first);
    }

    #[test]
    fn wrong_password_fails_recovery() {
        let (store, credentials) = setup();
        handler(&store, &credentials);
        let wrong = UserCredentials::new("keyword", "1234", "wrong");
        let store: Arc<dyn ChunkStore> = store;
        assert!(matches!(
            DirectoryHandler::new(store, &wrong),
            Err(DriveError::InvalidCredentials)
        ));
    }

    #[test]
    fn root_resolves_to_empty_listing() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        let root = handler.get_from_path("/").unwrap();
        assert!(root.listing.is_empty());
        assert_eq!(root.parent_id, *handler.root_parent_id());
    }

    #[test]
    fn add_element_persists_and_resolves() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);

        let dir_meta = MetaData::new("docs", true);
        let (grandparent_id, parent_id) = handler.add_element("/docs", &dir_meta).unwrap();
        assert_eq!(grandparent_id, *handler.root_parent_id());

        let root = handler.get_from_path("/").unwrap();
        assert_eq!(*root.listing.directory_id(), parent_id);
        assert!(root.listing.has_child("docs"));

        let docs = handler.get_from_path("/docs").unwrap();
        assert!(docs.listing.is_empty());
        assert_eq!(docs.parent_id, parent_id);

        let file_meta = MetaData::new("a.txt", false);
        handler.add_element("/docs/a.txt", &file_meta).unwrap();
        let docs = handler.get_from_path("/docs").unwrap();
        assert!(docs.listing.has_child("a.txt"));
    }

    #[test]
    fn add_element_increments_parent_nlink() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/docs", &MetaData::new("docs", true)).unwrap();

        let root_parent = handler.get_from_path("").unwrap();
        let root_entry = root_parent.listing.get_child("/").unwrap();
        assert_eq!(root_entry.nlink, 2);
    }

    #[test]
    fn duplicate_add_fails() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/a", &MetaData::new("a", false)).unwrap();
        assert!(matches!(
            handler.add_element("/A", &MetaData::new("A", false)),
            Err(DriveError::AlreadyExists(_))
        ));
    }

    #[test]
    fn delete_element_removes_stored_listing() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        let meta = MetaData::new("docs", true);
        let dir_id = meta.directory_id.unwrap();
        handler.add_element("/docs", &meta).unwrap();
        assert!(store.has(&dir_id));

        let removed = handler.delete_element("/docs").unwrap();
        assert_eq!(removed.directory_id, Some(dir_id));
        assert!(!store.has(&dir_id));
        assert!(!handler.get_from_path("/").unwrap().listing.has_child("docs"));
    }

    #[test]
    fn rename_same_parent_moves_the_entry() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/old.txt", &MetaData::new("old.txt", false)).unwrap();

        let mut meta = handler.get_meta_data("/old.txt").unwrap().0;
        let reclaimed = handler.rename_element("/old.txt", "/new.txt", &mut meta).unwrap();
        assert_eq!(reclaimed, 0);
        assert_eq!(meta.name, "new.txt");

        let root = handler.get_from_path("/").unwrap();
        assert!(!root.listing.has_child("old.txt"));
        assert!(root.listing.has_child("new.txt"));
    }

    #[test]
    fn rename_reports_reclaimed_space_of_displaced_target() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/a", &MetaData::new("a", false)).unwrap();
        let mut target = MetaData::new("b", false);
        target.end_of_file = 512;
        target.allocation_size = 512;
        handler.add_element("/b", &target).unwrap();

        let mut meta = handler.get_meta_data("/a").unwrap().0;
        let reclaimed = handler.rename_element("/a", "/b", &mut meta).unwrap();
        assert_eq!(reclaimed, 512);

        let root = handler.get_from_path("/").unwrap();
        assert!(!root.listing.has_child("a"));
        assert!(root.listing.has_child("b"));
        assert_eq!(root.listing.len(), 1);
    }

    #[test]
    fn rename_across_parents_rebinds_the_envelope() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/d", &MetaData::new("d", true)).unwrap();
        handler.add_element("/e", &MetaData::new("e", true)).unwrap();
        handler.add_element("/d/f", &MetaData::new("f", false)).unwrap();

        let mut meta = handler.get_meta_data("/d/f").unwrap().0;
        handler.rename_element("/d/f", "/e/f", &mut meta).unwrap();

        assert!(!handler.get_from_path("/d").unwrap().listing.has_child("f"));
        assert!(handler.get_from_path("/e").unwrap().listing.has_child("f"));
    }

    #[test]
    fn moved_directory_still_resolves_under_new_parent() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/d", &MetaData::new("d", true)).unwrap();
        handler.add_element("/e", &MetaData::new("e", true)).unwrap();
        handler.add_element("/d/sub", &MetaData::new("sub", true)).unwrap();
        handler
            .add_element("/d/sub/leaf.txt", &MetaData::new("leaf.txt", false))
            .unwrap();

        let mut meta = handler.get_meta_data("/d/sub").unwrap().0;
        handler.rename_element("/d/sub", "/e/sub", &mut meta).unwrap();

        let sub = handler.get_from_path("/e/sub").unwrap();
        assert!(sub.listing.has_child("leaf.txt"));
        assert!(handler.get_from_path("/d/sub").is_err());
    }

    #[test]
    fn move_into_child_of_source_parent_keeps_both_changes() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/a", &MetaData::new("a", true)).unwrap();
        handler.add_element("/a/b", &MetaData::new("b", true)).unwrap();
        handler.add_element("/a/f", &MetaData::new("f", false)).unwrap();

        let mut meta = handler.get_meta_data("/a/f").unwrap().0;
        handler.rename_element("/a/f", "/a/b/f", &mut meta).unwrap();

        let a = handler.get_from_path("/a").unwrap();
        assert!(!a.listing.has_child("f"));
        assert!(a.listing.has_child("b"));
        assert!(handler.get_from_path("/a/b").unwrap().listing.has_child("f"));
    }

    #[test]
    fn move_out_to_grandparent_keeps_both_changes() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/a", &MetaData::new("a", true)).unwrap();
        handler.add_element("/a/b", &MetaData::new("b", true)).unwrap();
        handler.add_element("/a/b/f", &MetaData::new("f", false)).unwrap();

        let mut meta = handler.get_meta_data("/a/b/f").unwrap().0;
        handler.rename_element("/a/b/f", "/a/f", &mut meta).unwrap();

        let a = handler.get_from_path("/a").unwrap();
        assert!(a.listing.has_child("f"));
        assert!(!handler.get_from_path("/a/b").unwrap().listing.has_child("f"));
    }

    #[test]
    fn can_delete_requires_empty_directory() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/d", &MetaData::new("d", true)).unwrap();
        handler.add_element("/d/f", &MetaData::new("f", false)).unwrap();

        assert!(!handler.can_delete("/d").unwrap());
        assert!(handler.can_delete("/d/f").unwrap());

        handler.delete_element("/d/f").unwrap();
        assert!(handler.can_delete("/d").unwrap());
    }

    #[test]
    fn path_resolution_failures_are_not_found() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        assert!(handler.get_from_path("/ghost").unwrap_err().is_not_found());
        assert!(handler.get_meta_data("/ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn file_segment_in_the_middle_is_rejected() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/f", &MetaData::new("f", false)).unwrap();
        assert!(matches!(
            handler.get_from_path("/f/inner"),
            Err(DriveError::InvalidParameter(_))
        ));
    }

    #[test]
    fn update_parent_directory_listing_persists_changes() {
        let (store, credentials) = setup();
        let handler = handler(&store, &credentials);
        handler.add_element("/f", &MetaData::new("f", false)).unwrap();

        let mut meta = handler.get_meta_data("/f").unwrap().0;
        meta.end_of_file = 99;
        meta.allocation_size = 99;
        handler.update_parent_directory_listing("/", meta).unwrap();

        assert_eq!(handler.get_meta_data("/f").unwrap().0.end_of_file, 99);
    }
}
