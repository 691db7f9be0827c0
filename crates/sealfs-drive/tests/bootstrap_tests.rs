//! First- and second-mount bootstrap behavior.

mod common;

use std::sync::Arc;

use common::{credentials, Harness, TestShim};
use sealfs_core::store::ChunkStore;
use sealfs_core::{session, DriveError, UserCredentials};
use sealfs_drive::{Drive, DriveConfig};

#[test]
fn first_mount_creates_the_bootstrap_blobs() {
    let harness = Harness::new();
    // MID, TMID, root-parent listing envelope, root listing envelope.
    assert_eq!(harness.store.len(), 4);
    assert!(harness.store.has(&session::mid_key(&credentials())));
    assert!(harness.store.has(harness.drive.root_parent_id()));
}

#[test]
fn second_mount_recovers_the_same_identities() {
    let harness = Harness::new();
    let user_id = *harness.drive.unique_user_id();
    let root_parent_id = *harness.drive.root_parent_id();
    let blobs = harness.store.len();

    let again = Harness::with_shim_and_store(Arc::new(TestShim::default()), harness.store.clone());
    assert_eq!(*again.drive.unique_user_id(), user_id);
    assert_eq!(*again.drive.root_parent_id(), root_parent_id);
    // No new MID/TMID blobs on a recovery mount.
    assert_eq!(again.store.len(), blobs);
}

#[test]
fn second_mount_sees_first_mount_files() {
    let harness = Harness::new();
    harness.write_file("/kept.txt", b"survives remount");

    let again = Harness::with_shim_and_store(Arc::new(TestShim::default()), harness.store.clone());
    assert_eq!(again.read_file("/kept.txt"), b"survives remount");
}

#[test]
fn wrong_password_is_rejected() {
    std::env::set_var("SEALFS_FAST_KDF", "1");
    let harness = Harness::new();
    let store: Arc<dyn ChunkStore> = harness.store.clone();
    let wrong = UserCredentials::new("keyword", "1234", "nope");
    let result = Drive::new(
        store,
        Arc::new(TestShim::default()),
        DriveConfig::new("/tmp/sealfs-test", "TestDrive"),
        &wrong,
    );
    assert!(matches!(result, Err(DriveError::InvalidCredentials)));
}

#[test]
fn different_keyword_bootstraps_a_separate_drive() {
    std::env::set_var("SEALFS_FAST_KDF", "1");
    let harness = Harness::new();
    let blobs = harness.store.len();

    let store: Arc<dyn ChunkStore> = harness.store.clone();
    let other = UserCredentials::new("other-keyword", "1234", "password");
    let drive = Drive::new(
        store,
        Arc::new(TestShim::default()),
        DriveConfig::new("/tmp/sealfs-test-2", "OtherDrive"),
        &other,
    )
    .unwrap();

    assert_ne!(drive.unique_user_id(), harness.drive.unique_user_id());
    // A second account lays down its own four bootstrap blobs.
    assert_eq!(harness.store.len(), blobs + 4);
}
