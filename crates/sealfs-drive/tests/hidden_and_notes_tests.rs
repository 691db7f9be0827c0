//! The auxiliary surface: hidden files, notes, and data-map transfer.

mod common;

use common::Harness;
use sealfs_core::DriveError;

#[test]
fn hidden_files_round_trip_through_their_own_surface() {
    let harness = Harness::new();
    harness
        .drive
        .write_hidden_file("/state.sealed", b"hidden payload", false)
        .unwrap();

    assert_eq!(
        harness.drive.read_hidden_file("/state.sealed").unwrap(),
        b"hidden payload"
    );
}

#[test]
fn hidden_files_are_invisible_to_the_host() {
    let harness = Harness::new();
    harness.write_file("/visible.txt", b"x");
    harness
        .drive
        .write_hidden_file("/state.sealed", b"x", false)
        .unwrap();

    assert_eq!(harness.enumerate_all("/"), vec!["visible.txt"]);
    assert!(matches!(
        harness.drive.get_file_info("/state.sealed"),
        Err(DriveError::InvalidParameter(_))
    ));
}

#[test]
fn hidden_overwrite_requires_the_flag() {
    let harness = Harness::new();
    harness
        .drive
        .write_hidden_file("/s.sealed", b"first", false)
        .unwrap();

    assert!(matches!(
        harness.drive.write_hidden_file("/s.sealed", b"second", false),
        Err(DriveError::AlreadyExists(_))
    ));

    harness
        .drive
        .write_hidden_file("/s.sealed", b"second", true)
        .unwrap();
    assert_eq!(harness.drive.read_hidden_file("/s.sealed").unwrap(), b"second");
}

#[test]
fn overwrite_with_shorter_content_truncates() {
    let harness = Harness::new();
    harness
        .drive
        .write_hidden_file("/s.sealed", b"a much longer first version", true)
        .unwrap();
    harness
        .drive
        .write_hidden_file("/s.sealed", b"tiny", true)
        .unwrap();
    assert_eq!(harness.drive.read_hidden_file("/s.sealed").unwrap(), b"tiny");
}

#[test]
fn search_finds_only_hidden_children() {
    let harness = Harness::new();
    harness.write_file("/plain.txt", b"x");
    harness
        .drive
        .write_hidden_file("/one.sealed", b"x", false)
        .unwrap();
    harness
        .drive
        .write_hidden_file("/two.sealed", b"x", false)
        .unwrap();

    let mut found = harness.drive.search_hidden_files("/").unwrap();
    found.sort();
    assert_eq!(found, vec!["one.sealed", "two.sealed"]);
}

#[test]
fn delete_hidden_file_removes_it() {
    let harness = Harness::new();
    harness
        .drive
        .write_hidden_file("/gone.sealed", b"x", false)
        .unwrap();
    harness.drive.delete_hidden_file("/gone.sealed").unwrap();
    assert!(harness.drive.read_hidden_file("/gone.sealed").is_err());
    assert!(harness.drive.search_hidden_files("/").unwrap().is_empty());
}

#[test]
fn hidden_surface_rejects_ordinary_names() {
    let harness = Harness::new();
    for call in [
        harness.drive.read_hidden_file("/plain.txt").err(),
        harness
            .drive
            .write_hidden_file("/plain.txt", b"x", false)
            .err(),
        harness.drive.delete_hidden_file("/plain.txt").err(),
    ] {
        assert!(matches!(call, Some(DriveError::InvalidParameter(_))));
    }
}

#[test]
fn notes_append_and_read_in_order() {
    let harness = Harness::new();
    harness.write_file("/noted.txt", b"x");

    assert!(harness.drive.get_notes("/noted.txt").unwrap().is_empty());
    harness.drive.add_note("/noted.txt", "first").unwrap();
    harness.drive.add_note("/noted.txt", "second").unwrap();

    assert_eq!(
        harness.drive.get_notes("/noted.txt").unwrap(),
        vec!["first", "second"]
    );
}

#[test]
fn notes_survive_remount() {
    let harness = Harness::new();
    harness.write_file("/noted.txt", b"x");
    harness.drive.add_note("/noted.txt", "durable").unwrap();

    let again = Harness::with_shim_and_store(
        std::sync::Arc::new(common::TestShim::default()),
        harness.store.clone(),
    );
    assert_eq!(again.drive.get_notes("/noted.txt").unwrap(), vec!["durable"]);
}

#[test]
fn data_map_transfer_between_paths() {
    let harness = Harness::new();
    harness.write_file("/source.txt", b"transferable bytes");

    let serialised = harness.drive.get_data_map("/source.txt").unwrap();
    harness
        .drive
        .insert_data_map("/copy.txt", &serialised)
        .unwrap();

    assert_eq!(harness.read_file("/copy.txt"), b"transferable bytes");
    let info = harness.drive.get_file_info("/copy.txt").unwrap();
    assert_eq!(info.end_of_file, b"transferable bytes".len() as u64);
}

#[test]
fn data_map_of_a_directory_is_refused() {
    let harness = Harness::new();
    harness.make_directory("/d");
    assert!(matches!(
        harness.drive.get_data_map("/d"),
        Err(DriveError::InvalidParameter(_))
    ));
}

#[test]
fn hidden_data_map_surface_reads_hidden_files() {
    let harness = Harness::new();
    harness
        .drive
        .write_hidden_file("/s.sealed", b"hidden map", false)
        .unwrap();
    let serialised = harness.drive.get_data_map_hidden("/s.sealed").unwrap();
    assert!(!serialised.is_empty());
}
