//! Directory listings: the ordered child set under one directory identity.

use serde::{Deserialize, Serialize};

use crate::error::{DriveError, Result};
use crate::id::DirectoryId;
use crate::meta_data::{collate, MetaData};
use crate::path;

/// A directory's contents: its identity plus children ordered by
/// case-insensitive name. Carries an iteration cursor with explicit reset
/// for the host's stateful enumeration protocol.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    directory_id: DirectoryId,
    children: Vec<MetaData>,
    #[serde(skip)]
    cursor: usize,
}

impl DirectoryListing {
    pub fn new(directory_id: DirectoryId) -> Self {
        DirectoryListing {
            directory_id,
            children: Vec::new(),
            cursor: 0,
        }
    }

    pub fn directory_id(&self) -> &DirectoryId {
        &self.directory_id
    }

    fn position(&self, name: &str) -> Option<usize> {
        let key = collate(name);
        self.children
            .iter()
            .position(|child| child.collation_key() == key)
    }

    /// Insert a child; fails if the name is already taken (case-insensitively).
    pub fn add_child(&mut self, meta: MetaData) -> Result<()> {
        meta.validate()?;
        if self.position(&meta.name).is_some() {
            return Err(DriveError::AlreadyExists(meta.name));
        }
        let key = meta.collation_key();
        let at = self
            .children
            .iter()
            .position(|child| child.collation_key() > key)
            .unwrap_or(self.children.len());
        self.children.insert(at, meta);
        self.cursor = 0;
        Ok(())
    }

    /// Remove the child with `name`; fails if absent.
    pub fn remove_child(&mut self, name: &str) -> Result<MetaData> {
        match self.position(name) {
            Some(at) => {
                self.cursor = 0;
                Ok(self.children.remove(at))
            }
            None => Err(DriveError::NotFound(format!("child {name}"))),
        }
    }

    /// Replace the child with the same name in place.
    pub fn update_child(&mut self, meta: MetaData, reset_cursor: bool) -> Result<()> {
        meta.validate()?;
        let at = self
            .position(&meta.name)
            .ok_or_else(|| DriveError::NotFound(format!("child {}", meta.name)))?;
        self.children[at] = meta;
        if reset_cursor {
            self.cursor = 0;
        }
        Ok(())
    }

    /// Case-insensitive lookup.
    pub fn get_child(&self, name: &str) -> Result<&MetaData> {
        self.position(name)
            .map(|at| &self.children[at])
            .ok_or_else(|| DriveError::NotFound(format!("child {name}")))
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Yield the child under the cursor and advance; `None` past the end.
    pub fn get_child_and_increment_itr(&mut self) -> Option<MetaData> {
        let child = self.children.get(self.cursor).cloned();
        if child.is_some() {
            self.cursor += 1;
        }
        child
    }

    /// Rewind the iteration cursor to the first child.
    pub fn reset_children_itr(&mut self) {
        self.cursor = 0;
    }

    /// Names of children carrying the reserved hidden extension.
    pub fn hidden_child_names(&self) -> Vec<String> {
        self.children
            .iter()
            .filter(|child| path::is_hidden_name(&child.name))
            .map(|child| child.name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> impl Iterator<Item = &MetaData> {
        self.children.iter()
    }

    pub fn serialise(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|err| DriveError::InvalidParameter(format!("serialise listing: {err}")))
    }

    /// Parse a serialized listing, requiring its embedded identity to match
    /// the identity the caller fetched it under.
    pub fn parse(bytes: &[u8], expected_id: &DirectoryId) -> Result<Self> {
        let listing: DirectoryListing = serde_json::from_slice(bytes)
            .map_err(|err| DriveError::InvalidParameter(format!("parse listing: {err}")))?;
        if listing.directory_id != *expected_id {
            return Err(DriveError::InvalidParameter(format!(
                "listing identity mismatch: stored under {expected_id}, embeds {}",
                listing.directory_id
            )));
        }
        for child in &listing.children {
            child.validate()?;
        }
        Ok(listing)
    }
}

/// The pair binding a listing to its place in the tree.
///
/// A parent never holds a pointer to its child listings; the child's
/// envelope carries the parent id instead, so `parent_id` travels with the
/// listing whenever it is loaded or stored.
#[derive(Clone, Debug)]
pub struct DirectoryData {
    pub parent_id: DirectoryId,
    pub listing: DirectoryListing,
}

impl DirectoryData {
    pub fn new(parent_id: DirectoryId, listing: DirectoryListing) -> Self {
        DirectoryData { parent_id, listing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> DirectoryListing {
        DirectoryListing::new(DirectoryId::random())
    }

    #[test]
    fn add_and_get_child() {
        let mut listing = listing();
        listing.add_child(MetaData::new("a.txt", false)).unwrap();
        assert!(listing.has_child("a.txt"));
        assert_eq!(listing.get_child("A.TXT").unwrap().name, "a.txt");
        assert_eq!(listing.len(), 1);
    }

    #[test]
    fn duplicate_names_rejected_case_insensitively() {
        let mut listing = listing();
        listing.add_child(MetaData::new("Readme", false)).unwrap();
        let err = listing.add_child(MetaData::new("README", true)).unwrap_err();
        assert!(matches!(err, DriveError::AlreadyExists(_)));
    }

    #[test]
    fn children_are_name_ordered() {
        let mut listing = listing();
        for name in ["zebra", "Apple", "mango"] {
            listing.add_child(MetaData::new(name, false)).unwrap();
        }
        let names: Vec<_> = listing.children().map(|child| child.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "mango", "zebra"]);
    }

    #[test]
    fn remove_missing_child_fails() {
        let mut listing = listing();
        assert!(listing.remove_child("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn update_preserves_position() {
        let mut listing = listing();
        listing.add_child(MetaData::new("a", false)).unwrap();
        listing.add_child(MetaData::new("b", false)).unwrap();

        let mut updated = listing.get_child("a").unwrap().clone();
        updated.end_of_file = 42;
        listing.update_child(updated, true).unwrap();

        assert_eq!(listing.get_child("a").unwrap().end_of_file, 42);
        let names: Vec<_> = listing.children().map(|child| child.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn cursor_walks_every_child_once() {
        let mut listing = listing();
        for name in ["one", "two", "three"] {
            listing.add_child(MetaData::new(name, false)).unwrap();
        }
        let mut seen = Vec::new();
        while let Some(child) = listing.get_child_and_increment_itr() {
            seen.push(child.name);
        }
        assert_eq!(seen.len(), 3);
        assert!(listing.get_child_and_increment_itr().is_none());

        listing.reset_children_itr();
        assert_eq!(
            listing.get_child_and_increment_itr().unwrap().name,
            seen[0]
        );
    }

    #[test]
    fn hidden_children_are_reported() {
        let mut listing = listing();
        listing.add_child(MetaData::new("plain.txt", false)).unwrap();
        listing.add_child(MetaData::new("cache.sealed", false)).unwrap();
        assert_eq!(listing.hidden_child_names(), vec!["cache.sealed"]);
    }

    #[test]
    fn serialise_parse_round_trip_preserves_order() {
        let mut listing = listing();
        for name in ["delta", "alpha", "charlie"] {
            listing.add_child(MetaData::new(name, false)).unwrap();
        }
        let id = *listing.directory_id();
        let parsed = DirectoryListing::parse(&listing.serialise().unwrap(), &id).unwrap();
        let names: Vec<_> = parsed.children().map(|child| child.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "charlie", "delta"]);
    }

    #[test]
    fn parse_rejects_identity_mismatch() {
        let listing = listing();
        let bytes = listing.serialise().unwrap();
        assert!(DirectoryListing::parse(&bytes, &DirectoryId::random()).is_err());
    }
}
