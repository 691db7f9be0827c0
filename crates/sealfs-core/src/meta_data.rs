//! Per-entry attributes for files and directories.

use std::cmp::Ordering;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use serde_with::TimestampNanoSeconds;

use crate::encrypt::DataMap;
use crate::error::{DriveError, Result};
use crate::id::DirectoryId;
use crate::path;

/// Portable attribute bits, mirroring the host taxonomy.
pub mod attr {
    pub const READONLY: u32 = 0x0001;
    pub const DIRECTORY: u32 = 0x0010;
    pub const NORMAL: u32 = 0x0080;
}

/// Reported size of a directory entry.
pub const DIRECTORY_SIZE: u64 = 4096;

const FILE_MODE: u32 = 0o644;
const DIRECTORY_MODE: u32 = 0o755;

/// One entry in a directory listing.
///
/// Exactly one of `data_map` (files) or `directory_id` (directories) is
/// present; [`parse`](MetaData::parse) rejects anything else.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    /// Path component, no separators.
    pub name: String,

    #[serde_as(as = "TimestampNanoSeconds<i64>")]
    pub creation_time: SystemTime,
    #[serde_as(as = "TimestampNanoSeconds<i64>")]
    pub last_access_time: SystemTime,
    #[serde_as(as = "TimestampNanoSeconds<i64>")]
    pub last_write_time: SystemTime,
    #[serde_as(as = "TimestampNanoSeconds<i64>")]
    pub status_change_time: SystemTime,

    /// Attribute bits ([`attr`]).
    pub attributes: u32,
    /// POSIX permission bits.
    pub mode: u32,
    /// POSIX link count.
    pub nlink: u32,

    pub end_of_file: u64,
    pub allocation_size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_map: Option<DataMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<DirectoryId>,

    /// Opaque annotations, append-only from the outside.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,

    /// Symbolic-link target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_to: Option<String>,
}

impl MetaData {
    /// A fresh entry with now-timestamps and platform default attributes.
    ///
    /// Directories get a random identity; files get an empty data map.
    pub fn new(name: impl Into<String>, is_directory: bool) -> Self {
        let now = SystemTime::now();
        MetaData {
            name: name.into(),
            creation_time: now,
            last_access_time: now,
            last_write_time: now,
            status_change_time: now,
            attributes: if is_directory {
                attr::DIRECTORY
            } else {
                attr::NORMAL
            },
            mode: if is_directory { DIRECTORY_MODE } else { FILE_MODE },
            nlink: 1,
            end_of_file: 0,
            allocation_size: 0,
            data_map: if is_directory {
                None
            } else {
                Some(DataMap::default())
            },
            directory_id: if is_directory {
                Some(DirectoryId::random())
            } else {
                None
            },
            notes: Vec::new(),
            link_to: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.directory_id.is_some()
    }

    /// True iff the entry's name carries the reserved hidden extension.
    pub fn is_hidden(&self) -> bool {
        path::is_hidden_name(&self.name)
    }

    /// The space an overwrite of this entry would reclaim.
    pub fn allocated_size(&self) -> u64 {
        self.allocation_size
    }

    /// Stamp the last-write time (and status-change time) to now.
    pub fn update_last_write_time(&mut self) {
        self.last_write_time = SystemTime::now();
        self.status_change_time = self.last_write_time;
    }

    /// Re-establish `allocation_size >= end_of_file` by raising the smaller
    /// of the two to the larger.
    pub fn reconcile_sizes(&mut self) {
        if self.end_of_file < self.allocation_size {
            self.end_of_file = self.allocation_size;
        } else if self.allocation_size < self.end_of_file {
            self.allocation_size = self.end_of_file;
        }
    }

    /// Locale-independent case-insensitive collation key.
    pub fn collation_key(&self) -> String {
        collate(&self.name)
    }

    /// Name ordering used throughout the listing layer.
    pub fn compare_names(&self, other: &MetaData) -> Ordering {
        self.collation_key().cmp(&other.collation_key())
    }

    pub fn serialise(&self) -> Result<Vec<u8>> {
        self.validate()?;
        serde_json::to_vec(self)
            .map_err(|err| DriveError::InvalidParameter(format!("serialise meta data: {err}")))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let meta: MetaData = serde_json::from_slice(bytes)
            .map_err(|err| DriveError::InvalidParameter(format!("parse meta data: {err}")))?;
        meta.validate()?;
        Ok(meta)
    }

    /// Enforce the structural invariants that serde alone cannot.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DriveError::InvalidParameter("entry has no name".into()));
        }
        match (&self.data_map, &self.directory_id) {
            (Some(_), Some(_)) => Err(DriveError::InvalidParameter(format!(
                "entry {} carries both data map and directory id",
                self.name
            ))),
            (None, None) => Err(DriveError::InvalidParameter(format!(
                "entry {} carries neither data map nor directory id",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

/// Locale-independent lowercase mapping of a name's code units.
pub fn collate(name: &str) -> String {
    name.to_lowercase()
}
