//! Per-scan directory enumeration state and wildcard masks.

use regex::RegexBuilder;
use tracing::warn;

use sealfs_core::DirectoryData;

/// Cursor state for one in-progress directory scan.
///
/// Holds a snapshot of the listing as of the scan's start; mutations after
/// that point surface on the next restart, matching the host protocol.
pub struct DirectoryEnumerationContext {
    pub directory: DirectoryData,
    /// Whether the caller's wildcard was anything other than `*`.
    pub exact_match: bool,
}

impl DirectoryEnumerationContext {
    pub fn new(mut directory: DirectoryData) -> Self {
        directory.listing.reset_children_itr();
        DirectoryEnumerationContext {
            directory,
            exact_match: false,
        }
    }
}

/// Match a host wildcard mask against a file name.
///
/// The mask language is `*` (zero or more characters) and `?` (exactly
/// one); everything else is literal. Matching is case-insensitive. A mask
/// that fails to compile matches nothing.
pub fn matches_mask(mask: &str, name: &str) -> bool {
    let mut pattern = String::with_capacity(mask.len() * 2 + 2);
    pattern.push('^');
    let mut literal = [0u8; 4];
    for ch in mask.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    pattern.push('$');

    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(regex) => regex.is_match(name),
        Err(err) => {
            warn!(mask, %err, "wildcard mask failed to compile");
            false
        }
    }
}
