//! Drive-relative path handling.
//!
//! Paths arrive from the host relative to the mount point, `/`-separated,
//! with `/` itself naming the drive root. Internally the root is an ordinary
//! child (the `/` sentinel entry) of a synthetic root-parent listing, so
//! [`segments`] yields the sentinel as the first component and the empty
//! path resolves to the root-parent listing itself.

use crate::error::{DriveError, Result};

/// Extension (without the dot) marking files that are invisible to the host
/// and reachable only through the hidden-file surface.
pub const HIDDEN_EXTENSION: &str = "sealed";

/// The name under which the drive root appears in the root-parent listing.
pub const ROOT_SENTINEL: &str = "/";

/// Characters never allowed in a path component, on any platform.
const FORBIDDEN_CHARS: &[char] = &['"', '\\', '/', '<', '>', '?', ':', '*', '|'];

/// Iterator over the components of a drive-relative path, sentinel first.
///
/// `"/a/b"` yields `["/", "a", "b"]`; `"/"` yields `["/"]`; `""` yields
/// nothing.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    let names = path.split('/').filter(|segment| !segment.is_empty());
    let sentinel = if path.starts_with('/') {
        Some(ROOT_SENTINEL)
    } else {
        None
    };
    sentinel.into_iter().chain(names)
}

/// The parent of a drive-relative path.
///
/// `"/a/b"` → `"/a"`, `"/a"` → `"/"`, `"/"` → `""` (the root-parent).
pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// The final component of a drive-relative path; `"/"` for the root itself.
pub fn file_name(path: &str) -> Result<&str> {
    if path.is_empty() {
        return Err(DriveError::InvalidParameter("empty path".into()));
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(ROOT_SENTINEL);
    }
    match trimmed.rfind('/') {
        Some(idx) => Ok(&trimmed[idx + 1..]),
        None => Err(DriveError::InvalidParameter(format!(
            "path is not absolute: {path}"
        ))),
    }
}

/// The extension of a name, without the dot, if it has one.
pub fn extension(name: &str) -> Option<&str> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// True iff `name` carries the reserved hidden extension.
pub fn is_hidden_name(name: &str) -> bool {
    extension(name) == Some(HIDDEN_EXTENSION)
}

/// True iff `name` may not be created on the drive.
///
/// Rejects the legacy device names (`CON`, `PRN`, `AUX`, `NUL`, `COM1`-`COM9`,
/// `LPT1`-`LPT9`, `CLOCK$`), matched against the stem so `CON.txt` is also
/// refused, and any name containing a forbidden character.
pub fn excluded_filename(name: &str) -> bool {
    let stem = match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem,
        _ => name,
    };
    let lower = stem.to_ascii_lowercase();
    let reserved = match lower.len() {
        3 => matches!(lower.as_str(), "con" | "prn" | "aux" | "nul"),
        4 => {
            let digit = lower.as_bytes()[3];
            (lower.starts_with("com") || lower.starts_with("lpt"))
                && digit.is_ascii_digit()
                && digit != b'0'
        }
        6 => lower == "clock$",
        _ => false,
    };
    reserved || name.chars().any(|ch| FORBIDDEN_CHARS.contains(&ch))
}
