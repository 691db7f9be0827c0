//! Error taxonomy shared by the storage engine and the drive facade.
//!
//! All failure paths between components are explicit `Result` values; the
//! host-shim boundary is responsible for translating these into whatever
//! native error codes its platform uses.

use thiserror::Error;

/// Errors surfaced by the drive core.
#[derive(Error, Debug)]
pub enum DriveError {
    /// Malformed path, missing required field, or a size beyond the
    /// representable range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Path resolution failed, or a query was made on a non-existing entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// An insert or rename collided with an existing name (names are unique
    /// per directory, case-insensitively).
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// The operation is forbidden by policy for this location.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The chunk store refused a put because its disk-usage budget is spent.
    #[error("chunk store capacity exceeded")]
    CapacityExceeded,

    /// First-run bootstrap could not create the root blobs.
    #[error("bootstrap failed to initialise root storage: {0}")]
    Uninitialised(String),

    /// The sealed session could not be recovered under the supplied secrets.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A host or storage call failed in a way that has no better mapping.
    #[error("i/o failure: {0}")]
    IoFailure(String),
}

impl DriveError {
    /// True for the variants a lookup callback reports as a missing entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_predicate() {
        assert!(DriveError::NotFound("x".into()).is_not_found());
        assert!(!DriveError::CapacityExceeded.is_not_found());
    }

    #[test]
    fn display_is_stable() {
        let err = DriveError::InvalidParameter("empty path".into());
        assert_eq!(err.to_string(), "invalid parameter: empty path");
        assert_eq!(
            DriveError::CapacityExceeded.to_string(),
            "chunk store capacity exceeded"
        );
    }
}
