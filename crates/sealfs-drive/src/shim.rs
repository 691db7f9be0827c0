//! The host filesystem shim the drive mounts through.
//!
//! The kernel-mode side (CBFS, FUSE, or an in-process stand-in for tests)
//! lives behind [`HostShim`]. The drive configures it once, asks it to mount
//! and unmount media, and receives its callbacks in return; per-handle state
//! never crosses this boundary as raw pointers, only as the opaque `u64`
//! handles the drive itself hands out.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Errors reported by the host shim.
///
/// The drive maps these to [`DriveError::IoFailure`]
/// (crate `sealfs-core`) except where a callback's contract says otherwise.
#[derive(Error, Debug)]
pub enum ShimError {
    /// The shim's kernel components are not installed or not running.
    #[error("host driver unavailable: {0}")]
    DriverUnavailable(String),

    /// A mount or unmount request was refused.
    #[error("mount operation failed: {0}")]
    MountFailed(String),

    /// Any other host-side failure.
    #[error("host call failed: {0}")]
    CallFailed(String),
}

/// One-shot configuration applied before the first mount.
#[derive(Clone, Debug)]
pub struct ShimConfig {
    /// The drive relies on the host serializing callbacks; this must stay on.
    pub serialized_callbacks: bool,
    /// Host-side file data cache. Off: the engine is the cache.
    pub file_cache_enabled: bool,
    /// Host-side metadata cache. Off for the same reason.
    pub metadata_cache_enabled: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        ShimConfig {
            serialized_callbacks: true,
            file_cache_enabled: false,
            metadata_cache_enabled: false,
        }
    }
}

/// The operations the drive invokes on its host.
pub trait HostShim: Send + Sync {
    /// Apply the one-shot configuration and register the drive's callbacks.
    fn configure(&self, config: &ShimConfig) -> Result<(), ShimError>;

    /// Register the backing storage as a disk with the host.
    fn create_storage(&self) -> Result<(), ShimError>;

    /// Mount the media; blocks up to `timeout`.
    fn mount_media(&self, timeout: Duration) -> Result<(), ShimError>;

    /// Expose the mounted media at `mount_point`.
    fn add_mounting_point(&self, mount_point: &Path) -> Result<(), ShimError>;

    /// Remove every mounting point.
    fn delete_mounting_points(&self) -> Result<(), ShimError>;

    /// Ask the host to unmount; `force` after the cooperative deadline.
    fn unmount_media(&self, force: bool) -> Result<(), ShimError>;

    /// Drop the storage registration.
    fn delete_storage(&self) -> Result<(), ShimError>;

    /// Host sector size, for volume-size reporting.
    fn sector_size(&self) -> u16;

    /// Longest path the host will ever deliver; queried once at init.
    fn max_path_length(&self) -> u32;

    /// Invalidate host caches after a rename the drive performed.
    fn notify_rename(&self, from: &str, to: &str);
}
