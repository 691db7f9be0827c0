//! In-process stand-in for the kernel-mode filesystem shim.
//!
//! The real CBFS/FUSE driver is an external component; this shim accepts
//! the drive's lifecycle calls so the bootstrap, chunk store and callback
//! surface can be exercised end-to-end from the command line.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use sealfs_drive::{HostShim, ShimConfig, ShimError};

#[derive(Default)]
pub struct LocalShim;

impl HostShim for LocalShim {
    fn configure(&self, config: &ShimConfig) -> Result<(), ShimError> {
        debug!(?config, "shim configured");
        Ok(())
    }

    fn create_storage(&self) -> Result<(), ShimError> {
        Ok(())
    }

    fn mount_media(&self, _timeout: Duration) -> Result<(), ShimError> {
        Ok(())
    }

    fn add_mounting_point(&self, mount_point: &Path) -> Result<(), ShimError> {
        info!(mount_point = %mount_point.display(), "mounting point added");
        Ok(())
    }

    fn delete_mounting_points(&self) -> Result<(), ShimError> {
        Ok(())
    }

    fn unmount_media(&self, force: bool) -> Result<(), ShimError> {
        debug!(force, "unmount requested");
        Ok(())
    }

    fn delete_storage(&self) -> Result<(), ShimError> {
        Ok(())
    }

    fn sector_size(&self) -> u16 {
        512
    }

    fn max_path_length(&self) -> u32 {
        32 * 1024
    }

    fn notify_rename(&self, from: &str, to: &str) {
        debug!(from, to, "rename notification");
    }
}
