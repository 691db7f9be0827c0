//! The mounted filesystem facade.
//!
//! A [`Drive`] dispatches the callback protocol of a host filesystem shim
//! (create / open / read / write / enumerate / rename / delete / close /
//! flush) into the storage engine, tracks per-open-file state through opaque
//! handles, and runs the mount-state lifecycle against an abstract
//! [`HostShim`].
//!
//! The host guarantees serialized callbacks (a configuration the drive
//! requests at init time and relies on); only the auxiliary surface —
//! data-map transfer, hidden files, notes — takes its own lock.

#![forbid(unsafe_code)]

pub mod context;
pub mod drive;
pub mod enumeration;
pub mod shim;

pub use context::FileContext;
pub use drive::{AttributeUpdate, Drive, DriveConfig, DriveStage, FileInfo, VolumeInfo};
pub use enumeration::matches_mask;
pub use shim::{HostShim, ShimConfig, ShimError};
