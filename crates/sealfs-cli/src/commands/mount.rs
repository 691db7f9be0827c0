use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

use sealfs_core::store::DiskChunkStore;
use sealfs_core::UserCredentials;
use sealfs_drive::{Drive, DriveConfig};

use crate::auth::resolve_secret;
use crate::shim::LocalShim;

#[derive(clap::Args)]
pub struct Args {
    /// Directory where the drive appears
    pub mount_path: PathBuf,

    /// Directory holding the encrypted chunk store
    pub store_path: PathBuf,

    /// Account keyword (prompted when absent)
    #[arg(long, env = "SEALFS_KEYWORD", hide_env_values = true)]
    pub keyword: Option<String>,

    /// Account pin (prompted when absent)
    #[arg(long, env = "SEALFS_PIN", hide_env_values = true)]
    pub pin: Option<String>,

    /// Account password (prompted when absent)
    #[arg(long, env = "SEALFS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Volume label shown by the host
    #[arg(long, default_value = "SealDrive")]
    pub drive_name: String,

    /// Chunk-store budget in mebibytes
    #[arg(long, default_value_t = 1024)]
    pub max_space_mb: u64,
}

/// Mount the drive and block until it is unmounted again.
pub fn run(args: Args) -> Result<()> {
    let keyword = resolve_secret(args.keyword, "Keyword")?;
    let pin = resolve_secret(args.pin, "Pin")?;
    let password = resolve_secret(args.password, "Password")?;
    let credentials = UserCredentials::new(keyword, pin, password);

    let store = Arc::new(
        DiskChunkStore::open(&args.store_path, args.max_space_mb * 1024 * 1024)
            .context("failed to open chunk store")?,
    );
    let config = DriveConfig::new(&args.mount_path, &args.drive_name);
    let drive = Drive::new(store, Arc::new(LocalShim), config, &credentials)
        .context("bootstrap failed")?;

    drive.init().context("drive initialisation failed")?;
    drive.mount().context("mount failed")?;
    if !drive.wait_until_mounted() {
        anyhow::bail!("drive did not reach the mounted state");
    }
    info!(
        mount = %args.mount_path.display(),
        store = %args.store_path.display(),
        "mounted; press Ctrl-C to unmount"
    );

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("signal handler")?;
    let _ = signals.forever().next();

    info!("unmounting");
    drive.unmount();
    drive.wait_until_unmounted();
    drive.clean().context("cleanup failed")?;
    Ok(())
}
