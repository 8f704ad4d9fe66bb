pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use anyhow::Result;
use disk::DiskStore;
use tracing::debug;

/// Opens the persistent store under the configured data directory.
pub fn open(config: &AppConfig) -> Result<DiskStore> {
    let path = config.default_data_path()?.join("db");
    debug!("Using data directory {}", path.display());
    DiskStore::open(&path)
}
