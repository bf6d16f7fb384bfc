//! Archive of the local Juju client data directory

use crate::errors::BackupError;
use crate::utils::archive;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CLIENT_CONFIG_FILE_NAME: &str = "juju.tar.gz";

/// Locate the Juju client data directory
///
/// `JUJU_DATA` wins; under snap confinement the real home comes from
/// `SNAP_REAL_HOME`.
pub fn default_client_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("JUJU_DATA").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    let home = std::env::var_os("SNAP_REAL_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)?;
    Some(home.join(".local").join("share").join("juju"))
}

/// Archive `source_dir` into `staging_dir/juju.tar.gz`
pub fn backup_client_config(source_dir: &Path, staging_dir: &Path) -> Result<PathBuf, BackupError> {
    if !source_dir.is_dir() {
        return Err(BackupError::ClientConfig(format!(
            "client config directory {:?} does not exist",
            source_dir
        )));
    }

    match archive::is_empty_dir(source_dir) {
        Ok(true) => warn!("Client config directory {:?} is empty", source_dir),
        Ok(false) => {}
        Err(e) => return Err(BackupError::ClientConfig(format!("{:#}", e))),
    }

    let archive_path = staging_dir.join(CLIENT_CONFIG_FILE_NAME);
    archive::create_tar_gz(source_dir, &archive_path, "juju")
        .map_err(|e| BackupError::ClientConfig(format!("{:#}", e)))?;

    info!("Client config archived from {:?}", source_dir);
    Ok(archive_path)
}
