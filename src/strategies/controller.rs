//! Native controller backups through the control plane

use crate::errors::BackupError;
use crate::utils::juju::ControlPlane;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONTROLLER_BACKUP_FILE_NAME: &str = "juju-controller-backup.tar.gz";

/// Create a controller backup into `staging_dir`, retrying failed attempts
///
/// Timeouts are final and never retried.
pub fn backup_controller(
    control_plane: &dyn ControlPlane,
    controller: &str,
    staging_dir: &Path,
    attempts: u32,
) -> Result<PathBuf, BackupError> {
    std::fs::create_dir_all(staging_dir).map_err(|e| {
        BackupError::Io(format!("creating staging directory {:?}: {}", staging_dir, e))
    })?;
    let destination = staging_dir.join(CONTROLLER_BACKUP_FILE_NAME);

    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match control_plane.trigger_controller_backup(controller, &destination) {
            Ok(path) => {
                info!("[{}] Controller backup created: {:?}", controller, path);
                return Ok(path);
            }
            Err(e @ BackupError::Timeout { .. }) => return Err(e),
            Err(e) => {
                warn!(
                    "[{}] Controller backup attempt {}/{} failed: {}",
                    controller, attempt, attempts, e
                );
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(BackupError::ControllerBackup(reason)) => BackupError::ControllerBackup(format!(
            "controller '{}' failed after {} attempts: {}",
            controller, attempts, reason
        )),
        Some(other) => other,
        None => BackupError::ControllerBackup(format!("controller '{}' was not backed up", controller)),
    })
}
