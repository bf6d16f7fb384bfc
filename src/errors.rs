//! Per-item backup errors
//!
//! Every failure below is caught at the item boundary and recorded as a
//! result; none of them aborts a run.

use crate::utils::command::CommandError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackupError {
    #[error("DiscoveryError: {0}")]
    Discovery(String),

    #[error("RemoteTriggerError: backup command on unit '{unit}' exited with code {exit_code}: {stderr}")]
    RemoteTrigger {
        unit: String,
        exit_code: i32,
        stderr: String,
    },

    #[error(
        "RemoteIOError: remote directory '{path}' on unit '{unit}' is not usable: {stderr} \
         (hint: pass a different location with --backup-location-on-{option})"
    )]
    RemoteIo {
        unit: String,
        option: String,
        path: String,
        stderr: String,
    },

    #[error("TransferError: failed to download '{path}' from unit '{unit}': {reason}")]
    Transfer {
        unit: String,
        path: String,
        reason: String,
    },

    #[error("TimeoutError: task '{task}' timed out (timeout={}s)", .timeout.as_secs())]
    Timeout { task: String, timeout: Duration },

    #[error("ControllerBackupError: {0}")]
    ControllerBackup(String),

    #[error("ClientConfigError: {0}")]
    ClientConfig(String),

    #[error("NoUsableUnitError: application '{application}' has no healthy unit")]
    NoUsableUnit { application: String },

    #[error("IOError: {0}")]
    Io(String),
}

impl BackupError {
    /// Taxonomy label used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            BackupError::Discovery(_) => "DiscoveryError",
            BackupError::RemoteTrigger { .. } => "RemoteTriggerError",
            BackupError::RemoteIo { .. } => "RemoteIOError",
            BackupError::Transfer { .. } => "TransferError",
            BackupError::Timeout { .. } => "TimeoutError",
            BackupError::ControllerBackup(_) => "ControllerBackupError",
            BackupError::ClientConfig(_) => "ClientConfigError",
            BackupError::NoUsableUnit { .. } => "NoUsableUnitError",
            BackupError::Io(_) => "IOError",
        }
    }

    /// Map a failed control-plane listing call
    ///
    /// A listing that hangs until its timeout is an unreachable controller,
    /// not a timed-out backup item.
    pub fn discovery(context: &str, err: CommandError) -> Self {
        BackupError::Discovery(format!("{}: {}", context, err))
    }
}
