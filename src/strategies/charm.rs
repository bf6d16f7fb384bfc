//! Application backups run on a unit over the remote executor

use crate::errors::BackupError;
use crate::utils::command::CommandError;
use crate::utils::juju::Unit;
use crate::utils::remote::{RemoteExecutor, RemoteTarget};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Login user of `juju ssh` sessions
const SSH_USER: &str = "ubuntu";

/// Supported application kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharmKind {
    Postgresql,
    MysqlInnodbCluster,
    Etcd,
}

impl CharmKind {
    pub const ALL: [CharmKind; 3] = [
        CharmKind::Postgresql,
        CharmKind::MysqlInnodbCluster,
        CharmKind::Etcd,
    ];

    pub fn from_charm_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.charm_name() == name)
    }

    pub fn supported_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.charm_name()).collect()
    }

    pub fn charm_name(self) -> &'static str {
        match self {
            CharmKind::Postgresql => "postgresql",
            CharmKind::MysqlInnodbCluster => "mysql-innodb-cluster",
            CharmKind::Etcd => "etcd",
        }
    }

    /// Suffix of the `--backup-location-on-*` flag for this kind
    pub fn option_name(self) -> &'static str {
        match self {
            CharmKind::Postgresql => "postgresql",
            CharmKind::MysqlInnodbCluster => "mysql",
            CharmKind::Etcd => "etcd",
        }
    }

    pub fn default_base_dir(self) -> &'static str {
        match self {
            CharmKind::Postgresql => "/home/ubuntu",
            CharmKind::MysqlInnodbCluster => "/var/backups/mysql",
            CharmKind::Etcd => "/home/ubuntu/etcd-snapshots",
        }
    }

    pub fn artifact_file_name(self) -> &'static str {
        match self {
            CharmKind::Postgresql => "juju-postgresql-backup.gz",
            CharmKind::MysqlInnodbCluster => "mysqldump-all-databases.sql.gz",
            CharmKind::Etcd => "etcd-snapshot.db",
        }
    }

    /// Whether the artifact is written by root and must be copied out
    /// before the ssh user can download it
    pub fn requires_root(self) -> bool {
        matches!(self, CharmKind::MysqlInnodbCluster | CharmKind::Etcd)
    }

    fn trigger_command(self, remote_path: &str) -> String {
        match self {
            CharmKind::Postgresql => format!(
                "set -o pipefail; sudo -u postgres pg_dumpall | gzip > {}",
                remote_path
            ),
            CharmKind::MysqlInnodbCluster => format!(
                "set -o pipefail; sudo mysqldump --all-databases --single-transaction | gzip | sudo tee {} > /dev/null",
                remote_path
            ),
            CharmKind::Etcd => format!(
                "sudo ETCDCTL_API=3 etcdctl \
                 --endpoints=https://127.0.0.1:2379 \
                 --cacert=/var/snap/etcd/common/ca.crt \
                 --cert=/var/snap/etcd/common/server.crt \
                 --key=/var/snap/etcd/common/server.key \
                 snapshot save {}",
                remote_path
            ),
        }
    }
}

/// Backup procedure for one charm kind with its resolved remote directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharmBackup {
    pub kind: CharmKind,
    pub base_dir: String,
}

impl CharmBackup {
    pub fn new(kind: CharmKind, base_dir: impl Into<String>) -> Self {
        Self {
            kind,
            base_dir: base_dir.into(),
        }
    }

    /// Where the trigger writes the artifact on the unit
    pub fn remote_artifact_path(&self) -> String {
        format!(
            "{}/{}",
            self.base_dir.trim_end_matches('/'),
            self.kind.artifact_file_name()
        )
    }

    /// Path the ssh user downloads from
    pub fn download_path(&self) -> String {
        if self.kind.requires_root() {
            format!("/tmp/{}", self.kind.artifact_file_name())
        } else {
            self.remote_artifact_path()
        }
    }

    pub fn preflight_command(&self) -> String {
        let sudo = if self.kind.requires_root() { "sudo " } else { "" };
        format!(
            "{sudo}mkdir -p {dir} && {sudo}test -w {dir}",
            sudo = sudo,
            dir = self.base_dir
        )
    }

    pub fn trigger_command(&self) -> String {
        self.kind.trigger_command(&self.remote_artifact_path())
    }

    /// Copy of a root-owned artifact into the ssh user's reach
    pub fn stage_command(&self) -> Option<String> {
        self.kind.requires_root().then(|| {
            let tmp = self.download_path();
            format!(
                "sudo cp {} {} && sudo chown {user}:{user} {}",
                self.remote_artifact_path(),
                tmp,
                tmp,
                user = SSH_USER
            )
        })
    }

    pub fn cleanup_command(&self) -> String {
        if self.kind.requires_root() {
            format!(
                "sudo rm -f {} {}",
                self.remote_artifact_path(),
                self.download_path()
            )
        } else {
            format!("rm -f {}", self.remote_artifact_path())
        }
    }

    /// Run the backup on the chosen unit and download the artifact into
    /// `staging_dir`
    ///
    /// A failure on the chosen unit is final; other units are not tried.
    pub fn backup(
        &self,
        remote: &dyn RemoteExecutor,
        target: &RemoteTarget,
        staging_dir: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, BackupError> {
        let unit = target.unit.as_str();
        let prefix = format!("[{} {}]", target.model_ref(), unit);

        debug!("{} Checking remote directory {}", prefix, self.base_dir);
        let output = remote
            .run(target, &self.preflight_command(), timeout)
            .map_err(|e| self.remote_io_error(unit, &self.base_dir, e))?;
        if !output.success() {
            return Err(BackupError::RemoteIo {
                unit: unit.to_string(),
                option: self.kind.option_name().to_string(),
                path: self.base_dir.clone(),
                stderr: output.stderr,
            });
        }

        info!("{} Running {} backup", prefix, self.kind.charm_name());
        let output = remote
            .run(target, &self.trigger_command(), timeout)
            .map_err(|e| trigger_error(unit, e))?;
        if !output.success() {
            return Err(BackupError::RemoteTrigger {
                unit: unit.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        if let Some(stage) = self.stage_command() {
            let output = remote
                .run(target, &stage, timeout)
                .map_err(|e| self.remote_io_error(unit, &self.remote_artifact_path(), e))?;
            if !output.success() {
                return Err(BackupError::RemoteIo {
                    unit: unit.to_string(),
                    option: self.kind.option_name().to_string(),
                    path: self.remote_artifact_path(),
                    stderr: output.stderr,
                });
            }
        }

        std::fs::create_dir_all(staging_dir).map_err(|e| {
            BackupError::Io(format!("creating staging directory {:?}: {}", staging_dir, e))
        })?;
        let local_path = staging_dir.join(self.kind.artifact_file_name());
        let download = self.download_path();

        info!("{} Downloading {}", prefix, download);
        let fetched = remote.fetch(target, &download, &local_path, timeout);

        // Cleanup runs whatever the download outcome
        match remote.run(target, &self.cleanup_command(), timeout) {
            Ok(output) if !output.success() => {
                warn!("{} Failed to remove remote backup files: {}", prefix, output.stderr)
            }
            Err(e) => warn!("{} Failed to remove remote backup files: {}", prefix, e),
            Ok(_) => {}
        }

        fetched.map_err(|e| match e {
            CommandError::Timeout { command, timeout } => BackupError::Timeout {
                task: command,
                timeout,
            },
            other => BackupError::Transfer {
                unit: unit.to_string(),
                path: download.clone(),
                reason: other.to_string(),
            },
        })?;

        Ok(local_path)
    }

    /// A preflight or staging step that could not run at all
    fn remote_io_error(&self, unit: &str, path: &str, err: CommandError) -> BackupError {
        match err {
            CommandError::Timeout { command, timeout } => timeout_error(unit, command, timeout),
            other => BackupError::RemoteIo {
                unit: unit.to_string(),
                option: self.kind.option_name().to_string(),
                path: path.to_string(),
                stderr: other.to_string(),
            },
        }
    }
}

fn trigger_error(unit: &str, err: CommandError) -> BackupError {
    match err {
        CommandError::Timeout { command, timeout } => timeout_error(unit, command, timeout),
        other => BackupError::RemoteTrigger {
            unit: unit.to_string(),
            exit_code: -1,
            stderr: other.to_string(),
        },
    }
}

fn timeout_error(unit: &str, command: String, timeout: Duration) -> BackupError {
    BackupError::Timeout {
        task: format!("{} on {}", command, unit),
        timeout,
    }
}

/// Pick the unit to back up: the leader when healthy, else the first
/// healthy unit in reported order
pub fn choose_unit<'a>(application: &str, units: &'a [Unit]) -> Result<&'a Unit, BackupError> {
    units
        .iter()
        .find(|u| u.leader && u.is_healthy())
        .or_else(|| units.iter().find(|u| u.is_healthy()))
        .ok_or_else(|| BackupError::NoUsableUnit {
            application: application.to_string(),
        })
}
