pub mod charm;
pub mod client_config;
pub mod controller;
pub mod registry;

pub use charm::{choose_unit, CharmBackup, CharmKind};
pub use registry::{resolve, SUPPORTED_CHARMS};

use crate::errors::BackupError;
use crate::utils::juju::{ControlPlane, Unit};
use crate::utils::remote::{RemoteExecutor, RemoteTarget};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Collaborators and limits handed to a strategy when it runs
pub struct BackupContext<'a> {
    pub control_plane: &'a dyn ControlPlane,
    pub remote: &'a dyn RemoteExecutor,
    /// Local directory the artifact is written into
    pub staging_dir: &'a Path,
    pub timeout: Duration,
}

/// Artifact produced by a strategy, still in staging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub path: PathBuf,
    /// Unit the artifact came from, for application backups
    pub unit: Option<String>,
}

/// One backup procedure
///
/// Adding a charm kind extends [`CharmKind`]; this enum and the
/// orchestrator stay untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStrategy {
    Controller {
        controller: String,
        attempts: u32,
    },
    ClientConfig {
        source_dir: PathBuf,
    },
    Application {
        controller: String,
        environment: String,
        application: String,
        units: Vec<Unit>,
        charm: CharmBackup,
    },
}

impl BackupStrategy {
    /// Display label for logs
    pub fn label(&self) -> String {
        match self {
            BackupStrategy::Controller { controller, .. } => {
                format!("controller backup of {}", controller)
            }
            BackupStrategy::ClientConfig { .. } => "client config backup".to_string(),
            BackupStrategy::Application {
                controller,
                environment,
                application,
                charm,
                ..
            } => format!(
                "{} backup of {}:{}/{}",
                charm.kind.charm_name(),
                controller,
                environment,
                application
            ),
        }
    }

    /// File name of the artifact in the output tree
    pub fn artifact_file_name(&self) -> &'static str {
        match self {
            BackupStrategy::Controller { .. } => controller::CONTROLLER_BACKUP_FILE_NAME,
            BackupStrategy::ClientConfig { .. } => client_config::CLIENT_CONFIG_FILE_NAME,
            BackupStrategy::Application { charm, .. } => charm.kind.artifact_file_name(),
        }
    }

    /// Run the backup and return the staged artifact
    pub fn backup(&self, ctx: &BackupContext<'_>) -> Result<StagedArtifact, BackupError> {
        match self {
            BackupStrategy::Controller {
                controller,
                attempts,
            } => controller::backup_controller(
                ctx.control_plane,
                controller,
                ctx.staging_dir,
                *attempts,
            )
            .map(|path| StagedArtifact { path, unit: None }),
            BackupStrategy::ClientConfig { source_dir } => {
                client_config::backup_client_config(source_dir, ctx.staging_dir)
                    .map(|path| StagedArtifact { path, unit: None })
            }
            BackupStrategy::Application {
                controller,
                environment,
                application,
                units,
                charm,
            } => {
                let unit = choose_unit(application, units)?;
                let target = RemoteTarget::new(controller, environment, &unit.name);
                let path = charm.backup(ctx.remote, &target, ctx.staging_dir, ctx.timeout)?;
                Ok(StagedArtifact {
                    path,
                    unit: Some(unit.name.clone()),
                })
            }
        }
    }
}
