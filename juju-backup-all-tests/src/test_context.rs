//! Test context and harness for orchestrator runs

use crate::config_builder::ConfigBuilder;
use juju_backup_all::config::Config;
use juju_backup_all::managers::{BackupOrchestrator, BackupResult, Report};
use juju_backup_all::utils::juju::ControlPlane;
use juju_backup_all::utils::remote::RemoteExecutor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Owns the temp dir and the resolved configuration of one test
pub struct TestContext {
    temp_dir: TempDir,
    config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        Self::from_builder(ConfigBuilder::new())
    }

    pub fn from_builder(builder: ConfigBuilder) -> Self {
        let (config, temp_dir) = builder.persist();
        Self { temp_dir, config }
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Path inside the output tree
    pub fn output_path(&self, relative: &str) -> PathBuf {
        self.config.output_dir.join(relative)
    }

    /// Run the orchestrator against the given collaborators
    pub async fn run<C, R>(&self, control_plane: C, remote: R) -> Report
    where
        C: ControlPlane + 'static,
        R: RemoteExecutor + 'static,
    {
        self.run_shared(Arc::new(control_plane), Arc::new(remote)).await
    }

    /// Run with collaborators the test keeps a handle on
    pub async fn run_shared(
        &self,
        control_plane: Arc<dyn ControlPlane>,
        remote: Arc<dyn RemoteExecutor>,
    ) -> Report {
        BackupOrchestrator::new(self.config.clone(), control_plane, remote)
            .run()
            .await
            .expect("Backup run should not fail fatally")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the result for an application
pub fn app_result<'a>(report: &'a Report, controller: &str, model: &str, app: &str) -> Option<&'a BackupResult> {
    report.results.iter().find(|r| {
        r.source.controller.as_deref() == Some(controller)
            && r.source.environment.as_deref() == Some(model)
            && r.source.application.as_deref() == Some(app)
    })
}
