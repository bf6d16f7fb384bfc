//! Backup orchestrator - drives a run through Init, Discover, Execute and
//! Finalize
//!
//! Only an unusable output directory (or a held lock) aborts a run. Every
//! other failure becomes a [`BackupResult`] and the run carries on.

use super::layout::OutputLayout;
use super::report::Report;
use super::results::{BackupResult, ItemSource, ResultAggregator};
use super::scanner::{BackupItem, EnvironmentScanner, ScanReport};
use crate::config::{Config, ControllerSelection};
use crate::errors::BackupError;
use crate::strategies::client_config::default_client_config_dir;
use crate::strategies::{BackupContext, BackupStrategy};
use crate::utils::juju::ControlPlane;
use crate::utils::locker::OutputLock;
use crate::utils::remote::RemoteExecutor;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A successful artifact waiting in staging
#[derive(Debug)]
struct StagedMove {
    staged: PathBuf,
    destination: PathBuf,
}

pub struct BackupOrchestrator {
    config: Arc<Config>,
    control_plane: Arc<dyn ControlPlane>,
    remote: Arc<dyn RemoteExecutor>,
    layout: OutputLayout,
}

impl BackupOrchestrator {
    pub fn new(
        config: Config,
        control_plane: Arc<dyn ControlPlane>,
        remote: Arc<dyn RemoteExecutor>,
    ) -> Self {
        let layout = OutputLayout::new(config.output_dir.clone());
        Self {
            config: Arc::new(config),
            control_plane,
            remote,
            layout,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run every backup and build the report
    pub async fn run(&self) -> Result<Report> {
        let started_at = Utc::now();

        // Init
        prepare_output_dir(self.layout.base())?;
        let mut lock = OutputLock::open(self.layout.base())?;
        let _guard = lock.try_acquire()?;

        let results = Arc::new(ResultAggregator::new());
        let controllers = self.resolve_controllers(&results).await;
        info!(
            "Backing up {} controller(s) into {:?}",
            controllers.len(),
            self.layout.base()
        );

        // Discover
        let items = self.discover(&controllers, &results).await;
        info!("Discovered {} backup items", items.len());

        // Execute
        let moves = self.execute(items, &results).await;

        // Finalize
        Ok(self.finalize(started_at, &results, moves))
    }

    async fn resolve_controllers(&self, results: &ResultAggregator) -> Vec<String> {
        let selection = self.config.controllers.clone();
        let control_plane = Arc::clone(&self.control_plane);

        let source_name = match &selection {
            ControllerSelection::Current => "current",
            ControllerSelection::All => "all",
            ControllerSelection::Named(_) => "named",
        };

        let resolved = tokio::task::spawn_blocking(move || match selection {
            ControllerSelection::Current => control_plane.current_controller().map(|c| vec![c]),
            ControllerSelection::All => control_plane.list_controllers(),
            ControllerSelection::Named(names) => Ok(names),
        })
        .await
        .unwrap_or_else(|e| Err(BackupError::Io(format!("controller lookup aborted: {}", e))));

        let mut controllers = match resolved {
            Ok(controllers) => controllers,
            Err(e) => {
                error!("Could not resolve controllers: {}", e);
                results.push(BackupResult::failure(
                    ItemSource::discovery(source_name, None, None),
                    e,
                ));
                return Vec::new();
            }
        };

        let mut seen = Vec::new();
        controllers.retain(|c| {
            if self.config.is_controller_excluded(c) {
                info!("[{}] Controller excluded", c);
                return false;
            }
            if seen.contains(c) {
                return false;
            }
            seen.push(c.clone());
            true
        });
        controllers
    }

    fn client_config_item(&self) -> std::result::Result<BackupItem, BackupError> {
        let source_dir = self
            .config
            .client_config_dir
            .clone()
            .or_else(default_client_config_dir)
            .ok_or_else(|| {
                BackupError::ClientConfig("could not locate the Juju client data directory".to_string())
            })?;
        Ok(BackupItem {
            source: ItemSource::client_config(),
            strategy: BackupStrategy::ClientConfig { source_dir },
        })
    }

    /// Scan every controller concurrently and collect items in a stable order
    async fn discover(&self, controllers: &[String], results: &ResultAggregator) -> Vec<BackupItem> {
        let mut items = Vec::new();

        if self.config.backup_client_config {
            match self.client_config_item() {
                Ok(item) => items.push(item),
                Err(e) => results.push(BackupResult::failure(ItemSource::client_config(), e)),
            }
        }

        let scans: Vec<_> = controllers
            .iter()
            .map(|controller| {
                let config = Arc::clone(&self.config);
                let control_plane = Arc::clone(&self.control_plane);
                let name = controller.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    EnvironmentScanner::new(&config, control_plane.as_ref()).scan(&name)
                });
                (controller.clone(), handle)
            })
            .collect();

        for (controller, handle) in scans {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => ScanReport {
                    controller: controller.clone(),
                    failures: vec![BackupResult::failure(
                        ItemSource::discovery(&controller, None, None),
                        BackupError::Discovery(format!("scan of '{}' aborted: {}", controller, e)),
                    )],
                    ..Default::default()
                },
            };

            // Nothing reachable on a controller whose models could not be listed
            let reachable = !report
                .failures
                .iter()
                .any(|f| f.source.environment.is_none());

            for failure in &report.failures {
                results.push(failure.clone());
            }
            items.extend(report.into_items());

            if self.config.backup_controller && reachable {
                items.push(BackupItem {
                    source: ItemSource::controller(&controller),
                    strategy: BackupStrategy::Controller {
                        controller: controller.clone(),
                        attempts: self.config.controller_backup_retries,
                    },
                });
            }
        }

        items
    }

    /// Run items on a bounded pool; each result is recorded as soon as its
    /// item completes
    async fn execute(&self, items: Vec<BackupItem>, results: &Arc<ResultAggregator>) -> Vec<StagedMove> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();

        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let results = Arc::clone(results);
            let control_plane = Arc::clone(&self.control_plane);
            let remote = Arc::clone(&self.remote);
            let layout = self.layout.clone();
            let timeout = self.config.timeout;

            tasks.spawn(async move {
                let permit = semaphore.acquire_owned().await.ok()?;
                run_item(item, permit, control_plane, remote, layout, timeout, &results).await
            });
        }

        let mut moves = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(staged)) => moves.push(staged),
                Ok(None) => {}
                Err(e) => error!("Backup task failed: {}", e),
            }
        }
        moves
    }

    /// Move staged artifacts into the output tree and build the report
    fn finalize(
        &self,
        started_at: chrono::DateTime<Utc>,
        results: &ResultAggregator,
        moves: Vec<StagedMove>,
    ) -> Report {
        let mut failed_moves: Vec<(PathBuf, BackupError)> = Vec::new();
        for staged in moves {
            if let Err(e) = move_into_place(&staged.staged, &staged.destination) {
                error!("Failed to place {:?}: {:#}", staged.destination, e);
                failed_moves.push((staged.destination, BackupError::Io(format!("{:#}", e))));
            }
        }

        let staging_root = self.layout.staging_root();
        if staging_root.exists() {
            if let Err(e) = fs::remove_dir_all(&staging_root) {
                warn!("Failed to remove staging directory {:?}: {}", staging_root, e);
            }
        }

        let results = results
            .all()
            .into_iter()
            .map(|result| {
                let failed = failed_moves
                    .iter()
                    .find(|(dest, _)| result.artifact.as_ref() == Some(dest));
                match failed {
                    Some((_, err)) => BackupResult::failure(result.source, err.clone()),
                    None => result,
                }
            })
            .collect();

        let report = Report::new(started_at, results);
        report.log_summary();
        report
    }
}

async fn run_item(
    item: BackupItem,
    permit: OwnedSemaphorePermit,
    control_plane: Arc<dyn ControlPlane>,
    remote: Arc<dyn RemoteExecutor>,
    layout: OutputLayout,
    timeout: Duration,
    results: &ResultAggregator,
) -> Option<StagedMove> {
    let BackupItem { source, strategy } = item;
    let label = strategy.label();
    let file_name = strategy.artifact_file_name();
    let staging_dir = layout.staging_dir(&source);

    info!("Starting {}", label);
    // The pool slot is released only when the blocking work itself ends
    let mut task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let ctx = BackupContext {
            control_plane: control_plane.as_ref(),
            remote: remote.as_ref(),
            staging_dir: &staging_dir,
            timeout,
        };
        strategy.backup(&ctx)
    });

    let outcome = match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => Err(BackupError::Io(format!("{} aborted: {}", label, e))),
        Err(_) => {
            let err = BackupError::Timeout {
                task: label.clone(),
                timeout,
            };
            error!("{} failed: {}", label, err);
            results.push(BackupResult::failure(source, err));

            // The blocking work cannot be interrupted. Wait for it so nothing
            // writes into the tree after Finalize, and drop what it staged.
            if let Ok(Ok(late)) = task.await {
                debug!("Discarding late artifact of {}: {:?}", label, late.path);
                if let Err(e) = fs::remove_file(&late.path) {
                    warn!("Failed to remove late artifact {:?}: {}", late.path, e);
                }
            }
            return None;
        }
    };

    match outcome {
        Ok(staged) => {
            let source = source.with_unit(staged.unit);
            let destination = layout.final_path(&source, file_name);
            info!("Finished {}", label);
            results.push(BackupResult::success(source, destination.clone()));
            Some(StagedMove {
                staged: staged.path,
                destination,
            })
        }
        Err(e) => {
            error!("{} failed: {}", label, e);
            results.push(BackupResult::failure(source, e));
            None
        }
    }
}

/// Create the base directory and make sure it is writable
fn prepare_output_dir(base: &Path) -> Result<()> {
    fs::create_dir_all(base)
        .with_context(|| format!("Failed to create output directory {:?}", base))?;

    let probe = base.join(".juju-backup-all.write-test");
    fs::write(&probe, b"")
        .with_context(|| format!("Output directory {:?} is not writable", base))?;
    fs::remove_file(&probe)
        .with_context(|| format!("Failed to clean up write test in {:?}", base))?;

    debug!("Output directory ready: {:?}", base);
    Ok(())
}

/// Rename a staged artifact over its final path
fn move_into_place(staged: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    if fs::rename(staged, destination).is_err() {
        fs::copy(staged, destination)
            .with_context(|| format!("Failed to move {:?} to {:?}", staged, destination))?;
        fs::remove_file(staged).ok();
    }
    debug!("Placed {:?}", destination);
    Ok(())
}
