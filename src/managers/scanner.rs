//! Environment scanner: models and backable applications of one controller

use super::results::{BackupResult, ItemSource};
use crate::config::Config;
use crate::strategies::{self, BackupStrategy};
use crate::utils::juju::ControlPlane;
use tracing::{debug, info, warn};

/// A unit of work for the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupItem {
    pub source: ItemSource,
    pub strategy: BackupStrategy,
}

#[derive(Debug, Clone, Default)]
pub struct ScannedEnvironment {
    pub name: String,
    pub items: Vec<BackupItem>,
}

/// Snapshot of one controller taken at discovery time
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub controller: String,
    /// In the order the control plane reported them
    pub environments: Vec<ScannedEnvironment>,
    /// Discovery failures, already in result form
    pub failures: Vec<BackupResult>,
}

impl ScanReport {
    pub fn item_count(&self) -> usize {
        self.environments.iter().map(|e| e.items.len()).sum()
    }

    pub fn into_items(self) -> Vec<BackupItem> {
        self.environments.into_iter().flat_map(|e| e.items).collect()
    }
}

pub struct EnvironmentScanner<'a> {
    config: &'a Config,
    control_plane: &'a dyn ControlPlane,
}

impl<'a> EnvironmentScanner<'a> {
    pub fn new(config: &'a Config, control_plane: &'a dyn ControlPlane) -> Self {
        Self {
            config,
            control_plane,
        }
    }

    /// List models and applications of a controller and resolve a strategy
    /// for each backable application
    ///
    /// Excluded models and charms are dropped before resolution; a failed
    /// model listing only loses that model.
    pub fn scan(&self, controller: &str) -> ScanReport {
        let mut report = ScanReport {
            controller: controller.to_string(),
            ..Default::default()
        };

        let environments = match self.control_plane.list_environments(controller) {
            Ok(envs) => envs,
            Err(e) => {
                warn!("[{}] Discovery failed: {}", controller, e);
                report.failures.push(BackupResult::failure(
                    ItemSource::discovery(controller, None, None),
                    e,
                ));
                return report;
            }
        };

        for environment in environments {
            if self.config.is_model_excluded(&environment) {
                debug!("[{} {}] Model excluded", controller, environment);
                continue;
            }
            let scanned = self.scan_environment(controller, &environment, &mut report.failures);
            report.environments.push(scanned);
        }

        info!(
            "[{}] Found {} backable applications in {} models",
            controller,
            report.item_count(),
            report.environments.len()
        );
        report
    }

    fn scan_environment(
        &self,
        controller: &str,
        environment: &str,
        failures: &mut Vec<BackupResult>,
    ) -> ScannedEnvironment {
        let mut scanned = ScannedEnvironment {
            name: environment.to_string(),
            items: Vec::new(),
        };

        let applications = match self.control_plane.list_applications(controller, environment) {
            Ok(apps) => apps,
            Err(e) => {
                warn!("[{} {}] Discovery failed: {}", controller, environment, e);
                failures.push(BackupResult::failure(
                    ItemSource::discovery(controller, Some(environment), None),
                    e,
                ));
                return scanned;
            }
        };

        for app in applications {
            if self.config.is_charm_excluded(&app.charm) {
                debug!("[{} {} {}] Charm {} excluded", controller, environment, app.name, app.charm);
                continue;
            }
            let Some(charm) = strategies::resolve(&app.charm, &self.config.remote_dirs) else {
                continue;
            };

            let units = match self
                .control_plane
                .list_units(controller, environment, &app.name)
            {
                Ok(units) => units,
                Err(e) => {
                    warn!("[{} {} {}] Discovery failed: {}", controller, environment, app.name, e);
                    failures.push(BackupResult::failure(
                        ItemSource::discovery(controller, Some(environment), Some(&app.name)),
                        e,
                    ));
                    continue;
                }
            };

            debug!(
                "[{} {} {}] Will back up with {} units",
                controller,
                environment,
                app.name,
                units.len()
            );
            scanned.items.push(BackupItem {
                source: ItemSource::application(controller, environment, &app.name, &app.charm),
                strategy: BackupStrategy::Application {
                    controller: controller.to_string(),
                    environment: environment.to_string(),
                    application: app.name,
                    units,
                    charm,
                },
            });
        }

        scanned
    }
}
