//! Control-plane client
//!
//! Lists controllers, models (environments), applications and units, and
//! triggers native controller backups. The production implementation shells
//! out to the `juju` CLI and parses its JSON output.

use super::executor::{CommandExecutor, RealExecutor};
use crate::errors::BackupError;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A deployed application as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub name: String,
    /// Bare charm name, e.g. `postgresql`
    pub charm: String,
}

/// A unit backing an application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub leader: bool,
    pub workload_status: String,
    pub agent_status: String,
}

impl Unit {
    /// Units in error or with a lost agent are never chosen for a backup
    pub fn is_healthy(&self) -> bool {
        self.workload_status != "error" && !matches!(self.agent_status.as_str(), "lost" | "failed")
    }
}

/// Abstraction over the Juju control plane, enabling mocking in tests
pub trait ControlPlane: Send + Sync {
    /// Names of every controller known to the local client
    fn list_controllers(&self) -> Result<Vec<String>, BackupError>;

    /// Name of the currently selected controller
    fn current_controller(&self) -> Result<String, BackupError>;

    /// Model names on a controller, in reported order
    fn list_environments(&self, controller: &str) -> Result<Vec<String>, BackupError>;

    /// Applications deployed in a model, in reported order
    fn list_applications(
        &self,
        controller: &str,
        environment: &str,
    ) -> Result<Vec<Application>, BackupError>;

    /// Units of one application
    fn list_units(
        &self,
        controller: &str,
        environment: &str,
        application: &str,
    ) -> Result<Vec<Unit>, BackupError>;

    /// Create a controller backup and download it to `destination`
    fn trigger_controller_backup(
        &self,
        controller: &str,
        destination: &Path,
    ) -> Result<PathBuf, BackupError>;
}

/// Check if the juju binary is available on PATH
pub fn juju_exists() -> bool {
    which::which("juju").is_ok()
}

/// Extract the bare charm name from a charm URL
///
/// `cs:~containers/etcd-553` -> `etcd`, `ch:amd64/focal/postgresql-429` ->
/// `postgresql`, `mysql-innodb-cluster` -> `mysql-innodb-cluster`.
pub fn parse_charm_name(charm_url: &str) -> String {
    let without_schema = charm_url
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(charm_url);
    let last_segment = without_schema.rsplit('/').next().unwrap_or(without_schema);

    // Strip a trailing revision only when the schema implies one
    if charm_url.contains(':') {
        if let Some((name, revision)) = last_segment.rsplit_once('-') {
            if !revision.is_empty() && revision.chars().all(|c| c.is_ascii_digit()) {
                return name.to_string();
            }
        }
    }
    last_segment.to_string()
}

#[derive(Debug, Deserialize)]
struct ControllersOutput {
    #[serde(default)]
    controllers: serde_json::Map<String, Value>,
    #[serde(rename = "current-controller", default)]
    current_controller: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsOutput {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(rename = "short-name", default)]
    short_name: Option<String>,
}

/// Control plane backed by the `juju` CLI
pub struct JujuCli {
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

impl JujuCli {
    pub fn new(timeout: Duration) -> Self {
        Self::with_executor(Arc::new(RealExecutor::new()), timeout)
    }

    pub fn with_executor(executor: Arc<dyn CommandExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    fn juju_json(&self, args: &[&str], context: &str) -> Result<Value, BackupError> {
        let output = self
            .executor
            .run_checked("juju", args, self.timeout)
            .map_err(|e| BackupError::discovery(context, e))?;

        serde_json::from_str(&output.stdout).map_err(|e| {
            BackupError::Discovery(format!("{}: unparsable juju output: {}", context, e))
        })
    }

    fn controllers(&self) -> Result<ControllersOutput, BackupError> {
        let value = self.juju_json(&["controllers", "--format", "json"], "listing controllers")?;
        serde_json::from_value(value).map_err(|e| {
            BackupError::Discovery(format!("listing controllers: unexpected format: {}", e))
        })
    }

    fn status(
        &self,
        controller: &str,
        environment: &str,
        application: Option<&str>,
    ) -> Result<Value, BackupError> {
        let model = format!("{}:{}", controller, environment);
        let context = format!("reading status of model '{}'", model);
        let mut args = vec!["status", "-m", model.as_str()];
        if let Some(app) = application {
            args.push(app);
        }
        args.extend(["--format", "json"]);
        self.juju_json(&args, &context)
    }
}

impl ControlPlane for JujuCli {
    fn list_controllers(&self) -> Result<Vec<String>, BackupError> {
        let controllers = self.controllers()?;
        Ok(controllers.controllers.keys().cloned().collect())
    }

    fn current_controller(&self) -> Result<String, BackupError> {
        self.controllers()?
            .current_controller
            .filter(|name| !name.is_empty())
            .ok_or_else(|| BackupError::Discovery("no current controller is selected".to_string()))
    }

    fn list_environments(&self, controller: &str) -> Result<Vec<String>, BackupError> {
        let context = format!("listing models for controller '{}'", controller);
        let value = self.juju_json(&["models", "-c", controller, "--format", "json"], &context)?;
        let models: ModelsOutput = serde_json::from_value(value).map_err(|e| {
            BackupError::Discovery(format!("{}: unexpected format: {}", context, e))
        })?;

        Ok(models
            .models
            .into_iter()
            .map(|m| match m.short_name {
                Some(short) => short,
                // Full names look like `admin/default`
                None => m.name.rsplit('/').next().unwrap_or(&m.name).to_string(),
            })
            .collect())
    }

    fn list_applications(
        &self,
        controller: &str,
        environment: &str,
    ) -> Result<Vec<Application>, BackupError> {
        let status = self.status(controller, environment, None)?;
        Ok(parse_applications(&status))
    }

    fn list_units(
        &self,
        controller: &str,
        environment: &str,
        application: &str,
    ) -> Result<Vec<Unit>, BackupError> {
        let status = self.status(controller, environment, Some(application))?;
        Ok(parse_units(&status, application))
    }

    fn trigger_controller_backup(
        &self,
        controller: &str,
        destination: &Path,
    ) -> Result<PathBuf, BackupError> {
        let model = format!("{}:controller", controller);
        let filename = destination.display().to_string();
        info!("[{}] Creating controller backup", controller);

        self.executor
            .run_checked(
                "juju",
                &["create-backup", "-m", &model, "--filename", &filename],
                self.timeout,
            )
            .map_err(|e| match e {
                super::command::CommandError::Timeout { command, timeout } => BackupError::Timeout {
                    task: command,
                    timeout,
                },
                other => BackupError::ControllerBackup(other.to_string()),
            })?;

        Ok(destination.to_path_buf())
    }
}

/// Applications from `juju status --format json`, in document order
pub fn parse_applications(status: &Value) -> Vec<Application> {
    let Some(apps) = status.get("applications").and_then(Value::as_object) else {
        return Vec::new();
    };

    apps.iter()
        .map(|(name, app)| {
            let charm = app
                .get("charm-name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| app.get("charm").and_then(Value::as_str).map(parse_charm_name))
                .unwrap_or_default();
            debug!("Found application {} (charm {})", name, charm);
            Application {
                name: name.clone(),
                charm,
            }
        })
        .collect()
}

/// Units of one application from `juju status --format json`
pub fn parse_units(status: &Value, application: &str) -> Vec<Unit> {
    let Some(units) = status
        .get("applications")
        .and_then(|apps| apps.get(application))
        .and_then(|app| app.get("units"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let current = |unit: &Value, key: &str| {
        unit.get(key)
            .and_then(|s| s.get("current"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    };

    units
        .iter()
        .map(|(name, unit)| Unit {
            name: name.clone(),
            leader: unit.get("leader").and_then(Value::as_bool).unwrap_or(false),
            workload_status: current(unit, "workload-status"),
            agent_status: current(unit, "juju-status"),
        })
        .collect()
}

/// Mock control plane for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default)]
    struct MockModel {
        name: String,
        applications: Vec<(Application, Vec<Unit>)>,
    }

    #[derive(Debug, Clone, Default)]
    struct MockController {
        name: String,
        models: Vec<MockModel>,
    }

    /// In-memory fleet of controllers, models and applications
    #[derive(Default)]
    pub struct MockControlPlane {
        controllers: Mutex<Vec<MockController>>,
        current: Mutex<Option<String>>,
        unreachable: Mutex<HashSet<String>>,
        failing_models: Mutex<HashSet<String>>,
        failing_backups: Mutex<HashMap<String, u32>>,
        /// Recorded controller backup attempts
        pub backup_attempts: Mutex<Vec<String>>,
    }

    impl MockControlPlane {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a controller; the first one added becomes current
        pub fn with_controller(self, name: &str) -> Self {
            {
                let mut controllers = self.controllers.lock().unwrap();
                controllers.push(MockController {
                    name: name.to_string(),
                    models: Vec::new(),
                });
                let mut current = self.current.lock().unwrap();
                if current.is_none() {
                    *current = Some(name.to_string());
                }
            }
            self
        }

        /// Add a model to an existing controller
        pub fn with_model(self, controller: &str, model: &str) -> Self {
            {
                let mut controllers = self.controllers.lock().unwrap();
                if let Some(c) = controllers.iter_mut().find(|c| c.name == controller) {
                    c.models.push(MockModel {
                        name: model.to_string(),
                        applications: Vec::new(),
                    });
                }
            }
            self
        }

        /// Add an application whose units are named `<app>/<n>`; unit 0 leads
        pub fn with_application(
            self,
            controller: &str,
            model: &str,
            app: &str,
            charm: &str,
            unit_count: usize,
        ) -> Self {
            let units = (0..unit_count)
                .map(|i| Unit {
                    name: format!("{}/{}", app, i),
                    leader: i == 0,
                    workload_status: "active".to_string(),
                    agent_status: "idle".to_string(),
                })
                .collect();
            self.with_units(controller, model, app, charm, units)
        }

        /// Add an application with explicit units
        pub fn with_units(
            self,
            controller: &str,
            model: &str,
            app: &str,
            charm: &str,
            units: Vec<Unit>,
        ) -> Self {
            {
                let mut controllers = self.controllers.lock().unwrap();
                if let Some(m) = controllers
                    .iter_mut()
                    .find(|c| c.name == controller)
                    .and_then(|c| c.models.iter_mut().find(|m| m.name == model))
                {
                    m.applications.push((
                        Application {
                            name: app.to_string(),
                            charm: charm.to_string(),
                        },
                        units,
                    ));
                }
            }
            self
        }

        /// Select the current controller
        pub fn with_current(self, controller: &str) -> Self {
            *self.current.lock().unwrap() = Some(controller.to_string());
            self
        }

        /// Make every listing call against a controller fail
        pub fn with_unreachable(self, controller: &str) -> Self {
            self.unreachable.lock().unwrap().insert(controller.to_string());
            self
        }

        /// Make application listing fail for one model
        pub fn with_failing_model(self, controller: &str, model: &str) -> Self {
            self.failing_models
                .lock()
                .unwrap()
                .insert(format!("{}:{}", controller, model));
            self
        }

        /// Make the first `failures` controller backup attempts fail
        pub fn with_failing_controller_backup(self, controller: &str, failures: u32) -> Self {
            self.failing_backups
                .lock()
                .unwrap()
                .insert(controller.to_string(), failures);
            self
        }

        pub fn backup_attempts_for(&self, controller: &str) -> usize {
            self.backup_attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|c| *c == controller)
                .count()
        }

        fn check_reachable(&self, controller: &str) -> Result<(), BackupError> {
            if self.unreachable.lock().unwrap().contains(controller) {
                return Err(BackupError::Discovery(format!(
                    "controller '{}' is unreachable",
                    controller
                )));
            }
            Ok(())
        }

        fn model(&self, controller: &str, environment: &str) -> Result<MockModel, BackupError> {
            self.check_reachable(controller)?;
            if self
                .failing_models
                .lock()
                .unwrap()
                .contains(&format!("{}:{}", controller, environment))
            {
                return Err(BackupError::Discovery(format!(
                    "model '{}:{}' could not be read",
                    controller, environment
                )));
            }
            self.controllers
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.name == controller)
                .and_then(|c| c.models.iter().find(|m| m.name == environment))
                .cloned()
                .ok_or_else(|| {
                    BackupError::Discovery(format!(
                        "model '{}:{}' not found",
                        controller, environment
                    ))
                })
        }
    }

    impl ControlPlane for MockControlPlane {
        fn list_controllers(&self) -> Result<Vec<String>, BackupError> {
            Ok(self
                .controllers
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.name.clone())
                .collect())
        }

        fn current_controller(&self) -> Result<String, BackupError> {
            self.current
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| BackupError::Discovery("no current controller".to_string()))
        }

        fn list_environments(&self, controller: &str) -> Result<Vec<String>, BackupError> {
            self.check_reachable(controller)?;
            self.controllers
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.name == controller)
                .map(|c| c.models.iter().map(|m| m.name.clone()).collect())
                .ok_or_else(|| {
                    BackupError::Discovery(format!("controller '{}' not found", controller))
                })
        }

        fn list_applications(
            &self,
            controller: &str,
            environment: &str,
        ) -> Result<Vec<Application>, BackupError> {
            let model = self.model(controller, environment)?;
            Ok(model.applications.into_iter().map(|(app, _)| app).collect())
        }

        fn list_units(
            &self,
            controller: &str,
            environment: &str,
            application: &str,
        ) -> Result<Vec<Unit>, BackupError> {
            let model = self.model(controller, environment)?;
            Ok(model
                .applications
                .into_iter()
                .find(|(app, _)| app.name == application)
                .map(|(_, units)| units)
                .unwrap_or_default())
        }

        fn trigger_controller_backup(
            &self,
            controller: &str,
            destination: &Path,
        ) -> Result<PathBuf, BackupError> {
            self.backup_attempts
                .lock()
                .unwrap()
                .push(controller.to_string());

            {
                let mut failing = self.failing_backups.lock().unwrap();
                if let Some(remaining) = failing.get_mut(controller) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(BackupError::ControllerBackup(format!(
                            "backup of controller '{}' failed",
                            controller
                        )));
                    }
                }
            }

            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent).map_err(|e| BackupError::Io(e.to_string()))?;
            }
            std::fs::write(destination, format!("controller backup of {}", controller))
                .map_err(|e| BackupError::Io(e.to_string()))?;
            Ok(destination.to_path_buf())
        }
    }
}
