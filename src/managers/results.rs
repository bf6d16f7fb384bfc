//! Per-item outcomes collected during a run

use crate::errors::BackupError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Controller,
    ClientConfig,
    Application,
    /// A failed listing call rather than a backup
    Discovery,
}

/// Identity of the thing a result is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSource {
    pub kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ItemSource {
    fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            controller: None,
            environment: None,
            application: None,
            charm: None,
            unit: None,
        }
    }

    pub fn client_config() -> Self {
        Self::new(ItemKind::ClientConfig)
    }

    pub fn controller(controller: &str) -> Self {
        Self {
            controller: Some(controller.to_string()),
            ..Self::new(ItemKind::Controller)
        }
    }

    pub fn application(controller: &str, environment: &str, application: &str, charm: &str) -> Self {
        Self {
            controller: Some(controller.to_string()),
            environment: Some(environment.to_string()),
            application: Some(application.to_string()),
            charm: Some(charm.to_string()),
            ..Self::new(ItemKind::Application)
        }
    }

    /// Discovery failure scoped to a controller, a model or one application
    pub fn discovery(controller: &str, environment: Option<&str>, application: Option<&str>) -> Self {
        Self {
            controller: Some(controller.to_string()),
            environment: environment.map(str::to_string),
            application: application.map(str::to_string),
            ..Self::new(ItemKind::Discovery)
        }
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }
}

impl fmt::Display for ItemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ItemKind::ClientConfig {
            return write!(f, "local_configs");
        }

        let parts: Vec<&str> = [&self.controller, &self.environment, &self.application]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        write!(f, "{}", parts.join("/"))?;

        match self.kind {
            ItemKind::Controller => write!(f, " (controller)"),
            ItemKind::Discovery => write!(f, " (discovery)"),
            _ => Ok(()),
        }?;
        if let Some(unit) = &self.unit {
            write!(f, " [{}]", unit)?;
        }
        Ok(())
    }
}

/// Outcome of one item; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupResult {
    pub source: ItemSource,
    /// Final artifact path on success
    pub artifact: Option<PathBuf>,
    pub error: Option<BackupError>,
}

impl BackupResult {
    pub fn success(source: ItemSource, artifact: PathBuf) -> Self {
        Self {
            source,
            artifact: Some(artifact),
            error: None,
        }
    }

    pub fn failure(source: ItemSource, error: BackupError) -> Self {
        Self {
            source,
            artifact: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Append-only, thread-safe collection of results in completion order
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Mutex<Vec<BackupResult>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: BackupResult) {
        self.lock().push(result);
    }

    pub fn all(&self) -> Vec<BackupResult> {
        self.lock().clone()
    }

    pub fn successes(&self) -> Vec<BackupResult> {
        self.lock().iter().filter(|r| r.is_success()).cloned().collect()
    }

    pub fn failures(&self) -> Vec<BackupResult> {
        self.lock().iter().filter(|r| !r.is_success()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BackupResult>> {
        // A poisoned lock still holds every pushed result
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }
}
