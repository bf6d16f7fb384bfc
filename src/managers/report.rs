//! Run report: summary text, JSON and exit status

use super::results::{BackupResult, ItemKind};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct Report {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<BackupResult>,
}

impl Report {
    pub fn new(started_at: DateTime<Utc>, results: Vec<BackupResult>) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            results,
        }
    }

    pub fn successes(&self) -> impl Iterator<Item = &BackupResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BackupResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// 0 only when nothing failed
    pub fn exit_code(&self) -> i32 {
        if self.failures().next().is_none() {
            0
        } else {
            1
        }
    }

    /// Human readable summary
    pub fn summary(&self) -> String {
        let succeeded = self.successes().count();
        let failed = self.failures().count();
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;

        let mut out = format!(
            "Backup run finished in {:.1}s: {} succeeded, {} failed\n",
            elapsed, succeeded, failed
        );
        for result in self.successes() {
            if let Some(path) = &result.artifact {
                let _ = writeln!(out, "  OK    {} -> {}", result.source, path.display());
            }
        }
        for result in self.failures() {
            if let Some(err) = &result.error {
                let _ = writeln!(out, "  FAIL  {}: {}", result.source, err);
            }
        }
        out
    }

    pub fn log_summary(&self) {
        for result in self.failures() {
            if let Some(err) = &result.error {
                error!("{}: {}", result.source, err);
            }
        }
        info!(
            "{} backups succeeded, {} failed",
            self.successes().count(),
            self.failures().count()
        );
    }

    /// JSON rendering grouped by backup kind
    pub fn to_json(&self) -> Value {
        let mut controller_backups = Vec::new();
        let mut config_backups = Vec::new();
        let mut app_backups = Vec::new();
        let mut errors = Vec::new();

        for result in &self.results {
            let source = &result.source;
            match (&result.artifact, &result.error) {
                (_, Some(err)) => {
                    let mut entry = Map::new();
                    insert_opt(&mut entry, "controller", &source.controller);
                    insert_opt(&mut entry, "model", &source.environment);
                    insert_opt(&mut entry, "app", &source.application);
                    insert_opt(&mut entry, "charm", &source.charm);
                    insert_opt(&mut entry, "unit", &source.unit);
                    entry.insert("error_type".to_string(), json!(err.kind()));
                    entry.insert("error_reason".to_string(), json!(err.to_string()));
                    errors.push(Value::Object(entry));
                }
                (Some(path), None) => {
                    let download_path = path.display().to_string();
                    match source.kind {
                        ItemKind::Controller => controller_backups.push(json!({
                            "controller": source.controller,
                            "download_path": download_path,
                        })),
                        ItemKind::ClientConfig => config_backups.push(json!({
                            "config": "juju",
                            "download_path": download_path,
                        })),
                        ItemKind::Application | ItemKind::Discovery => app_backups.push(json!({
                            "controller": source.controller,
                            "model": source.environment,
                            "app": source.application,
                            "charm": source.charm,
                            "unit": source.unit,
                            "download_path": download_path,
                        })),
                    }
                }
                (None, None) => {}
            }
        }

        json!({
            "started_at": self.started_at.to_rfc3339(),
            "finished_at": self.finished_at.to_rfc3339(),
            "controller_backups": controller_backups,
            "config_backups": config_backups,
            "app_backups": app_backups,
            "errors": errors,
        })
    }
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), json!(v));
    }
}
