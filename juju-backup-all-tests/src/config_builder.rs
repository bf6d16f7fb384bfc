//! Fluent API for building test configurations
//!
//! The builder fills a [`FileConfig`] and [`CliOverrides`] and resolves them
//! through the real loader, so tests exercise the same validation as the
//! binary.

use juju_backup_all::config::{resolve_config, CliOverrides, Config, ConfigError, FileConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    file: FileConfig,
    cli: CliOverrides,
}

impl ConfigBuilder {
    /// Output tree and a small Juju data directory inside a fresh temp dir
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let juju_data = temp_dir.path().join("juju");
        fs::create_dir_all(juju_data.join("cookies")).expect("Failed to create juju data dir");
        fs::write(juju_data.join("controllers.yaml"), "controllers: {}\n")
            .expect("Failed to write controllers.yaml");
        fs::write(juju_data.join("cookies").join("ctl1.json"), "[]")
            .expect("Failed to write cookie file");

        let mut file = FileConfig::default();
        file.backup.output_dir = Some(temp_dir.path().join("backups"));
        file.backup.client_config_dir = Some(juju_data);

        Self {
            temp_dir,
            file,
            cli: CliOverrides::default(),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Back up one named controller (repeatable)
    pub fn controller(mut self, name: &str) -> Self {
        self.cli.controllers.push(name.to_string());
        self
    }

    pub fn all_controllers(mut self) -> Self {
        self.cli.all_controllers = true;
        self
    }

    pub fn exclude_charm(mut self, charm: &str) -> Self {
        self.cli.exclude_charms.push(charm.to_string());
        self
    }

    pub fn exclude_controller(mut self, controller: &str) -> Self {
        self.cli.exclude_controllers.push(controller.to_string());
        self
    }

    pub fn exclude_model(mut self, model: &str) -> Self {
        self.cli.exclude_models.push(model.to_string());
        self
    }

    pub fn without_client_config(mut self) -> Self {
        self.cli.skip_client_config_backup = true;
        self
    }

    pub fn without_controller_backup(mut self) -> Self {
        self.cli.skip_controller_backup = true;
        self
    }

    /// Point the client config backup somewhere else
    pub fn client_config_dir(mut self, dir: PathBuf) -> Self {
        self.file.backup.client_config_dir = Some(dir);
        self
    }

    pub fn postgresql_dir(mut self, dir: &str) -> Self {
        self.cli.backup_location_on_postgresql = Some(dir.to_string());
        self
    }

    pub fn mysql_dir(mut self, dir: &str) -> Self {
        self.cli.backup_location_on_mysql = Some(dir.to_string());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.cli.concurrency = Some(n);
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.cli.timeout_seconds = Some(seconds);
        self
    }

    pub fn controller_backup_retries(mut self, attempts: u32) -> Self {
        self.file.backup.controller_backup_retries = Some(attempts);
        self
    }

    /// The file half of the configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string(&self.file).expect("Failed to serialize config")
    }

    /// Resolve without panicking on validation errors
    pub fn try_persist(self) -> (Result<Config, ConfigError>, TempDir) {
        (resolve_config(self.file, self.cli), self.temp_dir)
    }

    /// Resolve and keep the temp dir alive alongside the config
    pub fn persist(self) -> (Config, TempDir) {
        let (config, temp_dir) = self.try_persist();
        (config.expect("Test configuration should be valid"), temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
