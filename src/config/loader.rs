use super::expand_tilde;
use super::types::*;
use crate::strategies::CharmKind;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load a TOML configuration file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Merge file settings with command-line overrides and validate the result
pub fn resolve_config(file: FileConfig, cli: CliOverrides) -> Result<Config> {
    let backup = file.backup;

    if backup.all_controllers && !backup.controllers.is_empty() {
        return Err(ConfigError::ValidationError(
            "'controllers' and 'all_controllers' are mutually exclusive".to_string(),
        ));
    }
    if cli.all_controllers && !cli.controllers.is_empty() {
        return Err(ConfigError::ValidationError(
            "--controller and --all-controllers are mutually exclusive".to_string(),
        ));
    }

    // A selection on the command line replaces the one from the file
    let controllers = if cli.all_controllers {
        ControllerSelection::All
    } else if !cli.controllers.is_empty() {
        ControllerSelection::Named(cli.controllers)
    } else if backup.all_controllers {
        ControllerSelection::All
    } else if !backup.controllers.is_empty() {
        ControllerSelection::Named(backup.controllers)
    } else {
        ControllerSelection::Current
    };

    let output_dir = cli
        .output_dir
        .or(backup.output_dir)
        .map(|p| expand_tilde(&p))
        .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.into());

    let excluded_charms = merge(backup.exclude_charms, cli.exclude_charms);
    for charm in &excluded_charms {
        if CharmKind::from_charm_name(charm).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Cannot exclude unsupported charm '{}' (supported: {})",
                charm,
                CharmKind::supported_names().join(", ")
            )));
        }
    }

    let remote_dirs = RemoteDirs {
        postgresql: cli
            .backup_location_on_postgresql
            .or(file.remote_dirs.postgresql)
            .unwrap_or_else(|| CharmKind::Postgresql.default_base_dir().to_string()),
        mysql: cli
            .backup_location_on_mysql
            .or(file.remote_dirs.mysql)
            .unwrap_or_else(|| CharmKind::MysqlInnodbCluster.default_base_dir().to_string()),
        etcd: cli
            .backup_location_on_etcd
            .or(file.remote_dirs.etcd)
            .unwrap_or_else(|| CharmKind::Etcd.default_base_dir().to_string()),
    };
    for kind in CharmKind::ALL {
        let dir = remote_dirs.for_kind(kind);
        if !dir.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Remote backup location for {} must be an absolute path: {}",
                kind.charm_name(),
                dir
            )));
        }
    }

    let concurrency = cli
        .concurrency
        .or(backup.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "concurrency must be at least 1".to_string(),
        ));
    }

    let timeout_seconds = cli
        .timeout_seconds
        .or(backup.timeout_seconds)
        .unwrap_or(DEFAULT_TASK_TIMEOUT_SECONDS);
    if timeout_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "timeout must be greater than zero".to_string(),
        ));
    }

    let controller_backup_retries = backup
        .controller_backup_retries
        .unwrap_or(DEFAULT_CONTROLLER_BACKUP_RETRIES);
    if controller_backup_retries == 0 {
        return Err(ConfigError::ValidationError(
            "controller_backup_retries must be at least 1".to_string(),
        ));
    }

    let logging = LogSettings {
        level: cli
            .log_level
            .or(file.logging.level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase(),
        directory: cli
            .log_directory
            .or(file.logging.directory)
            .map(|p| expand_tilde(&p)),
        max_files: file.logging.max_files.unwrap_or(DEFAULT_LOG_MAX_FILES),
        json: file.logging.json,
    };

    Ok(Config {
        output_dir,
        controllers,
        excluded_charms,
        excluded_controllers: merge(backup.exclude_controllers, cli.exclude_controllers),
        excluded_models: merge(backup.exclude_models, cli.exclude_models),
        backup_controller: !cli.skip_controller_backup && backup.backup_controller.unwrap_or(true),
        backup_client_config: !cli.skip_client_config_backup
            && backup.backup_client_config.unwrap_or(true),
        client_config_dir: cli
            .client_config_dir
            .or(backup.client_config_dir)
            .map(|p| expand_tilde(&p)),
        remote_dirs,
        concurrency,
        timeout: Duration::from_secs(timeout_seconds),
        controller_backup_retries,
        logging,
    })
}

/// Union of two lists, keeping first-seen order
fn merge(mut base: Vec<String>, extra: Vec<String>) -> Vec<String> {
    for item in extra {
        if !base.contains(&item) {
            base.push(item);
        }
    }
    base
}
