//! Configuration resolution tests

use juju_backup_all::config::{load_config, resolve_config, CliOverrides, ConfigError};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use test_utils::{sample_config_toml, ConfigBuilder, ControllerSelection};

#[test]
fn test_builder_defaults() {
    let (config, temp) = ConfigBuilder::new().persist();

    assert_eq!(config.output_dir, temp.path().join("backups"));
    assert_eq!(config.controllers, ControllerSelection::Current);
    assert!(config.backup_client_config);
    assert!(config.backup_controller);
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.timeout, Duration::from_secs(600));
}

#[test]
fn test_named_controllers() {
    let (config, _temp) = ConfigBuilder::new()
        .controller("ctl1")
        .controller("ctl2")
        .persist();

    assert_eq!(
        config.controllers,
        ControllerSelection::Named(vec!["ctl1".to_string(), "ctl2".to_string()])
    );
}

#[test]
fn test_named_and_all_conflict() {
    let (result, _temp) = ConfigBuilder::new()
        .controller("ctl1")
        .all_controllers()
        .try_persist();

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_unsupported_exclusion_rejected() {
    let (result, _temp) = ConfigBuilder::new().exclude_charm("swift-proxy").try_persist();
    assert!(result.is_err());
}

#[test]
fn test_builder_round_trips_through_toml() {
    let builder = ConfigBuilder::new().controller_backup_retries(5);
    let path = builder.temp_path().join("config.toml");
    fs::write(&path, builder.to_toml()).unwrap();

    let file = load_config(&path).unwrap();
    let config = resolve_config(file, CliOverrides::default()).unwrap();

    assert_eq!(config.controller_backup_retries, 5);
    assert_eq!(config.output_dir, builder.temp_path().join("backups"));
}

#[test]
fn test_sample_file() {
    let file = toml::from_str(sample_config_toml()).unwrap();
    let config = resolve_config(file, CliOverrides::default()).unwrap();

    assert_eq!(config.output_dir, PathBuf::from("/srv/juju-backups"));
    assert_eq!(config.controllers, ControllerSelection::All);
    assert!(config.is_charm_excluded("etcd"));
    assert!(config.is_model_excluded("sandbox"));
    assert_eq!(config.concurrency, 2);
    assert_eq!(config.remote_dirs.mysql, "/var/lib/mysql-backups");
    assert_eq!(config.remote_dirs.postgresql, "/home/ubuntu");
}

#[test]
fn test_cli_overrides_file() {
    let file = toml::from_str(sample_config_toml()).unwrap();
    let cli = CliOverrides {
        controllers: vec!["ctl9".to_string()],
        concurrency: Some(16),
        backup_location_on_mysql: Some("/tmp/mysql".to_string()),
        ..Default::default()
    };
    let config = resolve_config(file, cli).unwrap();

    assert_eq!(
        config.controllers,
        ControllerSelection::Named(vec!["ctl9".to_string()])
    );
    assert_eq!(config.concurrency, 16);
    assert_eq!(config.remote_dirs.mysql, "/tmp/mysql");
}

#[test]
fn test_missing_file_is_read_error() {
    let result = load_config("/nonexistent/juju-backup-all.toml");
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    fs::write(&path, "[backup\nconcurrency = ").unwrap();

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}
