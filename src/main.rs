use anyhow::{bail, Result};
use clap::Parser;
use juju_backup_all::config::{self, CliOverrides, FileConfig};
use juju_backup_all::managers::logging::{self, LoggingConfig};
use juju_backup_all::utils::juju::juju_exists;
use juju_backup_all::utils::{JujuCli, JujuSsh};
use juju_backup_all::BackupOrchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "juju-backup-all")]
#[command(
    about = "Back up Juju controllers, client config and charm data across every model",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory of the backup tree
    #[arg(short = 'o', long = "output-directory")]
    output_directory: Option<PathBuf>,

    /// Controller to back up (repeatable; defaults to the current controller)
    #[arg(short = 'c', long = "controller", conflicts_with = "all_controllers")]
    controllers: Vec<String>,

    /// Back up every controller known to the client
    #[arg(short = 'A', long)]
    all_controllers: bool,

    /// Charm to skip (repeatable)
    #[arg(short = 'e', long = "exclude-charm", value_parser = supported_charm)]
    exclude_charms: Vec<String>,

    /// Controller to skip (repeatable)
    #[arg(long = "exclude-controller")]
    exclude_controllers: Vec<String>,

    /// Model to skip (repeatable)
    #[arg(long = "exclude-model")]
    exclude_models: Vec<String>,

    /// Skip the native controller backups
    #[arg(short = 'x', long)]
    exclude_controller_backup: bool,

    /// Skip the local Juju client config backup
    #[arg(short = 'j', long)]
    exclude_juju_client_config_backup: bool,

    /// Directory on postgresql units where the dump is written
    #[arg(long)]
    backup_location_on_postgresql: Option<String>,

    /// Directory on mysql-innodb-cluster units where the dump is written
    #[arg(long)]
    backup_location_on_mysql: Option<String>,

    /// Directory on etcd units where the snapshot is written
    #[arg(long)]
    backup_location_on_etcd: Option<String>,

    /// Maximum number of backups running at once
    #[arg(long)]
    parallel: Option<usize>,

    /// Per-item timeout in seconds
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warning, error)
    #[arg(short = 'l', long = "log")]
    log: Option<String>,

    /// Also write rotated log files into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn supported_charm(value: &str) -> std::result::Result<String, String> {
    if juju_backup_all::strategies::SUPPORTED_CHARMS.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "unsupported charm (expected one of: {})",
            juju_backup_all::strategies::SUPPORTED_CHARMS.join(", ")
        ))
    }
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            output_dir: self.output_directory.clone(),
            controllers: self.controllers.clone(),
            all_controllers: self.all_controllers,
            exclude_charms: self.exclude_charms.clone(),
            exclude_controllers: self.exclude_controllers.clone(),
            exclude_models: self.exclude_models.clone(),
            skip_controller_backup: self.exclude_controller_backup,
            skip_client_config_backup: self.exclude_juju_client_config_backup,
            client_config_dir: None,
            backup_location_on_postgresql: self.backup_location_on_postgresql.clone(),
            backup_location_on_mysql: self.backup_location_on_mysql.clone(),
            backup_location_on_etcd: self.backup_location_on_etcd.clone(),
            concurrency: self.parallel,
            timeout_seconds: self.timeout,
            log_level: self.log.clone(),
            log_directory: self.log_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => FileConfig::default(),
    };
    let config = config::resolve_config(file_config, cli.overrides())?;

    // Must stay alive until the report is written
    let guard = logging::init_logging(&LoggingConfig::from_settings(&config.logging))?;

    if !juju_exists() {
        error!("The juju binary was not found on PATH");
        bail!("juju is not installed or not on PATH");
    }

    info!("Starting backup run ({})", config.controllers.describe());
    let timeout = config.timeout;
    let orchestrator = BackupOrchestrator::new(
        config,
        Arc::new(JujuCli::new(timeout)),
        Arc::new(JujuSsh::new()),
    );
    let report = orchestrator.run().await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        print!("{}", report.summary());
    }

    let code = report.exit_code();
    drop(guard);
    std::process::exit(code);
}
