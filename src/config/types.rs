use crate::strategies::CharmKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_DIR: &str = "juju-backups";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_TASK_TIMEOUT_SECONDS: u64 = 60 * 10;
pub const DEFAULT_CONTROLLER_BACKUP_RETRIES: u32 = 3;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_MAX_FILES: u32 = 10;

/// Root of the optional TOML configuration file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub remote_dirs: RemoteDirsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[backup]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackupSection {
    /// Base directory of the backup tree
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Explicit controllers to back up
    #[serde(default)]
    pub controllers: Vec<String>,

    /// Back up every controller known to the client
    #[serde(default)]
    pub all_controllers: bool,

    #[serde(default)]
    pub exclude_charms: Vec<String>,
    #[serde(default)]
    pub exclude_controllers: Vec<String>,
    #[serde(default)]
    pub exclude_models: Vec<String>,

    #[serde(default)]
    pub backup_controller: Option<bool>,
    #[serde(default)]
    pub backup_client_config: Option<bool>,

    /// Juju client data directory (defaults to $JUJU_DATA or ~/.local/share/juju)
    #[serde(default)]
    pub client_config_dir: Option<PathBuf>,

    /// Maximum number of items backed up at once
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Per-item timeout
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    #[serde(default)]
    pub controller_backup_retries: Option<u32>,
}

/// `[remote_dirs]` section: where each charm writes its backup on the unit
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteDirsSection {
    #[serde(default)]
    pub postgresql: Option<String>,
    #[serde(default)]
    pub mysql: Option<String>,
    #[serde(default)]
    pub etcd: Option<String>,
}

/// `[logging]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    /// Directory for rotated log files (console only when unset)
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub max_files: Option<u32>,
    /// Write the log file as JSON lines
    #[serde(default)]
    pub json: bool,
}

/// Settings given on the command line; they win over the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub controllers: Vec<String>,
    pub all_controllers: bool,
    pub exclude_charms: Vec<String>,
    pub exclude_controllers: Vec<String>,
    pub exclude_models: Vec<String>,
    pub skip_controller_backup: bool,
    pub skip_client_config_backup: bool,
    pub client_config_dir: Option<PathBuf>,
    pub backup_location_on_postgresql: Option<String>,
    pub backup_location_on_mysql: Option<String>,
    pub backup_location_on_etcd: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub log_level: Option<String>,
    pub log_directory: Option<PathBuf>,
}

/// Which controllers a run targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerSelection {
    /// The controller currently selected in the Juju client
    Current,
    /// Every controller registered with the client
    All,
    Named(Vec<String>),
}

impl ControllerSelection {
    /// Short label for logs and discovery errors
    pub fn describe(&self) -> String {
        match self {
            ControllerSelection::Current => "current controller".to_string(),
            ControllerSelection::All => "all controllers".to_string(),
            ControllerSelection::Named(names) => names.join(", "),
        }
    }
}

/// Remote base directory per charm kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDirs {
    pub postgresql: String,
    pub mysql: String,
    pub etcd: String,
}

impl RemoteDirs {
    pub fn for_kind(&self, kind: CharmKind) -> &str {
        match kind {
            CharmKind::Postgresql => &self.postgresql,
            CharmKind::MysqlInnodbCluster => &self.mysql,
            CharmKind::Etcd => &self.etcd,
        }
    }
}

impl Default for RemoteDirs {
    fn default() -> Self {
        Self {
            postgresql: CharmKind::Postgresql.default_base_dir().to_string(),
            mysql: CharmKind::MysqlInnodbCluster.default_base_dir().to_string(),
            etcd: CharmKind::Etcd.default_base_dir().to_string(),
        }
    }
}

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub directory: Option<PathBuf>,
    pub max_files: u32,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
            max_files: DEFAULT_LOG_MAX_FILES,
            json: false,
        }
    }
}

/// Immutable configuration for one run, shared by the orchestrator, the
/// scanner and every strategy
#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub controllers: ControllerSelection,
    pub excluded_charms: Vec<String>,
    pub excluded_controllers: Vec<String>,
    pub excluded_models: Vec<String>,
    pub backup_controller: bool,
    pub backup_client_config: bool,
    pub client_config_dir: Option<PathBuf>,
    pub remote_dirs: RemoteDirs,
    pub concurrency: usize,
    pub timeout: Duration,
    pub controller_backup_retries: u32,
    pub logging: LogSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            controllers: ControllerSelection::Current,
            excluded_charms: Vec::new(),
            excluded_controllers: Vec::new(),
            excluded_models: Vec::new(),
            backup_controller: true,
            backup_client_config: true,
            client_config_dir: None,
            remote_dirs: RemoteDirs::default(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECONDS),
            controller_backup_retries: DEFAULT_CONTROLLER_BACKUP_RETRIES,
            logging: LogSettings::default(),
        }
    }
}

impl Config {
    pub fn is_charm_excluded(&self, charm: &str) -> bool {
        self.excluded_charms.iter().any(|c| c == charm)
    }

    pub fn is_controller_excluded(&self, controller: &str) -> bool {
        self.excluded_controllers.iter().any(|c| c == controller)
    }

    pub fn is_model_excluded(&self, model: &str) -> bool {
        self.excluded_models.iter().any(|m| m == model)
    }
}
