//! Juju Backup All Library
//!
//! Discovers controllers, models and backable applications, runs every
//! backup with per-item failure isolation and lays the artifacts out in a
//! deterministic tree.

pub mod config;
pub mod errors;
pub mod managers;
pub mod strategies;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, resolve_config, CliOverrides, Config, ControllerSelection};
pub use errors::BackupError;
pub use managers::backup::BackupOrchestrator;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::report::Report;
pub use managers::results::{BackupResult, ResultAggregator};
