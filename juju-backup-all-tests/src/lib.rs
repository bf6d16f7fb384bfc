//! Test utilities for juju-backup-all
//!
//! Shared builders, canned `juju` output and a test harness. The mock
//! collaborators live in the main crate and are re-exported here.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockControlPlane, MockRemote, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::new());
//!     let fleet = MockControlPlane::new().with_controller("ctl1");
//!     let report = ctx.run(fleet, MockRemote::new()).await;
//!     assert_eq!(report.exit_code(), 0);
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{app_result, TestContext};

// Re-export types from the main crate for convenience
pub use juju_backup_all::config::{CliOverrides, Config, ControllerSelection, FileConfig};
pub use juju_backup_all::errors::BackupError;
pub use juju_backup_all::managers::{BackupResult, ItemKind, ItemSource, Report};

// Re-export mock implementations from the main crate
pub use juju_backup_all::utils::executor::mock::{MockExecutor, MockResponse};
pub use juju_backup_all::utils::executor::CommandExecutor;
pub use juju_backup_all::utils::juju::mock::MockControlPlane;
pub use juju_backup_all::utils::juju::ControlPlane;
pub use juju_backup_all::utils::remote::mock::{MockRemote, RemoteBehaviour, RemoteCall};
pub use juju_backup_all::utils::remote::RemoteExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
