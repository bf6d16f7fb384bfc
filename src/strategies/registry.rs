//! Charm name to backup strategy lookup

use super::charm::{CharmBackup, CharmKind};
use crate::config::RemoteDirs;

/// Charms that expose a backup capability
pub const SUPPORTED_CHARMS: [&str; 3] = ["mysql-innodb-cluster", "etcd", "postgresql"];

/// Resolve the backup strategy for a charm
///
/// `None` means the application is not backable and must be skipped
/// silently.
pub fn resolve(charm: &str, remote_dirs: &RemoteDirs) -> Option<CharmBackup> {
    let kind = CharmKind::from_charm_name(charm)?;
    Some(CharmBackup::new(kind, remote_dirs.for_kind(kind)))
}
