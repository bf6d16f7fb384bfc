//! Deterministic output tree
//!
//! ```text
//! <base>/local_configs/juju.tar.gz
//! <base>/<controller>/<environment>/<application>/<file>
//! <base>/<controller>/controller/controller/juju-controller-backup.tar.gz
//! ```

use super::results::{ItemKind, ItemSource};
use std::path::{Path, PathBuf};

pub const LOCAL_CONFIGS_DIR: &str = "local_configs";
pub const STAGING_DIR: &str = ".staging";

/// Juju's controller model, also used as the application directory
const CONTROLLER_MODEL: &str = "controller";

#[derive(Debug, Clone)]
pub struct OutputLayout {
    base: PathBuf,
}

impl OutputLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory of an item relative to the base; a pure function of its
    /// controller, environment and application names
    pub fn relative_dir(&self, source: &ItemSource) -> PathBuf {
        let part = |p: &Option<String>| p.clone().unwrap_or_default();
        match source.kind {
            ItemKind::ClientConfig => PathBuf::from(LOCAL_CONFIGS_DIR),
            ItemKind::Controller => PathBuf::from(part(&source.controller))
                .join(CONTROLLER_MODEL)
                .join(CONTROLLER_MODEL),
            ItemKind::Application | ItemKind::Discovery => {
                [&source.controller, &source.environment, &source.application]
                    .into_iter()
                    .flatten()
                    .collect()
            }
        }
    }

    pub fn staging_root(&self) -> PathBuf {
        self.base.join(STAGING_DIR)
    }

    /// Where a strategy writes its artifact before Finalize
    pub fn staging_dir(&self, source: &ItemSource) -> PathBuf {
        self.staging_root().join(self.relative_dir(source))
    }

    pub fn final_path(&self, source: &ItemSource, file_name: &str) -> PathBuf {
        self.base.join(self.relative_dir(source)).join(file_name)
    }
}
