//! Configuration module for juju-backup-all
//!
//! Settings come from an optional TOML file and from the command line.
//!
//! ## Precedence
//!
//! Settings are applied in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. The configuration file
//! 3. Command-line flags
//!
//! A controller selection given on the command line replaces the file's
//! selection; exclusion lists are merged.
//!
//! ## Example Usage
//!
//! ```no_run
//! use juju_backup_all::config::{self, CliOverrides};
//!
//! let file = config::load_config("juju-backup-all.toml")?;
//! let config = config::resolve_config(file, CliOverrides::default())?;
//! println!("Backing up into {:?}", config.output_dir);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, resolve_config, ConfigError, Result};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
