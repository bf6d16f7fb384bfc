pub mod archive;
pub mod command;
pub mod locker;

// Trait-based abstractions for testability
pub mod executor;
pub mod juju;
pub mod remote;

// Re-export commonly used types and traits (used by test crate)
pub use executor::{CommandExecutor, RealExecutor};
pub use juju::{Application, ControlPlane, JujuCli, Unit};
pub use remote::{JujuSsh, RemoteExecutor, RemoteTarget};
