pub mod backup;
pub mod layout;
pub mod logging;
pub mod report;
pub mod results;
pub mod scanner;

pub use backup::BackupOrchestrator;
pub use layout::OutputLayout;
pub use report::Report;
pub use results::{BackupResult, ItemKind, ItemSource, ResultAggregator};
pub use scanner::{BackupItem, EnvironmentScanner, ScanReport};
