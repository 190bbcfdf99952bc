pub mod analysis;
pub mod collectors;
pub mod config;
pub mod config_check;
pub mod daemon;
pub mod logging;
pub mod logs;
pub mod report;
pub mod solutions;
pub mod types;

pub use config::{Config, LogLevel, Threshold, Thresholds};
pub use daemon::{CycleState, Diagnostics};
pub use report::DiagnosticReport;
pub use types::{Issue, IssueKind, Severity};
