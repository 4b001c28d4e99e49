pub mod aggregate;
pub mod audits;
pub mod auth;
pub mod baseline;
pub mod config;
pub mod errors;
pub mod init;
pub mod logging;
pub mod notify;
pub mod plugins;
pub mod report;
pub mod result;
pub mod runner;
pub mod session;
pub mod ui;
pub mod util;

pub use config::WebguardConfig;
pub use errors::{AuthError, ConfigError, NavigationError, RunError};
pub use result::{AuditResult, PageResult, RunResult, RunSummary, Severity};
pub use runner::{RunOptions, RunOutcome, run};
