//! Baselines: a saved run result that later runs are compared against.

pub mod diff;
pub mod storage;

pub use diff::{AuditChange, BaselineComparison, ChangeKind, ChangeSummary, VerdictSnapshot, compare};
pub use storage::{BASELINE_FILE, exists, load, save};
