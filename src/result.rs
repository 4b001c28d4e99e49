//! Verdicts, page results and run results.
//!
//! These types are the unit of persistence: a `RunResult` is written as
//! `results.json` for every run and a saved baseline uses the identical shape.
//! Keys are camelCase on disk.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of a single audit on a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Warning,
    Fail,
    Skip,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Pass => "pass",
            Severity::Warning => "warning",
            Severity::Fail => "fail",
            Severity::Skip => "skip",
        }
    }

    /// Severities a change can move *to* and still count as an improvement.
    pub fn is_non_failing(&self) -> bool {
        matches!(self, Severity::Pass | Severity::Skip)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The verdict of one audit on one page. Produced once, never mutated after
/// it has been recorded in a `PageResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub audit: String,
    pub page: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Wall-clock time of the audit in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl AuditResult {
    fn new(audit: &str, page: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            audit: audit.to_string(),
            page: page.to_string(),
            passed: severity == Severity::Pass,
            severity,
            message: message.into(),
            details: None,
            duration: None,
        }
    }

    pub fn pass(audit: &str, page: &str, message: impl Into<String>) -> Self {
        Self::new(audit, page, Severity::Pass, message)
    }

    pub fn fail(audit: &str, page: &str, message: impl Into<String>) -> Self {
        Self::new(audit, page, Severity::Fail, message)
    }

    /// A warning verdict does not count as passed.
    pub fn warning(audit: &str, page: &str, message: impl Into<String>) -> Self {
        Self::new(audit, page, Severity::Warning, message)
    }

    pub fn skip(audit: &str, page: &str, message: impl Into<String>) -> Self {
        Self::new(audit, page, Severity::Skip, message)
    }

    /// Build a pass or fail verdict from a boolean outcome.
    pub fn from_check(audit: &str, page: &str, passed: bool, message: impl Into<String>) -> Self {
        if passed {
            Self::pass(audit, page, message)
        } else {
            Self::fail(audit, page, message)
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// Restore `fail ⇒ passed = false` for verdicts built by hand.
    pub fn normalized(mut self) -> Self {
        if self.severity == Severity::Fail {
            self.passed = false;
        }
        self
    }

    pub fn is_fail(&self) -> bool {
        self.severity == Severity::Fail
    }
}

/// All verdicts for one target, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub page: String,
    pub path: String,
    pub url: String,
    pub audits: Vec<AuditResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    /// Total time for the target in milliseconds.
    pub duration: u64,
}

impl PageResult {
    pub fn has_failure(&self) -> bool {
        self.audits.iter().any(AuditResult::is_fail)
    }

    pub fn all_passed(&self) -> bool {
        self.audits.iter().all(|a| a.passed)
    }
}

/// Run configuration echoed into the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfigEcho {
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub total_pages: usize,
    pub audits_enabled: Vec<String>,
}

/// Exact tallies over every verdict in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_audits: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    pub skipped: usize,
    /// Run duration in milliseconds.
    pub duration: u64,
}

/// The immutable outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub timestamp: String,
    pub config: RunConfigEcho,
    pub pages: Vec<PageResult>,
    pub summary: RunSummary,
}

impl RunResult {
    /// Exit status of the CLI for this result.
    pub fn exit_code(&self) -> i32 {
        if self.summary.failed > 0 { 1 } else { 0 }
    }

    /// Iterate over every verdict in page order.
    pub fn verdicts(&self) -> impl Iterator<Item = &AuditResult> {
        self.pages.iter().flat_map(|p| p.audits.iter())
    }
}
