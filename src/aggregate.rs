//! Folding page results into a run result.

use crate::audits::AuditDescriptor;
use crate::config::WebguardConfig;
use crate::result::{PageResult, RunConfigEcho, RunResult, RunSummary, Severity};
use chrono::{DateTime, SecondsFormat, Utc};

/// Exact per-severity tallies over every verdict in `pages`.
pub fn summarize(pages: &[PageResult], duration_ms: u64) -> RunSummary {
    let mut summary = RunSummary {
        duration: duration_ms,
        ..RunSummary::default()
    };
    for audit in pages.iter().flat_map(|p| &p.audits) {
        summary.total_audits += 1;
        match audit.severity {
            Severity::Pass => summary.passed += 1,
            Severity::Fail => summary.failed += 1,
            Severity::Warning => summary.warnings += 1,
            Severity::Skip => summary.skipped += 1,
        }
    }
    summary
}

pub fn build_run_result(
    config: &WebguardConfig,
    audits: &[AuditDescriptor],
    pages: Vec<PageResult>,
    started_at: DateTime<Utc>,
    duration_ms: u64,
) -> RunResult {
    let summary = summarize(&pages, duration_ms);
    RunResult {
        timestamp: started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        config: RunConfigEcho {
            base_url: config.base_url.clone(),
            total_pages: pages.len(),
            audits_enabled: audits.iter().map(|a| a.name.clone()).collect(),
        },
        pages,
        summary,
    }
}
