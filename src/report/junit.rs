use super::Reporter;
use crate::config::WebguardConfig;
use crate::result::{AuditResult, PageResult, RunResult, Severity};
use crate::util::escape_markup;
use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use std::fmt::Write as _;
use std::path::Path;

pub const JUNIT_FILE: &str = "results.xml";

/// JUnit XML with one testsuite per page and one testcase per verdict.
/// Warnings are reported as failures with `type="warning"`.
pub struct JunitReporter;

#[async_trait]
impl Reporter for JunitReporter {
    fn name(&self) -> &str {
        "junit"
    }

    async fn report(&self, result: &RunResult, run_dir: &Path, _: &WebguardConfig) -> Result<()> {
        let path = run_dir.join(JUNIT_FILE);
        std::fs::create_dir_all(run_dir)?;
        std::fs::write(&path, render(result))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  {}", style(format!("JUnit report: {}", path.display())).dim());
        Ok(())
    }
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn testcase(out: &mut String, audit: &AuditResult) {
    let name = escape_markup(&format!("{} - {}", audit.page, audit.audit));
    let class = escape_markup(&audit.page);
    let time = seconds(audit.duration.unwrap_or(0));
    let message = escape_markup(&audit.message);
    match audit.severity {
        Severity::Pass => {
            let _ = writeln!(out, r#"    <testcase name="{}" classname="{}" time="{}" />"#, name, class, time);
        }
        Severity::Skip => {
            let _ = writeln!(out, r#"    <testcase name="{}" classname="{}" time="{}">"#, name, class, time);
            let _ = writeln!(out, r#"      <skipped message="{}" />"#, message);
            let _ = writeln!(out, "    </testcase>");
        }
        Severity::Fail | Severity::Warning => {
            let _ = writeln!(out, r#"    <testcase name="{}" classname="{}" time="{}">"#, name, class, time);
            let _ = writeln!(
                out,
                r#"      <failure message="{}" type="{}">{}</failure>"#,
                message, audit.severity, message
            );
            let _ = writeln!(out, "    </testcase>");
        }
    }
}

fn testsuite(out: &mut String, page: &PageResult, index: usize) {
    let count = |severity| page.audits.iter().filter(|a| a.severity == severity).count();
    let _ = writeln!(
        out,
        r#"  <testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{}" id="{}">"#,
        escape_markup(&page.page),
        page.audits.len(),
        count(Severity::Fail) + count(Severity::Warning),
        count(Severity::Skip),
        seconds(page.duration),
        index
    );
    for audit in &page.audits {
        testcase(out, audit);
    }
    let _ = writeln!(out, "  </testsuite>");
}

pub fn render(result: &RunResult) -> String {
    let summary = &result.summary;
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        r#"<testsuites name="webguard" tests="{}" failures="{}" skipped="{}" time="{}">"#,
        summary.total_audits,
        summary.failed + summary.warnings,
        summary.skipped,
        seconds(summary.duration)
    );
    for (index, page) in result.pages.iter().enumerate() {
        testsuite(&mut out, page, index);
    }
    out.push_str("</testsuites>\n");
    out
}
