use super::Reporter;
use crate::config::WebguardConfig;
use crate::result::{AuditResult, PageResult, RunResult, Severity};
use crate::util::{escape_markup, format_duration_ms};
use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "report.html";

/// Self-contained HTML report.
pub struct HtmlReporter;

#[async_trait]
impl Reporter for HtmlReporter {
    fn name(&self) -> &str {
        "html"
    }

    async fn report(&self, result: &RunResult, run_dir: &Path, _: &WebguardConfig) -> Result<()> {
        let path = write(result, run_dir)?;
        println!("  {}", style(format!("HTML report: {}", path.display())).dim());
        Ok(())
    }
}

pub fn write(result: &RunResult, run_dir: &Path) -> Result<PathBuf> {
    let path = run_dir.join(REPORT_FILE);
    std::fs::create_dir_all(run_dir)?;
    std::fs::write(&path, render(result))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Pass => "&#x2713;",
        Severity::Fail => "&#x2717;",
        Severity::Warning => "&#x26A0;",
        Severity::Skip => "&#x25CB;",
    }
}

fn audit_row(out: &mut String, audit: &AuditResult) {
    let duration = audit
        .duration
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "-".to_string());
    let _ = write!(
        out,
        r#"
        <tr class="severity-{sev}">
          <td class="icon">{icon}</td>
          <td>{audit}</td>
          <td>{message}</td>
          <td class="duration">{duration}</td>
        </tr>"#,
        sev = audit.severity,
        icon = icon(audit.severity),
        audit = escape_markup(&audit.audit),
        message = escape_markup(&audit.message),
        duration = duration,
    );
}

fn page_section(out: &mut String, page: &PageResult) {
    let status = if page.has_failure() { "fail" } else { "pass" };
    let screenshot = page
        .screenshot_path
        .as_deref()
        .map(|p| {
            format!(
                r#"<a class="page-shot" href="{0}">screenshot</a>"#,
                escape_markup(p)
            )
        })
        .unwrap_or_default();
    let _ = write!(
        out,
        r#"
    <section class="page-section">
      <h2 class="page-header {status}">
        <span class="page-name">{name}</span>
        <span class="page-path">{path}</span>
        {screenshot}
        <span class="page-duration">{duration}</span>
      </h2>
      <table class="audit-table">
        <thead><tr><th class="icon-col"></th><th>Audit</th><th>Result</th><th>Duration</th></tr></thead>
        <tbody>"#,
        status = status,
        name = escape_markup(&page.page),
        path = escape_markup(&page.path),
        screenshot = screenshot,
        duration = format_duration_ms(page.duration),
    );
    for audit in &page.audits {
        audit_row(out, audit);
    }
    out.push_str("\n        </tbody>\n      </table>\n    </section>");
}

const STYLE: &str = r#"
    :root { --bg: #0f172a; --surface: #1e293b; --border: #334155; --text: #e2e8f0;
            --text-dim: #94a3b8; --pass: #22c55e; --fail: #ef4444; --warning: #f59e0b; --skip: #64748b; }
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
           background: var(--bg); color: var(--text); line-height: 1.5; padding: 2rem; }
    .container { max-width: 1100px; margin: 0 auto; }
    header { margin-bottom: 2rem; }
    header h1 { font-size: 1.75rem; }
    .meta { color: var(--text-dim); font-size: 0.875rem; }
    .overall-status { text-align: center; font-size: 1.25rem; font-weight: 700; padding: 0.75rem;
                      border-radius: 8px; margin-bottom: 2rem; }
    .overall-status.pass { background: rgba(34,197,94,0.15); color: var(--pass); }
    .overall-status.fail { background: rgba(239,68,68,0.15); color: var(--fail); }
    .overall-status.warning { background: rgba(245,158,11,0.15); color: var(--warning); }
    .summary-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr));
                    gap: 1rem; margin-bottom: 2rem; }
    .summary-card { background: var(--surface); border: 1px solid var(--border); border-radius: 8px;
                    padding: 1rem; text-align: center; }
    .summary-card .value { font-size: 1.75rem; font-weight: 700; }
    .summary-card .label { color: var(--text-dim); font-size: 0.75rem; text-transform: uppercase; }
    .summary-card.pass .value { color: var(--pass); }
    .summary-card.fail .value { color: var(--fail); }
    .summary-card.warning .value { color: var(--warning); }
    .summary-card.skip .value { color: var(--skip); }
    .page-section { background: var(--surface); border: 1px solid var(--border); border-radius: 8px;
                    margin-bottom: 1.5rem; overflow: hidden; }
    .page-header { padding: 1rem 1.25rem; display: flex; align-items: center; gap: 0.75rem;
                   font-size: 1rem; border-bottom: 1px solid var(--border); }
    .page-header.fail { border-left: 4px solid var(--fail); }
    .page-header.pass { border-left: 4px solid var(--pass); }
    .page-path, .page-duration, .page-shot { color: var(--text-dim); font-size: 0.875rem; }
    .page-duration { margin-left: auto; }
    .audit-table { width: 100%; border-collapse: collapse; }
    .audit-table th { text-align: left; padding: 0.5rem 1rem; font-size: 0.75rem; text-transform: uppercase;
                      color: var(--text-dim); border-bottom: 1px solid var(--border); }
    .audit-table td { padding: 0.6rem 1rem; border-bottom: 1px solid var(--border); }
    .icon-col { width: 40px; }
    .icon { text-align: center; }
    .duration { color: var(--text-dim); font-size: 0.875rem; }
    .severity-pass .icon { color: var(--pass); }
    .severity-fail .icon { color: var(--fail); }
    .severity-warning .icon { color: var(--warning); }
    .severity-skip .icon { color: var(--skip); }
    footer { text-align: center; margin-top: 2rem; color: var(--text-dim); font-size: 0.75rem; }
"#;

pub fn render(result: &RunResult) -> String {
    let summary = &result.summary;
    let (overall, status_class) = if summary.failed > 0 {
        ("FAIL", "fail")
    } else if summary.warnings > 0 {
        ("PASS (with warnings)", "warning")
    } else {
        ("PASS", "pass")
    };

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>webguard report - {base}</title>
  <style>{style}</style>
</head>
<body>
  <div class="container">
    <header>
      <h1>webguard report</h1>
      <div class="meta">{base} &bull; {timestamp} &bull; {audits}</div>
    </header>
    <div class="overall-status {status_class}">{overall}</div>
    <div class="summary-grid">
      <div class="summary-card"><div class="value">{total}</div><div class="label">Total</div></div>
      <div class="summary-card pass"><div class="value">{passed}</div><div class="label">Passed</div></div>
      <div class="summary-card fail"><div class="value">{failed}</div><div class="label">Failed</div></div>
      <div class="summary-card warning"><div class="value">{warnings}</div><div class="label">Warnings</div></div>
      <div class="summary-card skip"><div class="value">{skipped}</div><div class="label">Skipped</div></div>
      <div class="summary-card"><div class="value">{duration}</div><div class="label">Duration</div></div>
    </div>"#,
        base = escape_markup(&result.config.base_url),
        style = STYLE,
        timestamp = escape_markup(&result.timestamp),
        audits = escape_markup(&result.config.audits_enabled.join(", ")),
        status_class = status_class,
        overall = overall,
        total = summary.total_audits,
        passed = summary.passed,
        failed = summary.failed,
        warnings = summary.warnings,
        skipped = summary.skipped,
        duration = format_duration_ms(summary.duration),
    );
    for page in &result.pages {
        page_section(&mut out, page);
    }
    let _ = write!(
        out,
        "\n    <footer>Generated by webguard {}</footer>\n  </div>\n</body>\n</html>\n",
        env!("CARGO_PKG_VERSION")
    );
    out
}
