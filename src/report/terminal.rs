use super::Reporter;
use crate::config::WebguardConfig;
use crate::result::{RunResult, Severity};
use crate::ui::icons::{FAIL, PASS, SKIP, WARN};
use anyhow::Result;
use async_trait::async_trait;
use console::style;
use std::path::Path;

/// Summary table printed to stdout.
pub struct TerminalReporter;

#[async_trait]
impl Reporter for TerminalReporter {
    fn name(&self) -> &str {
        "terminal"
    }

    async fn report(&self, result: &RunResult, _: &Path, _: &WebguardConfig) -> Result<()> {
        println!("{}", render(result));
        Ok(())
    }
}

/// Overall verdict line of a run.
pub fn verdict_line(result: &RunResult) -> String {
    let summary = &result.summary;
    if summary.failed > 0 {
        style(format!("Result: FAIL ({} failure(s))", summary.failed))
            .red()
            .bold()
            .to_string()
    } else if summary.warnings > 0 {
        style(format!("Result: PASS with {} warning(s)", summary.warnings))
            .yellow()
            .bold()
            .to_string()
    } else {
        style("Result: PASS").green().bold().to_string()
    }
}

pub fn render(result: &RunResult) -> String {
    let summary = &result.summary;
    let rule = style("─".repeat(60)).bold();
    let mut lines = vec![
        String::new(),
        rule.to_string(),
        format!("  {}", style("Summary").bold()),
        rule.to_string(),
        String::new(),
        format!("  Total audits:  {}", summary.total_audits),
        format!("  {}     {}", style(format!("{}Passed:", PASS)).green(), summary.passed),
    ];
    if summary.failed > 0 {
        lines.push(format!("  {}     {}", style(format!("{}Failed:", FAIL)).red(), summary.failed));
    }
    if summary.warnings > 0 {
        lines.push(format!(
            "  {}   {}",
            style(format!("{}Warnings:", WARN)).yellow(),
            summary.warnings
        ));
    }
    if summary.skipped > 0 {
        lines.push(format!("  {}    {}", style(format!("{}Skipped:", SKIP)).dim(), summary.skipped));
    }
    lines.push(format!(
        "  Duration:      {:.1}s",
        summary.duration as f64 / 1000.0
    ));
    lines.push(String::new());

    let failures: Vec<_> = result
        .verdicts()
        .filter(|a| a.severity == Severity::Fail)
        .collect();
    if !failures.is_empty() {
        lines.push(format!("  {}", style("Failed Audits:").red().bold()));
        for audit in failures {
            lines.push(
                style(format!(
                    "    {}{} → {}: {}",
                    FAIL, audit.page, audit.audit, audit.message
                ))
                .red()
                .to_string(),
            );
        }
        lines.push(String::new());
    }

    lines.push(format!("  {}", verdict_line(result)));
    lines.join("\n")
}
