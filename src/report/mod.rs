//! Run reporters.
//!
//! Built-in formats are selected by `output.formats`; plugin reporters run
//! after them. A reporter failure is logged and never changes the run
//! outcome.

pub mod html;
pub mod json;
pub mod junit;
pub mod terminal;

use crate::config::{ReportFormat, WebguardConfig};
use crate::result::RunResult;
use async_trait::async_trait;
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub use html::HtmlReporter;
pub use json::JsonReporter;
pub use junit::JunitReporter;
pub use terminal::TerminalReporter;

/// Turns a finished run into some output.
#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    async fn report(
        &self,
        result: &RunResult,
        run_dir: &Path,
        config: &WebguardConfig,
    ) -> anyhow::Result<()>;
}

/// The built-in reporter for a configured format.
pub fn builtin(format: ReportFormat) -> Arc<dyn Reporter> {
    match format {
        ReportFormat::Terminal => Arc::new(TerminalReporter),
        ReportFormat::Json => Arc::new(JsonReporter),
        ReportFormat::Html => Arc::new(HtmlReporter),
        ReportFormat::Junit => Arc::new(JunitReporter),
    }
}

/// Run every configured reporter, then the plugin reporters.
/// Returns the names of the reporters that failed.
pub async fn run_reporters(
    result: &RunResult,
    config: &WebguardConfig,
    run_dir: &Path,
    plugin_reporters: &[Arc<dyn Reporter>],
) -> Vec<String> {
    let mut formats: Vec<ReportFormat> = Vec::new();
    for format in &config.output.formats {
        if !formats.contains(format) {
            formats.push(*format);
        }
    }
    let reporters = formats
        .into_iter()
        .map(builtin)
        .chain(plugin_reporters.iter().cloned());

    let mut failed = Vec::new();
    for reporter in reporters {
        if let Err(e) = reporter.report(result, run_dir, config).await {
            warn!(reporter = reporter.name(), error = %e, "Reporter failed");
            println!(
                "  {} {}",
                style(format!("Reporter '{}' failed:", reporter.name())).yellow(),
                e
            );
            failed.push(reporter.name().to_string());
        }
    }

    let captured = result.pages.iter().filter(|p| p.screenshot_path.is_some()).count();
    if captured > 0 {
        println!("  {}", style(format!("Screenshots: {} page(s) captured", captured)).dim());
    }
    failed
}
