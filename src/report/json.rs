use super::Reporter;
use crate::config::WebguardConfig;
use crate::result::RunResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "results.json";

/// Writes the run result as `results.json`.
pub struct JsonReporter;

#[async_trait]
impl Reporter for JsonReporter {
    fn name(&self) -> &str {
        "json"
    }

    async fn report(&self, result: &RunResult, run_dir: &Path, _: &WebguardConfig) -> Result<()> {
        let path = write(result, run_dir)?;
        println!("  {}", style(format!("JSON report: {}", path.display())).dim());
        Ok(())
    }
}

pub fn write(result: &RunResult, run_dir: &Path) -> Result<PathBuf> {
    let path = run_dir.join(RESULTS_FILE);
    crate::util::write_json(&path, result)?;
    Ok(path)
}

/// Read a `results.json` written by an earlier run.
pub fn read(path: &Path) -> Result<RunResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
