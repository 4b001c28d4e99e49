use crate::result::RunResult;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const BASELINE_FILE: &str = "baseline.json";

pub fn path(output_dir: &Path) -> PathBuf {
    output_dir.join(BASELINE_FILE)
}

/// Persist `result` as the baseline, replacing any previous one.
pub fn save(result: &RunResult, output_dir: &Path) -> Result<PathBuf> {
    let target = path(output_dir);
    crate::util::write_json(&target, result)?;
    Ok(target)
}

/// Load the baseline. `Ok(None)` when none has been saved yet.
pub fn load(output_dir: &Path) -> Result<Option<RunResult>> {
    let target = path(output_dir);
    if !target.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&target)
        .with_context(|| format!("Failed to read baseline at {}", target.display()))?;
    let result = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse baseline at {}", target.display()))?;
    Ok(Some(result))
}

pub fn exists(output_dir: &Path) -> bool {
    path(output_dir).exists()
}
