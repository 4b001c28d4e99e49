//! CLI command implementations.
//!
//! | Module      | Commands handled        |
//! |-------------|-------------------------|
//! | `run`       | `Run`                   |
//! | `report`    | `Report`                |
//! | `baseline`  | `Baseline`, `Diff`      |
//! | `project`   | `Init`, `Validate`      |

pub mod baseline;
pub mod project;
pub mod report;
pub mod run;

pub use baseline::{cmd_baseline, cmd_diff};
pub use project::{cmd_init, cmd_validate};
pub use report::cmd_report;
pub use run::cmd_run;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use webguard::WebguardConfig;
use webguard::result::RunResult;

use super::Cli;

/// Load the config named by `--config` or found in `project_dir`.
/// A relative output directory is resolved against `project_dir`.
pub fn load_config(cli: &Cli, project_dir: &Path) -> Result<(PathBuf, WebguardConfig)> {
    let explicit = cli.config.as_ref().map(|path| project_dir.join(path));
    let (path, mut config) = WebguardConfig::discover(explicit.as_deref(), project_dir)?;
    if config.output.dir.is_relative() {
        config.output.dir = project_dir.join(&config.output.dir);
    }
    Ok((path, config))
}

/// The latest run directory and its stored result.
pub fn latest_results(config: &WebguardConfig) -> Result<(PathBuf, RunResult)> {
    let output_dir = config.output_dir();
    let run_dir = webguard::runner::setup::latest_run_dir(output_dir).with_context(|| {
        format!(
            "No runs found in {}. Run 'webguard run' first.",
            output_dir.display()
        )
    })?;
    let results = run_dir.join(webguard::report::json::RESULTS_FILE);
    let result = webguard::report::json::read(&results)
        .with_context(|| format!("Failed to read results from {}", results.display()))?;
    Ok((run_dir, result))
}
