//! Run directory layout.
//!
//! ```text
//! <output.dir>/
//!   .auth/storageState.json
//!   baseline.json
//!   run-<timestamp>/
//!     results.json  report.html  results.xml
//!     screenshots/<page>/...
//! ```

use crate::errors::RunError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RUN_DIR_PREFIX: &str = "run-";
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// Directory name for a run started at `at`.
pub fn run_dir_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}{}", RUN_DIR_PREFIX, stamp)
}

/// Create a fresh run directory under `output_dir`, removing earlier run
/// directories. The baseline and auth state are kept.
pub fn prepare_run_dir(output_dir: &Path, at: DateTime<Utc>) -> Result<PathBuf, RunError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| RunError::RunDir { path, source }
    };

    if output_dir.exists() {
        for previous in run_dirs(output_dir) {
            debug!(path = %previous.display(), "Removing previous run");
            std::fs::remove_dir_all(&previous).map_err(io_err(&previous))?;
        }
    }

    let run_dir = output_dir.join(run_dir_name(at));
    let screenshots = run_dir.join(SCREENSHOTS_DIR);
    std::fs::create_dir_all(&screenshots).map_err(io_err(&screenshots))?;
    Ok(run_dir)
}

/// Run directories under `output_dir`, oldest first.
pub fn run_dirs(output_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(RUN_DIR_PREFIX))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

/// The most recent run directory, if any.
pub fn latest_run_dir(output_dir: &Path) -> Option<PathBuf> {
    run_dirs(output_dir).pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    #[test]
    fn test_run_dir_name_is_filesystem_safe() {
        let name = run_dir_name(at(0));
        assert_eq!(name, "run-2026-01-01T00-00-00-000Z");
    }

    #[test]
    fn test_prepare_removes_previous_runs_but_keeps_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let first = prepare_run_dir(dir.path(), at(0)).unwrap();
        std::fs::write(first.join("results.json"), "{}").unwrap();
        std::fs::write(dir.path().join("baseline.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join(".auth")).unwrap();

        let second = prepare_run_dir(dir.path(), at(60)).unwrap();

        assert!(!first.exists());
        assert!(second.join(SCREENSHOTS_DIR).is_dir());
        assert!(dir.path().join("baseline.json").exists());
        assert!(dir.path().join(".auth").exists());
        assert_eq!(latest_run_dir(dir.path()), Some(second));
    }

    #[test]
    fn test_latest_run_dir_orders_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(run_dir_name(at(120)))).unwrap();
        std::fs::create_dir_all(dir.path().join(run_dir_name(at(5)))).unwrap();
        std::fs::create_dir_all(dir.path().join("unrelated")).unwrap();

        let latest = latest_run_dir(dir.path()).unwrap();
        assert!(latest.ends_with(run_dir_name(at(120))));
        assert_eq!(run_dirs(dir.path()).len(), 2);
    }

    #[test]
    fn test_latest_run_dir_missing_output() {
        assert!(latest_run_dir(Path::new("/nonexistent/webguard")).is_none());
    }
}
