//! `webguard report`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use super::super::Cli;

pub fn cmd_report(cli: &Cli, project_dir: &Path, open: bool) -> Result<()> {
    use webguard::report::html;
    use webguard::ui::icons::PASS;

    let (_, config) = super::load_config(cli, project_dir)?;
    let (run_dir, result) = super::latest_results(&config)?;

    let report = html::write(&result, &run_dir)?;
    println!("  {}{}", PASS, style("Regenerated HTML report").green());
    println!("  Report: {}", report.display());

    if open {
        open::that(&report).with_context(|| format!("Failed to open {}", report.display()))?;
    }
    Ok(())
}
