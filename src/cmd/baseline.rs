//! Baseline management: `webguard baseline save|show` and `webguard diff`.

use anyhow::Result;
use console::style;
use std::path::Path;

use super::super::{BaselineCommands, Cli};

pub fn cmd_baseline(cli: &Cli, project_dir: &Path, command: BaselineCommands) -> Result<()> {
    use webguard::baseline;
    use webguard::ui::icons::{DIFF, PASS};

    let (_, config) = super::load_config(cli, project_dir)?;
    let output_dir = config.output_dir();

    match command {
        BaselineCommands::Save => {
            let (run_dir, result) = super::latest_results(&config)?;
            let path = baseline::save(&result, output_dir)?;
            println!(
                "  {}{}",
                PASS,
                style(format!("Baseline saved from {}", run_dir.display())).green()
            );
            println!("  {}", style(path.display()).dim());
        }
        BaselineCommands::Show => match baseline::load(output_dir)? {
            None => {
                println!(
                    "  {}No baseline saved. Run 'webguard baseline save' after a run.",
                    DIFF
                );
            }
            Some(saved) => {
                let s = &saved.summary;
                println!();
                println!("  {}", style("Baseline").bold());
                println!("  Timestamp: {}", saved.timestamp);
                println!("  Base URL:  {}", saved.config.base_url);
                println!("  Pages:     {}", saved.pages.len());
                println!(
                    "  Audits:    {} total, {} passed, {} failed, {} warnings, {} skipped",
                    s.total_audits, s.passed, s.failed, s.warnings, s.skipped
                );
            }
        },
    }
    Ok(())
}

pub fn cmd_diff(cli: &Cli, project_dir: &Path) -> Result<()> {
    use webguard::baseline;

    let (_, config) = super::load_config(cli, project_dir)?;
    let Some(saved) = baseline::load(config.output_dir())? else {
        anyhow::bail!("No baseline found. Run 'webguard baseline save' first.");
    };
    let (_, current) = super::latest_results(&config)?;

    let comparison = baseline::compare(&saved, &current);
    println!();
    println!("{}", baseline::diff::render(&comparison));
    Ok(())
}
