//! `webguard run`.

use anyhow::Result;
use console::style;
use std::path::Path;

use super::super::Cli;

/// Execute a run and return the process exit code.
pub async fn cmd_run(cli: &Cli, project_dir: &Path, options: webguard::RunOptions) -> Result<i32> {
    use webguard::plugins::HookDispatcher;
    use webguard::ui::icons::SHIELD;

    println!();
    println!(
        "  {}{} {}",
        SHIELD,
        style("webguard").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
    );

    let (path, config) = super::load_config(cli, project_dir)?;
    if cli.verbose {
        println!("  {}", style(format!("Config: {}", path.display())).dim());
    }

    let outcome = webguard::run(config, options, HookDispatcher::default()).await?;
    Ok(outcome.result.exit_code())
}
