//! Project scaffolding and config validation: `webguard init`, `webguard validate`.

use anyhow::Result;
use console::style;
use std::path::Path;

use super::super::Cli;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use webguard::init::{ENV_EXAMPLE, init_project};
    use webguard::ui::icons::{SPARKLE, WARN};

    let result = init_project(project_dir)?;

    if result.config_created {
        println!("  {}Created {}", SPARKLE, result.config_path.display());
    } else {
        println!(
            "  {}{} already exists. Skipping.",
            WARN,
            result.config_path.display()
        );
    }
    if result.env_example_created {
        println!("  {}Created {}", SPARKLE, ENV_EXAMPLE);
    }
    if !result.gitignore_added.is_empty() {
        println!(
            "  {}Updated .gitignore ({})",
            SPARKLE,
            result.gitignore_added.join(", ")
        );
    }

    println!();
    println!("Next steps:");
    println!("  1. Edit webguard.toml with your pages and auth");
    println!("  2. Run `webguard validate` to check it");
    println!("  3. Run `webguard run`");
    Ok(())
}

pub fn cmd_validate(cli: &Cli, project_dir: &Path) -> Result<()> {
    use webguard::audits::registry;
    use webguard::ui::icons::PASS;

    let (path, config) = super::load_config(cli, project_dir)?;
    let audits = registry::resolve(
        &config.audits,
        Vec::new(),
        webguard::audits::custom::descriptors(&config.custom_audits)?,
        None,
    );

    println!("  {}{}", PASS, style(format!("Config is valid: {}", path.display())).green());
    println!("  Base URL:    {}", config.base_url);
    println!("  Pages:       {}", config.pages.len());
    println!(
        "  Audits:      {}",
        audits.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!("  Auth:        {}", config.auth.method());
    println!("  Concurrency: {}", config.runner.concurrency);
    if config.baseline.enabled {
        println!("  Baseline:    enabled");
    }
    if !config.notifications.is_empty() {
        println!("  Notify:      {} channel(s)", config.notifications.len());
    }
    Ok(())
}
