//! Project scaffolding for `webguard init`.
//!
//! ```text
//! webguard.toml   # starter config (never overwritten)
//! .env.example    # variables referenced as ${VAR} in the config
//! .gitignore      # gains webguard-results/ and .env
//! ```

use crate::config::{CONFIG_NAMES, DEFAULT_CONFIG_TEMPLATE, find_config};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const ENV_EXAMPLE: &str = ".env.example";
pub const GITIGNORE_ENTRIES: [&str; 2] = ["webguard-results/", ".env"];

const ENV_EXAMPLE_TEMPLATE: &str = "# webguard environment variables\n# EMAIL=user@example.com\n# PASSWORD=your-password\n";

/// Files touched by [`init_project`].
#[derive(Debug, Default)]
pub struct InitResult {
    pub config_path: PathBuf,
    /// False when a config already existed and was left alone.
    pub config_created: bool,
    pub env_example_created: bool,
    /// Entries appended to (or written into a new) `.gitignore`.
    pub gitignore_added: Vec<String>,
}

pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let mut result = InitResult::default();

    match find_config(project_dir) {
        Some(existing) => result.config_path = existing,
        None => {
            let path = project_dir.join(CONFIG_NAMES[0]);
            std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            result.config_path = path;
            result.config_created = true;
        }
    }

    let env_example = project_dir.join(ENV_EXAMPLE);
    if !env_example.exists() {
        std::fs::write(&env_example, ENV_EXAMPLE_TEMPLATE)
            .with_context(|| format!("Failed to write {}", env_example.display()))?;
        result.env_example_created = true;
    }

    result.gitignore_added = update_gitignore(&project_dir.join(".gitignore"))?;
    Ok(result)
}

fn update_gitignore(path: &Path) -> Result<Vec<String>> {
    let existing = if path.exists() {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        String::new()
    };

    let missing: Vec<String> = GITIGNORE_ENTRIES
        .iter()
        .filter(|entry| !existing.lines().any(|line| line.trim() == **entry))
        .map(|entry| entry.to_string())
        .collect();
    if missing.is_empty() {
        return Ok(missing);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    if !content.is_empty() {
        content.push('\n');
    }
    content.push_str("# webguard\n");
    for entry in &missing {
        content.push_str(entry);
        content.push('\n');
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(missing)
}
