use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "webguard")]
#[command(version, about = "Full-page web audit runner")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file. Defaults to ./webguard.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold webguard.toml, .env.example and .gitignore entries
    Init,
    /// Run all enabled audits
    Run {
        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Only audit these pages (comma-separated names)
        #[arg(long, value_delimiter = ',')]
        pages: Option<Vec<String>>,

        /// Only run these audits (comma-separated names)
        #[arg(long, value_delimiter = ',')]
        audits: Option<Vec<String>>,

        /// Compare the run against the saved baseline
        #[arg(long)]
        diff: bool,
    },
    /// Regenerate the HTML report of the latest run
    Report {
        /// Open the report in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Load and validate the config
    Validate,
    /// Manage the saved baseline
    Baseline {
        #[command(subcommand)]
        command: BaselineCommands,
    },
    /// Compare the latest run against the saved baseline
    Diff,
}

#[derive(Subcommand, Clone)]
pub enum BaselineCommands {
    /// Save the latest run as the baseline
    Save,
    /// Show the saved baseline
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    webguard::logging::init(cli.verbose);
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    dotenvy::from_path(project_dir.join(".env")).ok();

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Run {
            headed,
            pages,
            audits,
            diff,
        } => {
            let options = webguard::RunOptions {
                headed: *headed,
                pages_filter: pages.clone(),
                audits_filter: audits.clone(),
                diff: *diff,
                verbose: cli.verbose,
                quiet: false,
            };
            let code = cmd::cmd_run(&cli, &project_dir, options).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Report { open } => cmd::cmd_report(&cli, &project_dir, *open)?,
        Commands::Validate => cmd::cmd_validate(&cli, &project_dir)?,
        Commands::Baseline { command } => cmd::cmd_baseline(&cli, &project_dir, command.clone())?,
        Commands::Diff => cmd::cmd_diff(&cli, &project_dir)?,
    }

    Ok(())
}
