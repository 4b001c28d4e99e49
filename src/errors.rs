//! Typed error hierarchy for webguard.
//!
//! Fatal classes abort a run before any target executes:
//! - `ConfigError`: the configuration cannot be read, parsed or validated
//! - `AuthError`: session material could not be acquired
//! - `RunError`: top-level wrapper returned by `runner::run`
//!
//! `NavigationError` is recoverable: the executor records it as an absent
//! navigation outcome and the audits interpret that themselves.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating `webguard.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No webguard config found. Run \"webguard init\" to create one, or pass --config <path>")]
    NotFound,

    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid webguard config:\n{}", format_issues(.0))]
    Invalid(Vec<String>),
}

fn format_issues(issues: &[String]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors raised while acquiring authenticated session material.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login failed (HTTP {status}): {body}")]
    LoginFailed { status: u16, body: String },

    #[error("Login request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Auth method '{0}' is not supported by this session provider")]
    Unsupported(String),

    #[error("Failed to write session state at {path}: {source}")]
    StateWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid login URL '{0}'")]
    InvalidUrl(String),
}

/// All navigation attempts for a URL ended in an error.
#[derive(Debug, Error)]
#[error("Failed to load {url} after {attempts} attempt(s): {source}")]
pub struct NavigationError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: anyhow::Error,
}

/// Fatal errors that abort a run before a `RunResult` can be produced.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to prepare run directory {path}: {source}")]
    RunDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open session: {0}")]
    Session(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
