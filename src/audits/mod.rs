//! Audit capabilities and the registry that decides which of them run.
//!
//! Every audit, built-in, plugin-provided or declared inline in the config,
//! implements the same [`Audit`] trait and is handed an [`AuditContext`] for
//! exactly one target.

pub mod builtin;
pub mod custom;
pub mod registry;

use crate::config::{Target, WebguardConfig};
use crate::session::{ConsoleLog, NavResponse, PageScope, Session};
use crate::result::AuditResult;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Everything an audit can look at for one target.
pub struct AuditContext<'a> {
    pub session: &'a dyn Session,
    pub page: &'a dyn PageScope,
    pub target: &'a Target,
    pub config: &'a WebguardConfig,
    pub run_dir: &'a Path,
    /// `None` when every navigation attempt raised an error.
    pub navigation: Option<&'a NavResponse>,
    pub console: &'a ConsoleLog,
}

impl AuditContext<'_> {
    /// Absolute URL of the target being audited.
    pub fn url(&self) -> String {
        self.target.url(&self.config.base_url)
    }

    /// Per-page artifact directory under the run directory.
    pub fn artifact_dir(&self) -> std::path::PathBuf {
        self.run_dir
            .join("screenshots")
            .join(crate::util::sanitize(&self.target.name))
    }
}

/// A single check run against one page.
///
/// Returning `Err` (or panicking) is never fatal: the executor records a
/// `fail` verdict carrying the cause.
#[async_trait]
pub trait Audit: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, ctx: &AuditContext<'_>) -> anyhow::Result<AuditResult>;
}

/// Where an audit came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOrigin {
    BuiltIn,
    Plugin(String),
    Custom,
}

impl fmt::Display for AuditOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOrigin::BuiltIn => write!(f, "built-in"),
            AuditOrigin::Plugin(name) => write!(f, "plugin:{}", name),
            AuditOrigin::Custom => write!(f, "custom"),
        }
    }
}

/// A registered audit. The name is the unique key.
#[derive(Clone)]
pub struct AuditDescriptor {
    pub name: String,
    pub description: String,
    pub origin: AuditOrigin,
    pub audit: Arc<dyn Audit>,
}

impl AuditDescriptor {
    pub fn new(origin: AuditOrigin, audit: Arc<dyn Audit>) -> Self {
        Self {
            name: audit.name().to_string(),
            description: audit.description().to_string(),
            origin,
            audit,
        }
    }
}

impl fmt::Debug for AuditDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditDescriptor")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}
