//! Declarative audits defined in `[[custom_audits]]`.

use super::{Audit, AuditContext, AuditDescriptor, AuditOrigin};
use crate::config::{CustomAuditConfig, Expectation};
use crate::result::{AuditResult, Severity};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;

/// Matches the page document against a regular expression.
pub struct PatternAudit {
    name: String,
    description: String,
    pattern: Regex,
    expect: Expectation,
    severity: Severity,
}

impl PatternAudit {
    pub fn from_config(config: &CustomAuditConfig) -> Result<Self> {
        let pattern = Regex::new(&config.pattern)
            .with_context(|| format!("Invalid pattern for custom audit '{}'", config.name))?;
        let description = if config.description.is_empty() {
            format!("Page content matches /{}/", config.pattern)
        } else {
            config.description.clone()
        };
        Ok(Self {
            name: config.name.clone(),
            description,
            pattern,
            expect: config.expect,
            severity: config.severity,
        })
    }
}

#[async_trait]
impl Audit for PatternAudit {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> Result<AuditResult> {
        let document = ctx.page.content().await?;
        let matches = self.pattern.find_iter(&document).count();
        let met = match self.expect {
            Expectation::Present => matches > 0,
            Expectation::Absent => matches == 0,
        };

        let message = match (self.expect, met) {
            (Expectation::Present, true) => format!("Pattern found ({} match(es))", matches),
            (Expectation::Present, false) => "Expected pattern not found".to_string(),
            (Expectation::Absent, true) => "Pattern absent".to_string(),
            (Expectation::Absent, false) => {
                format!("Unexpected pattern found ({} match(es))", matches)
            }
        };

        let page = &ctx.target.name;
        let verdict = if met {
            AuditResult::pass(&self.name, page, message)
        } else if self.severity == Severity::Warning {
            AuditResult::warning(&self.name, page, message)
        } else {
            AuditResult::fail(&self.name, page, message)
        };
        Ok(verdict.with_details(json!({
            "pattern": self.pattern.as_str(),
            "expect": self.expect,
            "matches": matches,
        })))
    }
}

/// Build descriptors for every configured custom audit.
pub fn descriptors(configs: &[CustomAuditConfig]) -> Result<Vec<AuditDescriptor>> {
    configs
        .iter()
        .map(|config| {
            let audit = PatternAudit::from_config(config)?;
            Ok(AuditDescriptor::new(AuditOrigin::Custom, Arc::new(audit)))
        })
        .collect()
}
