//! The six built-in audits.

use super::{Audit, AuditContext, AuditDescriptor, AuditOrigin};
use crate::result::AuditResult;
use crate::session::{Analysis, ConsoleLevel};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::debug;

pub const HTTP_STATUS: &str = "httpStatus";
pub const CONTENT_VISIBILITY: &str = "contentVisibility";
pub const ACCESSIBILITY: &str = "accessibility";
pub const LIGHTHOUSE: &str = "lighthouse";
pub const BROKEN_LINKS: &str = "brokenLinks";
pub const CONSOLE_ERRORS: &str = "consoleErrors";

/// Built-in names with their enablement when the config has no entry.
pub const DEFAULTS: [(&str, bool); 6] = [
    (HTTP_STATUS, true),
    (CONTENT_VISIBILITY, true),
    (ACCESSIBILITY, true),
    (LIGHTHOUSE, false),
    (BROKEN_LINKS, false),
    (CONSOLE_ERRORS, true),
];

pub fn default_enabled(name: &str) -> Option<bool> {
    DEFAULTS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, on)| *on)
}

/// Built-in descriptors in registry order.
pub fn descriptors() -> Vec<AuditDescriptor> {
    let audits: [Arc<dyn Audit>; 6] = [
        Arc::new(HttpStatusAudit),
        Arc::new(ContentVisibilityAudit),
        Arc::new(AccessibilityAudit),
        Arc::new(LighthouseAudit),
        Arc::new(BrokenLinksAudit),
        Arc::new(ConsoleErrorsAudit),
    ];
    audits
        .into_iter()
        .map(|audit| AuditDescriptor::new(AuditOrigin::BuiltIn, audit))
        .collect()
}

static BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*?)(?:</body>|$)").expect("valid regex"));
static NON_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>|<!--.*?-->")
        .expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static STRUCTURAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:h1|h2|p|main|div|section|nav|header)\b").expect("valid regex")
});
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("valid regex")
});

/// Navigation status must equal the target's expected status.
pub struct HttpStatusAudit;

#[async_trait]
impl Audit for HttpStatusAudit {
    fn name(&self) -> &str {
        HTTP_STATUS
    }

    fn description(&self) -> &str {
        "Verify the page returns the expected HTTP status code"
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> anyhow::Result<AuditResult> {
        let status = ctx.navigation.map(|n| n.status).unwrap_or(0);
        let expected = ctx.target.expected_status;
        let passed = status == expected;
        let message = if passed {
            format!("HTTP {} OK", status)
        } else {
            format!("Expected HTTP {}, got {}", expected, status)
        };
        Ok(
            AuditResult::from_check(HTTP_STATUS, &ctx.target.name, passed, message)
                .with_details(json!({ "status": status, "expected": expected })),
        )
    }
}

/// Visible text length and structural element count of a document body.
/// `None` when the document has no body.
pub fn body_metrics(document: &str) -> Option<(usize, usize)> {
    let body = BODY.captures(document)?.get(1)?.as_str();
    let visible = NON_TEXT.replace_all(body, " ");
    let elements = STRUCTURAL.find_iter(&visible).count();
    let text = TAG.replace_all(&visible, " ");
    let text_len = text.split_whitespace().map(str::len).sum::<usize>();
    Some((text_len, elements))
}

/// The page body must contain visible text and structural elements.
pub struct ContentVisibilityAudit;

#[async_trait]
impl Audit for ContentVisibilityAudit {
    fn name(&self) -> &str {
        CONTENT_VISIBILITY
    }

    fn description(&self) -> &str {
        "Verify the page has visible rendered content"
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> anyhow::Result<AuditResult> {
        let page = &ctx.target.name;
        let document = ctx.page.content().await.unwrap_or_default();

        let Some((text_len, elements)) = body_metrics(&document) else {
            return Ok(
                AuditResult::fail(CONTENT_VISIBILITY, page, "Page body is not visible")
                    .with_details(json!({ "bodyVisible": false, "textLength": 0, "elementCount": 0 })),
            );
        };

        let passed = text_len > 0 && elements > 0;
        let message = if passed {
            format!("{} elements visible", elements)
        } else {
            format!(
                "Content check failed (text: {} chars, elements: {})",
                text_len, elements
            )
        };
        Ok(
            AuditResult::from_check(CONTENT_VISIBILITY, page, passed, message).with_details(
                json!({ "bodyVisible": true, "textLength": text_len, "elementCount": elements }),
            ),
        )
    }
}

/// Delegates to the session's accessibility analysis.
///
/// The analysis result is expected as `{"violations": [{"id", "impact",
/// "description", "helpUrl", "nodes"}]}` where `nodes` is either a count or
/// the list of offending nodes.
pub struct AccessibilityAudit;

#[async_trait]
impl Audit for AccessibilityAudit {
    fn name(&self) -> &str {
        ACCESSIBILITY
    }

    fn description(&self) -> &str {
        "WCAG accessibility audit"
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> anyhow::Result<AuditResult> {
        let page = &ctx.target.name;
        let analysis = Analysis::Accessibility {
            tags: ctx.config.wcag_tags.clone(),
        };
        let Some(report) = ctx.page.analyze(&analysis).await? else {
            return Ok(AuditResult::skip(
                ACCESSIBILITY,
                page,
                "Accessibility analysis is not supported by this session",
            ));
        };

        let violations: Vec<Value> = report
            .get("violations")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|v| {
                        let elements = match v.get("nodes") {
                            Some(Value::Array(nodes)) => nodes.len() as u64,
                            Some(n) => n.as_u64().unwrap_or(0),
                            None => 0,
                        };
                        json!({
                            "rule": v.get("id").cloned().unwrap_or(Value::Null),
                            "impact": v.get("impact").cloned().unwrap_or(Value::Null),
                            "description": v.get("description").cloned().unwrap_or(Value::Null),
                            "helpUrl": v.get("helpUrl").cloned().unwrap_or(Value::Null),
                            "elements": elements,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let count = violations.len();
        let details = json!({ "violationCount": count, "violations": violations });
        if count == 0 {
            return Ok(AuditResult::pass(ACCESSIBILITY, page, "0 violations").with_details(details));
        }

        let artifact = ctx.artifact_dir().join("a11y-violations.json");
        if let Err(e) = crate::util::write_json(&artifact, &violations) {
            debug!(error = %e, "Failed to write accessibility violations");
        }
        Ok(
            AuditResult::warning(ACCESSIBILITY, page, format!("{} violation(s)", count))
                .with_details(details),
        )
    }
}

/// Delegates to the session's performance scoring and compares each
/// category (0-100) against its configured threshold.
pub struct LighthouseAudit;

#[async_trait]
impl Audit for LighthouseAudit {
    fn name(&self) -> &str {
        LIGHTHOUSE
    }

    fn description(&self) -> &str {
        "Performance, accessibility, best practices and SEO scoring"
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> anyhow::Result<AuditResult> {
        let page = &ctx.target.name;
        let Some(report) = ctx.page.analyze(&Analysis::Performance).await? else {
            return Ok(AuditResult::skip(
                LIGHTHOUSE,
                page,
                "Performance scoring is not supported by this session",
            ));
        };

        let mut scores = serde_json::Map::new();
        let mut failures = Vec::new();
        for (category, threshold) in ctx.config.lighthouse_thresholds.categories() {
            let score = report
                .get(category)
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .round();
            if threshold > 0.0 && score < threshold {
                failures.push(format!("{}: {} < {}", category, score, threshold));
            }
            scores.insert(category.to_string(), json!(score as i64));
        }

        let artifact = ctx.artifact_dir().join("lighthouse-report.json");
        if let Err(e) = crate::util::write_json(&artifact, &report) {
            debug!(error = %e, "Failed to write performance report");
        }

        let details = json!({
            "scores": scores,
            "thresholds": ctx.config.lighthouse_thresholds,
            "failures": failures,
        });
        let verdict = if failures.is_empty() {
            let summary = scores
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            AuditResult::pass(LIGHTHOUSE, page, summary)
        } else {
            AuditResult::warning(
                LIGHTHOUSE,
                page,
                format!("Below threshold: {}", failures.join("; ")),
            )
        };
        Ok(verdict.with_details(details))
    }
}

/// Unique absolute http(s) link targets of a document, in document order.
pub fn extract_links(document: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = reqwest::Url::parse(base_url) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    ANCHOR_HREF
        .captures_iter(document)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().trim())
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// HEADs every link on the page; any status >= 400 or unreachable link is a
/// warning.
pub struct BrokenLinksAudit;

#[async_trait]
impl Audit for BrokenLinksAudit {
    fn name(&self) -> &str {
        BROKEN_LINKS
    }

    fn description(&self) -> &str {
        "Find broken links (4xx/5xx) on the page"
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> anyhow::Result<AuditResult> {
        let page = &ctx.target.name;
        let document = ctx.page.content().await?;
        let links = extract_links(&document, &ctx.config.base_url);

        let mut broken = Vec::new();
        for url in &links {
            match ctx.page.head(url).await {
                Ok(status) if status >= 400 => broken.push(json!({ "url": url, "status": status })),
                Ok(_) => {}
                Err(e) => {
                    debug!(url = %url, error = %e, "Link unreachable");
                    broken.push(json!({ "url": url, "status": 0 }));
                }
            }
        }

        let total = links.len();
        let details = json!({ "totalLinks": total, "broken": broken });
        let verdict = if broken.is_empty() {
            AuditResult::pass(BROKEN_LINKS, page, format!("All {} links valid", total))
        } else {
            AuditResult::warning(
                BROKEN_LINKS,
                page,
                format!("{} broken link(s) of {}", broken.len(), total),
            )
        };
        Ok(verdict.with_details(details))
    }
}

/// Console errors fail the page; warnings alone only warn.
pub struct ConsoleErrorsAudit;

#[async_trait]
impl Audit for ConsoleErrorsAudit {
    fn name(&self) -> &str {
        CONSOLE_ERRORS
    }

    fn description(&self) -> &str {
        "Capture browser console errors and warnings"
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> anyhow::Result<AuditResult> {
        let page = &ctx.target.name;
        if !ctx.page.captures_console() {
            return Ok(AuditResult::skip(
                CONSOLE_ERRORS,
                page,
                "Console capture is not supported by this session",
            ));
        }
        let errors: Vec<String> = ctx
            .console
            .with_level(ConsoleLevel::Error)
            .into_iter()
            .map(|m| m.text)
            .collect();
        let warnings: Vec<String> = ctx
            .console
            .with_level(ConsoleLevel::Warning)
            .into_iter()
            .map(|m| m.text)
            .collect();

        let message = if errors.is_empty() && warnings.is_empty() {
            "0 errors".to_string()
        } else {
            format!("{} error(s), {} warning(s)", errors.len(), warnings.len())
        };
        let verdict = if !errors.is_empty() {
            AuditResult::fail(CONSOLE_ERRORS, page, message)
        } else if !warnings.is_empty() {
            AuditResult::warning(CONSOLE_ERRORS, page, message)
        } else {
            AuditResult::pass(CONSOLE_ERRORS, page, message)
        };
        Ok(verdict.with_details(json!({ "errors": errors, "warnings": warnings })))
    }
}
