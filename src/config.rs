//! Configuration for webguard, read from `webguard.toml`.
//!
//! # Configuration File Format
//!
//! ```toml
//! base_url = "https://example.com"
//!
//! [[pages]]
//! name = "Home"
//! path = "/"
//!
//! [[pages]]
//! name = "Admin"
//! path = "/admin"
//! expected_status = 403
//! skip_audits = ["brokenLinks"]
//!
//! [auth]
//! method = "bearer-token"
//! token = "${API_TOKEN}"
//!
//! [audits]
//! lighthouse = true
//! consoleErrors = false
//!
//! [[custom_audits]]
//! name = "hasTitle"
//! pattern = "<title>[^<]+</title>"
//!
//! [retry]
//! max_retries = 3
//! delay_ms = 5000
//!
//! [runner]
//! concurrency = 4
//! fail_fast = false
//!
//! [output]
//! dir = "./webguard-results"
//! formats = ["terminal", "html", "json", "junit"]
//!
//! [baseline]
//! enabled = true
//! update_on_pass = true
//!
//! [[notifications]]
//! kind = "slack"
//! webhook_url = "${SLACK_WEBHOOK}"
//! only_on_failure = true
//! ```
//!
//! `${VAR}` references anywhere in the file are replaced from the environment
//! before parsing.

use crate::errors::ConfigError;
use crate::result::Severity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// File names searched, in order, when no `--config` is given.
pub const CONFIG_NAMES: &[&str] = &["webguard.toml", ".webguard.toml"];

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env regex"));

/// One page to audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// Path relative to `base_url`, e.g. `/about`.
    pub path: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Audits skipped for this target only.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub skip_audits: BTreeSet<String>,
}

fn default_expected_status() -> u16 {
    200
}

impl Target {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            expected_status: default_expected_status(),
            skip_audits: BTreeSet::new(),
        }
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_skipped(mut self, audit: &str) -> Self {
        self.skip_audits.insert(audit.to_string());
        self
    }

    /// Absolute URL of this target under `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        }
    }
}

/// A form field filled during form login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub selector: String,
    pub value: String,
}

/// A literal cookie injected into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// How the shared session is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum AuthConfig {
    #[default]
    None,
    ApiLogin {
        login_url: String,
        payload: HashMap<String, String>,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    FormLogin {
        login_url: String,
        fields: Vec<FormField>,
        submit_selector: String,
        #[serde(default)]
        wait_after_login: Option<String>,
    },
    Cookie {
        cookies: Vec<CookieConfig>,
    },
    BearerToken {
        token: String,
    },
}

impl AuthConfig {
    pub fn method(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::ApiLogin { .. } => "api-login",
            AuthConfig::FormLogin { .. } => "form-login",
            AuthConfig::Cookie { .. } => "cookie",
            AuthConfig::BearerToken { .. } => "bearer-token",
        }
    }
}

/// Whether a custom audit's pattern must be present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    #[default]
    Present,
    Absent,
}

/// A declarative audit defined inline in the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAuditConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Regular expression matched against the page document.
    pub pattern: String,
    #[serde(default)]
    pub expect: Expectation,
    /// Severity reported when the expectation is not met: `fail` or `warning`.
    #[serde(default = "default_custom_severity")]
    pub severity: Severity,
}

fn default_custom_severity() -> Severity {
    Severity::Fail
}

/// Minimum category scores (0-100) for the lighthouse audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LighthouseThresholds {
    #[serde(default = "default_performance")]
    pub performance: f64,
    #[serde(default = "default_accessibility")]
    pub accessibility: f64,
    #[serde(default = "default_best_practices")]
    pub best_practices: f64,
    #[serde(default = "default_seo")]
    pub seo: f64,
}

fn default_performance() -> f64 {
    50.0
}

fn default_accessibility() -> f64 {
    90.0
}

fn default_best_practices() -> f64 {
    80.0
}

fn default_seo() -> f64 {
    80.0
}

impl Default for LighthouseThresholds {
    fn default() -> Self {
        Self {
            performance: default_performance(),
            accessibility: default_accessibility(),
            best_practices: default_best_practices(),
            seo: default_seo(),
        }
    }
}

impl LighthouseThresholds {
    /// Category name to threshold, in report order.
    pub fn categories(&self) -> [(&'static str, f64); 4] {
        [
            ("performance", self.performance),
            ("accessibility", self.accessibility),
            ("best-practices", self.best_practices),
            ("seo", self.seo),
        ]
    }
}

/// Navigation retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_concurrency() -> usize {
    1
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Settings handed to the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_browser_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub viewport: Viewport,
}

fn default_true() -> bool {
    true
}

fn default_browser_timeout_ms() -> u64 {
    60_000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_ms: default_browser_timeout_ms(),
            viewport: Viewport::default(),
        }
    }
}

/// Built-in report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Terminal,
    Html,
    Json,
    Junit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_formats")]
    pub formats: Vec<ReportFormat>,
    #[serde(default = "default_true")]
    pub screenshots: bool,
    #[serde(default)]
    pub screenshot_on_fail_only: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./webguard-results")
}

fn default_formats() -> Vec<ReportFormat> {
    vec![ReportFormat::Terminal, ReportFormat::Html, ReportFormat::Json]
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            formats: default_formats(),
            screenshots: true,
            screenshot_on_fail_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub update_on_pass: bool,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            update_on_pass: true,
        }
    }
}

/// HTTP method used by webhook notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    #[default]
    Post,
    Put,
}

/// A channel notified after every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotificationConfig {
    Webhook {
        url: String,
        #[serde(default)]
        method: WebhookMethod,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        only_on_failure: bool,
    },
    Slack {
        webhook_url: String,
        #[serde(default)]
        channel: Option<String>,
        #[serde(default)]
        only_on_failure: bool,
    },
}

/// The full, validated webguard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebguardConfig {
    pub base_url: String,
    pub pages: Vec<Target>,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Explicit audit enablement by name. Missing built-ins fall back to
    /// their own default; missing plugin and custom audits are enabled.
    #[serde(default)]
    pub audits: HashMap<String, bool>,
    #[serde(default)]
    pub custom_audits: Vec<CustomAuditConfig>,
    #[serde(default = "default_wcag_tags")]
    pub wcag_tags: Vec<String>,
    #[serde(default)]
    pub lighthouse_thresholds: LighthouseThresholds,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    pub notifications: Vec<NotificationConfig>,
}

fn default_wcag_tags() -> Vec<String> {
    ["wcag2a", "wcag2aa", "wcag21a", "wcag21aa"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

impl WebguardConfig {
    /// Minimal valid config, mostly useful for tests and embedding.
    pub fn new(base_url: &str, pages: Vec<Target>) -> Self {
        Self {
            base_url: base_url.to_string(),
            pages,
            auth: AuthConfig::default(),
            audits: HashMap::new(),
            custom_audits: Vec::new(),
            wcag_tags: default_wcag_tags(),
            lighthouse_thresholds: LighthouseThresholds::default(),
            retry: RetryConfig::default(),
            runner: RunnerConfig::default(),
            browser: BrowserConfig::default(),
            output: OutputConfig::default(),
            baseline: BaselineConfig::default(),
            notifications: Vec::new(),
        }
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate config text, expanding `${VAR}` references first.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let expanded = interpolate_env(content, |name| std::env::var(name).ok())?;
        let config: Self = toml::from_str(&expanded)?;
        let issues = config.validate();
        if issues.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// Resolve the config path (explicit or discovered in `dir`) and load it.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_config(dir).ok_or(ConfigError::NotFound)?,
        };
        let config = Self::load(&path)?;
        Ok((path, config))
    }

    /// Check the config and return one `path: message` entry per problem.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !is_http_url(&self.base_url) {
            issues.push(format!(
                "base_url: '{}' must be an absolute http(s) URL",
                self.base_url
            ));
        }

        if self.pages.is_empty() {
            issues.push("pages: at least one page is required".to_string());
        }
        let mut seen = HashSet::new();
        for (i, page) in self.pages.iter().enumerate() {
            if page.name.trim().is_empty() {
                issues.push(format!("pages.{}.name: must not be empty", i));
            } else if !seen.insert(page.name.as_str()) {
                issues.push(format!("pages.{}.name: duplicate page name '{}'", i, page.name));
            }
            if !page.path.starts_with('/') {
                issues.push(format!("pages.{}.path: '{}' must start with '/'", i, page.path));
            }
        }

        if self.retry.max_retries < 1 {
            issues.push("retry.max_retries: must be at least 1".to_string());
        }
        if self.runner.concurrency < 1 {
            issues.push("runner.concurrency: must be at least 1".to_string());
        }

        for (name, value) in self.lighthouse_thresholds.categories() {
            if !(0.0..=100.0).contains(&value) {
                issues.push(format!(
                    "lighthouse_thresholds.{}: {} is outside 0-100",
                    name, value
                ));
            }
        }

        for (i, custom) in self.custom_audits.iter().enumerate() {
            if custom.name.trim().is_empty() {
                issues.push(format!("custom_audits.{}.name: must not be empty", i));
            }
            if let Err(e) = Regex::new(&custom.pattern) {
                issues.push(format!("custom_audits.{}.pattern: {}", i, e));
            }
            if !matches!(custom.severity, Severity::Fail | Severity::Warning) {
                issues.push(format!(
                    "custom_audits.{}.severity: must be 'fail' or 'warning'",
                    i
                ));
            }
        }

        match &self.auth {
            AuthConfig::ApiLogin { login_url, .. } | AuthConfig::FormLogin { login_url, .. }
                if !is_http_url(login_url) =>
            {
                issues.push(format!("auth.login_url: '{}' is not a valid URL", login_url));
            }
            AuthConfig::Cookie { cookies } if cookies.is_empty() => {
                issues.push("auth.cookies: at least one cookie is required".to_string());
            }
            AuthConfig::BearerToken { token } if token.is_empty() => {
                issues.push("auth.token: must not be empty".to_string());
            }
            _ => {}
        }

        for (i, channel) in self.notifications.iter().enumerate() {
            let url = match channel {
                NotificationConfig::Webhook { url, .. } => url,
                NotificationConfig::Slack { webhook_url, .. } => webhook_url,
            };
            if !is_http_url(url) {
                issues.push(format!("notifications.{}: '{}' is not a valid URL", i, url));
            }
        }

        issues
    }

    /// Directory holding run directories, baseline and auth state.
    pub fn output_dir(&self) -> &Path {
        &self.output.dir
    }
}

fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

/// Find the first known config file name in `dir`.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Replace every `${VAR}` with the value returned by `lookup`.
pub fn interpolate_env(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut missing = Vec::new();
    let expanded = ENV_REF.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match lookup(name) {
            Some(value) => value,
            None => {
                missing.push(format!("env: variable '{}' is not set", name));
                String::new()
            }
        }
    });
    if missing.is_empty() {
        Ok(expanded.into_owned())
    } else {
        Err(ConfigError::Invalid(missing))
    }
}

/// Config written by `webguard init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# webguard configuration
base_url = "https://example.com"

[[pages]]
name = "Home"
path = "/"

[[pages]]
name = "About"
path = "/about"

[auth]
method = "none"

[audits]
httpStatus = true
contentVisibility = true
accessibility = true
lighthouse = false
brokenLinks = false
consoleErrors = true

[output]
dir = "./webguard-results"
formats = ["terminal", "html", "json"]
screenshots = true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
base_url = "https://example.com"

[[pages]]
name = "Home"
path = "/"
"#;

    #[test]
    fn test_parse_minimal_applies_defaults() {
        let config = WebguardConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.pages.len(), 1);
        assert_eq!(config.pages[0].expected_status, 200);
        assert_eq!(config.auth, AuthConfig::None);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay_ms, 5000);
        assert_eq!(config.runner.concurrency, 1);
        assert!(!config.runner.fail_fast);
        assert!(config.output.screenshots);
        assert_eq!(config.output.formats.len(), 3);
        assert!(config.baseline.update_on_pass);
        assert_eq!(config.wcag_tags.len(), 4);
        assert!(config.audits.is_empty());
    }

    #[test]
    fn test_parse_full_sections() {
        let content = r#"
base_url = "https://example.com"

[[pages]]
name = "Admin"
path = "/admin"
expected_status = 403
skip_audits = ["brokenLinks", "lighthouse"]

[auth]
method = "cookie"
cookies = [{ name = "sid", value = "abc", domain = "example.com" }]

[audits]
lighthouse = true
consoleErrors = false

[[custom_audits]]
name = "hasTitle"
pattern = "<title>"
severity = "warning"

[runner]
concurrency = 4
fail_fast = true

[[notifications]]
kind = "webhook"
url = "https://hooks.example.com/x"
method = "PUT"
"#;
        let config = WebguardConfig::parse(content).unwrap();
        assert_eq!(config.pages[0].expected_status, 403);
        assert!(config.pages[0].skip_audits.contains("brokenLinks"));
        match &config.auth {
            AuthConfig::Cookie { cookies } => assert_eq!(cookies[0].path, "/"),
            other => panic!("Expected cookie auth, got {:?}", other),
        }
        assert_eq!(config.audits.get("lighthouse"), Some(&true));
        assert_eq!(config.custom_audits[0].severity, Severity::Warning);
        assert_eq!(config.custom_audits[0].expect, Expectation::Present);
        assert_eq!(config.runner.concurrency, 4);
        assert!(matches!(
            config.notifications[0],
            NotificationConfig::Webhook {
                method: WebhookMethod::Put,
                ..
            }
        ));
    }

    #[test]
    fn test_auth_methods_are_kebab_case() {
        let content = format!(
            "{}\n[auth]\nmethod = \"api-login\"\nlogin_url = \"https://example.com/login\"\npayload = {{ email = \"a@b.c\" }}\n",
            MINIMAL
        );
        let config = WebguardConfig::parse(&content).unwrap();
        assert_eq!(config.auth.method(), "api-login");
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let mut config = WebguardConfig::new("not-a-url", vec![]);
        config.retry.max_retries = 0;
        config.runner.concurrency = 0;
        config.lighthouse_thresholds.seo = 120.0;

        let issues = config.validate();
        assert!(issues.iter().any(|i| i.starts_with("base_url")));
        assert!(issues.iter().any(|i| i.starts_with("pages")));
        assert!(issues.iter().any(|i| i.starts_with("retry.max_retries")));
        assert!(issues.iter().any(|i| i.starts_with("runner.concurrency")));
        assert!(issues.iter().any(|i| i.starts_with("lighthouse_thresholds.seo")));
    }

    #[test]
    fn test_validate_rejects_duplicate_pages_and_bad_patterns() {
        let mut config = WebguardConfig::new(
            "https://example.com",
            vec![Target::new("Home", "/"), Target::new("Home", "about")],
        );
        config.custom_audits.push(CustomAuditConfig {
            name: "broken".to_string(),
            description: String::new(),
            pattern: "(unclosed".to_string(),
            expect: Expectation::Present,
            severity: Severity::Skip,
        });

        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("duplicate page name")));
        assert!(issues.iter().any(|i| i.contains("must start with '/'")));
        assert!(issues.iter().any(|i| i.starts_with("custom_audits.0.pattern")));
        assert!(issues.iter().any(|i| i.starts_with("custom_audits.0.severity")));
    }

    #[test]
    fn test_parse_invalid_returns_config_error() {
        let err = WebguardConfig::parse("base_url = \"https://example.com\"\npages = []\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_interpolate_env() {
        let expanded = interpolate_env("token = \"${TOKEN}\"", |name| {
            (name == "TOKEN").then(|| "s3cret".to_string())
        })
        .unwrap();
        assert_eq!(expanded, "token = \"s3cret\"");

        let err = interpolate_env("token = \"${MISSING_VAR}\"", |_| None).unwrap_err();
        assert!(err.to_string().contains("MISSING_VAR"));
    }

    #[test]
    fn test_target_url_joins_cleanly() {
        let target = Target::new("About", "/about");
        assert_eq!(target.url("https://example.com"), "https://example.com/about");
        assert_eq!(target.url("https://example.com/"), "https://example.com/about");
    }

    #[test]
    fn test_default_template_is_valid() {
        let config = WebguardConfig::parse(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.pages.len(), 2);
        assert_eq!(config.audits.get("lighthouse"), Some(&false));
    }

    #[test]
    fn test_find_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config(dir.path()).is_none());
        std::fs::write(dir.path().join("webguard.toml"), MINIMAL).unwrap();
        assert_eq!(
            find_config(dir.path()).unwrap(),
            dir.path().join("webguard.toml")
        );
        let (_, config) = WebguardConfig::discover(None, dir.path()).unwrap();
        assert_eq!(config.base_url, "https://example.com");
    }
}
