//! Post-run notifications.

use crate::config::{NotificationConfig, WebguardConfig, WebhookMethod};
use crate::result::RunResult;
use crate::ui::icons::BELL;
use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> String;

    /// Deliver the notification. Returns `Ok(false)` when skipped.
    async fn send(&self, result: &RunResult, config: &WebguardConfig) -> Result<bool>;
}

fn status_label(result: &RunResult) -> &'static str {
    if result.summary.failed > 0 { "fail" } else { "pass" }
}

/// Generic JSON webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    method: WebhookMethod,
    headers: HashMap<String, String>,
    only_on_failure: bool,
}

impl WebhookNotifier {
    pub fn payload(result: &RunResult, config: &WebguardConfig) -> Value {
        json!({
            "tool": "webguard",
            "status": status_label(result),
            "baseURL": config.base_url,
            "timestamp": result.timestamp,
            "summary": result.summary,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> String {
        let host = reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone());
        format!("webhook:{}", host)
    }

    async fn send(&self, result: &RunResult, config: &WebguardConfig) -> Result<bool> {
        if self.only_on_failure && result.summary.failed == 0 {
            return Ok(false);
        }
        let mut request = match self.method {
            WebhookMethod::Post => self.client.post(&self.url),
            WebhookMethod::Put => self.client.put(&self.url),
        }
        .header(CONTENT_TYPE, "application/json");
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
            .json(&Self::payload(result, config))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.url))?
            .error_for_status()?;
        Ok(true)
    }
}

/// Slack incoming webhook with a single attachment.
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    channel: Option<String>,
    only_on_failure: bool,
}

impl SlackNotifier {
    pub fn payload(result: &RunResult, config: &WebguardConfig, channel: Option<&str>) -> Value {
        let summary = &result.summary;
        let color = if summary.failed > 0 { "#ef4444" } else { "#22c55e" };
        json!({
            "channel": channel,
            "attachments": [{
                "color": color,
                "title": format!("webguard: {}", status_label(result).to_uppercase()),
                "title_link": config.base_url,
                "text": format!(
                    "{} passed, {} failed, {} warnings",
                    summary.passed, summary.failed, summary.warnings
                ),
                "fields": [
                    { "title": "Base URL", "value": config.base_url, "short": true },
                    { "title": "Pages", "value": result.config.total_pages.to_string(), "short": true },
                    {
                        "title": "Duration",
                        "value": format!("{:.1}s", summary.duration as f64 / 1000.0),
                        "short": true
                    },
                ],
                "footer": "webguard",
                "ts": chrono::Utc::now().timestamp(),
            }],
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> String {
        "slack".to_string()
    }

    async fn send(&self, result: &RunResult, config: &WebguardConfig) -> Result<bool> {
        if self.only_on_failure && result.summary.failed == 0 {
            return Ok(false);
        }
        self.client
            .post(&self.webhook_url)
            .json(&Self::payload(result, config, self.channel.as_deref()))
            .send()
            .await
            .context("Failed to reach Slack")?
            .error_for_status()?;
        Ok(true)
    }
}

/// Build the notifiers configured in `notifications`.
pub fn from_config(channels: &[NotificationConfig], client: &reqwest::Client) -> Vec<Arc<dyn Notifier>> {
    channels
        .iter()
        .map(|channel| -> Arc<dyn Notifier> {
            match channel {
                NotificationConfig::Webhook {
                    url,
                    method,
                    headers,
                    only_on_failure,
                } => Arc::new(WebhookNotifier {
                    client: client.clone(),
                    url: url.clone(),
                    method: *method,
                    headers: headers.clone(),
                    only_on_failure: *only_on_failure,
                }),
                NotificationConfig::Slack {
                    webhook_url,
                    channel,
                    only_on_failure,
                } => Arc::new(SlackNotifier {
                    client: client.clone(),
                    webhook_url: webhook_url.clone(),
                    channel: channel.clone(),
                    only_on_failure: *only_on_failure,
                }),
            }
        })
        .collect()
}

/// Send every notification in order. Failures are logged and returned by
/// name; they never change the run outcome.
pub async fn send_all(
    notifiers: &[Arc<dyn Notifier>],
    result: &RunResult,
    config: &WebguardConfig,
) -> Vec<String> {
    let mut failed = Vec::new();
    for notifier in notifiers {
        match notifier.send(result, config).await {
            Ok(true) => println!(
                "  {}{}",
                BELL,
                style(format!("Notification sent: {}", notifier.name())).dim()
            ),
            Ok(false) => debug!(channel = %notifier.name(), "Notification skipped"),
            Err(e) => {
                warn!(channel = %notifier.name(), error = %e, "Notification failed");
                println!(
                    "  {} {:#}",
                    style(format!("Notification '{}' failed:", notifier.name())).yellow(),
                    e
                );
                failed.push(notifier.name());
            }
        }
    }
    failed
}
