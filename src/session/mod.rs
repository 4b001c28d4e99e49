//! The session collaborator: an authenticated browsing context shared
//! read-only by all workers, and the per-target page scopes it hands out.
//!
//! The engine only depends on the traits here. `http::HttpSession` is the
//! implementation shipped with the CLI; anything that can navigate, expose a
//! console stream and take screenshots (a real browser driver, a test stub)
//! can be plugged in instead.

pub mod http;
#[cfg(test)]
pub mod stub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use http::HttpSession;

/// Per-attempt navigation timeout.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// The response to a top-level navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
}

impl NavResponse {
    pub fn new(status: u16, url: &str) -> Self {
        Self {
            status,
            url: url.to_string(),
        }
    }

    /// 2xx-class response.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Per-navigation settings passed to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub timeout: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            timeout: NAVIGATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Warning,
    Error,
}

/// One message written to the page console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    #[serde(rename = "type")]
    pub level: ConsoleLevel,
    pub text: String,
}

impl ConsoleMessage {
    pub fn new(level: ConsoleLevel, text: &str) -> Self {
        Self {
            level,
            text: text.to_string(),
        }
    }
}

/// Callback receiving console messages as the page emits them.
pub type ConsoleSink = Arc<dyn Fn(ConsoleMessage) + Send + Sync>;

/// Console messages captured on one page, in emission order.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    messages: Arc<Mutex<Vec<ConsoleMessage>>>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink appending to this log; attach it before the first navigation.
    pub fn sink(&self) -> ConsoleSink {
        let messages = Arc::clone(&self.messages);
        Arc::new(move |message| {
            messages
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(message);
        })
    }

    pub fn snapshot(&self) -> Vec<ConsoleMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn with_level(&self, level: ConsoleLevel) -> Vec<ConsoleMessage> {
        self.snapshot()
            .into_iter()
            .filter(|m| m.level == level)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Engine-side analyses requested by built-in audits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    /// WCAG rule scan limited to the given tags.
    Accessibility { tags: Vec<String> },
    /// Category scores (0-100) keyed by category name.
    Performance,
}

/// A page exclusively owned by one target's executor.
#[async_trait]
pub trait PageScope: Send + Sync {
    /// Subscribe to console output of this page.
    fn on_console(&self, sink: ConsoleSink);

    /// Whether sinks registered with `on_console` ever receive messages.
    fn captures_console(&self) -> bool {
        true
    }

    async fn navigate(&self, url: &str, options: &NavigateOptions) -> anyhow::Result<NavResponse>;

    /// Serialized document of the current page.
    async fn content(&self) -> anyhow::Result<String>;

    /// Status code of a HEAD request made with the page's session.
    async fn head(&self, url: &str) -> anyhow::Result<u16>;

    /// Run an engine analysis. `None` means the engine has no such analysis.
    async fn analyze(&self, _analysis: &Analysis) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn screenshot(&self, path: &Path) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The authenticated context shared by every worker in a run.
#[async_trait]
pub trait Session: Send + Sync {
    async fn new_page(&self) -> anyhow::Result<Box<dyn PageScope>>;

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
