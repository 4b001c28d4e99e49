//! A `Session` backed by plain HTTP requests.
//!
//! It covers status, content and link checks. Console capture, screenshots
//! and engine analyses need a rendering engine; here they are absent, so the
//! audits depending on them report `skip` and screenshots are not produced.

use super::{NavResponse, NavigateOptions, PageScope, Session};
use crate::auth::{AuthOutcome, StorageState};
use crate::config::BrowserConfig;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!("webguard/", env!("CARGO_PKG_VERSION"));

pub struct HttpSession {
    client: reqwest::Client,
    cookies: Arc<StorageState>,
}

impl HttpSession {
    pub fn new(browser: &BrowserConfig, auth: Option<&AuthOutcome>) -> Result<Self> {
        if !browser.headless {
            warn!("Headed mode needs a rendering engine; the HTTP session always runs headless");
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let mut state = StorageState::default();
        if let Some(outcome) = auth {
            for (name, value) in &outcome.extra_headers {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .with_context(|| format!("Invalid header name '{}'", name))?;
                let value = HeaderValue::from_str(value)
                    .with_context(|| format!("Invalid value for header '{}'", name))?;
                headers.insert(name, value);
            }
            if outcome.storage_state_path.exists() {
                state = StorageState::load(&outcome.storage_state_path).with_context(|| {
                    format!(
                        "Failed to load session state from {}",
                        outcome.storage_state_path.display()
                    )
                })?;
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(browser.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        debug!(cookies = state.cookies.len(), "HTTP session ready");
        Ok(Self {
            client,
            cookies: Arc::new(state),
        })
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn new_page(&self) -> Result<Box<dyn PageScope>> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            cookies: Arc::clone(&self.cookies),
            document: Mutex::new(String::new()),
        }))
    }
}

/// One page: remembers the last navigated document.
pub struct HttpPage {
    client: reqwest::Client,
    cookies: Arc<StorageState>,
    document: Mutex<String>,
}

impl HttpPage {
    fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder> {
        let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid URL '{}'", url))?;
        let mut request = self.client.request(method, parsed.clone());
        if let Some(header) = cookie_header(&self.cookies, &parsed) {
            request = request.header(COOKIE, header);
        }
        Ok(request)
    }
}

/// `Cookie` header value for the cookies that apply to `url`.
fn cookie_header(state: &StorageState, url: &reqwest::Url) -> Option<String> {
    let pairs: Vec<String> = state
        .cookies
        .iter()
        .filter(|c| c.matches(url))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[async_trait]
impl PageScope for HttpPage {
    fn on_console(&self, _sink: super::ConsoleSink) {}

    fn captures_console(&self) -> bool {
        false
    }

    async fn navigate(&self, url: &str, options: &NavigateOptions) -> Result<NavResponse> {
        let response = self
            .request(reqwest::Method::GET, url)?
            .timeout(options.timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = body;
        Ok(NavResponse {
            status,
            url: final_url,
        })
    }

    async fn content(&self) -> Result<String> {
        Ok(self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    async fn head(&self, url: &str) -> Result<u16> {
        let response = self.request(reqwest::Method::HEAD, url)?.send().await?;
        Ok(response.status().as_u16())
    }

    async fn screenshot(&self, _path: &Path) -> Result<()> {
        bail!("screenshots require a rendering engine")
    }
}
