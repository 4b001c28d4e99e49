//! Scripted in-memory session used by the engine tests.

use super::{
    Analysis, ConsoleLevel, ConsoleMessage, ConsoleSink, NavResponse, NavigateOptions, PageScope,
    Session,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Script {
    statuses: HashMap<String, u16>,
    failures: HashMap<String, VecDeque<String>>,
    always_fail: HashSet<String>,
    delays: HashMap<String, Duration>,
    content: HashMap<String, String>,
    console: HashMap<String, Vec<ConsoleMessage>>,
    head_statuses: HashMap<String, u16>,
    analyses: HashMap<&'static str, serde_json::Value>,
    screenshots_fail: bool,
    new_page_error: Option<String>,
}

#[derive(Default)]
struct Counters {
    navigations: AtomicUsize,
    pages_created: AtomicUsize,
    pages_closed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    attempts: Mutex<HashMap<String, usize>>,
    started: Mutex<Vec<String>>,
}

#[derive(Default, Clone)]
pub struct StubSession {
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
}

impl StubSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.script.lock().unwrap());
        self
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.edit(|s| {
            s.statuses.insert(url.to_string(), status);
        })
    }

    /// The next `times` navigations to `url` raise `message`.
    pub fn fail_times(self, url: &str, times: usize, message: &str) -> Self {
        self.edit(|s| {
            let queue = s.failures.entry(url.to_string()).or_default();
            queue.extend(std::iter::repeat_n(message.to_string(), times));
        })
    }

    pub fn always_fail(self, url: &str) -> Self {
        self.edit(|s| {
            s.always_fail.insert(url.to_string());
        })
    }

    pub fn delay(self, url: &str, delay: Duration) -> Self {
        self.edit(|s| {
            s.delays.insert(url.to_string(), delay);
        })
    }

    pub fn content(self, url: &str, html: &str) -> Self {
        self.edit(|s| {
            s.content.insert(url.to_string(), html.to_string());
        })
    }

    pub fn console(self, url: &str, level: ConsoleLevel, text: &str) -> Self {
        self.edit(|s| {
            s.console
                .entry(url.to_string())
                .or_default()
                .push(ConsoleMessage::new(level, text));
        })
    }

    pub fn head_status(self, url: &str, status: u16) -> Self {
        self.edit(|s| {
            s.head_statuses.insert(url.to_string(), status);
        })
    }

    pub fn analysis(self, kind: &'static str, value: serde_json::Value) -> Self {
        self.edit(|s| {
            s.analyses.insert(kind, value);
        })
    }

    pub fn screenshots_fail(self) -> Self {
        self.edit(|s| s.screenshots_fail = true)
    }

    /// Every `new_page` call raises `message`.
    pub fn fail_new_page(self, message: &str) -> Self {
        self.edit(|s| s.new_page_error = Some(message.to_string()))
    }

    pub fn navigations(&self) -> usize {
        self.counters.navigations.load(Ordering::SeqCst)
    }

    pub fn attempts(&self, url: &str) -> usize {
        self.counters
            .attempts
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn pages_created(&self) -> usize {
        self.counters.pages_created.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.counters.pages_closed.load(Ordering::SeqCst)
    }

    /// Highest number of navigations observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// URLs in the order their first navigation started.
    pub fn started(&self) -> Vec<String> {
        self.counters.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for StubSession {
    async fn new_page(&self) -> Result<Box<dyn PageScope>> {
        let error = self.script.lock().unwrap().new_page_error.clone();
        if let Some(message) = error {
            bail!(message);
        }
        self.counters.pages_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubPage {
            session: self.clone(),
            current: Mutex::new(None),
            sinks: Mutex::new(Vec::new()),
        }))
    }
}

pub struct StubPage {
    session: StubSession,
    current: Mutex<Option<String>>,
    sinks: Mutex<Vec<ConsoleSink>>,
}

struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageScope for StubPage {
    fn on_console(&self, sink: ConsoleSink) {
        self.sinks.lock().unwrap().push(sink);
    }

    async fn navigate(&self, url: &str, _options: &NavigateOptions) -> Result<NavResponse> {
        let counters = &self.session.counters;
        counters.navigations.fetch_add(1, Ordering::SeqCst);
        {
            let mut attempts = counters.attempts.lock().unwrap();
            let count = attempts.entry(url.to_string()).or_insert(0);
            if *count == 0 {
                counters.started.lock().unwrap().push(url.to_string());
            }
            *count += 1;
        }
        let _guard = InFlight::enter(counters);

        let delay = self.session.script.lock().unwrap().delays.get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (failure, status, console) = {
            let mut script = self.session.script.lock().unwrap();
            let failure = if script.always_fail.contains(url) {
                Some("net::ERR_CONNECTION_REFUSED".to_string())
            } else {
                script.failures.get_mut(url).and_then(VecDeque::pop_front)
            };
            let status = script.statuses.get(url).copied().unwrap_or(200);
            let console = script.console.get(url).cloned().unwrap_or_default();
            (failure, status, console)
        };

        if let Some(message) = failure {
            bail!(message);
        }

        *self.current.lock().unwrap() = Some(url.to_string());
        let sinks = self.sinks.lock().unwrap().clone();
        for message in console {
            for sink in &sinks {
                sink(message.clone());
            }
        }
        Ok(NavResponse::new(status, url))
    }

    async fn content(&self) -> Result<String> {
        let current = self.current.lock().unwrap().clone();
        let script = self.session.script.lock().unwrap();
        Ok(current
            .and_then(|url| script.content.get(&url).cloned())
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn head(&self, url: &str) -> Result<u16> {
        let script = self.session.script.lock().unwrap();
        Ok(script.head_statuses.get(url).copied().unwrap_or(200))
    }

    async fn analyze(&self, analysis: &Analysis) -> Result<Option<serde_json::Value>> {
        let key = match analysis {
            Analysis::Accessibility { .. } => "accessibility",
            Analysis::Performance => "performance",
        };
        Ok(self.session.script.lock().unwrap().analyses.get(key).cloned())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if self.session.script.lock().unwrap().screenshots_fail {
            bail!("screenshot failed");
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"png")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.session
            .counters
            .pages_closed
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
