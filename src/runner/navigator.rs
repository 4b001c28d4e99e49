//! Navigation with bounded retries.

use crate::config::RetryConfig;
use crate::errors::NavigationError;
use crate::session::{NavResponse, NavigateOptions, PageScope};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Suspends between attempts. Injectable so tests can observe the calls.
pub type Pause = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

fn tokio_pause() -> Pause {
    Arc::new(|delay| Box::pin(tokio::time::sleep(delay)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            delay,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.delay_ms))
    }
}

#[derive(Clone)]
pub struct Navigator {
    policy: RetryPolicy,
    options: NavigateOptions,
    pause: Pause,
}

impl Navigator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            options: NavigateOptions::default(),
            pause: tokio_pause(),
        }
    }

    /// Per-attempt timeout; an attempt exceeding it counts as an error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn with_pause(mut self, pause: Pause) -> Self {
        self.pause = pause;
        self
    }

    /// Navigate `page` to `url`.
    ///
    /// A 2xx response returns immediately. A non-2xx response is retried
    /// after the delay, and returned as-is on the last attempt. An error is
    /// retried the same way; on the last attempt it becomes a
    /// [`NavigationError`] wrapping the cause.
    pub async fn navigate(
        &self,
        page: &dyn PageScope,
        url: &str,
    ) -> Result<NavResponse, NavigationError> {
        let attempts = self.policy.max_retries.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.options.timeout, page.navigate(url, &self.options)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow::anyhow!(
                    "Navigation timed out after {}ms",
                    self.options.timeout.as_millis()
                )),
            };

            let last = attempt >= attempts;
            match outcome {
                Ok(response) if response.ok() => {
                    debug!(url, attempt, status = response.status, "Navigated");
                    return Ok(response);
                }
                Ok(response) if last => return Ok(response),
                Ok(response) => {
                    warn!(
                        url,
                        attempt,
                        attempts,
                        status = response.status,
                        "Navigation returned non-OK status, retrying in {}ms",
                        self.policy.delay.as_millis()
                    );
                }
                Err(source) if last => {
                    return Err(NavigationError {
                        url: url.to_string(),
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        url,
                        attempt,
                        attempts,
                        error = %e,
                        "Navigation failed, retrying in {}ms",
                        self.policy.delay.as_millis()
                    );
                }
            }

            (self.pause)(self.policy.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::session::stub::StubSession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "https://stub.test/";

    fn counting_pause() -> (Pause, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pause: Pause = Arc::new(move |_delay| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        });
        (pause, calls)
    }

    fn navigator(max_retries: u32) -> (Navigator, Arc<AtomicUsize>) {
        let (pause, calls) = counting_pause();
        let nav = Navigator::new(RetryPolicy::new(max_retries, Duration::from_millis(5000))).with_pause(pause);
        (nav, calls)
    }

    #[tokio::test]
    async fn test_ok_response_returns_without_pausing() {
        let session = StubSession::new();
        let page = session.new_page().await.unwrap();
        let (nav, pauses) = navigator(3);

        let response = nav.navigate(page.as_ref(), URL).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(session.attempts(URL), 1);
        assert_eq!(pauses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_exhaust_attempts_with_pauses_between() {
        let session = StubSession::new().always_fail(URL);
        let page = session.new_page().await.unwrap();
        let (nav, pauses) = navigator(3);

        let err = nav.navigate(page.as_ref(), URL).await.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.url, URL);
        assert!(err.source.to_string().contains("ERR_CONNECTION_REFUSED"));
        assert_eq!(session.attempts(URL), 3);
        assert_eq!(pauses.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_errors() {
        let session = StubSession::new().fail_times(URL, 2, "net::ERR_TIMED_OUT");
        let page = session.new_page().await.unwrap();
        let (nav, pauses) = navigator(3);

        let response = nav.navigate(page.as_ref(), URL).await.unwrap();
        assert!(response.ok());
        assert_eq!(session.attempts(URL), 3);
        assert_eq!(pauses.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_ok_response_is_returned_on_last_attempt() {
        let session = StubSession::new().status(URL, 503);
        let page = session.new_page().await.unwrap();
        let (nav, pauses) = navigator(3);

        let response = nav.navigate(page.as_ref(), URL).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(session.attempts(URL), 3);
        assert_eq!(pauses.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_attempt_never_pauses() {
        let session = StubSession::new().always_fail(URL);
        let page = session.new_page().await.unwrap();
        let (nav, pauses) = navigator(1);

        assert!(nav.navigate(page.as_ref(), URL).await.is_err());
        assert_eq!(pauses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_error() {
        let session = StubSession::new().delay(URL, Duration::from_millis(500));
        let page = session.new_page().await.unwrap();
        let (nav, _) = navigator(1);
        let nav = nav.with_timeout(Duration::from_millis(20));

        let err = nav.navigate(page.as_ref(), URL).await.unwrap_err();
        assert!(err.source.to_string().contains("timed out"));
    }

    #[test]
    fn test_policy_from_config_clamps_attempts() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_retries: 0,
            delay_ms: 250,
        });
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }
}
