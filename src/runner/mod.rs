//! Run orchestration.
//!
//! A run goes through these steps, in order:
//!
//! 1. prepare `<output.dir>/run-<timestamp>`
//! 2. authenticate and open the shared session
//! 3. `before_all`, resolve audits, filter pages
//! 4. schedule every target (sequential or worker pool)
//! 5. aggregate, close the session, `after_all`
//! 6. reporters, notifications, baseline diff and update

pub mod navigator;
pub mod page;
pub mod scheduler;
pub mod setup;

use crate::aggregate;
use crate::audits::{custom, registry};
use crate::auth::{AuthOutcome, AuthProvider, HttpAuthProvider};
use crate::baseline::{self, BaselineComparison};
use crate::config::{BrowserConfig, Target, WebguardConfig};
use crate::errors::RunError;
use crate::notify;
use crate::plugins::{HookContext, HookDispatcher};
use crate::report;
use crate::result::{PageResult, RunResult};
use crate::session::{HttpSession, Session};
use crate::ui::RunUI;
use crate::ui::icons::{DIFF, FOLDER, INFO, KEY};
use chrono::Utc;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub use navigator::{Navigator, RetryPolicy};
pub use page::{AuditExecutor, RunContext};
pub use scheduler::Scheduler;

/// Command-line overrides for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub headed: bool,
    /// Page names to keep; `None` runs every page.
    pub pages_filter: Option<Vec<String>>,
    /// Audit names to keep; `None` runs every enabled audit.
    pub audits_filter: Option<Vec<String>>,
    /// Compare against the stored baseline even when baselines are disabled.
    pub diff: bool,
    pub verbose: bool,
    /// Suppress the banner and inline progress.
    pub quiet: bool,
}

/// What a finished run leaves behind.
#[derive(Debug)]
pub struct RunOutcome {
    pub result: RunResult,
    pub run_dir: PathBuf,
    pub comparison: Option<BaselineComparison>,
}

/// Run with the HTTP session and auth provider.
pub async fn run(
    config: WebguardConfig,
    options: RunOptions,
    hooks: HookDispatcher,
) -> Result<RunOutcome, RunError> {
    let auth = HttpAuthProvider::default();
    run_with(config, options, hooks, &auth, |browser, outcome| {
        Ok(Arc::new(HttpSession::new(browser, outcome)?) as Arc<dyn Session>)
    })
    .await
}

/// Run with an explicit auth provider and session factory.
pub async fn run_with<F>(
    mut config: WebguardConfig,
    options: RunOptions,
    hooks: HookDispatcher,
    auth: &dyn AuthProvider,
    open_session: F,
) -> Result<RunOutcome, RunError>
where
    F: FnOnce(&BrowserConfig, Option<&AuthOutcome>) -> anyhow::Result<Arc<dyn Session>>,
{
    let started_at = Utc::now();
    let clock = Instant::now();
    if options.headed {
        config.browser.headless = false;
    }

    let run_dir = setup::prepare_run_dir(config.output_dir(), started_at)?;
    info!(run_dir = %run_dir.display(), "Prepared run directory");

    if !options.quiet && !matches!(config.auth, crate::config::AuthConfig::None) {
        println!("  {}Authenticating ({})", KEY, config.auth.method());
    }
    let auth_outcome = auth.authenticate(&config.auth, config.output_dir()).await?;

    let session = open_session(&config.browser, auth_outcome.as_ref()).map_err(RunError::Session)?;

    hooks.run_hook(&HookContext::BeforeAll {
        config: &config,
        session: session.as_ref(),
    });

    let custom_audits = custom::descriptors(&config.custom_audits)?;
    let audits = registry::resolve(
        &config.audits,
        hooks.plugin_audits(),
        custom_audits,
        options.audits_filter.as_deref(),
    );
    if let Some(requested) = &options.audits_filter {
        for name in registry::unmatched_names(requested, &audits) {
            warn!(audit = name, "Requested audit is unknown or disabled");
        }
    }

    let targets = select_targets(&config.pages, options.pages_filter.as_deref());

    if !options.quiet {
        print_plan(&config, &targets, &audits, hooks.plugin_count());
    }

    let ui = Arc::new(if options.quiet {
        RunUI::hidden()
    } else {
        RunUI::new(targets.len() as u64, options.verbose)
    });

    let ctx = Arc::new(RunContext::new(config.clone(), run_dir.clone(), audits, hooks.clone()));
    let executor = AuditExecutor::new(Arc::clone(&ctx), Arc::clone(&session));
    let progress_ui = Arc::clone(&ui);
    let pages = Scheduler::new(executor)
        .with_progress(Arc::new(move |result: &PageResult| progress_ui.target_complete(result)))
        .run(&targets)
        .await;
    ui.finish();

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close session");
    }

    let result = aggregate::build_run_result(
        &config,
        &ctx.audits,
        pages,
        started_at,
        clock.elapsed().as_millis() as u64,
    );

    hooks.run_hook(&HookContext::AfterAll {
        config: &config,
        result: &result,
    });

    report::run_reporters(&result, &config, &run_dir, &hooks.plugin_reporters()).await;

    if !config.notifications.is_empty() {
        let notifiers = notify::from_config(&config.notifications, &reqwest::Client::new());
        notify::send_all(&notifiers, &result, &config).await;
    }

    let comparison = compare_and_update_baseline(&config, &options, &result);

    if !options.quiet {
        println!(
            "\n  {}{}",
            FOLDER,
            style(format!("Results: {}", run_dir.display())).dim()
        );
    }

    Ok(RunOutcome {
        result,
        run_dir,
        comparison,
    })
}

/// Keep the targets named in `filter`, in config order.
pub fn select_targets(pages: &[Target], filter: Option<&[String]>) -> Vec<Target> {
    let Some(names) = filter else {
        return pages.to_vec();
    };
    for name in names {
        if !pages.iter().any(|p| &p.name == name) {
            warn!(page = %name, "Requested page is not in the config");
        }
    }
    pages
        .iter()
        .filter(|p| names.iter().any(|n| n == &p.name))
        .cloned()
        .collect()
}

fn print_plan(
    config: &WebguardConfig,
    targets: &[Target],
    audits: &[crate::audits::AuditDescriptor],
    plugins: usize,
) {
    let names: Vec<&str> = audits.iter().map(|a| a.name.as_str()).collect();
    println!();
    println!("  {}Base URL: {}", INFO, config.base_url);
    println!("  {}Pages:    {}", INFO, targets.len());
    println!("  {}Audits:   {}", INFO, names.join(", "));
    if plugins > 0 {
        println!("  {}Plugins:  {}", INFO, plugins);
    }
    if config.runner.concurrency > 1 {
        println!("  {}Workers:  {}", INFO, config.runner.concurrency);
    }
}

fn compare_and_update_baseline(
    config: &WebguardConfig,
    options: &RunOptions,
    result: &RunResult,
) -> Option<BaselineComparison> {
    let output_dir = config.output_dir();
    let mut comparison = None;

    if config.baseline.enabled || options.diff {
        match baseline::load(output_dir) {
            Ok(Some(previous)) => {
                let cmp = baseline::compare(&previous, result);
                if !options.quiet {
                    println!("\n{}", baseline::diff::render(&cmp));
                }
                comparison = Some(cmp);
            }
            Ok(None) => {
                if !options.quiet {
                    println!("  {}{}", DIFF, style("No baseline found to compare against").dim());
                }
            }
            Err(e) => warn!(error = %e, "Failed to load baseline"),
        }
    }

    let should_save = config.baseline.enabled
        && config.baseline.update_on_pass
        && (result.summary.failed == 0 || !baseline::exists(output_dir));
    if should_save {
        match baseline::save(result, output_dir) {
            Ok(path) => {
                if !options.quiet {
                    println!("  {}{}", DIFF, style(format!("Baseline updated: {}", path.display())).dim());
                }
            }
            Err(e) => warn!(error = %e, "Failed to update baseline"),
        }
    }

    comparison
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audits::builtin;
    use crate::config::{AuthConfig, ReportFormat};
    use crate::errors::AuthError;
    use crate::plugins::{HookPoint, Plugin};
    use crate::result::Severity;
    use crate::session::stub::StubSession;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    const BASE: &str = "https://stub.test";

    struct NoAuth;

    #[async_trait]
    impl AuthProvider for NoAuth {
        async fn authenticate(&self, _: &AuthConfig, _: &Path) -> Result<Option<AuthOutcome>, AuthError> {
            Ok(None)
        }
    }

    struct Rejecting;

    #[async_trait]
    impl AuthProvider for Rejecting {
        async fn authenticate(&self, _: &AuthConfig, _: &Path) -> Result<Option<AuthOutcome>, AuthError> {
            Err(AuthError::LoginFailed {
                status: 401,
                body: "bad credentials".to_string(),
            })
        }
    }

    fn config(output: &Path) -> WebguardConfig {
        let mut config = WebguardConfig::new(
            BASE,
            vec![
                Target::new("Home", "/"),
                Target::new("About", "/about"),
                Target::new("Admin", "/admin"),
            ],
        );
        config.output.dir = output.to_path_buf();
        config.output.formats = vec![ReportFormat::Json];
        config.output.screenshots = false;
        config.retry.max_retries = 1;
        for (name, _) in builtin::DEFAULTS {
            config.audits.insert(name.to_string(), name == builtin::HTTP_STATUS);
        }
        config
    }

    fn quiet() -> RunOptions {
        RunOptions {
            quiet: true,
            ..RunOptions::default()
        }
    }

    async fn run_stub(
        config: WebguardConfig,
        options: RunOptions,
        hooks: HookDispatcher,
        session: &StubSession,
    ) -> Result<RunOutcome, RunError> {
        let session = session.clone();
        run_with(config, options, hooks, &NoAuth, move |_, _| {
            Ok(Arc::new(session) as Arc<dyn Session>)
        })
        .await
    }

    #[tokio::test]
    async fn test_full_run_writes_results() {
        let dir = tempfile::tempdir().unwrap();
        let session = StubSession::new().status(&format!("{}/admin", BASE), 500);

        let outcome = run_stub(config(dir.path()), quiet(), HookDispatcher::default(), &session)
            .await
            .unwrap();

        let result = &outcome.result;
        assert_eq!(result.pages.len(), 3);
        assert_eq!(result.summary.total_audits, 3);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.exit_code(), 1);
        assert_eq!(result.config.audits_enabled, vec![builtin::HTTP_STATUS]);
        assert!(outcome.run_dir.join(report::json::RESULTS_FILE).exists());
        let stored = report::json::read(&outcome.run_dir.join(report::json::RESULTS_FILE)).unwrap();
        assert_eq!(&stored, result);
    }

    #[tokio::test]
    async fn test_page_and_audit_filters() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.audits.insert(builtin::CONSOLE_ERRORS.to_string(), true);
        let options = RunOptions {
            pages_filter: Some(vec!["About".to_string(), "Missing".to_string()]),
            audits_filter: Some(vec![builtin::CONSOLE_ERRORS.to_string(), "bogus".to_string()]),
            ..quiet()
        };

        let outcome = run_stub(cfg, options, HookDispatcher::default(), &StubSession::new())
            .await
            .unwrap();

        let result = outcome.result;
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.pages[0].page, "About");
        assert_eq!(result.pages[0].audits.len(), 1);
        assert_eq!(result.pages[0].audits[0].audit, builtin::CONSOLE_ERRORS);
        assert_eq!(result.config.total_pages, 1);
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let session = StubSession::new();
        let opened = session.clone();

        let err = run_with(config(dir.path()), quiet(), HookDispatcher::default(), &Rejecting, move |_, _| {
            Ok(Arc::new(opened) as Arc<dyn Session>)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RunError::Auth(AuthError::LoginFailed { status: 401, .. })));
        assert_eq!(session.navigations(), 0);
    }

    #[tokio::test]
    async fn test_session_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_with(config(dir.path()), quiet(), HookDispatcher::default(), &NoAuth, |_, _| {
            anyhow::bail!("browser missing")
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Session(_)));
        assert!(err.to_string().contains("browser missing"));
    }

    #[tokio::test]
    async fn test_headed_option_reaches_session_factory() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let session = StubSession::new();
        let options = RunOptions {
            headed: true,
            ..quiet()
        };

        run_with(config(dir.path()), options, HookDispatcher::default(), &NoAuth, move |browser, _| {
            *sink.lock().unwrap() = Some(browser.headless);
            Ok(Arc::new(session) as Arc<dyn Session>)
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_invalid_custom_pattern_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.custom_audits.push(crate::config::CustomAuditConfig {
            name: "broken".to_string(),
            description: String::new(),
            pattern: "([".to_string(),
            expect: crate::config::Expectation::Present,
            severity: Severity::Fail,
        });
        let err = run_stub(cfg, quiet(), HookDispatcher::default(), &StubSession::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Other(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_fire_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plugin = Plugin::new("recorder");
        for point in [HookPoint::BeforeAll, HookPoint::AfterAll, HookPoint::AfterPage] {
            let sink = Arc::clone(&log);
            plugin = plugin.on(point, move |ctx| {
                let label = match ctx {
                    HookContext::AfterAll { result, .. } => format!("after_all:{}", result.summary.total_audits),
                    _ => ctx.point().to_string(),
                };
                sink.lock().unwrap().push(label);
                Ok(())
            });
        }

        run_stub(config(dir.path()), quiet(), HookDispatcher::new(vec![plugin]), &StubSession::new())
            .await
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.first().map(String::as_str), Some("before_all"));
        assert_eq!(log.last().map(String::as_str), Some("after_all:3"));
        assert_eq!(log.iter().filter(|l| *l == "after_page").count(), 3);
    }

    #[tokio::test]
    async fn test_baseline_is_created_then_compared() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.baseline.enabled = true;

        let first = run_stub(cfg.clone(), quiet(), HookDispatcher::default(), &StubSession::new())
            .await
            .unwrap();
        assert!(first.comparison.is_none());
        assert!(baseline::exists(dir.path()));

        let broken = StubSession::new().status(&format!("{}/about", BASE), 404);
        let second = run_stub(cfg, quiet(), HookDispatcher::default(), &broken)
            .await
            .unwrap();

        let cmp = second.comparison.unwrap();
        assert_eq!(cmp.summary.regressions, 1);
        assert_eq!(cmp.summary.unchanged, 2);
        let stored = baseline::load(dir.path()).unwrap().unwrap();
        assert_eq!(stored.summary.failed, 0);
    }

    #[tokio::test]
    async fn test_previous_runs_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let first = run_stub(config(dir.path()), quiet(), HookDispatcher::default(), &StubSession::new())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = run_stub(config(dir.path()), quiet(), HookDispatcher::default(), &StubSession::new())
            .await
            .unwrap();

        assert!(!first.run_dir.exists());
        assert_eq!(setup::latest_run_dir(dir.path()), Some(second.run_dir));
    }

    #[test]
    fn test_select_targets_keeps_config_order() {
        let pages = vec![Target::new("A", "/a"), Target::new("B", "/b"), Target::new("C", "/c")];
        let filter = vec!["C".to_string(), "A".to_string()];
        let selected = select_targets(&pages, Some(filter.as_slice()));
        let names: Vec<&str> = selected.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(select_targets(&pages, None).len(), 3);
    }
}
