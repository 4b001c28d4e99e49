//! Per-target execution: one page scope, every resolved audit, in order.

use super::navigator::Navigator;
use crate::audits::{AuditContext, AuditDescriptor};
use crate::config::{Target, WebguardConfig};
use crate::plugins::{HookContext, HookDispatcher};
use crate::result::{AuditResult, PageResult};
use crate::session::{ConsoleLog, PageScope, Session};
use crate::util::{panic_message, sanitize};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything shared read-only by the workers of one run.
pub struct RunContext {
    pub config: WebguardConfig,
    pub run_dir: PathBuf,
    pub audits: Vec<AuditDescriptor>,
    pub hooks: HookDispatcher,
    pub navigator: Navigator,
}

impl RunContext {
    pub fn new(
        config: WebguardConfig,
        run_dir: PathBuf,
        audits: Vec<AuditDescriptor>,
        hooks: HookDispatcher,
    ) -> Self {
        let navigator = Navigator::new((&config.retry).into());
        Self {
            config,
            run_dir,
            audits,
            hooks,
            navigator,
        }
    }

    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = navigator;
        self
    }
}

/// Runs the audits of a single target against the shared session.
#[derive(Clone)]
pub struct AuditExecutor {
    ctx: Arc<RunContext>,
    session: Arc<dyn Session>,
}

impl AuditExecutor {
    pub fn new(ctx: Arc<RunContext>, session: Arc<dyn Session>) -> Self {
        Self { ctx, session }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Produce the `PageResult` for `target`. Never fails: every fault is
    /// folded into a verdict or logged.
    pub async fn run_target_audits(&self, target: &Target) -> PageResult {
        let started = Instant::now();
        let config = &self.ctx.config;
        let url = target.url(&config.base_url);
        let audits: Vec<&AuditDescriptor> = self
            .ctx
            .audits
            .iter()
            .filter(|d| !target.skip_audits.contains(&d.name))
            .collect();

        let page = match self.session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(page = %target.name, error = %e, "Failed to open page");
                let verdicts = audits
                    .iter()
                    .map(|d| AuditResult::fail(&d.name, &target.name, format!("Audit error: {}", e)))
                    .collect();
                return page_result(target, url, verdicts, None, started);
            }
        };

        self.ctx.hooks.run_hook(&HookContext::BeforePage {
            config,
            target,
            page: page.as_ref(),
        });

        let console = ConsoleLog::new();
        page.on_console(console.sink());

        let navigation = match self.ctx.navigator.navigate(page.as_ref(), &url).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(page = %target.name, error = %e, "Navigation failed");
                None
            }
        };

        let audit_ctx = AuditContext {
            session: self.session.as_ref(),
            page: page.as_ref(),
            target,
            config,
            run_dir: &self.ctx.run_dir,
            navigation: navigation.as_ref(),
            console: &console,
        };

        let mut verdicts = Vec::with_capacity(audits.len());
        for descriptor in audits {
            self.ctx.hooks.run_hook(&HookContext::BeforeAudit {
                audit: descriptor,
                target,
            });
            let verdict = run_one(descriptor, &audit_ctx).await;
            self.ctx.hooks.run_hook(&HookContext::AfterAudit {
                audit: descriptor,
                result: &verdict,
            });
            verdicts.push(verdict);
        }

        let screenshot = self.capture(page.as_ref(), target, &verdicts).await;

        if let Err(e) = page.close().await {
            warn!(page = %target.name, error = %e, "Failed to close page");
        }

        self.finish(target, url, verdicts, screenshot, started)
    }

    /// Build the result and close the `before_page` bracket.
    fn finish(
        &self,
        target: &Target,
        url: String,
        audits: Vec<AuditResult>,
        screenshot_path: Option<String>,
        started: Instant,
    ) -> PageResult {
        let result = page_result(target, url, audits, screenshot_path, started);
        self.ctx.hooks.run_hook(&HookContext::AfterPage {
            config: &self.ctx.config,
            target,
            result: &result,
        });
        result
    }

    /// Screenshot per the output settings. Returns the path relative to the
    /// run directory when one was written.
    async fn capture(
        &self,
        page: &dyn PageScope,
        target: &Target,
        verdicts: &[AuditResult],
    ) -> Option<String> {
        let output = &self.ctx.config.output;
        let all_passed = verdicts.iter().all(|v| v.passed);
        if !output.screenshots || (output.screenshot_on_fail_only && all_passed) {
            return None;
        }

        let relative = PathBuf::from(super::setup::SCREENSHOTS_DIR)
            .join(sanitize(&target.name))
            .join(format!("page-{}.png", if all_passed { "pass" } else { "fail" }));
        match page.screenshot(&self.ctx.run_dir.join(&relative)).await {
            Ok(()) => Some(relative.to_string_lossy().replace('\\', "/")),
            Err(e) => {
                debug!(page = %target.name, error = %e, "Screenshot skipped");
                None
            }
        }
    }
}

fn page_result(
    target: &Target,
    url: String,
    audits: Vec<AuditResult>,
    screenshot_path: Option<String>,
    started: Instant,
) -> PageResult {
    PageResult {
        page: target.name.clone(),
        path: target.path.clone(),
        url,
        audits,
        screenshot_path,
        duration: started.elapsed().as_millis() as u64,
    }
}

/// Run one audit, converting errors and panics into a fail verdict.
async fn run_one(descriptor: &AuditDescriptor, ctx: &AuditContext<'_>) -> AuditResult {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(descriptor.audit.run(ctx))
        .catch_unwind()
        .await;
    let elapsed = started.elapsed().as_millis() as u64;

    let verdict = match outcome {
        Ok(Ok(verdict)) => verdict.normalized(),
        Ok(Err(e)) => {
            warn!(audit = %descriptor.name, page = %ctx.target.name, error = %e, "Audit errored");
            AuditResult::fail(&descriptor.name, &ctx.target.name, format!("Audit error: {}", e))
        }
        Err(payload) => {
            let cause = panic_message(payload.as_ref());
            warn!(audit = %descriptor.name, page = %ctx.target.name, error = %cause, "Audit panicked");
            AuditResult::fail(&descriptor.name, &ctx.target.name, format!("Audit error: {}", cause))
        }
    };
    verdict.with_duration(elapsed)
}
