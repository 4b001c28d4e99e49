//! Target scheduling: sequential, or a fixed pool of workers pulling from a
//! shared claim counter.

use super::page::AuditExecutor;
use crate::config::Target;
use crate::result::PageResult;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Called once per finished target, in completion order.
pub type ProgressFn = Arc<dyn Fn(&PageResult) + Send + Sync>;

pub struct Scheduler {
    executor: AuditExecutor,
    concurrency: usize,
    fail_fast: bool,
    progress: Option<ProgressFn>,
}

impl Scheduler {
    pub fn new(executor: AuditExecutor) -> Self {
        let runner = &executor.context().config.runner;
        let (concurrency, fail_fast) = (runner.concurrency.max(1), runner.fail_fast);
        Self {
            executor,
            concurrency,
            fail_fast,
            progress: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run every target and return the results in target order.
    ///
    /// With fail-fast, targets after the first failing one may be absent.
    pub async fn run(&self, targets: &[Target]) -> Vec<PageResult> {
        if targets.is_empty() {
            return Vec::new();
        }
        if self.concurrency == 1 {
            self.run_sequential(targets).await
        } else {
            self.run_parallel(targets).await
        }
    }

    async fn run_sequential(&self, targets: &[Target]) -> Vec<PageResult> {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self.executor.run_target_audits(target).await;
            if let Some(progress) = &self.progress {
                progress(&result);
            }
            let failed = result.has_failure();
            results.push(result);
            if self.fail_fast && failed {
                info!(page = %target.name, "Fail-fast: stopping after first failing page");
                break;
            }
        }
        results
    }

    async fn run_parallel(&self, targets: &[Target]) -> Vec<PageResult> {
        let total = targets.len();
        let workers = self.concurrency.min(total);
        debug!(workers, targets = total, "Starting parallel run");

        let targets = Arc::new(targets.to_vec());
        let next = Arc::new(AtomicUsize::new(0));
        let abort = Arc::new(AtomicBool::new(false));
        let slots: Arc<Mutex<Vec<Option<PageResult>>>> = Arc::new(Mutex::new(vec![None; total]));

        let handles = (0..workers).map(|worker| {
            let executor = self.executor.clone();
            let targets = Arc::clone(&targets);
            let next = Arc::clone(&next);
            let abort = Arc::clone(&abort);
            let slots = Arc::clone(&slots);
            let progress = self.progress.clone();
            let fail_fast = self.fail_fast;

            tokio::spawn(async move {
                while let Some(index) = claim(&next, &abort, targets.len()) {
                    let target = &targets[index];

                    let result = executor.run_target_audits(target).await;
                    if let Some(progress) = &progress {
                        progress(&result);
                    }
                    if fail_fast && result.has_failure() && !abort.swap(true, Ordering::SeqCst) {
                        info!(page = %target.name, worker, "Fail-fast: no further pages will be claimed");
                    }
                    slots.lock().await[index] = Some(result);
                }
            })
        });

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!(error = %e, "Worker task failed");
            }
        }

        let mut slots = slots.lock().await;
        std::mem::take(&mut *slots).into_iter().flatten().collect()
    }
}

/// Take the next unclaimed index. Returns `None` once the targets are
/// exhausted or the abort flag is set, including when it was set while the
/// index was being taken.
fn claim(next: &AtomicUsize, abort: &AtomicBool, total: usize) -> Option<usize> {
    if abort.load(Ordering::SeqCst) {
        return None;
    }
    let index = next.fetch_add(1, Ordering::SeqCst);
    if index >= total || abort.load(Ordering::SeqCst) {
        return None;
    }
    Some(index)
}
