//! Plugins: extra audits, extra reporters and lifecycle hooks.
//!
//! Plugins are registered in order on a [`HookDispatcher`]. Each plugin owns
//! a hook table mapping a [`HookPoint`] to a closure; the closure receives
//! the matching [`HookContext`] variant by shared reference, so recorded
//! results can be observed but never changed.
//!
//! A hook that returns an error or panics is logged and skipped. It never
//! affects the run, the other hooks or the exit code.

use crate::audits::{Audit, AuditDescriptor, AuditOrigin};
use crate::config::{Target, WebguardConfig};
use crate::report::Reporter;
use crate::result::{AuditResult, PageResult, RunResult};
use crate::session::{PageScope, Session};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle points a plugin can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    BeforeAll,
    AfterAll,
    BeforePage,
    AfterPage,
    BeforeAudit,
    AfterAudit,
}

impl HookPoint {
    pub fn all() -> &'static [HookPoint] {
        &[
            HookPoint::BeforeAll,
            HookPoint::AfterAll,
            HookPoint::BeforePage,
            HookPoint::AfterPage,
            HookPoint::BeforeAudit,
            HookPoint::AfterAudit,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeAll => "before_all",
            HookPoint::AfterAll => "after_all",
            HookPoint::BeforePage => "before_page",
            HookPoint::AfterPage => "after_page",
            HookPoint::BeforeAudit => "before_audit",
            HookPoint::AfterAudit => "after_audit",
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HookPoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "before_all" | "beforeall" => Ok(HookPoint::BeforeAll),
            "after_all" | "afterall" => Ok(HookPoint::AfterAll),
            "before_page" | "beforepage" => Ok(HookPoint::BeforePage),
            "after_page" | "afterpage" => Ok(HookPoint::AfterPage),
            "before_audit" | "beforeaudit" => Ok(HookPoint::BeforeAudit),
            "after_audit" | "afteraudit" => Ok(HookPoint::AfterAudit),
            _ => anyhow::bail!("Unknown hook point: {}", s),
        }
    }
}

/// Data handed to a hook, one variant per [`HookPoint`].
pub enum HookContext<'a> {
    BeforeAll {
        config: &'a WebguardConfig,
        session: &'a dyn Session,
    },
    AfterAll {
        config: &'a WebguardConfig,
        result: &'a RunResult,
    },
    BeforePage {
        config: &'a WebguardConfig,
        target: &'a Target,
        page: &'a dyn PageScope,
    },
    AfterPage {
        config: &'a WebguardConfig,
        target: &'a Target,
        result: &'a PageResult,
    },
    BeforeAudit {
        audit: &'a AuditDescriptor,
        target: &'a Target,
    },
    AfterAudit {
        audit: &'a AuditDescriptor,
        result: &'a AuditResult,
    },
}

impl HookContext<'_> {
    pub fn point(&self) -> HookPoint {
        match self {
            HookContext::BeforeAll { .. } => HookPoint::BeforeAll,
            HookContext::AfterAll { .. } => HookPoint::AfterAll,
            HookContext::BeforePage { .. } => HookPoint::BeforePage,
            HookContext::AfterPage { .. } => HookPoint::AfterPage,
            HookContext::BeforeAudit { .. } => HookPoint::BeforeAudit,
            HookContext::AfterAudit { .. } => HookPoint::AfterAudit,
        }
    }
}

pub type HookFn = Arc<dyn Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// A named bundle of audits, reporters and hooks.
#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    audits: Vec<Arc<dyn Audit>>,
    reporters: Vec<Arc<dyn Reporter>>,
    hooks: HashMap<HookPoint, HookFn>,
}

impl Plugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            audits: Vec::new(),
            reporters: Vec::new(),
            hooks: HashMap::new(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn Audit>) -> Self {
        self.audits.push(audit);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    /// Install the hook for `point`, replacing any previous one.
    pub fn on<F>(mut self, point: HookPoint, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.insert(point, Arc::new(hook));
        self
    }
}

/// Ordered plugin registry and hook dispatcher.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    plugins: Vec<Plugin>,
}

impl HookDispatcher {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self { plugins }
    }

    pub fn register(&mut self, plugin: Plugin) {
        debug!(plugin = %plugin.name, "Registered plugin");
        self.plugins.push(plugin);
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Audits contributed by plugins, in registration order.
    pub fn plugin_audits(&self) -> Vec<AuditDescriptor> {
        self.plugins
            .iter()
            .flat_map(|plugin| {
                plugin.audits.iter().map(move |audit| {
                    AuditDescriptor::new(AuditOrigin::Plugin(plugin.name.clone()), Arc::clone(audit))
                })
            })
            .collect()
    }

    /// Reporters contributed by plugins, in registration order.
    pub fn plugin_reporters(&self) -> Vec<Arc<dyn Reporter>> {
        self.plugins
            .iter()
            .flat_map(|plugin| plugin.reporters.iter().cloned())
            .collect()
    }

    /// Invoke every registered hook for the context's point, in plugin order.
    pub fn run_hook(&self, context: &HookContext<'_>) {
        let point = context.point();
        for plugin in &self.plugins {
            let Some(hook) = plugin.hooks.get(&point) else {
                continue;
            };
            match std::panic::catch_unwind(AssertUnwindSafe(|| hook(context))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(plugin = %plugin.name, hook = %point, error = %e, "Plugin hook failed");
                }
                Err(payload) => {
                    warn!(
                        plugin = %plugin.name,
                        hook = %point,
                        error = %crate::util::panic_message(payload.as_ref()),
                        "Plugin hook panicked"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        label: &str,
    ) -> impl Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        let label = label.to_string();
        move |ctx: &HookContext<'_>| {
            log.lock().unwrap().push(format!("{}:{}", label, ctx.point()));
            Ok(())
        }
    }

    fn verdict() -> AuditResult {
        AuditResult::fail("httpStatus", "Home", "Expected HTTP 200, got 500")
    }

    fn descriptor() -> AuditDescriptor {
        crate::audits::builtin::descriptors().remove(0)
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = HookDispatcher::default();
        dispatcher.register(Plugin::new("first").on(HookPoint::AfterAudit, recorder(&log, "first")));
        dispatcher.register(Plugin::new("second").on(HookPoint::AfterAudit, recorder(&log, "second")));
        dispatcher.register(Plugin::new("other").on(HookPoint::BeforeAudit, recorder(&log, "other")));

        let audit = descriptor();
        let result = verdict();
        dispatcher.run_hook(&HookContext::AfterAudit {
            audit: &audit,
            result: &result,
        });

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:after_audit".to_string(), "second:after_audit".to_string()]
        );
    }

    #[test]
    fn test_failing_and_panicking_hooks_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = HookDispatcher::new(vec![
            Plugin::new("erroring").on(HookPoint::AfterAudit, |_| anyhow::bail!("nope")),
            Plugin::new("panicking").on(HookPoint::AfterAudit, |_| panic!("hook exploded")),
            Plugin::new("healthy").on(HookPoint::AfterAudit, recorder(&log, "healthy")),
        ]);

        let audit = descriptor();
        let result = verdict();
        dispatcher.run_hook(&HookContext::AfterAudit {
            audit: &audit,
            result: &result,
        });

        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(result.is_fail());
    }

    #[test]
    fn test_hook_observes_recorded_verdict() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let dispatcher = HookDispatcher::new(vec![Plugin::new("observer").on(
            HookPoint::AfterAudit,
            move |ctx| {
                if let HookContext::AfterAudit { result, .. } = ctx {
                    *sink.lock().unwrap() = Some(result.message.clone());
                }
                Ok(())
            },
        )]);

        let audit = descriptor();
        let result = verdict();
        dispatcher.run_hook(&HookContext::AfterAudit {
            audit: &audit,
            result: &result,
        });
        assert_eq!(
            seen.lock().unwrap().as_deref(),
            Some("Expected HTTP 200, got 500")
        );
    }

    #[test]
    fn test_plugin_audits_carry_plugin_origin() {
        let audit = descriptor().audit;
        let dispatcher = HookDispatcher::new(vec![Plugin::new("acme").with_audit(audit)]);
        let audits = dispatcher.plugin_audits();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].origin, AuditOrigin::Plugin("acme".to_string()));
        assert!(dispatcher.plugin_reporters().is_empty());
    }

    #[test]
    fn test_hook_point_round_trip() {
        for point in HookPoint::all() {
            assert_eq!(point.as_str().parse::<HookPoint>().unwrap(), *point);
        }
        assert_eq!("beforePage".parse::<HookPoint>().unwrap(), HookPoint::BeforePage);
        assert!("sometimes".parse::<HookPoint>().is_err());
    }
}
