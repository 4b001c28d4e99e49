use crate::result::{AuditResult, RunResult, Severity};
use crate::ui::icons::{FAIL, INFO, PASS, WARN};
use console::style;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Removed,
    Regression,
    Improvement,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictSnapshot {
    pub severity: Severity,
    pub message: String,
}

impl From<&AuditResult> for VerdictSnapshot {
    fn from(audit: &AuditResult) -> Self {
        Self {
            severity: audit.severity,
            message: audit.message.clone(),
        }
    }
}

/// Classification of one `(page, audit)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditChange {
    pub page: String,
    pub audit: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<VerdictSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<VerdictSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub regressions: usize,
    pub improvements: usize,
    pub unchanged: usize,
    pub new_audits: usize,
    pub removed_audits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineComparison {
    pub baseline_timestamp: String,
    pub current_timestamp: String,
    pub changes: Vec<AuditChange>,
    pub summary: ChangeSummary,
}

impl BaselineComparison {
    pub fn has_regressions(&self) -> bool {
        self.summary.regressions > 0
    }

    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &AuditChange> {
        self.changes.iter().filter(move |c| c.kind == kind)
    }
}

fn key(page: &str, audit: &str) -> String {
    format!("{}::{}", page, audit)
}

/// Compare `current` against `baseline`, keyed by `page::audit`.
///
/// Current verdicts are classified in current order, then baseline pairs
/// missing from the current run are reported as removed in baseline order.
pub fn compare(baseline: &RunResult, current: &RunResult) -> BaselineComparison {
    let mut before: HashMap<String, VerdictSnapshot> = HashMap::new();
    let mut before_order: Vec<(String, String)> = Vec::new();
    for page in &baseline.pages {
        for audit in &page.audits {
            let k = key(&page.page, &audit.audit);
            if before.insert(k, VerdictSnapshot::from(audit)).is_none() {
                before_order.push((page.page.clone(), audit.audit.clone()));
            }
        }
    }

    let mut changes = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for page in &current.pages {
        for audit in &page.audits {
            let k = key(&page.page, &audit.audit);
            let now = VerdictSnapshot::from(audit);
            let previous = before.get(&k).cloned();
            let kind = match &previous {
                None => ChangeKind::New,
                Some(prev) if prev.severity == now.severity => ChangeKind::Unchanged,
                Some(_) if now.severity.is_non_failing() => ChangeKind::Improvement,
                Some(_) => ChangeKind::Regression,
            };
            seen.insert(k);
            changes.push(AuditChange {
                page: page.page.clone(),
                audit: audit.audit.clone(),
                kind,
                baseline: previous,
                current: Some(now),
            });
        }
    }

    for (page, audit) in before_order {
        let k = key(&page, &audit);
        if seen.contains(&k) {
            continue;
        }
        let baseline = before.remove(&k);
        changes.push(AuditChange {
            page,
            audit,
            kind: ChangeKind::Removed,
            baseline,
            current: None,
        });
    }

    let count = |kind| changes.iter().filter(|c| c.kind == kind).count();
    let summary = ChangeSummary {
        regressions: count(ChangeKind::Regression),
        improvements: count(ChangeKind::Improvement),
        unchanged: count(ChangeKind::Unchanged),
        new_audits: count(ChangeKind::New),
        removed_audits: count(ChangeKind::Removed),
    };

    BaselineComparison {
        baseline_timestamp: baseline.timestamp.clone(),
        current_timestamp: current.timestamp.clone(),
        changes,
        summary,
    }
}

/// Terminal rendering of a comparison.
pub fn render(comparison: &BaselineComparison) -> String {
    let s = &comparison.summary;
    let mut lines = vec![
        format!("  {}", style("Baseline comparison").bold()),
        style(format!(
            "  {} → {}",
            comparison.baseline_timestamp, comparison.current_timestamp
        ))
        .dim()
        .to_string(),
        String::new(),
    ];

    let snapshot = |v: &Option<VerdictSnapshot>| {
        v.as_ref()
            .map(|v| v.severity.as_str())
            .unwrap_or("-")
            .to_string()
    };

    for change in comparison.of_kind(ChangeKind::Regression) {
        lines.push(
            style(format!(
                "    {}{} → {}: {} → {}",
                FAIL,
                change.page,
                change.audit,
                snapshot(&change.baseline),
                snapshot(&change.current)
            ))
            .red()
            .to_string(),
        );
    }
    for change in comparison.of_kind(ChangeKind::Improvement) {
        lines.push(
            style(format!(
                "    {}{} → {}: {} → {}",
                PASS,
                change.page,
                change.audit,
                snapshot(&change.baseline),
                snapshot(&change.current)
            ))
            .green()
            .to_string(),
        );
    }
    for change in comparison.of_kind(ChangeKind::New) {
        lines.push(format!(
            "    {}{} → {}: new ({})",
            INFO,
            change.page,
            change.audit,
            snapshot(&change.current)
        ));
    }
    for change in comparison.of_kind(ChangeKind::Removed) {
        lines.push(
            style(format!("    {}{} → {}: removed", WARN, change.page, change.audit))
                .dim()
                .to_string(),
        );
    }

    lines.push(String::new());
    lines.push(format!(
        "  {} regression(s), {} improvement(s), {} unchanged, {} new, {} removed",
        s.regressions, s.improvements, s.unchanged, s.new_audits, s.removed_audits
    ));
    lines.join("\n")
}
