//! Resolution of the ordered, enabled audit list for a run.

use super::{AuditDescriptor, AuditOrigin, builtin};
use std::collections::HashMap;

/// Resolve the audits a run executes.
///
/// Order is built-ins, then plugin audits, then custom audits. A later
/// descriptor with an already registered name replaces the earlier one in
/// its original position. A built-in without an entry in `enabled` uses its
/// own default; plugin and custom audits run unless explicitly disabled.
/// `name_filter` keeps only the named audits, in registry order.
pub fn resolve(
    enabled: &HashMap<String, bool>,
    plugin_audits: Vec<AuditDescriptor>,
    custom_audits: Vec<AuditDescriptor>,
    name_filter: Option<&[String]>,
) -> Vec<AuditDescriptor> {
    let mut registry: Vec<AuditDescriptor> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let candidates = builtin::descriptors()
        .into_iter()
        .chain(plugin_audits)
        .chain(custom_audits);
    for descriptor in candidates {
        match index.get(&descriptor.name) {
            Some(&slot) => registry[slot] = descriptor,
            None => {
                index.insert(descriptor.name.clone(), registry.len());
                registry.push(descriptor);
            }
        }
    }

    registry
        .into_iter()
        .filter(|d| is_enabled(d, enabled))
        .filter(|d| name_filter.is_none_or(|names| names.iter().any(|n| n == &d.name)))
        .collect()
}

fn is_enabled(descriptor: &AuditDescriptor, enabled: &HashMap<String, bool>) -> bool {
    if let Some(&explicit) = enabled.get(&descriptor.name) {
        return explicit;
    }
    match descriptor.origin {
        AuditOrigin::BuiltIn => builtin::default_enabled(&descriptor.name).unwrap_or(true),
        AuditOrigin::Plugin(_) | AuditOrigin::Custom => true,
    }
}

/// Names in `requested` that did not resolve to an enabled audit.
pub fn unmatched_names<'a>(requested: &'a [String], resolved: &[AuditDescriptor]) -> Vec<&'a str> {
    requested
        .iter()
        .filter(|name| !resolved.iter().any(|d| &d.name == *name))
        .map(String::as_str)
        .collect()
}
