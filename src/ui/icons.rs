//! Shared UI icons.
//!
//! Each icon falls back to plain text on terminals without Unicode support.

use crate::result::Severity;
use console::Emoji;

// Verdicts
pub static PASS: Emoji<'_, '_> = Emoji("✓ ", "[PASS] ");
pub static FAIL: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");
pub static SKIP: Emoji<'_, '_> = Emoji("○ ", "[SKIP] ");

// Run lifecycle
pub static SHIELD: Emoji<'_, '_> = Emoji("🛡️  ", "");
pub static KEY: Emoji<'_, '_> = Emoji("🔑 ", "[AUTH] ");
pub static PAGE: Emoji<'_, '_> = Emoji("📄 ", "-");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static BELL: Emoji<'_, '_> = Emoji("🔔 ", "[NOTIFY] ");
pub static DIFF: Emoji<'_, '_> = Emoji("🔀 ", "[DIFF] ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ ", "i ");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

pub fn severity(severity: Severity) -> &'static Emoji<'static, 'static> {
    match severity {
        Severity::Pass => &PASS,
        Severity::Fail => &FAIL,
        Severity::Warning => &WARN,
        Severity::Skip => &SKIP,
    }
}
