use crate::result::{PageResult, Severity};
use crate::ui::icons::{self, PAGE};
use crate::util::format_duration_ms;
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Terminal UI for a run: one progress bar over the targets, with the
/// verdicts of each finished target printed above it.
pub struct RunUI {
    bar: ProgressBar,
    verbose: bool,
    quiet: bool,
}

impl RunUI {
    pub fn new(total_targets: u64, verbose: bool) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let bar = ProgressBar::new(total_targets);
        bar.set_style(style);
        bar.set_prefix("Pages");
        Self {
            bar,
            verbose,
            quiet: false,
        }
    }

    /// A UI that draws nothing; used when terminal output is disabled.
    pub fn hidden() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        Self {
            bar,
            verbose: false,
            quiet: true,
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        // Without a terminal the bar is hidden and swallows println.
        if self.bar.is_hidden() {
            println!("{}", msg.as_ref());
        } else {
            self.bar.println(msg.as_ref());
        }
    }

    /// Print the verdict lines of a finished target and advance the bar.
    pub fn target_complete(&self, result: &PageResult) {
        self.print_line(format!(
            "\n{}{} {}",
            PAGE,
            style(&result.page).bold(),
            style(format!("{} ({})", result.path, format_duration_ms(result.duration))).dim()
        ));
        for audit in &result.audits {
            if audit.severity == Severity::Pass && !self.verbose {
                self.print_line(format!(
                    "    {}{}",
                    style(icons::severity(audit.severity)).green(),
                    style(&audit.audit).dim()
                ));
                continue;
            }
            let line = format!(
                "    {}{}: {}",
                icons::severity(audit.severity),
                audit.audit,
                audit.message
            );
            let styled = match audit.severity {
                Severity::Pass => style(line).green(),
                Severity::Fail => style(line).red(),
                Severity::Warning => style(line).yellow(),
                Severity::Skip => style(line).dim(),
            };
            self.print_line(styled.to_string());
        }
        self.bar.inc(1);
        self.bar.set_message(result.page.clone());
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
