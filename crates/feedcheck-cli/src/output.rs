//! Output formatting and progress reporting

use crate::error::{CliError, CliResult};
use console::{style, Term};
use feedcheck::{OrderingStatus, ResolvedItem, RunReport};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Findings listed in text output before the remainder is summarized
pub const MAX_LISTED_FINDINGS: usize = 20;

/// Output format for run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Status line and spinner reporter, writing to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Start a spinner while a long phase runs
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(message.to_string());
        self.spinner = Some(pb);
    }

    /// Stop and clear the spinner
    pub fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("✓", "PASS", console::Color::Green), message);
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        self.line(&self.prefix("✗", "FAIL", console::Color::Red), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("⚠", "WARN", console::Color::Yellow), message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("ℹ", "INFO", console::Color::Blue), message);
    }

    /// Print the one-line verdict for a finished run
    pub fn verdict(&self, report: &RunReport) {
        let line = format!(
            "{} ({} items, {:.1}% coverage)",
            report.status(),
            report.collection.collected,
            report.coverage() * 100.0
        );
        match report.status() {
            OrderingStatus::Ordered => self.success(&line),
            OrderingStatus::Violated => self.failure(&line),
            OrderingStatus::Inconclusive => self.warning(&line),
        }
    }

    fn prefix(&self, symbol: &str, plain: &str, color: console::Color) -> String {
        if self.use_color {
            style(symbol).fg(color).bold().to_string()
        } else {
            plain.to_string()
        }
    }

    fn line(&self, prefix: &str, message: &str) {
        let text = format!("{prefix} {message}");
        match self.spinner {
            Some(ref pb) => pb.println(text),
            None => {
                let _ = self.term.write_line(&text);
            }
        }
    }
}

// =============================================================================
// REPORT RENDERING
// =============================================================================

fn describe(item: &ResolvedItem) -> String {
    let when = item
        .resolved_epoch_ms
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| "?".to_string(), |dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string());
    format!("#{} id {} at {when}", item.position(), item.id())
}

fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Render a run report as human-readable text
#[must_use]
pub fn render_report_text(report: &RunReport) -> String {
    let collection = &report.collection;
    let breakdown = &report.breakdown;
    let lookups = &report.lookup_summary;
    let mut out = String::new();

    let _ = writeln!(out, "Feedcheck run {}", report.run_id);
    let _ = writeln!(out, "  Started:     {}", report.started_at);
    let _ = writeln!(out, "  Elapsed:     {} ms", report.elapsed_ms);
    let _ = writeln!(out, "  Status:      {}", report.status());
    let _ = writeln!(
        out,
        "  Collected:   {}/{} items over {} pages ({} advances)",
        collection.collected,
        collection.target_count,
        collection.pages_visited,
        collection.page_advances
    );
    let outcome = collection
        .outcome
        .map_or_else(|| "timed out".to_string(), |o| format!("{o:?}"));
    let _ = writeln!(out, "  Outcome:     {outcome}");
    let _ = writeln!(
        out,
        "  Duplicates:  {} (blank ids skipped: {})",
        collection.duplicates.len(),
        collection.blank_ids
    );
    let _ = writeln!(
        out,
        "  Coverage:    {} (inline {}, threshold {})",
        percent(report.coverage()),
        percent(report.dom_coverage),
        percent(report.verification.coverage_threshold)
    );
    let _ = writeln!(
        out,
        "  Sources:     ISO {} | EPOCH {} | FALLBACK {} | API {} | MISSING {}",
        breakdown.iso, breakdown.epoch, breakdown.fallback, breakdown.api, breakdown.missing
    );
    let _ = writeln!(
        out,
        "  Lookups:     {} items, {} calls, {} resolved, {} failed",
        lookups.items, lookups.calls, lookups.successes, lookups.failures
    );
    if report.timed_out {
        let _ = writeln!(out, "  Timed out:   yes");
    }

    let violations = &report.verification.violations;
    if !violations.is_empty() {
        let _ = writeln!(out, "\nViolations ({}):", violations.len());
        for violation in violations.iter().take(MAX_LISTED_FINDINGS) {
            let _ = writeln!(
                out,
                "  {} is older than {}",
                describe(&violation.current),
                describe(&violation.next)
            );
        }
        if violations.len() > MAX_LISTED_FINDINGS {
            let _ = writeln!(out, "  ... and {} more", violations.len() - MAX_LISTED_FINDINGS);
        }
    }

    let diagnostics = &report.diagnostics;
    if !diagnostics.is_empty() {
        let _ = writeln!(out, "\nDiagnostics ({}):", diagnostics.len());
        for diagnostic in diagnostics.iter().take(MAX_LISTED_FINDINGS) {
            let _ = writeln!(out, "  {diagnostic}");
        }
        if diagnostics.len() > MAX_LISTED_FINDINGS {
            let _ = writeln!(out, "  ... and {} more", diagnostics.len() - MAX_LISTED_FINDINGS);
        }
    }

    out
}

/// Render a run report as pretty JSON
pub fn render_report_json(report: &RunReport) -> CliResult<String> {
    serde_json::to_string_pretty(report).map_err(|e| CliError::export(e.to_string()))
}

/// Render in `format`
pub fn render_report(report: &RunReport, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Text => Ok(render_report_text(report)),
        OutputFormat::Json => render_report_json(report),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use feedcheck::{
        Orchestrator, PageItem, RateLimiter, RunConfig, ScriptedLookup, ScriptedPageDriver,
    };
    use std::sync::Arc;

    fn run(pages: Vec<Vec<PageItem>>, target: usize) -> RunReport {
        let config = RunConfig::default()
            .with_run_delay(Duration::ZERO)
            .with_collector(feedcheck::CollectorConfig::default().with_target_count(target));
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(ScriptedLookup::new()),
            Arc::new(RateLimiter::in_memory()),
        )
        .unwrap();
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap()
            .block_on(orchestrator.run(&mut ScriptedPageDriver::new(pages)))
            .unwrap()
    }

    fn page(times: &[(&str, &str)]) -> Vec<PageItem> {
        times
            .iter()
            .map(|(id, ts)| PageItem::new(*id, format!("title {id}"), Some((*ts).to_string())))
            .collect()
    }

    mod output_format_tests {
        use super::*;

        #[test]
        fn test_default_format() {
            assert_eq!(OutputFormat::default(), OutputFormat::Text);
        }
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_default_reporter() {
            let reporter = ProgressReporter::default();
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_messages_do_not_panic() {
            let reporter = ProgressReporter::new(false, false);
            reporter.success("ok");
            reporter.failure("bad");
            reporter.warning("hmm");
            reporter.info("fyi");
        }

        #[test]
        fn test_spinner_lifecycle() {
            let mut reporter = ProgressReporter::new(false, false);
            reporter.start_spinner("collecting");
            reporter.info("inside spinner");
            reporter.finish();
            assert!(reporter.spinner.is_none());
        }

        #[test]
        fn test_quiet_mode_has_no_spinner() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_spinner("collecting");
            assert!(reporter.spinner.is_none());
            reporter.failure("shown");
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_text_for_ordered_run() {
            let report = run(
                vec![page(&[
                    ("3", "2024-01-01T00:02:00"),
                    ("2", "2024-01-01T00:01:00"),
                    ("1", "2024-01-01T00:00:00"),
                ])],
                3,
            );
            let text = render_report_text(&report);
            assert!(text.contains("Status:      ORDERED"));
            assert!(text.contains("Collected:   3/3 items over 1 pages"));
            assert!(text.contains("ISO 3 | EPOCH 0"));
            assert!(!text.contains("Violations"));
        }

        #[test]
        fn test_text_lists_violations() {
            let report = run(
                vec![page(&[
                    ("a", "2024-01-01T00:00:00"),
                    ("b", "2024-01-01T00:05:00"),
                ])],
                2,
            );
            let text = render_report_text(&report);
            assert!(text.contains("VIOLATED"));
            assert!(text.contains("Violations (1):"));
            assert!(text.contains("#1 id a at 2024-01-01T00:00:00Z is older than #2 id b"));
            assert!(text.contains("[OrderingViolation]"));
        }

        #[test]
        fn test_json_is_parseable() {
            let report = run(vec![page(&[("1", "2024-01-01T00:00:00")])], 1);
            let json = render_report(&report, OutputFormat::Json).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["verification"]["status"], "ORDERED");
            assert_eq!(value["runId"], report.run_id.as_str());
        }
    }
}
