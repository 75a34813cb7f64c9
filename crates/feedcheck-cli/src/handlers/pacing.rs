//! Pacing command handler

use crate::config::{CliConfig, Settings};
use crate::error::CliResult;
use crate::output::ProgressReporter;
use crate::{PacingAction, PacingArgs};
use feedcheck::pacing::{required_wait, system_now_ms};
use feedcheck::{FileStore, PacingState, PacingStore, RateLimiter};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// Execute the pacing command
pub fn execute_pacing(config: &CliConfig, settings: &Settings, args: &PacingArgs) -> CliResult<()> {
    let reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    match &args.action {
        PacingAction::Show(state) => {
            let path = state.state.as_deref().unwrap_or(&settings.state_file);
            let pacing = FileStore::new(path).load()?;
            let run_delay = Duration::from_millis(settings.run_delay_ms);
            print!("{}", render_state(path, &pacing, system_now_ms(), run_delay));
            Ok(())
        }
        PacingAction::Reset(state) => {
            let path = state.state.as_deref().unwrap_or(&settings.state_file);
            RateLimiter::with_file(path).reset()?;
            reporter.success(&format!("Pacing state cleared ({})", path.display()));
            Ok(())
        }
    }
}

/// Describe the shared record and the wait a run starting at `now_ms` would incur
#[must_use]
pub fn render_state(path: &Path, state: &PacingState, now_ms: u64, run_delay: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "State file:      {}", path.display());
    let _ = writeln!(out, "Runs completed:  {}", state.runs_completed);
    let last = if state.runs_completed == 0 {
        "never".to_string()
    } else {
        i64::try_from(state.last_run_end_time)
            .ok()
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map_or_else(|| state.last_run_end_time.to_string(), |dt| dt.to_rfc3339())
    };
    let _ = writeln!(out, "Last run ended:  {last}");
    let wait = required_wait(state, now_ms, run_delay);
    let _ = writeln!(out, "Next run waits:  {} ms", wait.as_millis());
    out
}
