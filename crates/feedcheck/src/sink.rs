//! Result sinks: consumers of finished run reports.

use crate::report::RunReport;
use crate::result::FeedcheckResult;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Receives finished reports for display or export
pub trait ResultSink: Send + Sync {
    /// Accept one report
    fn publish(&self, report: &RunReport) -> FeedcheckResult<()>;
}

/// Writes each report as pretty-printed JSON to a fixed path
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Create a sink writing to `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Output path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a report written by this sink
    pub fn load(&self) -> FeedcheckResult<RunReport> {
        let json = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl ResultSink for JsonFileSink {
    fn publish(&self, report: &RunReport) -> FeedcheckResult<()> {
        let json = serde_json::to_string_pretty(report)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        info!(path = %self.path.display(), run_id = %report.run_id, "report exported");
        Ok(())
    }
}

/// Keeps reports in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<RunReport>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far
    #[must_use]
    pub fn reports(&self) -> Vec<RunReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultSink for MemorySink {
    fn publish(&self, report: &RunReport) -> FeedcheckResult<()> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceBreakdown;
    use crate::report::{CollectionSummary, LookupSummary};
    use crate::verifier::verify;
    use tempfile::TempDir;

    fn report() -> RunReport {
        RunReport {
            run_id: "run-1".to_string(),
            started_at: "2024-01-01T00:00:00+00:00".to_string(),
            elapsed_ms: 12,
            collection: CollectionSummary::default(),
            dom_coverage: 0.0,
            breakdown: SourceBreakdown::default(),
            lookups: Vec::new(),
            lookup_summary: LookupSummary::default(),
            diagnostics: Vec::new(),
            timed_out: false,
            verification: verify(Vec::new(), 0.7),
        }
    }

    #[test]
    fn test_json_sink_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out/nested/report.json"));

        sink.publish(&report()).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        assert!(content.contains("\"runId\": \"run-1\""));
        assert_eq!(sink.load().unwrap().run_id, "run-1");
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.publish(&report()).unwrap();
        sink.publish(&report()).unwrap();
        assert_eq!(sink.reports().len(), 2);
    }
}
