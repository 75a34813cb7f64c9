//! Run report.
//!
//! Everything a result sink needs about one run, serializable as plain JSON.

use crate::collector::{CollectionOutcome, CollectionRun, DuplicateSighting, PageRecord};
use crate::diagnostics::{Diagnostic, SourceBreakdown};
use crate::resolver::LookupDiagnostic;
use crate::result::{FeedcheckError, FeedcheckResult};
use crate::verifier::{OrderingStatus, VerificationReport};
use serde::{Deserialize, Serialize};

/// Collection statistics without the item list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    /// Unique items wanted
    pub target_count: usize,
    /// Unique items collected
    pub collected: usize,
    /// Pages listed
    pub pages_visited: usize,
    /// Next-page activations
    pub page_advances: usize,
    /// Consecutive no-progress pages at the end
    pub exhaustion_attempts: u32,
    /// Stop reason (`None` when the run timed out mid-collection)
    pub outcome: Option<CollectionOutcome>,
    /// Per-page contributions
    pub pages: Vec<PageRecord>,
    /// Duplicate sightings
    pub duplicates: Vec<DuplicateSighting>,
    /// Blank ids skipped
    pub blank_ids: usize,
    /// Last page ids when exhausted
    pub exhaustion_snapshot: Option<Vec<String>>,
}

impl From<CollectionRun> for CollectionSummary {
    fn from(run: CollectionRun) -> Self {
        Self {
            target_count: run.target_count,
            collected: run.len(),
            pages_visited: run.pages_visited,
            page_advances: run.page_advances,
            exhaustion_attempts: run.exhaustion_attempts,
            outcome: run.outcome,
            pages: run.pages,
            duplicates: run.duplicates,
            blank_ids: run.blank_ids,
            exhaustion_snapshot: run.exhaustion_snapshot,
        }
    }
}

/// Remote lookup totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSummary {
    /// Items looked up
    pub items: usize,
    /// Calls issued, retries included
    pub calls: usize,
    /// Items resolved remotely
    pub successes: usize,
    /// Items left unresolved
    pub failures: usize,
}

impl LookupSummary {
    /// Summarize lookup records
    #[must_use]
    pub fn from_lookups(lookups: &[LookupDiagnostic]) -> Self {
        let successes = lookups.iter().filter(|l| l.success).count();
        Self {
            items: lookups.len(),
            calls: lookups.iter().map(|l| l.attempts as usize).sum(),
            successes,
            failures: lookups.len() - successes,
        }
    }
}

/// Result of one orchestrated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: String,
    /// Start time (RFC 3339)
    pub started_at: String,
    /// Wall time, pacing wait included
    pub elapsed_ms: u64,
    /// Collection statistics
    pub collection: CollectionSummary,
    /// Coverage from inline timestamps alone
    pub dom_coverage: f64,
    /// Items per resolution strategy
    pub breakdown: SourceBreakdown,
    /// Remote lookup records
    pub lookups: Vec<LookupDiagnostic>,
    /// Remote lookup totals
    pub lookup_summary: LookupSummary,
    /// Accumulated findings
    pub diagnostics: Vec<Diagnostic>,
    /// Whether the overall deadline expired
    pub timed_out: bool,
    /// Ordering verdict
    pub verification: VerificationReport,
}

impl RunReport {
    /// Ordering verdict
    #[must_use]
    pub const fn status(&self) -> OrderingStatus {
        self.verification.status
    }

    /// Final coverage
    #[must_use]
    pub const fn coverage(&self) -> f64 {
        self.verification.coverage
    }

    /// Whether the collection reached its target
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.collection.collected >= self.collection.target_count
    }

    /// Fail with [`FeedcheckError::CollectionIncomplete`] unless the target was reached
    pub fn require_complete(&self) -> FeedcheckResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(FeedcheckError::CollectionIncomplete {
                collected: self.collection.collected,
                target: self.collection.target_count,
            })
        }
    }
}
