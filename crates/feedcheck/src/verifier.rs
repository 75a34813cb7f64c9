//! Coverage-gated ordering verifier.
//!
//! Ordering is only judged when enough items carry a timestamp. Below the
//! threshold the verdict is `INCONCLUSIVE`: sparse evidence is reported as
//! neither ordered nor violated.

use crate::model::ResolvedItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Default coverage threshold
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.70;

/// Ordering verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderingStatus {
    /// Resolved timestamps are non-increasing
    Ordered,
    /// At least one adjacent pair increases
    Violated,
    /// Not enough evidence to judge
    Inconclusive,
}

impl fmt::Display for OrderingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ordered => "ORDERED",
            Self::Violated => "VIOLATED",
            Self::Inconclusive => "INCONCLUSIVE",
        })
    }
}

/// Adjacent pair of resolved items that breaks newest-to-oldest order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Index of `current` within the resolved subsequence
    pub index: usize,
    /// Earlier item (older than `next`)
    pub current: ResolvedItem,
    /// Later item
    pub next: ResolvedItem,
}

/// Verifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// All items, in position order
    pub resolved: Vec<ResolvedItem>,
    /// Fraction of items with a timestamp
    pub coverage: f64,
    /// Threshold the coverage was judged against
    pub coverage_threshold: f64,
    /// Ordering violations
    pub violations: Vec<Violation>,
    /// Verdict
    pub status: OrderingStatus,
}

impl VerificationReport {
    /// Whether coverage met the threshold
    #[must_use]
    pub fn coverage_sufficient(&self) -> bool {
        self.coverage >= self.coverage_threshold
    }

    /// Force an `INCONCLUSIVE` verdict without violations
    pub fn mark_inconclusive(&mut self) {
        self.status = OrderingStatus::Inconclusive;
        self.violations.clear();
    }
}

/// Fraction of `items` with a resolved timestamp; 0.0 when empty
#[must_use]
pub fn coverage(items: &[ResolvedItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let resolved = items.iter().filter(|i| i.is_resolved()).count();
    resolved as f64 / items.len() as f64
}

/// Verify newest-to-oldest ordering of `resolved`
#[must_use]
pub fn verify(resolved: Vec<ResolvedItem>, coverage_threshold: f64) -> VerificationReport {
    let coverage = coverage(&resolved);

    if coverage < coverage_threshold {
        info!(
            coverage,
            threshold = coverage_threshold,
            "coverage below threshold, ordering not evaluated"
        );
        return VerificationReport {
            resolved,
            coverage,
            coverage_threshold,
            violations: Vec::new(),
            status: OrderingStatus::Inconclusive,
        };
    }

    let timed: Vec<(&ResolvedItem, i64)> = resolved
        .iter()
        .filter_map(|item| item.resolved_epoch_ms.map(|ms| (item, ms)))
        .collect();

    let violations: Vec<Violation> = timed
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0].1 < pair[1].1)
        .map(|(index, pair)| {
            debug!(
                index,
                current = pair[0].0.id(),
                next = pair[1].0.id(),
                "ordering violation"
            );
            Violation {
                index,
                current: pair[0].0.clone(),
                next: pair[1].0.clone(),
            }
        })
        .collect();

    let status = if violations.is_empty() {
        OrderingStatus::Ordered
    } else {
        OrderingStatus::Violated
    };
    info!(coverage, violations = violations.len(), %status, "ordering verified");

    VerificationReport {
        resolved,
        coverage,
        coverage_threshold,
        violations,
        status,
    }
}
