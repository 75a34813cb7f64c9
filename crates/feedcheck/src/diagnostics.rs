//! Run diagnostics.
//!
//! Per-item and run-level findings accumulated on the report instead of being
//! raised as errors.

use crate::model::{ResolutionStrategy, ResolvedItem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Fewer unique items than the target were reachable
    CollectionIncomplete,
    /// Pagination stopped producing new ids
    PaginationExhausted,
    /// Inline timestamp present but unparseable
    TimestampParseError,
    /// Remote lookup failed
    FallbackFetchError,
    /// Coverage below the threshold
    CoverageInsufficient,
    /// Adjacent resolved timestamps out of order
    OrderingViolation,
    /// Overall run deadline expired
    RunTimeout,
}

impl DiagnosticKind {
    /// Whether a caller should treat this as a correctness failure
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::OrderingViolation)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollectionIncomplete => "CollectionIncomplete",
            Self::PaginationExhausted => "PaginationExhausted",
            Self::TimestampParseError => "TimestampParseError",
            Self::FallbackFetchError => "FallbackFetchError",
            Self::CoverageInsufficient => "CoverageInsufficient",
            Self::OrderingViolation => "OrderingViolation",
            Self::RunTimeout => "RunTimeout",
        };
        f.write_str(name)
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Category
    pub kind: DiagnosticKind,
    /// Human-readable detail
    pub message: String,
    /// Item concerned, for per-item findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl Diagnostic {
    /// Run-level finding
    #[must_use]
    pub fn run(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            item_id: None,
        }
    }

    /// Finding about one item
    #[must_use]
    pub fn item(
        kind: DiagnosticKind,
        item_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            item_id: Some(item_id.into()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item_id {
            Some(id) => write!(f, "[{}] {id}: {}", self.kind, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Per-item diagnostics for unresolved items.
///
/// A present-but-unparseable attribute yields `TimestampParseError`; a failed
/// remote lookup yields `FallbackFetchError`. An item with no attribute and no
/// lookup attempt yields nothing.
#[must_use]
pub fn item_diagnostics(items: &[ResolvedItem]) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for item in items {
        if item.item.raw_timestamp.is_some() {
            if let (Some(reason), ResolutionStrategy::Api | ResolutionStrategy::Missing) =
                (&item.parse_error, item.strategy)
            {
                out.push(Diagnostic::item(
                    DiagnosticKind::TimestampParseError,
                    item.id(),
                    reason.clone(),
                ));
            }
        }
        if let Some(error) = &item.lookup_error {
            out.push(Diagnostic::item(
                DiagnosticKind::FallbackFetchError,
                item.id(),
                error.clone(),
            ));
        }
    }
    out
}

/// Count of items per resolution strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakdown {
    /// ISO prefix
    pub iso: usize,
    /// Epoch suffix
    pub epoch: usize,
    /// Whole-string fallback
    pub fallback: usize,
    /// Remote lookup
    pub api: usize,
    /// Unresolved
    pub missing: usize,
}

impl SourceBreakdown {
    /// Tally `items`
    #[must_use]
    pub fn tally(items: &[ResolvedItem]) -> Self {
        items.iter().fold(Self::default(), |mut acc, item| {
            *acc.slot(item.strategy) += 1;
            acc
        })
    }

    /// Count for `strategy`
    #[must_use]
    pub const fn get(&self, strategy: ResolutionStrategy) -> usize {
        match strategy {
            ResolutionStrategy::Iso => self.iso,
            ResolutionStrategy::Epoch => self.epoch,
            ResolutionStrategy::Fallback => self.fallback,
            ResolutionStrategy::Api => self.api,
            ResolutionStrategy::Missing => self.missing,
        }
    }

    /// Items resolved from the inline attribute
    #[must_use]
    pub const fn dom(&self) -> usize {
        self.iso + self.epoch + self.fallback
    }

    /// All items
    #[must_use]
    pub const fn total(&self) -> usize {
        self.dom() + self.api + self.missing
    }

    fn slot(&mut self, strategy: ResolutionStrategy) -> &mut usize {
        match strategy {
            ResolutionStrategy::Iso => &mut self.iso,
            ResolutionStrategy::Epoch => &mut self.epoch,
            ResolutionStrategy::Fallback => &mut self.fallback,
            ResolutionStrategy::Api => &mut self.api,
            ResolutionStrategy::Missing => &mut self.missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawItem;

    fn item(id: &str, raw: Option<&str>) -> RawItem {
        RawItem::new(id, "", raw.map(str::to_string), 1)
    }

    #[test]
    fn test_display_with_item() {
        let d = Diagnostic::item(DiagnosticKind::FallbackFetchError, "42", "HTTP 503");
        assert_eq!(d.to_string(), "[FallbackFetchError] 42: HTTP 503");
    }

    #[test]
    fn test_only_ordering_violation_is_failure() {
        assert!(DiagnosticKind::OrderingViolation.is_failure());
        assert!(!DiagnosticKind::CoverageInsufficient.is_failure());
        assert!(!DiagnosticKind::RunTimeout.is_failure());
    }

    #[test]
    fn test_item_diagnostics_classification() {
        let items = vec![
            ResolvedItem::parsed(item("ok", Some("2024-01-01")), 1, ResolutionStrategy::Iso),
            ResolvedItem::missing(item("bad", Some("junk")), "unparseable")
                .with_lookup_error("HTTP 404"),
            ResolvedItem::missing(item("none", None), "no inline timestamp"),
            ResolvedItem::missing(item("api", Some("junk")), "unparseable").with_remote_time(5),
        ];

        let kinds: Vec<_> = item_diagnostics(&items)
            .into_iter()
            .map(|d| (d.kind, d.item_id.unwrap_or_default()))
            .collect();

        assert_eq!(
            kinds,
            vec![
                (DiagnosticKind::TimestampParseError, "bad".to_string()),
                (DiagnosticKind::FallbackFetchError, "bad".to_string()),
                (DiagnosticKind::TimestampParseError, "api".to_string()),
            ]
        );
    }

    #[test]
    fn test_breakdown_tally() {
        let items = vec![
            ResolvedItem::parsed(item("1", None), 1, ResolutionStrategy::Iso),
            ResolvedItem::parsed(item("2", None), 1, ResolutionStrategy::Epoch),
            ResolvedItem::parsed(item("3", None), 1, ResolutionStrategy::Iso),
            ResolvedItem::missing(item("4", None), "x"),
        ];
        let breakdown = SourceBreakdown::tally(&items);

        assert_eq!(breakdown.get(ResolutionStrategy::Iso), 2);
        assert_eq!(breakdown.dom(), 3);
        assert_eq!(breakdown.missing, 1);
        assert_eq!(breakdown.total(), 4);
    }
}
