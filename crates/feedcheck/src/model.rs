//! Item model shared by the collector, resolver and verifier.
//!
//! ```text
//! PageItem ──collect──► RawItem ──resolve──► ResolvedItem ──verify──► report
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// An item collected from the listing, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    /// Stable external identifier
    pub id: String,
    /// Display title as listed
    pub title: String,
    /// Inline timestamp attribute, if the listing carried one
    pub raw_timestamp: Option<String>,
    /// 1-based order of first sighting
    pub position: usize,
}

impl RawItem {
    /// Create a new raw item
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        raw_timestamp: Option<String>,
        position: usize,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            raw_timestamp,
            position,
        }
    }
}

/// Where a resolved timestamp came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimestampSource {
    /// Parsed from the inline listing attribute
    Dom,
    /// Fetched from the remote item lookup
    Api,
    /// No timestamp could be obtained
    Missing,
}

/// How a timestamp was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    /// Date-time prefix before the first whitespace
    Iso,
    /// Ten-digit epoch seconds after the first whitespace
    Epoch,
    /// Whole raw string parsed as a date-time
    Fallback,
    /// Remote lookup
    Api,
    /// Unresolved
    Missing,
}

impl ResolutionStrategy {
    /// Short tag used in logs and reports
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Iso => "ISO",
            Self::Epoch => "EPOCH",
            Self::Fallback => "FALLBACK",
            Self::Api => "API",
            Self::Missing => "MISSING",
        }
    }

    /// Source category for this strategy
    #[must_use]
    pub const fn source(self) -> TimestampSource {
        match self {
            Self::Iso | Self::Epoch | Self::Fallback => TimestampSource::Dom,
            Self::Api => TimestampSource::Api,
            Self::Missing => TimestampSource::Missing,
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A raw item together with its reconciled timestamp.
///
/// Never updated in place: a remote fallback result produces a new value
/// via [`ResolvedItem::with_remote_time`] or [`ResolvedItem::with_lookup_error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedItem {
    /// The collected item
    #[serde(flatten)]
    pub item: RawItem,
    /// Resolved timestamp in epoch milliseconds
    pub resolved_epoch_ms: Option<i64>,
    /// Source category
    pub source: TimestampSource,
    /// Strategy that produced the timestamp
    pub strategy: ResolutionStrategy,
    /// Why local parsing failed, if it did
    pub parse_error: Option<String>,
    /// Why the remote lookup failed, if one was attempted and failed
    pub lookup_error: Option<String>,
}

impl ResolvedItem {
    /// Item resolved from its inline attribute
    #[must_use]
    pub fn parsed(item: RawItem, epoch_ms: i64, strategy: ResolutionStrategy) -> Self {
        Self {
            item,
            resolved_epoch_ms: Some(epoch_ms),
            source: strategy.source(),
            strategy,
            parse_error: None,
            lookup_error: None,
        }
    }

    /// Item left unresolved by local parsing
    #[must_use]
    pub fn missing(item: RawItem, reason: impl Into<String>) -> Self {
        Self {
            item,
            resolved_epoch_ms: None,
            source: TimestampSource::Missing,
            strategy: ResolutionStrategy::Missing,
            parse_error: Some(reason.into()),
            lookup_error: None,
        }
    }

    /// Copy of this item resolved by the remote lookup
    #[must_use]
    pub fn with_remote_time(&self, epoch_ms: i64) -> Self {
        Self {
            item: self.item.clone(),
            resolved_epoch_ms: Some(epoch_ms),
            source: TimestampSource::Api,
            strategy: ResolutionStrategy::Api,
            parse_error: self.parse_error.clone(),
            lookup_error: None,
        }
    }

    /// Copy of this item with a failed remote lookup recorded
    #[must_use]
    pub fn with_lookup_error(&self, error: impl Into<String>) -> Self {
        Self {
            lookup_error: Some(error.into()),
            ..self.clone()
        }
    }

    /// Item identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.item.id
    }

    /// 1-based first-seen position
    #[must_use]
    pub const fn position(&self) -> usize {
        self.item.position
    }

    /// Whether a timestamp was obtained from any source
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved_epoch_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str) -> RawItem {
        RawItem::new(id, format!("title {id}"), None, 1)
    }

    mod strategy_tests {
        use super::*;

        #[test]
        fn test_strategy_sources() {
            assert_eq!(ResolutionStrategy::Iso.source(), TimestampSource::Dom);
            assert_eq!(ResolutionStrategy::Epoch.source(), TimestampSource::Dom);
            assert_eq!(ResolutionStrategy::Fallback.source(), TimestampSource::Dom);
            assert_eq!(ResolutionStrategy::Api.source(), TimestampSource::Api);
            assert_eq!(ResolutionStrategy::Missing.source(), TimestampSource::Missing);
        }

        #[test]
        fn test_strategy_serializes_as_tag() {
            let json = serde_json::to_string(&ResolutionStrategy::Fallback).unwrap();
            assert_eq!(json, "\"FALLBACK\"");
            assert_eq!(ResolutionStrategy::Epoch.to_string(), "EPOCH");
        }
    }

    mod resolved_item_tests {
        use super::*;

        #[test]
        fn test_remote_time_replaces_missing() {
            let missing = ResolvedItem::missing(raw("7"), "no inline timestamp");
            let resolved = missing.with_remote_time(1_704_067_200_000);

            assert_eq!(resolved.source, TimestampSource::Api);
            assert_eq!(resolved.strategy, ResolutionStrategy::Api);
            assert_eq!(resolved.resolved_epoch_ms, Some(1_704_067_200_000));
            assert_eq!(resolved.parse_error.as_deref(), Some("no inline timestamp"));
            assert!(!missing.is_resolved());
        }

        #[test]
        fn test_lookup_error_keeps_item_missing() {
            let missing = ResolvedItem::missing(raw("8"), "no inline timestamp");
            let failed = missing.with_lookup_error("HTTP 503");

            assert_eq!(failed.source, TimestampSource::Missing);
            assert!(failed.resolved_epoch_ms.is_none());
            assert_eq!(failed.lookup_error.as_deref(), Some("HTTP 503"));
        }

        #[test]
        fn test_serialized_shape_is_flat() {
            let item = ResolvedItem::parsed(raw("9"), 5000, ResolutionStrategy::Iso);
            let value = serde_json::to_value(&item).unwrap();

            assert_eq!(value["id"], "9");
            assert_eq!(value["position"], 1);
            assert_eq!(value["resolvedEpochMs"], 5000);
            assert_eq!(value["source"], "DOM");
            assert_eq!(value["strategy"], "ISO");
        }
    }
}
