//! Timestamp Resolver
//!
//! Reconciles each item's timestamp from two independent sources:
//!
//! 1. The inline attribute, tried against a fixed table of local parse
//!    strategies (first success wins):
//!
//! | Priority | Strategy   | Input                                  |
//! |----------|------------|----------------------------------------|
//! | 1        | `ISO`      | text before the first whitespace       |
//! | 2        | `EPOCH`    | text after it, exactly 10 ASCII digits |
//! | 3        | `FALLBACK` | the whole string                       |
//!
//! 2. The remote item lookup, for items still `MISSING`, issued in bounded
//!    concurrent batches paced through the [`RateLimiter`]. Each lookup is
//!    retried at most once, and only on a transient failure.

use crate::lookup::{ItemLookup, LookupFailure};
use crate::model::{RawItem, ResolutionStrategy, ResolvedItem};
use crate::pacing::RateLimiter;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of concurrent lookups per batch
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default pacing delay between lookup batches (600ms)
pub const DEFAULT_LOOKUP_DELAY_MS: u64 = 600;

/// A lookup is retried at most this many times
pub const MAX_LOOKUP_RETRIES: u32 = 1;

/// Reason recorded when an item has no inline attribute
pub const NO_INLINE_TIMESTAMP: &str = "no inline timestamp";

/// Reason recorded when every local strategy failed
pub const ALL_STRATEGIES_FAILED: &str = "all local parse strategies failed";

const NAIVE_ISO_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const NAIVE_SPACED_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

// =============================================================================
// LOCAL PARSE STRATEGIES
// =============================================================================

/// A local parse strategy over the raw inline attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStrategy {
    /// Date-time prefix
    IsoPrefix,
    /// Ten-digit epoch-seconds suffix
    EpochSuffix,
    /// Whole string as date-time
    WholeString,
}

/// Local strategies in priority order
pub const LOCAL_STRATEGIES: [ParseStrategy; 3] = [
    ParseStrategy::IsoPrefix,
    ParseStrategy::EpochSuffix,
    ParseStrategy::WholeString,
];

impl ParseStrategy {
    /// Tag recorded on success
    #[must_use]
    pub const fn resolution(self) -> ResolutionStrategy {
        match self {
            Self::IsoPrefix => ResolutionStrategy::Iso,
            Self::EpochSuffix => ResolutionStrategy::Epoch,
            Self::WholeString => ResolutionStrategy::Fallback,
        }
    }

    /// Epoch milliseconds for `raw`, or `None` if this strategy does not apply
    #[must_use]
    pub fn apply(self, raw: &str) -> Option<i64> {
        let raw = raw.trim();
        match self {
            Self::IsoPrefix => raw
                .split_whitespace()
                .next()
                .and_then(parse_iso_datetime),
            Self::EpochSuffix => {
                let (_, suffix) = raw.split_once(char::is_whitespace)?;
                let suffix = suffix.trim();
                if !epoch_pattern().is_match(suffix) {
                    return None;
                }
                suffix.parse::<i64>().ok().map(|secs| secs * 1000)
            }
            Self::WholeString => parse_iso_datetime(raw).or_else(|| parse_loose_datetime(raw)),
        }
    }
}

fn epoch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{10}$").expect("epoch pattern is valid"))
}

/// Parse an ISO 8601 date-time or date. Naive values are taken as UTC.
fn parse_iso_datetime(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_ISO_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Date-time forms only accepted for the whole string
fn parse_loose_datetime(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt.timestamp_millis());
    }
    NAIVE_SPACED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Resolve one item from its inline attribute only
#[must_use]
pub fn resolve(item: &RawItem) -> ResolvedItem {
    let Some(raw) = item.raw_timestamp.as_deref() else {
        return ResolvedItem::missing(item.clone(), NO_INLINE_TIMESTAMP);
    };
    LOCAL_STRATEGIES
        .iter()
        .find_map(|strategy| strategy.apply(raw).map(|ms| (*strategy, ms)))
        .map_or_else(
            || {
                debug!(id = %item.id, raw, "inline timestamp unparseable");
                ResolvedItem::missing(item.clone(), format!("{ALL_STRATEGIES_FAILED}: {raw:?}"))
            },
            |(strategy, ms)| ResolvedItem::parsed(item.clone(), ms, strategy.resolution()),
        )
}

/// Resolve every item locally, preserving order
#[must_use]
pub fn resolve_all(items: &[RawItem]) -> Vec<ResolvedItem> {
    items.iter().map(resolve).collect()
}

// =============================================================================
// REMOTE FALLBACK
// =============================================================================

/// Outcome of one remote lookup (including its retry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupDiagnostic {
    /// Item identifier
    pub id: String,
    /// Calls made (1 or 2)
    pub attempts: u32,
    /// Whether a timestamp was obtained
    pub success: bool,
    /// Status of the last call
    pub status_code: u16,
    /// Epoch seconds returned
    pub time: Option<i64>,
    /// Failure reason
    pub error: Option<String>,
}

/// Remote fallback configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Concurrent lookups per batch
    pub batch_size: usize,
    /// Pacing delay before each batch
    pub lookup_delay: Duration,
    /// Delay before the single retry
    pub retry_delay: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lookup_delay: Duration::from_millis(DEFAULT_LOOKUP_DELAY_MS),
            retry_delay: Duration::from_millis(DEFAULT_LOOKUP_DELAY_MS),
        }
    }
}

impl ResolverConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set lookup pacing delay
    #[must_use]
    pub const fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    /// Set retry delay
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Resolver with remote fallback
pub struct Resolver {
    lookup: Arc<dyn ItemLookup>,
    limiter: Arc<RateLimiter>,
    config: ResolverConfig,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("limiter", &self.limiter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Create a resolver
    #[must_use]
    pub fn new(
        lookup: Arc<dyn ItemLookup>,
        limiter: Arc<RateLimiter>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            lookup,
            limiter,
            config,
        }
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `items` locally, then fill `MISSING` ones remotely in batches of
    /// `batch_size`. Output order matches input order.
    pub async fn resolve_batch(
        &self,
        items: &[RawItem],
        batch_size: usize,
    ) -> (Vec<ResolvedItem>, Vec<LookupDiagnostic>) {
        let mut resolved = resolve_all(items);
        let mut diagnostics = Vec::new();
        self.fill_missing(&mut resolved, batch_size, &mut diagnostics)
            .await;
        (resolved, diagnostics)
    }

    /// Replace `MISSING` entries of `resolved` with remote results, one batch at
    /// a time. Completed batches are written back before the next starts, so a
    /// cancelled call leaves every unfinished item `MISSING`.
    pub async fn fill_missing(
        &self,
        resolved: &mut [ResolvedItem],
        batch_size: usize,
        diagnostics: &mut Vec<LookupDiagnostic>,
    ) {
        let pending: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.is_resolved())
            .map(|(idx, _)| idx)
            .collect();
        if pending.is_empty() {
            return;
        }

        let batch_size = batch_size.max(1);
        let total_batches = pending.len().div_ceil(batch_size);
        info!(
            pending = pending.len(),
            batches = total_batches,
            "resolving missing timestamps remotely"
        );

        for (batch_no, batch) in pending.chunks(batch_size).enumerate() {
            let ids: Vec<String> = batch
                .iter()
                .map(|&idx| resolved[idx].id().to_string())
                .collect();
            let outcomes = self
                .limiter
                .paced(
                    self.config.lookup_delay,
                    join_all(ids.into_iter().map(|id| self.lookup_with_retry(id))),
                )
                .await;

            for (&idx, outcome) in batch.iter().zip(outcomes) {
                resolved[idx] = match (outcome.success, outcome.time) {
                    (true, Some(secs)) => resolved[idx].with_remote_time(secs * 1000),
                    _ => resolved[idx]
                        .with_lookup_error(outcome.error.clone().unwrap_or_default()),
                };
                diagnostics.push(outcome);
            }
            debug!(
                batch = batch_no + 1,
                of = total_batches,
                size = batch.len(),
                "lookup batch complete"
            );
        }
    }

    async fn lookup_with_retry(&self, id: String) -> LookupDiagnostic {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let response = self.lookup.fetch_item(&id).await;
            match response.epoch_ms() {
                Ok(_) => {
                    return LookupDiagnostic {
                        id,
                        attempts,
                        success: true,
                        status_code: response.status_code,
                        time: response.time_epoch_seconds,
                        error: None,
                    };
                }
                Err(failure) if failure.is_transient() && attempts <= MAX_LOOKUP_RETRIES => {
                    debug!(id = %id, error = %failure, "transient lookup failure, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(failure) => {
                    warn!(id = %id, attempts, error = %failure, "lookup failed");
                    return failed(id, attempts, response.status_code, &failure);
                }
            }
        }
    }
}

fn failed(
    id: String,
    attempts: u32,
    status_code: u16,
    failure: &LookupFailure,
) -> LookupDiagnostic {
    LookupDiagnostic {
        id,
        attempts,
        success: false,
        status_code,
        time: None,
        error: Some(failure.to_string()),
    }
}
