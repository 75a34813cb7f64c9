//! Deduplicating Collector
//!
//! Walks a paginated listing through a [`PageDriver`] until `target_count`
//! unique ids have been collected or the listing stops cooperating.
//!
//! ```text
//!        ┌──────────────┐
//!   ┌───►│ list page    │  (paced when the driver is remote)
//!   │    └──────┬───────┘
//!   │           ▼
//!   │    ┌──────────────┐  target reached     ┌──────────┐
//!   │    │ absorb items ├────────────────────►│ Complete │
//!   │    └──────┬───────┘                     └──────────┘
//!   │           ▼
//!   │    no new ids N times in a row ────────► Exhausted
//!   │    max_pages reached ──────────────────► PageLimit
//!   │    no next control ────────────────────► NoNextPage
//!   │           ▼
//!   │    ┌──────────────┐
//!   │    │ activate next│
//!   │    └──────┬───────┘
//!   │           ▼
//!   │    ┌────────────────────────────┐
//!   └────┤ first id changed / timeout │
//!        └────────────────────────────┘
//! ```
//!
//! Termination without reaching the target is a partial result, not an error.
//! Only driver failures are returned as errors.

use crate::driver::{PageDriver, PageItem};
use crate::model::RawItem;
use crate::pacing::RateLimiter;
use crate::result::FeedcheckResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default number of unique items to collect
pub const DEFAULT_TARGET_COUNT: usize = 100;

/// Default consecutive no-progress pages before giving up
pub const DEFAULT_MAX_EXHAUSTION_ATTEMPTS: u32 = 3;

/// Default bound on waiting for a page transition (5 seconds)
pub const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval while waiting for a transition (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Number of ids kept in the exhaustion snapshot
pub const SNAPSHOT_LEN: usize = 30;

// =============================================================================
// CONFIG
// =============================================================================

/// Collector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Unique items wanted
    pub target_count: usize,
    /// Consecutive no-progress pages tolerated
    pub max_exhaustion_attempts: u32,
    /// Bound on waiting for the first id to change after activation
    pub transition_timeout: Duration,
    /// Re-list interval while waiting for a transition
    pub poll_interval: Duration,
    /// Pacing delay for remote driver calls
    pub page_delay: Duration,
    /// Optional cap on listed pages
    pub max_pages: Option<usize>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            target_count: DEFAULT_TARGET_COUNT,
            max_exhaustion_attempts: DEFAULT_MAX_EXHAUSTION_ATTEMPTS,
            transition_timeout: Duration::from_millis(DEFAULT_TRANSITION_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            page_delay: Duration::ZERO,
            max_pages: None,
        }
    }
}

impl CollectorConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set target count
    #[must_use]
    pub const fn with_target_count(mut self, target_count: usize) -> Self {
        self.target_count = target_count;
        self
    }

    /// Set exhaustion threshold
    #[must_use]
    pub const fn with_max_exhaustion_attempts(mut self, attempts: u32) -> Self {
        self.max_exhaustion_attempts = attempts;
        self
    }

    /// Set transition timeout
    #[must_use]
    pub const fn with_transition_timeout(mut self, timeout: Duration) -> Self {
        self.transition_timeout = timeout;
        self
    }

    /// Set polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set remote page pacing delay
    #[must_use]
    pub const fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Set page cap
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }
}

// =============================================================================
// COLLECTION RUN
// =============================================================================

/// Why collection stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionOutcome {
    /// Target reached
    Complete,
    /// Listing offered no next-page control
    NoNextPage,
    /// No new ids for `max_exhaustion_attempts` consecutive pages
    Exhausted,
    /// Page cap reached
    PageLimit,
}

impl CollectionOutcome {
    /// Whether the run stopped short of its target
    #[must_use]
    pub const fn is_partial(self) -> bool {
        !matches!(self, Self::Complete)
    }
}

/// What one listed page contributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// 1-based page number in visit order
    pub page: usize,
    /// Items the driver listed
    pub listed: usize,
    /// Items collected from this page
    pub new_items: usize,
    /// Already-seen ids
    pub duplicates: usize,
    /// Rows with a blank id
    pub blank_ids: usize,
    /// Whether the first id changed after the preceding activation
    /// (`None` for the first page)
    pub transition_observed: Option<bool>,
}

/// An already-collected id seen again on a later scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSighting {
    /// Item identifier
    pub id: String,
    /// Page of the first sighting
    pub first_page: usize,
    /// Page of this sighting
    pub page: usize,
    /// Position assigned at the first sighting
    pub position: usize,
}

/// Collection state owned by one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRun {
    /// Unique items wanted
    pub target_count: usize,
    /// Unique items in first-seen order
    pub items: Vec<RawItem>,
    #[serde(skip)]
    seen_ids: HashMap<String, usize>,
    /// Pages listed
    pub pages_visited: usize,
    /// Next-page activations
    pub page_advances: usize,
    /// Current consecutive no-progress pages
    pub exhaustion_attempts: u32,
    /// Stop reason, set when collection ends
    pub outcome: Option<CollectionOutcome>,
    /// Per-page contributions
    pub pages: Vec<PageRecord>,
    /// Duplicate sightings
    pub duplicates: Vec<DuplicateSighting>,
    /// Blank ids skipped
    pub blank_ids: usize,
    /// Ids of the last page when exhausted
    pub exhaustion_snapshot: Option<Vec<String>>,
}

impl CollectionRun {
    /// Empty run aiming for `target_count` items
    #[must_use]
    pub fn new(target_count: usize) -> Self {
        Self {
            target_count,
            ..Self::default()
        }
    }

    /// Whether the target has been reached
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.items.len() >= self.target_count
    }

    /// Items collected
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct ids seen (always equals [`Self::len`])
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen_ids.len()
    }

    /// Collected ids in order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.id.as_str())
    }

    /// Scan one listed page as page number `page`.
    ///
    /// Unseen ids are appended until the target is reached; the rest of the page
    /// is left unscanned.
    pub fn absorb(
        &mut self,
        page: usize,
        listed: &[PageItem],
        transition_observed: Option<bool>,
    ) -> PageRecord {
        let mut record = PageRecord {
            page,
            listed: listed.len(),
            new_items: 0,
            duplicates: 0,
            blank_ids: 0,
            transition_observed,
        };

        for entry in listed {
            if self.is_complete() {
                break;
            }
            let id = entry.id.trim();
            if id.is_empty() {
                record.blank_ids += 1;
                continue;
            }
            if let Some(&index) = self.seen_ids.get(id) {
                record.duplicates += 1;
                let first_page = self
                    .pages
                    .iter()
                    .scan(0, |collected, p| {
                        *collected += p.new_items;
                        Some((p.page, *collected))
                    })
                    .find(|(_, collected)| *collected > index)
                    .map_or(page, |(p, _)| p);
                debug!(id, first_page, page, "duplicate id absorbed");
                self.duplicates.push(DuplicateSighting {
                    id: id.to_string(),
                    first_page,
                    page,
                    position: index + 1,
                });
                continue;
            }

            let position = self.items.len() + 1;
            self.seen_ids.insert(id.to_string(), self.items.len());
            self.items.push(RawItem::new(
                id,
                entry.raw_text.trim(),
                entry.raw_timestamp_attr.clone(),
                position,
            ));
            record.new_items += 1;
        }

        self.blank_ids += record.blank_ids;
        self.pages.push(record);
        record
    }

    fn finish(&mut self, outcome: CollectionOutcome) {
        self.outcome = Some(outcome);
    }
}

// =============================================================================
// COLLECTOR
// =============================================================================

/// Drives a [`PageDriver`] to build a [`CollectionRun`]
#[derive(Debug, Clone, Default)]
pub struct Collector {
    config: CollectorConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl Collector {
    /// Create a collector
    #[must_use]
    pub const fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            limiter: None,
        }
    }

    /// Pace remote driver calls through `limiter`
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collect up to `target_count` unique items
    pub async fn collect(&self, driver: &mut dyn PageDriver) -> FeedcheckResult<CollectionRun> {
        let mut run = CollectionRun::new(self.config.target_count);
        self.collect_into(driver, &mut run).await?;
        Ok(run)
    }

    /// Collect into an existing run.
    ///
    /// `run` is updated page by page, so if this future is dropped early the
    /// items gathered so far remain available to the caller.
    pub async fn collect_into(
        &self,
        driver: &mut dyn PageDriver,
        run: &mut CollectionRun,
    ) -> FeedcheckResult<()> {
        let mut pending: Option<Vec<PageItem>> = None;
        let mut transition_observed = None;

        let outcome = loop {
            let listed = match pending.take() {
                Some(listed) => listed,
                None => self.list(driver).await?,
            };
            run.pages_visited += 1;
            let record = run.absorb(run.pages_visited, &listed, transition_observed);
            info!(
                page = record.page,
                listed = record.listed,
                new_items = record.new_items,
                duplicates = record.duplicates,
                collected = run.len(),
                target = run.target_count,
                "page collected"
            );

            if run.is_complete() {
                break CollectionOutcome::Complete;
            }

            // Only listings reached through an activation count as no-progress
            if record.new_items > 0 {
                run.exhaustion_attempts = 0;
            } else if run.page_advances > 0 {
                run.exhaustion_attempts += 1;
                if run.exhaustion_attempts >= self.config.max_exhaustion_attempts {
                    run.exhaustion_snapshot = Some(
                        listed
                            .iter()
                            .take(SNAPSHOT_LEN)
                            .map(|item| item.id.clone())
                            .collect(),
                    );
                    warn!(
                        attempts = run.exhaustion_attempts,
                        collected = run.len(),
                        "pagination exhausted"
                    );
                    break CollectionOutcome::Exhausted;
                }
            }

            if self
                .config
                .max_pages
                .is_some_and(|max| run.pages_visited >= max)
            {
                warn!(pages = run.pages_visited, "page limit reached");
                break CollectionOutcome::PageLimit;
            }

            if !self.has_next(driver).await? {
                info!(collected = run.len(), "no next page control");
                break CollectionOutcome::NoNextPage;
            }

            self.activate(driver).await?;
            run.page_advances += 1;

            let previous_first = listed.first().map(|item| item.id.clone());
            let (next, observed) = self.await_transition(driver, previous_first).await?;
            pending = Some(next);
            transition_observed = Some(observed);
        };

        run.finish(outcome);
        Ok(())
    }

    /// Wait until the first listed id differs from `previous_first`, or the
    /// transition timeout elapses. Returns the last listing seen.
    async fn await_transition(
        &self,
        driver: &mut dyn PageDriver,
        previous_first: Option<String>,
    ) -> FeedcheckResult<(Vec<PageItem>, bool)> {
        let timeout = self.config.transition_timeout;
        driver.wait_for_page_transition(timeout).await?;

        let deadline = Instant::now().checked_add(timeout);
        loop {
            let listed = self.list(driver).await?;
            let first = listed.first().map(|item| item.id.as_str());
            if first != previous_first.as_deref() {
                return Ok((listed, true));
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "page transition not observed, continuing"
                );
                return Ok((listed, false));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn list(&self, driver: &mut dyn PageDriver) -> FeedcheckResult<Vec<PageItem>> {
        match self.remote_limiter(driver) {
            Some(limiter) => {
                limiter
                    .paced(self.config.page_delay, driver.list_current_page_items())
                    .await
            }
            None => driver.list_current_page_items().await,
        }
    }

    async fn has_next(&self, driver: &mut dyn PageDriver) -> FeedcheckResult<bool> {
        match self.remote_limiter(driver) {
            Some(limiter) => {
                limiter
                    .paced(self.config.page_delay, driver.has_next_page_control())
                    .await
            }
            None => driver.has_next_page_control().await,
        }
    }

    async fn activate(&self, driver: &mut dyn PageDriver) -> FeedcheckResult<()> {
        match self.remote_limiter(driver) {
            Some(limiter) => {
                limiter
                    .paced(self.config.page_delay, driver.activate_next_page_control())
                    .await
            }
            None => driver.activate_next_page_control().await,
        }
    }

    fn remote_limiter(&self, driver: &dyn PageDriver) -> Option<&RateLimiter> {
        self.limiter.as_deref().filter(|_| driver.is_remote())
    }
}
