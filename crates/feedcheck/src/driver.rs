//! PageDriver - Abstract Listing Navigation Trait
//!
//! The collector never touches rendering, selectors or browser lifecycle. It sees
//! a paginated listing through four primitives:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  PageDriver (Abstract Trait)                                         │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  list_current_page_items()     -> [PageItem]                         │
//! │  has_next_page_control()       -> bool                               │
//! │  activate_next_page_control()                                        │
//! │  wait_for_page_transition(timeout)                                   │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ScriptedPageDriver (fixtures, tests)   HnListingDriver (live, hn)   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use crate::result::{FeedcheckError, FeedcheckResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One row of the current listing page, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageItem {
    /// Stable external identifier (may be blank when the row is malformed)
    pub id: String,
    /// Visible title text
    #[serde(default)]
    pub raw_text: String,
    /// Inline timestamp attribute, if present
    #[serde(default)]
    pub raw_timestamp_attr: Option<String>,
}

impl PageItem {
    /// Create a page item
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        raw_text: impl Into<String>,
        raw_timestamp_attr: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            raw_text: raw_text.into(),
            raw_timestamp_attr,
        }
    }
}

/// Abstract driver over a paginated listing
#[async_trait]
pub trait PageDriver: Send {
    /// Items on the current page, in display order
    async fn list_current_page_items(&mut self) -> FeedcheckResult<Vec<PageItem>>;

    /// Whether a "next page" control is available
    async fn has_next_page_control(&mut self) -> FeedcheckResult<bool>;

    /// Activate the "next page" control
    async fn activate_next_page_control(&mut self) -> FeedcheckResult<()>;

    /// Wait for the driver's own notion of a settled page, bounded by `timeout`
    async fn wait_for_page_transition(&mut self, timeout: Duration) -> FeedcheckResult<()>;

    /// Whether calls cross a rate-limited boundary (remote-backed drivers)
    fn is_remote(&self) -> bool {
        false
    }
}

// =============================================================================
// SCRIPTED DRIVER
// =============================================================================

/// Serialized listing: a list of pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFixture {
    /// Pages in navigation order
    pub pages: Vec<Vec<PageItem>>,
    /// Keep offering a next control on the last page, re-serving it on activation
    #[serde(default)]
    pub sticky_last_page: bool,
}

/// In-memory driver replaying a fixed sequence of pages
#[derive(Debug, Default)]
pub struct ScriptedPageDriver {
    pages: Vec<Vec<PageItem>>,
    current: usize,
    sticky_last_page: bool,
    call_history: Vec<String>,
}

impl ScriptedPageDriver {
    /// Driver over `pages`
    #[must_use]
    pub fn new(pages: Vec<Vec<PageItem>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Driver over a fixture
    #[must_use]
    pub fn from_fixture(fixture: ListingFixture) -> Self {
        Self::new(fixture.pages).sticky_last_page(fixture.sticky_last_page)
    }

    /// Load a JSON fixture from disk
    pub fn from_json_file(path: impl AsRef<Path>) -> FeedcheckResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FeedcheckError::fixture(format!("cannot read {}: {e}", path.display()))
        })?;
        let fixture: ListingFixture = serde_json::from_str(&content).map_err(|e| {
            FeedcheckError::fixture(format!("invalid listing in {}: {e}", path.display()))
        })?;
        Ok(Self::from_fixture(fixture))
    }

    /// `total` unique items, `page_size` per page, timestamps newest first.
    ///
    /// Item `n` (0-based) has id `item-{n}` and an inline attribute
    /// `"<iso> <epoch>"` one minute older than item `n - 1`.
    #[must_use]
    pub fn synthetic(total: usize, page_size: usize) -> Self {
        const NEWEST: i64 = 1_704_067_200;
        let items: Vec<PageItem> = (0..total)
            .map(|n| {
                let epoch = NEWEST - (n as i64) * 60;
                let iso = chrono::DateTime::from_timestamp(epoch, 0)
                    .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .unwrap_or_default();
                PageItem::new(
                    format!("item-{n}"),
                    format!("Story {n}"),
                    Some(format!("{iso} {epoch}")),
                )
            })
            .collect();
        Self::new(items.chunks(page_size.max(1)).map(<[PageItem]>::to_vec).collect())
    }

    /// Keep re-serving the last page when advancing past it
    #[must_use]
    pub const fn sticky_last_page(mut self, sticky: bool) -> Self {
        self.sticky_last_page = sticky;
        self
    }

    /// 0-based index of the current page
    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current
    }

    /// Recorded calls, for verification
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Number of recorded calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.call_history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    fn last_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }
}

#[async_trait]
impl PageDriver for ScriptedPageDriver {
    async fn list_current_page_items(&mut self) -> FeedcheckResult<Vec<PageItem>> {
        self.call_history.push(format!("list:{}", self.current));
        Ok(self.pages.get(self.current).cloned().unwrap_or_default())
    }

    async fn has_next_page_control(&mut self) -> FeedcheckResult<bool> {
        self.call_history.push("has_next".to_string());
        Ok(self.current < self.last_index() || (self.sticky_last_page && !self.pages.is_empty()))
    }

    async fn activate_next_page_control(&mut self) -> FeedcheckResult<()> {
        self.call_history.push(format!("activate:{}", self.current));
        if self.current < self.last_index() {
            self.current += 1;
            Ok(())
        } else if self.sticky_last_page {
            Ok(())
        } else {
            Err(FeedcheckError::driver("no next page control on the last page"))
        }
    }

    async fn wait_for_page_transition(&mut self, _timeout: Duration) -> FeedcheckResult<()> {
        self.call_history.push("wait".to_string());
        Ok(())
    }
}
