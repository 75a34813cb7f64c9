//! Hacker News collaborators backed by the public Firebase API.
//!
//! - [`HnItemLookup`]: `GET {base}/item/{id}.json`, reading the `time` field.
//! - [`HnListingDriver`]: pages the `GET {base}/newstories.json` id list
//!   [`HN_PAGE_SIZE`] at a time, fetching each item to rebuild the listing's
//!   inline `"<iso> <epoch>"` age attribute.

use crate::driver::{PageDriver, PageItem};
use crate::lookup::{ItemLookup, LookupResponse};
use crate::result::{FeedcheckError, FeedcheckResult};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Public API root
pub const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

/// Items per listing page on the site
pub const HN_PAGE_SIZE: usize = 30;

/// Per-request timeout
pub const HN_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Item fields the pipeline reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HnItem {
    /// Item id
    pub id: u64,
    /// Creation time, epoch seconds
    #[serde(default)]
    pub time: Option<i64>,
    /// Story title
    #[serde(default)]
    pub title: Option<String>,
}

fn build_client() -> reqwest::Client {
    client_or_default(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(HN_REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("feedcheck/", env!("CARGO_PKG_VERSION")))
            .build(),
    )
}

/// Built client, or a default one (no request timeout, stock user agent)
fn client_or_default(built: reqwest::Result<reqwest::Client>) -> reqwest::Client {
    built.unwrap_or_else(|e| {
        warn!(error = %e, "HTTP client builder failed, falling back to defaults");
        reqwest::Client::new()
    })
}

/// URL of item `id` under `base`
#[must_use]
pub fn item_url(base: &str, id: &str) -> String {
    format!("{}/item/{}.json", base.trim_end_matches('/'), id.trim())
}

/// Classify an item response body
#[must_use]
pub fn parse_item_body(status: u16, body: &str) -> LookupResponse {
    if !(200..300).contains(&status) {
        return LookupResponse::status(status);
    }
    match serde_json::from_str::<Option<HnItem>>(body) {
        Ok(Some(item)) => match item.time {
            Some(time) => LookupResponse::found(time),
            None => LookupResponse::without_time(),
        },
        // The API answers `null` for unknown ids
        Ok(None) => LookupResponse::status(404),
        Err(e) => LookupResponse {
            error: Some(format!("invalid item body: {e}")),
            ..LookupResponse::without_time()
        },
    }
}

/// Listing attribute in the site's `"<iso> <epoch>"` form
#[must_use]
pub fn timestamp_attr(epoch_seconds: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(epoch_seconds, 0)
        .map(|dt| format!("{} {epoch_seconds}", dt.format("%Y-%m-%dT%H:%M:%S")))
}

// =============================================================================
// ITEM LOOKUP
// =============================================================================

/// Remote item lookup against the Hacker News API
#[derive(Debug, Clone)]
pub struct HnItemLookup {
    base_url: String,
    client: reqwest::Client,
}

impl Default for HnItemLookup {
    fn default() -> Self {
        Self::new(HN_API_BASE)
    }
}

impl HnItemLookup {
    /// Lookup against `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, build_client())
    }

    /// Lookup with a custom reqwest client
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// API root
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ItemLookup for HnItemLookup {
    async fn fetch_item(&self, id: &str) -> LookupResponse {
        let url = item_url(&self.base_url, id);
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => return LookupResponse::network_error(e.to_string()),
        };
        let status = resp.status().as_u16();
        match resp.text().await {
            Ok(body) => parse_item_body(status, &body),
            Err(e) => LookupResponse::network_error(e.to_string()),
        }
    }
}

// =============================================================================
// LISTING DRIVER
// =============================================================================

/// Listing driver paging the `newstories` id list
#[derive(Debug)]
pub struct HnListingDriver {
    base_url: String,
    client: reqwest::Client,
    page_size: usize,
    page: usize,
    ids: Option<Vec<u64>>,
    cache: Option<(usize, Vec<PageItem>)>,
}

impl Default for HnListingDriver {
    fn default() -> Self {
        Self::new(HN_API_BASE)
    }
}

impl HnListingDriver {
    /// Driver against `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(),
            page_size: HN_PAGE_SIZE,
            page: 0,
            ids: None,
            cache: None,
        }
    }

    async fn ids(&mut self) -> FeedcheckResult<&[u64]> {
        if self.ids.is_none() {
            let url = format!("{}/newstories.json", self.base_url);
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| FeedcheckError::driver(format!("{url}: {e}")))?;
            if !resp.status().is_success() {
                return Err(FeedcheckError::driver(format!(
                    "{url}: HTTP {}",
                    resp.status().as_u16()
                )));
            }
            let ids: Vec<u64> = resp
                .json()
                .await
                .map_err(|e| FeedcheckError::driver(format!("{url}: {e}")))?;
            debug!(count = ids.len(), "newstories id list loaded");
            self.ids = Some(ids);
        }
        Ok(self.ids.as_deref().unwrap_or_default())
    }

    async fn fetch_listing_item(&self, id: u64) -> PageItem {
        let url = item_url(&self.base_url, &id.to_string());
        let item = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                resp.json::<Option<HnItem>>().await.ok().flatten()
            }
            Ok(resp) => {
                debug!(id, status = resp.status().as_u16(), "listing item unavailable");
                None
            }
            Err(e) => {
                warn!(id, error = %e, "listing item fetch failed");
                None
            }
        };
        let item = item.unwrap_or_default();
        PageItem::new(
            id.to_string(),
            item.title.unwrap_or_default(),
            item.time.and_then(timestamp_attr),
        )
    }
}

/// Slice of `ids` shown on 0-based `page`
#[must_use]
pub fn page_slice(ids: &[u64], page: usize, page_size: usize) -> &[u64] {
    let start = page.saturating_mul(page_size).min(ids.len());
    let end = start.saturating_add(page_size).min(ids.len());
    &ids[start..end]
}

#[async_trait]
impl PageDriver for HnListingDriver {
    async fn list_current_page_items(&mut self) -> FeedcheckResult<Vec<PageItem>> {
        if let Some((page, items)) = &self.cache {
            if *page == self.page {
                return Ok(items.clone());
            }
        }
        let (page, page_size) = (self.page, self.page_size);
        let slice = page_slice(self.ids().await?, page, page_size).to_vec();
        let items = join_all(slice.into_iter().map(|id| self.fetch_listing_item(id))).await;
        self.cache = Some((page, items.clone()));
        Ok(items)
    }

    async fn has_next_page_control(&mut self) -> FeedcheckResult<bool> {
        let next_start = (self.page + 1).saturating_mul(self.page_size);
        Ok(next_start < self.ids().await?.len())
    }

    async fn activate_next_page_control(&mut self) -> FeedcheckResult<()> {
        if !self.has_next_page_control().await? {
            return Err(FeedcheckError::driver("no more pages in newstories"));
        }
        self.page += 1;
        Ok(())
    }

    async fn wait_for_page_transition(&mut self, _timeout: Duration) -> FeedcheckResult<()> {
        Ok(())
    }

    fn is_remote(&self) -> bool {
        true
    }
}
