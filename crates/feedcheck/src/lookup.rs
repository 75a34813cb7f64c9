//! Remote item lookup.
//!
//! Per-item timestamp source used when the inline attribute is missing or
//! unparseable. A lookup never returns an error: transport problems are folded
//! into the response so the resolver can classify and record them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Response of a single lookup call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    /// Whether the call succeeded at the transport/status level
    pub ok: bool,
    /// HTTP-like status code (0 when no response was received)
    pub status_code: u16,
    /// Creation time in epoch seconds, when the item carries one
    pub time_epoch_seconds: Option<i64>,
    /// Transport error text
    pub error: Option<String>,
}

impl LookupResponse {
    /// Successful response carrying a time
    #[must_use]
    pub const fn found(time_epoch_seconds: i64) -> Self {
        Self {
            ok: true,
            status_code: 200,
            time_epoch_seconds: Some(time_epoch_seconds),
            error: None,
        }
    }

    /// Successful response without a time field
    #[must_use]
    pub const fn without_time() -> Self {
        Self {
            ok: true,
            status_code: 200,
            time_epoch_seconds: None,
            error: None,
        }
    }

    /// Non-success status
    #[must_use]
    pub const fn status(status_code: u16) -> Self {
        Self {
            ok: false,
            status_code,
            time_epoch_seconds: None,
            error: None,
        }
    }

    /// No response at all
    #[must_use]
    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status_code: 0,
            time_epoch_seconds: None,
            error: Some(message.into()),
        }
    }

    /// Classify this response: epoch milliseconds or the failure
    pub fn epoch_ms(&self) -> Result<i64, LookupFailure> {
        if let Some(message) = &self.error {
            return Err(LookupFailure::Network(message.clone()));
        }
        if !self.ok {
            return Err(LookupFailure::Status(self.status_code));
        }
        let seconds = self.time_epoch_seconds.ok_or(LookupFailure::MissingTime)?;
        seconds
            .checked_mul(1000)
            .filter(|ms| *ms >= 0)
            .ok_or(LookupFailure::OutOfRange(seconds))
    }
}

/// Why a lookup did not yield a timestamp
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    /// Non-success status code
    #[error("HTTP {0}")]
    Status(u16),
    /// Success response without a time field
    #[error("No time field in lookup response")]
    MissingTime,
    /// No response received
    #[error("Network error: {0}")]
    Network(String),
    /// Time field outside the representable range
    #[error("Time {0} out of range")]
    OutOfRange(i64),
}

impl LookupFailure {
    /// Whether a single retry may help
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::MissingTime | Self::OutOfRange(_) => false,
        }
    }
}

/// Remote per-item lookup
#[async_trait]
pub trait ItemLookup: Send + Sync {
    /// Fetch the item with `id`
    async fn fetch_item(&self, id: &str) -> LookupResponse;
}

// =============================================================================
// SCRIPTED LOOKUP
// =============================================================================

/// Lookup answering from canned responses
///
/// Each id has a queue of responses; the last one repeats once the queue is
/// drained. Unknown ids answer 404.
#[derive(Debug, Default)]
pub struct ScriptedLookup {
    responses: Mutex<HashMap<String, VecDeque<LookupResponse>>>,
    latency: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedLookup {
    /// Empty lookup (every id answers 404)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup answering `time` for each `(id, time)` pair
    #[must_use]
    pub fn from_times<I, S>(times: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let lookup = Self::new();
        for (id, time) in times {
            lookup.push(id, LookupResponse::found(time));
        }
        lookup
    }

    /// Queue a response for `id`
    pub fn push(&self, id: impl Into<String>, response: LookupResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.into())
            .or_default()
            .push_back(response);
    }

    /// Builder form of [`Self::push`]
    #[must_use]
    pub fn with_response(self, id: impl Into<String>, response: LookupResponse) -> Self {
        self.push(id, response);
        self
    }

    /// Simulated per-call latency
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Ids requested so far, in call order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Highest number of concurrently outstanding calls observed
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, id: &str) -> LookupResponse {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = responses.get_mut(id) else {
            return LookupResponse::status(404);
        };
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.unwrap_or_else(|| LookupResponse::status(404))
    }
}

#[async_trait]
impl ItemLookup for ScriptedLookup {
    async fn fetch_item(&self, id: &str) -> LookupResponse {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.next_response(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod classification_tests {
        use super::*;

        #[test]
        fn test_found_converts_to_millis() {
            assert_eq!(
                LookupResponse::found(1_704_067_200).epoch_ms(),
                Ok(1_704_067_200_000)
            );
        }

        #[test]
        fn test_missing_time_is_permanent() {
            let failure = LookupResponse::without_time().epoch_ms().unwrap_err();
            assert_eq!(failure, LookupFailure::MissingTime);
            assert!(!failure.is_transient());
        }

        #[test]
        fn test_status_transience() {
            assert!(LookupFailure::Status(503).is_transient());
            assert!(LookupFailure::Status(429).is_transient());
            assert!(!LookupFailure::Status(404).is_transient());
        }

        #[test]
        fn test_network_error_is_transient() {
            let failure = LookupResponse::network_error("reset by peer")
                .epoch_ms()
                .unwrap_err();
            assert!(failure.is_transient());
            assert_eq!(failure.to_string(), "Network error: reset by peer");
        }

        #[test]
        fn test_out_of_range_time() {
            let failure = LookupResponse::found(i64::MAX).epoch_ms().unwrap_err();
            assert_eq!(failure, LookupFailure::OutOfRange(i64::MAX));
        }
    }

    mod scripted_lookup_tests {
        use super::*;

        #[tokio::test]
        async fn test_unknown_id_is_not_found() {
            let lookup = ScriptedLookup::new();
            assert_eq!(lookup.fetch_item("1").await, LookupResponse::status(404));
        }

        #[tokio::test]
        async fn test_queued_responses_then_repeat_last() {
            let lookup = ScriptedLookup::new()
                .with_response("1", LookupResponse::status(503))
                .with_response("1", LookupResponse::found(10));

            assert_eq!(lookup.fetch_item("1").await, LookupResponse::status(503));
            assert_eq!(lookup.fetch_item("1").await, LookupResponse::found(10));
            assert_eq!(lookup.fetch_item("1").await, LookupResponse::found(10));
            assert_eq!(lookup.calls(), vec!["1", "1", "1"]);
        }

        #[tokio::test]
        async fn test_from_times() {
            let lookup = ScriptedLookup::from_times([("a", 5), ("b", 6)]);
            assert_eq!(lookup.fetch_item("b").await.time_epoch_seconds, Some(6));
        }
    }
}
