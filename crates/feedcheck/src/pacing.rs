//! Cross-run rate limiter.
//!
//! Paces calls against the upstream using a small shared record
//! `{lastRunEndTime, runsCompleted}`. The record can live in a JSON file so that
//! cooperating processes observe each other's completions.
//!
//! Pacing is advisory. Reading and updating the record is not atomic across
//! independent callers: two callers that read the same stale record may both
//! proceed without waiting the full delay. Persistence failures never abort the
//! caller; the limiter falls back to its process-local copy of the record.
//!
//! ```text
//!   await_turn(min_delay)           record_completion()
//!   ┌─────────────────────┐         ┌────────────────────────┐
//!   │ elapsed = now - end │  call   │ end = now              │
//!   │ sleep(min - elapsed)│ ──────► │ runs_completed += 1    │
//!   └─────────────────────┘         └────────────────────────┘
//! ```

use crate::result::{FeedcheckError, FeedcheckResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default file name for persisted pacing state
pub const DEFAULT_STATE_FILE: &str = ".feedcheck-state.json";

/// Shared pacing record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingState {
    /// End of the previously paced call, epoch milliseconds
    pub last_run_end_time: u64,
    /// Number of paced calls completed
    pub runs_completed: u64,
}

impl PacingState {
    /// State after one more completion at `now_ms`
    #[must_use]
    pub const fn completed_at(self, now_ms: u64) -> Self {
        Self {
            last_run_end_time: now_ms,
            runs_completed: self.runs_completed + 1,
        }
    }
}

/// How long a caller must wait before a paced call may start.
///
/// The first call ever (`runs_completed == 0`) never waits.
#[must_use]
pub fn required_wait(state: &PacingState, now_ms: u64, min_delay: Duration) -> Duration {
    if state.runs_completed == 0 {
        return Duration::ZERO;
    }
    let elapsed = Duration::from_millis(now_ms.saturating_sub(state.last_run_end_time));
    min_delay.saturating_sub(elapsed)
}

// =============================================================================
// STORES
// =============================================================================

/// Persistence for the pacing record
pub trait PacingStore: Send + Sync + fmt::Debug {
    /// Read the current record
    fn load(&self) -> FeedcheckResult<PacingState>;

    /// Overwrite the record
    fn save(&self, state: &PacingState) -> FeedcheckResult<()>;

    /// Discard the record (fresh start)
    fn clear(&self) -> FeedcheckResult<()>;
}

/// JSON file store shared between processes
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PacingStore for FileStore {
    fn load(&self) -> FeedcheckResult<PacingState> {
        if !self.path.exists() {
            return Ok(PacingState::default());
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            FeedcheckError::pacing(format!("{}: {e}", self.path.display()))
        })
    }

    fn save(&self, state: &PacingState) -> FeedcheckResult<()> {
        let content = serde_json::to_string(state)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> FeedcheckResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PacingState>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `state`
    #[must_use]
    pub fn with_state(state: PacingState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl PacingStore for MemoryStore {
    fn load(&self) -> FeedcheckResult<PacingState> {
        Ok(*self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn save(&self, state: &PacingState) -> FeedcheckResult<()> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = *state;
        Ok(())
    }

    fn clear(&self) -> FeedcheckResult<()> {
        self.save(&PacingState::default())
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Wall clock returning epoch milliseconds
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Current wall-clock time in epoch milliseconds
#[must_use]
pub fn system_now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Advisory rate limiter over a [`PacingStore`]
pub struct RateLimiter {
    store: Arc<dyn PacingStore>,
    local: Mutex<PacingState>,
    clock: Clock,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("store", &self.store)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter over `store` using the system clock
    #[must_use]
    pub fn new(store: Arc<dyn PacingStore>) -> Self {
        Self {
            store,
            local: Mutex::new(PacingState::default()),
            clock: Arc::new(system_now_ms),
        }
    }

    /// Limiter with process-local state only
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Limiter sharing state through a JSON file
    #[must_use]
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current record, falling back to the local copy when the store fails
    pub fn state(&self) -> PacingState {
        match self.store.load() {
            Ok(state) => {
                *self.local_guard() = state;
                state
            }
            Err(e) => {
                warn!(error = %e, "pacing state unreadable, using process-local state");
                *self.local_guard()
            }
        }
    }

    /// Wait until at least `min_delay` has elapsed since the previous completion.
    ///
    /// Returns how long the caller was suspended.
    pub async fn await_turn(&self, min_delay: Duration) -> Duration {
        let state = self.state();
        let wait = required_wait(&state, (self.clock)(), min_delay);
        if wait.is_zero() {
            debug!(runs_completed = state.runs_completed, "pacing: proceeding immediately");
        } else {
            info!(
                wait_ms = wait.as_millis() as u64,
                runs_completed = state.runs_completed,
                "pacing: waiting before next call"
            );
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Record that a paced call has completed
    pub fn record_completion(&self) {
        let next = self.state().completed_at((self.clock)());
        *self.local_guard() = next;
        if let Err(e) = self.store.save(&next) {
            warn!(error = %e, "pacing state not persisted, continuing with process-local state");
        }
    }

    /// Run `call` between [`Self::await_turn`] and [`Self::record_completion`]
    pub async fn paced<F, T>(&self, min_delay: Duration, call: F) -> T
    where
        F: Future<Output = T>,
    {
        self.await_turn(min_delay).await;
        let output = call.await;
        self.record_completion();
        output
    }

    /// Discard the shared record
    pub fn reset(&self) -> FeedcheckResult<()> {
        *self.local_guard() = PacingState::default();
        self.store.clear()
    }

    fn local_guard(&self) -> std::sync::MutexGuard<'_, PacingState> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const T0: u64 = 1_700_000_000_000;

    fn fixed_clock(now_ms: u64) -> Clock {
        Arc::new(move || now_ms)
    }

    fn seeded(state: PacingState, now_ms: u64) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::with_state(state))).with_clock(fixed_clock(now_ms))
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl PacingStore for BrokenStore {
        fn load(&self) -> FeedcheckResult<PacingState> {
            Err(FeedcheckError::pacing("disk on fire"))
        }

        fn save(&self, _state: &PacingState) -> FeedcheckResult<()> {
            Err(FeedcheckError::pacing("disk on fire"))
        }

        fn clear(&self) -> FeedcheckResult<()> {
            Err(FeedcheckError::pacing("disk on fire"))
        }
    }

    mod required_wait_tests {
        use super::*;

        #[test]
        fn test_first_call_never_waits() {
            let state = PacingState {
                last_run_end_time: T0,
                runs_completed: 0,
            };
            assert_eq!(
                required_wait(&state, T0, Duration::from_millis(8000)),
                Duration::ZERO
            );
        }

        #[test]
        fn test_waits_for_remaining_delay() {
            let state = PacingState {
                last_run_end_time: T0,
                runs_completed: 1,
            };
            assert_eq!(
                required_wait(&state, T0 + 3000, Duration::from_millis(8000)),
                Duration::from_millis(5000)
            );
        }

        #[test]
        fn test_no_wait_after_delay_elapsed() {
            let state = PacingState {
                last_run_end_time: T0,
                runs_completed: 1,
            };
            assert_eq!(
                required_wait(&state, T0 + 9000, Duration::from_millis(8000)),
                Duration::ZERO
            );
        }

        #[test]
        fn test_clock_behind_record_waits_full_delay() {
            let state = PacingState {
                last_run_end_time: T0,
                runs_completed: 4,
            };
            assert_eq!(
                required_wait(&state, T0 - 500, Duration::from_millis(600)),
                Duration::from_millis(600)
            );
        }
    }

    mod limiter_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_await_turn_suspends_caller() {
            let limiter = seeded(
                PacingState {
                    last_run_end_time: T0,
                    runs_completed: 1,
                },
                T0 + 3000,
            );

            let start = tokio::time::Instant::now();
            let waited = limiter.await_turn(Duration::from_millis(8000)).await;

            assert_eq!(waited, Duration::from_millis(5000));
            assert!(start.elapsed() >= Duration::from_millis(5000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_await_turn_proceeds_when_delay_elapsed() {
            let limiter = seeded(
                PacingState {
                    last_run_end_time: T0,
                    runs_completed: 1,
                },
                T0 + 9000,
            );

            let start = tokio::time::Instant::now();
            let waited = limiter.await_turn(Duration::from_millis(8000)).await;

            assert_eq!(waited, Duration::ZERO);
            assert!(start.elapsed() < Duration::from_millis(1));
        }

        #[test]
        fn test_record_completion_updates_state() {
            let limiter = seeded(PacingState::default(), T0);
            limiter.record_completion();
            limiter.record_completion();

            let state = limiter.state();
            assert_eq!(state.runs_completed, 2);
            assert_eq!(state.last_run_end_time, T0);
        }

        #[tokio::test]
        async fn test_paced_records_completion() {
            let limiter = seeded(PacingState::default(), T0);
            let value = limiter.paced(Duration::from_millis(10), async { 42 }).await;

            assert_eq!(value, 42);
            assert_eq!(limiter.state().runs_completed, 1);
        }

        #[test]
        fn test_broken_store_degrades_to_local_state() {
            let limiter = RateLimiter::new(Arc::new(BrokenStore)).with_clock(fixed_clock(T0));
            limiter.record_completion();

            let state = limiter.state();
            assert_eq!(state.runs_completed, 1);
            assert_eq!(state.last_run_end_time, T0);
        }
    }

    mod file_store_tests {
        use super::*;

        #[test]
        fn test_missing_file_is_fresh_start() {
            let dir = TempDir::new().unwrap();
            let store = FileStore::new(dir.path().join("state.json"));
            assert_eq!(store.load().unwrap(), PacingState::default());
        }

        #[test]
        fn test_state_shared_between_limiters() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("state.json");

            let first = RateLimiter::with_file(&path).with_clock(fixed_clock(T0));
            first.record_completion();

            let second = RateLimiter::with_file(&path).with_clock(fixed_clock(T0 + 100));
            let state = second.state();
            assert_eq!(state.runs_completed, 1);
            assert_eq!(state.last_run_end_time, T0);
        }

        #[test]
        fn test_file_uses_camel_case_record() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("state.json");
            FileStore::new(&path)
                .save(&PacingState {
                    last_run_end_time: 12,
                    runs_completed: 3,
                })
                .unwrap();

            let content = fs::read_to_string(&path).unwrap();
            assert!(content.contains("\"lastRunEndTime\":12"));
            assert!(content.contains("\"runsCompleted\":3"));
        }

        #[test]
        fn test_reset_removes_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("state.json");
            let limiter = RateLimiter::with_file(&path).with_clock(fixed_clock(T0));
            limiter.record_completion();
            assert!(path.exists());

            limiter.reset().unwrap();
            assert!(!path.exists());
            assert_eq!(limiter.state(), PacingState::default());
        }

        #[test]
        fn test_corrupt_file_is_reported() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("state.json");
            fs::write(&path, "{not json").unwrap();

            let err = FileStore::new(&path).load().unwrap_err();
            assert!(matches!(err, FeedcheckError::PacingState { .. }));
        }
    }
}
