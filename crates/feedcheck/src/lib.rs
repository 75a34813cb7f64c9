//! Feedcheck: Newest-First Ordering Verification for Paginated Listings
//!
//! Samples a fixed number of unique items from a live paginated listing,
//! reconciles each item's timestamp from the inline attribute and a remote
//! per-item lookup, and verifies strict newest-to-oldest order over the
//! resolved timestamps, gated on coverage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator (deadline)                      │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐     ┌────────────┐     ┌────────────┐               │
//! │   │ Collector  │────►│ Resolver   │────►│ Verifier   │──► RunReport  │
//! │   │ (dedupe)   │     │ ISO/EPOCH/ │     │ (coverage  │       │       │
//! │   │            │     │ FALLBACK/  │     │  gated)    │       ▼       │
//! │   └─────┬──────┘     │ API        │     └────────────┘   ResultSink  │
//! │         │            └─────┬──────┘                                  │
//! │         ▼                  ▼                                         │
//! │    PageDriver         ItemLookup                                     │
//! │         └──────┬───────────┘                                         │
//! │                ▼                                                     │
//! │          RateLimiter  ◄──► PacingStore (shared across processes)     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use feedcheck::{Orchestrator, RateLimiter, RunConfig, ScriptedLookup, ScriptedPageDriver};
//! use std::sync::Arc;
//!
//! # async fn demo() -> feedcheck::FeedcheckResult<()> {
//! let orchestrator = Orchestrator::new(
//!     RunConfig::default(),
//!     Arc::new(ScriptedLookup::new()),
//!     Arc::new(RateLimiter::in_memory()),
//! )?;
//! let mut driver = ScriptedPageDriver::synthetic(250, 30);
//! let report = orchestrator.run(&mut driver).await?;
//! println!("{} at {:.0}% coverage", report.status(), report.coverage() * 100.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod collector;
pub mod diagnostics;
pub mod driver;
#[cfg(feature = "hn")]
pub mod hn;
pub mod lookup;
pub mod model;
pub mod orchestrator;
pub mod pacing;
pub mod report;
pub mod resolver;
mod result;
pub mod sink;
pub mod verifier;

pub use collector::{
    CollectionOutcome, CollectionRun, Collector, CollectorConfig, DuplicateSighting, PageRecord,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, SourceBreakdown};
pub use driver::{ListingFixture, PageDriver, PageItem, ScriptedPageDriver};
#[cfg(feature = "hn")]
pub use hn::{HnItemLookup, HnListingDriver, HN_API_BASE, HN_PAGE_SIZE};
pub use lookup::{ItemLookup, LookupFailure, LookupResponse, ScriptedLookup};
pub use model::{RawItem, ResolutionStrategy, ResolvedItem, TimestampSource};
pub use orchestrator::{Orchestrator, RunConfig};
pub use pacing::{
    FileStore, MemoryStore, PacingState, PacingStore, RateLimiter, DEFAULT_STATE_FILE,
};
pub use report::{CollectionSummary, LookupSummary, RunReport};
pub use resolver::{resolve, LookupDiagnostic, Resolver, ResolverConfig};
pub use result::{FeedcheckError, FeedcheckResult};
pub use sink::{JsonFileSink, MemorySink, ResultSink};
pub use verifier::{verify, OrderingStatus, VerificationReport, Violation};
