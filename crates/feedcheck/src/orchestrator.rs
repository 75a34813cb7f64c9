//! Run Orchestrator
//!
//! Wires the pipeline for one run and bounds it with a single deadline:
//!
//! ```text
//!  await_turn(run_delay)
//!        │
//!        ▼  ┌───────────── deadline (run_timeout) ─────────────┐
//!        │  │ collect ──► resolve locally ──► remote fallback  │
//!        │  └──────────────────────────────────────────────────┘
//!        ▼
//!     verify ──► diagnostics ──► record_completion ──► RunReport
//! ```
//!
//! On deadline expiry the in-flight work is dropped, whatever was collected and
//! resolved so far is verified, and the verdict is forced to `INCONCLUSIVE`
//! with a `RunTimeout` diagnostic. Only driver failures and invalid
//! configuration are returned as errors.

use crate::collector::{CollectionOutcome, CollectionRun, Collector, CollectorConfig};
use crate::diagnostics::{item_diagnostics, Diagnostic, DiagnosticKind, SourceBreakdown};
use crate::driver::PageDriver;
use crate::lookup::ItemLookup;
use crate::model::ResolvedItem;
use crate::pacing::RateLimiter;
use crate::report::{CollectionSummary, LookupSummary, RunReport};
use crate::resolver::{resolve_all, Resolver, ResolverConfig};
use crate::result::{FeedcheckError, FeedcheckResult};
use crate::verifier::{verify, OrderingStatus, VerificationReport, DEFAULT_COVERAGE_THRESHOLD};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Default overall run timeout (180 seconds)
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 180_000;

/// Default pacing delay between runs (8 seconds)
pub const DEFAULT_RUN_DELAY_MS: u64 = 8_000;

/// Configuration for one run
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// Collector settings
    pub collector: CollectorConfig,
    /// Resolver settings
    pub resolver: ResolverConfig,
    /// Minimum coverage for ordering to be judged
    pub coverage_threshold: f64,
    /// Deadline for collection and resolution
    pub run_timeout: Duration,
    /// Minimum gap after the previous paced call before the run starts
    pub run_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            resolver: ResolverConfig::default(),
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            run_timeout: Duration::from_millis(DEFAULT_RUN_TIMEOUT_MS),
            run_delay: Duration::from_millis(DEFAULT_RUN_DELAY_MS),
        }
    }
}

impl RunConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set collector settings
    #[must_use]
    pub const fn with_collector(mut self, collector: CollectorConfig) -> Self {
        self.collector = collector;
        self
    }

    /// Set resolver settings
    #[must_use]
    pub const fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set coverage threshold
    #[must_use]
    pub const fn with_coverage_threshold(mut self, threshold: f64) -> Self {
        self.coverage_threshold = threshold;
        self
    }

    /// Set run timeout
    #[must_use]
    pub const fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Set run pacing delay
    #[must_use]
    pub const fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> FeedcheckResult<()> {
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(FeedcheckError::invalid_config(format!(
                "coverage threshold {} outside [0, 1]",
                self.coverage_threshold
            )));
        }
        if self.collector.target_count == 0 {
            return Err(FeedcheckError::invalid_config("target count must be positive"));
        }
        if self.collector.max_exhaustion_attempts == 0 {
            return Err(FeedcheckError::invalid_config(
                "max exhaustion attempts must be positive",
            ));
        }
        if self.resolver.batch_size == 0 {
            return Err(FeedcheckError::invalid_config("batch size must be positive"));
        }
        if self.collector.max_pages == Some(0) {
            return Err(FeedcheckError::invalid_config("max pages must be positive"));
        }
        Ok(())
    }
}

/// Runs collect, resolve and verify against one driver
#[derive(Debug)]
pub struct Orchestrator {
    config: RunConfig,
    limiter: Arc<RateLimiter>,
    collector: Collector,
    resolver: Resolver,
}

impl Orchestrator {
    /// Create an orchestrator; fails on invalid configuration
    pub fn new(
        config: RunConfig,
        lookup: Arc<dyn ItemLookup>,
        limiter: Arc<RateLimiter>,
    ) -> FeedcheckResult<Self> {
        config.validate()?;
        Ok(Self {
            collector: Collector::new(config.collector).with_limiter(limiter.clone()),
            resolver: Resolver::new(lookup, limiter.clone(), config.resolver),
            config,
            limiter,
        })
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute one run
    pub async fn run(&self, driver: &mut dyn PageDriver) -> FeedcheckResult<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();
        info!(%run_id, target = self.config.collector.target_count, "run starting");

        self.limiter.await_turn(self.config.run_delay).await;

        let mut run = CollectionRun::new(self.config.collector.target_count);
        let mut resolved: Vec<ResolvedItem> = Vec::new();
        let mut lookups = Vec::new();

        let work = async {
            self.collector.collect_into(driver, &mut run).await?;
            resolved = resolve_all(&run.items);
            self.resolver
                .fill_missing(&mut resolved, self.config.resolver.batch_size, &mut lookups)
                .await;
            Ok::<_, FeedcheckError>(())
        };
        // A deadline past the clock's range never fires
        let phase = match Instant::now().checked_add(self.config.run_timeout) {
            Some(deadline) => tokio::time::timeout_at(deadline, work).await,
            None => Ok(work.await),
        };

        let timed_out = match phase {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                warn!(%run_id, error = %e, "run aborted");
                self.limiter.record_completion();
                return Err(e);
            }
            Err(_) => {
                warn!(
                    %run_id,
                    timeout_ms = self.config.run_timeout.as_millis() as u64,
                    collected = run.len(),
                    "run deadline expired"
                );
                true
            }
        };
        if resolved.len() != run.items.len() {
            resolved = resolve_all(&run.items);
        }

        let breakdown = SourceBreakdown::tally(&resolved);
        let dom_coverage = if resolved.is_empty() {
            0.0
        } else {
            breakdown.dom() as f64 / resolved.len() as f64
        };

        let mut verification = verify(resolved, self.config.coverage_threshold);
        if timed_out {
            verification.mark_inconclusive();
        }
        let diagnostics = self.run_diagnostics(&run, &verification, timed_out);

        self.limiter.record_completion();

        let report = RunReport {
            run_id,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            lookup_summary: LookupSummary::from_lookups(&lookups),
            lookups,
            collection: CollectionSummary::from(run),
            dom_coverage,
            breakdown,
            diagnostics,
            timed_out,
            verification,
        };
        info!(
            run_id = %report.run_id,
            status = %report.status(),
            coverage = report.coverage(),
            collected = report.collection.collected,
            elapsed_ms = report.elapsed_ms,
            "run finished"
        );
        Ok(report)
    }

    fn run_diagnostics(
        &self,
        run: &CollectionRun,
        verification: &VerificationReport,
        timed_out: bool,
    ) -> Vec<Diagnostic> {
        let mut out = Vec::new();

        if timed_out {
            out.push(Diagnostic::run(
                DiagnosticKind::RunTimeout,
                format!(
                    "run exceeded {}ms; verdict forced to INCONCLUSIVE",
                    self.config.run_timeout.as_millis()
                ),
            ));
        }
        if !run.is_complete() {
            out.push(Diagnostic::run(
                DiagnosticKind::CollectionIncomplete,
                format!("collected {} of {} unique items", run.len(), run.target_count),
            ));
        }
        if run.outcome == Some(CollectionOutcome::Exhausted) {
            out.push(Diagnostic::run(
                DiagnosticKind::PaginationExhausted,
                format!(
                    "no new ids after {} consecutive page advances",
                    run.exhaustion_attempts
                ),
            ));
        }

        out.extend(item_diagnostics(&verification.resolved));

        if !verification.coverage_sufficient() {
            out.push(Diagnostic::run(
                DiagnosticKind::CoverageInsufficient,
                format!(
                    "coverage {:.1}% below threshold {:.1}%",
                    verification.coverage * 100.0,
                    verification.coverage_threshold * 100.0
                ),
            ));
        }
        if verification.status == OrderingStatus::Violated {
            out.extend(verification.violations.iter().map(|v| {
                Diagnostic::item(
                    DiagnosticKind::OrderingViolation,
                    v.current.id(),
                    format!(
                        "position {} ({}ms) is older than position {} ({}ms)",
                        v.current.position(),
                        v.current.resolved_epoch_ms.unwrap_or_default(),
                        v.next.position(),
                        v.next.resolved_epoch_ms.unwrap_or_default()
                    ),
                )
            }));
        }
        out
    }
}
