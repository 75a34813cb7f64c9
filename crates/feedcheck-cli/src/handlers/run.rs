//! Run command handler

use crate::config::{CliConfig, Settings};
use crate::error::{CliError, CliResult};
use crate::output::{render_report, ProgressReporter};
use crate::RunArgs;
use feedcheck::{
    ItemLookup, JsonFileSink, ListingFixture, LookupResponse, Orchestrator, OrderingStatus,
    PageDriver, RateLimiter, ResultSink, RunReport, ScriptedLookup, ScriptedPageDriver,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Page size of `--synthetic` listings
pub const SYNTHETIC_PAGE_SIZE: usize = 30;

/// Offline listing plus canned lookup answers.
///
/// ```json
/// {
///   "pages": [[{"id": "2", "rawText": "b", "rawTimestampAttr": null}]],
///   "stickyLastPage": false,
///   "lookups": {"2": 1704067200},
///   "lookupResponses": {"3": [{"ok": false, "statusCode": 503}]}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureFile {
    /// Pages and pagination behaviour
    #[serde(flatten)]
    pub listing: ListingFixture,
    /// Item creation times, epoch seconds
    #[serde(default)]
    pub lookups: BTreeMap<String, i64>,
    /// Scripted response sequences, served before `lookups`
    #[serde(default)]
    pub lookup_responses: BTreeMap<String, Vec<LookupResponse>>,
}

impl FixtureFile {
    /// Parse fixture JSON
    pub fn from_json(json: &str) -> CliResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CliError::invalid_argument(format!("invalid fixture: {e}")))
    }

    /// Load a fixture from disk
    pub fn load(path: &Path) -> CliResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CliError::invalid_argument(format!("cannot read fixture {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Scripted lookup answering from this fixture
    #[must_use]
    pub fn lookup(&self) -> ScriptedLookup {
        let lookup = ScriptedLookup::new();
        for (id, responses) in &self.lookup_responses {
            for response in responses {
                lookup.push(id.clone(), response.clone());
            }
        }
        for (id, time) in &self.lookups {
            lookup.push(id.clone(), LookupResponse::found(*time));
        }
        lookup
    }
}

/// Where the listing comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSource {
    /// JSON fixture on disk
    Fixture(PathBuf),
    /// Generated well-ordered listing
    Synthetic(usize),
    /// Live Hacker News `newstories`
    Live,
}

impl ListingSource {
    /// Source selected by the run flags
    #[must_use]
    pub fn from_args(args: &RunArgs) -> Self {
        match (&args.fixture, args.synthetic) {
            (Some(path), _) => Self::Fixture(path.clone()),
            (None, Some(total)) => Self::Synthetic(total),
            (None, None) => Self::Live,
        }
    }
}

type Collaborators = (Box<dyn PageDriver>, Arc<dyn ItemLookup>);

/// Page driver and item lookup for `source`
pub fn build_collaborators(
    source: &ListingSource,
    settings: &Settings,
) -> CliResult<Collaborators> {
    match source {
        ListingSource::Fixture(path) => {
            let fixture = FixtureFile::load(path)?;
            let lookup = fixture.lookup();
            Ok((
                Box::new(ScriptedPageDriver::from_fixture(fixture.listing)),
                Arc::new(lookup),
            ))
        }
        ListingSource::Synthetic(total) => Ok((
            Box::new(ScriptedPageDriver::synthetic(*total, SYNTHETIC_PAGE_SIZE)),
            Arc::new(ScriptedLookup::new()),
        )),
        ListingSource::Live => live_collaborators(settings),
    }
}

#[cfg(feature = "hn")]
fn live_collaborators(settings: &Settings) -> CliResult<Collaborators> {
    Ok((
        Box::new(feedcheck::HnListingDriver::new(settings.api_base.as_str())),
        Arc::new(feedcheck::HnItemLookup::new(settings.api_base.as_str())),
    ))
}

#[cfg(not(feature = "hn"))]
fn live_collaborators(_settings: &Settings) -> CliResult<Collaborators> {
    Err(CliError::invalid_argument(
        "live listing needs the `hn` feature; use --fixture or --synthetic",
    ))
}

/// Process exit code for a finished run.
///
/// 0 ordered, 1 violated, 2 inconclusive (or incomplete when `require_complete`).
#[must_use]
pub fn exit_code(report: &RunReport, require_complete: bool) -> u8 {
    match report.status() {
        OrderingStatus::Violated => 1,
        OrderingStatus::Inconclusive => 2,
        OrderingStatus::Ordered if require_complete && !report.is_complete() => 2,
        OrderingStatus::Ordered => 0,
    }
}

/// Execute the run command, returning the process exit code
pub fn execute_run(config: &CliConfig, settings: Settings, args: &RunArgs) -> CliResult<u8> {
    let settings = settings.apply(args);
    let source = ListingSource::from_args(args);
    let (mut driver, lookup) = build_collaborators(&source, &settings)?;
    let limiter = Arc::new(RateLimiter::with_file(&settings.state_file));
    let orchestrator = Orchestrator::new(settings.run_config(), lookup, limiter)?;

    info!(source = ?source, target = settings.target_count, "starting run");
    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.start_spinner(&format!("Sampling {} items", settings.target_count));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::run_execution(format!("failed to create runtime: {e}")))?;
    let result = rt.block_on(orchestrator.run(driver.as_mut()));
    reporter.finish();
    let report = result?;

    if let Some(path) = &args.output {
        JsonFileSink::new(path)
            .publish(&report)
            .map_err(|e| CliError::export(format!("{}: {e}", path.display())))?;
        reporter.info(&format!("Report written to {}", path.display()));
    }

    print!("{}", render_report(&report, args.format.into())?);
    reporter.verdict(&report);
    if args.require_complete {
        if let Err(e) = report.require_complete() {
            reporter.warning(&e.to_string());
        }
    }

    Ok(exit_code(&report, args.require_complete))
}
