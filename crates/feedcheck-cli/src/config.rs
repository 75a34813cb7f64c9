//! CLI configuration
//!
//! Two layers: [`CliConfig`] (presentation, from global flags) and
//! [`Settings`] (run parameters, from an optional `feedcheck.yaml`, overridden
//! by command-line flags).

use crate::commands::RunArgs;
use crate::error::{CliError, CliResult};
use feedcheck::collector::CollectorConfig;
use feedcheck::resolver::ResolverConfig;
use feedcheck::RunConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file looked up in the working directory when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "feedcheck.yaml";

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Log filter used when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// Presentation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }
}

// =============================================================================
// RUN SETTINGS
// =============================================================================

/// Run parameters, as read from the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Unique items to collect
    pub target_count: usize,
    /// Consecutive no-progress pages tolerated
    pub max_exhaustion_attempts: u32,
    /// Optional cap on listed pages
    pub max_pages: Option<usize>,
    /// Minimum coverage for ordering to be judged
    pub coverage_threshold: f64,
    /// Concurrent lookups per batch
    pub batch_size: usize,
    /// Pacing delay before each lookup batch
    pub lookup_delay_ms: u64,
    /// Pacing delay for remote listing calls
    pub page_delay_ms: u64,
    /// Minimum gap between runs
    pub run_delay_ms: u64,
    /// Deadline for collection and resolution
    pub run_timeout_secs: u64,
    /// Bound on waiting for a page transition
    pub transition_timeout_ms: u64,
    /// Shared pacing state file
    pub state_file: PathBuf,
    /// Hacker News API root
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            target_count: run.collector.target_count,
            max_exhaustion_attempts: run.collector.max_exhaustion_attempts,
            max_pages: run.collector.max_pages,
            coverage_threshold: run.coverage_threshold,
            batch_size: run.resolver.batch_size,
            lookup_delay_ms: run.resolver.lookup_delay.as_millis() as u64,
            page_delay_ms: feedcheck::resolver::DEFAULT_LOOKUP_DELAY_MS,
            run_delay_ms: run.run_delay.as_millis() as u64,
            run_timeout_secs: run.run_timeout.as_secs(),
            transition_timeout_ms: run.collector.transition_timeout.as_millis() as u64,
            state_file: PathBuf::from(feedcheck::DEFAULT_STATE_FILE),
            api_base: "https://hacker-news.firebaseio.com/v0".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from YAML text
    pub fn from_yaml(text: &str) -> CliResult<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| CliError::config(e.to_string()))
    }

    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_SETTINGS_FILE`] is
    /// read if present, otherwise defaults apply.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    CliError::config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_yaml(&text)
            }
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.exists() {
                    Self::load(Some(default))
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Overlay the flags given on the command line
    #[must_use]
    pub fn apply(mut self, args: &RunArgs) -> Self {
        if let Some(target) = args.target {
            self.target_count = target;
        }
        if let Some(attempts) = args.max_exhaustion {
            self.max_exhaustion_attempts = attempts;
        }
        if args.max_pages.is_some() {
            self.max_pages = args.max_pages;
        }
        if let Some(threshold) = args.threshold {
            self.coverage_threshold = threshold;
        }
        if let Some(batch_size) = args.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(ms) = args.lookup_delay_ms {
            self.lookup_delay_ms = ms;
        }
        if let Some(ms) = args.run_delay_ms {
            self.run_delay_ms = ms;
        }
        if let Some(secs) = args.timeout_secs {
            self.run_timeout_secs = secs;
        }
        if let Some(ms) = args.transition_timeout_ms {
            self.transition_timeout_ms = ms;
        }
        if let Some(state) = &args.state {
            self.state_file.clone_from(state);
        }
        self
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> CliResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| CliError::config(e.to_string()))
    }

    /// Library run configuration
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        let lookup_delay = Duration::from_millis(self.lookup_delay_ms);
        RunConfig::default()
            .with_collector(
                CollectorConfig::default()
                    .with_target_count(self.target_count)
                    .with_max_exhaustion_attempts(self.max_exhaustion_attempts)
                    .with_max_pages(self.max_pages)
                    .with_page_delay(Duration::from_millis(self.page_delay_ms))
                    .with_transition_timeout(Duration::from_millis(self.transition_timeout_ms)),
            )
            .with_resolver(
                ResolverConfig::default()
                    .with_batch_size(self.batch_size)
                    .with_lookup_delay(lookup_delay)
                    .with_retry_delay(lookup_delay),
            )
            .with_coverage_threshold(self.coverage_threshold)
            .with_run_delay(Duration::from_millis(self.run_delay_ms))
            .with_run_timeout(Duration::from_secs(self.run_timeout_secs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default_verbosity() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_is_quiet() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(!Verbosity::Normal.is_quiet());
        }

        #[test]
        fn test_log_filter() {
            assert_eq!(Verbosity::Quiet.log_filter(), "error");
            assert_eq!(Verbosity::Normal.log_filter(), "warn");
            assert_eq!(Verbosity::Verbose.log_filter(), "info");
            assert_eq!(Verbosity::Debug.log_filter(), "debug");
        }
    }

    mod color_choice_tests {
        use super::*;

        #[test]
        fn test_default_color() {
            assert_eq!(ColorChoice::default(), ColorChoice::Auto);
        }

        #[test]
        fn test_should_color_fixed() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod settings_tests {
        use super::*;

        #[test]
        fn test_defaults_match_library() {
            let settings = Settings::default();
            assert_eq!(settings.target_count, 100);
            assert_eq!(settings.batch_size, 20);
            assert_eq!(settings.lookup_delay_ms, 600);
            assert_eq!(settings.run_delay_ms, 8000);
            assert_eq!(settings.run_timeout_secs, 180);
            assert_eq!(settings.state_file, PathBuf::from(".feedcheck-state.json"));
        }

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let yaml = "target_count: 30\ncoverage_threshold: 0.35\n";
            let settings = Settings::from_yaml(yaml).unwrap();
            assert_eq!(settings.target_count, 30);
            assert!((settings.coverage_threshold - 0.35).abs() < f64::EPSILON);
            assert_eq!(settings.batch_size, 20);
        }

        #[test]
        fn test_unknown_key_rejected() {
            let err = Settings::from_yaml("targt_count: 30\n").unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_explicit_missing_file_is_error() {
            let dir = tempfile::TempDir::new().unwrap();
            assert!(Settings::load(Some(&dir.path().join("nope.yaml"))).is_err());
        }

        #[test]
        fn test_yaml_round_trip() {
            let settings = Settings {
                max_pages: Some(10),
                ..Settings::default()
            };
            let yaml = settings.to_yaml().unwrap();
            assert!(yaml.contains("max_pages: 10"));
            assert_eq!(Settings::from_yaml(&yaml).unwrap(), settings);
        }

        #[test]
        fn test_flags_override_file() {
            let settings = Settings::from_yaml("target_count: 30\nbatch_size: 5\n").unwrap();
            let args = RunArgs {
                target: Some(60),
                state: Some(PathBuf::from("other.json")),
                ..RunArgs::default()
            };
            let settings = settings.apply(&args);
            assert_eq!(settings.target_count, 60);
            assert_eq!(settings.batch_size, 5);
            assert_eq!(settings.state_file, PathBuf::from("other.json"));
        }

        #[test]
        fn test_run_config_mapping() {
            let settings = Settings {
                target_count: 42,
                lookup_delay_ms: 250,
                max_pages: Some(5),
                ..Settings::default()
            };
            let run = settings.run_config();
            assert_eq!(run.collector.target_count, 42);
            assert_eq!(run.collector.max_pages, Some(5));
            assert_eq!(run.resolver.lookup_delay, Duration::from_millis(250));
            assert_eq!(run.resolver.retry_delay, Duration::from_millis(250));
            assert!(run.validate().is_ok());
        }
    }
}
