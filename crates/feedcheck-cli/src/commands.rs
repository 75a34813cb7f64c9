//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Feedcheck: verify newest-first ordering of a paginated listing
#[derive(Parser, Debug)]
#[command(name = "feedcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit log events as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Settings file (defaults to ./feedcheck.yaml when present)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect, resolve and verify one sample of the listing
    Run(RunArgs),

    /// Inspect or reset the shared pacing state
    Pacing(PacingArgs),

    /// Show effective settings as YAML
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Replay a JSON listing fixture instead of the live listing
    #[arg(long, conflicts_with = "synthetic")]
    pub fixture: Option<PathBuf>,

    /// Generate a well-ordered offline listing of N items
    #[arg(long, value_name = "N")]
    pub synthetic: Option<usize>,

    /// Unique items to collect
    #[arg(short = 'n', long)]
    pub target: Option<usize>,

    /// Consecutive no-progress pages tolerated
    #[arg(long)]
    pub max_exhaustion: Option<u32>,

    /// Stop after this many listed pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Minimum timestamp coverage for a verdict (0.0-1.0)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Concurrent lookups per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Pacing delay before each lookup batch, in milliseconds
    #[arg(long)]
    pub lookup_delay_ms: Option<u64>,

    /// Minimum gap between runs, in milliseconds
    #[arg(long)]
    pub run_delay_ms: Option<u64>,

    /// Deadline for collection and resolution, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Bound on waiting for a page transition, in milliseconds
    #[arg(long)]
    pub transition_timeout_ms: Option<u64>,

    /// Shared pacing state file
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Report format on stdout
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Treat a partial collection as a failure
    #[arg(long)]
    pub require_complete: bool,
}

/// Arguments for the pacing command
#[derive(Parser, Debug)]
pub struct PacingArgs {
    /// Pacing subcommand
    #[command(subcommand)]
    pub action: PacingAction,
}

/// Pacing subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PacingAction {
    /// Print the shared record and the wait a run would incur now
    Show(StateArgs),
    /// Delete the shared record
    Reset(StateArgs),
}

/// State file selection
#[derive(Args, Debug, Clone, Default)]
pub struct StateArgs {
    /// Shared pacing state file
    #[arg(long)]
    pub state: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show built-in defaults instead of effective settings
    #[arg(long)]
    pub defaults: bool,
}

/// Report format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable summary
    #[default]
    Text,
    /// Full JSON report
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;
    use crate::output::OutputFormat;

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn test_verify_cli() {
            use clap::CommandFactory;
            Cli::command().debug_assert();
        }

        #[test]
        fn test_run_defaults() {
            let cli = Cli::try_parse_from(["feedcheck", "run"]).unwrap();
            assert_eq!(cli.verbose, 0);
            assert!(!cli.quiet);
            match cli.command {
                Commands::Run(args) => {
                    assert!(args.fixture.is_none());
                    assert!(args.target.is_none());
                    assert_eq!(args.format, FormatArg::Text);
                    assert!(!args.require_complete);
                }
                _ => panic!("expected run command"),
            }
        }

        #[test]
        fn test_run_overrides() {
            let cli = Cli::try_parse_from([
                "feedcheck",
                "-vv",
                "run",
                "--synthetic",
                "250",
                "-n",
                "50",
                "--threshold",
                "0.5",
                "--format",
                "json",
                "--require-complete",
            ])
            .unwrap();
            assert_eq!(cli.verbose, 2);
            match cli.command {
                Commands::Run(args) => {
                    assert_eq!(args.synthetic, Some(250));
                    assert_eq!(args.target, Some(50));
                    assert_eq!(args.threshold, Some(0.5));
                    assert_eq!(args.format, FormatArg::Json);
                    assert!(args.require_complete);
                }
                _ => panic!("expected run command"),
            }
        }

        #[test]
        fn test_fixture_conflicts_with_synthetic() {
            let result = Cli::try_parse_from([
                "feedcheck",
                "run",
                "--fixture",
                "pages.json",
                "--synthetic",
                "10",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn test_global_settings_after_subcommand() {
            let cli =
                Cli::try_parse_from(["feedcheck", "config", "--settings", "custom.yaml"]).unwrap();
            assert_eq!(cli.settings, Some(PathBuf::from("custom.yaml")));
        }

        #[test]
        fn test_pacing_subcommands() {
            let cli =
                Cli::try_parse_from(["feedcheck", "pacing", "reset", "--state", "s.json"]).unwrap();
            match cli.command {
                Commands::Pacing(PacingArgs {
                    action: PacingAction::Reset(state),
                }) => assert_eq!(state.state, Some(PathBuf::from("s.json"))),
                _ => panic!("expected pacing reset"),
            }
        }

        #[test]
        fn test_subcommand_required() {
            assert!(Cli::try_parse_from(["feedcheck"]).is_err());
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_color_arg_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
        }

        #[test]
        fn test_format_arg_conversion() {
            assert_eq!(OutputFormat::from(FormatArg::Text), OutputFormat::Text);
            assert_eq!(OutputFormat::from(FormatArg::Json), OutputFormat::Json);
        }
    }
}
