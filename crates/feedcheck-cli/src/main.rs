//! Feedcheck CLI: verify newest-first ordering of a paginated listing
//!
//! ## Usage
//!
//! ```bash
//! feedcheck run                          # Sample 100 items from the live listing
//! feedcheck run --fixture pages.json     # Replay an offline listing
//! feedcheck run -n 50 --format json -o report.json
//! feedcheck pacing show                  # Inspect the shared pacing record
//! feedcheck config --defaults            # Print built-in settings
//! ```

use clap::Parser;
use feedcheck_cli::{
    handlers::{execute_config, execute_pacing, execute_run},
    Cli, CliConfig, CliResult, ColorChoice, Commands, Settings, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity, cli.log_json);

    match run(&cli, &config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &CliConfig) -> CliResult<u8> {
    let settings = Settings::load(cli.settings.as_deref())?;

    match &cli.command {
        Commands::Run(args) => execute_run(config, settings, args),
        Commands::Pacing(args) => {
            execute_pacing(config, &settings, args)?;
            Ok(0)
        }
        Commands::Config(args) => {
            execute_config(&settings, args)?;
            Ok(0)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn init_tracing(verbosity: Verbosity, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));

    let (plain, json) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        )
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init();
}
