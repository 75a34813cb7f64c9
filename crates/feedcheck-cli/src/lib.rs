//! Feedcheck CLI Library
//!
//! Command-line interface for the Feedcheck ordering verifier: argument
//! parsing, settings, report rendering and the command handlers behind the
//! `feedcheck` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, FormatArg, PacingAction, PacingArgs, RunArgs, StateArgs,
};
pub use config::{CliConfig, ColorChoice, Settings, Verbosity, DEFAULT_SETTINGS_FILE};
pub use error::{CliError, CliResult};
pub use output::{
    render_report, render_report_json, render_report_text, OutputFormat, ProgressReporter,
};
