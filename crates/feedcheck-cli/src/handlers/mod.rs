//! Command handlers - extracted from main.rs for testability

pub mod config;
pub mod pacing;
pub mod run;

pub use config::execute_config;
pub use pacing::execute_pacing;
pub use run::{execute_run, exit_code, FixtureFile, ListingSource};
