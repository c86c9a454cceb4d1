//! Command-line interface and orchestration for corpus-harvest
//!
//! This module implements the CLI commands and drives the acquisition pipeline in
//! [`crate::harvest`]. It handles argument parsing, configuration management, logging
//! setup, progress display, and persistence of each stage's results.
//!
//! ## Commands
//!
//! - **discover**: Query GitHub for seed and search candidates, score and filter them,
//!   and write `repositories.json`
//! - **clone**: Shallow-clone the repositories recorded by a previous discovery and
//!   write `clone_results.json`
//! - **run**: Both stages in sequence, optionally resuming from `checkpoint.json`
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file
//!
//! Every pipeline command finishes by writing `stats.json` and printing a short summary.

mod clone;
mod common;
mod config;
mod discover;
mod full;
mod host;
mod init;
mod pipeline;
mod progress_reporter;
mod run;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

pub use clone::{CloneArgs, process_clone};
pub use common::CommonArgs;
pub use discover::{DiscoverArgs, process_discover};
pub use full::{RunArgs, process_run};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use pipeline::{CloneOptions, Pipeline, write_summary};
pub use progress_reporter::ProgressReporter;
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
