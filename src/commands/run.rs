//! Command dispatch logic for corpus-harvest

use super::{
    CloneArgs, DiscoverArgs, InitArgs, RunArgs, ValidateArgs, init_config, process_clone, process_discover, process_run,
    validate_config,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "corpus-harvest", version, author, long_about = None)]
#[command(about = "Build a curated corpus of source repositories from GitHub")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: HarvestSubcommand,
}

#[derive(Subcommand, Debug)]
enum HarvestSubcommand {
    /// Discover, score, and filter candidate repositories
    Discover(Box<DiscoverArgs>),
    /// Clone previously discovered repositories
    Clone(Box<CloneArgs>),
    /// Run discovery and cloning end to end
    Run(Box<RunArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        HarvestSubcommand::Discover(discover_args) => process_discover(host, discover_args).await,
        HarvestSubcommand::Clone(clone_args) => process_clone(host, clone_args).await,
        HarvestSubcommand::Run(run_args) => process_run(host, run_args).await,
        HarvestSubcommand::Init(init_args) => init_config(host, init_args),
        HarvestSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}
