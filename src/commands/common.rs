//! Argument handling and setup shared by the pipeline commands.

use super::config::Config;
use crate::Result;
use crate::harvest::forge::DEFAULT_BASE_URL;
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::fs::File;

const LOG_TARGET: &str = "      config";

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by the discover, clone, and run commands
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Base URL of the GitHub REST API
    #[arg(long, value_name = "URL", env = "GITHUB_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Path to configuration file (default is `harvest.toml` when present)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory for JSON outputs, overriding the configuration file
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Directory for clones, overriding the configuration file
    #[arg(long, value_name = "PATH")]
    pub clone_dir: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,

    /// Write log output to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<Utf8PathBuf>,
}

impl CommonArgs {
    /// Initialize logging, then load the configuration and apply command-line overrides.
    pub fn prepare(&self) -> Result<Config> {
        init_logging(self.log_level, self.log_file.as_ref())?;

        let mut config = Config::load(self.config.as_deref())?;
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(dir) = &self.clone_dir {
            config.clone_dir.clone_from(dir);
        }

        if self.token().is_none() {
            if config.require_token {
                bail!("a GitHub token is required by the configuration; pass --github-token or set GITHUB_TOKEN");
            }
            log::warn!(target: LOG_TARGET, "No GitHub token provided, API rate limits will be severely restricted");
        }

        if config.discovery.max_repositories > 1000 {
            log::warn!(target: LOG_TARGET, "Processing over 1000 repositories may take a very long time");
        }

        Ok(config)
    }

    /// The token, ignoring an empty value.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.github_token.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// How long the progress bar waits before showing itself.
    #[must_use]
    pub const fn progress_delay(&self) -> Duration {
        if matches!(self.log_level, LogLevel::None) {
            Duration::from_millis(300)
        } else {
            // log lines and a progress bar do not mix
            Duration::from_hours(365 * 24)
        }
    }
}

/// Initialize the logger based on log level
///
/// Only the first call in a process installs a logger; later calls are ignored.
pub fn init_logging(log_level: LogLevel, log_file: Option<&Utf8PathBuf>) -> Result<()> {
    let level = match log_level {
        LogLevel::None => return Ok(()),
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    let mut builder = env_logger::Builder::from_env(env);
    let _ = builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace));

    if let Some(path) = log_file {
        let file = File::create(path).into_app_err_with(|| format!("creating log file '{path}'"))?;
        let _ = builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    let _ = builder.try_init();
    Ok(())
}
