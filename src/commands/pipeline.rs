//! The pipeline stages shared by the discover, clone, and run commands.

use super::common::CommonArgs;
use super::config::Config;
use super::progress_reporter::ProgressReporter;
use crate::Result;
use crate::harvest::forge::Client;
use crate::harvest::store::{self, Checkpoint, CloneDocument, DiscoveryDocument, OutputLayout};
use crate::harvest::{CloneEngine, CloneOutcome, Clock, CorpusStats, DiscoveryClient, Limiters, Progress, RepositoryRecord, SystemClock};
use core::time::Duration;
use ohno::bail;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "    pipeline";

/// Overrides for the clone stage taken from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Clone only the highest-scoring repositories
    pub max_repos: Option<usize>,

    /// Worker count overriding the configuration
    pub workers: Option<usize>,

    /// Remove existing clones and clone again
    pub force_reclone: bool,
}

/// Runs the pipeline stages and persists their results.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    layout: OutputLayout,
    token: Option<String>,
    api_url: String,
    clock: Arc<dyn Clock>,
    progress_delay: Duration,
}

impl Pipeline {
    /// Set up logging and load the configuration named by `args`.
    pub fn new(args: &CommonArgs) -> Result<Self> {
        let config = args.prepare()?;
        Ok(Self::with_clock(config, args, Arc::new(SystemClock)))
    }

    #[must_use]
    pub fn with_clock(config: Config, args: &CommonArgs, clock: Arc<dyn Clock>) -> Self {
        Self {
            layout: OutputLayout::new(config.output_dir.as_std_path()),
            config,
            token: args.token().map(str::to_string),
            api_url: args.api_url.clone(),
            clock,
            progress_delay: args.progress_delay(),
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Discover repositories, reusing `repositories.json` unless `force` is set.
    pub async fn discover(&self, force: bool) -> Result<Vec<RepositoryRecord>> {
        let path = self.layout.repositories_file();

        if !force && let Some(records) = self.load_discovered() {
            log::info!(target: LOG_TARGET, "Loaded {} repositories from '{}'", records.len(), path.display());
            return Ok(records);
        }

        log::info!(target: LOG_TARGET, "Starting repository discovery");

        let client = Client::new(self.token.as_deref(), self.api_url.as_str())?;
        let limiters = Limiters::new(&self.config.rate_limit, self.token.is_some(), &self.clock);
        let discovery = DiscoveryClient::new(
            client,
            limiters,
            self.config.discovery.clone(),
            self.config.criteria,
            self.config.scoring,
            Arc::clone(&self.clock),
        );

        let progress = ProgressReporter::for_stderr(self.progress_delay);
        progress.set_phase("Discovering");
        progress.set_indeterminate(Box::new(|| "querying GitHub".to_string()));

        let records = discovery
            .discover_all(&self.config.seeds, &self.config.queries, self.config.discovery.max_repos_per_search)
            .await;

        progress.done();

        let document = DiscoveryDocument::new(records, self.clock.now());
        store::save(&document, &path)?;
        store::save(
            &Checkpoint::discovery_complete(document.total_repositories, &path, self.clock.now()),
            self.layout.checkpoint_file(),
        )?;

        Ok(document.repositories)
    }

    /// Records saved by an earlier discovery, if any.
    #[must_use]
    pub fn load_discovered(&self) -> Option<Vec<RepositoryRecord>> {
        let document: DiscoveryDocument = store::load_if_present(self.layout.repositories_file(), "discovery results")?;
        if document.repositories.is_empty() {
            log::warn!(target: LOG_TARGET, "Saved discovery results are empty");
            return None;
        }

        Some(document.repositories)
    }

    /// Outcomes saved by an earlier clone stage, if any.
    #[must_use]
    pub fn load_clone_results(&self) -> Option<Vec<CloneOutcome>> {
        store::load_if_present::<CloneDocument>(self.layout.clone_results_file(), "clone results").map(|d| d.results)
    }

    #[must_use]
    pub fn load_checkpoint(&self) -> Option<Checkpoint> {
        store::load_if_present(self.layout.checkpoint_file(), "checkpoint")
    }

    /// Clone `records`, highest score first, and persist the outcomes.
    pub async fn clone_repositories(&self, mut records: Vec<RepositoryRecord>, options: CloneOptions) -> Result<Vec<CloneOutcome>> {
        let workers = options.workers.unwrap_or(self.config.clone.workers);
        if workers == 0 {
            bail!("the number of clone workers must be at least 1");
        }

        records.sort_by(|a, b| b.quality_score().total_cmp(&a.quality_score()).then_with(|| a.id().cmp(b.id())));
        if let Some(max) = options.max_repos
            && records.len() > max
        {
            log::info!(target: LOG_TARGET, "Limiting to the {max} highest-scoring of {} repositories", records.len());
            records.truncate(max);
        }

        let progress: Arc<dyn Progress> = Arc::new(ProgressReporter::for_stderr(self.progress_delay));
        let engine = CloneEngine::new(self.config.clone_dir.as_std_path(), self.config.clone.clone()).with_progress(progress);

        let outcomes = engine
            .clone_all(records.into_iter().map(Arc::new).collect(), workers, options.force_reclone)
            .await;

        let path = self.layout.clone_results_file();
        let document = CloneDocument::new(outcomes, self.clock.now());
        store::save(&document, &path)?;
        store::save(
            &Checkpoint::cloning_complete(&document, &path, self.clock.now()),
            self.layout.checkpoint_file(),
        )?;

        Ok(document.results)
    }

    /// Compute and save `stats.json`.
    pub fn write_stats(&self, records: &[RepositoryRecord], outcomes: &[CloneOutcome]) -> Result<CorpusStats> {
        let stats = CorpusStats::compute(records, outcomes, self.clock.now());
        let path = self.layout.stats_file();
        store::save(&stats, &path)?;
        log::info!(target: LOG_TARGET, "Corpus statistics saved to '{}'", path.display());
        Ok(stats)
    }
}

/// Print the end-of-run summary.
pub fn write_summary(out: &mut impl Write, stats: &CorpusStats) {
    let discovery = &stats.discovery_stats;
    let clones = &stats.clone_stats;

    let _ = writeln!(out, "Repositories discovered: {}", discovery.total_repositories_discovered);
    if clones.total_attempted > 0 {
        let _ = writeln!(
            out,
            "Repositories cloned: {}/{} ({} reused)",
            clones.successful_clones, clones.total_attempted, clones.reused_clones
        );
        let _ = writeln!(out, "Success rate: {:.1}%", clones.success_rate * 100.0);
        let _ = writeln!(out, "Total corpus size: {:.1} MiB", clones.total_size_mb);
    }
    let _ = writeln!(out, "Average repository quality: {:.1}/100", discovery.average_quality_score);
}
