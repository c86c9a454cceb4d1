use super::Host;
use super::common::CommonArgs;
use super::pipeline::{CloneOptions, Pipeline, write_summary};
use crate::Result;
use crate::harvest::store::Stage;
use crate::harvest::{CloneOutcome, CorpusStats, RepositoryRecord};
use clap::Parser;
use std::io::Write;

const LOG_TARGET: &str = "    pipeline";

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Discover again even if repositories.json already exists
    #[arg(long)]
    pub force_discovery: bool,

    /// Remove existing clones and clone them again
    #[arg(long)]
    pub force_reclone: bool,

    /// Clone only this many of the highest-scoring repositories
    #[arg(long, value_name = "COUNT")]
    pub max_repos: Option<usize>,

    /// Number of concurrent clones, overriding the configuration
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u16).range(1..))]
    pub clone_workers: Option<u16>,

    /// Skip the stages recorded as complete in checkpoint.json
    #[arg(long)]
    pub resume: bool,

    /// Stop after discovery
    #[arg(long, conflicts_with_all = ["force_reclone", "max_repos", "clone_workers"])]
    pub discover_only: bool,
}

/// Run discovery, cloning, and statistics in sequence.
pub async fn process_run<H: Host>(host: &mut H, args: &RunArgs) -> Result<()> {
    match run_stages(args).await {
        Ok(stats) => {
            write_summary(&mut host.output(), &stats);
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Pipeline failed: {e:#}");
            host.exit(1);
            Err(e)
        }
    }
}

async fn run_stages(args: &RunArgs) -> Result<CorpusStats> {
    let pipeline = Pipeline::new(&args.common)?;

    let completed = if args.resume {
        let stage = pipeline.load_checkpoint().map(|checkpoint| checkpoint.stage);
        match stage {
            Some(stage) => log::info!(target: LOG_TARGET, "Resuming from checkpoint: {stage}"),
            None => log::warn!(target: LOG_TARGET, "No checkpoint found, starting from the beginning"),
        }
        stage
    } else {
        None
    };

    log::info!(target: LOG_TARGET, "Phase 1: repository discovery");
    let records = discover_stage(&pipeline, args, completed).await?;
    log::info!(target: LOG_TARGET, "Discovery complete: {} repositories", records.len());

    if args.discover_only {
        return pipeline.write_stats(&records, &[]);
    }

    log::info!(target: LOG_TARGET, "Phase 2: repository cloning");
    let outcomes = clone_stage(&pipeline, args, completed, &records).await?;
    log::info!(
        target: LOG_TARGET,
        "Cloning complete: {}/{} repositories cloned",
        outcomes.iter().filter(|o| o.is_success()).count(),
        outcomes.len()
    );

    pipeline.write_stats(&records, &outcomes)
}

async fn discover_stage(pipeline: &Pipeline, args: &RunArgs, completed: Option<Stage>) -> Result<Vec<RepositoryRecord>> {
    if !args.force_discovery
        && completed >= Some(Stage::DiscoveryComplete)
        && let Some(records) = pipeline.load_discovered()
    {
        log::info!(target: LOG_TARGET, "Skipping discovery, {} repositories already discovered", records.len());
        return Ok(records);
    }

    pipeline.discover(args.force_discovery).await
}

async fn clone_stage(
    pipeline: &Pipeline,
    args: &RunArgs,
    completed: Option<Stage>,
    records: &[RepositoryRecord],
) -> Result<Vec<CloneOutcome>> {
    if !args.force_reclone
        && completed == Some(Stage::CloningComplete)
        && let Some(outcomes) = pipeline.load_clone_results()
    {
        log::info!(target: LOG_TARGET, "Skipping cloning, {} clone results already recorded", outcomes.len());
        return Ok(outcomes);
    }

    let options = CloneOptions {
        max_repos: args.max_repos,
        workers: args.clone_workers.map(usize::from),
        force_reclone: args.force_reclone,
    };

    pipeline.clone_repositories(records.to_vec(), options).await
}
