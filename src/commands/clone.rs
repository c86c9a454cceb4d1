use super::Host;
use super::common::CommonArgs;
use super::pipeline::{CloneOptions, Pipeline, write_summary};
use crate::Result;
use clap::Parser;
use ohno::app_err;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct CloneArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Remove existing clones and clone them again
    #[arg(long)]
    pub force_reclone: bool,

    /// Clone only this many of the highest-scoring repositories
    #[arg(long, value_name = "COUNT")]
    pub max_repos: Option<usize>,

    /// Number of concurrent clones, overriding the configuration
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u16).range(1..))]
    pub clone_workers: Option<u16>,
}

impl CloneArgs {
    pub(super) fn options(&self) -> CloneOptions {
        CloneOptions {
            max_repos: self.max_repos,
            workers: self.clone_workers.map(usize::from),
            force_reclone: self.force_reclone,
        }
    }
}

/// Clone the repositories recorded in repositories.json, then write clone_results.json and stats.json.
pub async fn process_clone<H: Host>(host: &mut H, args: &CloneArgs) -> Result<()> {
    let result = async {
        let pipeline = Pipeline::new(&args.common)?;
        let records = pipeline.load_discovered().ok_or_else(|| {
            app_err!(
                "no repositories found in '{}'; run discovery first",
                pipeline.layout().repositories_file().display()
            )
        })?;

        let outcomes = pipeline.clone_repositories(records.clone(), args.options()).await?;
        pipeline.write_stats(&records, &outcomes)
    }
    .await;

    match result {
        Ok(stats) => {
            write_summary(&mut host.output(), &stats);
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Cloning failed: {e:#}");
            host.exit(1);
            Err(e)
        }
    }
}
