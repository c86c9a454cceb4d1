use super::Host;
use super::common::CommonArgs;
use super::pipeline::{Pipeline, write_summary};
use crate::Result;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Discover again even if repositories.json already exists
    #[arg(long)]
    pub force_discovery: bool,
}

/// Discover, score, and filter repositories, then write repositories.json and stats.json.
pub async fn process_discover<H: Host>(host: &mut H, args: &DiscoverArgs) -> Result<()> {
    let result = async {
        let pipeline = Pipeline::new(&args.common)?;
        let records = pipeline.discover(args.force_discovery).await?;
        let stats = pipeline.write_stats(&records, &[])?;
        Ok::<_, ohno::AppError>((pipeline, stats))
    }
    .await;

    match result {
        Ok((pipeline, stats)) => {
            write_summary(&mut host.output(), &stats);
            let _ = writeln!(
                host.output(),
                "Results written to {}",
                pipeline.layout().repositories_file().display()
            );
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Discovery failed: {e:#}");
            host.exit(1);
            Err(e)
        }
    }
}
