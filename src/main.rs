use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Per-key min/mean/max aggregation over a `key;value` measurement file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the measurements file
    input: PathBuf,

    /// Number of worker threads (defaults to all available cores)
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let workers = args.workers.unwrap_or_else(num_cpus::get);

    let start = Instant::now();
    let report = one_brc_fast::aggregate(&args.input, workers)?;
    let elapsed = start.elapsed();

    std::io::stdout().lock().write_all(&report)?;
    tracing::info!(workers, ?elapsed, "aggregation finished");
    Ok(())
}
