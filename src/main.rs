use anyhow::Result;
use clap::Parser;
use hicpair::cli;
use hicpair::digest::FragmentIndex;
use hicpair::pipeline;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let index = FragmentIndex::from_paths(&args.digest, args.active_digests.as_deref())?;
    let stats = pipeline::run(&args, &index)?;
    tracing::info!(
        total_pairs = stats.n_total,
        paired = stats.n_paired,
        duplicates = stats.n_duplicate,
        valid_pairs = stats.n_valid,
        trans_pairs = stats.n_trans,
        "hicpair: processing complete"
    );
    Ok(())
}
