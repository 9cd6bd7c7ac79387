use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hicpair",
    about = "Pair, classify and count capture Hi-C read pairs against an in-silico restriction digest",
    version
)]
pub struct Args {
    /// BAM with independently aligned forward reads (R1)
    pub forward_bam: PathBuf,

    /// BAM with independently aligned reverse reads (R2)
    pub reverse_bam: PathBuf,

    /// Digest table produced by an in-silico genome digestion (GOPHER format)
    #[arg(short = 'd', long = "digest", value_name = "TSV")]
    pub digest: PathBuf,

    /// Optional file listing digests selected by capture probes
    #[arg(short = 'a', long = "active-digests", value_name = "TSV")]
    pub active_digests: Option<PathBuf>,

    /// Prefix (including directory) for all output files
    #[arg(short = 'o', long = "out-prefix", value_name = "PREFIX")]
    pub out_prefix: String,

    /// Smallest allowable chimeric fragment size
    #[arg(short = 'l', long, default_value_t = 150)]
    pub lower_size: i64,

    /// Largest allowable chimeric fragment size
    #[arg(short = 'u', long, default_value_t = 800)]
    pub upper_size: i64,

    /// Upper bound on the size of a self-ligated (circularized) fragment
    #[arg(short = 's', long, default_value_t = 2500)]
    pub self_ligation_size: i64,

    /// Treat any read with a secondary alignment score as multi-mapped
    #[arg(long)]
    pub stringent: bool,

    /// Pairs at identical coordinates but with different relative
    /// orientation are not duplicates
    #[arg(long)]
    pub dedup_orientation: bool,

    /// Also write rejected (artifact) pairs to a BAM file
    #[arg(long)]
    pub output_rejected: bool,

    /// Clamp for the fragment-size histogram
    #[arg(long, default_value_t = 10_000)]
    pub size_limit: usize,

    /// Set logging level to WARN
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
