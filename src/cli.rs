use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// ZIP to census tract to neighborhood crosswalk builder for one county
#[derive(Parser, Debug)]
#[command(name = "ntawalk", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all five phases and write the output files
    Run(RunArgs),

    /// Populate the source cache without running the pipeline
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Output directory (overrides config)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub out: Option<PathBuf>,

    /// Source cache directory (overrides config)
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,

    /// Cache entries older than this many days are refetched (overrides config)
    #[arg(long)]
    pub max_age_days: Option<u64>,

    /// Fall back to a stale cache entry when a fetch fails
    #[arg(long)]
    pub allow_stale: bool,

    /// Refetch every source regardless of cache age
    #[arg(long)]
    pub force: bool,

    /// Exit non-zero when the validation report is invalid
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Source cache directory (overrides config)
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,

    /// Refetch every source regardless of cache age
    #[arg(long)]
    pub force: bool,
}
