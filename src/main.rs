use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ntawalk::cli::{Cli, Commands};
use ntawalk::commands::{fetch, run};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Fetch(args) => fetch::run(&cli, args),
    }
}
