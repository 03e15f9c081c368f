use anyhow::Result;

use crate::acquire::{HttpFetcher, acquire_sources};
use crate::cli::{Cli, FetchArgs};

use super::load_config;

pub fn run(cli: &Cli, args: &FetchArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(cache_dir) = &args.cache_dir { config.cache_dir = cache_dir.clone(); }
    config.validate()?;

    if cli.verbose > 0 {
        eprintln!("[fetch] cache={} force={}", config.cache_dir.display(), args.force);
    }

    let fetcher = HttpFetcher::new(config.timeout())?;
    let sources = acquire_sources(&config, &fetcher, args.force)?;

    for (source, fetched) in [
        (&config.sources.weights, &sources.weights),
        (&config.sources.tracts, &sources.tracts),
        (&config.sources.neighborhoods, &sources.neighborhoods),
    ] {
        println!(
            "{:<14} {:<16} {} bytes -> {}",
            source.name,
            fetched.status,
            fetched.bytes.len(),
            source.cache_path(&config.cache_dir).display(),
        );
    }
    Ok(())
}
