mod cache;
mod fetch;

use anyhow::Result;

pub use cache::{CacheStatus, FetchPolicy, Fetched, ensure_fresh};
pub use fetch::{Fetcher, HttpFetcher, MemFetcher};

use crate::config::Config;

/// Raw bytes of the three sources, as consumed by the later phases.
#[derive(Debug, Clone)]
pub struct SourceBytes {
    pub weights: Fetched,
    pub tracts: Fetched,
    pub neighborhoods: Fetched,
}

/// Make sure all three sources are cached and return their bytes.
/// Sources are fetched one after another; the first failure aborts.
pub fn acquire_sources(config: &Config, fetcher: &dyn Fetcher, force: bool) -> Result<SourceBytes> {
    let policy = FetchPolicy {
        max_age_days: config.max_age_days,
        fail_on_error: config.fail_on_error,
        force,
    };
    let sources = &config.sources;

    Ok(SourceBytes {
        weights: ensure_fresh(&sources.weights, &config.cache_dir, &policy, fetcher)?,
        tracts: ensure_fresh(&sources.tracts, &config.cache_dir, &policy, fetcher)?,
        neighborhoods: ensure_fresh(&sources.neighborhoods, &config.cache_dir, &policy, fetcher)?,
    })
}
