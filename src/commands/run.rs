use anyhow::{Result, bail};

use crate::acquire::HttpFetcher;
use crate::cli::{Cli, RunArgs};
use crate::pipeline::{RunOptions, run_pipeline};

use super::load_config;

pub fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(out) = &args.out { config.out_dir = out.clone(); }
    if let Some(cache_dir) = &args.cache_dir { config.cache_dir = cache_dir.clone(); }
    if let Some(days) = args.max_age_days { config.max_age_days = days; }
    if args.allow_stale { config.fail_on_error = false; }
    config.validate()?;

    if cli.verbose > 0 {
        eprintln!(
            "[run] county={} zips={} cache={} -> {}",
            config.county_fips,
            config.zips.len(),
            config.cache_dir.display(),
            config.out_dir.display(),
        );
    }

    let fetcher = HttpFetcher::new(config.timeout())?;
    let output = run_pipeline(&config, &fetcher, RunOptions { force_fetch: args.force, echo_status: true })?;

    let report = &output.report;
    println!(
        "Wrote {} rows, {} neighborhoods -> {} (valid: {}, errors: {}, warnings: {})",
        output.rows.len(),
        output.clusters.len(),
        config.out_dir.display(),
        report.is_valid,
        report.errors.len(),
        report.warnings.len(),
    );

    if args.strict && !report.is_valid {
        bail!("validation failed with {} error(s); see the validation report", report.errors.len());
    }
    Ok(())
}
