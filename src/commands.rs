pub mod fetch;
pub mod run;

use anyhow::Result;
use tracing::debug;

use crate::cli::Cli;
use crate::config::Config;

/// Config from `--config`, or the built-in defaults.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    debug!(?config, "loaded configuration");
    Ok(config)
}
