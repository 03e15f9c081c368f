#![doc = "ntawalk: ZIP to census tract to neighborhood crosswalk for one county"]
mod common;

pub mod acquire;
pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod crosswalk;
pub mod error;
pub mod geom;
pub mod output;
pub mod pipeline;
pub mod validate;

#[doc(inline)]
pub use config::{Config, Scope};

#[doc(inline)]
pub use error::{FetchError, PipelineError};

#[doc(inline)]
pub use pipeline::{Phase, PipelineOutput, RunOptions, run_pipeline};
