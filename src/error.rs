use thiserror::Error;

use crate::pipeline::Phase;

/// Source acquisition failure. Carries the source name so the operator knows which
/// dataset to look at.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch source `{source_name}` from {url}: {cause}")]
    Failed { source_name: String, url: String, cause: String },

    #[error("failed to fetch source `{source_name}` and no cached copy exists at {path}: {cause}")]
    NoCache { source_name: String, path: String, cause: String },
}

/// A phase-level failure that aborts the remaining phases.
#[derive(Debug, Error)]
#[error("phase `{phase}` failed: {cause:#}")]
pub struct PipelineError {
    pub phase: Phase,
    pub cause: anyhow::Error,
}
