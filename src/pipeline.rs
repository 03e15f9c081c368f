use std::{fmt, time::{Duration, Instant}};

use anyhow::Result;
use tracing::info;

use crate::{
    acquire::{Fetcher, SourceBytes, acquire_sources},
    cluster::{NeighborhoodCluster, cluster_neighborhoods, merge_assignments},
    config::{Config, Scope},
    crosswalk::{CrosswalkRow, MappingResult, build_crosswalk},
    error::PipelineError,
    geom::{JoinIssue, JoinResult, join_tracts},
    output::{Artifacts, Manifest, write_outputs},
    validate::{Findings, ValidationReport, Validator},
};

/// The five pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Acquire,
    MapZips,
    SpatialJoin,
    Cluster,
    Output,
}

impl Phase {
    pub const ALL: [Phase; 5] = [Phase::Acquire, Phase::MapZips, Phase::SpatialJoin, Phase::Cluster, Phase::Output];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Acquire => "acquire",
            Phase::MapZips => "zip-to-tract",
            Phase::SpatialJoin => "spatial-join",
            Phase::Cluster => "cluster",
            Phase::Output => "output",
        }
    }

    fn index(&self) -> usize {
        Phase::ALL.iter().position(|p| p == self).unwrap_or_default()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Pending,
    Running,
    Complete,
    Error,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Running => "running",
            PhaseStatus::Complete => "complete",
            PhaseStatus::Error => "error",
        })
    }
}

/// Per-phase status, echoed to stdout on every transition when `echo` is set.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    statuses: [PhaseStatus; 5],
    echo: bool,
}

impl StatusBoard {
    pub fn new(echo: bool) -> Self {
        let board = Self { statuses: [PhaseStatus::Pending; 5], echo };
        for phase in Phase::ALL {
            board.print(phase);
        }
        board
    }

    pub fn status(&self, phase: Phase) -> PhaseStatus {
        self.statuses[phase.index()]
    }

    fn set(&mut self, phase: Phase, status: PhaseStatus) {
        self.statuses[phase.index()] = status;
        self.print(phase);
    }

    fn print(&self, phase: Phase) {
        if self.echo {
            println!("[{}/{}] {:<14} {}", phase.index() + 1, Phase::ALL.len(), phase.as_str(), self.status(phase));
        }
    }

    /// Run one phase, recording its status. An error aborts with the phase attached.
    fn step<T>(&mut self, phase: Phase, f: impl FnOnce() -> Result<T>) -> Result<T, PipelineError> {
        self.set(phase, PhaseStatus::Running);
        let started = Instant::now();
        match f() {
            Ok(value) => {
                self.set(phase, PhaseStatus::Complete);
                info!(%phase, elapsed_ms = started.elapsed().as_millis() as u64, "phase complete");
                Ok(value)
            }
            Err(cause) => {
                self.set(phase, PhaseStatus::Error);
                Err(PipelineError { phase, cause })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Ignore cache freshness and refetch every source.
    pub force_fetch: bool,
    /// Print per-phase status lines and the run duration to stdout.
    pub echo_status: bool,
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub sources: SourceBytes,
    pub mapping: MappingResult,
    pub join: JoinResult,
    /// Crosswalk tracts with no boundary feature, which the join never saw.
    pub missing_boundaries: Vec<JoinIssue>,
    /// Crosswalk rows with neighborhood assignments.
    pub rows: Vec<CrosswalkRow>,
    pub clusters: Vec<NeighborhoodCluster>,
    pub report: ValidationReport,
    pub manifest: Manifest,
    pub elapsed: Duration,
}

/// Validate the enriched crosswalk against the scope and the earlier phases' findings.
/// `unassigned` lists every tract left without a neighborhood, for whatever reason.
pub fn validate_crosswalk(
    rows: &[CrosswalkRow],
    scope: &Scope,
    mapping: &MappingResult,
    unassigned: &[JoinIssue],
) -> Result<ValidationReport> {
    Ok(Validator::new(scope)?.validate(rows, Findings {
        skipped_rows: &mapping.issues,
        collapsed_duplicates: &mapping.duplicates,
        unassigned_tracts: unassigned,
    }))
}

/// Run all five phases in order. Each phase receives only what earlier phases returned.
/// The run duration is printed whether or not a phase fails.
pub fn run_pipeline(config: &Config, fetcher: &dyn Fetcher, options: RunOptions) -> Result<PipelineOutput, PipelineError> {
    let started = Instant::now();
    let mut board = StatusBoard::new(options.echo_status);
    let result = run_phases(config, fetcher, options, &mut board);

    let elapsed = started.elapsed();
    if options.echo_status {
        println!("{}", duration_line(result.as_ref().err(), elapsed));
    }
    result.map(|output| PipelineOutput { elapsed, ..output })
}

fn duration_line(failure: Option<&PipelineError>, elapsed: Duration) -> String {
    match failure {
        None => format!("finished in {elapsed:.2?}"),
        Some(err) => format!("failed in {elapsed:.2?} during {}", err.phase),
    }
}

fn run_phases(
    config: &Config,
    fetcher: &dyn Fetcher,
    options: RunOptions,
    board: &mut StatusBoard,
) -> Result<PipelineOutput, PipelineError> {
    let (scope, sources) = board.step(Phase::Acquire, || {
        config.validate()?;
        let scope = config.scope();
        let sources = acquire_sources(config, fetcher, options.force_fetch)?;
        info!(
            weights = %sources.weights.status, tracts = %sources.tracts.status,
            neighborhoods = %sources.neighborhoods.status, "sources ready",
        );
        Ok((scope, sources))
    })?;

    let mapping = board.step(Phase::MapZips, || build_crosswalk(&sources.weights.bytes, &scope))?;

    let join = board.step(Phase::SpatialJoin, || {
        join_tracts(&sources.tracts.bytes, &sources.neighborhoods.bytes, &scope)
    })?;

    let (rows, missing_boundaries, clusters) = board.step(Phase::Cluster, || {
        let (rows, missing) = merge_assignments(&mapping.rows, &join.assignments);
        let clusters = cluster_neighborhoods(&rows);
        Ok((rows, missing, clusters))
    })?;

    let (report, manifest) = board.step(Phase::Output, || {
        let unassigned: Vec<JoinIssue> = join.issues.iter()
            .chain(&missing_boundaries)
            .cloned()
            .collect();
        let report = validate_crosswalk(&rows, &scope, &mapping, &unassigned)?;
        let manifest = write_outputs(&config.out_dir, &scope.county_fips(), &Artifacts {
            rows: &rows,
            clusters: &clusters,
            assignments: &join.assignments,
            report: &report,
        })?;
        Ok((report, manifest))
    })?;

    Ok(PipelineOutput {
        sources, mapping, join, missing_boundaries, rows, clusters, report, manifest,
        elapsed: Duration::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_records_status() {
        let mut board = StatusBoard::new(false);
        assert_eq!(board.status(Phase::Cluster), PhaseStatus::Pending);

        assert_eq!(board.step(Phase::Acquire, || Ok(1)).unwrap(), 1);
        assert_eq!(board.status(Phase::Acquire), PhaseStatus::Complete);

        let err = board.step::<()>(Phase::MapZips, || anyhow::bail!("bad table")).unwrap_err();
        assert_eq!(err.phase, Phase::MapZips);
        assert_eq!(board.status(Phase::MapZips), PhaseStatus::Error);
        assert!(err.to_string().contains("zip-to-tract"));
        assert!(err.to_string().contains("bad table"));
    }

    #[test]
    fn duration_is_reported_for_failed_runs() {
        let err = PipelineError { phase: Phase::SpatialJoin, cause: anyhow::anyhow!("bad geometry") };
        assert_eq!(duration_line(Some(&err), Duration::from_millis(1500)), "failed in 1.50s during spatial-join");
        assert_eq!(duration_line(None, Duration::from_millis(250)), "finished in 250.00ms");
    }

    #[test]
    fn invalid_config_fails_in_acquire_without_panicking() {
        let config = Config { county_fips: "éab".into(), ..Config::default() };
        let fetcher = crate::acquire::MemFetcher::default();
        let err = run_pipeline(&config, &fetcher, RunOptions::default()).unwrap_err();
        assert_eq!(err.phase, Phase::Acquire);
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn phases_are_ordered() {
        let indices: Vec<_> = Phase::ALL.iter().map(Phase::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }
}
