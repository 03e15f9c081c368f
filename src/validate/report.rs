use serde::Serialize;

use crate::{crosswalk::{DuplicateKey, RowIssue}, geom::JoinIssue};

/// A problem found in the crosswalk, tagged by `kind` in the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    // Errors: the output is wrong or unsafe to rely on.
    MalformedZip { zip: String, tract_geoid: String },
    UnexpectedZip { zip: String, tract_geoid: String },
    MalformedStateFips { zip: String, tract_geoid: String, value: String },
    MalformedCountyFips { zip: String, tract_geoid: String, value: String },
    MalformedTractGeoid { zip: String, tract_geoid: String },
    InconsistentTractGeoid { zip: String, tract_geoid: String, expected: String },
    WeightOutOfRange { zip: String, tract_geoid: String, field: &'static str, value: f64 },
    NullWeight { zip: String, tract_geoid: String, field: &'static str },
    DuplicateRow { zip: String, tract_geoid: String, count: usize },

    // Warnings: unusual but usable.
    MissingExpectedZip { zip: String },
    SkippedRow {
        #[serde(flatten)]
        issue: RowIssue,
    },
    DuplicateCollapsed {
        #[serde(flatten)]
        duplicate: DuplicateKey,
    },
    UnassignedTract {
        #[serde(flatten)]
        issue: JoinIssue,
    },
}

/// Aggregate counts over the validated crosswalk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub total_zips: usize,
    pub total_tracts: usize,
    pub total_ntas: usize,
    /// Collapsed during mapping plus any still present in the output.
    pub duplicate_rows: usize,
    /// Excluded during mapping plus any still present in the output.
    pub null_weights: usize,
}

/// Data-quality verdict for one pipeline run. Any error makes it invalid; warnings never do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn new(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>, summary: ValidationSummary) -> Self {
        Self { is_valid: errors.is_empty(), errors, warnings, summary }
    }
}
