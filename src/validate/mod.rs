mod report;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use regex::Regex;
use tracing::{debug, warn};

pub use report::{ValidationIssue, ValidationReport, ValidationSummary};

use crate::{
    config::Scope,
    crosswalk::{CrosswalkRow, DuplicateKey, RowIssue, SkipReason, build_tract_geoid},
    geom::JoinIssue,
};

/// Issues recorded by earlier phases that the report carries as warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Findings<'a> {
    pub skipped_rows: &'a [RowIssue],
    pub collapsed_duplicates: &'a [DuplicateKey],
    pub unassigned_tracts: &'a [JoinIssue],
}

/// Data-quality checks over a finished crosswalk.
pub struct Validator<'a> {
    scope: &'a Scope,
    zip: Regex,
    state: Regex,
    county: Regex,
    geoid: Regex,
}

impl<'a> Validator<'a> {
    pub fn new(scope: &'a Scope) -> Result<Self> {
        Ok(Self {
            scope,
            zip: Regex::new(r"^\d{5}$")?,
            state: Regex::new(r"^\d{2}$")?,
            county: Regex::new(r"^\d{3}$")?,
            geoid: Regex::new(r"^\d{11}$")?,
        })
    }

    /// Check every row and fold the earlier phases' findings into one report.
    pub fn validate(&self, rows: &[CrosswalkRow], findings: Findings<'_>) -> ValidationReport {
        let mut errors: Vec<ValidationIssue> = rows.iter().flat_map(|row| self.check_row(row)).collect();

        let duplicates = duplicate_keys(rows);
        let duplicate_extra: usize = duplicates.iter().map(|(_, count)| count - 1).sum();
        errors.extend(duplicates.into_iter().map(|((zip, tract_geoid), count)| {
            ValidationIssue::DuplicateRow { zip, tract_geoid, count }
        }));

        let present: BTreeSet<&str> = rows.iter().map(|r| r.zip.as_str()).collect();
        let mut warnings: Vec<ValidationIssue> = self.scope.zips.iter()
            .filter(|zip| !present.contains(zip.as_str()))
            .map(|zip| ValidationIssue::MissingExpectedZip { zip: zip.clone() })
            .collect();
        warnings.extend(findings.skipped_rows.iter().cloned().map(|issue| ValidationIssue::SkippedRow { issue }));
        warnings.extend(findings.collapsed_duplicates.iter().cloned().map(|duplicate| ValidationIssue::DuplicateCollapsed { duplicate }));
        warnings.extend(findings.unassigned_tracts.iter().cloned().map(|issue| ValidationIssue::UnassignedTract { issue }));

        let null_in_output = errors.iter().filter(|e| matches!(e, ValidationIssue::NullWeight { .. })).count();
        let null_skipped = findings.skipped_rows.iter()
            .filter(|issue| matches!(issue.reason, SkipReason::NullWeight { .. }))
            .count();

        let summary = ValidationSummary {
            total_zips: present.len(),
            total_tracts: rows.iter().map(|r| r.tract_geoid.as_str()).collect::<BTreeSet<_>>().len(),
            total_ntas: rows.iter().filter(|r| r.is_assigned()).map(|r| r.nta_code.as_str()).collect::<BTreeSet<_>>().len(),
            duplicate_rows: findings.collapsed_duplicates.len() + duplicate_extra,
            null_weights: null_skipped + null_in_output,
        };

        for error in &errors {
            warn!(?error, "validation error");
        }
        debug!(errors = errors.len(), warnings = warnings.len(), ?summary, "validation complete");

        ValidationReport::new(errors, warnings, summary)
    }

    /// Per-row format, consistency and range checks.
    fn check_row(&self, row: &CrosswalkRow) -> Vec<ValidationIssue> {
        let zip = || row.zip.clone();
        let tract_geoid = || row.tract_geoid.clone();
        let mut issues = Vec::new();

        if !self.zip.is_match(&row.zip) {
            issues.push(ValidationIssue::MalformedZip { zip: zip(), tract_geoid: tract_geoid() });
        } else if !self.scope.contains_zip(&row.zip) {
            issues.push(ValidationIssue::UnexpectedZip { zip: zip(), tract_geoid: tract_geoid() });
        }
        if !self.state.is_match(&row.state_fips) {
            issues.push(ValidationIssue::MalformedStateFips { zip: zip(), tract_geoid: tract_geoid(), value: row.state_fips.clone() });
        }
        if !self.county.is_match(&row.county_fips) {
            issues.push(ValidationIssue::MalformedCountyFips { zip: zip(), tract_geoid: tract_geoid(), value: row.county_fips.clone() });
        }
        if !self.geoid.is_match(&row.tract_geoid) {
            issues.push(ValidationIssue::MalformedTractGeoid { zip: zip(), tract_geoid: tract_geoid() });
        } else {
            let expected = build_tract_geoid(&row.state_fips, &row.county_fips, &row.tract);
            if expected != row.tract_geoid {
                issues.push(ValidationIssue::InconsistentTractGeoid { zip: zip(), tract_geoid: tract_geoid(), expected });
            }
        }

        for (field, value) in [("weight_res", row.weight_res), ("weight_tot", row.weight_tot)] {
            if value.is_nan() {
                issues.push(ValidationIssue::NullWeight { zip: zip(), tract_geoid: tract_geoid(), field });
            } else if !(0.0..=1.0).contains(&value) {
                issues.push(ValidationIssue::WeightOutOfRange { zip: zip(), tract_geoid: tract_geoid(), field, value });
            }
        }

        issues
    }
}

/// (zip, tract_geoid) keys occurring more than once, with their counts, in key order.
fn duplicate_keys(rows: &[CrosswalkRow]) -> Vec<((String, String), usize)> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.key()).or_default() += 1;
    }
    counts.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((zip, geoid), count)| ((zip.to_string(), geoid.to_string()), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        crosswalk::{UNASSIGNED_CODE, UNASSIGNED_NAME},
        geom::JoinFailure,
    };

    fn scope() -> Scope {
        Config { zips: vec!["10456".into(), "10457".into()], ..Config::default() }.scope()
    }

    fn row(zip: &str, geoid: &str, nta: &str) -> CrosswalkRow {
        CrosswalkRow {
            zip: zip.into(),
            county_fips: geoid.get(2..5).unwrap_or_default().into(),
            state_fips: geoid.get(..2).unwrap_or_default().into(),
            tract_geoid: geoid.into(),
            tract: geoid.get(5..).unwrap_or_default().into(),
            weight_res: 0.5,
            weight_tot: 0.5,
            nta_code: nta.into(),
            nta_name: if nta == UNASSIGNED_CODE { UNASSIGNED_NAME.into() } else { format!("{nta} name") },
        }
    }

    #[test]
    fn clean_crosswalk_is_valid() {
        let scope = scope();
        let rows = vec![row("10456", "36005012300", "BX35"), row("10457", "36005012400", "BX35")];
        let report = Validator::new(&scope).unwrap().validate(&rows, Findings::default());

        assert!(report.is_valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(report.summary, ValidationSummary {
            total_zips: 2, total_tracts: 2, total_ntas: 1, duplicate_rows: 0, null_weights: 0,
        });
    }

    #[test]
    fn missing_zip_is_one_warning_per_zip() {
        let scope = scope();
        let rows = vec![row("10456", "36005012300", "BX35")];
        let report = Validator::new(&scope).unwrap().validate(&rows, Findings::default());

        assert!(report.is_valid);
        assert_eq!(report.warnings, vec![ValidationIssue::MissingExpectedZip { zip: "10457".into() }]);
    }

    #[test]
    fn duplicates_are_errors() {
        let scope = scope();
        let rows = vec![
            row("10456", "36005012300", "BX35"),
            row("10456", "36005012300", "BX35"),
            row("10457", "36005012400", "BX35"),
        ];
        let report = Validator::new(&scope).unwrap().validate(&rows, Findings::default());

        assert!(!report.is_valid);
        assert_eq!(report.errors, vec![ValidationIssue::DuplicateRow {
            zip: "10456".into(), tract_geoid: "36005012300".into(), count: 2,
        }]);
        assert_eq!(report.summary.duplicate_rows, 1);
    }

    #[test]
    fn malformed_identifiers_and_weights_are_errors() {
        let scope = scope();
        let mut bad_weight = row("10456", "36005012300", "BX35");
        bad_weight.weight_tot = 1.2;
        let mut null_weight = row("10456", "36005012500", "BX35");
        null_weight.weight_res = f64::NAN;
        let mut inconsistent = row("10457", "36005012400", "BX35");
        inconsistent.tract = "012401".into();
        let rows = vec![
            bad_weight,
            null_weight,
            inconsistent,
            row("1045", "3600501230", "BX35"),
            row("10001", "36061000100", "MN01"),
        ];

        let report = Validator::new(&scope).unwrap().validate(&rows, Findings::default());
        let kinds: Vec<_> = report.errors.iter().map(|e| serde_json::to_value(e).unwrap()["kind"].as_str().unwrap().to_string()).collect();
        assert!(!report.is_valid);
        assert_eq!(kinds, vec![
            "weight_out_of_range",
            "null_weight",
            "inconsistent_tract_geoid",
            "malformed_zip",
            "malformed_tract_geoid",
            "unexpected_zip",
        ]);
        assert_eq!(report.summary.null_weights, 1);
    }

    #[test]
    fn findings_become_warnings() {
        let scope = scope();
        let rows = vec![row("10456", "36005012300", "BX35"), row("10457", "36005099900", UNASSIGNED_CODE)];
        let skipped = vec![
            RowIssue { line: 4, zip: Some("10456".into()), tract: Some("012500".into()), reason: SkipReason::WeightOutOfRange { field: "weight_res", value: 1.5 } },
            RowIssue { line: 5, zip: Some("10456".into()), tract: Some("012600".into()), reason: SkipReason::NullWeight { field: "weight_tot" } },
        ];
        let collapsed = vec![DuplicateKey { zip: "10456".into(), tract_geoid: "36005012300".into(), line: 3, kept_line: 2 }];
        let unassigned = vec![JoinIssue { tract_geoid: "36005099900".into(), reason: JoinFailure::NoContainingNeighborhood { lon: 1.0, lat: 2.0 } }];

        let report = Validator::new(&scope).unwrap().validate(&rows, Findings {
            skipped_rows: &skipped,
            collapsed_duplicates: &collapsed,
            unassigned_tracts: &unassigned,
        });

        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 4);
        assert_eq!(report.summary.duplicate_rows, 1);
        assert_eq!(report.summary.null_weights, 1);
        assert_eq!(report.summary.total_ntas, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["warnings"][0]["kind"], "skipped_row");
        assert_eq!(json["warnings"][0]["reason"], "weight_out_of_range");
        assert_eq!(json["warnings"][0]["value"], 1.5);
        assert_eq!(json["warnings"][2]["kind"], "duplicate_collapsed");
        assert_eq!(json["warnings"][2]["kept_line"], 2);
        assert_eq!(json["warnings"][3]["tract_geoid"], "36005099900");
    }
}
