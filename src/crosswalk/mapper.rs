use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Scope;

use super::{
    CrosswalkRow, UNASSIGNED_CODE, UNASSIGNED_NAME, WeightRow,
    build_tract_geoid, normalize_county, normalize_state, normalize_tract, normalize_zip, split_tract_geoid,
};

/// Why a raw row was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingField { field: &'static str },
    MalformedField { field: &'static str, value: String },
    NullWeight { field: &'static str },
    UnparseableWeight { field: &'static str, value: String },
    WeightOutOfRange { field: &'static str, value: f64 },
}

/// A rejected input row, with enough context to find it in the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    pub zip: Option<String>,
    pub tract: Option<String>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A (zip, tract) key that appeared more than once; only the first occurrence is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub zip: String,
    pub tract_geoid: String,
    /// Line of the dropped occurrence.
    pub line: usize,
    /// Line of the kept occurrence.
    pub kept_line: usize,
}

/// Output of the ZIP-to-tract phase.
#[derive(Debug, Clone, Default)]
pub struct MappingResult {
    /// Deduplicated rows sorted by (zip, tract_geoid), not yet assigned to neighborhoods.
    pub rows: Vec<CrosswalkRow>,
    pub issues: Vec<RowIssue>,
    pub duplicates: Vec<DuplicateKey>,
    pub input_rows: usize,
    pub out_of_scope: usize,
}

impl MappingResult {
    pub fn null_weights(&self) -> usize {
        self.issues.iter()
            .filter(|issue| matches!(issue.reason, SkipReason::NullWeight { .. }))
            .count()
    }
}

/// Result of mapping a single raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Keep(CrosswalkRow),
    /// Valid but outside the configured county or ZIP set.
    OutOfScope,
    Reject(RowIssue),
}

/// Map one raw row to a crosswalk row, deciding scope and validity.
///
/// Order matters: a row whose ZIP is outside the ZIP set is out of scope even if its
/// other fields are broken, so rows from other counties never produce issues.
pub fn map_row(row: &WeightRow, scope: &Scope) -> RowOutcome {
    let reject = |reason: SkipReason| RowOutcome::Reject(RowIssue {
        line: row.line,
        zip: row.zip.clone(),
        tract: row.tract.clone(),
        reason,
    });

    let Some(raw_zip) = &row.zip else { return reject(SkipReason::MissingField { field: "zip" }) };
    let Some(zip) = normalize_zip(raw_zip) else {
        return reject(SkipReason::MalformedField { field: "zip", value: raw_zip.clone() });
    };
    if !scope.contains_zip(&zip) {
        return RowOutcome::OutOfScope;
    }

    let Some(raw_tract) = &row.tract else { return reject(SkipReason::MissingField { field: "tract" }) };
    let Some(tract) = normalize_tract(raw_tract) else {
        return reject(SkipReason::MalformedField { field: "tract", value: raw_tract.clone() });
    };
    let embedded = split_tract_geoid(raw_tract);

    // County: explicit column first, then the prefix of a full tract GEOID.
    let (county_state, county_code) = match &row.county {
        Some(raw) => match normalize_county(raw) {
            Some(parsed) => parsed,
            None => return reject(SkipReason::MalformedField { field: "county", value: raw.clone() }),
        },
        None => match &embedded {
            Some((state, county, _)) => (Some(state.clone()), county.clone()),
            None => return reject(SkipReason::MissingField { field: "county" }),
        },
    };

    // State: explicit FIPS column, then county prefix, then GEOID prefix, then the run's state.
    let state_fips = row.state.as_deref().and_then(normalize_state)
        .or(county_state)
        .or_else(|| embedded.as_ref().map(|(state, _, _)| state.clone()))
        .unwrap_or_else(|| scope.state_fips.clone());

    if !scope.contains_county(&state_fips, &county_code) {
        return RowOutcome::OutOfScope;
    }

    let weight_res = match parse_weight("weight_res", row.weight_res.as_deref()) {
        Ok(w) => w,
        Err(reason) => return reject(reason),
    };
    let weight_tot = match parse_weight("weight_tot", row.weight_tot.as_deref()) {
        Ok(w) => w,
        Err(reason) => return reject(reason),
    };

    RowOutcome::Keep(CrosswalkRow {
        tract_geoid: build_tract_geoid(&state_fips, &county_code, &tract),
        zip,
        county_fips: county_code,
        state_fips,
        tract,
        weight_res,
        weight_tot,
        nta_code: UNASSIGNED_CODE.to_string(),
        nta_name: UNASSIGNED_NAME.to_string(),
    })
}

/// Parse a ratio cell, requiring a finite value in [0, 1].
fn parse_weight(field: &'static str, raw: Option<&str>) -> Result<f64, SkipReason> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Err(SkipReason::NullWeight { field }),
        Some(s) if ["na", "nan", "null", "none"].contains(&s.to_ascii_lowercase().as_str()) => {
            return Err(SkipReason::NullWeight { field });
        }
        Some(s) => s,
    };
    let value: f64 = raw.parse()
        .map_err(|_| SkipReason::UnparseableWeight { field, value: raw.to_string() })?;
    if value.is_nan() {
        return Err(SkipReason::NullWeight { field });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(SkipReason::WeightOutOfRange { field, value });
    }
    Ok(value)
}

/// Rows and issues gathered while folding over the raw table.
#[derive(Default)]
struct Fold {
    kept: Vec<(usize, CrosswalkRow)>,
    issues: Vec<RowIssue>,
    out_of_scope: usize,
}

/// Build the deduplicated, sorted crosswalk rows for the configured scope.
/// Bad rows are skipped and reported, never fatal.
pub fn map_weight_rows(raw: &[WeightRow], scope: &Scope) -> MappingResult {
    let fold = raw.iter().fold(Fold::default(), |mut acc, row| {
        match map_row(row, scope) {
            RowOutcome::Keep(mapped) => acc.kept.push((row.line, mapped)),
            RowOutcome::OutOfScope => acc.out_of_scope += 1,
            RowOutcome::Reject(issue) => acc.issues.push(issue),
        }
        acc
    });

    for issue in &fold.issues {
        warn!(line = issue.line, zip = ?issue.zip, tract = ?issue.tract, reason = ?issue.reason, "skipping weight row");
    }

    let (rows, duplicates) = dedup_rows(fold.kept);
    if !duplicates.is_empty() {
        info!(dropped = duplicates.len(), "collapsed duplicate (zip, tract) rows");
    }
    debug!(
        input = raw.len(), kept = rows.len(), skipped = fold.issues.len(),
        out_of_scope = fold.out_of_scope, "mapped weight table",
    );

    MappingResult {
        rows,
        issues: fold.issues,
        duplicates,
        input_rows: raw.len(),
        out_of_scope: fold.out_of_scope,
    }
}

/// Collapse rows sharing a (zip, tract_geoid) key, keeping the first in input order.
/// The BTreeMap also yields the rows in key order.
fn dedup_rows(rows: Vec<(usize, CrosswalkRow)>) -> (Vec<CrosswalkRow>, Vec<DuplicateKey>) {
    let mut unique: BTreeMap<(String, String), (usize, CrosswalkRow)> = BTreeMap::new();
    let mut duplicates = Vec::new();

    for (line, row) in rows {
        let key = (row.zip.clone(), row.tract_geoid.clone());
        match unique.get(&key) {
            Some((kept_line, _)) => duplicates.push(DuplicateKey {
                zip: key.0,
                tract_geoid: key.1,
                line,
                kept_line: *kept_line,
            }),
            None => { unique.insert(key, (line, row)); }
        }
    }

    (unique.into_values().map(|(_, row)| row).collect(), duplicates)
}
