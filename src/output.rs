use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    cluster::NeighborhoodCluster,
    common::{ensure_dir_exists, sha256_hex, to_json_bytes, write_atomic, write_csv_bytes},
    crosswalk::CrosswalkRow,
    geom::TractAssignment,
    validate::ValidationReport,
};

pub const CROSSWALK_JSON: &str = "crosswalk.json";
pub const CROSSWALK_CSV: &str = "crosswalk.csv";
pub const CLUSTERS_JSON: &str = "nta_clusters.json";
pub const ASSIGNMENTS_JSON: &str = "tract_assignments.json";
pub const REPORT_JSON: &str = "validation_report.json";
pub const MANIFEST_JSON: &str = "manifest.json";

/// Everything the output phase serializes.
#[derive(Debug, Clone, Copy)]
pub struct Artifacts<'a> {
    pub rows: &'a [CrosswalkRow],
    pub clusters: &'a [NeighborhoodCluster],
    pub assignments: &'a [TractAssignment],
    pub report: &'a ValidationReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub sha256: String,
    pub records: usize,
}

/// Content hashes of one run's outputs. Carries no timestamps, so identical inputs
/// give an identical manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub county_fips: String,
    pub is_valid: bool,
    pub files: BTreeMap<String, FileEntry>,
}

fn text_column(name: &str, rows: &[CrosswalkRow], field: impl Fn(&CrosswalkRow) -> &str) -> Column {
    Column::new(name.into(), rows.iter().map(field).collect::<Vec<&str>>())
}

fn number_column(name: &str, rows: &[CrosswalkRow], field: impl Fn(&CrosswalkRow) -> f64) -> Column {
    Column::new(name.into(), rows.iter().map(field).collect::<Vec<f64>>())
}

/// Build the tabular crosswalk with its fixed column order.
pub fn crosswalk_dataframe(rows: &[CrosswalkRow]) -> Result<DataFrame> {
    let [zip, county, state, geoid, tract, res, tot, code, name] = CrosswalkRow::COLUMNS;

    Ok(DataFrame::new(vec![
        text_column(zip, rows, |r| r.zip.as_str()),
        text_column(county, rows, |r| r.county_fips.as_str()),
        text_column(state, rows, |r| r.state_fips.as_str()),
        text_column(geoid, rows, |r| r.tract_geoid.as_str()),
        text_column(tract, rows, |r| r.tract.as_str()),
        number_column(res, rows, |r| r.weight_res),
        number_column(tot, rows, |r| r.weight_tot),
        text_column(code, rows, |r| r.nta_code.as_str()),
        text_column(name, rows, |r| r.nta_name.as_str()),
    ])?)
}

/// Serialize every artifact into `out_dir` (atomically, file by file) and write the manifest last.
pub fn write_outputs(out_dir: &Path, county_fips: &str, artifacts: &Artifacts<'_>) -> Result<Manifest> {
    ensure_dir_exists(out_dir)?;

    let mut csv_frame = crosswalk_dataframe(artifacts.rows)?;
    let files: Vec<(&str, Vec<u8>, usize)> = vec![
        (CROSSWALK_JSON, to_json_bytes(artifacts.rows)?, artifacts.rows.len()),
        (CROSSWALK_CSV, write_csv_bytes(&mut csv_frame)?, artifacts.rows.len()),
        (CLUSTERS_JSON, to_json_bytes(artifacts.clusters)?, artifacts.clusters.len()),
        (ASSIGNMENTS_JSON, to_json_bytes(artifacts.assignments)?, artifacts.assignments.len()),
        (REPORT_JSON, to_json_bytes(artifacts.report)?, artifacts.report.errors.len() + artifacts.report.warnings.len()),
    ];

    let mut entries = BTreeMap::new();
    for (name, bytes, records) in files {
        let path = out_dir.join(name);
        write_atomic(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(file = %path.display(), bytes = bytes.len(), records, "wrote output");
        entries.insert(name.to_string(), FileEntry { sha256: sha256_hex(&bytes), records });
    }

    let manifest = Manifest {
        version: "1".into(),
        county_fips: county_fips.to_string(),
        is_valid: artifacts.report.is_valid,
        files: entries,
    };
    write_atomic(&out_dir.join(MANIFEST_JSON), &to_json_bytes(&manifest)?)?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationSummary;

    fn rows() -> Vec<CrosswalkRow> {
        vec![CrosswalkRow {
            zip: "10456".into(),
            county_fips: "005".into(),
            state_fips: "36".into(),
            tract_geoid: "36005012300".into(),
            tract: "012300".into(),
            weight_res: 0.6,
            weight_tot: 0.5,
            nta_code: "BX35".into(),
            nta_name: "Morrisania-Melrose".into(),
        }]
    }

    #[test]
    fn csv_has_fixed_header_and_keeps_zeros() {
        let mut df = crosswalk_dataframe(&rows()).unwrap();
        let csv = String::from_utf8(write_csv_bytes(&mut df).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("zip,county_fips,state_fips,tract_geoid,tract,weight_res,weight_tot,nta_code,nta_name"));
        let fields: Vec<_> = lines.next().unwrap().split(',').collect();
        assert_eq!(&fields[..5], &["10456", "005", "36", "36005012300", "012300"]);
        assert_eq!(&fields[7..], &["BX35", "Morrisania-Melrose"]);
    }

    #[test]
    fn writes_all_files_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let rows = rows();
        let report = ValidationReport::new(vec![], vec![], ValidationSummary::default());
        let artifacts = Artifacts { rows: &rows, clusters: &[], assignments: &[], report: &report };

        let manifest = write_outputs(dir.path(), "36005", &artifacts).unwrap();
        for name in [CROSSWALK_JSON, CROSSWALK_CSV, CLUSTERS_JSON, ASSIGNMENTS_JSON, REPORT_JSON, MANIFEST_JSON] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
        assert_eq!(manifest.files.len(), 5);
        assert_eq!(manifest.files[CROSSWALK_JSON].records, 1);

        let on_disk: Manifest = serde_json::from_slice(&std::fs::read(dir.path().join(MANIFEST_JSON)).unwrap()).unwrap();
        assert_eq!(on_disk, manifest);

        let json: Vec<CrosswalkRow> = serde_json::from_slice(&std::fs::read(dir.path().join(CROSSWALK_JSON)).unwrap()).unwrap();
        assert_eq!(json, rows);
    }
}
