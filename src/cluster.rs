use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    crosswalk::{CrosswalkRow, UNASSIGNED_CODE, UNASSIGNED_NAME},
    geom::{JoinFailure, JoinIssue, TractAssignment},
};

/// A neighborhood and the tracts and ZIPs that fall in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodCluster {
    pub nta_code: String,
    pub nta_name: String,
    /// Sorted, unique.
    pub tract_geoids: Vec<String>,
    /// Sorted, unique.
    pub zips: Vec<String>,
    pub tract_count: usize,
    pub zip_count: usize,
}

/// Overwrite each row's neighborhood from the tract assignment table.
/// Rows whose tract has no assignment get the unassigned sentinel, and each such
/// tract is returned once, sorted, as a `NoBoundary` issue.
pub fn merge_assignments(rows: &[CrosswalkRow], assignments: &[TractAssignment]) -> (Vec<CrosswalkRow>, Vec<JoinIssue>) {
    let lookup: HashMap<&str, &TractAssignment> = assignments.iter()
        .map(|a| (a.tract_geoid.as_str(), a))
        .collect();
    let mut missing: BTreeSet<&str> = BTreeSet::new();

    let merged: Vec<CrosswalkRow> = rows.iter()
        .map(|row| {
            let (code, name) = match lookup.get(row.tract_geoid.as_str()) {
                Some(a) => (a.nta_code.as_str(), a.nta_name.as_str()),
                None => {
                    missing.insert(row.tract_geoid.as_str());
                    (UNASSIGNED_CODE, UNASSIGNED_NAME)
                }
            };
            CrosswalkRow { nta_code: code.to_string(), nta_name: name.to_string(), ..row.clone() }
        })
        .collect();

    let issues: Vec<JoinIssue> = missing.into_iter()
        .map(|geoid| JoinIssue { tract_geoid: geoid.to_string(), reason: JoinFailure::NoBoundary })
        .collect();
    for issue in &issues {
        warn!(tract = %issue.tract_geoid, reason = %issue.reason, "tract left unassigned");
    }

    (merged, issues)
}

/// Group enriched rows by neighborhood code, sorted by code. Unassigned rows form no cluster.
pub fn cluster_neighborhoods(rows: &[CrosswalkRow]) -> Vec<NeighborhoodCluster> {
    // code -> (name, tracts, zips); BTree collections give sorted, unique members
    let mut groups: BTreeMap<&str, (&str, BTreeSet<&str>, BTreeSet<&str>)> = BTreeMap::new();

    for row in rows.iter().filter(|row| row.is_assigned()) {
        let (_, tracts, zips) = groups.entry(row.nta_code.as_str())
            .or_insert_with(|| (row.nta_name.as_str(), BTreeSet::new(), BTreeSet::new()));
        tracts.insert(row.tract_geoid.as_str());
        zips.insert(row.zip.as_str());
    }

    let clusters: Vec<NeighborhoodCluster> = groups.into_iter()
        .map(|(code, (name, tracts, zips))| {
            let tract_geoids: Vec<String> = tracts.into_iter().map(str::to_string).collect();
            let zips: Vec<String> = zips.into_iter().map(str::to_string).collect();
            NeighborhoodCluster {
                nta_code: code.to_string(),
                nta_name: name.to_string(),
                tract_count: tract_geoids.len(),
                zip_count: zips.len(),
                tract_geoids,
                zips,
            }
        })
        .collect();

    debug!(clusters = clusters.len(), "clustered neighborhoods");
    clusters
}
