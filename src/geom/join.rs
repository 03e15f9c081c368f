use std::fmt;

use geo::{Centroid, Intersects, Point};
use rstar::{RTree, AABB};
use serde::Serialize;
use tracing::{debug, warn};

use crate::crosswalk::{UNASSIGNED_CODE, UNASSIGNED_NAME};

use super::{NeighborhoodBounds, NeighborhoodGeometry, Shape, TractGeometry};

/// How a tract's neighborhood was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMethod {
    /// Representative point tested against neighborhood polygons.
    Centroid,
    /// No representative point could be computed.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

/// The neighborhood a tract belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TractAssignment {
    pub tract_geoid: String,
    pub nta_code: String,
    pub nta_name: String,
    pub method: JoinMethod,
    pub confidence: Confidence,
}

/// Why a tract ended up unassigned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum JoinFailure {
    UnsupportedGeometry { geometry_type: String },
    InvalidGeometry { error: String },
    /// Empty geometry; no centroid exists.
    NoCentroid,
    NonFiniteCentroid,
    NoContainingNeighborhood { lon: f64, lat: f64 },
    /// A crosswalk row names a tract that has no feature in the boundary file.
    NoBoundary,
}

impl fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinFailure::UnsupportedGeometry { geometry_type } => write!(f, "unsupported geometry type {geometry_type}"),
            JoinFailure::InvalidGeometry { error } => write!(f, "malformed geometry: {error}"),
            JoinFailure::NoCentroid => f.write_str("geometry is empty"),
            JoinFailure::NonFiniteCentroid => f.write_str("centroid is not finite"),
            JoinFailure::NoContainingNeighborhood { lon, lat } => write!(f, "no neighborhood contains ({lon}, {lat})"),
            JoinFailure::NoBoundary => f.write_str("tract has no boundary feature"),
        }
    }
}

/// An unassigned tract and the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinIssue {
    pub tract_geoid: String,
    #[serde(flatten)]
    pub reason: JoinFailure,
}

/// Output of the spatial join phase.
#[derive(Debug, Clone, Default)]
pub struct JoinResult {
    /// One assignment per input tract, sorted by tract GEOID.
    pub assignments: Vec<TractAssignment>,
    pub issues: Vec<JoinIssue>,
}

/// Point used to place a tract: the area-weighted centroid of a polygon, or of the
/// first part of a multi-polygon.
pub fn representative_point(shape: &Shape) -> Result<Point<f64>, JoinFailure> {
    let point = match shape {
        Shape::Polygon(polygon) => polygon.centroid(),
        // Only the first part is used; disjoint later parts are ignored.
        Shape::MultiPolygon(multi) => multi.0.first().and_then(|part| part.centroid()),
        Shape::Unsupported(ty) => return Err(JoinFailure::UnsupportedGeometry { geometry_type: ty.clone() }),
        Shape::Invalid(error) => return Err(JoinFailure::InvalidGeometry { error: error.clone() }),
    }.ok_or(JoinFailure::NoCentroid)?;

    if !(point.x().is_finite() && point.y().is_finite()) {
        return Err(JoinFailure::NonFiniteCentroid);
    }
    Ok(point)
}

/// Neighborhood polygons with a bounding-box index. Lookups return the first
/// neighborhood in input order whose area (boundary included) holds the point.
pub struct NeighborhoodIndex {
    neighborhoods: Vec<NeighborhoodGeometry>,
    rtree: RTree<NeighborhoodBounds>,
}

impl NeighborhoodIndex {
    pub fn new(neighborhoods: Vec<NeighborhoodGeometry>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                neighborhoods.iter().enumerate()
                    .filter_map(|(i, n)| NeighborhoodBounds::of(i, &n.shape))
                    .collect()
            ),
            neighborhoods,
        }
    }

    #[inline] pub fn len(&self) -> usize { self.neighborhoods.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.neighborhoods.is_empty() }

    /// Find the neighborhood holding `pt`. Each part of a multi-polygon is tested
    /// on its own; a match on any part is a match.
    pub fn locate(&self, pt: &Point<f64>) -> Option<&NeighborhoodGeometry> {
        // Query the R-tree with a degenerate AABB at `pt`
        let env = AABB::from_corners([pt.x(), pt.y()], [pt.x(), pt.y()]);

        let mut candidates: Vec<usize> = self.rtree
            .locate_in_envelope_intersecting(&env)
            .map(NeighborhoodBounds::position)
            .collect();
        // R-tree order is arbitrary; input order decides ties.
        candidates.sort_unstable();

        candidates.into_iter()
            .map(|i| &self.neighborhoods[i])
            .find(|n| n.shape.0.iter().any(|part| part.intersects(pt)))
    }
}

/// Assign one tract. Never fails: problems yield an unassigned, low-confidence assignment.
pub fn assign_tract(tract: &TractGeometry, index: &NeighborhoodIndex) -> (TractAssignment, Option<JoinIssue>) {
    let unassigned = |method, reason| (
        TractAssignment {
            tract_geoid: tract.geoid.clone(),
            nta_code: UNASSIGNED_CODE.to_string(),
            nta_name: UNASSIGNED_NAME.to_string(),
            method,
            confidence: Confidence::Low,
        },
        Some(JoinIssue { tract_geoid: tract.geoid.clone(), reason }),
    );

    let pt = match representative_point(&tract.shape) {
        Ok(pt) => pt,
        Err(reason) => return unassigned(JoinMethod::None, reason),
    };

    match index.locate(&pt) {
        Some(n) => (
            TractAssignment {
                tract_geoid: tract.geoid.clone(),
                nta_code: n.code.clone(),
                nta_name: n.name.clone(),
                method: JoinMethod::Centroid,
                confidence: Confidence::High,
            },
            None,
        ),
        None => unassigned(JoinMethod::Centroid, JoinFailure::NoContainingNeighborhood { lon: pt.x(), lat: pt.y() }),
    }
}

/// Assign every tract to exactly one neighborhood or to the unassigned sentinel.
pub fn spatial_join(tracts: &[TractGeometry], index: &NeighborhoodIndex) -> JoinResult {
    let mut result = tracts.iter().fold(JoinResult::default(), |mut acc, tract| {
        let (assignment, issue) = assign_tract(tract, index);
        acc.assignments.push(assignment);
        acc.issues.extend(issue);
        acc
    });

    result.assignments.sort_by(|a, b| a.tract_geoid.cmp(&b.tract_geoid));
    result.issues.sort_by(|a, b| a.tract_geoid.cmp(&b.tract_geoid));

    for issue in &result.issues {
        warn!(tract = %issue.tract_geoid, reason = %issue.reason, "tract left unassigned");
    }
    debug!(
        tracts = tracts.len(), neighborhoods = index.len(),
        unassigned = result.issues.len(), "spatial join complete",
    );
    result
}
