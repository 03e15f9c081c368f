mod bbox;
mod features;
mod join;

use anyhow::Result;

use bbox::NeighborhoodBounds;
pub use features::{
    NEIGHBORHOOD_CODE_PROPERTIES, NEIGHBORHOOD_NAME_PROPERTIES, NeighborhoodGeometry, Shape,
    TRACT_CODE_PROPERTIES, TRACT_COUNTY_PROPERTIES, TRACT_ID_PROPERTIES, TRACT_STATE_PROPERTIES,
    TractGeometry, UNKNOWN_CODE, UNKNOWN_NAME, read_neighborhood_geometries, read_tract_geometries,
};
pub use join::{
    Confidence, JoinFailure, JoinIssue, JoinMethod, JoinResult, NeighborhoodIndex, TractAssignment,
    assign_tract, representative_point, spatial_join,
};

use crate::config::Scope;

/// Parse both boundary collections and assign every in-scope tract to a neighborhood.
pub fn join_tracts(tract_bytes: &[u8], neighborhood_bytes: &[u8], scope: &Scope) -> Result<JoinResult> {
    let tracts = read_tract_geometries(tract_bytes, scope)?;
    let index = NeighborhoodIndex::new(read_neighborhood_geometries(neighborhood_bytes)?);
    Ok(spatial_join(&tracts, &index))
}
