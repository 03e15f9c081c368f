use std::collections::BTreeSet;

use anyhow::{Context, Result};
use geo::{MultiPolygon, Polygon};
use tracing::{debug, warn};

use crate::{
    common::{Feature, FeatureGeometry, read_features_from_geojson_bytes},
    config::Scope,
    crosswalk::{normalize_county, normalize_state, normalize_tract, split_tract_geoid},
};

/// Properties holding a full 11-digit tract GEOID, tried in order.
pub const TRACT_ID_PROPERTIES: &[&str] = &["GEOID", "GEOID20", "GEOID10", "geoid", "geoid20"];
/// Component properties used when no GEOID property is present.
pub const TRACT_STATE_PROPERTIES: &[&str] = &["STATEFP", "STATEFP20", "STATEFP10", "STATE"];
pub const TRACT_COUNTY_PROPERTIES: &[&str] = &["COUNTYFP", "COUNTYFP20", "COUNTYFP10", "COUNTY"];
pub const TRACT_CODE_PROPERTIES: &[&str] = &["TRACTCE", "TRACTCE20", "TRACTCE10", "TRACT"];

/// Neighborhood code property names across boundary-file vintages, tried in order.
pub const NEIGHBORHOOD_CODE_PROPERTIES: &[&str] = &[
    "nta2020", "NTA2020", "ntacode", "NTACode", "nta_code", "NTA_CODE", "nta",
];
/// Neighborhood name property names across boundary-file vintages, tried in order.
pub const NEIGHBORHOOD_NAME_PROPERTIES: &[&str] = &[
    "ntaname", "NTAName", "nta_name", "NTA_NAME", "name", "NAME",
];
/// Used when none of the code aliases match.
pub const UNKNOWN_CODE: &str = "UNKNOWN";
/// Used when none of the name aliases match.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Areal shape of an input feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    /// Any other (or missing) geometry; carries the GeoJSON type name.
    Unsupported(String),
    /// Geometry that failed to parse; carries the parse error.
    Invalid(String),
}

impl Shape {
    pub(crate) fn from_geometry(geometry: FeatureGeometry) -> Self {
        match geometry {
            FeatureGeometry::Polygon(p) => Shape::Polygon(p),
            FeatureGeometry::MultiPolygon(mp) => Shape::MultiPolygon(mp),
            FeatureGeometry::Unsupported(ty) => Shape::Unsupported(ty),
            FeatureGeometry::Missing => Shape::Unsupported("null".into()),
            FeatureGeometry::Invalid(err) => Shape::Invalid(err),
        }
    }
}

/// A tract boundary keyed by its canonical GEOID.
#[derive(Debug, Clone, PartialEq)]
pub struct TractGeometry {
    pub geoid: String,
    pub state_fips: String,
    pub county_code: String,
    pub shape: Shape,
}

/// A neighborhood boundary with its normalized (code, name).
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodGeometry {
    pub code: String,
    pub name: String,
    pub shape: MultiPolygon<f64>,
}

/// Canonical (code, name) of a neighborhood feature, falling back to the unknown sentinels.
pub(crate) fn neighborhood_identity(feature: &Feature) -> (String, String) {
    (
        feature.first_property(NEIGHBORHOOD_CODE_PROPERTIES).unwrap_or_else(|| UNKNOWN_CODE.to_string()),
        feature.first_property(NEIGHBORHOOD_NAME_PROPERTIES).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
    )
}

/// Canonical (geoid, state, county) of a tract feature, from a GEOID property or
/// from its state/county/tract components.
pub(crate) fn tract_identity(feature: &Feature) -> Option<(String, String, String)> {
    if let Some((state, county, tract)) = feature.first_property(TRACT_ID_PROPERTIES)
        .and_then(|id| split_tract_geoid(&id))
    {
        return Some((format!("{state}{county}{tract}"), state, county));
    }

    let state = normalize_state(&feature.first_property(TRACT_STATE_PROPERTIES)?)?;
    let (_, county) = normalize_county(&feature.first_property(TRACT_COUNTY_PROPERTIES)?)?;
    let tract = normalize_tract(&feature.first_property(TRACT_CODE_PROPERTIES)?)?;
    Some((format!("{state}{county}{tract}"), state, county))
}

/// Read tract boundaries for the scope's county, in input order.
/// Features without a usable identifier, and repeats of an identifier, are dropped with a warning.
pub fn read_tract_geometries(bytes: &[u8], scope: &Scope) -> Result<Vec<TractGeometry>> {
    let features = read_features_from_geojson_bytes(bytes).context("Failed to read tract boundaries")?;
    let total = features.len();
    let mut seen = BTreeSet::new();

    let tracts: Vec<TractGeometry> = features.into_iter().enumerate()
        .filter_map(|(i, feature)| {
            let Some((geoid, state_fips, county_code)) = tract_identity(&feature) else {
                warn!(feature = i, "tract feature has no usable GEOID, skipping");
                return None;
            };
            if !scope.contains_county(&state_fips, &county_code) {
                return None;
            }
            if !seen.insert(geoid.clone()) {
                warn!(feature = i, tract = %geoid, "repeated tract feature, keeping the first");
                return None;
            }
            Some(TractGeometry { geoid, state_fips, county_code, shape: Shape::from_geometry(feature.geometry) })
        })
        .collect();

    debug!(total, in_scope = tracts.len(), county = %scope.county_fips(), "read tract boundaries");
    Ok(tracts)
}

/// Read neighborhood boundaries in input order. Features with no areal geometry
/// can never contain a point and are dropped with a warning.
pub fn read_neighborhood_geometries(bytes: &[u8]) -> Result<Vec<NeighborhoodGeometry>> {
    let features = read_features_from_geojson_bytes(bytes).context("Failed to read neighborhood boundaries")?;

    let neighborhoods: Vec<NeighborhoodGeometry> = features.into_iter().enumerate()
        .filter_map(|(i, feature)| {
            let (code, name) = neighborhood_identity(&feature);
            if code == UNKNOWN_CODE {
                warn!(feature = i, "neighborhood feature has no recognized code property");
            }
            let shape = match feature.geometry {
                FeatureGeometry::Polygon(p) => MultiPolygon(vec![p]),
                FeatureGeometry::MultiPolygon(mp) => mp,
                FeatureGeometry::Unsupported(ty) => {
                    warn!(feature = i, code = %code, geometry = %ty, "neighborhood geometry is not areal, skipping");
                    return None;
                }
                FeatureGeometry::Missing => {
                    warn!(feature = i, code = %code, "neighborhood has no geometry, skipping");
                    return None;
                }
                FeatureGeometry::Invalid(err) => {
                    warn!(feature = i, code = %code, error = %err, "neighborhood geometry is malformed, skipping");
                    return None;
                }
            };
            Some(NeighborhoodGeometry { code, name, shape })
        })
        .collect();

    debug!(count = neighborhoods.len(), "read neighborhood boundaries");
    Ok(neighborhoods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const TRACTS: &str = r#"{"type": "FeatureCollection", "features": [
        {"properties": {"GEOID": "36005012300"}, "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1]]]}},
        {"properties": {"STATEFP": "36", "COUNTYFP": "005", "TRACTCE": "012400"}, "geometry": {"type": "Point", "coordinates": [0,0]}},
        {"properties": {"GEOID20": "36061000100"}, "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1]]]}},
        {"properties": {"GEOID": "36005012300"}, "geometry": null},
        {"properties": {"NAME": "nothing useful"}, "geometry": null}
    ]}"#;

    const NTAS: &str = r#"{"type": "FeatureCollection", "features": [
        {"properties": {"nta2020": "BX35", "ntaname": "Morrisania"}, "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,4]]]}},
        {"properties": {"NTACode": "BX01", "NTAName": "Claremont"}, "geometry": {"type": "MultiPolygon", "coordinates": [[[[5,5],[6,5],[6,6],[5,6]]]]}},
        {"properties": {"borough": "Bronx"}, "geometry": {"type": "Polygon", "coordinates": [[[9,9],[10,9],[10,10],[9,10]]]}},
        {"properties": {"nta2020": "BX99"}, "geometry": null},
        {"properties": {"nta2020": "BX98"}, "geometry": {"type": "Polygon", "coordinates": [[[0]]]}}
    ]}"#;

    #[test]
    fn tracts_scoped_to_county() {
        let tracts = read_tract_geometries(TRACTS.as_bytes(), &Config::default().scope()).unwrap();
        let ids: Vec<_> = tracts.iter().map(|t| t.geoid.as_str()).collect();
        assert_eq!(ids, vec!["36005012300", "36005012400"]);
        assert!(matches!(tracts[0].shape, Shape::Polygon(_)));
        assert_eq!(tracts[1].shape, Shape::Unsupported("Point".into()));
    }

    #[test]
    fn malformed_tract_geometry_is_kept_for_the_join() {
        let bytes = br#"{"type": "FeatureCollection", "features": [
            {"properties": {"GEOID": "36005012300"}, "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1]]]}},
            {"properties": {"GEOID": "36005077700"}, "geometry": {"type": "Polygon", "coordinates": [[["x",0]]]}},
            {"properties": {"GEOID": "36061000100"}, "geometry": {"type": "Polygon", "coordinates": [[["x",0]]]}}
        ]}"#;
        let tracts = read_tract_geometries(bytes, &Config::default().scope()).unwrap();
        let ids: Vec<_> = tracts.iter().map(|t| t.geoid.as_str()).collect();
        assert_eq!(ids, vec!["36005012300", "36005077700"]);
        assert!(matches!(tracts[1].shape, Shape::Invalid(_)));
    }

    #[test]
    fn neighborhood_aliases_and_sentinels() {
        let ntas = read_neighborhood_geometries(NTAS.as_bytes()).unwrap();
        let ids: Vec<_> = ntas.iter().map(|n| (n.code.as_str(), n.name.as_str())).collect();
        assert_eq!(ids, vec![
            ("BX35", "Morrisania"),
            ("BX01", "Claremont"),
            (UNKNOWN_CODE, UNKNOWN_NAME),
        ]);
    }

    #[test]
    fn alias_lists_are_tried_in_order() {
        let feature = Feature {
            properties: serde_json::json!({"ntacode": "OLD1", "nta2020": "NEW1"}).as_object().unwrap().clone(),
            geometry: FeatureGeometry::Missing,
        };
        assert_eq!(neighborhood_identity(&feature).0, "NEW1");
    }
}
