use anyhow::{Context, Result, anyhow, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value};

/// Areal geometry of a GeoJSON feature, or a note about why it has none.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FeatureGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    /// Geometry present but of a type other than Polygon/MultiPolygon (e.g. "Point").
    Unsupported(String),
    /// `geometry` was null or absent.
    Missing,
    /// Geometry present but malformed; carries the parse error.
    Invalid(String),
}

/// A GeoJSON feature reduced to its properties and areal geometry.
#[derive(Debug, Clone)]
pub(crate) struct Feature {
    pub properties: Map<String, Value>,
    pub geometry: FeatureGeometry,
}

impl Feature {
    /// Property value rendered as a trimmed string. Numbers are rendered without
    /// a fractional part when integral, so numeric codes compare like text codes.
    pub(crate) fn property_str(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => i.to_string(),
                None => n.to_string(),
            }),
            _ => None,
        }
    }

    /// First non-empty property among `keys`, tried in order.
    pub(crate) fn first_property(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.property_str(key))
    }
}

/// Read features from GeoJSON FeatureCollection bytes.
/// Only a malformed document or collection is an error. A feature whose geometry
/// cannot be parsed is kept as `FeatureGeometry::Invalid`.
pub(crate) fn read_features_from_geojson_bytes(bytes: &[u8]) -> Result<Vec<Feature>> {
    let value: Value = serde_json::from_slice(bytes).context("Failed to parse GeoJSON bytes")?;

    let features = value.get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("GeoJSON is not a FeatureCollection (no `features` array)"))?;

    Ok(features.iter()
        .map(|feature| {
            let properties = feature.get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let geometry = parse_geometry(feature.get("geometry").unwrap_or(&Value::Null))
                .unwrap_or_else(|err| FeatureGeometry::Invalid(format!("{err:#}")));
            Feature { properties, geometry }
        })
        .collect())
}

/// Parse a GeoJSON geometry object.
fn parse_geometry(geometry: &Value) -> Result<FeatureGeometry> {
    if geometry.is_null() {
        return Ok(FeatureGeometry::Missing);
    }

    let ty = geometry.get("type").and_then(Value::as_str)
        .ok_or_else(|| anyhow!("geometry has no `type`"))?;
    let coords = || geometry.get("coordinates").and_then(Value::as_array)
        .ok_or_else(|| anyhow!("{ty} geometry has no `coordinates` array"));

    Ok(match ty {
        "Polygon" => FeatureGeometry::Polygon(parse_polygon_coords(coords()?)?),
        "MultiPolygon" => FeatureGeometry::MultiPolygon(MultiPolygon(
            coords()?.iter()
                .map(|polygon| polygon.as_array()
                    .ok_or_else(|| anyhow!("MultiPolygon member is not an array"))
                    .and_then(|rings| parse_polygon_coords(rings)))
                .collect::<Result<Vec<_>>>()?
        )),
        other => FeatureGeometry::Unsupported(other.to_string()),
    })
}

/// Parse GeoJSON Polygon coordinates: `[exterior, hole, hole, ...]`.
fn parse_polygon_coords(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter()
        .map(|ring| ring.as_array()
            .ok_or_else(|| anyhow!("Polygon ring is not an array"))
            .and_then(|coords| parse_ring_coords(coords)));

    let exterior = rings.next()
        .ok_or_else(|| anyhow!("Polygon has no exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

/// Parse a ring (exterior or interior) from GeoJSON coordinates.
/// Format: [[x, y], [x, y], ...]; extra ordinates (z, m) are ignored.
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = Vec::with_capacity(coords.len());

    for pair in coords {
        let pair = pair.as_array().ok_or_else(|| anyhow!("coordinate is not an array"))?;
        if pair.len() < 2 {
            bail!("coordinate has fewer than two ordinates");
        }
        let x = pair[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
        let y = pair[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
        points.push(Coord { x, y });
    }

    // Ensure ring is closed (first point == last point)
    if !points.is_empty() && points[0] != points[points.len() - 1] {
        points.push(points[0]);
    }

    Ok(LineString(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"GEOID": "36005012300", "ALAND": 12345},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2]]]}},
            {"type": "Feature", "properties": {"code": 7},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[0,0],[1,0],[1,1],[0,0]]], [[[5,5],[6,5],[6,6],[5,5]]]]}},
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 1]}},
            {"type": "Feature", "properties": null, "geometry": null}
        ]
    }"#;

    #[test]
    fn parses_geometry_kinds() {
        let features = read_features_from_geojson_bytes(COLLECTION.as_bytes()).unwrap();
        assert_eq!(features.len(), 4);

        let FeatureGeometry::Polygon(polygon) = &features[0].geometry else { panic!("expected polygon") };
        // ring was closed on read
        assert_eq!(polygon.exterior().0.len(), 5);

        let FeatureGeometry::MultiPolygon(multi) = &features[1].geometry else { panic!("expected multipolygon") };
        assert_eq!(multi.0.len(), 2);

        assert_eq!(features[2].geometry, FeatureGeometry::Unsupported("Point".into()));
        assert_eq!(features[3].geometry, FeatureGeometry::Missing);
    }

    #[test]
    fn property_lookup() {
        let features = read_features_from_geojson_bytes(COLLECTION.as_bytes()).unwrap();
        assert_eq!(features[0].property_str("GEOID").as_deref(), Some("36005012300"));
        assert_eq!(features[0].property_str("ALAND").as_deref(), Some("12345"));
        assert_eq!(features[1].first_property(&["missing", "code"]).as_deref(), Some("7"));
        assert_eq!(features[3].first_property(&["code"]), None);
    }

    #[test]
    fn rejects_non_collection() {
        assert!(read_features_from_geojson_bytes(br#"{"type": "Feature"}"#).is_err());
    }

    #[test]
    fn bad_coordinates_stay_with_their_feature() {
        let bad = br#"{"features": [
            {"properties": {"GEOID": "36061000100"}, "geometry": {"type": "Polygon", "coordinates": [[["x", 0]]]}},
            {"properties": {"GEOID": "36005000200"}, "geometry": {"coordinates": []}},
            {"properties": {"GEOID": "36005012300"}, "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1]]]}}
        ]}"#;
        let features = read_features_from_geojson_bytes(bad).unwrap();
        assert_eq!(features.len(), 3);

        let FeatureGeometry::Invalid(err) = &features[0].geometry else { panic!("expected invalid geometry") };
        assert!(err.contains("x must be a number"));
        assert!(matches!(features[1].geometry, FeatureGeometry::Invalid(_)));
        assert!(matches!(features[2].geometry, FeatureGeometry::Polygon(_)));
        assert_eq!(features[0].property_str("GEOID").as_deref(), Some("36061000100"));
    }
}
