//! Normalized GeoJSON features as produced by the wire-format parsers.
//!
//! Geometry and properties stay schema-less (`serde_json`) so that whatever
//! the upstream layer carries is passed through untouched.

use crate::models::LAYER_PROPERTY;
use crate::spatial::Position;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

fn feature_kind() -> String {
    "Feature".to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Value, properties: Map<String, Value>) -> Self {
        Self {
            kind: feature_kind(),
            id: None,
            geometry: Some(geometry),
            properties,
        }
    }

    pub fn point(position: Position, properties: Map<String, Value>) -> Self {
        Self::new(point_geometry(position), properties)
    }

    pub fn with_id(mut self, id: Value) -> Self {
        self.id = Some(id);
        self
    }

    /// True when the feature carries a non-null geometry.
    pub fn has_geometry(&self) -> bool {
        matches!(&self.geometry, Some(value) if !value.is_null())
    }

    /// Position of a Point geometry, if that is what this feature holds.
    pub fn point_position(&self) -> Option<Position> {
        let geometry = self.geometry.as_ref()?;
        if geometry.get("type")?.as_str()? != "Point" {
            return None;
        }
        position_from_value(geometry.get("coordinates")?)
    }

    /// Deduplication identity: serialized geometry plus serialized properties.
    ///
    /// The source-layer tag is not part of the identity, so the same
    /// observation served by two layers collapses to one. `serde_json::Map`
    /// keeps keys sorted, so key order does not matter either.
    pub fn identity_key(&self) -> String {
        let geometry = self
            .geometry
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "null".to_string());
        let mut properties = self.properties.clone();
        properties.remove(LAYER_PROPERTY);
        format!("{geometry}{}", Value::Object(properties))
    }
}

/// Keep the first occurrence of every identity, preserving input order.
pub fn dedupe_features(features: Vec<Feature>) -> Vec<Feature> {
    let mut seen = HashSet::with_capacity(features.len());
    features
        .into_iter()
        .filter(|feature| seen.insert(feature.identity_key()))
        .collect()
}

pub fn position_from_value(value: &Value) -> Option<Position> {
    let coords = value.as_array()?;
    let lon = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    let position = Position::new(lon, lat);
    position.is_finite().then_some(position)
}

pub fn point_geometry(position: Position) -> Value {
    json!({
        "type": "Point",
        "coordinates": position.to_coordinates(),
    })
}

/// Closed single-ring polygon geometry.
pub fn polygon_geometry(ring: &[Position]) -> Value {
    let mut coords: Vec<[f64; 2]> = ring.iter().map(Position::to_coordinates).collect();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    json!({
        "type": "Polygon",
        "coordinates": [coords],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn deserializes_null_properties_as_empty() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [-43.2, -22.1]},
            "properties": null
        }))
        .unwrap();
        assert!(feature.properties.is_empty());
        assert_eq!(feature.point_position(), Some(Position::new(-43.2, -22.1)));
    }

    #[test]
    fn point_position_rejects_other_geometries() {
        let feature = Feature::new(
            json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}),
            Map::new(),
        );
        assert!(feature.point_position().is_none());
        assert!(feature.has_geometry());
    }

    #[test]
    fn identity_ignores_property_key_order() {
        let a: Feature = serde_json::from_str(
            r#"{"geometry":{"type":"Point","coordinates":[1,2]},"properties":{"a":1,"b":"x"}}"#,
        )
        .unwrap();
        let b: Feature = serde_json::from_str(
            r#"{"geometry":{"type":"Point","coordinates":[1,2]},"properties":{"b":"x","a":1}}"#,
        )
        .unwrap();
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn dedupe_is_idempotent_and_ignores_duplicates() {
        let first = Feature::point(Position::new(1.0, 2.0), props(json!({"frp": 3.0})));
        let second = Feature::point(Position::new(1.0, 2.5), props(json!({"frp": 3.0})));
        let input = vec![first.clone(), second.clone(), first.clone(), first.clone()];

        let once = dedupe_features(input);
        assert_eq!(once, vec![first.clone(), second.clone()]);

        let twice = dedupe_features(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn features_differing_only_by_id_are_duplicates() {
        let a = Feature::point(Position::new(1.0, 2.0), Map::new()).with_id(json!("csv-0"));
        let b = Feature::point(Position::new(1.0, 2.0), Map::new()).with_id(json!("kml-7"));
        assert_eq!(dedupe_features(vec![a, b]).len(), 1);
    }

    #[test]
    fn same_observation_from_two_layers_is_one() {
        let a = Feature::point(Position::new(1.0, 2.0), props(json!({"frp": 1.0, "typename": "noaa20"})));
        let b = Feature::point(Position::new(1.0, 2.0), props(json!({"frp": 1.0, "typename": "npp"})));
        let kept = dedupe_features(vec![a.clone(), b]);
        assert_eq!(kept, vec![a]);
    }

    #[test]
    fn polygon_geometry_closes_ring() {
        let ring = [
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
        ];
        let geometry = polygon_geometry(&ring);
        let coords = geometry["coordinates"][0].as_array().unwrap();
        assert_eq!(coords.len(), 4);
        assert_eq!(coords.first(), coords.last());
    }
}
