//! Core data models: hotspots, the monitored line and wind forecasts.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GeoError;
use crate::feature::{position_from_value, Feature};
use crate::spatial::{self, Position};
use crate::wind::{bearing_to_toward, estimate_speed_at_height};

/// Property key carrying the source layer name of a hotspot.
pub const LAYER_PROPERTY: &str = "typename";

/// Keys that may carry fire radiative power, in lookup order.
const FRP_KEYS: [&str; 3] = ["frp", "FRP", "FRP_MW"];

/// Recognized hotspot properties plus the untouched remainder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HotspotProperties {
    /// Source layer the observation was ingested from.
    pub layer: Option<String>,
    /// Fire radiative power; 0 when absent or non-finite.
    pub frp: f64,
    /// Everything else, carried through verbatim.
    pub extra: Map<String, Value>,
}

impl HotspotProperties {
    pub fn from_map(properties: &Map<String, Value>) -> Self {
        let layer = properties
            .get(LAYER_PROPERTY)
            .and_then(Value::as_str)
            .map(str::to_string);
        let frp = FRP_KEYS
            .iter()
            .find_map(|key| properties.get(*key).filter(|v| !v.is_null()))
            .map(parse_frp)
            .unwrap_or(0.0);
        let mut extra = properties.clone();
        extra.remove(LAYER_PROPERTY);
        Self { layer, frp, extra }
    }
}

fn parse_frp(value: &Value) -> f64 {
    let candidate = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    candidate.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// A fire/thermal-anomaly point observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub position: Position,
    pub properties: HotspotProperties,
}

impl Hotspot {
    /// Build from a feature; `None` unless the geometry is a valid Point.
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let position = feature.point_position()?;
        Some(Self {
            position,
            properties: HotspotProperties::from_map(&feature.properties),
        })
    }

    pub fn frp(&self) -> f64 {
        self.properties.frp
    }
}

/// The asset centerline the corridor is built around.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredLine {
    pub id: Option<String>,
    pub positions: Vec<Position>,
}

impl MonitoredLine {
    pub fn new(id: Option<String>, positions: Vec<Position>) -> Result<Self, GeoError> {
        let valid = positions.iter().filter(|p| p.is_finite()).count();
        if valid < 2 || valid != positions.len() {
            return Err(GeoError::TooFewPositions(valid));
        }
        Ok(Self { id, positions })
    }

    /// Resolve from a LineString feature, a feature collection holding exactly
    /// one LineString, or a bare LineString geometry.
    pub fn from_geojson(id: Option<String>, value: &Value) -> Result<Self, GeoError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| GeoError::InvalidGeoJson("missing type".to_string()))?;

        let geometry = match kind {
            "FeatureCollection" => {
                let features = value
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or_else(|| GeoError::InvalidGeoJson("missing features".to_string()))?;
                let lines: Vec<&Value> = features
                    .iter()
                    .filter_map(|f| f.get("geometry"))
                    .filter(|g| is_line_string(g))
                    .collect();
                match lines.as_slice() {
                    [] => return Err(GeoError::MissingLineString),
                    [line] => *line,
                    many => return Err(GeoError::AmbiguousLineString(many.len())),
                }
            }
            "Feature" => value
                .get("geometry")
                .filter(|g| is_line_string(g))
                .ok_or(GeoError::MissingLineString)?,
            "LineString" => value,
            _ => return Err(GeoError::MissingLineString),
        };

        let coordinates = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .ok_or_else(|| GeoError::InvalidGeoJson("LineString without coordinates".to_string()))?;
        let positions: Vec<Position> = coordinates.iter().filter_map(position_from_value).collect();
        if positions.len() != coordinates.len() {
            return Err(GeoError::TooFewPositions(positions.len()));
        }
        Self::new(id, positions)
    }

    pub fn centroid(&self) -> Option<Position> {
        spatial::centroid(&self.positions)
    }

    pub fn distance_to(&self, point: Position) -> f64 {
        spatial::point_to_line_distance_m(point, &self.positions)
    }
}

fn is_line_string(geometry: &Value) -> bool {
    geometry.get("type").and_then(Value::as_str) == Some("LineString")
}

/// One wind observation/forecast value. Direction uses the meteorological
/// "from" convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    pub speed_ms: f64,
    pub direction_from_deg: f64,
    pub timestamp: DateTime<Utc>,
}

impl WindSample {
    pub fn toward_deg(&self) -> f64 {
        bearing_to_toward(self.direction_from_deg)
    }
}

/// Current sample plus hourly series for one altitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindForecast {
    /// Altitude this forecast describes.
    pub altitude_m: u32,
    /// Altitude the provider actually observed; differs when rescaled.
    pub source_altitude_m: u32,
    pub current: WindSample,
    pub hourly: Vec<WindSample>,
}

impl WindForecast {
    pub fn is_direct(&self) -> bool {
        self.altitude_m == self.source_altitude_m
    }

    /// Sample acting at `hours` after the current sample: the current sample
    /// at or below zero, otherwise the hourly sample closest in time. A target
    /// past the representable time range resolves to the last hourly sample.
    pub fn sample_for_horizon(&self, hours: f64) -> WindSample {
        if hours <= 0.0 || self.hourly.is_empty() {
            return self.current;
        }
        let offset_ms = (hours * 3_600_000.0).round() as i64;
        let target = TimeDelta::try_milliseconds(offset_ms)
            .and_then(|offset| self.current.timestamp.checked_add_signed(offset));
        match target {
            Some(target) => self.closest_to(target),
            None => self.hourly.last().copied(),
        }
        .unwrap_or(self.current)
    }

    pub fn closest_to(&self, target: DateTime<Utc>) -> Option<WindSample> {
        self.hourly
            .iter()
            .min_by_key(|sample| (sample.timestamp - target).num_seconds().abs())
            .copied()
    }

    /// Hourly sample at exactly `timestamp`.
    pub fn sample_at(&self, timestamp: DateTime<Utc>) -> Option<WindSample> {
        self.hourly.iter().find(|s| s.timestamp == timestamp).copied()
    }

    /// Rescale every speed to `altitude_m` with the power law; the source
    /// altitude is kept so the result reads as derived.
    pub fn rescaled(&self, altitude_m: u32, shear_exponent: f64) -> Self {
        let from = f64::from(self.altitude_m);
        let to = f64::from(altitude_m);
        let scale = |sample: &WindSample| WindSample {
            speed_ms: estimate_speed_at_height(sample.speed_ms, from, to, shear_exponent),
            ..*sample
        };
        Self {
            altitude_m,
            source_altitude_m: self.source_altitude_m,
            current: scale(&self.current),
            hourly: self.hourly.iter().map(scale).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample(hour: i64, speed: f64) -> WindSample {
        WindSample {
            speed_ms: speed,
            direction_from_deg: 270.0,
            timestamp: Utc.timestamp_opt(1_700_000_000 + hour * 3600, 0).unwrap(),
        }
    }

    #[test]
    fn frp_defaults_to_zero_when_missing_or_garbage() {
        let props = json!({"FRP": "12.5", "typename": "fires_24h", "other": 1});
        let parsed = HotspotProperties::from_map(props.as_object().unwrap());
        assert_eq!(parsed.frp, 12.5);
        assert_eq!(parsed.layer.as_deref(), Some("fires_24h"));
        assert!(!parsed.extra.contains_key("typename"));
        assert_eq!(parsed.extra.get("other"), Some(&json!(1)));

        let garbage = json!({"frp": "n/a"});
        assert_eq!(HotspotProperties::from_map(garbage.as_object().unwrap()).frp, 0.0);
        assert_eq!(HotspotProperties::from_map(&Map::new()).frp, 0.0);
    }

    #[test]
    fn resolves_line_from_feature_collection() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}, "properties": {}},
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [0.1, 0.0]]}, "properties": {}}
            ]
        });
        let line = MonitoredLine::from_geojson(Some("test".into()), &value).unwrap();
        assert_eq!(line.positions.len(), 2);
        assert_eq!(line.id.as_deref(), Some("test"));
    }

    #[test]
    fn line_resolution_fails_without_exactly_one_line_string() {
        let none = json!({"type": "FeatureCollection", "features": []});
        assert_eq!(
            MonitoredLine::from_geojson(None, &none),
            Err(GeoError::MissingLineString)
        );

        let line = json!({"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 0.0]]}});
        let two = json!({"type": "FeatureCollection", "features": [line.clone(), line]});
        assert_eq!(
            MonitoredLine::from_geojson(None, &two),
            Err(GeoError::AmbiguousLineString(2))
        );

        let short = json!({"type": "LineString", "coordinates": [[0.0, 0.0]]});
        assert_eq!(
            MonitoredLine::from_geojson(None, &short),
            Err(GeoError::TooFewPositions(1))
        );
    }

    #[test]
    fn horizon_sample_picks_closest_hour() {
        let forecast = WindForecast {
            altitude_m: 10,
            source_altitude_m: 10,
            current: sample(0, 1.0),
            hourly: (0..48).map(|h| sample(h, h as f64)).collect(),
        };
        assert_eq!(forecast.sample_for_horizon(0.0).speed_ms, 1.0);
        assert_eq!(forecast.sample_for_horizon(6.0).speed_ms, 6.0);
        assert_eq!(forecast.sample_for_horizon(5.6).speed_ms, 6.0);
        assert_eq!(forecast.sample_for_horizon(100.0).speed_ms, 47.0);
    }

    #[test]
    fn horizon_beyond_time_range_takes_last_hour() {
        let forecast = WindForecast {
            altitude_m: 10,
            source_altitude_m: 10,
            current: sample(0, 1.0),
            hourly: (0..48).map(|h| sample(h, h as f64)).collect(),
        };
        for hours in [1e10, 1e300, f64::MAX] {
            assert_eq!(forecast.sample_for_horizon(hours).speed_ms, 47.0, "{hours}");
        }
    }

    #[test]
    fn rescaled_forecast_is_derived() {
        let forecast = WindForecast {
            altitude_m: 10,
            source_altitude_m: 10,
            current: sample(0, 5.0),
            hourly: vec![sample(1, 5.0)],
        };
        let up = forecast.rescaled(100, 1.0 / 7.0);
        assert!(!up.is_direct());
        assert!(up.current.speed_ms > 5.0);
        assert_eq!(up.hourly[0].direction_from_deg, 270.0);
    }
}
