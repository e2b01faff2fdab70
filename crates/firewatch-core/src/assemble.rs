//! Merge risk annotations onto hotspot features and summarize them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::feature::{polygon_geometry, Feature};
use crate::models::Hotspot;
use crate::risk::{horizon_key, RiskAnnotation, RiskEngine, WindSchedule};
use crate::wind::round2;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Copy of `feature` with the risk fields added to (or overwriting) its
/// properties. Cones are attached as `debug_cones` when requested.
pub fn annotate_feature(feature: &Feature, annotation: &RiskAnnotation, include_cones: bool) -> Feature {
    let mut properties: Map<String, Value> = feature.properties.clone();
    properties.insert("frp".into(), number(annotation.frp));
    for horizon in &annotation.horizons {
        properties.insert(horizon_key(horizon.horizon_h), number(round2(horizon.risk)));
    }
    properties.insert("risk_max".into(), number(round2(annotation.risk_max)));
    properties.insert(
        "eta_h".into(),
        annotation.eta_h.map(number).unwrap_or(Value::Null),
    );
    // Without a horizon-0 wind the reported vector is calm.
    let (speed_ms, from_deg, toward_deg) = annotation
        .wind_now
        .map(|wind| (wind.speed_ms, wind.from_deg, wind.toward_deg))
        .unwrap_or((0.0, 0.0, 0.0));
    properties.insert("wind_speed_ms".into(), number(round2(speed_ms)));
    properties.insert("wind_dir_from_deg".into(), number(from_deg));
    properties.insert("wind_dir_toward_deg".into(), number(toward_deg));
    properties.insert("distance_to_line_m".into(), number(round1(annotation.distance_to_line_m)));
    properties.insert("intersects_corridor".into(), Value::Bool(annotation.intersects_corridor));

    if include_cones {
        let cones: Vec<Value> = annotation
            .horizons
            .iter()
            .filter_map(|h| h.cone.as_deref())
            .map(polygon_geometry)
            .collect();
        if !cones.is_empty() {
            properties.insert("debug_cones".into(), Value::Array(cones));
        }
    }

    Feature {
        kind: feature.kind.clone(),
        id: feature.id.clone(),
        geometry: feature.geometry.clone(),
        properties,
    }
}

/// Aggregate statistics over the scored hotspots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub count: usize,
    pub max_risk: f64,
    pub avg_risk: f64,
    pub intersecting_count: usize,
    pub frp_sum: f64,
}

impl RiskSummary {
    pub fn from_annotations<'a>(annotations: impl IntoIterator<Item = &'a RiskAnnotation>) -> Self {
        let mut summary = Self::default();
        let mut risk_sum = 0.0;
        for annotation in annotations {
            summary.count += 1;
            summary.max_risk = summary.max_risk.max(annotation.risk_max);
            risk_sum += annotation.risk_max;
            summary.frp_sum += annotation.frp;
            if annotation.intersects_corridor {
                summary.intersecting_count += 1;
            }
        }
        if summary.count > 0 {
            summary.avg_risk = round2(risk_sum / summary.count as f64);
        }
        summary.max_risk = round2(summary.max_risk);
        summary.frp_sum = round2(summary.frp_sum);
        summary
    }
}

/// Scored hotspots ready to be serialized.
#[derive(Debug, Clone, Default)]
pub struct AssembledRisk {
    pub features: Vec<Feature>,
    pub summary: RiskSummary,
}

impl AssembledRisk {
    pub fn to_feature_collection(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.features,
        })
    }
}

/// Score every Point feature and assemble the annotated collection.
/// Features without a valid Point geometry are dropped.
pub fn score_features(
    engine: &RiskEngine,
    features: &[Feature],
    schedule: &WindSchedule,
    include_cones: bool,
) -> AssembledRisk {
    let scored: Vec<(Feature, RiskAnnotation)> = features
        .iter()
        .filter_map(|feature| {
            let hotspot = Hotspot::from_feature(feature)?;
            let annotation = engine.evaluate(&hotspot, schedule);
            Some((annotate_feature(feature, &annotation, include_cones), annotation))
        })
        .collect();

    let summary = RiskSummary::from_annotations(scored.iter().map(|(_, a)| a));
    AssembledRisk {
        features: scored.into_iter().map(|(f, _)| f).collect(),
        summary,
    }
}
