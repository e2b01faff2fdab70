//! Wind-cone risk query against a monitored line.

use axum::{extract::State, Json};
use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use firewatch_core::feature::polygon_geometry;
use firewatch_core::spatial::centroid;
use firewatch_core::{
    build_wind_timeline, normalize_horizons, score_features, Feature, MonitoredLine, Position, RiskEngine,
    WindForecast, WindProfileSet, WindSchedule, DEFAULT_HORIZONS_H,
};

use crate::config::{parse_count, WindAnchor};
use crate::error::{ApiError, WindError};
use crate::ingest::bbox::BRAZIL_BBOX;
use crate::ingest::{HotspotCollection, HotspotQuery, WireFormat};
use crate::state::AppState;

pub const DEFAULT_WIND_ALTITUDE_M: u32 = 100;
const MAX_WIND_ALTITUDE_M: f64 = 1000.0;
const CORRIDOR_CAP_STEPS: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRequest {
    pub line_id: Option<String>,
    /// Inline LineString geometry, feature or feature collection.
    pub linha: Option<Value>,
    pub horizons: Option<Vec<Value>>,
    pub count: Option<Value>,
    #[serde(default)]
    pub debug_cone: bool,
    pub wind_altitude_m: Option<f64>,
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl RiskRequest {
    /// Requested horizons, sorted and deduplicated. Absent or empty means the
    /// default set; a non-empty list with no usable value, or any horizon past
    /// `max_horizon_h`, is rejected.
    pub fn horizons(&self, max_horizon_h: f64) -> Result<Vec<f64>, ApiError> {
        let raw = match self.horizons.as_deref() {
            None | Some([]) => return Ok(DEFAULT_HORIZONS_H.to_vec()),
            Some(raw) => raw,
        };
        let values: Vec<f64> = raw.iter().filter_map(number).collect();
        let horizons = normalize_horizons(&values);
        if horizons.is_empty() {
            return Err(ApiError::InvalidHorizons(
                "horizons must be finite, non-negative hours".to_string(),
            ));
        }
        if let Some(last) = horizons.last().filter(|h| **h > max_horizon_h) {
            return Err(ApiError::InvalidHorizons(format!(
                "horizon {last} h is past the {max_horizon_h} h forecast"
            )));
        }
        Ok(horizons)
    }

    pub fn count(&self, default: u32) -> Result<u32, ApiError> {
        match &self.count {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => parse_count(&n.to_string()).ok_or_else(|| ApiError::InvalidCount(n.to_string())),
            Some(Value::String(s)) => parse_count(s).ok_or_else(|| ApiError::InvalidCount(s.clone())),
            Some(other) => Err(ApiError::InvalidCount(other.to_string())),
        }
    }

    pub fn wind_altitude(&self) -> u32 {
        self.wind_altitude_m
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v.round().clamp(1.0, MAX_WIND_ALTITUDE_M) as u32)
            .unwrap_or(DEFAULT_WIND_ALTITUDE_M)
    }
}

/// Where forecasts are sampled: the hotspot centroid, or the line centroid
/// when configured so or when no hotspot has a point geometry.
fn wind_anchor(mode: WindAnchor, line: &MonitoredLine, features: &[Feature]) -> Option<Position> {
    let from_hotspots = || {
        let points: Vec<Position> = features.iter().filter_map(Feature::point_position).collect();
        centroid(&points)
    };
    match mode {
        WindAnchor::Hotspots => from_hotspots().or_else(|| line.centroid()),
        WindAnchor::Line => line.centroid(),
    }
}

/// Fetch forecasts for every altitude concurrently; failed altitudes are
/// skipped as long as one succeeds.
async fn fetch_forecasts(state: &AppState, anchor: Position, altitudes: &[u32]) -> Result<Vec<WindForecast>, WindError> {
    let results = join_all(altitudes.iter().map(|&altitude| state.wind().forecast(anchor, altitude))).await;
    let mut forecasts = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(forecast) => forecasts.push(forecast),
            Err(err) => tracing::warn!(error = %err, "skipping wind altitude"),
        }
    }
    if forecasts.is_empty() {
        tracing::error!(lat = anchor.lat, lon = anchor.lon, "no wind forecast at any altitude");
        return Err(WindError::Unavailable);
    }
    Ok(forecasts)
}

fn ingest_meta(collection: &HotspotCollection) -> Value {
    json!({
        "typenames": collection.meta.typenames,
        "bbox": collection.meta.bbox,
        "count": collection.meta.count,
        "source": collection.meta.source,
        "cached": collection.meta.cached,
        "lastFetchedAt": collection.meta.last_fetched_at,
        "formatAttempt": collection.meta.format_attempt,
    })
}

/// `POST /v1/firms/risk`
pub async fn post_risk(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RiskRequest>>,
) -> Result<Json<Value>, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let config = state.config();
    let ingestor = state.ingestor()?;

    let horizons = request.horizons(config.max_horizon_h())?;
    let count = request.count(config.risk_default_count)?;
    let wind_altitude = request.wind_altitude();
    let line = state
        .lines()
        .resolve(request.line_id.as_deref(), request.linha.as_ref(), &config.default_line_id)
        .await?;

    let query = HotspotQuery {
        typenames: config.default_typenames.clone(),
        bbox: BRAZIL_BBOX,
        count,
        formats: WireFormat::ALL.to_vec(),
    };
    let collection = ingestor.load(&query).await?;
    let features: Vec<Feature> = collection.features.iter().take(count as usize).cloned().collect();

    let anchor = wind_anchor(config.wind_anchor, &line, &features)
        .ok_or_else(|| ApiError::Internal("no location to sample wind at".to_string()))?;
    let mut altitudes = vec![config.wind_base_altitude_m, wind_altitude];
    altitudes.sort_unstable();
    altitudes.dedup();
    let forecasts = fetch_forecasts(&state, anchor, &altitudes).await?;

    let profiles = WindProfileSet::new(forecasts, config.wind_shear_exponent);
    let acting = profiles.forecast_at(wind_altitude).ok_or(WindError::Unavailable)?;
    let schedule = WindSchedule::new(&acting, &horizons);

    let debug = request.debug_cone;
    let engine = RiskEngine::new(line, config.risk_rules());
    let (assembled, engine) = tokio::task::spawn_blocking(move || {
        let assembled = score_features(&engine, &features, &schedule, debug);
        (assembled, engine)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("risk scoring task failed: {e}")))?;

    tracing::info!(
        line = ?engine.line().id,
        hotspots = assembled.summary.count,
        intersecting = assembled.summary.intersecting_count,
        "risk computed"
    );

    let wind_profiles: Vec<_> = horizons
        .iter()
        .filter_map(|&h| profiles.profile_for_horizon(h, &[wind_altitude]))
        .collect();
    let timeline = build_wind_timeline(&profiles, config.wind_base_altitude_m, Utc::now());

    let mut meta = json!({
        "summary": &assembled.summary,
        "horizons": &horizons,
        "bufferMeters": engine.rules().buffer_m,
        "coneHalfAngleDeg": engine.rules().cone_half_angle_deg,
        "windAltitudeM": wind_altitude,
        "windAnchor": {
            "mode": config.wind_anchor.as_str(),
            "lat": anchor.lat,
            "lon": anchor.lon,
        },
        "windProfiles": wind_profiles,
        "windTimeline": timeline,
        "line": { "id": engine.line().id },
        "ingest": ingest_meta(&collection),
    });
    if debug {
        meta["corridor"] = polygon_geometry(&engine.corridor().outline(CORRIDOR_CAP_STEPS));
    }

    let mut response = assembled.to_feature_collection();
    response["meta"] = meta;
    Ok(Json(response))
}
