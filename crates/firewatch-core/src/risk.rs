//! Wind-cone risk engine.
//!
//! For every hotspot and horizon a circular sector ("cone") is laid out in
//! the direction the wind blows, with a radius equal to the distance the
//! wind travels in that many hours. The cone is tested against the line
//! corridor and the result feeds a bounded risk score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::corridor::Corridor;
use crate::models::{Hotspot, MonitoredLine, WindForecast};
use crate::spatial::{destination, Position};
use crate::wind::{bearing_to_toward, round2};

/// Horizons scored when a request names none.
pub const DEFAULT_HORIZONS_H: [f64; 4] = [0.0, 3.0, 6.0, 24.0];

/// Angular spacing of the cone arc, in degrees.
const CONE_ARC_STEP_DEG: f64 = 10.0;

/// Tunables for corridor size, cone shape and score saturation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRules {
    /// Corridor half-width around the line in meters
    pub buffer_m: f64,
    /// Half-angle of the wind cone in degrees
    pub cone_half_angle_deg: f64,
    /// Wind speed at which the wind term saturates (m/s)
    pub wind_saturation_ms: f64,
    /// Fire radiative power at which the FRP term saturates (MW)
    pub frp_saturation_mw: f64,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            buffer_m: 200.0,
            cone_half_angle_deg: 30.0,
            wind_saturation_ms: 14.0,
            frp_saturation_mw: 200.0,
        }
    }
}

/// Everything a risk model may look at for one hotspot and horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInputs {
    pub intersects: bool,
    pub distance_m: f64,
    /// Normalizing reach: `max(cone radius, corridor buffer)`.
    pub reach_m: f64,
    pub wind_speed_ms: f64,
    pub frp: f64,
}

/// Pluggable scoring strategy.
///
/// Implementations must return a score in `[0, 100]` that never decreases
/// with FRP, never scores an intersecting cone below a non-intersecting one
/// at equal inputs, and stays bounded as distance goes to zero or wind
/// speed grows without limit.
pub trait RiskModel: Send + Sync {
    fn score(&self, inputs: &RiskInputs) -> f64;

    /// Hours for a wind-driven front to cover `distance_m`; `None` without wind.
    fn eta_hours(&self, distance_m: f64, wind_speed_ms: f64) -> Option<f64> {
        if !wind_speed_ms.is_finite() || wind_speed_ms <= 0.0 || !distance_m.is_finite() {
            return None;
        }
        Some(distance_m / (wind_speed_ms * 3600.0))
    }
}

/// Weighted sum of saturating distance, wind and FRP terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedRiskModel {
    pub wind_saturation_ms: f64,
    pub frp_saturation_mw: f64,
}

impl WeightedRiskModel {
    const DISTANCE_WEIGHT: f64 = 0.45;
    const WIND_WEIGHT: f64 = 0.35;
    const FRP_WEIGHT: f64 = 0.2;
    /// FRP weight applied when the cone misses the corridor.
    const MISS_FRP_WEIGHT: f64 = 0.15;

    pub fn from_rules(rules: &RiskRules) -> Self {
        Self {
            wind_saturation_ms: rules.wind_saturation_ms,
            frp_saturation_mw: rules.frp_saturation_mw,
        }
    }
}

impl Default for WeightedRiskModel {
    fn default() -> Self {
        Self::from_rules(&RiskRules::default())
    }
}

fn saturate(value: f64, at: f64) -> f64 {
    if !value.is_finite() {
        return if value == f64::INFINITY { 1.0 } else { 0.0 };
    }
    (value / at.max(f64::EPSILON)).clamp(0.0, 1.0)
}

impl RiskModel for WeightedRiskModel {
    fn score(&self, inputs: &RiskInputs) -> f64 {
        let reach = inputs.reach_m.max(1.0);
        let r_dist = (1.0 - inputs.distance_m / reach).clamp(0.0, 1.0);
        let r_dist = if r_dist.is_nan() { 0.0 } else { r_dist };
        let r_wind = saturate(inputs.wind_speed_ms, self.wind_saturation_ms);
        let r_frp = saturate(inputs.frp, self.frp_saturation_mw);

        let risk = if inputs.intersects {
            100.0 * (Self::DISTANCE_WEIGHT * r_dist + Self::WIND_WEIGHT * r_wind + Self::FRP_WEIGHT * r_frp)
        } else {
            100.0 * Self::MISS_FRP_WEIGHT * r_frp
        };
        risk.clamp(0.0, 100.0)
    }
}

/// Wind acting at one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonWind {
    pub horizon_h: f64,
    pub speed_ms: f64,
    pub from_deg: f64,
    pub toward_deg: f64,
    pub timestamp: DateTime<Utc>,
}

impl HorizonWind {
    /// Sample closest to `current + horizon_h`; non-finite values read as calm.
    pub fn select(forecast: &WindForecast, horizon_h: f64) -> Self {
        let sample = forecast.sample_for_horizon(horizon_h);
        let speed_ms = if sample.speed_ms.is_finite() { sample.speed_ms.max(0.0) } else { 0.0 };
        let from_deg = if sample.direction_from_deg.is_finite() { sample.direction_from_deg } else { 0.0 };
        Self {
            horizon_h,
            speed_ms,
            from_deg,
            toward_deg: bearing_to_toward(from_deg),
            timestamp: sample.timestamp,
        }
    }
}

/// Output key for a horizon: `risk_h00`, `risk_h06`, `risk_h24`, `risk_h1.5`.
pub fn horizon_key(horizon_h: f64) -> String {
    let label = if horizon_h.fract() == 0.0 {
        format!("{}", horizon_h as u64)
    } else {
        format!("{horizon_h}")
    };
    format!("risk_h{label:0>2}")
}

/// Keep finite non-negative horizons, sorted and deduplicated.
pub fn normalize_horizons(raw: &[f64]) -> Vec<f64> {
    let mut horizons: Vec<f64> = raw.iter().copied().filter(|h| h.is_finite() && *h >= 0.0).collect();
    horizons.sort_by(f64::total_cmp);
    horizons.dedup();
    horizons
}

/// Sector polygon centered at `origin`, bisected by `toward_deg`.
///
/// Degenerates to the repeated origin when either the radius or the
/// half-angle is zero.
pub fn build_wind_cone(origin: Position, toward_deg: f64, radius_m: f64, half_angle_deg: f64) -> Vec<Position> {
    let radius_m = radius_m.max(0.0);
    let half_angle = half_angle_deg.max(0.0);
    if radius_m == 0.0 || half_angle == 0.0 {
        return vec![origin; 3];
    }

    let steps = ((half_angle * 2.0) / CONE_ARC_STEP_DEG).round().max(2.0) as usize;
    let start = toward_deg - half_angle;
    let step = (2.0 * half_angle) / steps as f64;

    let mut ring = Vec::with_capacity(steps + 3);
    ring.push(origin);
    for i in 0..=steps {
        ring.push(destination(origin, radius_m, start + step * i as f64));
    }
    ring.push(origin);
    ring
}

/// Per-horizon detail for one hotspot.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonRisk {
    pub horizon_h: f64,
    pub radius_m: f64,
    pub intersects: bool,
    /// Unrounded score.
    pub risk: f64,
    pub cone: Option<Vec<Position>>,
}

/// Risk annotation for one hotspot across all requested horizons.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAnnotation {
    pub frp: f64,
    pub horizons: Vec<HorizonRisk>,
    pub risk_max: f64,
    pub eta_h: Option<f64>,
    pub intersects_corridor: bool,
    pub distance_to_line_m: f64,
    /// Horizon-0 wind; absent when horizon 0 was not requested.
    pub wind_now: Option<HorizonWind>,
}

/// Wind per requested horizon. The horizon-0 entry, when requested, drives
/// the ETA and the reported wind.
#[derive(Debug, Clone)]
pub struct WindSchedule {
    winds: Vec<HorizonWind>,
    now: Option<HorizonWind>,
}

impl WindSchedule {
    pub fn new(forecast: &WindForecast, horizons: &[f64]) -> Self {
        let winds: Vec<HorizonWind> = horizons.iter().map(|h| HorizonWind::select(forecast, *h)).collect();
        let now = winds.iter().find(|w| w.horizon_h == 0.0).copied();
        Self { winds, now }
    }

    pub fn winds(&self) -> &[HorizonWind] {
        &self.winds
    }

    pub fn now(&self) -> Option<HorizonWind> {
        self.now
    }
}

/// Scores hotspots against one corridor.
#[derive(Clone)]
pub struct RiskEngine {
    line: MonitoredLine,
    corridor: Corridor,
    rules: RiskRules,
    model: Arc<dyn RiskModel>,
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("line", &self.line.id)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl RiskEngine {
    pub fn new(line: MonitoredLine, rules: RiskRules) -> Self {
        let model = Arc::new(WeightedRiskModel::from_rules(&rules));
        Self::with_model(line, rules, model)
    }

    pub fn with_model(line: MonitoredLine, rules: RiskRules, model: Arc<dyn RiskModel>) -> Self {
        let corridor = Corridor::new(&line, rules.buffer_m);
        Self {
            line,
            corridor,
            rules,
            model,
        }
    }

    pub fn corridor(&self) -> &Corridor {
        &self.corridor
    }

    pub fn rules(&self) -> &RiskRules {
        &self.rules
    }

    pub fn line(&self) -> &MonitoredLine {
        &self.line
    }

    fn evaluate_horizon(&self, hotspot: &Hotspot, distance_m: f64, wind: &HorizonWind) -> HorizonRisk {
        let buffer = self.corridor.buffer_m();
        let raw_radius = (wind.speed_ms * 3600.0 * wind.horizon_h).max(0.0);
        let radius_m = if wind.horizon_h == 0.0 { raw_radius.max(buffer) } else { raw_radius };

        let (intersects, cone) = if radius_m > 0.0 && wind.speed_ms > 0.0 {
            let cone = build_wind_cone(hotspot.position, wind.toward_deg, radius_m, self.rules.cone_half_angle_deg);
            let hit = self.corridor.intersects_ring(&cone) || self.corridor.contains(hotspot.position);
            (hit, Some(cone))
        } else {
            (self.corridor.contains(hotspot.position), None)
        };

        let risk = self.model.score(&RiskInputs {
            intersects,
            distance_m,
            reach_m: radius_m.max(buffer),
            wind_speed_ms: wind.speed_ms,
            frp: hotspot.frp(),
        });

        HorizonRisk {
            horizon_h: wind.horizon_h,
            radius_m,
            intersects,
            risk,
            cone,
        }
    }

    pub fn evaluate(&self, hotspot: &Hotspot, schedule: &WindSchedule) -> RiskAnnotation {
        let distance_m = self.line.distance_to(hotspot.position);
        let horizons: Vec<HorizonRisk> = schedule
            .winds()
            .iter()
            .map(|wind| self.evaluate_horizon(hotspot, distance_m, wind))
            .collect();

        let risk_max = horizons.iter().map(|h| h.risk).fold(0.0, f64::max);
        let intersects_corridor = horizons.iter().any(|h| h.intersects);
        let wind_now = schedule.now();
        let eta_h = wind_now
            .and_then(|wind| self.model.eta_hours(distance_m, wind.speed_ms))
            .filter(|eta| eta.is_finite())
            .map(round2);

        RiskAnnotation {
            frp: hotspot.frp(),
            horizons,
            risk_max,
            eta_h,
            intersects_corridor,
            distance_to_line_m: distance_m,
            wind_now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HotspotProperties, WindSample};
    use crate::spatial::{haversine_distance, meters_to_lat, meters_to_lon};
    use chrono::TimeZone;

    const LAT: f64 = -15.0;
    const LON: f64 = -47.0;

    /// Straight 10 km north-south line.
    fn line() -> MonitoredLine {
        MonitoredLine::new(
            Some("test".into()),
            vec![Position::new(LON, LAT), Position::new(LON, LAT + meters_to_lat(10_000.0, LAT))],
        )
        .unwrap()
    }

    fn hotspot(position: Position, frp: f64) -> Hotspot {
        Hotspot {
            position,
            properties: HotspotProperties {
                frp,
                ..Default::default()
            },
        }
    }

    fn steady_wind(speed_ms: f64, from_deg: f64) -> WindForecast {
        let at = |h: i64| WindSample {
            speed_ms,
            direction_from_deg: from_deg,
            timestamp: Utc.timestamp_opt(1_700_000_000 + h * 3600, 0).unwrap(),
        };
        WindForecast {
            altitude_m: 10,
            source_altitude_m: 10,
            current: at(0),
            hourly: (0..48).map(at).collect(),
        }
    }

    fn mid_line() -> Position {
        Position::new(LON, LAT + meters_to_lat(5_000.0, LAT))
    }

    #[test]
    fn calm_hotspot_on_line_intersects_without_cone() {
        let engine = RiskEngine::new(line(), RiskRules::default());
        let schedule = WindSchedule::new(&steady_wind(0.0, 0.0), &[0.0]);
        let annotation = engine.evaluate(&hotspot(mid_line(), 10.0), &schedule);

        assert!(annotation.intersects_corridor);
        assert!(annotation.eta_h.is_none());
        assert!(annotation.horizons[0].cone.is_none());
        assert!(annotation.distance_to_line_m < 1.0);
        assert!(annotation.horizons[0].risk > 0.0);
    }

    #[test]
    fn upwind_hotspot_reaches_line_at_later_horizon() {
        let engine = RiskEngine::new(line(), RiskRules::default());
        // 50 km west of the line, wind blowing from the west toward it.
        let origin = Position::new(LON - meters_to_lon(50_000.0, LAT), mid_line().lat);
        let schedule = WindSchedule::new(&steady_wind(5.0, 270.0), &[0.0, 6.0]);
        let annotation = engine.evaluate(&hotspot(origin, 50.0), &schedule);

        assert!(!annotation.horizons[0].intersects);
        assert!(annotation.horizons[1].intersects);
        assert!((annotation.horizons[1].radius_m - 108_000.0).abs() < 1e-6);
        assert!(annotation.intersects_corridor);
        assert!(annotation.risk_max >= annotation.horizons[0].risk);

        let eta = annotation.eta_h.unwrap();
        assert!((eta - 50_000.0 / (5.0 * 3600.0)).abs() < 0.05);
    }

    #[test]
    fn downwind_hotspot_never_reaches_line() {
        let engine = RiskEngine::new(line(), RiskRules::default());
        let origin = Position::new(LON - meters_to_lon(50_000.0, LAT), mid_line().lat);
        // Wind from the east pushes the front away from the line.
        let schedule = WindSchedule::new(&steady_wind(5.0, 90.0), &[6.0, 24.0]);
        let annotation = engine.evaluate(&hotspot(origin, 50.0), &schedule);
        assert!(!annotation.intersects_corridor);
    }

    #[test]
    fn hotspot_inside_corridor_always_intersects_at_horizon_zero() {
        let engine = RiskEngine::new(line(), RiskRules::default());
        let inside = Position::new(LON + meters_to_lon(150.0, LAT), mid_line().lat);
        for (speed, from) in [(0.0, 0.0), (0.3, 90.0), (12.0, 270.0), (40.0, 0.0)] {
            let schedule = WindSchedule::new(&steady_wind(speed, from), &[0.0]);
            let annotation = engine.evaluate(&hotspot(inside, 0.0), &schedule);
            assert!(annotation.horizons[0].intersects, "speed {speed} from {from}");
        }
    }

    #[test]
    fn score_is_monotone_and_bounded() {
        let model = WeightedRiskModel::default();
        let base = RiskInputs {
            intersects: false,
            distance_m: 500.0,
            reach_m: 1_000.0,
            wind_speed_ms: 4.0,
            frp: 0.0,
        };
        let mut previous = 0.0;
        for frp in [0.0, 10.0, 50.0, 199.0, 200.0, 10_000.0] {
            for intersects in [false, true] {
                let score = model.score(&RiskInputs { frp, intersects, ..base });
                assert!((0.0..=100.0).contains(&score));
                if intersects {
                    let miss = model.score(&RiskInputs { frp, intersects: false, ..base });
                    assert!(score >= miss);
                } else {
                    assert!(score >= previous);
                    previous = score;
                }
            }
        }

        let extreme = RiskInputs {
            intersects: true,
            distance_m: 0.0,
            reach_m: 0.0,
            wind_speed_ms: f64::INFINITY,
            frp: f64::INFINITY,
        };
        assert!((model.score(&extreme) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn eta_needs_horizon_zero() {
        let engine = RiskEngine::new(line(), RiskRules::default());
        let origin = Position::new(LON - meters_to_lon(50_000.0, LAT), mid_line().lat);
        let schedule = WindSchedule::new(&steady_wind(5.0, 270.0), &[6.0]);
        assert!(schedule.now().is_none());

        let annotation = engine.evaluate(&hotspot(origin, 50.0), &schedule);
        assert!(annotation.eta_h.is_none());
        assert!(annotation.wind_now.is_none());
        assert!(annotation.horizons[0].intersects);
    }

    #[test]
    fn huge_horizon_uses_last_forecast_hour() {
        let forecast = steady_wind(5.0, 270.0);
        let schedule = WindSchedule::new(&forecast, &normalize_horizons(&[1e10]));
        let wind = schedule.winds()[0];
        assert_eq!(wind.timestamp, forecast.hourly[47].timestamp);
        assert_eq!(wind.speed_ms, 5.0);
    }

    #[test]
    fn eta_requires_wind() {
        let model = WeightedRiskModel::default();
        assert_eq!(model.eta_hours(3_600.0, 0.0), None);
        assert_eq!(model.eta_hours(3_600.0, 1.0), Some(1.0));
    }

    #[test]
    fn cone_spans_half_angle_around_bearing() {
        let origin = Position::new(LON, LAT);
        let cone = build_wind_cone(origin, 90.0, 10_000.0, 30.0);
        // Origin, 7 arc points (60° in 10° steps), origin again.
        assert_eq!(cone.len(), 9);
        assert_eq!(cone.first(), cone.last());
        for p in &cone[1..cone.len() - 1] {
            let d = haversine_distance(origin, *p);
            assert!((d - 10_000.0).abs() < 1.0);
            assert!(p.lon > origin.lon);
        }
        assert_eq!(build_wind_cone(origin, 90.0, 0.0, 30.0), vec![origin; 3]);
    }

    #[test]
    fn horizon_keys_are_zero_padded() {
        assert_eq!(horizon_key(0.0), "risk_h00");
        assert_eq!(horizon_key(6.0), "risk_h06");
        assert_eq!(horizon_key(24.0), "risk_h24");
        assert_eq!(horizon_key(1.5), "risk_h1.5");
    }

    #[test]
    fn horizons_are_filtered_sorted_and_deduplicated() {
        assert_eq!(
            normalize_horizons(&[6.0, 0.0, -1.0, f64::NAN, 6.0, 3.0]),
            vec![0.0, 3.0, 6.0]
        );
        assert!(normalize_horizons(&[-2.0]).is_empty());
    }
}
