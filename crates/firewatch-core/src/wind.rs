//! Wind direction helpers, the altitude power law and per-horizon
//! multi-altitude wind profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{WindForecast, WindSample};

/// Open-terrain wind shear exponent (≈ 1/7).
pub const DEFAULT_SHEAR_EXPONENT: f64 = 0.143;

/// Altitudes always present in a profile, derived when not observed.
pub const PROFILE_TARGET_ALTITUDES_M: [u32; 2] = [50, 200];

/// Preferred anchor when deriving 200 m.
pub const ANCHOR_100_M: u32 = 100;

/// Reciprocal of a meteorological "from" bearing, normalized to [0, 360).
pub fn bearing_to_toward(from_deg: f64) -> f64 {
    if !from_deg.is_finite() {
        return 0.0;
    }
    (from_deg.rem_euclid(360.0) + 180.0) % 360.0
}

/// Extrapolate a wind speed from `from_height_m` to `to_height_m` with the
/// power law `v · (to / from)^α`.
///
/// Returns the input unchanged for equal heights and for heights where the
/// law is undefined (non-positive or non-finite).
pub fn estimate_speed_at_height(speed: f64, from_height_m: f64, to_height_m: f64, exponent: f64) -> f64 {
    if from_height_m == to_height_m {
        return speed;
    }
    let valid = |h: f64| h.is_finite() && h > 0.0;
    if !valid(from_height_m) || !valid(to_height_m) || !exponent.is_finite() {
        return speed;
    }
    speed * (to_height_m / from_height_m).powf(exponent)
}

/// Speed/direction at one altitude, as handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindReading {
    pub speed: f64,
    pub direction: f64,
    /// True when computed with the power law rather than observed.
    #[serde(default)]
    pub derived: bool,
}

impl WindReading {
    fn observed(sample: &WindSample) -> Self {
        Self {
            speed: round2(sample.speed_ms),
            direction: sample.direction_from_deg,
            derived: false,
        }
    }

    fn derived(sample: &WindSample, from_m: u32, to_m: u32, exponent: f64) -> Self {
        let speed = estimate_speed_at_height(sample.speed_ms, f64::from(from_m), f64::from(to_m), exponent);
        Self {
            speed: round2(speed),
            direction: sample.direction_from_deg,
            derived: true,
        }
    }
}

/// Multi-altitude wind for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindProfile {
    pub horizon_h: f64,
    pub timestamp: DateTime<Utc>,
    pub heights: BTreeMap<u32, WindReading>,
}

/// Forecasts fetched for one location, keyed by altitude.
#[derive(Debug, Clone, Default)]
pub struct WindProfileSet {
    forecasts: BTreeMap<u32, WindForecast>,
    shear_exponent: f64,
}

impl WindProfileSet {
    pub fn new(forecasts: impl IntoIterator<Item = WindForecast>, shear_exponent: f64) -> Self {
        let mut map: BTreeMap<u32, WindForecast> = BTreeMap::new();
        for forecast in forecasts {
            // A direct observation beats a rescaled one at the same altitude.
            let replace = map
                .get(&forecast.altitude_m)
                .map(|existing| !existing.is_direct() && forecast.is_direct())
                .unwrap_or(true);
            if replace {
                map.insert(forecast.altitude_m, forecast);
            }
        }
        Self {
            forecasts: map,
            shear_exponent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }

    pub fn shear_exponent(&self) -> f64 {
        self.shear_exponent
    }

    pub fn altitudes(&self) -> impl Iterator<Item = u32> + '_ {
        self.forecasts.keys().copied()
    }

    /// Forecast directly observed at exactly `altitude_m`.
    pub fn direct(&self, altitude_m: u32) -> Option<&WindForecast> {
        self.forecasts.get(&altitude_m).filter(|f| f.is_direct())
    }

    /// Best forecast to derive `target_m` from: a direct observation at the
    /// target, then a direct 100 m sample for 200 m, then the fetched
    /// altitude closest to the target (direct ones first on ties).
    pub fn anchor_for(&self, target_m: u32) -> Option<&WindForecast> {
        if let Some(direct) = self.direct(target_m) {
            return Some(direct);
        }
        if target_m == 200 {
            if let Some(anchor) = self.direct(ANCHOR_100_M) {
                return Some(anchor);
            }
        }
        self.forecasts
            .values()
            .min_by_key(|f| (f.altitude_m.abs_diff(target_m), !f.is_direct()))
    }

    /// Forecast at `altitude_m`, rescaled from the best anchor if needed.
    pub fn forecast_at(&self, altitude_m: u32) -> Option<WindForecast> {
        let anchor = self.anchor_for(altitude_m)?;
        if anchor.altitude_m == altitude_m {
            return Some(anchor.clone());
        }
        Some(anchor.rescaled(altitude_m, self.shear_exponent))
    }

    /// Profile for `horizon_h` covering every fetched altitude, the
    /// fixed interpolation targets and any `extra` altitudes.
    pub fn profile_for_horizon(&self, horizon_h: f64, extra: &[u32]) -> Option<WindProfile> {
        let mut altitudes: Vec<u32> = self.altitudes().collect();
        altitudes.extend(PROFILE_TARGET_ALTITUDES_M);
        altitudes.extend_from_slice(extra);
        altitudes.sort_unstable();
        altitudes.dedup();

        let mut timestamp = None;
        let mut heights = BTreeMap::new();
        for altitude in altitudes {
            let Some(anchor) = self.anchor_for(altitude) else {
                continue;
            };
            let sample = anchor.sample_for_horizon(horizon_h);
            timestamp.get_or_insert(sample.timestamp);
            let reading = if anchor.altitude_m == altitude && anchor.is_direct() {
                WindReading::observed(&sample)
            } else {
                WindReading::derived(&sample, anchor.altitude_m, altitude, self.shear_exponent)
            };
            heights.insert(altitude, reading);
        }

        Some(WindProfile {
            horizon_h,
            timestamp: timestamp?,
            heights,
        })
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
