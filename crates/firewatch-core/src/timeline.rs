//! Forecast-length wind timeline for client visualization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{WindForecast, WindSample};
use crate::wind::{estimate_speed_at_height, round2, WindProfileSet, WindReading};

/// Altitudes filled in on every timeline entry besides the base altitude.
pub const TIMELINE_ALTITUDES_M: [u32; 3] = [50, 100, 200];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub is_past: bool,
    pub heights: BTreeMap<u32, WindReading>,
}

/// Pick the series the timeline is built on: `preferred_m` when observed
/// there, else the lowest observed altitude, else the lowest fetched one.
fn base_forecast(set: &WindProfileSet, preferred_m: u32) -> Option<&WindForecast> {
    if let Some(direct) = set.direct(preferred_m) {
        return Some(direct);
    }
    set.altitudes()
        .find_map(|altitude| set.direct(altitude))
        .or_else(|| set.altitudes().next().and_then(|altitude| set.anchor_for(altitude)))
}

fn reading(sample: &WindSample, from_m: u32, to_m: u32, exponent: f64, derived: bool) -> WindReading {
    WindReading {
        speed: round2(estimate_speed_at_height(
            sample.speed_ms,
            f64::from(from_m),
            f64::from(to_m),
            exponent,
        )),
        direction: sample.direction_from_deg,
        derived,
    }
}

/// Chronological `{timestamp, isPast, heights}` entries from the base series.
///
/// Each target altitude reads the same anchor forecast the horizon profiles
/// use, at the entry's timestamp; when that anchor has no sample there the
/// value is derived from the base sample.
pub fn build_wind_timeline(
    set: &WindProfileSet,
    preferred_base_m: u32,
    now: DateTime<Utc>,
) -> Vec<TimelineEntry> {
    let Some(base) = base_forecast(set, preferred_base_m) else {
        return Vec::new();
    };
    let exponent = set.shear_exponent();

    let mut series = base.hourly.clone();
    series.sort_by_key(|sample| sample.timestamp);
    series.dedup_by_key(|sample| sample.timestamp);

    series
        .iter()
        .map(|base_sample| {
            let timestamp = base_sample.timestamp;
            let mut heights = BTreeMap::new();
            heights.insert(
                base.altitude_m,
                reading(base_sample, base.altitude_m, base.altitude_m, exponent, !base.is_direct()),
            );

            for target in TIMELINE_ALTITUDES_M {
                if target == base.altitude_m {
                    continue;
                }
                let anchored = set
                    .anchor_for(target)
                    .and_then(|anchor| anchor.sample_at(timestamp).map(|sample| (anchor, sample)));
                let value = match anchored {
                    Some((anchor, sample)) => {
                        let derived = anchor.altitude_m != target || !anchor.is_direct();
                        reading(&sample, anchor.altitude_m, target, exponent, derived)
                    }
                    None => reading(base_sample, base.altitude_m, target, exponent, true),
                };
                heights.insert(target, value);
            }

            TimelineEntry {
                timestamp,
                is_past: timestamp < now,
                heights,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series(altitude_m: u32, speed: f64, hours: i64) -> WindForecast {
        let at = |h: i64| WindSample {
            speed_ms: speed,
            direction_from_deg: 45.0,
            timestamp: Utc.timestamp_opt(1_700_000_000 + h * 3600, 0).unwrap(),
        };
        WindForecast {
            altitude_m,
            source_altitude_m: altitude_m,
            current: at(0),
            hourly: (0..hours).rev().map(at).collect(),
        }
    }

    #[test]
    fn timeline_is_chronological_and_flags_past_entries() {
        let set = WindProfileSet::new([series(10, 4.0, 6)], 0.143);
        let now = Utc.timestamp_opt(1_700_000_000 + 2 * 3600, 0).unwrap();
        let timeline = build_wind_timeline(&set, 10, now);

        assert_eq!(timeline.len(), 6);
        assert!(timeline.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        let past: Vec<bool> = timeline.iter().map(|e| e.is_past).collect();
        assert_eq!(past, vec![true, true, false, false, false, false]);
        let altitudes: Vec<u32> = timeline[0].heights.keys().copied().collect();
        assert_eq!(altitudes, vec![10, 50, 100, 200]);
    }

    #[test]
    fn observed_altitudes_are_used_directly() {
        let set = WindProfileSet::new([series(10, 4.0, 3), series(100, 9.0, 3)], 0.143);
        let timeline = build_wind_timeline(&set, 10, Utc::now());
        let entry = &timeline[0];
        assert_eq!(entry.heights[&10].speed, 4.0);
        assert!(!entry.heights[&100].derived);
        assert_eq!(entry.heights[&100].speed, 9.0);

        // 200 m is anchored on the observed 100 m sample, not on 10 m.
        let expected_200 = round2(estimate_speed_at_height(9.0, 100.0, 200.0, 0.143));
        assert_eq!(entry.heights[&200].speed, expected_200);
        assert!(entry.heights[&200].derived);
        assert!(entry.heights[&50].derived);
    }

    #[test]
    fn rescaled_altitude_matches_horizon_profile() {
        // 100 m was rescaled from the 80 m level rather than observed.
        let mut rescaled_100 = series(80, 6.0, 3).rescaled(100, 0.143);
        rescaled_100.hourly.sort_by_key(|sample| sample.timestamp);
        let set = WindProfileSet::new([series(10, 4.0, 3), rescaled_100.clone()], 0.143);

        let timeline = build_wind_timeline(&set, 10, Utc::now());
        let profile = set.profile_for_horizon(0.0, &[]).unwrap();
        let entry = &timeline[0];

        assert!(entry.heights[&100].derived);
        assert_eq!(entry.heights[&100].speed, round2(rescaled_100.hourly[0].speed_ms));
        assert_eq!(entry.heights[&100].speed, profile.heights[&100].speed);
        assert_eq!(entry.heights[&200].speed, profile.heights[&200].speed);
        assert_ne!(entry.heights[&100].speed, round2(estimate_speed_at_height(4.0, 10.0, 100.0, 0.143)));
    }

    #[test]
    fn falls_back_to_lowest_observed_base() {
        let set = WindProfileSet::new([series(80, 6.0, 2)], 0.143);
        let timeline = build_wind_timeline(&set, 10, Utc::now());
        assert_eq!(timeline.len(), 2);
        assert!(timeline[0].heights.contains_key(&80));
        assert!(build_wind_timeline(&WindProfileSet::default(), 10, Utc::now()).is_empty());
    }
}
