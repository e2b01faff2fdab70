//! Wind-forecast provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use firewatch_core::{Position, WindForecast, WindSample};

use crate::cache::{CacheKey, TtlCache};
use crate::error::{FetchError, WindError};

/// Heights the provider observes directly.
pub const OBSERVED_LEVELS_M: [u32; 4] = [10, 80, 120, 180];

/// Source of wind forecasts for a location and query altitude.
#[async_trait]
pub trait WindProvider: Send + Sync {
    async fn forecast(&self, position: Position, altitude_m: u32) -> Result<WindForecast, WindError>;
}

/// Observed level closest to `altitude_m`; the lower level wins ties.
pub fn nearest_level(altitude_m: u32) -> u32 {
    OBSERVED_LEVELS_M
        .iter()
        .copied()
        .min_by_key(|level| level.abs_diff(altitude_m))
        .unwrap_or(10)
}

#[derive(Debug, Deserialize)]
struct OpenMeteoPayload {
    #[serde(default)]
    current: Option<CurrentBlock>,
    #[serde(default)]
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: i64,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    wind_direction_10m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<i64>,
    #[serde(flatten)]
    series: HashMap<String, Vec<Option<f64>>>,
}

/// Open-Meteo forecast client.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    url: String,
    forecast_days: u32,
    timeout: Duration,
    shear_exponent: f64,
}

impl OpenMeteoClient {
    pub fn new(client: Client, url: &str, forecast_days: u32, timeout: Duration, shear_exponent: f64) -> Self {
        Self {
            client,
            url: url.to_string(),
            forecast_days,
            timeout,
            shear_exponent,
        }
    }

    async fn fetch_level(&self, position: Position, level: u32) -> Result<String, FetchError> {
        let hourly = format!("wind_speed_{level}m,wind_direction_{level}m");
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("latitude", position.lat.to_string()),
                ("longitude", position.lon.to_string()),
                ("hourly", hourly),
                ("current", "wind_speed_10m,wind_direction_10m".to_string()),
                ("timeformat", "unixtime".to_string()),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", "UTC".to_string()),
                ("forecast_days", self.forecast_days.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl WindProvider for OpenMeteoClient {
    async fn forecast(&self, position: Position, altitude_m: u32) -> Result<WindForecast, WindError> {
        let level = nearest_level(altitude_m);
        tracing::debug!(lat = position.lat, lon = position.lon, altitude_m, level, "requesting wind forecast");

        let body = self
            .fetch_level(position, level)
            .await
            .map_err(|source| WindError::Fetch { altitude_m, source })?;
        parse_forecast(&body, altitude_m, level, self.shear_exponent, Utc::now())
            .map_err(|source| WindError::Fetch { altitude_m, source })
    }
}

/// Serves forecasts from a TTL cache keyed by grid cell and altitude,
/// fetching from `inner` on a miss. Failures are not cached.
pub struct CachedWindProvider {
    inner: Arc<dyn WindProvider>,
    cache: Arc<TtlCache<WindForecast>>,
}

impl CachedWindProvider {
    pub fn new(inner: Arc<dyn WindProvider>, cache: Arc<TtlCache<WindForecast>>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl WindProvider for CachedWindProvider {
    async fn forecast(&self, position: Position, altitude_m: u32) -> Result<WindForecast, WindError> {
        let key = CacheKey::wind(position, altitude_m);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "wind cache hit");
            return Ok(hit);
        }
        let forecast = self.inner.forecast(position, altitude_m).await?;
        self.cache.insert(key, forecast.clone());
        Ok(forecast)
    }
}

fn sample(time: i64, speed: Option<f64>, direction: Option<f64>) -> Option<WindSample> {
    let speed_ms = speed.filter(|v| v.is_finite())?;
    let direction_from_deg = direction.filter(|v| v.is_finite())?;
    Some(WindSample {
        speed_ms,
        direction_from_deg,
        timestamp: DateTime::from_timestamp(time, 0)?,
    })
}

/// Turn a provider payload observed at `level` into a forecast for
/// `altitude_m`, rescaling with the power law when the two differ.
pub fn parse_forecast(
    body: &str,
    altitude_m: u32,
    level: u32,
    shear_exponent: f64,
    now: DateTime<Utc>,
) -> Result<WindForecast, FetchError> {
    let payload: OpenMeteoPayload = serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut hourly = Vec::new();
    if let Some(block) = payload.hourly {
        let speeds = block.series.get(&format!("wind_speed_{level}m"));
        let directions = block.series.get(&format!("wind_direction_{level}m"));
        if let (Some(speeds), Some(directions)) = (speeds, directions) {
            hourly = block
                .time
                .iter()
                .zip(speeds.iter().zip(directions))
                .filter_map(|(&time, (&speed, &direction))| sample(time, speed, direction))
                .collect();
        }
    }
    hourly.sort_by_key(|s| s.timestamp);

    let from_current_block = (level == 10)
        .then(|| payload.current.as_ref())
        .flatten()
        .and_then(|c| sample(c.time, c.wind_speed_10m, c.wind_direction_10m));
    let nearest_hourly = hourly
        .iter()
        .min_by_key(|s| (s.timestamp - now).num_seconds().abs())
        .copied();
    let current = from_current_block
        .or(nearest_hourly)
        .ok_or_else(|| FetchError::InvalidPayload(format!("no wind samples at {level} m")))?;

    let observed = WindForecast {
        altitude_m: level,
        source_altitude_m: level,
        current,
        hourly,
    };
    if level == altitude_m {
        Ok(observed)
    } else {
        Ok(observed.rescaled(altitude_m, shear_exponent))
    }
}
