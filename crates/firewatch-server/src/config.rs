//! Server configuration from environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use firewatch_core::RiskRules;

const DEFAULT_WFS_BASE: &str = "https://firms.modaps.eosdis.nasa.gov/mapserver/wfs/South_America";
const DEFAULT_TYPENAMES: &str =
    "ms:fires_noaa20_24hrs,ms:fires_noaa21_24hrs,ms:fires_npp_24hrs,ms:fires_modis_24hrs";
const DEFAULT_WIND_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Where the wind forecast is sampled for a risk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindAnchor {
    /// Centroid of the hotspot set.
    Hotspots,
    /// Centroid of the monitored line.
    Line,
}

impl WindAnchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindAnchor::Hotspots => "hotspots",
            WindAnchor::Line => "line",
        }
    }
}

impl FromStr for WindAnchor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hotspots" | "hotspot" => Ok(WindAnchor::Hotspots),
            "line" => Ok(WindAnchor::Line),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub wfs_base: String,
    pub wfs_key: Option<String>,
    pub default_typenames: Vec<String>,
    pub default_count: u32,
    pub risk_default_count: u32,
    pub cache_ttl_s: u64,
    pub cache_max_entries: usize,
    pub wind_cache_ttl_s: u64,
    pub request_timeout_s: u64,
    pub wind_provider_url: String,
    pub wind_forecast_days: u32,
    pub wind_timeout_s: u64,
    pub wind_shear_exponent: f64,
    pub wind_base_altitude_m: u32,
    pub wind_anchor: WindAnchor,
    pub line_buffer_m: f64,
    pub cone_half_angle_deg: f64,
    pub wind_saturation_ms: f64,
    pub frp_saturation_mw: f64,
    pub line_assets_dir: PathBuf,
    pub default_line_id: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing or unparsable values fall
    /// back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let parsed = |key: &str| text(key).and_then(|s| s.parse::<u64>().ok());
        let float = |key: &str, default: f64| {
            text(key)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };

        let default_typenames = split_list(&text("FIRMS_DEFAULT_TYPENAMES").unwrap_or_else(|| DEFAULT_TYPENAMES.to_string()));

        Self {
            server_port: text("FIREWATCH_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            wfs_base: text("FIRMS_WFS_BASE").unwrap_or_else(|| DEFAULT_WFS_BASE.to_string()),
            wfs_key: text("FIRMS_WFS_KEY").or_else(|| text("FIRMS_API_KEY")),
            default_typenames,
            default_count: parsed("FIRMS_DEFAULT_COUNT").map(clamp_count).unwrap_or(5000),
            risk_default_count: parsed("FIRMS_RISK_DEFAULT_COUNT").map(clamp_count).unwrap_or(2000),
            cache_ttl_s: parsed("FIRMS_CACHE_TTL_SEC").unwrap_or(600),
            cache_max_entries: parsed("FIRMS_CACHE_MAX_ENTRIES").unwrap_or(64) as usize,
            wind_cache_ttl_s: parsed("WEATHER_CACHE_TTL_SEC").unwrap_or(300),
            request_timeout_s: parsed("FIRMS_REQUEST_TIMEOUT_SEC").unwrap_or(20).max(3),
            wind_provider_url: text("WIND_PROVIDER_URL").unwrap_or_else(|| DEFAULT_WIND_URL.to_string()),
            wind_forecast_days: parsed("WIND_FORECAST_DAYS").unwrap_or(2).clamp(1, 16) as u32,
            wind_timeout_s: parsed("WIND_REQUEST_TIMEOUT_SEC").unwrap_or(10).max(3),
            wind_shear_exponent: float("WIND_SHEAR_EXPONENT", firewatch_core::wind::DEFAULT_SHEAR_EXPONENT),
            wind_base_altitude_m: parsed("WIND_BASE_ALTITUDE_M").unwrap_or(10) as u32,
            wind_anchor: text("WIND_ANCHOR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(WindAnchor::Hotspots),
            line_buffer_m: float("QUEIMADAS_LINE_BUFFER_M", 200.0).max(0.0),
            cone_half_angle_deg: float("QUEIMADAS_CONE_HALF_ANGLE_DEG", 30.0).clamp(0.0, 180.0),
            wind_saturation_ms: float("RISK_WIND_SATURATION_MS", 14.0),
            frp_saturation_mw: float("RISK_FRP_SATURATION_MW", 200.0),
            line_assets_dir: text("LINE_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets/lines")),
            default_line_id: text("DEFAULT_LINE_ID").unwrap_or_else(|| "ramal_marape".to_string()),
        }
    }

    pub fn risk_rules(&self) -> RiskRules {
        RiskRules {
            buffer_m: self.line_buffer_m,
            cone_half_angle_deg: self.cone_half_angle_deg,
            wind_saturation_ms: self.wind_saturation_ms,
            frp_saturation_mw: self.frp_saturation_mw,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_s)
    }

    pub fn wind_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.wind_cache_ttl_s)
    }

    /// Expired entries are swept every `max(30, ttl / 2)` seconds, using the
    /// shorter of the hotspot and wind TTLs.
    pub fn cache_sweep_interval(&self) -> Duration {
        let ttl = self.cache_ttl_s.min(self.wind_cache_ttl_s);
        Duration::from_secs((ttl / 2).max(30))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s)
    }

    pub fn wind_timeout(&self) -> Duration {
        Duration::from_secs(self.wind_timeout_s)
    }

    /// Longest risk horizon the hourly forecast covers.
    pub fn max_horizon_h(&self) -> f64 {
        f64::from(self.wind_forecast_days * 24)
    }
}

/// Split a comma-separated list, trimming and dropping empty items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Feature counts are bounded to 1..=10000.
pub fn clamp_count(value: u64) -> u32 {
    value.clamp(1, 10_000) as u32
}

/// Parse a caller-supplied count: numeric values are clamped, anything else
/// is rejected.
pub fn parse_count(raw: &str) -> Option<u32> {
    let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(value.clamp(1.0, 10_000.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config_with(&[]);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.default_typenames.len(), 4);
        assert_eq!(config.default_count, 5000);
        assert_eq!(config.risk_default_count, 2000);
        assert_eq!(config.cache_ttl_s, 600);
        assert_eq!(config.wind_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(150));
        assert_eq!(config.wind_anchor, WindAnchor::Hotspots);
        assert_eq!(config.default_line_id, "ramal_marape");
        assert!(config.wfs_key.is_none());
        assert_eq!(config.risk_rules().buffer_m, 200.0);
    }

    #[test]
    fn api_key_is_a_fallback_for_the_wfs_key() {
        assert_eq!(
            config_with(&[("FIRMS_API_KEY", "abc")]).wfs_key.as_deref(),
            Some("abc")
        );
        assert_eq!(
            config_with(&[("FIRMS_API_KEY", "abc"), ("FIRMS_WFS_KEY", "wfs")]).wfs_key.as_deref(),
            Some("wfs")
        );
        assert!(config_with(&[("FIRMS_WFS_KEY", "  ")]).wfs_key.is_none());
    }

    #[test]
    fn garbage_values_fall_back_to_defaults() {
        let config = config_with(&[
            ("QUEIMADAS_LINE_BUFFER_M", "NaN"),
            ("FIRMS_CACHE_TTL_SEC", "soon"),
            ("FIRMS_REQUEST_TIMEOUT_SEC", "1"),
            ("WIND_ANCHOR", "LINE"),
            ("FIRMS_DEFAULT_TYPENAMES", " a , ,b "),
        ]);
        assert_eq!(config.line_buffer_m, 200.0);
        assert_eq!(config.cache_ttl_s, 600);
        assert_eq!(config.request_timeout_s, 3);
        assert_eq!(config.wind_anchor, WindAnchor::Line);
        assert_eq!(config.default_typenames, vec!["a", "b"]);
    }

    #[test]
    fn sweep_follows_the_shorter_ttl() {
        let config = config_with(&[("FIRMS_CACHE_TTL_SEC", "900"), ("WEATHER_CACHE_TTL_SEC", "120")]);
        assert_eq!(config.wind_cache_ttl_s, 120);
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn short_ttl_still_sweeps_every_thirty_seconds() {
        let config = config_with(&[("FIRMS_CACHE_TTL_SEC", "20")]);
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn counts_are_clamped_and_garbage_rejected() {
        assert_eq!(parse_count("0"), Some(1));
        assert_eq!(parse_count(" 250 "), Some(250));
        assert_eq!(parse_count("99999"), Some(10_000));
        assert_eq!(parse_count("12.9"), Some(12));
        assert_eq!(parse_count("lots"), None);
        assert_eq!(parse_count("NaN"), None);
    }
}
