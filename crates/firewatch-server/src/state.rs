//! Shared application state.

use std::sync::Arc;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::ApiError;
use crate::ingest::{FeatureService, HotspotCollection, HotspotIngestor, WfsClient};
use crate::lines::LineAssets;
use crate::weather::{CachedWindProvider, OpenMeteoClient, WindProvider};
use firewatch_core::WindForecast;

pub struct AppState {
    config: Config,
    cache: Arc<TtlCache<HotspotCollection>>,
    wind_cache: Arc<TtlCache<WindForecast>>,
    /// Absent when no feature-service credential is configured.
    ingestor: Option<HotspotIngestor>,
    wind: Arc<dyn WindProvider>,
    lines: LineAssets,
}

impl AppState {
    /// Live services built from configuration.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("firewatch-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let service: Option<Arc<dyn FeatureService>> = config.wfs_key.as_deref().map(|key| {
            Arc::new(WfsClient::new(client.clone(), &config.wfs_base, key, config.request_timeout()))
                as Arc<dyn FeatureService>
        });
        if service.is_none() {
            tracing::warn!("FIRMS_WFS_KEY is not set; hotspot routes will reject requests");
        }

        let wind = Arc::new(OpenMeteoClient::new(
            client,
            &config.wind_provider_url,
            config.wind_forecast_days,
            config.wind_timeout(),
            config.wind_shear_exponent,
        ));
        Ok(Self::with_services(config, service, wind))
    }

    /// Wires the given services behind the hotspot and wind caches.
    pub fn with_services(
        config: Config,
        service: Option<Arc<dyn FeatureService>>,
        wind: Arc<dyn WindProvider>,
    ) -> Self {
        let cache = Arc::new(TtlCache::new(config.cache_ttl()));
        let wind_cache = Arc::new(TtlCache::new(config.wind_cache_ttl()));
        let ingestor = service.map(|service| HotspotIngestor::new(service, cache.clone()));
        let wind = Arc::new(CachedWindProvider::new(wind, wind_cache.clone()));
        let lines = LineAssets::new(config.line_assets_dir.clone());
        Self {
            config,
            cache,
            wind_cache,
            ingestor,
            wind,
            lines,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TtlCache<HotspotCollection>> {
        &self.cache
    }

    pub fn wind_cache(&self) -> &Arc<TtlCache<WindForecast>> {
        &self.wind_cache
    }

    /// The ingestor, or a configuration error when no credential is set.
    pub fn ingestor(&self) -> Result<&HotspotIngestor, ApiError> {
        self.ingestor.as_ref().ok_or(ApiError::MissingCredential)
    }

    pub fn wind(&self) -> &dyn WindProvider {
        self.wind.as_ref()
    }

    pub fn lines(&self) -> &LineAssets {
        &self.lines
    }
}
