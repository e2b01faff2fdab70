//! Multi-layer aggregation with deduplication and caching.

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

use firewatch_core::{dedupe_features, Feature, LAYER_PROPERTY};

use super::{
    fetch_with_fallback, BoundingBox, FeatureService, HotspotCollection, IngestMeta, LayerRequest, WireFormat,
    SOURCE_NAME,
};
use crate::cache::{CacheKey, TtlCache};
use crate::error::{IngestError, LayerError};

/// One hotspot query: which layers, where, how many, in which formats.
#[derive(Debug, Clone)]
pub struct HotspotQuery {
    pub typenames: Vec<String>,
    pub bbox: BoundingBox,
    pub count: u32,
    pub formats: Vec<WireFormat>,
}

impl HotspotQuery {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.typenames, &self.bbox.to_string(), self.count)
    }
}

/// Fetches every layer through the fallback chain and merges the results.
pub struct HotspotIngestor {
    service: Arc<dyn FeatureService>,
    cache: Arc<TtlCache<HotspotCollection>>,
}

impl HotspotIngestor {
    pub fn new(service: Arc<dyn FeatureService>, cache: Arc<TtlCache<HotspotCollection>>) -> Self {
        Self { service, cache }
    }

    pub fn cache(&self) -> &Arc<TtlCache<HotspotCollection>> {
        &self.cache
    }

    /// Serve from cache when possible, otherwise fetch and store.
    /// The cache is only written after a fetch fully succeeds.
    pub async fn load(&self, query: &HotspotQuery) -> Result<HotspotCollection, IngestError> {
        let key = query.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "hotspot cache hit");
            return Ok(hit.as_cached());
        }
        let collection = self.fetch(query).await?;
        self.cache.insert(key, collection.clone());
        Ok(collection)
    }

    /// Fetch all layers concurrently. A failed layer is skipped; only an
    /// empty result across every layer is an error.
    pub async fn fetch(&self, query: &HotspotQuery) -> Result<HotspotCollection, IngestError> {
        let service = self.service.as_ref();
        let fetches = query.typenames.iter().map(|typename| async move {
            let request = LayerRequest {
                typename: typename.as_str(),
                bbox: &query.bbox,
                count: query.count,
            };
            fetch_with_fallback(service, &request, &query.formats).await
        });
        let results = join_all(fetches).await;

        let mut aggregated: Vec<Feature> = Vec::new();
        let mut format_attempt: Vec<WireFormat> = Vec::new();
        for (typename, result) in query.typenames.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    if !format_attempt.contains(&outcome.format) {
                        format_attempt.push(outcome.format);
                    }
                    aggregated.extend(tag_layer(outcome.features, typename));
                }
                Err(LayerError::AllFormatsFailed { layer, attempts }) => {
                    tracing::error!(layer = %layer, attempts = attempts.len(), "skipping layer, every format failed");
                }
            }
        }

        if aggregated.is_empty() {
            tracing::error!(typenames = ?query.typenames, "no hotspots from any layer");
            return Err(IngestError::NoHotspots);
        }

        let fetched = aggregated.len();
        let features = dedupe_features(aggregated);
        tracing::info!(fetched, kept = features.len(), "hotspot layers aggregated");

        let mut typenames = query.typenames.clone();
        typenames.sort_unstable();
        Ok(HotspotCollection {
            features: Arc::new(features),
            meta: IngestMeta {
                typenames,
                bbox: query.bbox.to_string(),
                count: query.count,
                source: SOURCE_NAME.to_string(),
                cached: false,
                last_fetched_at: Utc::now(),
                format_attempt,
            },
        })
    }
}

/// Drop geometry-less features and record the source layer on the rest.
fn tag_layer(features: Vec<Feature>, typename: &str) -> impl Iterator<Item = Feature> + '_ {
    features
        .into_iter()
        .filter(Feature::has_geometry)
        .map(move |mut feature| {
            feature
                .properties
                .insert(LAYER_PROPERTY.to_string(), Value::String(typename.to_string()));
            feature
        })
}
