//! Hotspot ingestion from the WFS feature service.

pub mod aggregate;
pub mod bbox;
pub mod fetcher;
pub mod formats;
pub mod wfs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use firewatch_core::Feature;

pub use aggregate::{HotspotIngestor, HotspotQuery};
pub use bbox::BoundingBox;
pub use fetcher::{fetch_with_fallback, FormatOutcome};
pub use wfs::{FeatureService, LayerRequest, WfsClient};

/// Value reported as `meta.source`.
pub const SOURCE_NAME: &str = "FIRMS WFS";

/// Wire formats the feature service can answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    GeoJson,
    Csv,
    Kml,
}

impl WireFormat {
    /// Fallback order used by `auto`.
    pub const ALL: [WireFormat; 3] = [WireFormat::GeoJson, WireFormat::Csv, WireFormat::Kml];

    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::GeoJson => "geojson",
            WireFormat::Csv => "csv",
            WireFormat::Kml => "kml",
        }
    }

    /// Value sent as `outputFormat`.
    pub fn output_format(&self) -> &'static str {
        match self {
            WireFormat::GeoJson => "application/json",
            WireFormat::Csv => "csv",
            WireFormat::Kml => "application/vnd.google-earth.kml+xml",
        }
    }

    pub fn accept(&self) -> &'static str {
        match self {
            WireFormat::GeoJson => "application/json",
            WireFormat::Csv => "text/csv",
            WireFormat::Kml => "application/vnd.google-earth.kml+xml, application/xml, text/xml",
        }
    }

    /// Candidate list for a `format` query value: a single known format, or
    /// the full fallback chain for `auto`, unknown or missing values.
    pub fn candidates(selector: Option<&str>) -> Vec<WireFormat> {
        let selector = selector.map(|s| s.trim().to_ascii_lowercase());
        match selector.as_deref() {
            Some("geojson") => vec![WireFormat::GeoJson],
            Some("csv") => vec![WireFormat::Csv],
            Some("kml") => vec![WireFormat::Kml],
            _ => WireFormat::ALL.to_vec(),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion metadata returned alongside the features.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMeta {
    pub typenames: Vec<String>,
    pub bbox: String,
    pub count: u32,
    pub source: String,
    pub cached: bool,
    pub last_fetched_at: DateTime<Utc>,
    pub format_attempt: Vec<WireFormat>,
}

/// Aggregated, deduplicated hotspot features for one query.
///
/// Features sit behind an `Arc` so cache hits share the stored list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct HotspotCollection {
    pub features: Arc<Vec<Feature>>,
    pub meta: IngestMeta,
}

impl HotspotCollection {
    /// Shallow copy flagged as served from cache.
    pub fn as_cached(&self) -> Self {
        let mut copy = self.clone();
        copy.meta.cached = true;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_selector_defaults_to_full_chain() {
        assert_eq!(WireFormat::candidates(None), WireFormat::ALL.to_vec());
        assert_eq!(WireFormat::candidates(Some("auto")), WireFormat::ALL.to_vec());
        assert_eq!(WireFormat::candidates(Some("shapefile")), WireFormat::ALL.to_vec());
        assert_eq!(WireFormat::candidates(Some(" CSV ")), vec![WireFormat::Csv]);
    }

    #[test]
    fn collection_serializes_as_feature_collection() {
        let collection = HotspotCollection {
            features: Arc::new(Vec::new()),
            meta: IngestMeta {
                typenames: vec!["ms:fires_24h".into()],
                bbox: "-34,-74.5,5.5,-28.5".into(),
                count: 10,
                source: SOURCE_NAME.into(),
                cached: false,
                last_fetched_at: Utc::now(),
                format_attempt: vec![WireFormat::GeoJson],
            },
        };
        let value = serde_json::to_value(collection.as_cached()).unwrap();
        assert_eq!(value["type"], json!("FeatureCollection"));
        assert_eq!(value["meta"]["cached"], json!(true));
        assert_eq!(value["meta"]["formatAttempt"], json!(["geojson"]));
        assert!(value["meta"]["lastFetchedAt"].is_string());
        assert!(!collection.meta.cached);
    }
}
