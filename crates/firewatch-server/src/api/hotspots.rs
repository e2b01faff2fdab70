//! Hotspot query.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::{parse_count, split_list};
use crate::error::ApiError;
use crate::ingest::{BoundingBox, HotspotCollection, HotspotQuery, WireFormat};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HotspotParams {
    pub bbox: Option<String>,
    pub typenames: Option<String>,
    pub count: Option<String>,
    pub format: Option<String>,
}

impl HotspotParams {
    /// Validate into a query, filling defaults from configuration.
    pub fn into_query(self, default_typenames: &[String], default_count: u32) -> Result<HotspotQuery, ApiError> {
        let bbox = BoundingBox::parse(self.bbox.as_deref()).map_err(|e| ApiError::InvalidBbox(e.to_string()))?;

        let typenames = match self.typenames.as_deref() {
            Some(raw) => split_list(raw),
            None => default_typenames.to_vec(),
        };
        if typenames.is_empty() {
            return Err(ApiError::InvalidTypenames);
        }

        let count = match self.count.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_count(raw).ok_or_else(|| ApiError::InvalidCount(raw.to_string()))?,
            None => default_count,
        };

        Ok(HotspotQuery {
            typenames,
            bbox,
            count,
            formats: WireFormat::candidates(self.format.as_deref()),
        })
    }
}

/// `GET /v1/firms/wfs`
pub async fn get_hotspots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HotspotParams>,
) -> Result<Json<HotspotCollection>, ApiError> {
    let ingestor = state.ingestor()?;
    let config = state.config();
    let query = params.into_query(&config.default_typenames, config.default_count)?;
    let collection = ingestor.load(&query).await?;
    Ok(Json(collection))
}
