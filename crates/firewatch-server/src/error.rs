//! Error types for upstream fetches and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ingest::WireFormat;

/// One failed request/parse against an upstream service.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("upstream responded {0}")]
    Status(u16),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        if let Some(status) = err.status() {
            return FetchError::Status(status.as_u16());
        }
        if err.is_decode() {
            return FetchError::Parse(err.to_string());
        }
        // reqwest error text embeds the URL, which carries the credential.
        FetchError::Network(err.without_url().to_string())
    }
}

/// Every candidate wire format failed for a layer.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("no format succeeded for layer {layer}")]
    AllFormatsFailed {
        layer: String,
        attempts: Vec<(WireFormat, FetchError)>,
    },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no hotspot data could be fetched from the feature service")]
    NoHotspots,
}

#[derive(Debug, Error)]
pub enum WindError {
    #[error("wind forecast request failed at {altitude_m} m: {source}")]
    Fetch {
        altitude_m: u32,
        #[source]
        source: FetchError,
    },
    #[error("no wind forecast available at any requested altitude")]
    Unavailable,
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("feature service credential is not configured")]
    MissingCredential,
    #[error("invalid bbox: {0}")]
    InvalidBbox(String),
    #[error("at least one typename is required")]
    InvalidTypenames,
    #[error("invalid count: {0}")]
    InvalidCount(String),
    #[error("invalid line: {0}")]
    InvalidLine(String),
    #[error("invalid horizons: {0}")]
    InvalidHorizons(String),
    #[error(transparent)]
    Ingestion(#[from] IngestError),
    #[error(transparent)]
    Forecast(#[from] WindError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential
            | ApiError::InvalidBbox(_)
            | ApiError::InvalidTypenames
            | ApiError::InvalidCount(_)
            | ApiError::InvalidLine(_)
            | ApiError::InvalidHorizons(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingestion(_) | ApiError::Forecast(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
