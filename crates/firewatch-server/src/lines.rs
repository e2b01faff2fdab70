//! Monitored-line resolution from named assets or inline GeoJSON.

use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use firewatch_core::MonitoredLine;

use crate::error::ApiError;

/// Directory of `<id>.geojson` line assets.
#[derive(Debug, Clone)]
pub struct LineAssets {
    dir: PathBuf,
}

/// Lowercase, accents stripped, whitespace runs to `_`, anything but
/// alphanumerics `_` `-` dropped. Keeps the id safe to use as a file name.
pub fn normalize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !(ch.is_alphanumeric() || ch == '_' || ch == '-') {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push('_');
        }
        pending_space = false;
        out.extend(ch.to_lowercase());
    }
    out
}

impl LineAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a registered line by id.
    pub async fn load(&self, line_id: &str) -> Result<MonitoredLine, ApiError> {
        let id = normalize_id(line_id);
        if id.is_empty() {
            return Err(ApiError::InvalidLine(format!("line '{line_id}' is not registered")));
        }
        let path = self.dir.join(format!("{id}.geojson"));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ApiError::InvalidLine(format!("line '{line_id}' is not registered")));
            }
            Err(err) => {
                return Err(ApiError::Internal(format!("failed to read line asset {}: {err}", path.display())));
            }
        };
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Internal(format!("line asset {id} is not valid JSON: {e}")))?;
        MonitoredLine::from_geojson(Some(id), &value).map_err(|e| ApiError::InvalidLine(e.to_string()))
    }

    /// Inline geometry wins over an id; with neither, `default_id` is used.
    pub async fn resolve(
        &self,
        line_id: Option<&str>,
        inline: Option<&Value>,
        default_id: &str,
    ) -> Result<MonitoredLine, ApiError> {
        if let Some(geometry) = inline.filter(|v| !v.is_null()) {
            return MonitoredLine::from_geojson(None, geometry).map_err(|e| ApiError::InvalidLine(e.to_string()));
        }
        let id = line_id.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default_id);
        self.load(id).await
    }
}
