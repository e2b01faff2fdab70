//! Geometry and line-resolution errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("line has no LineString geometry")]
    MissingLineString,
    #[error("expected exactly one LineString, found {0}")]
    AmbiguousLineString(usize),
    #[error("LineString needs at least two valid positions, found {0}")]
    TooFewPositions(usize),
    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
}
