//! Bounding-box parsing for hotspot queries.
//!
//! Callers use `latMin,lonMin,latMax,lonMax`; the WFS wants
//! `lonMin,latMin,lonMax,latMax`.

use std::fmt;
use thiserror::Error;

/// Brazil national extent, used when no bbox is given.
pub const BRAZIL_BBOX: BoundingBox = BoundingBox {
    lat_min: -34.0,
    lon_min: -74.5,
    lat_max: 5.5,
    lon_max: -28.5,
};

pub const SOUTH_AMERICA_BBOX: BoundingBox = BoundingBox {
    lat_min: -90.0,
    lon_min: -180.0,
    lat_max: 90.0,
    lon_max: 180.0,
};

#[derive(Debug, Error, PartialEq)]
pub enum BboxError {
    #[error("expected latMin,lonMin,latMax,lonMax or 'south_america'")]
    Format,
    #[error("minimums must be below maximums (latMin,lonMin,latMax,lonMax)")]
    Order,
    #[error("latitudes must lie within ±90 and longitudes within ±180")]
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Parse a query value. Missing or blank input yields the national default.
    pub fn parse(raw: Option<&str>) -> Result<Self, BboxError> {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return Ok(BRAZIL_BBOX);
        }
        if trimmed.eq_ignore_ascii_case("south_america") {
            return Ok(SOUTH_AMERICA_BBOX);
        }

        let parts: Vec<f64> = trimmed
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| BboxError::Format)?;
        let [lat_min, lon_min, lat_max, lon_max] = parts[..] else {
            return Err(BboxError::Format);
        };
        if parts.iter().any(|v| !v.is_finite()) {
            return Err(BboxError::Format);
        }

        let bbox = Self {
            lat_min,
            lon_min,
            lat_max,
            lon_max,
        };
        if lat_min >= lat_max || lon_min >= lon_max {
            return Err(BboxError::Order);
        }
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
        if !(lat_ok(lat_min) && lat_ok(lat_max) && lon_ok(lon_min) && lon_ok(lon_max)) {
            return Err(BboxError::OutOfRange);
        }
        Ok(bbox)
    }

    /// Axis order expected by the WFS `BBOX` parameter.
    pub fn to_wfs_param(&self) -> String {
        format!("{},{},{},{}", self.lon_min, self.lat_min, self.lon_max, self.lat_max)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.lat_min, self.lon_min, self.lat_max, self.lon_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_uses_national_default() {
        assert_eq!(BoundingBox::parse(None), Ok(BRAZIL_BBOX));
        assert_eq!(BoundingBox::parse(Some("  ")), Ok(BRAZIL_BBOX));
        assert_eq!(BRAZIL_BBOX.to_string(), "-34,-74.5,5.5,-28.5");
    }

    #[test]
    fn south_america_alias() {
        let bbox = BoundingBox::parse(Some("South_America")).unwrap();
        assert_eq!(bbox.to_string(), "-90,-180,90,180");
    }

    #[test]
    fn wfs_param_swaps_axis_order() {
        let bbox = BoundingBox::parse(Some("-10, -50, -5, -45")).unwrap();
        assert_eq!(bbox.to_string(), "-10,-50,-5,-45");
        assert_eq!(bbox.to_wfs_param(), "-50,-10,-45,-5");
    }

    #[test]
    fn rejects_malformed_boxes() {
        assert_eq!(BoundingBox::parse(Some("1,2,3")), Err(BboxError::Format));
        assert_eq!(BoundingBox::parse(Some("a,b,c,d")), Err(BboxError::Format));
        assert_eq!(BoundingBox::parse(Some("1,2,3,inf")), Err(BboxError::Format));
        assert_eq!(BoundingBox::parse(Some("5,2,3,4")), Err(BboxError::Order));
        assert_eq!(BoundingBox::parse(Some("-95,2,3,4")), Err(BboxError::OutOfRange));
        assert_eq!(BoundingBox::parse(Some("-10,-190,3,4")), Err(BboxError::OutOfRange));
    }
}
