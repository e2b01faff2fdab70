//! Spatial math for corridor, distance and wind-cone checks.
//!
//! Positions are WGS84 decimal degrees in GeoJSON order (lon, lat). Planar
//! checks run in a local tangent plane (see [`LocalFrame`]) using
//! latitude-aware meters-per-degree scaling.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lon: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// GeoJSON coordinate pair.
    pub fn to_coordinates(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(from: Position, to: Position) -> f64 {
    let (lat_a, lat_b) = (from.lat.to_radians(), to.lat.to_radians());
    let half_dlat = (to.lat - from.lat).to_radians() / 2.0;
    let half_dlon = (to.lon - from.lon).to_radians() / 2.0;
    let h = half_dlat.sin().powi(2) + lat_a.cos() * lat_b.cos() * half_dlon.sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

// Meters per degree at a latitude, WGS84 series expansion.
fn lat_scale(lat_deg: f64) -> f64 {
    let phi = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * phi).cos() + 1.175 * (4.0 * phi).cos() - 0.0023 * (6.0 * phi).cos()
}

fn lon_scale(lat_deg: f64) -> f64 {
    let phi = lat_deg.to_radians();
    111_412.84 * phi.cos() - 93.5 * (3.0 * phi).cos() + 0.118 * (5.0 * phi).cos()
}

/// Northward offset in meters expressed as degrees of latitude around `at_lat`.
pub fn meters_to_lat(meters: f64, at_lat: f64) -> f64 {
    meters / lat_scale(at_lat).max(1e-9)
}

/// Eastward offset in meters expressed as degrees of longitude around `at_lat`.
pub fn meters_to_lon(meters: f64, at_lat: f64) -> f64 {
    meters / lon_scale(at_lat).max(1e-9)
}

/// Point reached from `origin` after travelling `distance_m` on the sphere
/// along `bearing_deg` (clockwise from north).
pub fn destination(origin: Position, distance_m: f64, bearing_deg: f64) -> Position {
    if distance_m.abs() <= f64::EPSILON {
        return origin;
    }
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi = origin.lat.to_radians();

    let sin_phi2 = (phi.sin() * delta.cos() + phi.cos() * delta.sin() * theta.cos()).clamp(-1.0, 1.0);
    let phi2 = sin_phi2.asin();
    let dlambda = (theta.sin() * delta.sin() * phi.cos()).atan2(delta.cos() - phi.sin() * sin_phi2);
    let lon = (origin.lon + dlambda.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;

    Position::new(lon, phi2.to_degrees())
}

/// Shortest distance in meters from `point` to the polyline `line`, measured
/// in a tangent plane centred on the point. Infinite for an empty line.
pub fn point_to_line_distance_m(point: Position, line: &[Position]) -> f64 {
    let frame = LocalFrame::new(point);
    let projected: Vec<(f64, f64)> = line.iter().map(|p| frame.project(*p)).collect();
    match projected.as_slice() {
        [] => f64::INFINITY,
        [only] => point_segment_distance_2d((0.0, 0.0), *only, *only),
        _ => projected
            .windows(2)
            .map(|seg| point_segment_distance_2d((0.0, 0.0), seg[0], seg[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Arithmetic mean of the finite positions (vertex centroid).
pub fn centroid(points: &[Position]) -> Option<Position> {
    let mut count = 0usize;
    let mut lon_sum = 0.0;
    let mut lat_sum = 0.0;
    for point in points.iter().filter(|p| p.is_finite()) {
        lon_sum += point.lon;
        lat_sum += point.lat;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(Position::new(lon_sum / count as f64, lat_sum / count as f64))
}

/// Equirectangular tangent plane around an origin, in meters (x = east, y = north).
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    origin: Position,
}

impl LocalFrame {
    pub fn new(origin: Position) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn project(&self, point: Position) -> (f64, f64) {
        (
            (point.lon - self.origin.lon) * lon_scale(self.origin.lat),
            (point.lat - self.origin.lat) * lat_scale(self.origin.lat),
        )
    }

    pub fn unproject(&self, xy: (f64, f64)) -> Position {
        Position::new(
            self.origin.lon + meters_to_lon(xy.0, self.origin.lat),
            self.origin.lat + meters_to_lat(xy.1, self.origin.lat),
        )
    }
}

// ==== Planar primitives (local meters) ====

pub(crate) fn point_segment_distance_2d(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (ab_x, ab_y) = (b.0 - a.0, b.1 - a.1);
    let (ap_x, ap_y) = (p.0 - a.0, p.1 - a.1);
    let len_sq = ab_x * ab_x + ab_y * ab_y;
    // Degenerate segments collapse to their start point.
    let t = if len_sq < 1e-4 {
        0.0
    } else {
        ((ap_x * ab_x + ap_y * ab_y) / len_sq).clamp(0.0, 1.0)
    };
    (ap_x - t * ab_x).hypot(ap_y - t * ab_y)
}

pub(crate) fn segments_intersect_2d(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> bool {
    // Tolerance in meters, absorbs projection and arithmetic error.
    const EPS_M: f64 = 1e-6;

    fn orient(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
        (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
    }

    fn within(a: f64, b: f64, value: f64) -> bool {
        let min = a.min(b) - EPS_M;
        let max = a.max(b) + EPS_M;
        value >= min && value <= max
    }

    fn on_segment(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
        within(p.0, q.0, r.0) && within(p.1, q.1, r.1)
    }

    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);

    if o1.abs() <= EPS_M && on_segment(a1, a2, b1) {
        return true;
    }
    if o2.abs() <= EPS_M && on_segment(a1, a2, b2) {
        return true;
    }
    if o3.abs() <= EPS_M && on_segment(b1, b2, a1) {
        return true;
    }
    if o4.abs() <= EPS_M && on_segment(b1, b2, a2) {
        return true;
    }

    let a_crosses = (o1 > EPS_M && o2 < -EPS_M) || (o1 < -EPS_M && o2 > EPS_M);
    let b_crosses = (o3 > EPS_M && o4 < -EPS_M) || (o3 < -EPS_M && o4 > EPS_M);
    a_crosses && b_crosses
}

pub(crate) fn segment_segment_distance_2d(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> f64 {
    if segments_intersect_2d(a1, a2, b1, b2) {
        return 0.0;
    }
    point_segment_distance_2d(a1, b1, b2)
        .min(point_segment_distance_2d(a2, b1, b2))
        .min(point_segment_distance_2d(b1, a1, a2))
        .min(point_segment_distance_2d(b2, a1, a2))
}

/// Ray casting point-in-polygon test on a (closed or open) ring.
pub(crate) fn point_in_ring_2d(point: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > point.1) != (yj > point.1))
            && (point.0 < (xj - xi) * (point.1 - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Minimum distance between a polygon ring (area included) and a polyline.
pub(crate) fn ring_to_polyline_distance_2d(ring: &[(f64, f64)], line: &[(f64, f64)]) -> f64 {
    if ring.is_empty() || line.is_empty() {
        return f64::INFINITY;
    }
    if line.iter().any(|vertex| point_in_ring_2d(*vertex, ring)) {
        return 0.0;
    }

    let line_segments: Vec<((f64, f64), (f64, f64))> = if line.len() == 1 {
        vec![(line[0], line[0])]
    } else {
        line.windows(2).map(|seg| (seg[0], seg[1])).collect()
    };

    let mut best = f64::INFINITY;
    for k in 0..ring.len() {
        let edge_start = ring[k];
        let edge_end = ring[(k + 1) % ring.len()];
        for (seg_start, seg_end) in &line_segments {
            let dist = segment_segment_distance_2d(edge_start, edge_end, *seg_start, *seg_end);
            if dist < best {
                best = dist;
                if best <= 0.0 {
                    return 0.0;
                }
            }
        }
    }
    best
}
