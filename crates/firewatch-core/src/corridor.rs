//! Buffered corridor around the monitored line.
//!
//! Membership and intersection are exact distance tests against the
//! centerline ("within `buffer_m` of the line"); [`Corridor::outline`] builds
//! the equivalent polygon for display.

use std::f64::consts::PI;

use crate::models::MonitoredLine;
use crate::spatial::{ring_to_polyline_distance_2d, LocalFrame, Position};

/// Tolerance for on-the-boundary checks, in meters.
const BOUNDARY_EPS_M: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct Corridor {
    centerline: Vec<Position>,
    buffer_m: f64,
}

impl Corridor {
    pub fn new(line: &MonitoredLine, buffer_m: f64) -> Self {
        let buffer_m = if buffer_m.is_finite() { buffer_m.max(0.0) } else { 0.0 };
        Self {
            centerline: line.positions.clone(),
            buffer_m,
        }
    }

    pub fn buffer_m(&self) -> f64 {
        self.buffer_m
    }

    pub fn centerline(&self) -> &[Position] {
        &self.centerline
    }

    /// Point-in-corridor test.
    pub fn contains(&self, point: Position) -> bool {
        crate::spatial::point_to_line_distance_m(point, &self.centerline)
            <= self.buffer_m + BOUNDARY_EPS_M
    }

    /// True when the polygon `ring` touches or overlaps the corridor.
    /// Degenerate rings (fewer than three distinct vertices) fall back to a
    /// point test on their first vertex.
    pub fn intersects_ring(&self, ring: &[Position]) -> bool {
        let Some(first) = ring.first().copied() else {
            return false;
        };
        if distinct_vertices(ring) < 3 {
            return self.contains(first);
        }

        let frame = LocalFrame::new(first);
        let ring_xy: Vec<(f64, f64)> = ring.iter().map(|p| frame.project(*p)).collect();
        let line_xy: Vec<(f64, f64)> = self.centerline.iter().map(|p| frame.project(*p)).collect();
        ring_to_polyline_distance_2d(&ring_xy, &line_xy) <= self.buffer_m + BOUNDARY_EPS_M
    }

    /// Closed outline polygon: offset sides joined by round caps.
    pub fn outline(&self, cap_steps: usize) -> Vec<Position> {
        let Some(origin) = self.centerline.first().copied() else {
            return Vec::new();
        };
        let frame = LocalFrame::new(origin);
        let mut line: Vec<(f64, f64)> = self.centerline.iter().map(|p| frame.project(*p)).collect();
        line.dedup_by(|a, b| (a.0 - b.0).hypot(a.1 - b.1) < 1e-3);

        let steps = cap_steps.max(2);
        let r = self.buffer_m;
        let mut ring: Vec<(f64, f64)> = Vec::new();

        if line.len() < 2 {
            let center = line[0];
            for k in 0..(2 * steps) {
                let angle = 2.0 * PI * k as f64 / (2 * steps) as f64;
                ring.push((center.0 + r * angle.cos(), center.1 + r * angle.sin()));
            }
        } else {
            let normals: Vec<(f64, f64)> = line.windows(2).map(|seg| left_normal(seg[0], seg[1])).collect();

            // Left side, forward.
            for (i, vertex) in line.iter().enumerate() {
                let n = vertex_normal(&normals, i);
                ring.push((vertex.0 + n.0 * r, vertex.1 + n.1 * r));
            }
            // End cap from left to right.
            push_cap(&mut ring, line[line.len() - 1], normals[normals.len() - 1], r, steps);
            // Right side, backward.
            for (i, vertex) in line.iter().enumerate().rev() {
                let n = vertex_normal(&normals, i);
                ring.push((vertex.0 - n.0 * r, vertex.1 - n.1 * r));
            }
            // Start cap from right to left.
            let start_normal = normals[0];
            push_cap(&mut ring, line[0], (-start_normal.0, -start_normal.1), r, steps);
        }

        let mut outline: Vec<Position> = ring.into_iter().map(|xy| frame.unproject(xy)).collect();
        if let Some(first) = outline.first().copied() {
            outline.push(first);
        }
        outline
    }
}

fn distinct_vertices(ring: &[Position]) -> usize {
    let mut distinct: Vec<Position> = Vec::with_capacity(ring.len());
    for p in ring {
        if !distinct.iter().any(|d| d == p) {
            distinct.push(*p);
        }
    }
    distinct.len()
}

fn left_normal(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len = dx.hypot(dy).max(1e-12);
    (-dy / len, dx / len)
}

/// Mitered normal at vertex `i`, clamped to twice the buffer at sharp turns.
fn vertex_normal(normals: &[(f64, f64)], i: usize) -> (f64, f64) {
    if i == 0 {
        return normals[0];
    }
    if i >= normals.len() {
        return normals[normals.len() - 1];
    }
    let (n1, n2) = (normals[i - 1], normals[i]);
    let sum = (n1.0 + n2.0, n1.1 + n2.1);
    let len = sum.0.hypot(sum.1);
    if len < 1e-9 {
        return n1;
    }
    let bisector = (sum.0 / len, sum.1 / len);
    let cos_half = (bisector.0 * n1.0 + bisector.1 * n1.1).max(0.5);
    (bisector.0 / cos_half, bisector.1 / cos_half)
}

/// Half circle around `center`, starting at `center + normal·r` and sweeping
/// clockwise through the segment direction.
fn push_cap(ring: &mut Vec<(f64, f64)>, center: (f64, f64), normal: (f64, f64), r: f64, steps: usize) {
    let start = normal.1.atan2(normal.0);
    for k in 1..steps {
        let angle = start - PI * k as f64 / steps as f64;
        ring.push((center.0 + r * angle.cos(), center.1 + r * angle.sin()));
    }
}
