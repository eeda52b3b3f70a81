// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Wrapper around earcutr for 2D polygons with holes, plus the plane
//! projection used to triangulate planar 3D faces. Output triangles are
//! always counter-clockwise in the 2D space they were computed in.

use crate::error::{Error, Result};
use nalgebra::{Point2, Point3, Vector3};

/// Twice the signed area; positive for counter-clockwise loops
#[inline]
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (&points[i], &points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum()
}

/// All turns in one direction
fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    let mut sign = 0.0f64;
    for i in 0..n {
        let (p0, p1, p2) = (&points[i], &points[(i + 1) % n], &points[(i + 2) % n]);
        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);
        if cross.abs() <= 1e-12 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if sign != cross.signum() {
            return false;
        }
    }
    true
}

#[inline]
fn fan(n: usize) -> Vec<usize> {
    (1..n - 1).flat_map(|i| [0, i, i + 1]).collect()
}

/// Triangulate a polygon with optional holes.
///
/// Returns indices into the concatenation `outer ++ holes[0] ++ holes[1] ...`.
/// Holes with fewer than three points are dropped before indexing, so callers
/// must pass only the holes they intend to keep.
pub fn triangulate_polygon(outer: &[Point2<f64>], holes: &[Vec<Point2<f64>>]) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Err(Error::TriangulationError(format!(
            "need at least 3 points, got {}",
            outer.len()
        )));
    }

    let mut indices = if holes.is_empty() && is_convex(outer) {
        fan(outer.len())
    } else {
        let total = outer.len() + holes.iter().map(Vec::len).sum::<usize>();
        let mut flat = Vec::with_capacity(total * 2);
        let mut hole_starts = Vec::with_capacity(holes.len());
        flat.extend(outer.iter().flat_map(|p| [p.x, p.y]));
        for hole in holes {
            hole_starts.push(flat.len() / 2);
            flat.extend(hole.iter().flat_map(|p| [p.x, p.y]));
        }
        earcutr::earcut(&flat, &hole_starts, 2).map_err(|e| Error::TriangulationError(format!("{:?}", e)))?
    };

    // Normalise every triangle to counter-clockwise
    let point = |i: usize| -> Point2<f64> {
        if i < outer.len() {
            return outer[i];
        }
        let mut rest = i - outer.len();
        for hole in holes {
            if rest < hole.len() {
                return hole[rest];
            }
            rest -= hole.len();
        }
        Point2::origin()
    };
    for tri in indices.chunks_exact_mut(3) {
        if signed_area(&[point(tri[0]), point(tri[1]), point(tri[2])]) < 0.0 {
            tri.swap(1, 2);
        }
    }

    Ok(indices)
}

/// Polygon normal by Newell's method, `None` for degenerate loops
pub fn polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let mut normal = Vector3::<f64>::zeros();
    for i in 0..n {
        let (c, next) = (&points[i], &points[(i + 1) % n]);
        normal.x += (c.y - next.y) * (c.z + next.z);
        normal.y += (c.z - next.z) * (c.x + next.x);
        normal.z += (c.x - next.x) * (c.y + next.y);
    }
    normal.try_normalize(1e-12)
}

/// Orthonormal 2D frame on a plane, with `u x v` equal to the plane normal
#[derive(Debug, Clone, Copy)]
pub struct PlaneBasis {
    pub origin: Point3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl PlaneBasis {
    pub fn new(origin: Point3<f64>, normal: &Vector3<f64>) -> Self {
        // Axis least parallel to the normal gives the stablest cross product
        let reference = if normal.x.abs() <= normal.y.abs() && normal.x.abs() <= normal.z.abs() {
            Vector3::x()
        } else if normal.y.abs() <= normal.z.abs() {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let u = reference.cross(normal).normalize();
        let v = normal.cross(&u).normalize();
        Self { origin, u, v }
    }

    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let d = p - self.origin;
        Point2::new(d.dot(&self.u), d.dot(&self.v))
    }
}

/// Drop consecutive duplicates and a repeated closing point
pub fn dedup_loop<P: Copy>(points: &[P], same: impl Fn(&P, &P) -> bool) -> Vec<P> {
    let mut out: Vec<P> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |last| !same(last, p)) {
            out.push(*p);
        }
    }
    while out.len() > 1 && same(&out[0], &out[out.len() - 1]) {
        out.pop();
    }
    out
}
