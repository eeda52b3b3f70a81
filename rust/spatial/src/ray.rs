// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rays and ray intersection tests.

use bimkit_geometry::BoundingBox;
use nalgebra::{Matrix4, Point3, Vector3};

/// Hits closer than this to the origin are ignored
const MIN_DISTANCE: f64 = 1e-9;

/// A ray defined by an origin point and a direction vector.
///
/// Distances returned by the intersection tests are in units of `direction`,
/// so a ray carried into another space with [`Ray::transformed`] reports the
/// same distances as the original.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Ray with a normalised direction; `None` for a zero or non-finite direction
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Option<Self> {
        if !origin.coords.iter().all(|v| v.is_finite()) {
            return None;
        }
        let direction = direction.try_normalize(1e-12)?;
        Some(Self { origin, direction })
    }

    /// Ray from `origin` through `target`
    pub fn from_points(origin: Point3<f64>, target: Point3<f64>) -> Option<Self> {
        Self::new(origin, target - origin)
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// The same ray in another coordinate system. The direction is not
    /// renormalised.
    pub fn transformed(&self, m: &Matrix4<f64>) -> Ray {
        Ray {
            origin: m.transform_point(&self.origin),
            direction: m.transform_vector(&self.direction),
        }
    }

    /// Slab test. Returns the entry distance, clamped to zero when the origin
    /// is inside the box.
    pub fn intersect_box(&self, bounds: &BoundingBox) -> Option<f64> {
        let mut t_min = 0.0_f64;
        let mut t_max = f64::INFINITY;

        for axis in 0..3 {
            let (o, d) = (self.origin[axis], self.direction[axis]);
            let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
            if d.abs() < 1e-15 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }

    /// Möller–Trumbore ray-triangle intersection.
    /// Returns the distance to a hit in front of the origin.
    pub fn intersect_triangle(&self, v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Option<f64> {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = self.direction.cross(&edge2);
        let a = edge1.dot(&h);
        if a.abs() < 1e-12 {
            // Parallel to the triangle plane
            return None;
        }

        let f = 1.0 / a;
        let s = self.origin - v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * self.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (t > MIN_DISTANCE).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_zero_direction_rejected() {
        assert!(Ray::new(Point3::origin(), Vector3::zeros()).is_none());
        assert!(Ray::new(Point3::new(f64::NAN, 0.0, 0.0), Vector3::x()).is_none());
    }

    #[test]
    fn test_box_entry_distance() {
        let ray = Ray::new(Point3::new(-2.0, 0.5, 0.5), Vector3::x()).unwrap();
        assert_relative_eq!(ray.intersect_box(&unit_box()).unwrap(), 2.0);

        let inside = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::x()).unwrap();
        assert_eq!(inside.intersect_box(&unit_box()), Some(0.0));
    }

    #[test]
    fn test_box_behind_or_beside() {
        let behind = Ray::new(Point3::new(-2.0, 0.5, 0.5), -Vector3::x()).unwrap();
        assert!(behind.intersect_box(&unit_box()).is_none());

        // Axis-parallel ray outside the slab
        let beside = Ray::new(Point3::new(-2.0, 3.0, 0.5), Vector3::x()).unwrap();
        assert!(beside.intersect_box(&unit_box()).is_none());
    }

    #[test]
    fn test_flat_box_is_hit() {
        let flat = BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 0.0));
        let ray = Ray::new(Point3::new(0.5, 0.5, 5.0), -Vector3::z()).unwrap();
        assert_relative_eq!(ray.intersect_box(&flat).unwrap(), 5.0);
    }

    #[test]
    fn test_triangle_hit_and_miss() {
        let (a, b, c) = (Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0));
        let ray = Ray::new(Point3::new(0.2, 0.2, 3.0), -Vector3::z()).unwrap();
        assert_relative_eq!(ray.intersect_triangle(&a, &b, &c).unwrap(), 3.0);

        let miss = Ray::new(Point3::new(0.8, 0.8, 3.0), -Vector3::z()).unwrap();
        assert!(miss.intersect_triangle(&a, &b, &c).is_none());

        let away = Ray::new(Point3::new(0.2, 0.2, 3.0), Vector3::z()).unwrap();
        assert!(away.intersect_triangle(&a, &b, &c).is_none());
    }

    #[test]
    fn test_transformed_keeps_distance() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z()).unwrap();
        let local = ray.transformed(&Matrix4::new_scaling(0.5));
        let flat = BoundingBox::new(Point3::new(-1.0, -1.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(local.intersect_box(&flat).unwrap(), 10.0);
    }
}
