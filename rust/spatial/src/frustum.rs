// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! View frustum culling

use bimkit_geometry::BoundingBox;
use nalgebra::{Matrix4, Point3, Vector3, Vector4};

/// Plane `normal · p + d = 0`; the positive side is inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub d: f64,
}

impl Plane {
    fn from_coefficients(c: Vector4<f64>) -> Self {
        let normal = Vector3::new(c.x, c.y, c.z);
        let length = normal.norm();
        if length < 1e-15 {
            return Self { normal, d: c.w };
        }
        Self {
            normal: normal / length,
            d: c.w / length,
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) + self.d
    }
}

/// Six clip planes: left, right, bottom, top, near, far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes of an OpenGL-style (`-1..1` depth) view-projection
    /// matrix (Gribb/Hartmann).
    pub fn from_view_projection(m: &Matrix4<f64>) -> Self {
        let row = |i: usize| m.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// The same frustum expressed in the space that `m` maps into world space
    pub fn transformed(&self, m: &Matrix4<f64>) -> Self {
        let mt = m.transpose();
        Self {
            planes: self.planes.map(|plane| {
                let c = Vector4::new(plane.normal.x, plane.normal.y, plane.normal.z, plane.d);
                Plane::from_coefficients(mt * c)
            }),
        }
    }

    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }

    /// Conservative box test: false only when the box is fully outside one plane
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        self.planes.iter().all(|plane| {
            // Corner furthest along the plane normal
            let n = plane.normal;
            let p = Point3::new(
                if n.x >= 0.0 { bounds.max.x } else { bounds.min.x },
                if n.y >= 0.0 { bounds.max.y } else { bounds.min.y },
                if n.z >= 0.0 { bounds.max.z } else { bounds.min.z },
            );
            plane.signed_distance(&p) >= 0.0
        })
    }
}
