// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Perspective camera with orbit controls
//!
//! Right-handed, +Y up, OpenGL clip depth (`-1..1`). The same matrices feed
//! rendering, screen-space ray generation and frustum culling.

use bimkit_geometry::BoundingBox;
use bimkit_spatial::{Frustum, Ray};
use nalgebra::{Matrix4, Perspective3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const ORBIT_SPEED: f64 = 0.01;
const PAN_SPEED: f64 = 0.001;
const ZOOM_SPEED: f64 = 0.1;
const MIN_DISTANCE: f64 = 0.1;
/// Polar angle stays this far from the poles
const POLE_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Point3<f64>,
    pub target: Point3<f64>,
    pub up: Vector3<f64>,
    pub fov_y_degrees: f64,
    /// Width / height
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point3::new(10.0, 10.0, 10.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov_y_degrees: 45.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(position: Point3<f64>, target: Point3<f64>) -> Self {
        Self {
            position,
            target,
            ..Self::default()
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f64> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f64> {
        Perspective3::new(self.aspect, self.fov_y_degrees.to_radians(), self.near, self.far).to_homogeneous()
    }

    pub fn view_projection(&self) -> Matrix4<f64> {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn distance(&self) -> f64 {
        (self.position - self.target).norm()
    }

    /// Rotate the position around the target on a sphere
    pub fn orbit(&mut self, dx: f64, dy: f64) {
        let offset = self.position - self.target;
        let radius = offset.norm();
        if radius < f64::EPSILON {
            return;
        }
        let mut theta = offset.z.atan2(offset.x);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta -= dx * ORBIT_SPEED;
        phi = (phi - dy * ORBIT_SPEED).clamp(POLE_MARGIN, PI - POLE_MARGIN);

        self.position = self.target
            + Vector3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.cos(),
                radius * phi.sin() * theta.sin(),
            );
    }

    /// Move position and target together in the view plane
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let Some(forward) = (self.target - self.position).try_normalize(f64::EPSILON) else {
            return;
        };
        let Some(right) = forward.cross(&self.up).try_normalize(f64::EPSILON) else {
            return;
        };
        let up = right.cross(&forward);
        let scale = self.distance() * PAN_SPEED;
        let offset = (right * dx + up * dy) * scale;
        self.position += offset;
        self.target += offset;
    }

    /// Positive `delta` moves towards the target
    pub fn zoom(&mut self, delta: f64) {
        let distance = self.distance();
        self.set_distance((distance - delta * distance * ZOOM_SPEED).max(MIN_DISTANCE));
    }

    /// Keep the viewing direction, change the distance to the target
    pub fn set_distance(&mut self, distance: f64) {
        let distance = distance.max(MIN_DISTANCE);
        let direction = (self.position - self.target)
            .try_normalize(1e-6)
            .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0).normalize());
        self.position = self.target + direction * distance;
    }

    pub fn set_aspect(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    /// Look at the box centre from the (1, 1, 1) diagonal
    pub fn fit_to_bounds(&mut self, bounds: &BoundingBox) {
        let center = bounds.center();
        let extent = bounds.max_extent().max(MIN_DISTANCE);
        self.target = center;
        self.position = center + Vector3::new(1.0, 1.0, 1.0).normalize() * extent * 1.5;
    }

    /// World ray through a screen point given in `[0, 1]` coordinates,
    /// origin at the top left.
    pub fn screen_to_ray(&self, x: f64, y: f64) -> Option<Ray> {
        let ndc_x = x * 2.0 - 1.0;
        let ndc_y = 1.0 - y * 2.0;
        let inverse = self.view_projection().try_inverse()?;
        let near = inverse.transform_point(&Point3::new(ndc_x, ndc_y, -1.0));
        let far = inverse.transform_point(&Point3::new(ndc_x, ndc_y, 1.0));
        Ray::from_points(near, far)
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }
}
