// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extrusion operations - converting 2D profiles to 3D meshes

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::placement::{axis2_placement_3d, read_direction, required_ref};
use crate::profile::{read_profile, Profile2D, Triangulation};
use crate::router::{GeometryProcessor, RouterOptions};
use crate::triangulation::polygon_normal;
use bimkit_core::{ParsedFile, RawInstance};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

/// Extrude a profile lying in the XY plane along `direction` by `depth`.
///
/// The solid is built along +Z and then sheared so the top cap sits at
/// `direction * depth`; the profile plane itself is never rotated.
pub fn extrude_profile(profile: &Profile2D, direction: &Vector3<f64>, depth: f64) -> Result<Mesh> {
    if !depth.is_finite() || depth <= 0.0 {
        return Err(Error::InvalidExtrusion(format!("depth must be positive, got {}", depth)));
    }
    let direction = direction
        .try_normalize(1e-12)
        .ok_or_else(|| Error::InvalidExtrusion("zero-length direction".into()))?;
    if direction.z.abs() < 1e-9 {
        return Err(Error::InvalidExtrusion("direction lies in the profile plane".into()));
    }

    let triangulation = profile.triangulate()?;
    let wall_vertices: usize = profile.loops().map(|l| l.len() * 4).sum();
    let mut mesh = Mesh::with_capacity(
        triangulation.points.len() * 2 + wall_vertices,
        triangulation.indices.len() * 2 + wall_vertices / 4 * 6,
    );

    // Bottom cap faces away from the extrusion, so its winding is reversed
    add_cap(&triangulation, 0.0, -Vector3::z(), true, &mut mesh);
    add_cap(&triangulation, depth, Vector3::z(), false, &mut mesh);
    for boundary in profile.loops() {
        add_side_walls(boundary, depth, &mut mesh);
    }

    // Shear (x, y, z) -> (x + dx*z, y + dy*z, dz*z); z = 0 stays fixed
    if (direction - Vector3::z()).norm() > 1e-12 {
        let mut shear = Matrix4::identity();
        shear[(0, 2)] = direction.x;
        shear[(1, 2)] = direction.y;
        shear[(2, 2)] = direction.z;
        mesh.transform(&shear);
    }
    Ok(mesh)
}

fn add_cap(triangulation: &Triangulation, z: f64, normal: Vector3<f64>, reverse: bool, mesh: &mut Mesh) {
    let base = mesh.vertex_count() as u32;
    for p in &triangulation.points {
        mesh.add_vertex(Point3::new(p.x, p.y, z), normal);
    }
    for tri in triangulation.indices.chunks_exact(3) {
        let (a, b, c) = (base + tri[0] as u32, base + tri[1] as u32, base + tri[2] as u32);
        if reverse {
            mesh.add_triangle(a, c, b);
        } else {
            mesh.add_triangle(a, b, c);
        }
    }
}

/// One quad per edge with its own flat normal from the quad winding.
/// Counter-clockwise loops face outwards, clockwise holes face into the hole.
fn add_side_walls(boundary: &[Point2<f64>], depth: f64, mesh: &mut Mesh) {
    let n = boundary.len();
    for i in 0..n {
        let (p0, p1) = (boundary[i], boundary[(i + 1) % n]);
        let quad = [
            Point3::new(p0.x, p0.y, 0.0),
            Point3::new(p1.x, p1.y, 0.0),
            Point3::new(p1.x, p1.y, depth),
            Point3::new(p0.x, p0.y, depth),
        ];
        let Some(normal) = polygon_normal(&quad) else {
            continue;
        };
        let base = mesh.add_vertex(quad[0], normal);
        for corner in &quad[1..] {
            mesh.add_vertex(*corner, normal);
        }
        mesh.add_triangle(base, base + 1, base + 2);
        mesh.add_triangle(base, base + 2, base + 3);
    }
}

/// `IFCEXTRUDEDAREASOLID`: 0 = SweptArea, 1 = Position, 2 = ExtrudedDirection, 3 = Depth.
/// The direction is expressed in the Position coordinate system.
pub struct ExtrudedAreaSolidProcessor;

impl GeometryProcessor for ExtrudedAreaSolidProcessor {
    fn process(&self, item: &RawInstance, file: &ParsedFile, options: &RouterOptions) -> Result<Mesh> {
        let profile = read_profile(file, required_ref(item, 0, "swept area")?, options.circle_segments)?;
        let direction = read_direction(file, required_ref(item, 2, "extrusion direction")?)?;
        let depth = item
            .get_float(3)
            .ok_or_else(|| Error::InvalidExtrusion(format!("#{} has no depth", item.id)))?;

        let mut mesh = extrude_profile(&profile, &direction, depth)?;
        if let Some(position) = item.get_ref(1) {
            mesh.transform(&axis2_placement_3d(file, position)?);
        }
        Ok(mesh)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IFCEXTRUDEDAREASOLID"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::rectangle;
    use approx::assert_relative_eq;

    fn unit_square() -> Profile2D {
        rectangle(1.0, 1.0).normalized().unwrap()
    }

    /// Signed volume by the divergence theorem; positive for outward winding
    fn volume(mesh: &Mesh) -> f64 {
        mesh.indices
            .chunks_exact(3)
            .map(|t| {
                let (a, b, c) = (mesh.point(t[0] as usize), mesh.point(t[1] as usize), mesh.point(t[2] as usize));
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }

    #[test]
    fn test_box_extrusion() {
        let mesh = extrude_profile(&unit_square(), &Vector3::z(), 2.0).unwrap();
        // 2 caps x 2 triangles + 4 walls x 2 triangles
        assert_eq!(mesh.triangle_count(), 12);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(-0.5, -0.5, 0.0));
        assert_eq!(bounds.max, Point3::new(0.5, 0.5, 2.0));
        assert_relative_eq!(volume(&mesh), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_downward_extrusion_keeps_outward_winding() {
        let mesh = extrude_profile(&unit_square(), &-Vector3::z(), 1.0).unwrap();
        let bounds = mesh.bounds().unwrap();
        assert_relative_eq!(bounds.min.z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(volume(&mesh), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_oblique_direction_shears() {
        let dir = Vector3::new(1.0, 0.0, 1.0);
        let mesh = extrude_profile(&unit_square(), &dir, 2.0_f64.sqrt()).unwrap();
        let bounds = mesh.bounds().unwrap();
        assert_relative_eq!(bounds.max.x, 1.5, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.z, 1.0, epsilon = 1e-9);
        assert_relative_eq!(volume(&mesh), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_profile_with_hole_volume() {
        let mut profile = rectangle(4.0, 4.0);
        profile.add_hole(rectangle(2.0, 2.0).outer);
        let mesh = extrude_profile(&profile.normalized().unwrap(), &Vector3::z(), 1.0).unwrap();
        assert_relative_eq!(volume(&mesh), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(extrude_profile(&unit_square(), &Vector3::z(), 0.0).is_err());
        assert!(extrude_profile(&unit_square(), &Vector3::x(), 1.0).is_err());
        assert!(extrude_profile(&unit_square(), &Vector3::zeros(), 1.0).is_err());
    }
}
