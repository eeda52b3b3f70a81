// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pre-tessellated geometry: `IFCTRIANGULATEDFACESET`.

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::placement::{fetch, list_point, required_ref};
use crate::router::{GeometryProcessor, RouterOptions};
use bimkit_core::{AttributeValue, ParsedFile, RawInstance};
use nalgebra::{Point3, Vector3};

/// Explicit triangle meshes.
///
/// Attributes: 0 = Coordinates (`IFCCARTESIANPOINTLIST3D`), 3 = CoordIndex
/// (1-based triples), 4 = PnIndex (optional remapping of CoordIndex).
/// Supplied normals are ignored; every triangle gets its own flat normal.
pub struct TriangulatedFaceSetProcessor;

fn index_list(value: &AttributeValue) -> Option<Vec<i64>> {
    value.as_list()?.iter().map(|v| v.as_int()).collect()
}

impl GeometryProcessor for TriangulatedFaceSetProcessor {
    fn process(&self, item: &RawInstance, file: &ParsedFile, _options: &RouterOptions) -> Result<Mesh> {
        let list = fetch(file, required_ref(item, 0, "coordinates")?, "IFCCARTESIANPOINTLIST3D")?;
        let points: Vec<Point3<f64>> = list
            .get_list(0)
            .unwrap_or_default()
            .iter()
            .map(|c| list_point(c, list.id))
            .collect::<Result<_>>()?;

        let remap = item.get(4).and_then(index_list);
        let point_at = |index: i64| -> Result<Point3<f64>> {
            let index = match &remap {
                Some(pn) => usize::try_from(index - 1).ok().and_then(|i| pn.get(i).copied()),
                None => Some(index),
            };
            index
                .and_then(|i| usize::try_from(i - 1).ok())
                .and_then(|i| points.get(i).copied())
                .ok_or_else(|| Error::geometry(format!("#{} has an out of range coordinate index", item.id)))
        };

        let triangles = item
            .get_list(3)
            .ok_or_else(|| Error::geometry(format!("#{} has no CoordIndex", item.id)))?;
        let mut mesh = Mesh::with_capacity(triangles.len() * 3, triangles.len() * 3);

        for triangle in triangles {
            let idx = index_list(triangle)
                .filter(|t| t.len() == 3)
                .ok_or_else(|| Error::geometry(format!("#{} has a malformed triangle", item.id)))?;
            let corners = [point_at(idx[0])?, point_at(idx[1])?, point_at(idx[2])?];
            let Some(normal) = (corners[1] - corners[0])
                .cross(&(corners[2] - corners[0]))
                .try_normalize(1e-12)
            else {
                // Zero-area triangle
                continue;
            };
            let base = add_flat(&mut mesh, &corners, normal);
            mesh.add_triangle(base, base + 1, base + 2);
        }
        Ok(mesh)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IFCTRIANGULATEDFACESET"]
    }
}

fn add_flat(mesh: &mut Mesh, corners: &[Point3<f64>; 3], normal: Vector3<f64>) -> u32 {
    let base = mesh.add_vertex(corners[0], normal);
    mesh.add_vertex(corners[1], normal);
    mesh.add_vertex(corners[2], normal);
    base
}
