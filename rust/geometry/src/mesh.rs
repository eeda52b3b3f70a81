// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures
//!
//! [`Mesh`] is the per-element working mesh, kept in f64 while placements are
//! applied. [`ModelMesh`] is the shared per-model output in f32 with one
//! [`ElementSlice`] per element.

use crate::bounds::BoundingBox;
use bimkit_core::EntityId;
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::FxHashMap;

/// Triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f64>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f64>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex with normal, returning its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions.extend_from_slice(&[position.x, position.y, position.z]);
        self.normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
        index
    }

    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// Merge another mesh into this one
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        let vertex_offset = self.vertex_count() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn point(&self, index: usize) -> Point3<f64> {
        let i = index * 3;
        Point3::new(self.positions[i], self.positions[i + 1], self.positions[i + 2])
    }

    /// All coordinates are finite and every index is in range
    pub fn is_valid(&self) -> bool {
        let vertices = self.vertex_count() as u32;
        self.positions.iter().all(|v| v.is_finite())
            && self.normals.iter().all(|v| v.is_finite())
            && self.indices.iter().all(|&i| i < vertices)
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.positions.chunks_exact(3).map(|c| Point3::new(c[0], c[1], c[2])))
    }

    /// Apply a transform to positions and normals in place
    pub fn transform(&mut self, m: &Matrix4<f64>) {
        self.positions.chunks_exact_mut(3).for_each(|chunk| {
            let p = m.transform_point(&Point3::new(chunk[0], chunk[1], chunk[2]));
            chunk.copy_from_slice(&[p.x, p.y, p.z]);
        });

        // Normals use the inverse transpose so non-uniform scale keeps them perpendicular
        let normal_matrix = m.try_inverse().unwrap_or(*m).transpose();
        self.normals.chunks_exact_mut(3).for_each(|chunk| {
            let n = normal_matrix.transform_vector(&Vector3::new(chunk[0], chunk[1], chunk[2]));
            let n = n.try_normalize(1e-12).unwrap_or(n);
            chunk.copy_from_slice(&[n.x, n.y, n.z]);
        });

        // A mirroring transform flips winding
        if m.fixed_view::<3, 3>(0, 0).determinant() < 0.0 {
            self.indices.chunks_exact_mut(3).for_each(|tri| tri.swap(1, 2));
        }
    }
}

/// One element's part of a [`ModelMesh`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementSlice {
    pub element_id: EntityId,
    /// First triangle, in triangles (index offset / 3)
    pub triangle_start: u32,
    pub triangle_count: u32,
    pub bounds: BoundingBox,
}

impl ElementSlice {
    pub fn has_geometry(&self) -> bool {
        self.triangle_count > 0
    }

    /// Index range in [`ModelMesh::indices`]
    pub fn index_range(&self) -> std::ops::Range<usize> {
        let start = self.triangle_start as usize * 3;
        start..start + self.triangle_count as usize * 3
    }
}

/// Shared vertex and index buffers for one model.
///
/// `slices` are in element order and their triangle counts sum to
/// `indices.len() / 3`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
    pub slices: Vec<ElementSlice>,
    #[cfg_attr(feature = "serde", serde(skip))]
    lookup: FxHashMap<EntityId, usize>,
}

impl ModelMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element. An empty or absent mesh still records a slice.
    pub fn push_element(&mut self, element_id: EntityId, mesh: Option<&Mesh>, bounds: BoundingBox) {
        let triangle_start = (self.indices.len() / 3) as u32;
        let mut triangle_count = 0;

        if let Some(mesh) = mesh.filter(|m| !m.is_empty()) {
            let vertex_offset = (self.positions.len() / 3) as u32;
            self.positions.extend(mesh.positions.iter().map(|&v| v as f32));
            self.normals.extend(mesh.normals.iter().map(|&v| v as f32));
            self.indices.extend(mesh.indices.iter().map(|&i| i + vertex_offset));
            triangle_count = mesh.triangle_count() as u32;
        }

        self.lookup.insert(element_id, self.slices.len());
        self.slices.push(ElementSlice {
            element_id,
            triangle_start,
            triangle_count,
            bounds,
        });
    }

    pub fn slice(&self, element_id: EntityId) -> Option<&ElementSlice> {
        self.lookup.get(&element_id).map(|&i| &self.slices[i])
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    fn vertex(&self, index: u32) -> Point3<f64> {
        let i = index as usize * 3;
        Point3::new(
            self.positions[i] as f64,
            self.positions[i + 1] as f64,
            self.positions[i + 2] as f64,
        )
    }

    /// Triangles of one slice as corner points
    pub fn triangles<'a>(&'a self, slice: &ElementSlice) -> impl Iterator<Item = [Point3<f64>; 3]> + 'a {
        self.indices[slice.index_range()]
            .chunks_exact(3)
            .map(move |t| [self.vertex(t[0]), self.vertex(t[1]), self.vertex(t[2])])
    }

    /// Union of the bounds of slices with geometry, or of every slice when
    /// none has any
    pub fn bounds(&self) -> Option<BoundingBox> {
        let union = |iter: &mut dyn Iterator<Item = BoundingBox>| {
            let first = iter.next()?;
            Some(iter.fold(first, |acc, b| acc.union(&b)))
        };
        union(&mut self.slices.iter().filter(|s| s.has_geometry()).map(|s| s.bounds))
            .or_else(|| union(&mut self.slices.iter().map(|s| s.bounds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new();
        let n = Vector3::z();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0), n);
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0), n);
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0), n);
        mesh.add_triangle(a, b, c);
        mesh
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut mesh = triangle();
        mesh.merge(&triangle());
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(&mesh.indices[3..], &[3, 4, 5]);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_mirror_transform_flips_winding() {
        let mut mesh = triangle();
        mesh.transform(&Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0)));
        assert_eq!(mesh.indices, vec![0, 2, 1]);
        assert_eq!(mesh.point(1), Point3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_model_mesh_slices() {
        let mut model = ModelMesh::new();
        let t = triangle();
        model.push_element(1, Some(&t), t.bounds().unwrap());
        model.push_element(2, None, BoundingBox::from_point(Point3::origin()));
        model.push_element(3, Some(&t), t.bounds().unwrap());

        let total: u32 = model.slices.iter().map(|s| s.triangle_count).sum();
        assert_eq!(total as usize, model.indices.len() / 3);
        assert!(!model.slice(2).unwrap().has_geometry());

        let third = model.slice(3).unwrap();
        assert_eq!(third.triangle_start, 1);
        let tris: Vec<_> = model.triangles(third).collect();
        assert_eq!(tris.len(), 1);
        assert_eq!(tris[0][1], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_model_bounds_ignore_placeholders() {
        let mut model = ModelMesh::new();
        model.push_element(1, None, BoundingBox::from_point(Point3::new(100.0, 0.0, 0.0)));
        assert_eq!(model.bounds().unwrap().max.x, 100.0);

        let t = triangle();
        model.push_element(2, Some(&t), t.bounds().unwrap());
        assert_eq!(model.bounds().unwrap().max.x, 1.0);
    }
}
