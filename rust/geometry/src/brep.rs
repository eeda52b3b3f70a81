// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BRep/surface model processors.
//!
//! Handles IfcFacetedBrep, IfcFaceBasedSurfaceModel and IfcShellBasedSurfaceModel.
//! All three reduce to lists of planar faces bounded by polygon loops. Face
//! loops are read sequentially, then triangulated (in parallel for large shells).

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::placement::{read_point3, required_ref};
use crate::router::{GeometryProcessor, RouterOptions};
use crate::triangulation::{dedup_loop, polygon_normal, triangulate_polygon, PlaneBasis};
use bimkit_core::{EntityId, ParsedFile, RawInstance};
use nalgebra::{Point2, Point3};
use rayon::prelude::*;

/// Shells with at least this many faces are triangulated on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

const POINT_TOLERANCE: f64 = 1e-9;

/// Boundary loops of one face, already oriented
#[derive(Debug, Clone)]
pub struct FaceLoops {
    pub outer: Vec<Point3<f64>>,
    pub holes: Vec<Vec<Point3<f64>>>,
}

/// Read an `IFCFACE` (0 = Bounds). Returns `Ok(None)` when the outer loop is
/// degenerate or not a polygon loop, so only that face is skipped.
pub fn read_face(file: &ParsedFile, face_id: EntityId) -> Result<Option<FaceLoops>> {
    let face = file.get(face_id).ok_or(Error::MissingEntity(face_id))?;

    let mut outer = None;
    let mut holes = Vec::new();
    for bound_id in face.get_ref_list(0) {
        let bound = file.get(bound_id).ok_or(Error::MissingEntity(bound_id))?;
        let is_outer = bound.is_type("IFCFACEOUTERBOUND") && outer.is_none();
        match read_bound(file, bound)? {
            Some(points) if is_outer => outer = Some(points),
            Some(points) => holes.push(points),
            // A degenerate outer boundary leaves nothing to fill
            None if is_outer => return Ok(None),
            None => {}
        }
    }

    // Without an explicit outer bound the first loop is the boundary
    let outer = match outer {
        Some(outer) => outer,
        None if !holes.is_empty() => holes.remove(0),
        None => return Ok(None),
    };
    Ok(Some(FaceLoops { outer, holes }))
}

/// `IFCFACEBOUND`/`IFCFACEOUTERBOUND`: 0 = Bound (`IFCPOLYLOOP`), 1 = Orientation.
/// `.F.` reverses the loop. Fewer than three distinct points yields `None`.
fn read_bound(file: &ParsedFile, bound: &RawInstance) -> Result<Option<Vec<Point3<f64>>>> {
    let loop_id = required_ref(bound, 0, "bound loop")?;
    let poly_loop = file.get(loop_id).ok_or(Error::MissingEntity(loop_id))?;
    if !poly_loop.is_type("IFCPOLYLOOP") {
        tracing::trace!(face_bound = bound.id, kind = %poly_loop.type_name, "skipping non-polygon loop");
        return Ok(None);
    }

    let points: Vec<Point3<f64>> = poly_loop
        .get_ref_list(0)
        .into_iter()
        .map(|id| read_point3(file, id))
        .collect::<Result<_>>()?;
    let mut points = dedup_loop(&points, |a, b| (a - b).norm() <= POINT_TOLERANCE);
    if points.len() < 3 {
        return Ok(None);
    }
    if bound.get(1).and_then(|v| v.as_logical()) == Some(Some(false)) {
        points.reverse();
    }
    Ok(Some(points))
}

/// Triangulate one planar face with a flat normal. Degenerate faces give `None`.
pub fn triangulate_face(face: &FaceLoops) -> Option<Mesh> {
    let normal = polygon_normal(&face.outer)?;
    let basis = PlaneBasis::new(face.outer[0], &normal);
    let outer: Vec<Point2<f64>> = face.outer.iter().map(|p| basis.project(p)).collect();
    let holes: Vec<Vec<Point2<f64>>> = face
        .holes
        .iter()
        .map(|h| h.iter().map(|p| basis.project(p)).collect())
        .collect();

    let indices = match triangulate_polygon(&outer, &holes) {
        Ok(indices) => indices,
        Err(e) => {
            tracing::trace!(error = %e, "face triangulation failed");
            return None;
        }
    };

    let mut mesh = Mesh::with_capacity(outer.len(), indices.len());
    for p in face.outer.iter().chain(face.holes.iter().flatten()) {
        mesh.add_vertex(*p, normal);
    }
    for tri in indices.chunks_exact(3) {
        mesh.add_triangle(tri[0] as u32, tri[1] as u32, tri[2] as u32);
    }
    Some(mesh)
}

/// Read and triangulate a list of faces into one mesh
fn faces_mesh(file: &ParsedFile, face_ids: &[EntityId], options: &RouterOptions, threshold: usize) -> Result<Mesh> {
    let faces: Vec<FaceLoops> = face_ids
        .iter()
        .filter_map(|&id| read_face(file, id).transpose())
        .collect::<Result<_>>()?;

    let meshes: Vec<Option<Mesh>> = if options.parallel && faces.len() >= threshold {
        faces.par_iter().map(triangulate_face).collect()
    } else {
        faces.iter().map(triangulate_face).collect()
    };

    let mut mesh = Mesh::new();
    for face_mesh in meshes.iter().flatten() {
        mesh.merge(face_mesh);
    }
    Ok(mesh)
}

/// Faces of an `IFCCLOSEDSHELL`/`IFCOPENSHELL`/`IFCCONNECTEDFACESET` (0 = faces)
fn shell_faces(file: &ParsedFile, shell_id: EntityId) -> Result<Vec<EntityId>> {
    let shell = file.get(shell_id).ok_or(Error::MissingEntity(shell_id))?;
    Ok(shell.get_ref_list(0))
}

/// `IFCFACETEDBREP` (0 = Outer closed shell) and `IFCFACETEDBREPWITHVOIDS`
/// (1 = inner void shells)
pub struct FacetedBrepProcessor {
    pub parallel_threshold: usize,
}

impl Default for FacetedBrepProcessor {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl GeometryProcessor for FacetedBrepProcessor {
    fn process(&self, item: &RawInstance, file: &ParsedFile, options: &RouterOptions) -> Result<Mesh> {
        let mut faces = shell_faces(file, required_ref(item, 0, "outer shell")?)?;
        if item.is_type("IFCFACETEDBREPWITHVOIDS") {
            for void in item.get_ref_list(1) {
                faces.extend(shell_faces(file, void)?);
            }
        }
        faces_mesh(file, &faces, options, self.parallel_threshold)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IFCFACETEDBREP", "IFCFACETEDBREPWITHVOIDS"]
    }
}

/// `IFCFACEBASEDSURFACEMODEL`: 0 = list of `IFCCONNECTEDFACESET`
pub struct FaceBasedSurfaceModelProcessor {
    pub parallel_threshold: usize,
}

impl Default for FaceBasedSurfaceModelProcessor {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl GeometryProcessor for FaceBasedSurfaceModelProcessor {
    fn process(&self, item: &RawInstance, file: &ParsedFile, options: &RouterOptions) -> Result<Mesh> {
        let mut faces = Vec::new();
        for set in item.get_ref_list(0) {
            faces.extend(shell_faces(file, set)?);
        }
        faces_mesh(file, &faces, options, self.parallel_threshold)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IFCFACEBASEDSURFACEMODEL"]
    }
}

/// `IFCSHELLBASEDSURFACEMODEL`: 0 = list of open or closed shells
pub struct ShellBasedSurfaceModelProcessor {
    pub parallel_threshold: usize,
}

impl Default for ShellBasedSurfaceModelProcessor {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl GeometryProcessor for ShellBasedSurfaceModelProcessor {
    fn process(&self, item: &RawInstance, file: &ParsedFile, options: &RouterOptions) -> Result<Mesh> {
        let mut faces = Vec::new();
        for shell in item.get_ref_list(0) {
            faces.extend(shell_faces(file, shell)?);
        }
        faces_mesh(file, &faces, options, self.parallel_threshold)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IFCSHELLBASEDSURFACEMODEL"]
    }
}
