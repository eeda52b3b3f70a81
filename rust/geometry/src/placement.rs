// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement and transformation: points, directions, axis placements,
//! transformation operators and the local placement chain.

use crate::error::{Error, Result};
use bimkit_core::{AttributeValue, EntityId, ParsedFile, RawInstance};
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Local placement chains deeper than this are treated as malformed
pub const MAX_PLACEMENT_DEPTH: usize = 100;

/// Look up an instance and check its type
pub(crate) fn fetch<'a>(file: &'a ParsedFile, id: EntityId, expected: &'static str) -> Result<&'a RawInstance> {
    let instance = file.get(id).ok_or(Error::MissingEntity(id))?;
    if !instance.is_type(expected) {
        return Err(Error::UnexpectedType {
            id,
            expected,
            found: instance.type_name.clone(),
        });
    }
    Ok(instance)
}

/// Required reference attribute
pub(crate) fn required_ref(instance: &RawInstance, index: usize, what: &str) -> Result<EntityId> {
    instance
        .get_ref(index)
        .ok_or_else(|| Error::geometry(format!("#{} has no {}", instance.id, what)))
}

fn coordinates(values: &[AttributeValue], owner: EntityId) -> Result<SmallVec<[f64; 3]>> {
    let coords: SmallVec<[f64; 3]> = values.iter().map(|v| v.as_float()).collect::<Option<_>>().ok_or_else(|| {
        Error::geometry(format!("#{} has non-numeric coordinates", owner))
    })?;
    if coords.len() < 2 || coords.iter().any(|c| !c.is_finite()) {
        return Err(Error::geometry(format!("#{} has malformed coordinates", owner)));
    }
    Ok(coords)
}

/// `IFCCARTESIANPOINT`; 2D points get `z = 0`
pub fn read_point3(file: &ParsedFile, id: EntityId) -> Result<Point3<f64>> {
    let point = fetch(file, id, "IFCCARTESIANPOINT")?;
    let list = point
        .get_list(0)
        .ok_or_else(|| Error::geometry(format!("#{} has no coordinates", id)))?;
    let c = coordinates(list, id)?;
    Ok(Point3::new(c[0], c[1], c.get(2).copied().unwrap_or(0.0)))
}

pub fn read_point2(file: &ParsedFile, id: EntityId) -> Result<Point2<f64>> {
    let p = read_point3(file, id)?;
    Ok(Point2::new(p.x, p.y))
}

/// Coordinate tuple inside a point list (`IFCCARTESIANPOINTLIST2D/3D`)
pub(crate) fn list_point(value: &AttributeValue, owner: EntityId) -> Result<Point3<f64>> {
    let list = value
        .as_list()
        .ok_or_else(|| Error::geometry(format!("#{} has a malformed point list", owner)))?;
    let c = coordinates(list, owner)?;
    Ok(Point3::new(c[0], c[1], c.get(2).copied().unwrap_or(0.0)))
}

/// `IFCDIRECTION`, normalised. Zero-length directions are malformed.
pub fn read_direction(file: &ParsedFile, id: EntityId) -> Result<Vector3<f64>> {
    let direction = fetch(file, id, "IFCDIRECTION")?;
    let list = direction
        .get_list(0)
        .ok_or_else(|| Error::geometry(format!("#{} has no direction ratios", id)))?;
    let c = coordinates(list, id)?;
    Vector3::new(c[0], c[1], c.get(2).copied().unwrap_or(0.0))
        .try_normalize(1e-12)
        .ok_or_else(|| Error::geometry(format!("#{} is a zero-length direction", id)))
}

fn optional_direction(file: &ParsedFile, instance: &RawInstance, index: usize) -> Result<Option<Vector3<f64>>> {
    instance.get_ref(index).map(|id| read_direction(file, id)).transpose()
}

/// Right-handed frame from a primary axis and a reference direction.
/// The reference is projected off the axis (Gram-Schmidt); when parallel a
/// perpendicular fallback is chosen.
fn frame(z: Vector3<f64>, reference: Vector3<f64>) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let projected = reference - z * reference.dot(&z);
    let x = projected.try_normalize(1e-9).unwrap_or_else(|| {
        let fallback = if z.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        (fallback - z * fallback.dot(&z)).normalize()
    });
    let y = z.cross(&x);
    (x, y, z)
}

#[rustfmt::skip]
fn matrix_from_frame(x: Vector3<f64>, y: Vector3<f64>, z: Vector3<f64>, origin: Point3<f64>) -> Matrix4<f64> {
    Matrix4::new(
        x.x, y.x, z.x, origin.x,
        x.y, y.y, z.y, origin.y,
        x.z, y.z, z.z, origin.z,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// `IFCAXIS2PLACEMENT3D` (0 = Location, 1 = Axis, 2 = RefDirection)
pub fn axis2_placement_3d(file: &ParsedFile, id: EntityId) -> Result<Matrix4<f64>> {
    let placement = fetch(file, id, "IFCAXIS2PLACEMENT3D")?;
    let location = read_point3(file, required_ref(placement, 0, "location")?)?;
    let z = optional_direction(file, placement, 1)?.unwrap_or_else(Vector3::z);
    let reference = optional_direction(file, placement, 2)?.unwrap_or_else(Vector3::x);
    let (x, y, z) = frame(z, reference);
    Ok(matrix_from_frame(x, y, z, location))
}

/// `IFCAXIS2PLACEMENT2D` (0 = Location, 1 = RefDirection) as a 2D affine matrix
pub fn axis2_placement_2d(file: &ParsedFile, id: EntityId) -> Result<Matrix3<f64>> {
    let placement = fetch(file, id, "IFCAXIS2PLACEMENT2D")?;
    let location = read_point2(file, required_ref(placement, 0, "location")?)?;
    let x = match optional_direction(file, placement, 1)? {
        Some(d) => Vector3::new(d.x, d.y, 0.0)
            .try_normalize(1e-12)
            .ok_or_else(|| Error::geometry(format!("#{} has a vertical 2D direction", id)))?,
        None => Vector3::x(),
    };
    #[rustfmt::skip]
    let matrix = Matrix3::new(
        x.x, -x.y, location.x,
        x.y,  x.x, location.y,
        0.0,  0.0, 1.0,
    );
    Ok(matrix)
}

/// Either axis placement kind as a 3D transform
pub fn axis2_placement(file: &ParsedFile, id: EntityId) -> Result<Matrix4<f64>> {
    let instance = file.get(id).ok_or(Error::MissingEntity(id))?;
    if instance.is_type("IFCAXIS2PLACEMENT2D") {
        let m = axis2_placement_2d(file, id)?;
        #[rustfmt::skip]
        let lifted = Matrix4::new(
            m[(0, 0)], m[(0, 1)], 0.0, m[(0, 2)],
            m[(1, 0)], m[(1, 1)], 0.0, m[(1, 2)],
            0.0,       0.0,       1.0, 0.0,
            0.0,       0.0,       0.0, 1.0,
        );
        return Ok(lifted);
    }
    axis2_placement_3d(file, id)
}

/// `IFCCARTESIANTRANSFORMATIONOPERATOR3D` and its non-uniform and 2D variants.
///
/// Attributes: 0 = Axis1, 1 = Axis2, 2 = LocalOrigin, 3 = Scale, then for 3D
/// 4 = Axis3 and for non-uniform 5 = Scale2, 6 = Scale3.
pub fn transformation_operator(file: &ParsedFile, id: EntityId) -> Result<Matrix4<f64>> {
    let op = file.get(id).ok_or(Error::MissingEntity(id))?;
    if !op.type_name.starts_with("IFCCARTESIANTRANSFORMATIONOPERATOR") {
        return Err(Error::UnexpectedType {
            id,
            expected: "IFCCARTESIANTRANSFORMATIONOPERATOR",
            found: op.type_name.clone(),
        });
    }
    let is_3d = op.type_name.contains("3D");

    let origin = read_point3(file, required_ref(op, 2, "local origin")?)?;
    let scale = op.get_float(3).unwrap_or(1.0);
    let (scale2, scale3) = if op.type_name.ends_with("NONUNIFORM") {
        let scale2 = op.get_float(5).unwrap_or(scale);
        let scale3 = if is_3d { op.get_float(6).unwrap_or(scale) } else { 1.0 };
        (scale2, scale3)
    } else {
        (scale, if is_3d { scale } else { 1.0 })
    };
    if ![scale, scale2, scale3].iter().all(|s| s.is_finite() && *s != 0.0) {
        return Err(Error::geometry(format!("#{} has an invalid scale", id)));
    }

    let axis1 = optional_direction(file, op, 0)?.unwrap_or_else(Vector3::x);
    let axis3 = if is_3d {
        optional_direction(file, op, 4)?.unwrap_or_else(Vector3::z)
    } else {
        Vector3::z()
    };
    let (x, y, z) = frame(axis3, axis1);
    Ok(matrix_from_frame(x * scale, y * scale2, z * scale3, origin))
}

/// Resolves `IFCLOCALPLACEMENT` chains to world transforms, caching every
/// placement on the way so siblings sharing a parent compose it once.
pub struct PlacementResolver<'a> {
    file: &'a ParsedFile,
    cache: FxHashMap<EntityId, Matrix4<f64>>,
}

impl<'a> PlacementResolver<'a> {
    pub fn new(file: &'a ParsedFile) -> Self {
        Self {
            file,
            cache: FxHashMap::default(),
        }
    }

    /// World transform of a local placement: `parent_world * local`.
    ///
    /// The chain is walked iteratively up `PlacementRelTo` (attribute 0);
    /// a revisited placement or a chain longer than [`MAX_PLACEMENT_DEPTH`]
    /// is an error.
    pub fn resolve(&mut self, placement: EntityId) -> Result<Matrix4<f64>> {
        if let Some(m) = self.cache.get(&placement) {
            return Ok(*m);
        }

        // Collect the uncached part of the chain, child first
        let mut chain: SmallVec<[EntityId; 16]> = SmallVec::new();
        let mut base = Matrix4::identity();
        let mut current = Some(placement);
        while let Some(id) = current {
            if let Some(m) = self.cache.get(&id) {
                base = *m;
                break;
            }
            if chain.contains(&id) || chain.len() >= MAX_PLACEMENT_DEPTH {
                return Err(Error::PlacementCycle(id));
            }
            chain.push(id);
            current = self.file.get(id).and_then(|p| p.get_ref(0));
        }

        // Compose from the top down
        for &id in chain.iter().rev() {
            base *= self.local(id)?;
            self.cache.insert(id, base);
        }
        Ok(base)
    }

    fn local(&self, id: EntityId) -> Result<Matrix4<f64>> {
        let placement = self.file.get(id).ok_or(Error::MissingEntity(id))?;
        if !placement.is_type("IFCLOCALPLACEMENT") {
            // Grid and linear placements are not modelled
            tracing::trace!(placement = id, kind = %placement.type_name, "unsupported placement kind");
            return Ok(Matrix4::identity());
        }
        match placement.get_ref(1) {
            Some(relative) => axis2_placement(self.file, relative),
            None => Ok(Matrix4::identity()),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
