// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exact element picking across one or more models

use crate::ray::Ray;
use crate::rtree::{Hit, LeafKey, SpatialIndex};
use bimkit_core::EntityId;
use bimkit_geometry::ModelMesh;
use nalgebra::Matrix4;

/// Closest triangle hit within one element's slice
pub fn slice_distance(ray: &Ray, mesh: &ModelMesh, element_id: EntityId) -> Option<f64> {
    let slice = mesh.slice(element_id)?;
    mesh.triangles(slice)
        .filter_map(|[a, b, c]| ray.intersect_triangle(&a, &b, &c))
        .min_by(f64::total_cmp)
}

/// One model as seen by the picker
#[derive(Clone, Copy)]
pub struct PickTarget<'a> {
    pub index: &'a SpatialIndex,
    pub mesh: &'a ModelMesh,
    /// Model to world
    pub transform: &'a Matrix4<f64>,
}

/// Closest hit over several models, compared by world distance.
///
/// The world ray is carried into each model's space without renormalising,
/// so local distances are world distances. Targets whose transform cannot
/// be inverted are skipped, as are elements `accept` rejects.
pub fn pick_nearest<'a>(
    ray: &Ray,
    targets: impl IntoIterator<Item = PickTarget<'a>>,
    accept: impl Fn(&LeafKey) -> bool,
) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    for target in targets {
        let local = if target.transform.is_identity(0.0) {
            *ray
        } else {
            match target.transform.try_inverse() {
                Some(inverse) => ray.transformed(&inverse),
                None => {
                    tracing::trace!("skipping model with singular transform");
                    continue;
                }
            }
        };
        let hit = target.index.nearest_hit(&local, |key, ray| {
            if accept(key) {
                slice_distance(ray, target.mesh, key.element_id)
            } else {
                None
            }
        });
        let Some(hit) = hit else {
            continue;
        };
        if best.as_ref().map_or(true, |b| hit.distance < b.distance) {
            best = Some(Hit {
                point: ray.point_at(hit.distance),
                ..hit
            });
        }
    }
    best
}
