// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packed R-tree over element bounding boxes
//!
//! Built once with Sort-Tile-Recursive bulk loading and never updated in
//! place. Nodes live in one flat arena: every level is stored contiguously,
//! leaves first and the root last, and each node addresses its children as a
//! range into the level below (or into the entry list for leaves).

use crate::frustum::Frustum;
use crate::picking::slice_distance;
use crate::ray::Ray;
use bimkit_core::EntityId;
use bimkit_geometry::{BoundingBox, ModelMesh};
use nalgebra::Point3;
use smallvec::{smallvec, SmallVec};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_NODE_CAPACITY: usize = 8;

/// Caller-chosen model identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ModelId(Arc<str>);

impl ModelId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl Borrow<str> for ModelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of one model
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeafKey {
    pub model_id: ModelId,
    pub element_id: EntityId,
}

impl LeafKey {
    pub fn new(model_id: impl Into<ModelId>, element_id: EntityId) -> Self {
        Self {
            model_id: model_id.into(),
            element_id,
        }
    }
}

impl fmt::Display for LeafKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model_id, self.element_id)
    }
}

/// Closest ray hit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Hit {
    pub key: LeafKey,
    pub distance: f64,
    pub point: Point3<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    bounds: BoundingBox,
    /// First child: an entry index for leaves, a node index otherwise
    start: usize,
    len: usize,
    leaf: bool,
}

impl Node {
    fn children(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

type Stack = SmallVec<[usize; 32]>;

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    entries: Vec<(LeafKey, BoundingBox)>,
    nodes: Vec<Node>,
    capacity: usize,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::build(Vec::new())
    }
}

impl SpatialIndex {
    pub fn build(entries: Vec<(LeafKey, BoundingBox)>) -> Self {
        Self::build_with_capacity(entries, DEFAULT_NODE_CAPACITY)
    }

    /// Bulk load. Capacities below 2 are raised to 2.
    pub fn build_with_capacity(mut entries: Vec<(LeafKey, BoundingBox)>, capacity: usize) -> Self {
        let started = Instant::now();
        let capacity = capacity.max(2);
        let mut nodes = Vec::new();

        if !entries.is_empty() {
            tile(&mut entries, capacity, 0, &|(_, b)| b.center());
            let mut level = group(&entries, capacity, 0, true, |(_, b)| *b);

            while level.len() > 1 {
                tile(&mut level, capacity, 0, &|n| n.bounds.center());
                let base = nodes.len();
                nodes.extend_from_slice(&level);
                level = group(&level, capacity, base, false, |n| n.bounds);
            }
            nodes.extend(level);
        }

        tracing::debug!(
            entries = entries.len(),
            nodes = nodes.len(),
            capacity,
            elapsed_us = started.elapsed().as_micros() as u64,
            "spatial index built"
        );

        Self {
            entries,
            nodes,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Union of all entry boxes
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.nodes.last().map(|root| root.bounds)
    }

    /// Number of levels, leaves included
    pub fn depth(&self) -> usize {
        let Some(mut node) = self.nodes.last() else {
            return 0;
        };
        let mut depth = 1;
        while !node.leaf {
            node = &self.nodes[node.start];
            depth += 1;
        }
        depth
    }

    pub fn entries(&self) -> impl Iterator<Item = &(LeafKey, BoundingBox)> {
        self.entries.iter()
    }

    /// Depth-first walk. `enter` prunes nodes; `accept` filters and scores
    /// entries. Children are visited in stored order.
    fn visit<T>(
        &self,
        enter: impl Fn(&BoundingBox) -> bool,
        accept: impl Fn(&BoundingBox) -> Option<T>,
        mut found: impl FnMut(&LeafKey, T),
    ) {
        let Some(root) = self.nodes.len().checked_sub(1) else {
            return;
        };
        let mut stack: Stack = smallvec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !enter(&node.bounds) {
                continue;
            }
            if node.leaf {
                for (key, bounds) in &self.entries[node.children()] {
                    if let Some(value) = accept(bounds) {
                        found(key, value);
                    }
                }
            } else {
                stack.extend(node.children().rev());
            }
        }
    }

    /// Broad phase: every entry whose box the ray enters, with the entry
    /// distance, in traversal order
    pub fn candidates(&self, ray: &Ray) -> Vec<(LeafKey, f64)> {
        let mut out = Vec::new();
        self.visit(
            |b| ray.intersect_box(b).is_some(),
            |b| ray.intersect_box(b),
            |key, t| out.push((key.clone(), t)),
        );
        out
    }

    /// Closest hit according to an exact `narrow` test.
    ///
    /// A candidate whose box is entered but whose narrow test fails is not a
    /// hit. Equal distances keep the earlier candidate.
    pub fn nearest_hit(&self, ray: &Ray, mut narrow: impl FnMut(&LeafKey, &Ray) -> Option<f64>) -> Option<Hit> {
        let mut best: Option<(LeafKey, f64)> = None;
        for (key, entry) in self.candidates(ray) {
            // The exact hit can never be closer than the box entry
            if best.as_ref().is_some_and(|(_, d)| entry > *d) {
                continue;
            }
            let Some(distance) = narrow(&key, ray).filter(|d| d.is_finite() && *d > 0.0) else {
                continue;
            };
            if best.as_ref().map_or(true, |(_, d)| distance < *d) {
                best = Some((key, distance));
            }
        }
        best.map(|(key, distance)| Hit {
            point: ray.point_at(distance),
            key,
            distance,
        })
    }

    /// Closest hit against each candidate's triangles in `mesh`
    pub fn nearest_hit_in_mesh(&self, ray: &Ray, mesh: &ModelMesh) -> Option<Hit> {
        self.nearest_hit(ray, |key, ray| slice_distance(ray, mesh, key.element_id))
    }

    pub fn elements_in_frustum(&self, frustum: &Frustum) -> Vec<LeafKey> {
        let mut out = Vec::new();
        self.visit(
            |b| frustum.intersects_box(b),
            |b| frustum.intersects_box(b).then_some(()),
            |key, ()| out.push(key.clone()),
        );
        out
    }

    /// Entries whose box overlaps `bounds`
    pub fn query_box(&self, bounds: &BoundingBox) -> Vec<LeafKey> {
        let mut out = Vec::new();
        self.visit(
            |b| b.intersects(bounds),
            |b| b.intersects(bounds).then_some(()),
            |key, ()| out.push(key.clone()),
        );
        out
    }
}

/// Sort-Tile-Recursive ordering: sort by x into vertical slabs, each slab by
/// y, each run by z, so consecutive `capacity`-sized groups are compact.
fn tile<T>(items: &mut [T], capacity: usize, axis: usize, center: &impl Fn(&T) -> Point3<f64>) {
    if axis == 3 || items.len() <= capacity {
        return;
    }
    items.sort_by(|a, b| center(a)[axis].total_cmp(&center(b)[axis]));

    let pages = items.len().div_ceil(capacity);
    let slabs = (pages as f64).powf(1.0 / (3 - axis) as f64).ceil() as usize;
    let slab_len = pages.div_ceil(slabs.max(1)) * capacity;
    for slab in items.chunks_mut(slab_len) {
        tile(slab, capacity, axis + 1, center);
    }
}

/// One parent per `capacity` consecutive items starting at arena index `base`
fn group<T>(items: &[T], capacity: usize, base: usize, leaf: bool, bounds: impl Fn(&T) -> BoundingBox) -> Vec<Node> {
    items
        .chunks(capacity)
        .enumerate()
        .map(|(i, chunk)| {
            let first = bounds(&chunk[0]);
            Node {
                bounds: chunk[1..].iter().fold(first, |acc, item| acc.union(&bounds(item))),
                start: base + i * capacity,
                len: chunk.len(),
                leaf,
            }
        })
        .collect()
}
