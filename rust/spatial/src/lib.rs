// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # bimkit Spatial
//!
//! Selection support for extracted models: a packed STR R-tree over element
//! boxes, slab and Möller–Trumbore ray tests, and frustum culling.
//!
//! Picking is two-phase. The tree yields every element whose box the ray
//! enters; the exact triangle test against that element's slice decides.

pub mod frustum;
pub mod picking;
pub mod ray;
pub mod rtree;

pub use frustum::{Frustum, Plane};
pub use picking::{pick_nearest, slice_distance, PickTarget};
pub use ray::Ray;
pub use rtree::{Hit, LeafKey, ModelId, SpatialIndex, DEFAULT_NODE_CAPACITY};
