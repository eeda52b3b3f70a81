// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # bimkit Geometry
//!
//! Turns the representations of an [`EntityGraph`](bimkit_core::EntityGraph)
//! into triangle meshes using earcutr triangulation and nalgebra transforms.
//!
//! - Extruded area solids over parametric and arbitrary profiles
//! - Faceted breps, face/shell based surface models, triangulated face sets
//! - Mapped items and placement chain composition
//!
//! Per-element failures never abort a model: they end up as
//! `GeometryFailed` diagnostics and the element keeps a placeholder box.
//!
//! ```rust,ignore
//! use bimkit_geometry::GeometryRouter;
//!
//! let geometry = GeometryRouter::new().extract_model(&graph);
//! println!("{} triangles", geometry.mesh.triangle_count());
//! ```

pub mod bounds;
pub mod brep;
pub mod color;
pub mod error;
pub mod extrusion;
pub mod mesh;
pub mod placement;
pub mod profile;
pub mod router;
pub mod tessellation;
pub mod triangulation;
pub mod units;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use bounds::BoundingBox;
pub use brep::{FaceBasedSurfaceModelProcessor, FacetedBrepProcessor, ShellBasedSurfaceModelProcessor};
pub use color::{color_for_element_type, HIGHLIGHT};
pub use error::{Error, Result};
pub use extrusion::{extrude_profile, ExtrudedAreaSolidProcessor};
pub use mesh::{ElementSlice, Mesh, ModelMesh};
pub use placement::PlacementResolver;
pub use profile::Profile2D;
pub use router::{ExtractResult, GeometryProcessor, GeometryRouter, ModelGeometry, RouterOptions};
pub use tessellation::TriangulatedFaceSetProcessor;
pub use triangulation::triangulate_polygon;
pub use units::length_unit_scale;
